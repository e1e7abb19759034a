#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::uninlined_format_args)]

mod config;
mod csv_reader;
mod db;
mod ml;
mod structs;

use clap::{Args, Parser, Subcommand};
use config::Config;
use csv_reader::CsvPatientSource;
use db::query::InMemorySource;
use serde::Serialize;
use std::path::{Path, PathBuf};
use structs::{CardioError, Feature, PatientQuery, PatientSource, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Cardiovascular cohort analytics
#[derive(Parser, Debug)]
#[command(name = "cardio-insight")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, global = true, env = "CARDIO_CONFIG")]
    config: Option<PathBuf>,

    /// Log progress to stderr (repeat for more detail)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Significance threshold (overrides the config file)
    #[arg(long, global = true)]
    alpha: Option<f64>,

    /// Random seed (overrides the config file)
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

/// Where to read patients from and where to put results
#[derive(Args, Debug)]
struct DataArgs {
    /// Patient table as CSV/TSV
    #[arg(long, conflicts_with = "json")]
    csv: Option<PathBuf>,

    /// Patient table as a JSON array (or {"rows": [...]})
    #[arg(long)]
    json: Option<PathBuf>,

    /// CSV field delimiter (the raw export uses ';')
    #[arg(short, long)]
    delimiter: Option<char>,

    /// Input is a raw export: derive age in years and drop implausible pressures
    #[arg(long)]
    raw: bool,

    /// Write JSON files here instead of printing to stdout
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Per-label counts and descriptive statistics
    Summary(DataArgs),

    /// Welch t-test of systolic pressure between disease groups
    Ttest(DataArgs),

    /// Logistic classifier against the majority-class baseline
    Classify(DataArgs),

    /// OLS regression diagnostics
    Regress {
        #[command(flatten)]
        data: DataArgs,

        /// Target column (overrides the config file)
        #[arg(long)]
        target: Option<Feature>,

        /// Comma-separated predictor columns (overrides the config file)
        #[arg(long, value_delimiter = ',')]
        predictors: Option<Vec<Feature>>,
    },

    /// K-means risk profiles
    Cluster {
        #[command(flatten)]
        data: DataArgs,

        /// Number of clusters (overrides the config file)
        #[arg(short = 'k', long)]
        clusters: Option<usize>,
    },

    /// Run all four analyses and emit the combined report
    All(DataArgs),

    /// Score a single patient
    Risk {
        /// Age in years
        #[arg(long)]
        age: f64,

        /// Systolic blood pressure (mmHg)
        #[arg(long)]
        ap_hi: f64,

        /// Cholesterol grade (1 normal, 2 above normal, 3 well above)
        #[arg(long, value_parser = clap::value_parser!(u8).range(1..=3))]
        cholesterol: u8,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Initialize tracing subscriber; `RUST_LOG` takes precedence over `-v`
fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<()> {
    let mut config = Config::load_or_default(cli.config.as_deref())?;
    if let Some(alpha) = cli.alpha {
        config.general.alpha = alpha;
    }
    if let Some(seed) = cli.seed {
        config.general.seed = seed;
    }

    let alpha = config.general.alpha;
    let seed = config.general.seed;

    match cli.command {
        Commands::Summary(data) => {
            let source = open_source(&data, &mut config)?;
            let records = source.fetch(&PatientQuery::all())?;
            emit(&data, "summary", &ml::summary::dataset_summary(&records)?)
        }

        Commands::Ttest(data) => {
            let source = open_source(&data, &mut config)?;
            let records = source.fetch(&PatientQuery::all())?;
            let result = ml::ttest::welch_test_records(&records, alpha)?;
            emit(&data, "ttest", &result)
        }

        Commands::Classify(data) => {
            let source = open_source(&data, &mut config)?;
            let records = source.fetch(&PatientQuery::all())?;
            let result = ml::classification::evaluate_classifier(
                &records,
                &config.classification,
                seed,
                alpha,
            )?;
            emit(&data, "classification", &result)
        }

        Commands::Regress {
            data,
            target,
            predictors,
        } => {
            if let Some(target) = target {
                config.regression.target = target;
            }
            if let Some(predictors) = predictors {
                config.regression.predictors = predictors;
            }
            let source = open_source(&data, &mut config)?;
            let records = source.fetch(&PatientQuery::all())?;
            let result = ml::regression::fit_regression(&records, &config.regression, alpha)?;
            emit(&data, "regression", &result)
        }

        Commands::Cluster { data, clusters } => {
            if let Some(k) = clusters {
                config.clustering.clusters = k;
            }
            let source = open_source(&data, &mut config)?;
            let records = source.fetch(&PatientQuery::all())?;
            let result = ml::clustering::profile_clusters(&records, &config.clustering, seed)?;
            emit(&data, "clusters", &result)
        }

        Commands::All(data) => {
            let source = open_source(&data, &mut config)?;
            let report = ml::pipeline::run_pipeline(source.as_ref(), &config)?;

            if let Some(dir) = &data.output_dir {
                let written = ml::output::write_report(dir, &report)?;
                eprintln!("Output written to {}", dir.display());
                for path in written {
                    if let Some(name) = path.file_name() {
                        eprintln!("  - {}", name.to_string_lossy());
                    }
                }
                Ok(())
            } else {
                print_json(&report)
            }
        }

        Commands::Risk {
            age,
            ap_hi,
            cholesterol,
        } => {
            config.validate()?;
            print_json(&ml::risk::risk_score(age, ap_hi, cholesterol))
        }
    }
}

/// Apply command-line data options to the config and open the patient table
fn open_source(data: &DataArgs, config: &mut Config) -> Result<Box<dyn PatientSource>> {
    if let Some(csv) = &data.csv {
        config.source.path = Some(csv.clone());
    }
    if let Some(delimiter) = data.delimiter {
        config.source.delimiter = delimiter;
    }
    if data.raw {
        config.source.clean = true;
    }
    config.validate()?;

    let path = match (&data.json, &config.source.path) {
        (Some(json), _) => json.clone(),
        (None, Some(path)) => path.clone(),
        (None, None) => {
            return Err(CardioError::Config(
                "pass --csv or --json, or set source.path".into(),
            ))
        }
    };

    if data.json.is_some() || path.extension().is_some_and(|ext| ext == "json") {
        let source = InMemorySource::from_file(&path)?;
        info!(path = %path.display(), rows = source.len(), "loaded JSON patient table");
        ensure_rows(source.is_empty(), &path)?;
        Ok(Box::new(source))
    } else {
        let source = CsvPatientSource::from_config(&config.source)?;
        info!(rows = source.len(), clean = config.source.clean, "opened CSV patient table");
        ensure_rows(source.is_empty(), &path)?;
        Ok(Box::new(source))
    }
}

fn ensure_rows(empty: bool, path: &Path) -> Result<()> {
    if empty {
        return Err(CardioError::DataInsufficient(format!(
            "{} contains no patient rows",
            path.display()
        )));
    }
    Ok(())
}

/// Print to stdout, or write `<name>.json` when an output directory is set
fn emit<T: Serialize>(data: &DataArgs, name: &str, value: &T) -> Result<()> {
    match &data.output_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let path = ml::output::write_json(dir, name, value)?;
            eprintln!("Output written to {}", path.display());
            Ok(())
        }
        None => print_json(value),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
