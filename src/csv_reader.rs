use crate::config::SourceConfig;
use crate::db::query::InMemorySource;
use crate::structs::{CardioError, PatientQuery, PatientRecord, PatientSource, Result};
use csv::ReaderBuilder;
use std::path::Path;
use tracing::{info, warn};

const DAYS_PER_YEAR: f64 = 365.0;
const AP_HI_RANGE: (f64, f64) = (70.0, 250.0);
const AP_LO_RANGE: (f64, f64) = (40.0, 150.0);

/// Patient table loaded from a delimited file
///
/// Columns are matched by header name; unknown columns are ignored and
/// empty cells become missing values.
#[derive(Debug, Clone)]
pub struct CsvPatientSource {
    rows: InMemorySource,
}

impl CsvPatientSource {
    /// Build a source from explicit settings
    ///
    /// # Errors
    /// Returns error if no path is configured or the file cannot be parsed
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        let path = config
            .path
            .as_deref()
            .ok_or_else(|| CardioError::Config("no patient data file configured".into()))?;
        Self::from_file(path, config.delimiter, config.clean)
    }

    /// Parse a CSV/TSV patient table, optionally applying the cleaning rules
    ///
    /// # Errors
    /// Returns `UpstreamUnavailable` if the file cannot be read or a row does
    /// not parse
    pub fn from_file(path: &Path, delimiter: char, clean: bool) -> Result<Self> {
        let delimiter = u8::try_from(delimiter).map_err(|_| {
            CardioError::Config(format!("delimiter '{delimiter}' is not a single byte"))
        })?;

        let mut reader = ReaderBuilder::new()
            .delimiter(delimiter)
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| {
                CardioError::UpstreamUnavailable(format!("{}: {e}", path.display()))
            })?;

        let mut records = Vec::new();
        for (line, result) in reader.deserialize::<PatientRecord>().enumerate() {
            let record = result.map_err(|e| {
                CardioError::UpstreamUnavailable(format!("{} row {}: {e}", path.display(), line + 1))
            })?;
            records.push(record);
        }

        info!(path = %path.display(), rows = records.len(), "loaded patient table");

        let records = if clean { clean_records(records) } else { records };
        Ok(Self {
            rows: InMemorySource::new(records),
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl PatientSource for CsvPatientSource {
    fn fetch(&self, query: &PatientQuery) -> Result<Vec<PatientRecord>> {
        self.rows.fetch(query)
    }
}

/// Turn a raw export into the analysis table
///
/// Derives whole years from the age in days and keeps only rows whose
/// systolic pressure is at least the diastolic one, with both in a
/// plausible range (70-250 and 40-150 mmHg). Rows missing either pressure
/// are dropped.
#[must_use]
pub fn clean_records(records: Vec<PatientRecord>) -> Vec<PatientRecord> {
    let total = records.len();

    let cleaned: Vec<PatientRecord> = records
        .into_iter()
        .map(|mut r| {
            if r.age_years.is_none() {
                r.age_years = r.age.map(|days| (days / DAYS_PER_YEAR).floor());
            }
            r
        })
        .filter(|r| match (r.ap_hi, r.ap_lo) {
            (Some(hi), Some(lo)) => {
                hi >= lo
                    && (AP_HI_RANGE.0..=AP_HI_RANGE.1).contains(&hi)
                    && (AP_LO_RANGE.0..=AP_LO_RANGE.1).contains(&lo)
            }
            _ => false,
        })
        .collect();

    let dropped = total - cleaned.len();
    if dropped > 0 {
        warn!(dropped, kept = cleaned.len(), "removed implausible blood pressure rows");
    }
    cleaned
}
