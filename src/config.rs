//! Configuration file handling.
//!
//! Settings are read from an optional TOML file. Every field has a default,
//! so an empty file (or no file) yields the standard analysis setup:
//! alpha 0.05, seed 42, an 80/20 split with 5-fold CV and 3 clusters.

use crate::structs::{CardioError, Feature, MissingPolicy, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,

    #[serde(default)]
    pub source: SourceConfig,

    #[serde(default)]
    pub classification: ClassificationConfig,

    #[serde(default)]
    pub regression: RegressionConfig,

    #[serde(default)]
    pub clustering: ClusteringConfig,
}

/// Settings shared by every analysis.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Significance threshold for p-values; confidence intervals stay at 95%.
    #[serde(default = "default_alpha")]
    pub alpha: f64,

    /// Seed for splits, fold assignment and k-means initialisation.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            seed: default_seed(),
        }
    }
}

const fn default_alpha() -> f64 {
    0.05
}

const fn default_seed() -> u64 {
    42
}

/// Where patient rows come from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// CSV or JSON file holding the patient table.
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Field delimiter for CSV input.
    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    /// Apply the upstream cleaning rules (raw `cardio_train.csv` exports).
    #[serde(default)]
    pub clean: bool,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            path: None,
            delimiter: default_delimiter(),
            clean: false,
        }
    }
}

const fn default_delimiter() -> char {
    ','
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationConfig {
    /// Held-out share of each class.
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,

    #[serde(default = "default_cv_folds")]
    pub cv_folds: usize,

    /// Inverse L2 regularization strength.
    #[serde(default = "default_c")]
    pub c: f64,

    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    #[serde(default = "default_top_predictors")]
    pub top_predictors: usize,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            test_fraction: default_test_fraction(),
            cv_folds: default_cv_folds(),
            c: default_c(),
            max_iterations: default_max_iterations(),
            top_predictors: default_top_predictors(),
        }
    }
}

const fn default_test_fraction() -> f64 {
    0.2
}

const fn default_cv_folds() -> usize {
    5
}

const fn default_c() -> f64 {
    1.0
}

const fn default_max_iterations() -> usize {
    100
}

const fn default_top_predictors() -> usize {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegressionConfig {
    #[serde(default = "default_target")]
    pub target: Feature,

    #[serde(default = "default_predictors")]
    pub predictors: Vec<Feature>,

    #[serde(default)]
    pub missing: MissingPolicy,
}

impl Default for RegressionConfig {
    fn default() -> Self {
        Self {
            target: default_target(),
            predictors: default_predictors(),
            missing: MissingPolicy::default(),
        }
    }
}

const fn default_target() -> Feature {
    Feature::ApHi
}

fn default_predictors() -> Vec<Feature> {
    vec![Feature::AgeYears, Feature::Weight, Feature::Cholesterol]
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusteringConfig {
    #[serde(default = "default_clusters")]
    pub clusters: usize,

    /// Independent k-means restarts; the lowest inertia wins.
    #[serde(default = "default_runs")]
    pub runs: usize,

    #[serde(default = "default_kmeans_iterations")]
    pub max_iterations: u64,

    #[serde(default = "default_tolerance")]
    pub tolerance: f64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            clusters: default_clusters(),
            runs: default_runs(),
            max_iterations: default_kmeans_iterations(),
            tolerance: default_tolerance(),
        }
    }
}

const fn default_clusters() -> usize {
    3
}

const fn default_runs() -> usize {
    10
}

const fn default_kmeans_iterations() -> u64 {
    300
}

const fn default_tolerance() -> f64 {
    1e-4
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns error if the file cannot be read, parsed or fails validation
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CardioError::Config(format!("Failed to read config {}: {e}", path.display()))
        })?;
        Self::from_toml(&content)
    }

    /// Load from a file if given, otherwise use defaults.
    ///
    /// # Errors
    /// Returns error if the given file is unreadable or invalid
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::load)
    }

    /// Parse configuration from TOML text.
    ///
    /// # Errors
    /// Returns error if the TOML is malformed or a value is out of range
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| CardioError::Config(format!("Invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check value ranges the analyses rely on.
    ///
    /// # Errors
    /// Returns a configuration error naming the first invalid setting
    pub fn validate(&self) -> Result<()> {
        if !(self.general.alpha > 0.0 && self.general.alpha < 1.0) {
            return Err(CardioError::Config(format!(
                "alpha must be in (0, 1), got {}",
                self.general.alpha
            )));
        }
        let fraction = self.classification.test_fraction;
        if !(fraction > 0.0 && fraction < 1.0) {
            return Err(CardioError::Config(format!(
                "test_fraction must be in (0, 1), got {fraction}"
            )));
        }
        if self.classification.cv_folds < 2 {
            return Err(CardioError::Config("cv_folds must be at least 2".into()));
        }
        if self.classification.c <= 0.0 {
            return Err(CardioError::Config("c must be positive".into()));
        }
        if self.clustering.clusters == 0 || self.clustering.runs == 0 {
            return Err(CardioError::Config(
                "clusters and runs must be at least 1".into(),
            ));
        }
        if self.regression.predictors.contains(&self.regression.target) {
            return Err(CardioError::Config(format!(
                "regression target {} cannot also be a predictor",
                self.regression.target
            )));
        }
        Ok(())
    }
}
