//! Consolidated public types for the cardio-insight crate
//!
//! This module contains the records, analysis results, errors and the data
//! source trait shared across the crate. Behaviour lives next to the code
//! that uses it (`ml::*`, `db`, `csv_reader`).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Error, Debug)]
pub enum CardioError {
    #[error("insufficient data: {0}")]
    DataInsufficient(String),

    #[error("data quality error: {0}")]
    DataQuality(String),

    #[error("degenerate label: {0}")]
    LabelDegenerate(String),

    #[error(
        "insufficient degrees of freedom: {observations} observations for {predictors} predictors plus intercept"
    )]
    InsufficientDegreesOfFreedom {
        observations: usize,
        predictors: usize,
    },

    #[error("degenerate clustering: {0}")]
    ClusteringDegenerate(String),

    #[error("data source unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("non-finite statistic: {0}")]
    NonFinite(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, CardioError>;

// ============================================================================
// Patient Data Types
// ============================================================================

/// One row of the cleaned patient table.
///
/// Every clinical field is nullable so that missing cells stay visible to
/// the analyses. Categorical codes (`gender`, `cholesterol`, `gluc`, `smoke`,
/// `cardio`) are carried as numbers exactly as the table stores them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatientRecord {
    #[serde(default)]
    pub id: Option<i64>,
    /// Age in days, only present in raw exports before cleaning
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub age: Option<f64>,
    #[serde(default)]
    pub age_years: Option<f64>,
    #[serde(default)]
    pub gender: Option<f64>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub ap_hi: Option<f64>,
    #[serde(default)]
    pub ap_lo: Option<f64>,
    #[serde(default)]
    pub cholesterol: Option<f64>,
    #[serde(default)]
    pub gluc: Option<f64>,
    #[serde(default)]
    pub smoke: Option<f64>,
    #[serde(default)]
    pub cardio: Option<f64>,
}

/// Numeric fields the analyses can read from a [`PatientRecord`].
///
/// `Bmi` is derived from weight and height rather than stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    AgeYears,
    Gender,
    Height,
    Weight,
    ApHi,
    ApLo,
    Cholesterol,
    Gluc,
    Smoke,
    Bmi,
}

impl Feature {
    pub const ALL: [Self; 10] = [
        Self::AgeYears,
        Self::Gender,
        Self::Height,
        Self::Weight,
        Self::ApHi,
        Self::ApLo,
        Self::Cholesterol,
        Self::Gluc,
        Self::Smoke,
        Self::Bmi,
    ];

    /// Column name as it appears in the patient table
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::AgeYears => "age_years",
            Self::Gender => "gender",
            Self::Height => "height",
            Self::Weight => "weight",
            Self::ApHi => "ap_hi",
            Self::ApLo => "ap_lo",
            Self::Cholesterol => "cholesterol",
            Self::Gluc => "gluc",
            Self::Smoke => "smoke",
            Self::Bmi => "bmi",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Feature {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.name() == s.trim())
            .ok_or_else(|| format!("unknown feature '{s}'"))
    }
}

/// Count, mean and sample variance of one field within one label group
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GroupSummary {
    pub n: usize,
    pub mean: f64,
    pub variance: f64,
}

/// Row selection passed to a [`PatientSource`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PatientQuery {
    /// Restrict to one disease label
    pub cardio: Option<bool>,
    pub limit: Option<usize>,
}

impl PatientQuery {
    #[must_use]
    pub const fn all() -> Self {
        Self {
            cardio: None,
            limit: None,
        }
    }

    #[must_use]
    pub const fn with_label(cardio: bool) -> Self {
        Self {
            cardio: Some(cardio),
            limit: None,
        }
    }
}

/// How rows with missing values in the selected columns are handled
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingPolicy {
    /// Drop incomplete rows and log how many were removed
    #[default]
    Drop,
    /// Fail with a data quality error on the first incomplete row
    Fail,
}

/// Trait for sources of patient rows
///
/// Implementations must give a consistent snapshot for the duration of a
/// call. Failures surface as [`CardioError::UpstreamUnavailable`] and are
/// never retried by the analyses.
pub trait PatientSource: Send + Sync {
    /// Fetch rows matching the query
    ///
    /// # Errors
    /// Returns error if the underlying store cannot be read
    fn fetch(&self, query: &PatientQuery) -> Result<Vec<PatientRecord>>;

    /// Pre-aggregated count/mean/variance of `feature` for one label group
    ///
    /// The default aggregates over [`PatientSource::fetch`]; stores with a
    /// summary view can override it.
    ///
    /// # Errors
    /// Returns error if the rows cannot be fetched or the group is too small
    fn group_summary(&self, feature: Feature, cardio: bool) -> Result<GroupSummary> {
        let rows = self.fetch(&PatientQuery::with_label(cardio))?;
        GroupSummary::from_records(&rows, feature)
    }
}

// ============================================================================
// ML Types
// ============================================================================

/// Feature matrix extracted from patient records
#[derive(Debug, Clone)]
pub struct FeatureMatrix {
    /// Feature columns, in order
    pub features: Vec<Feature>,
    /// Row data as feature vectors
    pub data: Vec<Vec<f64>>,
    /// Original record indices (for mapping back)
    pub row_indices: Vec<usize>,
}

impl FeatureMatrix {
    /// Get number of samples (rows)
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.data.len()
    }

    /// Get number of features (columns)
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.features.len()
    }

    /// Convert to flat `Vec<f64>` (row-major)
    #[must_use]
    pub fn to_flat(&self) -> Vec<f64> {
        self.data.iter().flatten().copied().collect()
    }
}

/// Per-column standardization statistics (zero mean, unit variance)
#[derive(Debug, Clone, PartialEq)]
pub struct Scaler {
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
}

/// Descriptive statistics for a numeric column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStats {
    pub name: String,
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub iqr: f64,
}

// ============================================================================
// Analysis Results
// ============================================================================

/// Cohen's d banding
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectSize {
    Negligible,
    Small,
    Medium,
    Large,
}

impl EffectSize {
    #[must_use]
    pub fn from_cohens_d(d: f64) -> Self {
        match d.abs() {
            x if x < 0.2 => Self::Negligible,
            x if x < 0.5 => Self::Small,
            x if x < 0.8 => Self::Medium,
            _ => Self::Large,
        }
    }
}

/// Welch two-sample t-test of systolic pressure, diseased vs healthy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TTestResult {
    pub null_hypothesis: String,
    pub alternative_hypothesis: String,
    pub group_with_disease_avg_bp: f64,
    pub group_without_disease_avg_bp: f64,
    pub mean_difference: f64,
    pub t_statistic: f64,
    pub degrees_of_freedom: f64,
    pub p_value: f64,
    pub sample_size_cvd: usize,
    pub sample_size_no_cvd: usize,
    pub confidence_interval_difference: (f64, f64),
    pub cohens_d: f64,
    pub effect_size: EffectSize,
    pub reject_null: bool,
    pub conclusion: String,
}

/// A predictor ranked by absolute standardized coefficient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictorImportance {
    pub name: String,
    pub coefficient_magnitude: f64,
}

/// Logistic classifier evaluated against the majority-class baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub schema_version: u32,
    pub features: Vec<Feature>,
    pub train_size: usize,
    pub test_size: usize,
    pub baseline_accuracy: f64,
    pub cv_fold_accuracies: Vec<f64>,
    pub cv_accuracy_mean: f64,
    pub cv_accuracy_std: f64,
    pub test_accuracy: f64,
    pub accuracy_95_ci: (f64, f64),
    pub roc_auc: f64,
    pub p_value: f64,
    /// `None` when all folds scored identically
    pub cohens_d: Option<f64>,
    pub is_significantly_better: bool,
    pub conclusion: String,
    pub most_important_predictors: Vec<PredictorImportance>,
}

/// Diagnostics for one regression coefficient
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientDiagnostic {
    pub predictor: String,
    pub coefficient: f64,
    pub std_error: f64,
    pub t_statistic: f64,
    pub p_value: f64,
    pub conf_int_lower: f64,
    pub conf_int_upper: f64,
    pub is_significant: bool,
}

/// OLS fit of a target on a set of predictors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegressionResult {
    pub null_hypothesis: String,
    pub alternative_hypothesis: String,
    pub target: String,
    pub sample_size: usize,
    pub rows_dropped: usize,
    pub num_predictors: usize,
    pub r_squared: f64,
    pub adjusted_r_squared: f64,
    pub f_statistic: f64,
    pub f_pvalue: f64,
    pub rmse: f64,
    /// Intercept first, then predictors in request order
    pub coefficients: Vec<CoefficientDiagnostic>,
    pub model_significant: bool,
    pub conclusion: String,
}

/// Profile of one k-means cluster in original units
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterProfile {
    pub cluster: usize,
    pub size: usize,
    /// Mean of every clustering feature, keyed by feature name
    #[serde(flatten)]
    pub feature_means: BTreeMap<String, f64>,
    pub disease_percentage: f64,
}

/// Risk-profile segmentation of the cohort
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusteringResult {
    pub schema_version: u32,
    pub features: Vec<Feature>,
    pub k: usize,
    pub inertia: f64,
    pub finding: String,
    pub analysis_by_cluster: Vec<ClusterProfile>,
}

/// Descriptive statistics for one disease-label group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelGroup {
    pub cardio: bool,
    pub count: usize,
    pub features: Vec<ColumnStats>,
}

/// Per-label cohort overview
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetSummary {
    pub total_records: usize,
    pub groups: Vec<LabelGroup>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskBand {
    Low,
    Moderate,
    High,
}

/// Additive age/pressure/cholesterol risk score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskScore {
    pub risk_score: u8,
    pub max_score: u8,
    pub band: RiskBand,
}

/// All four analyses over one data snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub hypothesis1: TTestResult,
    pub hypothesis2: ClassificationResult,
    pub hypothesis3: RegressionResult,
    pub cluster_result: ClusteringResult,
}
