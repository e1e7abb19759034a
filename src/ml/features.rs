//! Feature schemas, record extraction and standardization
//!
//! Each analysis declares the exact columns it reads. Bumping
//! [`SCHEMA_VERSION`] marks a change to any of these lists, so results can
//! be traced back to the columns that produced them.

use crate::structs::{
    CardioError, Feature, FeatureMatrix, MissingPolicy, PatientRecord, Result, Scaler,
};
use ndarray::{Array1, Array2, Axis};
use tracing::warn;

pub const SCHEMA_VERSION: u32 = 1;

/// Risk factors fed to the disease classifier
pub const CLASSIFICATION_FEATURES: [Feature; 9] = [
    Feature::AgeYears,
    Feature::Gender,
    Feature::Height,
    Feature::Weight,
    Feature::ApHi,
    Feature::ApLo,
    Feature::Cholesterol,
    Feature::Gluc,
    Feature::Smoke,
];

/// Measurements used to segment patients into risk profiles
pub const CLUSTERING_FEATURES: [Feature; 6] = [
    Feature::AgeYears,
    Feature::Weight,
    Feature::Height,
    Feature::ApHi,
    Feature::ApLo,
    Feature::Bmi,
];

/// Body-mass index from weight in kg and height in cm
#[must_use]
pub fn bmi(weight_kg: f64, height_cm: f64) -> Option<f64> {
    if height_cm <= 0.0 {
        return None;
    }
    let meters = height_cm / 100.0;
    Some(weight_kg / (meters * meters))
}

impl Feature {
    /// Read this feature from a record, `None` when missing or underivable
    #[must_use]
    pub fn value(self, record: &PatientRecord) -> Option<f64> {
        let value = match self {
            Self::AgeYears => record.age_years,
            Self::Gender => record.gender,
            Self::Height => record.height,
            Self::Weight => record.weight,
            Self::ApHi => record.ap_hi,
            Self::ApLo => record.ap_lo,
            Self::Cholesterol => record.cholesterol,
            Self::Gluc => record.gluc,
            Self::Smoke => record.smoke,
            Self::Bmi => bmi(record.weight?, record.height?),
        };
        value.filter(|v| v.is_finite())
    }
}

/// Disease label of a record
///
/// # Errors
/// Returns error if the label is missing or not 0/1
pub fn cardio_label(record: &PatientRecord, row: usize) -> Result<bool> {
    match record.cardio {
        Some(v) if v == 0.0 => Ok(false),
        Some(v) if v == 1.0 => Ok(true),
        Some(v) => Err(CardioError::DataQuality(format!(
            "row {row} has cardio={v}; expected 0 or 1"
        ))),
        None => Err(CardioError::DataQuality(format!(
            "row {row} is missing cardio"
        ))),
    }
}

/// Labels for the records a matrix was built from
///
/// # Errors
/// Returns error if any referenced record has an invalid label
pub fn labels_for(records: &[PatientRecord], row_indices: &[usize]) -> Result<Vec<bool>> {
    row_indices
        .iter()
        .map(|&i| cardio_label(&records[i], i))
        .collect()
}

impl FeatureMatrix {
    /// Extract the given features from patient records
    ///
    /// Incomplete rows are dropped or rejected according to `policy`.
    ///
    /// # Errors
    /// Returns error on a missing value under `MissingPolicy::Fail`, or if
    /// no complete rows remain
    pub fn from_records(
        records: &[PatientRecord],
        features: &[Feature],
        policy: MissingPolicy,
    ) -> Result<Self> {
        if features.is_empty() {
            return Err(CardioError::DataInsufficient("no features selected".into()));
        }

        let mut data = Vec::with_capacity(records.len());
        let mut row_indices = Vec::with_capacity(records.len());

        for (row_idx, record) in records.iter().enumerate() {
            let mut row = Vec::with_capacity(features.len());
            let mut missing = None;

            for &feature in features {
                if let Some(v) = feature.value(record) {
                    row.push(v);
                } else {
                    missing = Some(feature);
                    break;
                }
            }

            match (missing, policy) {
                (None, _) => {
                    data.push(row);
                    row_indices.push(row_idx);
                }
                (Some(feature), MissingPolicy::Fail) => {
                    return Err(CardioError::DataQuality(format!(
                        "row {row_idx} is missing {feature}"
                    )));
                }
                (Some(_), MissingPolicy::Drop) => {}
            }
        }

        let dropped = records.len() - data.len();
        if dropped > 0 {
            warn!(dropped, total = records.len(), "dropped rows with missing values");
        }

        if data.is_empty() {
            return Err(CardioError::DataInsufficient(
                "no complete rows for the selected features".into(),
            ));
        }

        Ok(Self {
            features: features.to_vec(),
            data,
            row_indices,
        })
    }

    /// Convert to an `ndarray` matrix (samples x features)
    ///
    /// # Errors
    /// Returns error if rows have inconsistent lengths
    pub fn to_array(&self) -> Result<Array2<f64>> {
        Array2::from_shape_vec((self.n_samples(), self.n_features()), self.to_flat())
            .map_err(|e| CardioError::DataQuality(format!("Failed to create array: {e}")))
    }
}

impl Scaler {
    /// Fit column means and population standard deviations
    ///
    /// Constant columns get a unit scale so they map to zero.
    #[must_use]
    pub fn fit(data: &Array2<f64>) -> Self {
        let means = data
            .mean_axis(Axis(0))
            .unwrap_or_else(|| Array1::zeros(data.ncols()));
        let stds = data.std_axis(Axis(0), 0.0);

        Self {
            means: means.to_vec(),
            stds: stds
                .iter()
                .map(|&s| if s > 0.0 && s.is_finite() { s } else { 1.0 })
                .collect(),
        }
    }

    /// Apply the fitted statistics to (possibly different) data
    #[must_use]
    pub fn transform(&self, data: &Array2<f64>) -> Array2<f64> {
        let means = Array1::from(self.means.clone());
        let stds = Array1::from(self.stds.clone());
        (data - &means) / &stds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn record(age: f64, weight: f64, height: Option<f64>) -> PatientRecord {
        PatientRecord {
            age_years: Some(age),
            weight: Some(weight),
            height,
            cardio: Some(1.0),
            ..PatientRecord::default()
        }
    }

    #[test]
    fn test_bmi_derivation() {
        let r = record(50.0, 80.0, Some(200.0));
        assert!((Feature::Bmi.value(&r).expect("bmi") - 20.0).abs() < 1e-12);
        assert!(Feature::Bmi.value(&record(50.0, 80.0, None)).is_none());
        assert!(Feature::Bmi.value(&record(50.0, 80.0, Some(0.0))).is_none());
    }

    #[test]
    fn test_feature_extraction_drop() {
        let records = vec![
            record(40.0, 70.0, Some(170.0)),
            record(50.0, 80.0, None),
            record(60.0, 90.0, Some(180.0)),
        ];
        let features = [Feature::AgeYears, Feature::Height];
        let matrix = FeatureMatrix::from_records(&records, &features, MissingPolicy::Drop)
            .expect("extract features");

        assert_eq!(matrix.n_samples(), 2);
        assert_eq!(matrix.n_features(), 2);
        assert_eq!(matrix.row_indices, vec![0, 2]);
        assert_eq!(matrix.data, vec![vec![40.0, 170.0], vec![60.0, 180.0]]);
    }

    #[test]
    fn test_feature_extraction_fail() {
        let records = vec![record(40.0, 70.0, Some(170.0)), record(50.0, 80.0, None)];
        let result =
            FeatureMatrix::from_records(&records, &[Feature::Height], MissingPolicy::Fail);
        assert!(matches!(result, Err(CardioError::DataQuality(_))));
    }

    #[test]
    fn test_labels() {
        let mut r = record(40.0, 70.0, Some(170.0));
        assert!(cardio_label(&r, 0).expect("label"));
        r.cardio = Some(2.0);
        assert!(matches!(cardio_label(&r, 0), Err(CardioError::DataQuality(_))));
        r.cardio = None;
        assert!(cardio_label(&r, 0).is_err());
    }

    #[test]
    fn test_scaler_fit_on_train_only() {
        let train = array![[1.0, 5.0], [3.0, 5.0]];
        let test = array![[5.0, 7.0]];
        let scaler = Scaler::fit(&train);

        assert_eq!(scaler.means, vec![2.0, 5.0]);
        assert_eq!(scaler.stds, vec![1.0, 1.0]);

        let scaled_train = scaler.transform(&train);
        assert!((scaled_train[[0, 0]] + 1.0).abs() < 1e-12);
        assert!((scaled_train[[1, 0]] - 1.0).abs() < 1e-12);
        // Constant column maps to zero
        assert!(scaled_train[[0, 1]].abs() < 1e-12);

        let scaled_test = scaler.transform(&test);
        assert!((scaled_test[[0, 0]] - 3.0).abs() < 1e-12);
        assert!((scaled_test[[0, 1]] - 2.0).abs() < 1e-12);
    }
}
