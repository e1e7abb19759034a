//! Per-label cohort overview

use crate::ml::features::cardio_label;
use crate::structs::{
    ColumnStats, DatasetSummary, Feature, LabelGroup, PatientRecord, Result,
};
use tracing::debug;

/// Fields described for each label group
pub const SUMMARY_FEATURES: [Feature; 5] = [
    Feature::AgeYears,
    Feature::Weight,
    Feature::Height,
    Feature::ApHi,
    Feature::ApLo,
];

/// Count records per disease label and describe the core measurements
///
/// Missing values are skipped field by field; a field with no values in a
/// group is left out of that group's statistics.
///
/// # Errors
/// Returns error if any record has a missing or invalid label
pub fn dataset_summary(records: &[PatientRecord]) -> Result<DatasetSummary> {
    let mut groups = Vec::with_capacity(2);

    for cardio in [false, true] {
        let mut members = Vec::new();
        for (row, record) in records.iter().enumerate() {
            if cardio_label(record, row)? == cardio {
                members.push(record);
            }
        }

        let mut features = Vec::with_capacity(SUMMARY_FEATURES.len());
        for feature in SUMMARY_FEATURES {
            let values: Vec<f64> = members.iter().filter_map(|r| feature.value(r)).collect();
            if values.is_empty() {
                debug!(%feature, cardio, "no values to summarize");
                continue;
            }
            features.push(ColumnStats::calculate(feature.name(), &values)?);
        }

        groups.push(LabelGroup {
            cardio,
            count: members.len(),
            features,
        });
    }

    Ok(DatasetSummary {
        total_records: records.len(),
        groups,
    })
}
