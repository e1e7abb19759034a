#![allow(clippy::module_name_repetitions)]

use crate::structs::{CardioError, PatientQuery, PatientRecord, PatientSource, Result};
use serde_json::Value;
use std::path::Path;

/// Patient rows held in memory
#[derive(Debug, Clone, Default)]
pub struct InMemorySource {
    rows: Vec<PatientRecord>,
}

impl InMemorySource {
    #[must_use]
    pub const fn new(rows: Vec<PatientRecord>) -> Self {
        Self { rows }
    }

    /// Load from a JSON file
    ///
    /// # Errors
    /// Returns error if file cannot be read or parsed
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CardioError::UpstreamUnavailable(format!("Failed to read {}: {e}", path.display()))
        })?;

        Self::from_json(&content)
    }

    /// Load from JSON string
    ///
    /// Accepts a bare array of rows or an object with a `rows`/`data` field.
    ///
    /// # Errors
    /// Returns error if JSON is invalid
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(json)
            .map_err(|e| CardioError::UpstreamUnavailable(format!("Failed to parse JSON: {e}")))?;

        let rows_value = if value.is_array() {
            value
        } else if let Some(rows) = value.get("rows") {
            rows.clone()
        } else if let Some(data) = value.get("data") {
            data.clone()
        } else {
            return Err(CardioError::UpstreamUnavailable(
                "JSON must be an array or have 'rows'/'data' field".into(),
            ));
        };

        let rows: Vec<PatientRecord> = serde_json::from_value(rows_value)
            .map_err(|e| CardioError::UpstreamUnavailable(format!("Failed to parse rows: {e}")))?;

        Ok(Self { rows })
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

impl PatientSource for InMemorySource {
    fn fetch(&self, query: &PatientQuery) -> Result<Vec<PatientRecord>> {
        let limit = query.limit.unwrap_or(usize::MAX);
        let rows = self
            .rows
            .iter()
            .filter(|row| match query.cardio {
                Some(label) => row.cardio == Some(if label { 1.0 } else { 0.0 }),
                None => true,
            })
            .take(limit)
            .cloned()
            .collect();

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structs::Feature;

    const ROWS: &str = r#"[
        {"id": 1, "age_years": 50, "ap_hi": 120, "cardio": 0},
        {"id": 2, "age_years": 61, "ap_hi": 150, "cardio": 1},
        {"id": 3, "age_years": 58, "ap_hi": 160, "cardio": 1},
        {"id": 4, "age_years": 45, "ap_hi": 110, "cardio": 0},
        {"id": 5, "age_years": 39, "ap_hi": null, "cardio": 0}
    ]"#;

    #[test]
    fn test_in_memory_source() {
        let ds = InMemorySource::from_json(ROWS).expect("parse json");

        assert_eq!(ds.len(), 5);
        let all = ds.fetch(&PatientQuery::all()).expect("fetch");
        assert_eq!(all[1].ap_hi, Some(150.0));
        assert_eq!(all[4].ap_hi, None);
    }

    #[test]
    fn test_query_by_label() {
        let ds = InMemorySource::from_json(ROWS).expect("parse json");

        let sick = ds.fetch(&PatientQuery::with_label(true)).expect("query");
        assert_eq!(sick.len(), 2);
        assert!(sick.iter().all(|r| r.cardio == Some(1.0)));
    }

    #[test]
    fn test_query_with_limit() {
        let ds = InMemorySource::from_json(ROWS).expect("parse json");

        let query = PatientQuery {
            cardio: None,
            limit: Some(2),
        };
        assert_eq!(ds.fetch(&query).expect("query").len(), 2);
    }

    #[test]
    fn test_wrapped_rows() {
        let json = r#"{"data": [{"ap_hi": 130, "cardio": 1}]}"#;
        let ds = InMemorySource::from_json(json).expect("parse json");
        assert_eq!(ds.len(), 1);
    }

    #[test]
    fn test_group_summary_default() {
        let ds = InMemorySource::from_json(ROWS).expect("parse json");
        let summary = ds.group_summary(Feature::ApHi, true).expect("summary");

        assert_eq!(summary.n, 2);
        assert!((summary.mean - 155.0).abs() < 1e-12);
        assert!((summary.variance - 50.0).abs() < 1e-12);
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            InMemorySource::from_json("{\"rows\": 3}"),
            Err(CardioError::UpstreamUnavailable(_))
        ));
        assert!(InMemorySource::from_json("{}").is_err());
    }
}
