use crate::structs::{CardioError, ColumnStats, Feature, GroupSummary, PatientRecord, Result};
use statrs::distribution::{ContinuousCDF, FisherSnedecor, Normal, StudentsT};

impl ColumnStats {
    /// Calculate statistics for a vector of values
    ///
    /// # Errors
    /// Returns error if values is empty
    #[allow(clippy::cast_precision_loss)]
    pub fn calculate(name: &str, values: &[f64]) -> Result<Self> {
        if values.is_empty() {
            return Err(CardioError::DataInsufficient(format!(
                "cannot describe empty column {name}"
            )));
        }

        let count = values.len();
        let mean = values.iter().sum::<f64>() / count as f64;

        let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / count as f64;
        let std_dev = variance.sqrt();

        let mut sorted = values.to_vec();
        sorted.sort_by(f64::total_cmp);

        let min = sorted[0];
        let max = sorted[count - 1];

        let q1 = percentile(&sorted, 25.0);
        let median = percentile(&sorted, 50.0);
        let q3 = percentile(&sorted, 75.0);
        let iqr = q3 - q1;

        Ok(Self {
            name: name.to_string(),
            count,
            mean,
            std_dev,
            min,
            max,
            q1,
            median,
            q3,
            iqr,
        })
    }
}

/// Calculate percentile using linear interpolation
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    if sorted.len() == 1 {
        return sorted[0];
    }

    let k = (p / 100.0) * (sorted.len() - 1) as f64;
    let f = k.floor() as usize;
    let c = k.ceil() as usize;

    if f == c {
        sorted[f]
    } else {
        let d0 = sorted[f] * (c as f64 - k);
        let d1 = sorted[c] * (k - f as f64);
        d0 + d1
    }
}

impl GroupSummary {
    /// Aggregate count, mean and sample variance from raw values
    ///
    /// # Errors
    /// Returns error if fewer than two values are given
    #[allow(clippy::cast_precision_loss)]
    pub fn from_values(values: &[f64]) -> Result<Self> {
        let n = values.len();
        if n <= 1 {
            return Err(CardioError::DataInsufficient(format!(
                "group has {n} observation(s); variance needs at least 2"
            )));
        }
        let mean = values.iter().sum::<f64>() / n as f64;
        let variance = values.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
        Ok(Self { n, mean, variance })
    }

    /// Aggregate `feature` over every given record
    ///
    /// # Errors
    /// Returns error if any record lacks the feature or fewer than two remain
    pub fn from_records(records: &[PatientRecord], feature: Feature) -> Result<Self> {
        let values = records
            .iter()
            .enumerate()
            .map(|(row, record)| {
                feature.value(record).ok_or_else(|| {
                    CardioError::DataQuality(format!("row {row} is missing {feature}"))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::from_values(&values)
    }
}

/// Arithmetic mean, `None` for an empty slice
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// Sample standard deviation (n - 1 denominator), `None` below two values
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn sample_std(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values)?;
    let ss = values.iter().map(|x| (x - m).powi(2)).sum::<f64>();
    Some((ss / (values.len() - 1) as f64).sqrt())
}

/// Coverage of every reported confidence interval, independent of alpha
pub const CONFIDENCE_LEVEL: f64 = 0.95;

/// Reject NaN and infinities before they reach a result
///
/// # Errors
/// Returns `NonFinite` naming the offending statistic
pub fn finite(name: &str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(CardioError::NonFinite(format!("{name} = {value}")))
    }
}

fn students_t(df: f64) -> Result<StudentsT> {
    StudentsT::new(0.0, 1.0, df)
        .map_err(|e| CardioError::NonFinite(format!("t distribution with df={df}: {e}")))
}

/// Upper-tail probability `P(T > t)` for Student's t with `df` degrees of freedom
///
/// # Errors
/// Returns error if `df` is not a positive finite number
pub fn t_sf(t: f64, df: f64) -> Result<f64> {
    Ok(students_t(df)?.sf(t))
}

/// Two-sided p-value `P(|T| > |t|)`
///
/// # Errors
/// Returns error if `df` is not a positive finite number
pub fn t_two_sided(t: f64, df: f64) -> Result<f64> {
    Ok((2.0 * students_t(df)?.sf(t.abs())).min(1.0))
}

/// Critical value for a two-sided interval at `confidence`
///
/// # Errors
/// Returns error if `df` is not a positive finite number
pub fn t_critical(confidence: f64, df: f64) -> Result<f64> {
    Ok(students_t(df)?.inverse_cdf(1.0 - (1.0 - confidence) / 2.0))
}

/// Upper-tail probability of the F distribution
///
/// # Errors
/// Returns error if either degrees of freedom is not positive
pub fn f_sf(f: f64, d1: f64, d2: f64) -> Result<f64> {
    let dist = FisherSnedecor::new(d1, d2)
        .map_err(|e| CardioError::NonFinite(format!("F distribution ({d1}, {d2}): {e}")))?;
    Ok(dist.sf(f))
}

/// Standard normal critical value for a two-sided interval at `confidence`
///
/// # Errors
/// Returns error if the standard normal cannot be constructed
pub fn z_critical(confidence: f64) -> Result<f64> {
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| CardioError::NonFinite(format!("standard normal: {e}")))?;
    Ok(normal.inverse_cdf(1.0 - (1.0 - confidence) / 2.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_column_stats() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0];
        let stats = ColumnStats::calculate("test", &values).expect("calculate stats");

        assert_eq!(stats.count, 10);
        assert!((stats.mean - 5.5).abs() < 0.01);
        assert!((stats.min - 1.0).abs() < 0.01);
        assert!((stats.max - 10.0).abs() < 0.01);
        assert!((stats.median - 5.5).abs() < 0.01);
    }

    #[test]
    fn test_group_summary_sample_variance() {
        let summary = GroupSummary::from_values(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0])
            .expect("summarize");
        assert_eq!(summary.n, 8);
        assert!((summary.mean - 5.0).abs() < 1e-12);
        assert!((summary.variance - 32.0 / 7.0).abs() < 1e-12);
    }

    #[test]
    fn test_group_summary_too_small() {
        assert!(matches!(
            GroupSummary::from_values(&[120.0]),
            Err(CardioError::DataInsufficient(_))
        ));
    }

    #[test]
    fn test_group_summary_missing_value() {
        let records = vec![
            PatientRecord {
                ap_hi: Some(120.0),
                ..PatientRecord::default()
            },
            PatientRecord::default(),
        ];
        assert!(matches!(
            GroupSummary::from_records(&records, Feature::ApHi),
            Err(CardioError::DataQuality(_))
        ));
    }

    #[test]
    fn test_distribution_helpers() {
        assert!((t_sf(0.0, 10.0).expect("sf") - 0.5).abs() < 1e-9);
        // Large-sample t critical value approaches the normal one
        let t = t_critical(0.95, 10_000.0).expect("t crit");
        let z = z_critical(0.95).expect("z crit");
        assert!((z - 1.959_964).abs() < 1e-4);
        assert!((t - z).abs() < 1e-3);
        assert!((t_critical(0.95, 10.0).expect("t crit") - 2.228_139).abs() < 1e-4);
        assert!((t_two_sided(2.228_139, 10.0).expect("p") - 0.05).abs() < 1e-4);
        assert!(f_sf(1e6, 3.0, 100.0).expect("f sf") < 1e-10);
    }

    #[test]
    fn test_finite_guard() {
        assert!(finite("x", 1.0).is_ok());
        assert!(matches!(finite("x", f64::NAN), Err(CardioError::NonFinite(_))));
        assert!(matches!(
            finite("x", f64::INFINITY),
            Err(CardioError::NonFinite(_))
        ));
    }
}
