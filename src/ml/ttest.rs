//! Welch two-sample t-test of systolic pressure by disease label

use crate::ml::features::cardio_label;
use crate::ml::stats::{finite, t_critical, t_sf, CONFIDENCE_LEVEL};
use crate::structs::{
    CardioError, EffectSize, Feature, GroupSummary, PatientRecord, Result, TTestResult,
};
use tracing::debug;

const NULL_HYPOTHESIS: &str =
    "Mean systolic blood pressure is the same with and without cardiovascular disease.";
const ALTERNATIVE_HYPOTHESIS: &str =
    "Mean systolic blood pressure is higher in patients with cardiovascular disease.";

/// One-sided Welch test that the diseased group mean exceeds the healthy one
///
/// # Errors
/// Returns `DataInsufficient` if either group has one observation or fewer,
/// or if both groups have zero variance (pooled variance zero, so neither
/// t nor Cohen's d exists)
#[allow(clippy::cast_precision_loss)]
pub fn welch_test(
    with_disease: &GroupSummary,
    without_disease: &GroupSummary,
    alpha: f64,
) -> Result<TTestResult> {
    for (name, group) in [("with disease", with_disease), ("without disease", without_disease)] {
        if group.n <= 1 {
            return Err(CardioError::DataInsufficient(format!(
                "group {name} has {} observation(s); at least 2 required",
                group.n
            )));
        }
    }

    let (n1, n2) = (with_disease.n as f64, without_disease.n as f64);
    let a = with_disease.variance / n1;
    let b = without_disease.variance / n2;
    let se = (a + b).sqrt();
    if se <= 0.0 {
        return Err(CardioError::DataInsufficient(
            "both groups have zero variance; t statistic and Cohen's d are undefined".into(),
        ));
    }

    let difference = with_disease.mean - without_disease.mean;
    let t = finite("t_statistic", difference / se)?;
    let df = finite(
        "degrees_of_freedom",
        (a + b).powi(2) / (a.powi(2) / (n1 - 1.0) + b.powi(2) / (n2 - 1.0)),
    )?;
    let p_value = finite("p_value", t_sf(t, df)?)?;

    let margin = t_critical(CONFIDENCE_LEVEL, df)? * se;
    let ci = (
        finite("ci_lower", difference - margin)?,
        finite("ci_upper", difference + margin)?,
    );

    let pooled_var = (n1 - 1.0).mul_add(
        with_disease.variance,
        (n2 - 1.0) * without_disease.variance,
    ) / (n1 + n2 - 2.0);
    // se > 0 implies a positive pooled variance
    let cohens_d = finite("cohens_d", difference / pooled_var.sqrt())?;
    let effect_size = EffectSize::from_cohens_d(cohens_d);

    let reject_null = p_value < alpha;
    debug!(t, df, p_value, reject_null, "welch t-test");

    Ok(TTestResult {
        null_hypothesis: NULL_HYPOTHESIS.to_string(),
        alternative_hypothesis: ALTERNATIVE_HYPOTHESIS.to_string(),
        group_with_disease_avg_bp: finite("group_with_disease_avg_bp", with_disease.mean)?,
        group_without_disease_avg_bp: finite(
            "group_without_disease_avg_bp",
            without_disease.mean,
        )?,
        mean_difference: finite("mean_difference", difference)?,
        t_statistic: t,
        degrees_of_freedom: df,
        p_value,
        sample_size_cvd: with_disease.n,
        sample_size_no_cvd: without_disease.n,
        confidence_interval_difference: ci,
        cohens_d,
        effect_size,
        reject_null,
        conclusion: conclusion(reject_null),
    })
}

/// Split records by label and test systolic pressure (`ap_hi`) between the groups
///
/// # Errors
/// Returns `DataQuality` for missing values or labels, otherwise as
/// [`welch_test`]
pub fn welch_test_records(records: &[PatientRecord], alpha: f64) -> Result<TTestResult> {
    let feature = Feature::ApHi;
    let mut with_disease = Vec::new();
    let mut without_disease = Vec::new();

    for (row, record) in records.iter().enumerate() {
        let value = feature
            .value(record)
            .ok_or_else(|| CardioError::DataQuality(format!("row {row} is missing {feature}")))?;
        if cardio_label(record, row)? {
            with_disease.push(value);
        } else {
            without_disease.push(value);
        }
    }

    welch_test(
        &GroupSummary::from_values(&with_disease)?,
        &GroupSummary::from_values(&without_disease)?,
        alpha,
    )
}

fn conclusion(reject_null: bool) -> String {
    if reject_null {
        "Reject null hypothesis: Systolic BP is significantly higher in patients with CVD."
            .to_string()
    } else {
        "Fail to reject null hypothesis.".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn group(n: usize, mean: f64, variance: f64) -> GroupSummary {
        GroupSummary { n, mean, variance }
    }

    #[test]
    fn test_reference_scenario() {
        let result = welch_test(&group(1000, 140.0, 400.0), &group(1000, 120.0, 400.0), 0.05)
            .expect("t-test");

        assert!((result.t_statistic - 22.36).abs() < 0.01);
        assert!((result.degrees_of_freedom - 1998.0).abs() < 1e-6);
        assert!(result.p_value < 0.001);
        assert!(result.reject_null);
        assert!(result.conclusion.starts_with("Reject"));
        assert_eq!(result.effect_size, EffectSize::Large);
        assert!((result.cohens_d - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_interval_fixed_at_95_percent() {
        let with = group(40, 131.0, 220.0);
        let without = group(45, 124.0, 190.0);
        let loose = welch_test(&with, &without, 0.10).expect("t-test");
        let strict = welch_test(&with, &without, 0.01).expect("t-test");

        assert_eq!(
            loose.confidence_interval_difference,
            strict.confidence_interval_difference
        );
        assert!((loose.p_value - strict.p_value).abs() < 1e-15);
        assert_ne!(loose.reject_null, strict.reject_null);
    }

    #[test]
    fn test_identical_groups_fail_to_reject() {
        let result = welch_test(&group(200, 125.0, 225.0), &group(180, 125.0, 225.0), 0.05)
            .expect("t-test");

        assert!(result.p_value > 0.05);
        assert!(!result.reject_null);
        assert_eq!(result.conclusion, "Fail to reject null hypothesis.");
        assert_eq!(result.effect_size, EffectSize::Negligible);
    }

    #[test]
    fn test_many_pooled_sds_apart() {
        let result = welch_test(&group(50, 160.0, 25.0), &group(50, 120.0, 25.0), 0.05)
            .expect("t-test");
        assert!(result.p_value < 1e-6);
        assert_eq!(result.effect_size, EffectSize::Large);
    }

    #[test]
    fn test_one_constant_group_has_defined_effect() {
        let result = welch_test(&group(10, 140.0, 0.0), &group(10, 120.0, 100.0), 0.05)
            .expect("t-test");
        // pooled sd = sqrt(50)
        assert!((result.cohens_d - 20.0 / 50.0f64.sqrt()).abs() < 1e-12);
        assert_eq!(result.effect_size, EffectSize::Large);
    }

    #[test]
    fn test_small_group_rejected() {
        let err = welch_test(&group(1, 140.0, 0.0), &group(100, 120.0, 100.0), 0.05);
        assert!(matches!(err, Err(CardioError::DataInsufficient(_))));
    }

    #[test]
    fn test_zero_variance_rejected() {
        let err = welch_test(&group(10, 140.0, 0.0), &group(10, 120.0, 0.0), 0.05);
        assert!(matches!(err, Err(CardioError::DataInsufficient(_))));
    }

    #[test]
    fn test_from_records() {
        let records: Vec<PatientRecord> = [(150.0, 1.0), (160.0, 1.0), (170.0, 1.0), (110.0, 0.0), (120.0, 0.0), (115.0, 0.0)]
            .iter()
            .map(|&(ap_hi, cardio)| PatientRecord {
                ap_hi: Some(ap_hi),
                ap_lo: Some(80.0),
                cardio: Some(cardio),
                ..PatientRecord::default()
            })
            .collect();

        let result = welch_test_records(&records, 0.05).expect("t-test");
        assert!(result.null_hypothesis.contains("systolic"));
        assert_eq!(result.sample_size_cvd, 3);
        assert_eq!(result.sample_size_no_cvd, 3);
        assert!((result.group_with_disease_avg_bp - 160.0).abs() < 1e-12);
        assert!((result.mean_difference - 45.0).abs() < 1e-12);
    }

    #[test]
    fn test_from_records_single_group() {
        let records = vec![
            PatientRecord {
                ap_hi: Some(150.0),
                cardio: Some(1.0),
                ..PatientRecord::default()
            };
            5
        ];
        assert!(matches!(
            welch_test_records(&records, 0.05),
            Err(CardioError::DataInsufficient(_))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_interval_contains_difference(
            n1 in 2usize..5000,
            n2 in 2usize..5000,
            m1 in 80.0f64..220.0,
            m2 in 80.0f64..220.0,
            v1 in 0.1f64..900.0,
            v2 in 0.1f64..900.0,
        ) {
            let result = welch_test(&group(n1, m1, v1), &group(n2, m2, v2), 0.05)
                .expect("t-test");
            let (lo, hi) = result.confidence_interval_difference;
            prop_assert!(lo <= result.mean_difference);
            prop_assert!(result.mean_difference <= hi);
            prop_assert!((0.0..=1.0).contains(&result.p_value));
        }
    }
}
