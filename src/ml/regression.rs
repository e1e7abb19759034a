//! Ordinary least squares with per-coefficient and whole-model diagnostics

use crate::config::RegressionConfig;
use crate::ml::linalg::invert;
use crate::ml::stats::{f_sf, finite, t_critical, t_two_sided, CONFIDENCE_LEVEL};
use crate::structs::{
    CardioError, CoefficientDiagnostic, FeatureMatrix, PatientRecord, RegressionResult, Result,
};
use ndarray::{s, Array1, Array2};
use tracing::info;

/// Fit `config.target` on `config.predictors` from patient records
///
/// # Errors
/// Returns `DataQuality` for missing values under the fail policy or for
/// degenerate designs, and `InsufficientDegreesOfFreedom` when there are
/// not more rows than coefficients
pub fn fit_regression(
    records: &[PatientRecord],
    config: &RegressionConfig,
    alpha: f64,
) -> Result<RegressionResult> {
    if config.predictors.is_empty() {
        return Err(CardioError::DataInsufficient(
            "regression needs at least one predictor".into(),
        ));
    }

    let mut columns = Vec::with_capacity(config.predictors.len() + 1);
    columns.push(config.target);
    columns.extend_from_slice(&config.predictors);

    let matrix = FeatureMatrix::from_records(records, &columns, config.missing)?;
    let data = matrix.to_array()?;
    let y = data.column(0).to_owned();
    let x = data.slice(s![.., 1..]).to_owned();

    let names: Vec<String> = config.predictors.iter().map(|f| f.name().to_string()).collect();
    let mut result = ols(&x, &y, &names, config.target.name(), alpha)?;
    result.rows_dropped = records.len() - matrix.n_samples();
    Ok(result)
}

/// OLS of `y` on `x` with an intercept column prepended
///
/// # Errors
/// Returns `InsufficientDegreesOfFreedom` when `n - k - 1 <= 0`, and
/// `DataQuality` for collinear predictors, a constant target or an exact fit
#[allow(clippy::cast_precision_loss, clippy::too_many_lines)]
pub fn ols(
    x: &Array2<f64>,
    y: &Array1<f64>,
    predictor_names: &[String],
    target: &str,
    alpha: f64,
) -> Result<RegressionResult> {
    let (n, k) = x.dim();
    if k == 0 {
        return Err(CardioError::DataInsufficient(
            "regression needs at least one predictor".into(),
        ));
    }
    if n <= k + 1 {
        return Err(CardioError::InsufficientDegreesOfFreedom {
            observations: n,
            predictors: k,
        });
    }
    if y.len() != n || predictor_names.len() != k {
        return Err(CardioError::DataQuality(format!(
            "design has {n} rows and {k} predictors but {} targets and {} names",
            y.len(),
            predictor_names.len()
        )));
    }

    let mut design = Array2::<f64>::ones((n, k + 1));
    design.slice_mut(s![.., 1..]).assign(x);

    let xtx_inv = invert(&design.t().dot(&design)).ok_or_else(|| {
        CardioError::DataQuality("predictors are collinear; X'X is singular".into())
    })?;
    let beta = xtx_inv.dot(&design.t().dot(y));

    let residuals = y - &design.dot(&beta);
    let ssr = residuals.dot(&residuals);
    let y_mean = y.mean().unwrap_or(0.0);
    let sst = y.mapv(|v| (v - y_mean).powi(2)).sum();

    if sst <= 0.0 {
        return Err(CardioError::DataQuality(format!("{target} is constant")));
    }
    if ssr <= 0.0 {
        return Err(CardioError::DataQuality(
            "residual variance is zero; predictors determine the target exactly".into(),
        ));
    }

    let df_resid = (n - k - 1) as f64;
    let sigma2 = ssr / df_resid;
    let t_crit = t_critical(CONFIDENCE_LEVEL, df_resid)?;

    let mut coefficients = Vec::with_capacity(k + 1);
    for (j, &estimate) in beta.iter().enumerate() {
        let predictor = if j == 0 {
            "Intercept".to_string()
        } else {
            predictor_names[j - 1].clone()
        };
        let std_error = finite("std_error", (sigma2 * xtx_inv[[j, j]]).sqrt())?;
        let t_statistic = finite("t_statistic", estimate / std_error)?;
        let p_value = finite("p_value", t_two_sided(t_statistic, df_resid)?)?;
        coefficients.push(CoefficientDiagnostic {
            conf_int_lower: finite("conf_int_lower", estimate - t_crit * std_error)?,
            conf_int_upper: finite("conf_int_upper", estimate + t_crit * std_error)?,
            coefficient: finite("coefficient", estimate)?,
            is_significant: p_value < alpha,
            predictor,
            std_error,
            t_statistic,
            p_value,
        });
    }

    let r_squared = finite("r_squared", 1.0 - ssr / sst)?;
    let adjusted_r_squared = finite(
        "adjusted_r_squared",
        1.0 - (1.0 - r_squared) * (n - 1) as f64 / df_resid,
    )?;
    let f_statistic = finite("f_statistic", ((sst - ssr) / k as f64) / sigma2)?;
    let f_pvalue = finite("f_pvalue", f_sf(f_statistic, k as f64, df_resid)?)?;
    let rmse = finite("rmse", (ssr / n as f64).sqrt())?;
    let model_significant = f_pvalue < alpha;

    let significant_predictors = coefficients
        .iter()
        .skip(1)
        .filter(|c| c.is_significant)
        .count();

    info!(n, k, r_squared, f_statistic, f_pvalue, "regression fitted");

    Ok(RegressionResult {
        null_hypothesis: format!(
            "None of the predictors ({}) are linearly related to {target}.",
            predictor_names.join(", ")
        ),
        alternative_hypothesis: format!(
            "At least one of the predictors ({}) is linearly related to {target}.",
            predictor_names.join(", ")
        ),
        target: target.to_string(),
        sample_size: n,
        rows_dropped: 0,
        num_predictors: k,
        conclusion: conclusion(
            model_significant,
            target,
            f_statistic,
            f_pvalue,
            r_squared,
            adjusted_r_squared,
            significant_predictors,
            k,
        ),
        r_squared,
        adjusted_r_squared,
        f_statistic,
        f_pvalue,
        rmse,
        coefficients,
        model_significant,
    })
}

#[allow(clippy::too_many_arguments)]
fn conclusion(
    significant: bool,
    target: &str,
    f_statistic: f64,
    f_pvalue: f64,
    r_squared: f64,
    adjusted_r_squared: f64,
    significant_predictors: usize,
    k: usize,
) -> String {
    let verdict = if significant {
        "Reject null hypothesis: the model is statistically significant"
    } else {
        "Fail to reject null hypothesis: the model is not statistically significant"
    };
    format!(
        "{verdict} (F = {f_statistic:.2}, p = {f_pvalue:.4}). It explains {:.1}% of the variance in {target} \
         (adjusted R² = {adjusted_r_squared:.3}). {significant_predictors} of {k} predictors are individually significant.",
        r_squared * 100.0
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::testdata::{normal, rng};
    use crate::structs::MissingPolicy;
    use proptest::prelude::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_recovers_known_coefficients() {
        let mut rng = rng(9);
        let n = 300;
        let mut x = Array2::<f64>::zeros((n, 2));
        let mut y = Array1::<f64>::zeros(n);
        for i in 0..n {
            let x1 = normal(&mut rng, 0.0, 3.0);
            let x2 = normal(&mut rng, 0.0, 3.0);
            x[[i, 0]] = x1;
            x[[i, 1]] = x2;
            y[i] = 2.0f64.mul_add(x1, -3.0 * x2) + normal(&mut rng, 0.0, 0.5);
        }

        let result = ols(&x, &y, &names(&["x1", "x2"]), "y", 0.05).expect("fit");

        assert_eq!(result.coefficients.len(), 3);
        assert_eq!(result.coefficients[0].predictor, "Intercept");
        assert!((result.coefficients[1].coefficient - 2.0).abs() < 0.05);
        assert!((result.coefficients[2].coefficient + 3.0).abs() < 0.05);
        assert!(result.coefficients[1].is_significant);
        assert!(result.coefficients[2].is_significant);
        assert!(result.model_significant);
        assert!((0.0..=1.0).contains(&result.r_squared));
        assert!(result.adjusted_r_squared <= result.r_squared);
        assert!(result.conclusion.contains("2 of 2 predictors"));

        for c in &result.coefficients {
            assert!(c.conf_int_lower <= c.coefficient && c.coefficient <= c.conf_int_upper);
        }
    }

    #[test]
    fn test_intervals_do_not_depend_on_alpha() {
        let mut rng = rng(4);
        let n = 80;
        let x = Array2::from_shape_fn((n, 1), |_| normal(&mut rng, 0.0, 2.0));
        let noise = Array1::from_shape_fn(n, |_| normal(&mut rng, 0.0, 1.0));
        let y = x.column(0).mapv(|v| 1.5f64.mul_add(v, 4.0)) + noise;

        let loose = ols(&x, &y, &names(&["x"]), "y", 0.10).expect("fit");
        let strict = ols(&x, &y, &names(&["x"]), "y", 0.01).expect("fit");

        for (a, b) in loose.coefficients.iter().zip(&strict.coefficients) {
            assert!((a.conf_int_lower - b.conf_int_lower).abs() < 1e-12);
            assert!((a.conf_int_upper - b.conf_int_upper).abs() < 1e-12);
        }
    }

    #[test]
    fn test_clinical_scenario() {
        let mut rng = rng(21);
        let records: Vec<PatientRecord> = (0..500)
            .map(|i| {
                let age = normal(&mut rng, 53.0, 7.0).round();
                let weight = normal(&mut rng, 74.0, 14.0).round();
                let cholesterol = f64::from(u8::try_from(i % 3).unwrap_or(0) + 1);
                let ap_hi = 0.5f64.mul_add(age, 0.3 * weight)
                    + 5.0f64.mul_add(cholesterol, 70.0)
                    + normal(&mut rng, 0.0, 12.0);
                PatientRecord {
                    age_years: Some(age),
                    weight: Some(weight),
                    cholesterol: Some(cholesterol),
                    ap_hi: Some(ap_hi.round()),
                    ..PatientRecord::default()
                }
            })
            .collect();

        let result = fit_regression(&records, &RegressionConfig::default(), 0.05).expect("fit");

        assert_eq!(result.sample_size, 500);
        assert_eq!(result.num_predictors, 3);
        assert_eq!(result.target, "ap_hi");
        assert!(result.f_pvalue < 0.05);
        assert!(result.model_significant);
        assert!((result.r_squared - result.adjusted_r_squared).abs() < 0.02);
        assert!(result.rmse > 0.0);
    }

    #[test]
    fn test_missing_rows_dropped_or_rejected() {
        let mut rng = rng(4);
        let mut records: Vec<PatientRecord> = (0..40u8)
            .map(|i| {
                let age = normal(&mut rng, 50.0, 8.0);
                PatientRecord {
                    age_years: Some(age),
                    weight: Some(normal(&mut rng, 75.0, 10.0)),
                    cholesterol: Some(f64::from(i % 3 + 1)),
                    ap_hi: Some(age + normal(&mut rng, 80.0, 5.0)),
                    ..PatientRecord::default()
                }
            })
            .collect();
        records[3].weight = None;
        records[10].ap_hi = None;

        let dropped = fit_regression(&records, &RegressionConfig::default(), 0.05).expect("fit");
        assert_eq!(dropped.sample_size, 38);
        assert_eq!(dropped.rows_dropped, 2);

        let strict = RegressionConfig {
            missing: MissingPolicy::Fail,
            ..RegressionConfig::default()
        };
        assert!(matches!(
            fit_regression(&records, &strict, 0.05),
            Err(CardioError::DataQuality(_))
        ));
    }

    #[test]
    fn test_insufficient_degrees_of_freedom() {
        let x = Array2::from_shape_vec((3, 2), vec![1.0, 2.0, 2.0, 1.0, 3.0, 5.0]).expect("shape");
        let y = Array1::from(vec![1.0, 2.0, 3.0]);
        assert!(matches!(
            ols(&x, &y, &names(&["a", "b"]), "y", 0.05),
            Err(CardioError::InsufficientDegreesOfFreedom {
                observations: 3,
                predictors: 2
            })
        ));
    }

    #[test]
    fn test_collinear_predictors() {
        let x = Array2::from_shape_vec(
            (5, 2),
            vec![1.0, 2.0, 2.0, 4.0, 3.0, 6.0, 4.0, 8.0, 5.0, 10.0],
        )
        .expect("shape");
        let y = Array1::from(vec![1.0, 3.0, 2.0, 5.0, 4.0]);
        assert!(matches!(
            ols(&x, &y, &names(&["a", "b"]), "y", 0.05),
            Err(CardioError::DataQuality(_))
        ));
    }

    #[test]
    fn test_no_predictors() {
        let config = RegressionConfig {
            predictors: vec![],
            ..RegressionConfig::default()
        };
        assert!(matches!(
            fit_regression(&[], &config, 0.05),
            Err(CardioError::DataInsufficient(_))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn prop_fit_statistics_bounded(
            seed in 0u64..10_000,
            slope in -5.0f64..5.0,
            noise in 0.1f64..20.0,
        ) {
            let mut rng = rng(seed);
            let n = 60;
            let mut x = Array2::<f64>::zeros((n, 2));
            let mut y = Array1::<f64>::zeros(n);
            for i in 0..n {
                x[[i, 0]] = normal(&mut rng, 0.0, 1.0);
                x[[i, 1]] = normal(&mut rng, 0.0, 1.0);
                y[i] = slope.mul_add(x[[i, 0]], normal(&mut rng, 0.0, noise));
            }
            let result = ols(&x, &y, &names(&["a", "b"]), "y", 0.05).expect("fit");
            prop_assert!((0.0..=1.0).contains(&result.r_squared));
            prop_assert!(result.adjusted_r_squared <= result.r_squared);
            prop_assert!((0.0..=1.0).contains(&result.f_pvalue));
        }
    }
}
