//! Result file writers

use crate::structs::{AnalysisReport, Result};
use serde::Serialize;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// Write `<name>.json` - machine-readable result
///
/// # Errors
/// Returns error if the value cannot be serialized or the file written
pub fn write_json<T: Serialize>(output_dir: &Path, name: &str, value: &T) -> Result<PathBuf> {
    let path = output_dir.join(format!("{name}.json"));
    let json = serde_json::to_string_pretty(value)?;
    fs::write(&path, json)?;
    Ok(path)
}

/// Write `summary.txt` - human readable overview
///
/// # Errors
/// Returns error if file cannot be written
pub fn write_summary(output_dir: &Path, content: &str) -> Result<PathBuf> {
    let path = output_dir.join("summary.txt");
    fs::write(&path, content)?;
    Ok(path)
}

/// Write the combined report plus one file per analysis
///
/// # Errors
/// Returns error if any file cannot be written
pub fn write_report(output_dir: &Path, report: &AnalysisReport) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(output_dir)?;
    Ok(vec![
        write_json(output_dir, "report", report)?,
        write_json(output_dir, "ttest", &report.hypothesis1)?,
        write_json(output_dir, "classification", &report.hypothesis2)?,
        write_json(output_dir, "regression", &report.hypothesis3)?,
        write_json(output_dir, "clusters", &report.cluster_result)?,
        write_summary(output_dir, &build_summary(report))?,
    ])
}

/// Plain-text digest of a report
#[must_use]
pub fn build_summary(report: &AnalysisReport) -> String {
    let mut out = String::from("=== CARDIOVASCULAR RISK ANALYSIS ===\n\n");

    let t = &report.hypothesis1;
    let _ = writeln!(out, "## Hypothesis 1: systolic blood pressure");
    let _ = writeln!(
        out,
        "with CVD: {:.1} mmHg (n={}), without CVD: {:.1} mmHg (n={})",
        t.group_with_disease_avg_bp,
        t.sample_size_cvd,
        t.group_without_disease_avg_bp,
        t.sample_size_no_cvd
    );
    let _ = writeln!(
        out,
        "t={:.3}, df={:.1}, p={:.4e}, 95% CI [{:.2}, {:.2}], effect {:?}",
        t.t_statistic,
        t.degrees_of_freedom,
        t.p_value,
        t.confidence_interval_difference.0,
        t.confidence_interval_difference.1,
        t.effect_size
    );
    let _ = writeln!(out, "{}\n", t.conclusion);

    let c = &report.hypothesis2;
    let _ = writeln!(out, "## Hypothesis 2: disease prediction");
    let _ = writeln!(
        out,
        "test accuracy {:.3} vs baseline {:.3}, CV {:.3} +/- {:.3}, AUC {:.3}, p={:.4e}",
        c.test_accuracy, c.baseline_accuracy, c.cv_accuracy_mean, c.cv_accuracy_std, c.roc_auc, c.p_value
    );
    let top: Vec<String> = c
        .most_important_predictors
        .iter()
        .map(|p| format!("{} ({:.3})", p.name, p.coefficient_magnitude))
        .collect();
    let _ = writeln!(out, "top predictors: {}", top.join(", "));
    let _ = writeln!(out, "{}\n", c.conclusion);

    let r = &report.hypothesis3;
    let _ = writeln!(out, "## Hypothesis 3: {} regression", r.target);
    let _ = writeln!(
        out,
        "n={} (dropped {}), R2={:.3}, adj R2={:.3}, F={:.2} (p={:.4e}), RMSE={:.2}",
        r.sample_size,
        r.rows_dropped,
        r.r_squared,
        r.adjusted_r_squared,
        r.f_statistic,
        r.f_pvalue,
        r.rmse
    );
    for coef in &r.coefficients {
        let _ = writeln!(
            out,
            "  {}: {:.4} (se {:.4}, p={:.4e}){}",
            coef.predictor,
            coef.coefficient,
            coef.std_error,
            coef.p_value,
            if coef.is_significant { " *" } else { "" }
        );
    }
    let _ = writeln!(out, "{}\n", r.conclusion);

    let k = &report.cluster_result;
    let _ = writeln!(out, "## Risk profiles (k={}, inertia {:.2})", k.k, k.inertia);
    for profile in &k.analysis_by_cluster {
        let means: Vec<String> = profile
            .feature_means
            .iter()
            .map(|(name, mean)| format!("{name}={mean:.1}"))
            .collect();
        let _ = writeln!(
            out,
            "  cluster {}: {} patients, {:.1}% CVD, {}",
            profile.cluster,
            profile.size,
            profile.disease_percentage,
            means.join(", ")
        );
    }
    let _ = writeln!(out, "{}", k.finding);

    out
}
