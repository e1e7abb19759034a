//! Analysis pipeline that runs all four analyses against one data source

use crate::config::Config;
use crate::structs::{AnalysisReport, Feature, PatientQuery, PatientSource, Result};
use tracing::info;

/// Run every analysis and assemble the combined report
///
/// The t-test reads pre-aggregated group summaries from the source; the
/// other analyses fetch the full table once and share it.
///
/// # Errors
/// Returns the first error raised by the source or any analysis
pub fn run_pipeline(source: &dyn PatientSource, config: &Config) -> Result<AnalysisReport> {
    let alpha = config.general.alpha;
    let seed = config.general.seed;

    // Hypothesis 1: systolic pressure by disease label
    let with_disease = source.group_summary(Feature::ApHi, true)?;
    let without_disease = source.group_summary(Feature::ApHi, false)?;
    let hypothesis1 = super::ttest::welch_test(&with_disease, &without_disease, alpha)?;
    info!(p_value = hypothesis1.p_value, "t-test complete");

    let records = source.fetch(&PatientQuery::all())?;
    info!(rows = records.len(), "fetched patient table");

    // Hypothesis 2: risk factors predict disease better than chance
    let hypothesis2 =
        super::classification::evaluate_classifier(&records, &config.classification, seed, alpha)?;
    info!(
        test_accuracy = hypothesis2.test_accuracy,
        p_value = hypothesis2.p_value,
        "classification complete"
    );

    // Hypothesis 3: predictors explain systolic pressure
    let hypothesis3 = super::regression::fit_regression(&records, &config.regression, alpha)?;
    info!(r_squared = hypothesis3.r_squared, "regression complete");

    let cluster_result = super::clustering::profile_clusters(&records, &config.clustering, seed)?;
    info!(k = cluster_result.k, "clustering complete");

    Ok(AnalysisReport {
        hypothesis1,
        hypothesis2,
        hypothesis3,
        cluster_result,
    })
}
