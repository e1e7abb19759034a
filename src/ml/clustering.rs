use crate::config::ClusteringConfig;
use crate::ml::features::{labels_for, CLUSTERING_FEATURES, SCHEMA_VERSION};
use crate::ml::stats::finite;
use crate::structs::{
    CardioError, ClusterProfile, ClusteringResult, FeatureMatrix, MissingPolicy, PatientRecord,
    Result, Scaler,
};
use linfa::traits::{Fit, Predict};
use linfa::DatasetBase;
use linfa_clustering::KMeans;
use ndarray::{Array1, Array2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{BTreeMap, HashSet};
use tracing::info;

/// Labels and inertia of the best k-means restart
struct KMeansFit {
    labels: Vec<usize>,
    inertia: f64,
}

/// Perform K-means clustering on standardized features
///
/// # Errors
/// Returns `ClusteringDegenerate` if there are fewer distinct points than
/// clusters or any cluster ends up empty
fn kmeans(standardized: &Array2<f64>, config: &ClusteringConfig, seed: u64) -> Result<KMeansFit> {
    let k = config.clusters;
    if k == 0 {
        return Err(CardioError::ClusteringDegenerate("k must be at least 1".into()));
    }

    let distinct: HashSet<Vec<u64>> = standardized
        .rows()
        .into_iter()
        .map(|row| row.iter().map(|v| v.to_bits()).collect())
        .collect();
    if distinct.len() < k {
        return Err(CardioError::ClusteringDegenerate(format!(
            "Cannot create {k} clusters from {} distinct points",
            distinct.len()
        )));
    }

    let dataset = DatasetBase::from(standardized.clone());
    let rng = StdRng::seed_from_u64(seed);

    let model = KMeans::params_with_rng(k, rng)
        .n_runs(config.runs)
        .max_n_iterations(config.max_iterations)
        .tolerance(config.tolerance)
        .fit(&dataset)
        .map_err(|e| CardioError::ClusteringDegenerate(format!("K-means failed: {e}")))?;

    let predictions: Array1<usize> = model.predict(standardized);
    let labels: Vec<usize> = predictions.to_vec();

    // Calculate cluster sizes
    let mut sizes = vec![0usize; k];
    for &cluster_id in &labels {
        sizes[cluster_id] += 1;
    }
    if let Some(empty) = sizes.iter().position(|&s| s == 0) {
        return Err(CardioError::ClusteringDegenerate(format!(
            "cluster {empty} is empty after fitting"
        )));
    }

    Ok(KMeansFit {
        labels,
        inertia: model.inertia(),
    })
}

/// Segment patients into risk profiles and describe each cluster
///
/// The disease label is kept aside: it is only used to report prevalence
/// per cluster, never as a clustering feature.
///
/// # Errors
/// Returns `DataQuality` for missing features, labels or non-positive
/// heights, and `ClusteringDegenerate` as described for k-means
#[allow(clippy::cast_precision_loss)]
pub fn profile_clusters(
    records: &[PatientRecord],
    config: &ClusteringConfig,
    seed: u64,
) -> Result<ClusteringResult> {
    let matrix = FeatureMatrix::from_records(records, &CLUSTERING_FEATURES, MissingPolicy::Fail)?;
    let labels = labels_for(records, &matrix.row_indices)?;

    let raw = matrix.to_array()?;
    let standardized = Scaler::fit(&raw).transform(&raw);
    let fit = kmeans(&standardized, config, seed)?;

    let k = config.clusters;
    let mut sums = vec![vec![0.0; matrix.n_features()]; k];
    let mut counts = vec![0usize; k];
    let mut diseased = vec![0usize; k];

    for (sample_idx, &cluster_id) in fit.labels.iter().enumerate() {
        counts[cluster_id] += 1;
        if labels[sample_idx] {
            diseased[cluster_id] += 1;
        }
        for (feat_idx, &val) in matrix.data[sample_idx].iter().enumerate() {
            sums[cluster_id][feat_idx] += val;
        }
    }

    let mut profiles = Vec::with_capacity(k);
    for cluster in 0..k {
        let size = counts[cluster];
        let mut feature_means = BTreeMap::new();
        for (feat_idx, feature) in matrix.features.iter().enumerate() {
            let mean = finite(feature.name(), sums[cluster][feat_idx] / size as f64)?;
            feature_means.insert(feature.name().to_string(), mean);
        }
        profiles.push(ClusterProfile {
            cluster,
            size,
            feature_means,
            disease_percentage: finite(
                "disease_percentage",
                diseased[cluster] as f64 / size as f64 * 100.0,
            )?,
        });
    }

    let inertia = finite("inertia", fit.inertia)?;
    info!(k, inertia, "clusters profiled");

    Ok(ClusteringResult {
        schema_version: SCHEMA_VERSION,
        features: matrix.features.clone(),
        k,
        inertia,
        finding: finding(&profiles),
        analysis_by_cluster: profiles,
    })
}

fn finding(profiles: &[ClusterProfile]) -> String {
    let Some(riskiest) = profiles
        .iter()
        .max_by(|a, b| a.disease_percentage.total_cmp(&b.disease_percentage))
    else {
        return "No clusters were formed.".to_string();
    };
    let mean_of = |name: &str| riskiest.feature_means.get(name).copied().unwrap_or(0.0);

    format!(
        "Cluster {} has the highest cardiovascular disease prevalence ({:.1}% of {} patients), \
         with mean systolic BP {:.0} mmHg, mean BMI {:.1} and mean age {:.0} years.",
        riskiest.cluster,
        riskiest.disease_percentage,
        riskiest.size,
        mean_of("ap_hi"),
        mean_of("bmi"),
        mean_of("age_years"),
    )
}
