//! Logistic classifier of disease status, tested against the chance baseline
//!
//! The model is `linfa-logistic`'s L2-penalized logistic regression.
//! Scaling statistics are always fitted on the rows a model trains on and
//! only reapplied to the rows it is scored on.

use crate::config::ClassificationConfig;
use crate::ml::features::{labels_for, CLASSIFICATION_FEATURES, SCHEMA_VERSION};
use crate::ml::stats::{finite, mean, sample_std, t_sf, z_critical, CONFIDENCE_LEVEL};
use crate::structs::{
    CardioError, ClassificationResult, FeatureMatrix, MissingPolicy, PatientRecord,
    PredictorImportance, Result, Scaler,
};
use linfa::traits::{Fit, Predict};
use linfa::Dataset;
use linfa_logistic::{FittedLogisticRegression, LogisticRegression};
use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::{debug, info};

/// Logistic model over standardized features, labelled by `cardio`
struct LogisticModel {
    fitted: FittedLogisticRegression<f64, bool>,
}

impl LogisticModel {
    /// Fit with penalty `1 / c`; the intercept is not penalized
    fn fit(x: &Array2<f64>, y: &[bool], config: &ClassificationConfig) -> Result<Self> {
        let dataset = Dataset::new(x.clone(), Array1::from(y.to_vec()));
        let fitted = LogisticRegression::default()
            .alpha(1.0 / config.c)
            .max_iterations(u64::try_from(config.max_iterations).unwrap_or(u64::MAX))
            .fit(&dataset)
            .map_err(|e| CardioError::DataQuality(format!("logistic regression failed: {e}")))?;

        if fitted.params().iter().any(|b| !b.is_finite()) || !fitted.intercept().is_finite() {
            return Err(CardioError::NonFinite("logistic coefficients".into()));
        }
        Ok(Self { fitted })
    }

    /// Probability of disease for each row
    fn probabilities(&self, x: &Array2<f64>) -> Array1<f64> {
        let positive = self.fitted.predict_probabilities(x);
        if self.fitted.labels().pos.class {
            positive
        } else {
            positive.mapv(|p| 1.0 - p)
        }
    }

    fn predict(&self, x: &Array2<f64>) -> Vec<bool> {
        let predicted: Array1<bool> = self.fitted.predict(x);
        predicted.to_vec()
    }

    fn weights(&self) -> &Array1<f64> {
        self.fitted.params()
    }
}

#[allow(clippy::cast_precision_loss)]
fn accuracy(predicted: &[bool], truth: &[bool]) -> f64 {
    let correct = predicted.iter().zip(truth).filter(|(p, t)| p == t).count();
    correct as f64 / truth.len() as f64
}

/// Area under the ROC curve via the rank-sum statistic, ties averaged
///
/// `None` unless both classes are present.
#[allow(clippy::cast_precision_loss)]
fn roc_auc(scores: &[f64], labels: &[bool]) -> Option<f64> {
    let n_pos = labels.iter().filter(|&&l| l).count();
    let n_neg = labels.len() - n_pos;
    if n_pos == 0 || n_neg == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut ranks = vec![0.0; scores.len()];
    let mut i = 0;
    while i < order.len() {
        let mut j = i;
        while j + 1 < order.len() && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // 1-based average rank of the tie block
        let rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            ranks[idx] = rank;
        }
        i = j + 1;
    }

    let pos_rank_sum: f64 = ranks
        .iter()
        .zip(labels)
        .filter(|(_, &l)| l)
        .map(|(r, _)| r)
        .sum();
    let (n_pos, n_neg) = (n_pos as f64, n_neg as f64);
    Some((pos_rank_sum - n_pos * (n_pos + 1.0) / 2.0) / (n_pos * n_neg))
}

/// Split each class separately so both partitions keep the class balance
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
fn stratified_split(
    labels: &[bool],
    test_fraction: f64,
    rng: &mut StdRng,
) -> (Vec<usize>, Vec<usize>) {
    let mut train = Vec::new();
    let mut test = Vec::new();

    for class in [false, true] {
        let mut members: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, &l)| l == class)
            .map(|(i, _)| i)
            .collect();
        members.shuffle(rng);
        let n_test = ((members.len() as f64) * test_fraction).round() as usize;
        test.extend_from_slice(&members[..n_test]);
        train.extend_from_slice(&members[n_test..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    (train, test)
}

/// Fold id per row, dealing each class round-robin after a shuffle
fn stratified_folds(labels: &[bool], k: usize, rng: &mut StdRng) -> Vec<usize> {
    let mut folds = vec![0; labels.len()];
    for class in [false, true] {
        let mut members: Vec<usize> = labels
            .iter()
            .enumerate()
            .filter(|(_, &l)| l == class)
            .map(|(i, _)| i)
            .collect();
        members.shuffle(rng);
        for (position, &row) in members.iter().enumerate() {
            folds[row] = position % k;
        }
    }
    folds
}

/// Fit scaler and model on the training rows, return accuracy on the held-out rows
fn fit_and_score(
    x_train: &Array2<f64>,
    y_train: &[bool],
    x_test: &Array2<f64>,
    y_test: &[bool],
    config: &ClassificationConfig,
) -> Result<f64> {
    let scaler = Scaler::fit(x_train);
    let model = LogisticModel::fit(&scaler.transform(x_train), y_train, config)?;
    Ok(accuracy(&model.predict(&scaler.transform(x_test)), y_test))
}

fn count_positive(labels: &[bool]) -> usize {
    labels.iter().filter(|&&l| l).count()
}

/// Evaluate whether risk factors predict disease better than the majority class
///
/// # Errors
/// Returns `DataQuality` for any missing feature or label, `LabelDegenerate`
/// when only one class is present, and `DataInsufficient` when a class is
/// too small to populate every fold and the test partition
#[allow(clippy::cast_precision_loss, clippy::too_many_lines)]
pub fn evaluate_classifier(
    records: &[PatientRecord],
    config: &ClassificationConfig,
    seed: u64,
    alpha: f64,
) -> Result<ClassificationResult> {
    let matrix =
        FeatureMatrix::from_records(records, &CLASSIFICATION_FEATURES, MissingPolicy::Fail)?;
    let labels = labels_for(records, &matrix.row_indices)?;

    let n = labels.len();
    let positives = count_positive(&labels);
    if positives == 0 || positives == n {
        return Err(CardioError::LabelDegenerate(format!(
            "all {n} records share one cardio label"
        )));
    }
    let baseline = positives.max(n - positives) as f64 / n as f64;

    let x = matrix.to_array()?;
    let k = config.cv_folds;
    let mut rng = StdRng::seed_from_u64(seed);
    let (train_rows, test_rows) = stratified_split(&labels, config.test_fraction, &mut rng);

    let y_train: Vec<bool> = train_rows.iter().map(|&i| labels[i]).collect();
    let y_test: Vec<bool> = test_rows.iter().map(|&i| labels[i]).collect();

    let train_pos = count_positive(&y_train);
    let test_pos = count_positive(&y_test);
    if train_pos.min(y_train.len() - train_pos) < k {
        return Err(CardioError::DataInsufficient(format!(
            "each class needs at least {k} training records for {k}-fold cross-validation"
        )));
    }
    if test_pos == 0 || test_pos == y_test.len() {
        return Err(CardioError::DataInsufficient(
            "test partition must contain both classes".into(),
        ));
    }

    let x_train = x.select(Axis(0), &train_rows);
    let x_test = x.select(Axis(0), &test_rows);

    let folds = stratified_folds(&y_train, k, &mut rng);
    let mut fold_accuracies = Vec::with_capacity(k);
    for fold in 0..k {
        let (held, kept): (Vec<usize>, Vec<usize>) =
            (0..y_train.len()).partition(|&i| folds[i] == fold);
        let acc = fit_and_score(
            &x_train.select(Axis(0), &kept),
            &kept.iter().map(|&i| y_train[i]).collect::<Vec<_>>(),
            &x_train.select(Axis(0), &held),
            &held.iter().map(|&i| y_train[i]).collect::<Vec<_>>(),
            config,
        )?;
        debug!(fold, accuracy = acc, "cross-validation fold");
        fold_accuracies.push(acc);
    }

    let cv_mean = mean(&fold_accuracies).unwrap_or(0.0);
    let cv_std = sample_std(&fold_accuracies).unwrap_or(0.0);
    let (p_value, cohens_d) = if cv_std > 0.0 {
        let t = (cv_mean - baseline) / (cv_std / (k as f64).sqrt());
        (
            finite("p_value", t_sf(t, (k - 1) as f64)?)?,
            Some(finite("cohens_d", (cv_mean - baseline) / cv_std)?),
        )
    } else if cv_mean > baseline {
        (0.0, None)
    } else {
        (1.0, None)
    };

    let scaler = Scaler::fit(&x_train);
    let model = LogisticModel::fit(&scaler.transform(&x_train), &y_train, config)?;
    let x_test_scaled = scaler.transform(&x_test);
    let scores = model.probabilities(&x_test_scaled).to_vec();
    let predicted = model.predict(&x_test_scaled);

    let test_accuracy = accuracy(&predicted, &y_test);
    let roc_auc = roc_auc(&scores, &y_test)
        .ok_or_else(|| CardioError::DataInsufficient("ROC-AUC needs both classes".into()))?;

    let z = z_critical(CONFIDENCE_LEVEL)?;
    let margin = z * (test_accuracy * (1.0 - test_accuracy) / y_test.len() as f64).sqrt();
    let ci = (
        finite("ci_lower", (test_accuracy - margin).max(0.0))?,
        finite("ci_upper", (test_accuracy + margin).min(1.0))?,
    );

    let is_significantly_better = p_value < alpha && ci.0 > baseline;

    let mut ranked: Vec<PredictorImportance> = matrix
        .features
        .iter()
        .zip(model.weights().iter())
        .map(|(feature, w)| PredictorImportance {
            name: feature.name().to_string(),
            coefficient_magnitude: w.abs(),
        })
        .collect();
    ranked.sort_by(|a, b| b.coefficient_magnitude.total_cmp(&a.coefficient_magnitude));
    ranked.truncate(config.top_predictors);

    info!(
        baseline,
        cv_mean, test_accuracy, roc_auc, p_value, is_significantly_better, "classification evaluated"
    );

    Ok(ClassificationResult {
        schema_version: SCHEMA_VERSION,
        features: matrix.features.clone(),
        train_size: train_rows.len(),
        test_size: test_rows.len(),
        baseline_accuracy: baseline,
        conclusion: conclusion(is_significantly_better, baseline, test_accuracy, ci, p_value),
        cv_fold_accuracies: fold_accuracies,
        cv_accuracy_mean: finite("cv_accuracy_mean", cv_mean)?,
        cv_accuracy_std: finite("cv_accuracy_std", cv_std)?,
        test_accuracy,
        accuracy_95_ci: ci,
        roc_auc: finite("roc_auc", roc_auc)?,
        p_value,
        cohens_d,
        is_significantly_better,
        most_important_predictors: ranked,
    })
}

fn conclusion(
    significant: bool,
    baseline: f64,
    test_accuracy: f64,
    ci: (f64, f64),
    p_value: f64,
) -> String {
    if significant {
        format!(
            "Reject null hypothesis: the model predicts cardiovascular disease significantly better than chance \
             (test accuracy {:.1}%, 95% CI {:.1}% to {:.1}%, baseline {:.1}%, p = {p_value:.4}).",
            test_accuracy * 100.0,
            ci.0 * 100.0,
            ci.1 * 100.0,
            baseline * 100.0
        )
    } else {
        format!(
            "Fail to reject null hypothesis: the model is not significantly better than the {:.1}% baseline \
             (p = {p_value:.4}, CI lower bound {:.1}%).",
            baseline * 100.0,
            ci.0 * 100.0
        )
    }
}
