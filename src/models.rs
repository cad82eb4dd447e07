// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Classifiers for flattened face images
//!
//! Implements:
//! - Nearest centroid (decision scores are negative squared distances)
//! - Multi-layer perceptron with one ReLU hidden layer and softmax output
//!
//! Capabilities a model lacks (flat decision scores, rank-3 input) are
//! reported as errors that propagate to the caller.

use crate::metrics::{argmax_rows, class_count, to_categorical};
use anyhow::{bail, ensure, Context, Result};
use ndarray::{Array1, Array2, Array3, Axis};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Trait for all trainable classifiers
pub trait Classifier: Send + Sync {
    /// Train on one feature row per sample
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<()>;

    /// Hard class predictions
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>>;

    /// Continuous per-class scores, one row per sample
    fn decision_function(&self, _x: &Array2<f64>) -> Result<Array2<f64>> {
        bail!("{} does not provide a decision function", self.name())
    }

    /// Per-class scores for input shaped `(samples, channels, features)`
    fn predict_scores(&self, _x: &Array3<f64>) -> Result<Array2<f64>> {
        bail!("{} does not accept (samples, channels, features) input", self.name())
    }

    /// Get model name
    fn name(&self) -> &str;

    /// Get model description
    fn description(&self) -> &str;
}

/// Validate a training set and return the class count (`max(label) + 1`)
fn check_training_set(x: &Array2<f64>, y: &[usize]) -> Result<usize> {
    ensure!(x.nrows() > 0, "cannot fit on an empty training set");
    ensure!(
        x.nrows() == y.len(),
        "{} feature rows given for {} labels",
        x.nrows(),
        y.len()
    );
    class_count(y)
}

fn check_feature_count(expected: usize, x: &Array2<f64>) -> Result<()> {
    ensure!(
        x.ncols() == expected,
        "model was fitted on {} features but input has {}",
        expected,
        x.ncols()
    );
    Ok(())
}

/// Merge the channel and feature axes of a rank-3 input
fn flatten_channels(x: &Array3<f64>) -> Result<Array2<f64>> {
    let (n, channels, features) = x.dim();
    x.as_standard_layout()
        .into_owned()
        .into_shape((n, channels * features))
        .context("Failed to flatten rank-3 input")
}

/// Nearest-centroid classifier
#[derive(Debug, Clone, Default)]
pub struct NearestCentroid {
    centroids: Option<Array2<f64>>,
    /// Classes seen during training; unseen classes never win
    present: Vec<bool>,
}

impl NearestCentroid {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Classifier for NearestCentroid {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<()> {
        let n_classes = check_training_set(x, y)?;
        let mut centroids = Array2::<f64>::zeros((n_classes, x.ncols()));
        let mut counts = vec![0usize; n_classes];

        for (row, &label) in x.rows().into_iter().zip(y.iter()) {
            let mut centroid = centroids.row_mut(label);
            centroid += &row;
            counts[label] += 1;
        }
        for (mut centroid, &count) in centroids.rows_mut().into_iter().zip(counts.iter()) {
            if count > 0 {
                centroid.mapv_inplace(|v| v / count as f64);
            }
        }

        tracing::debug!("Nearest centroid fitted: {} classes, {} features", n_classes, x.ncols());
        self.present = counts.iter().map(|&c| c > 0).collect();
        self.centroids = Some(centroids);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let scores = self.decision_function(x)?;
        Ok(argmax_rows(scores.view()))
    }

    fn decision_function(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let centroids = self.centroids.as_ref().context("Nearest centroid is not fitted")?;
        check_feature_count(centroids.ncols(), x)?;

        Ok(Array2::from_shape_fn((x.nrows(), centroids.nrows()), |(i, k)| {
            if !self.present[k] {
                return f64::NEG_INFINITY;
            }
            let dist: f64 = x
                .row(i)
                .iter()
                .zip(centroids.row(k).iter())
                .map(|(a, b)| (a - b) * (a - b))
                .sum();
            -dist
        }))
    }

    fn name(&self) -> &str {
        "NearestCentroid"
    }

    fn description(&self) -> &str {
        "Assigns each face to the class with the closest mean image"
    }
}

/// Hyper-parameters for [`Mlp`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MlpParams {
    pub hidden_units: usize,
    pub epochs: usize,
    pub learning_rate: f64,
    /// L2 penalty
    pub alpha: f64,
    pub seed: u64,
}

impl Default for MlpParams {
    fn default() -> Self {
        Self {
            hidden_units: 64,
            epochs: 300,
            learning_rate: 0.2,
            alpha: 1e-4,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone)]
struct MlpWeights {
    w1: Array2<f64>,
    b1: Array1<f64>,
    w2: Array2<f64>,
    b2: Array1<f64>,
}

/// One-hidden-layer perceptron trained by full-batch gradient descent
#[derive(Debug, Clone)]
pub struct Mlp {
    params: MlpParams,
    weights: Option<MlpWeights>,
}

impl Mlp {
    pub fn new(params: MlpParams) -> Self {
        Self { params, weights: None }
    }

    fn fitted(&self) -> Result<&MlpWeights> {
        self.weights.as_ref().context("MLP is not fitted")
    }

    fn probabilities(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let weights = self.fitted()?;
        check_feature_count(weights.w1.nrows(), x)?;
        Ok(forward(weights, x).1)
    }
}

impl Default for Mlp {
    fn default() -> Self {
        Self::new(MlpParams::default())
    }
}

/// Glorot-uniform initialisation
fn init_layer(rng: &mut ChaCha8Rng, fan_in: usize, fan_out: usize) -> Array2<f64> {
    let limit = (6.0 / (fan_in + fan_out) as f64).sqrt();
    Array2::from_shape_fn((fan_in, fan_out), |_| rng.gen_range(-limit..limit))
}

fn softmax_rows(mut logits: Array2<f64>) -> Array2<f64> {
    for mut row in logits.rows_mut() {
        let max = row.fold(f64::NEG_INFINITY, |acc, &v| acc.max(v));
        row.mapv_inplace(|v| (v - max).exp());
        let sum = row.sum();
        row.mapv_inplace(|v| v / sum);
    }
    logits
}

/// Returns (hidden activations, class probabilities)
fn forward(weights: &MlpWeights, x: &Array2<f64>) -> (Array2<f64>, Array2<f64>) {
    let hidden = (x.dot(&weights.w1) + &weights.b1).mapv(|v| v.max(0.0));
    let logits = hidden.dot(&weights.w2) + &weights.b2;
    (hidden, softmax_rows(logits))
}

fn cross_entropy(probs: &Array2<f64>, target: &Array2<f64>) -> f64 {
    let total: f64 = probs
        .iter()
        .zip(target.iter())
        .filter(|&(_, &t)| t > 0.0)
        .map(|(&p, _)| -(p.max(1e-12)).ln())
        .sum();
    total / probs.nrows().max(1) as f64
}

impl Classifier for Mlp {
    fn fit(&mut self, x: &Array2<f64>, y: &[usize]) -> Result<()> {
        let n_classes = check_training_set(x, y)?;
        ensure!(self.params.hidden_units > 0, "MLP needs at least one hidden unit");

        let (n, d) = x.dim();
        let h = self.params.hidden_units;
        let lr = self.params.learning_rate;
        let alpha = self.params.alpha;

        let mut rng = ChaCha8Rng::seed_from_u64(self.params.seed);
        let mut weights = MlpWeights {
            w1: init_layer(&mut rng, d, h),
            b1: Array1::zeros(h),
            w2: init_layer(&mut rng, h, n_classes),
            b2: Array1::zeros(n_classes),
        };
        let target = to_categorical(y)?;

        for epoch in 0..self.params.epochs {
            let (hidden, probs) = forward(&weights, x);
            if epoch % 50 == 0 {
                tracing::debug!("MLP epoch {}: loss {:.4}", epoch, cross_entropy(&probs, &target));
            }

            let delta_out = (&probs - &target) / n as f64;
            let grad_w2 = hidden.t().dot(&delta_out) + &(&weights.w2 * alpha);
            let grad_b2 = delta_out.sum_axis(Axis(0));

            let mut delta_hidden = delta_out.dot(&weights.w2.t());
            delta_hidden.zip_mut_with(&hidden, |g, &a| {
                if a <= 0.0 {
                    *g = 0.0;
                }
            });
            let grad_w1 = x.t().dot(&delta_hidden) + &(&weights.w1 * alpha);
            let grad_b1 = delta_hidden.sum_axis(Axis(0));

            weights.w2.scaled_add(-lr, &grad_w2);
            weights.b2.scaled_add(-lr, &grad_b2);
            weights.w1.scaled_add(-lr, &grad_w1);
            weights.b1.scaled_add(-lr, &grad_b1);
        }

        let (_, probs) = forward(&weights, x);
        tracing::info!(
            "MLP fitted: {} samples, {} features, {} classes, final loss {:.4}",
            n,
            d,
            n_classes,
            cross_entropy(&probs, &target)
        );

        self.weights = Some(weights);
        Ok(())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<usize>> {
        let probs = self.probabilities(x)?;
        Ok(argmax_rows(probs.view()))
    }

    fn decision_function(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.probabilities(x)
    }

    fn predict_scores(&self, x: &Array3<f64>) -> Result<Array2<f64>> {
        let flat = flatten_channels(x)?;
        self.probabilities(&flat)
    }

    fn name(&self) -> &str {
        "MLP"
    }

    fn description(&self) -> &str {
        "Perceptron with one ReLU hidden layer and softmax output"
    }
}

/// Names accepted by [`classifier_by_name`]
pub const CLASSIFIER_NAMES: [&str; 2] = ["mlp", "centroid"];

/// Build an untrained classifier from its CLI name
pub fn classifier_by_name(name: &str, params: &MlpParams) -> Result<Box<dyn Classifier>> {
    match name.to_lowercase().as_str() {
        "mlp" => Ok(Box::new(Mlp::new(params.clone()))),
        "centroid" | "nearest-centroid" => Ok(Box::new(NearestCentroid::new())),
        other => bail!("unknown classifier '{}' (expected one of {:?})", other, CLASSIFIER_NAMES),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::{accuracy, MAX_CLASSES};
    use ndarray::array;

    #[test]
    fn test_fit_rejects_labels_past_class_limit() {
        let x = array![[0.0, 1.0], [1.0, 0.0]];
        let huge = [0, 1_000_000_000_000_000_000];

        assert!(NearestCentroid::new().fit(&x, &huge).is_err());
        assert!(Mlp::default().fit(&x, &[0, MAX_CLASSES]).is_err());
    }

    /// Three jittered clusters in the unit square
    fn clusters() -> (Array2<f64>, Vec<usize>) {
        let centers = [(0.1, 0.1), (0.9, 0.9), (0.1, 0.9)];
        let mut rows = Vec::new();
        let mut labels = Vec::new();
        for (label, &(cx, cy)) in centers.iter().enumerate() {
            for j in 0..10 {
                let jitter = (j as f64 - 4.5) * 0.01;
                rows.push(cx + jitter);
                rows.push(cy - jitter);
                labels.push(label);
            }
        }
        (Array2::from_shape_vec((labels.len(), 2), rows).unwrap(), labels)
    }

    #[test]
    fn test_nearest_centroid_separates_clusters() {
        let (x, y) = clusters();
        let mut model = NearestCentroid::new();
        model.fit(&x, &y).unwrap();

        let preds = model.predict(&x).unwrap();
        assert_eq!(preds, y);

        let scores = model.decision_function(&x).unwrap();
        assert_eq!(scores.dim(), (30, 3));
        assert!(scores.iter().all(|s| *s <= 0.0));
    }

    #[test]
    fn test_nearest_centroid_skips_unseen_classes() {
        let x = array![[0.0, 0.0], [1.0, 1.0]];
        let mut model = NearestCentroid::new();
        model.fit(&x, &[0, 2]).unwrap();

        let scores = model.decision_function(&x).unwrap();
        assert_eq!(scores.ncols(), 3);
        assert!(scores[[0, 1]].is_infinite());
        assert_eq!(model.predict(&x).unwrap(), vec![0, 2]);
    }

    #[test]
    fn test_nearest_centroid_has_no_tensor_scores() {
        let (x, y) = clusters();
        let mut model = NearestCentroid::new();
        model.fit(&x, &y).unwrap();

        let err = model.predict_scores(&Array3::zeros((2, 1, 2))).unwrap_err();
        assert!(err.to_string().contains("NearestCentroid"));
    }

    #[test]
    fn test_unfitted_models_fail() {
        let x = array![[0.0, 1.0]];
        assert!(NearestCentroid::new().predict(&x).is_err());
        assert!(Mlp::default().predict(&x).is_err());
    }

    #[test]
    fn test_feature_count_mismatch_fails() {
        let (x, y) = clusters();
        let mut model = NearestCentroid::new();
        model.fit(&x, &y).unwrap();
        assert!(model.predict(&array![[0.0, 1.0, 2.0]]).is_err());
    }

    #[test]
    fn test_mlp_learns_clusters() {
        let (x, y) = clusters();
        let mut model = Mlp::new(MlpParams {
            hidden_units: 16,
            epochs: 800,
            learning_rate: 0.5,
            alpha: 0.0,
            seed: 7,
        });
        model.fit(&x, &y).unwrap();

        let preds = model.predict(&x).unwrap();
        assert!(accuracy(&y, &preds).unwrap() >= 0.9);

        let probs = model.decision_function(&x).unwrap();
        for row in probs.rows() {
            assert!((row.sum() - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_mlp_tensor_scores_match_flat_scores() {
        let (x, y) = clusters();
        let mut model = Mlp::new(MlpParams {
            hidden_units: 8,
            epochs: 20,
            ..MlpParams::default()
        });
        model.fit(&x, &y).unwrap();

        let tensor = x.clone().into_shape((30, 1, 2)).unwrap();
        let from_tensor = model.predict_scores(&tensor).unwrap();
        let from_flat = model.decision_function(&x).unwrap();
        assert_eq!(from_tensor, from_flat);
    }

    #[test]
    fn test_mlp_is_reproducible_for_a_seed() {
        let (x, y) = clusters();
        let params = MlpParams {
            hidden_units: 8,
            epochs: 10,
            ..MlpParams::default()
        };
        let mut a = Mlp::new(params.clone());
        let mut b = Mlp::new(params);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.decision_function(&x).unwrap(), b.decision_function(&x).unwrap());
    }

    #[test]
    fn test_classifier_by_name() {
        let params = MlpParams::default();
        assert_eq!(classifier_by_name("mlp", &params).unwrap().name(), "MLP");
        assert_eq!(classifier_by_name("Centroid", &params).unwrap().name(), "NearestCentroid");
        assert!(classifier_by_name("svm", &params).is_err());
    }
}
