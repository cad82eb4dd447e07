// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Evaluation of a trained classifier on a test split
//!
//! The model-type tag selects how scores are obtained:
//! - `cnn`: the test rows are reshaped to `(samples, 1, features)` where the
//!   feature length is fixed by the algorithm tag (`eigenfaces` or
//!   `fisherfaces`), and the model scores the tensor
//! - `svm`, `adaboost`, `mlp`: hard predictions from `predict`, scores from
//!   `decision_function`
//!
//! Unknown tags print a diagnostic and produce no metrics.

use crate::metrics::{argmax_rows, mean_squared_error, to_categorical, ClassificationReport, ConfusionMatrix};
use crate::models::Classifier;
use crate::roc::{plot_roc, MulticlassRoc};
use crate::training::TrainingConfig;
use anyhow::{ensure, Context, Result};
use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

pub const INVALID_MODEL_TYPE: &str = "ERROR: invalid model type!";
pub const INVALID_ALGORITHM: &str = "ERROR: invalid algorithm for CNN!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    Cnn,
    Svm,
    AdaBoost,
    Mlp,
}

impl ModelType {
    /// Exact, case-sensitive tag match
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "cnn" => Some(Self::Cnn),
            "svm" => Some(Self::Svm),
            "adaboost" => Some(Self::AdaBoost),
            "mlp" => Some(Self::Mlp),
            _ => None,
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Self::Cnn => "cnn",
            Self::Svm => "svm",
            Self::AdaBoost => "adaboost",
            Self::Mlp => "mlp",
        }
    }
}

/// Feature-extraction tag; only decides the per-sample feature length
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FeatureAlgorithm {
    Eigenfaces,
    Fisherfaces,
}

impl FeatureAlgorithm {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "eigenfaces" => Some(Self::Eigenfaces),
            "fisherfaces" => Some(Self::Fisherfaces),
            _ => None,
        }
    }

    pub fn feature_len(&self) -> usize {
        match self {
            Self::Eigenfaces => 625,
            Self::Fisherfaces => 6,
        }
    }
}

/// Which label vector the metrics were scored against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelSource {
    /// The integer labels as given
    Raw,
    /// Arg-max of the one-hot encoded labels (fisherfaces branch)
    OneHotArgmax,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvaluationReport {
    pub model_name: String,
    pub model_type: ModelType,
    pub algorithm: Option<FeatureAlgorithm>,
    pub label_source: LabelSource,
    pub samples: usize,
    pub mse: f64,
    pub confusion_matrix: ConfusionMatrix,
    pub classification_report: ClassificationReport,
    pub roc: MulticlassRoc,
    pub y_true: Vec<usize>,
    pub y_pred: Vec<usize>,
}

/// Evaluation report plus the run that produced it
#[derive(Debug, Clone, Serialize)]
pub struct EvaluationRecord {
    pub config: TrainingConfig,
    pub report: EvaluationReport,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl EvaluationRecord {
    pub fn new(config: TrainingConfig, report: EvaluationReport) -> Self {
        Self {
            config,
            report,
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Save as pretty JSON; undefined ROC areas serialize as null
    pub fn save(&self, path: &Path) -> Result<()> {
        std::fs::create_dir_all(path.parent().unwrap_or(Path::new(".")))?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!("Evaluation saved to {}", path.display());
        Ok(())
    }
}

/// Prints metrics to `out` and shows the ROC figure on `figures`
pub struct Evaluator<W: Write, S: crate::figure::FigureSink> {
    out: W,
    figures: S,
}

impl<W: Write, S: crate::figure::FigureSink> Evaluator<W, S> {
    pub fn new(out: W, figures: S) -> Self {
        Self { out, figures }
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn figures(&self) -> &S {
        &self.figures
    }

    /// Evaluate `model` on the test split.
    ///
    /// `Ok(None)` means the tags were rejected: a diagnostic was printed and
    /// neither metrics nor a figure were produced.
    pub fn evaluate(
        &mut self,
        model: &dyn Classifier,
        model_type: &str,
        test: &Array2<f64>,
        labels: &[usize],
        algorithm: Option<&str>,
    ) -> Result<Option<EvaluationReport>> {
        let Some(kind) = ModelType::from_tag(model_type) else {
            tracing::warn!("Rejected model type '{}'", model_type);
            writeln!(self.out, "{}", INVALID_MODEL_TYPE)?;
            return Ok(None);
        };

        tracing::info!("Evaluating {} as {} on {} samples", model.name(), kind.tag(), labels.len());

        let report = match kind {
            ModelType::Cnn => {
                let Some(algorithm) = algorithm.and_then(FeatureAlgorithm::from_tag) else {
                    tracing::warn!("Rejected algorithm {:?} for cnn", algorithm);
                    writeln!(self.out, "{}", INVALID_ALGORITHM)?;
                    return Ok(None);
                };
                self.evaluate_tensor(model, algorithm, test, labels)?
            }
            ModelType::Svm | ModelType::AdaBoost | ModelType::Mlp => self.evaluate_flat(model, kind, test, labels)?,
        };

        Ok(Some(report))
    }

    fn evaluate_tensor(
        &mut self,
        model: &dyn Classifier,
        algorithm: FeatureAlgorithm,
        test: &Array2<f64>,
        labels: &[usize],
    ) -> Result<EvaluationReport> {
        let width = algorithm.feature_len();
        let total = test.len();
        ensure!(
            total % width == 0,
            "cannot reshape {} test values into rows of {} features",
            total,
            width
        );
        let tensor = test
            .as_standard_layout()
            .into_owned()
            .into_shape((total / width, 1, width))?;

        let one_hot = to_categorical(labels)?;
        tracing::debug!("Test tensor {:?}, one-hot labels {:?}", tensor.dim(), one_hot.dim());

        let scores = model.predict_scores(&tensor)?;
        let roc = plot_roc(labels, scores.view(), &mut self.figures)?;
        let y_pred = argmax_rows(scores.view());

        let (y_true, label_source) = match algorithm {
            // The encoding above is unused here: eigenfaces scores raw labels
            FeatureAlgorithm::Eigenfaces => (labels.to_vec(), LabelSource::Raw),
            FeatureAlgorithm::Fisherfaces => (argmax_rows(one_hot.view()), LabelSource::OneHotArgmax),
        };

        self.report(model, ModelType::Cnn, Some(algorithm), label_source, y_true, y_pred, roc)
    }

    fn evaluate_flat(
        &mut self,
        model: &dyn Classifier,
        kind: ModelType,
        test: &Array2<f64>,
        labels: &[usize],
    ) -> Result<EvaluationReport> {
        let y_pred = model.predict(test)?;
        let scores = model.decision_function(test)?;
        let roc = plot_roc(labels, scores.view(), &mut self.figures)?;

        self.report(model, kind, None, LabelSource::Raw, labels.to_vec(), y_pred, roc)
    }

    #[allow(clippy::too_many_arguments)]
    fn report(
        &mut self,
        model: &dyn Classifier,
        kind: ModelType,
        algorithm: Option<FeatureAlgorithm>,
        label_source: LabelSource,
        y_true: Vec<usize>,
        y_pred: Vec<usize>,
        roc: MulticlassRoc,
    ) -> Result<EvaluationReport> {
        let tag = kind.tag();
        let mse = mean_squared_error(&y_true, &y_pred)?;
        let confusion_matrix = ConfusionMatrix::from_predictions(&y_true, &y_pred)?;
        let classification_report = ClassificationReport::from_confusion_matrix(&confusion_matrix);

        write!(self.out, "\nModel Evaluations:\n\n")?;
        write!(self.out, "{} mse: {:?} \n\n", tag, mse)?;
        write!(self.out, "{} confusion matrix:\n {} \n\n", tag, confusion_matrix)?;
        write!(self.out, "{} classification report:\n {} \n\n", tag, classification_report)?;
        self.out.flush()?;

        tracing::info!(
            "{} - MSE: {:.4}, Accuracy: {:.4}",
            tag,
            mse,
            classification_report.accuracy
        );

        Ok(EvaluationReport {
            model_name: model.name().to_string(),
            model_type: kind,
            algorithm,
            label_source,
            samples: y_true.len(),
            mse,
            confusion_matrix,
            classification_report,
            roc,
            y_true,
            y_pred,
        })
    }
}
