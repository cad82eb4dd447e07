// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Evaluation and training for facial-expression classifiers
//!
//! This crate provides:
//! - Dataset loading (PGM/PNG/JPEG class directories, JSON Lines, synthetic faces)
//! - Seeded train/validation/test splitting
//! - Classifiers (nearest centroid, one-hidden-layer MLP)
//! - Metrics (MSE, confusion matrix, classification report)
//! - Multi-class one-vs-rest ROC curves with per-class AUC
//! - Figure rendering to SVG
//! - A model evaluator keyed by model-type and feature-algorithm tags
//! - A training driver with a labelled test gallery

pub mod datasets;
pub mod evaluator;
pub mod figure;
pub mod metrics;
pub mod models;
pub mod reduction;
pub mod roc;
pub mod training;

pub use datasets::{DataSplits, Dataset, DatasetConfig, FaceSample};
pub use evaluator::{EvaluationRecord, EvaluationReport, Evaluator, FeatureAlgorithm, LabelSource, ModelType};
pub use figure::{Figure, FigureSink, MemorySink, SvgDirectorySink};
pub use metrics::{ClassificationReport, ConfusionMatrix};
pub use models::{Classifier, Mlp, MlpParams, NearestCentroid};
pub use reduction::{DimensionalityReducer, IdentityReducer};
pub use roc::{plot_roc, MulticlassRoc};
pub use training::{TrainingConfig, TrainingDriver, TrainingResults};
