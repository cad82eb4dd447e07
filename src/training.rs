// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Training driver for facial-expression classifiers
//!
//! Orchestrates:
//! - Dataset loading (synthetic, image class directories or JSON Lines)
//! - Seeded 80/10/10 splitting
//! - Feature reduction fitted on the training split
//! - Classifier training, validation and test reporting
//! - A gallery of test faces with predicted and true labels
//! - Results serialization

use crate::datasets::{DataSplits, Dataset};
use crate::figure::{Figure, FigureSink, ImageFigure};
use crate::metrics::{accuracy, ClassificationReport, ConfusionMatrix};
use crate::models::{classifier_by_name, Classifier, MlpParams};
use crate::reduction::{DimensionalityReducer, IdentityReducer};
use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;

/// Configuration shared by the training driver and the evaluator CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Random seed for reproducibility
    pub seed: u64,
    /// Dataset to train on ("synthetic" or a name for data on disk)
    pub dataset_id: String,
    /// Path to a dataset directory or JSON Lines file
    pub dataset_path: Option<String>,
    /// Number of samples for the synthetic dataset
    pub synthetic_samples: usize,
    /// Classifier name (mlp, centroid)
    pub classifier: String,
    pub mlp: MlpParams,
    /// Number of test faces shown after training
    pub gallery_size: usize,
    /// Output directory for results
    pub output_dir: String,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            dataset_id: "synthetic".to_string(),
            dataset_path: None,
            synthetic_samples: 400,
            classifier: "mlp".to_string(),
            mlp: MlpParams::default(),
            gallery_size: 20,
            output_dir: "eval/results".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub id: String,
    pub name: String,
    pub total_samples: usize,
    pub train_samples: usize,
    pub validation_samples: usize,
    pub test_samples: usize,
    pub image_width: usize,
    pub image_height: usize,
    pub class_names: Vec<String>,
    /// Class index -> count over the test split
    pub label_distribution: BTreeMap<usize, usize>,
}

/// One face shown in the gallery
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GalleryEntry {
    pub index: usize,
    pub predicted: usize,
    pub actual: usize,
    pub correct: bool,
}

/// Complete training results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingResults {
    pub config: TrainingConfig,
    pub dataset_info: DatasetInfo,
    pub reducer: String,
    pub classifier_name: String,
    pub classifier_description: String,
    pub validation_accuracy: f64,
    pub test_report: ClassificationReport,
    pub test_confusion: ConfusionMatrix,
    pub gallery: Vec<GalleryEntry>,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

/// Splits after reduction, with the raw splits kept for display
pub struct PreparedData {
    pub dataset_info: DatasetInfo,
    pub splits: DataSplits,
    pub train_x: Array2<f64>,
    pub val_x: Array2<f64>,
    pub test_x: Array2<f64>,
}

pub struct TrainingDriver {
    config: TrainingConfig,
    reducer: Box<dyn DimensionalityReducer>,
}

impl TrainingDriver {
    pub fn new(config: TrainingConfig) -> Self {
        Self {
            config,
            reducer: Box::new(IdentityReducer::new()),
        }
    }

    pub fn with_reducer(mut self, reducer: Box<dyn DimensionalityReducer>) -> Self {
        self.reducer = reducer;
        self
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Load dataset based on configuration
    pub fn load_dataset(&self) -> Result<Dataset> {
        let dataset = if self.config.dataset_id == "synthetic" {
            tracing::info!(
                "Loading synthetic dataset ({} samples, seed={})",
                self.config.synthetic_samples,
                self.config.seed
            );
            Dataset::load_synthetic(self.config.synthetic_samples, self.config.seed)
        } else if let Some(ref path) = self.config.dataset_path {
            let path = Path::new(path);
            tracing::info!("Loading {} dataset from {}", self.config.dataset_id, path.display());
            let mut dataset = Dataset::load_dataset(path)?;
            dataset.config.id = self.config.dataset_id.clone();
            dataset
        } else {
            tracing::warn!("No dataset path provided for {}, using synthetic dataset", self.config.dataset_id);
            Dataset::load_synthetic(self.config.synthetic_samples, self.config.seed)
        };

        tracing::info!(
            "Dataset loaded: {} samples, {} classes, {}x{} images",
            dataset.total_samples(),
            dataset.n_classes(),
            dataset.config.image_width,
            dataset.config.image_height
        );
        Ok(dataset)
    }

    /// Load, split and reduce. The reducer only sees the training split when fitting.
    pub fn prepare(&mut self) -> Result<PreparedData> {
        let dataset = self.load_dataset()?;
        let splits = dataset.split_data(self.config.seed)?;

        let dataset_info = DatasetInfo {
            id: dataset.config.id.clone(),
            name: dataset.config.name.clone(),
            total_samples: dataset.total_samples(),
            train_samples: splits.train_y.len(),
            validation_samples: splits.val_y.len(),
            test_samples: splits.test_y.len(),
            image_width: splits.image_width,
            image_height: splits.image_height,
            class_names: dataset.config.class_names.clone(),
            label_distribution: Dataset::label_distribution(&splits.test_y),
        };

        tracing::info!(
            "Split sizes: train={}, val={}, test={}",
            dataset_info.train_samples,
            dataset_info.validation_samples,
            dataset_info.test_samples
        );

        let train_x = self.reducer.fit_transform(&splits.train_x)?;
        let val_x = self.reducer.transform(&splits.val_x)?;
        let test_x = self.reducer.transform(&splits.test_x)?;
        tracing::info!("Reducer '{}': {} -> {} features", self.reducer.name(), splits.train_x.ncols(), train_x.ncols());

        Ok(PreparedData {
            dataset_info,
            splits,
            train_x,
            val_x,
            test_x,
        })
    }

    /// Build and fit the configured classifier
    pub fn fit_classifier(&self, x: &Array2<f64>, y: &[usize]) -> Result<Box<dyn Classifier>> {
        let mut classifier = classifier_by_name(&self.config.classifier, &self.config.mlp)?;
        tracing::info!("Training {} on {} samples", classifier.name(), y.len());
        classifier.fit(x, y)?;
        Ok(classifier)
    }

    /// Run the full training flow.
    ///
    /// Prints the validation accuracy and the test classification report to
    /// `out`, then shows the gallery on `sink`.
    pub fn run(&mut self, out: &mut dyn Write, sink: &mut dyn FigureSink) -> Result<TrainingResults> {
        let prepared = self.prepare()?;
        let classifier = self.fit_classifier(&prepared.train_x, &prepared.splits.train_y)?;

        let val_pred = classifier.predict(&prepared.val_x)?;
        let validation_accuracy = accuracy(&prepared.splits.val_y, &val_pred)?;
        writeln!(out, "Validation accuracy: {:?}", validation_accuracy)?;

        let test_pred = classifier.predict(&prepared.test_x)?;
        let test_confusion = ConfusionMatrix::from_predictions(&prepared.splits.test_y, &test_pred)?;
        let test_report = ClassificationReport::from_confusion_matrix(&test_confusion);
        writeln!(out, "{}", test_report)?;
        out.flush()?;

        tracing::info!(
            "{} - Validation accuracy: {:.4}, Test accuracy: {:.4}",
            classifier.name(),
            validation_accuracy,
            test_report.accuracy
        );

        let gallery = show_gallery(
            &prepared.splits.test_x,
            prepared.splits.image_width,
            prepared.splits.image_height,
            &test_pred,
            &prepared.splits.test_y,
            self.config.gallery_size,
            sink,
        )?;

        Ok(TrainingResults {
            config: self.config.clone(),
            dataset_info: prepared.dataset_info,
            reducer: self.reducer.name().to_string(),
            classifier_name: classifier.name().to_string(),
            classifier_description: classifier.description().to_string(),
            validation_accuracy,
            test_report,
            test_confusion,
            gallery,
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    /// Save results to JSON file
    pub fn save_results(results: &TrainingResults, output_path: &Path) -> Result<()> {
        std::fs::create_dir_all(output_path.parent().unwrap_or(Path::new(".")))?;
        let json = serde_json::to_string_pretty(results)?;
        std::fs::write(output_path, json)?;
        tracing::info!("Results saved to {}", output_path.display());
        Ok(())
    }

    /// Generate a markdown report
    pub fn generate_report(results: &TrainingResults) -> String {
        let mut report = String::new();

        report.push_str("# Facial Expression Training Report\n\n");
        report.push_str(&format!("**Generated:** {}\n\n", results.timestamp.format("%Y-%m-%d %H:%M:%S UTC")));
        report.push_str(&format!("**Version:** {}\n\n", results.version));

        let info = &results.dataset_info;
        report.push_str("## Dataset\n\n");
        report.push_str(&format!("- **ID:** {}\n", info.id));
        report.push_str(&format!("- **Name:** {}\n", info.name));
        report.push_str(&format!("- **Total Samples:** {}\n", info.total_samples));
        report.push_str(&format!(
            "- **Split Sizes:** Train={}, Val={}, Test={}\n",
            info.train_samples, info.validation_samples, info.test_samples
        ));
        report.push_str(&format!("- **Image Size:** {}x{}\n", info.image_width, info.image_height));
        report.push_str(&format!("- **Classes:** {}\n\n", info.class_names.join(", ")));

        report.push_str("## Model\n\n");
        report.push_str(&format!("- **Classifier:** {}\n", results.classifier_name));
        report.push_str(&format!("- **Description:** {}\n", results.classifier_description));
        report.push_str(&format!("- **Reducer:** {}\n\n", results.reducer));

        report.push_str("## Results\n\n");
        report.push_str(&format!("**Validation Accuracy:** {:.4}\n\n", results.validation_accuracy));
        report.push_str(&format!("**Test Accuracy:** {:.4}\n\n", results.test_report.accuracy));
        report.push_str("### Classification Report\n\n");
        report.push_str(&format!("```\n{}\n```\n\n", results.test_report.format()));
        report.push_str("### Confusion Matrix\n\n");
        report.push_str(&format!("```\n{}\n```\n\n", results.test_confusion));

        report.push_str("## Gallery\n\n");
        report.push_str("| # | Predicted | True | Correct |\n");
        report.push_str("|---|-----------|------|---------|\n");
        for entry in &results.gallery {
            let mark = if entry.correct { "yes" } else { "no" };
            report.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                entry.index,
                class_name(&info.class_names, entry.predicted),
                class_name(&info.class_names, entry.actual),
                mark
            ));
        }
        report.push('\n');

        report.push_str("## Configuration\n\n");
        report.push_str(&format!(
            "```json\n{}\n```\n",
            serde_json::to_string_pretty(&results.config).unwrap_or_default()
        ));

        report
    }
}

fn class_name(names: &[String], label: usize) -> String {
    names.get(label).cloned().unwrap_or_else(|| label.to_string())
}

/// Show the first `count` images in array order, titled with predicted and
/// true labels.
///
/// When fewer than `count` images exist, the available ones are shown and
/// an out-of-range error is returned.
pub fn show_gallery(
    images: &Array2<f64>,
    width: usize,
    height: usize,
    predicted: &[usize],
    actual: &[usize],
    count: usize,
    sink: &mut dyn FigureSink,
) -> Result<Vec<GalleryEntry>> {
    let mut entries = Vec::with_capacity(count);

    for index in 0..count {
        if index >= images.nrows() || index >= predicted.len() || index >= actual.len() {
            bail!(
                "gallery index {} out of range: only {} test samples available",
                index,
                images.nrows().min(predicted.len()).min(actual.len())
            );
        }

        sink.show(Figure::Image(ImageFigure {
            title: format!("Predicted: {}\nTrue: {}", predicted[index], actual[index]),
            width,
            height,
            pixels: images.row(index).to_vec(),
        }))?;

        entries.push(GalleryEntry {
            index,
            predicted: predicted[index],
            actual: actual[index],
            correct: predicted[index] == actual[index],
        });
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::figure::MemorySink;

    fn centroid_config(samples: usize) -> TrainingConfig {
        TrainingConfig {
            synthetic_samples: samples,
            classifier: "centroid".to_string(),
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn test_driver_synthetic() {
        let mut driver = TrainingDriver::new(centroid_config(300));
        let mut out: Vec<u8> = Vec::new();
        let mut sink = MemorySink::new();

        let results = driver.run(&mut out, &mut sink).expect("Training should succeed");

        assert_eq!(results.dataset_info.total_samples, 300);
        assert_eq!(results.dataset_info.test_samples, 30);
        assert_eq!(results.gallery.len(), 20);
        assert_eq!(sink.figures.len(), 20);
        assert!(results.validation_accuracy > 0.5);
        assert_eq!(results.test_report.support(), 30);
        assert_eq!(results.reducer, "identity");

        let printed = String::from_utf8(out).unwrap();
        assert!(printed.starts_with("Validation accuracy: "));
        assert!(printed.contains("macro avg"));
    }

    #[test]
    fn test_gallery_titles_follow_predictions() {
        let mut driver = TrainingDriver::new(centroid_config(250));
        let mut sink = MemorySink::new();
        let results = driver.run(&mut Vec::<u8>::new(), &mut sink).unwrap();

        for (figure, entry) in sink.figures.iter().zip(results.gallery.iter()) {
            let expected = format!("Predicted: {}\nTrue: {}", entry.predicted, entry.actual);
            assert_eq!(figure.title(), expected);
            assert!(matches!(figure, Figure::Image(img) if img.pixels.len() == 625));
        }
    }

    #[test]
    fn test_gallery_short_test_split_errors_after_showing() {
        // 100 samples leave 10 for testing
        let mut driver = TrainingDriver::new(centroid_config(100));
        let mut sink = MemorySink::new();

        let err = driver.run(&mut Vec::<u8>::new(), &mut sink).unwrap_err();

        assert!(err.to_string().contains("out of range"));
        assert_eq!(sink.figures.len(), 10);
    }

    #[test]
    fn test_show_gallery_exact_count() {
        let images = Array2::from_shape_fn((3, 4), |(i, j)| (i * 4 + j) as f64);
        let mut sink = MemorySink::new();

        let entries = show_gallery(&images, 2, 2, &[1, 0, 2], &[1, 1, 2], 3, &mut sink).unwrap();

        assert_eq!(entries.len(), 3);
        assert!(!entries[1].correct);
        assert_eq!(sink.figures[1].title(), "Predicted: 0\nTrue: 1");
        assert!(show_gallery(&images, 2, 2, &[1, 0, 2], &[1, 1, 2], 4, &mut MemorySink::new()).is_err());
    }

    #[test]
    fn test_driver_is_seeded() {
        let run = |seed| {
            let config = TrainingConfig { seed, ..centroid_config(200) };
            TrainingDriver::new(config)
                .run(&mut Vec::<u8>::new(), &mut MemorySink::new())
                .unwrap()
        };

        let a = run(7);
        let b = run(7);
        assert_eq!(a.test_confusion, b.test_confusion);
        assert_eq!(a.validation_accuracy, b.validation_accuracy);
    }

    #[test]
    fn test_unknown_classifier_fails() {
        let config = TrainingConfig {
            classifier: "svm".to_string(),
            ..centroid_config(200)
        };
        let mut driver = TrainingDriver::new(config);
        assert!(driver.run(&mut Vec::<u8>::new(), &mut MemorySink::new()).is_err());
    }

    #[test]
    fn test_missing_path_falls_back_to_synthetic() {
        let config = TrainingConfig {
            dataset_id: "ck48".to_string(),
            ..centroid_config(50)
        };
        let dataset = TrainingDriver::new(config).load_dataset().unwrap();
        assert_eq!(dataset.config.id, "synthetic");
        assert_eq!(dataset.total_samples(), 50);
    }

    #[test]
    fn test_generate_report() {
        let mut driver = TrainingDriver::new(centroid_config(300));
        let results = driver.run(&mut Vec::<u8>::new(), &mut MemorySink::new()).unwrap();

        let report = TrainingDriver::generate_report(&results);

        assert!(report.contains("Facial Expression Training Report"));
        assert!(report.contains("Validation Accuracy"));
        assert!(report.contains("| 0 |"));
        assert!(report.contains("\"classifier\": \"centroid\""));
    }
}
