// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Evaluation metrics for multi-class expression classification
//!
//! Implements:
//! - Mean squared error over integer class indices
//! - Accuracy
//! - Arg-max decoding and one-hot encoding
//! - Multi-class confusion matrix
//! - Per-class classification report (precision, recall, F1, support)

use anyhow::{ensure, Result};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Largest number of classes any loader, encoder or model will size for
pub const MAX_CLASSES: usize = 1000;

/// Class count implied by the largest label, rejecting labels past [`MAX_CLASSES`]
pub fn class_count(labels: &[usize]) -> Result<usize> {
    let n_classes = labels.iter().copied().max().map_or(0, |m| m + 1);
    ensure!(
        n_classes <= MAX_CLASSES,
        "label {} exceeds the class limit of {}",
        n_classes - 1,
        MAX_CLASSES
    );
    Ok(n_classes)
}

fn check_aligned(y_true: &[usize], y_pred: &[usize]) -> Result<()> {
    ensure!(!y_true.is_empty(), "cannot compute metrics over an empty label set");
    ensure!(
        y_true.len() == y_pred.len(),
        "label length {} does not match prediction length {}",
        y_true.len(),
        y_pred.len()
    );
    Ok(())
}

/// Mean squared error between integer-coded classes.
///
/// Treats class indices as ordinal values, so a 0 vs 3 mistake costs more
/// than a 0 vs 1 mistake.
pub fn mean_squared_error(y_true: &[usize], y_pred: &[usize]) -> Result<f64> {
    check_aligned(y_true, y_pred)?;
    let sum: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(&t, &p)| {
            let diff = t as f64 - p as f64;
            diff * diff
        })
        .sum();
    Ok(sum / y_true.len() as f64)
}

/// Fraction of exact label matches
pub fn accuracy(y_true: &[usize], y_pred: &[usize]) -> Result<f64> {
    check_aligned(y_true, y_pred)?;
    let hits = y_true.iter().zip(y_pred.iter()).filter(|(t, p)| t == p).count();
    Ok(hits as f64 / y_true.len() as f64)
}

/// Column index of the largest value in each row. Ties resolve to the first
/// column, NaN never wins.
pub fn argmax_rows(scores: ArrayView2<f64>) -> Vec<usize> {
    scores
        .rows()
        .into_iter()
        .map(|row| {
            let mut best = 0;
            let mut best_value = f64::NEG_INFINITY;
            for (idx, &value) in row.iter().enumerate() {
                if value > best_value {
                    best = idx;
                    best_value = value;
                }
            }
            best
        })
        .collect()
}

/// One-hot encode labels into `max(label) + 1` columns
pub fn to_categorical(labels: &[usize]) -> Result<Array2<f64>> {
    let mut encoded = Array2::zeros((labels.len(), class_count(labels)?));
    for (row, &label) in labels.iter().enumerate() {
        encoded[[row, label]] = 1.0;
    }
    Ok(encoded)
}

/// Sorted union of the labels present in either slice
pub fn unique_labels(y_true: &[usize], y_pred: &[usize]) -> Vec<usize> {
    let mut labels: Vec<usize> = y_true.iter().chain(y_pred.iter()).copied().collect();
    labels.sort_unstable();
    labels.dedup();
    labels
}

/// Confusion matrix over the labels observed in truth or predictions.
///
/// Entry `counts[i][j]` is the number of samples whose true class is
/// `labels[i]` and whose predicted class is `labels[j]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub labels: Vec<usize>,
    pub counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    /// Create from ground truth and predictions
    pub fn from_predictions(y_true: &[usize], y_pred: &[usize]) -> Result<Self> {
        check_aligned(y_true, y_pred)?;

        let labels = unique_labels(y_true, y_pred);
        let n = labels.len();
        let mut counts = vec![vec![0usize; n]; n];

        // labels is sorted and contains every value, so the searches cannot miss
        for (t, p) in y_true.iter().zip(y_pred.iter()) {
            if let (Ok(i), Ok(j)) = (labels.binary_search(t), labels.binary_search(p)) {
                counts[i][j] += 1;
            }
        }

        Ok(Self { labels, counts })
    }

    pub fn n_classes(&self) -> usize {
        self.labels.len()
    }

    /// Count for a (true, predicted) label pair; zero for unseen labels
    pub fn get(&self, actual: usize, predicted: usize) -> usize {
        match (self.labels.binary_search(&actual), self.labels.binary_search(&predicted)) {
            (Ok(i), Ok(j)) => self.counts[i][j],
            _ => 0,
        }
    }

    /// Total number of samples
    pub fn total(&self) -> usize {
        self.counts.iter().map(|row| row.iter().sum::<usize>()).sum()
    }

    /// Number of correctly classified samples
    pub fn trace(&self) -> usize {
        (0..self.n_classes()).map(|i| self.counts[i][i]).sum()
    }

    /// Samples whose true class is at `index`
    pub fn row_sum(&self, index: usize) -> usize {
        self.counts[index].iter().sum()
    }

    /// Samples predicted as the class at `index`
    pub fn column_sum(&self, index: usize) -> usize {
        self.counts.iter().map(|row| row[index]).sum()
    }
}

/// Integer matrix rendering: right-aligned cells of uniform width,
/// `[[a b]\n [c d]]`.
impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .counts
            .iter()
            .flatten()
            .map(|c| c.to_string().len())
            .max()
            .unwrap_or(1);

        write!(f, "[")?;
        for (i, row) in self.counts.iter().enumerate() {
            if i > 0 {
                write!(f, "\n ")?;
            }
            let cells: Vec<String> = row.iter().map(|c| format!("{:>width$}", c, width = width)).collect();
            write!(f, "[{}]", cells.join(" "))?;
        }
        write!(f, "]")
    }
}

/// Precision, recall and F1 for one class
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: usize,
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AverageMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

/// Per-class report with accuracy and macro/weighted averages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub per_class: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: AverageMetrics,
    pub weighted_avg: AverageMetrics,
}

const WEIGHTED_AVG: &str = "weighted avg";

fn ratio(num: usize, denom: usize) -> f64 {
    if denom == 0 {
        return 0.0;
    }
    num as f64 / denom as f64
}

fn harmonic_mean(precision: f64, recall: f64) -> f64 {
    let denom = precision + recall;
    if denom == 0.0 {
        return 0.0;
    }
    2.0 * precision * recall / denom
}

impl ClassificationReport {
    /// Generate full report from a confusion matrix
    pub fn from_confusion_matrix(cm: &ConfusionMatrix) -> Self {
        let per_class: Vec<ClassMetrics> = cm
            .labels
            .iter()
            .enumerate()
            .map(|(i, &label)| {
                let tp = cm.counts[i][i];
                let precision = ratio(tp, cm.column_sum(i));
                let recall = ratio(tp, cm.row_sum(i));
                ClassMetrics {
                    label,
                    precision,
                    recall,
                    f1_score: harmonic_mean(precision, recall),
                    support: cm.row_sum(i),
                }
            })
            .collect();

        let total = cm.total();
        let n = per_class.len().max(1) as f64;

        let macro_avg = AverageMetrics {
            precision: per_class.iter().map(|c| c.precision).sum::<f64>() / n,
            recall: per_class.iter().map(|c| c.recall).sum::<f64>() / n,
            f1_score: per_class.iter().map(|c| c.f1_score).sum::<f64>() / n,
            support: total,
        };

        let weighted = |metric: fn(&ClassMetrics) -> f64| -> f64 {
            if total == 0 {
                return 0.0;
            }
            per_class.iter().map(|c| metric(c) * c.support as f64).sum::<f64>() / total as f64
        };
        let weighted_avg = AverageMetrics {
            precision: weighted(|c| c.precision),
            recall: weighted(|c| c.recall),
            f1_score: weighted(|c| c.f1_score),
            support: total,
        };

        Self {
            accuracy: ratio(cm.trace(), total),
            per_class,
            macro_avg,
            weighted_avg,
        }
    }

    pub fn support(&self) -> usize {
        self.weighted_avg.support
    }

    /// Format as a fixed-width text table, two decimal places
    pub fn format(&self) -> String {
        let width = self
            .per_class
            .iter()
            .map(|c| c.label.to_string().len())
            .max()
            .unwrap_or(0)
            .max(WEIGHTED_AVG.len());

        let mut report = format!("{:>width$} ", "", width = width);
        for header in ["precision", "recall", "f1-score", "support"] {
            report.push_str(&format!(" {:>9}", header));
        }
        report.push_str("\n\n");

        for c in &self.per_class {
            report.push_str(&format!(
                "{:>width$}  {:>9.2} {:>9.2} {:>9.2} {:>9}\n",
                c.label,
                c.precision,
                c.recall,
                c.f1_score,
                c.support,
                width = width
            ));
        }
        report.push('\n');

        report.push_str(&format!(
            "{:>width$}  {:>9} {:>9} {:>9.2} {:>9}\n",
            "accuracy",
            "",
            "",
            self.accuracy,
            self.support(),
            width = width
        ));
        for (heading, avg) in [("macro avg", &self.macro_avg), (WEIGHTED_AVG, &self.weighted_avg)] {
            report.push_str(&format!(
                "{:>width$}  {:>9.2} {:>9.2} {:>9.2} {:>9}\n",
                heading,
                avg.precision,
                avg.recall,
                avg.f1_score,
                avg.support,
                width = width
            ));
        }

        report
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.format())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_mse_counts_squared_class_distance() {
        let mse = mean_squared_error(&[0, 1, 0, 1], &[0, 1, 1, 1]).unwrap();
        assert!((mse - 0.25).abs() < 1e-12);

        let mse = mean_squared_error(&[0, 3], &[3, 3]).unwrap();
        assert!((mse - 4.5).abs() < 1e-12);
    }

    #[test]
    fn test_mse_rejects_mismatched_lengths() {
        assert!(mean_squared_error(&[0, 1], &[0]).is_err());
        assert!(mean_squared_error(&[], &[]).is_err());
    }

    #[test]
    fn test_accuracy() {
        let acc = accuracy(&[0, 1, 2, 2], &[0, 1, 1, 2]).unwrap();
        assert!((acc - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_argmax_prefers_first_maximum() {
        let scores = array![[0.1, 0.7, 0.2], [0.5, 0.5, 0.0], [0.0, 0.0, 0.9]];
        assert_eq!(argmax_rows(scores.view()), vec![1, 0, 2]);
    }

    fn report_for(y_true: &[usize], y_pred: &[usize]) -> ClassificationReport {
        ClassificationReport::from_confusion_matrix(&ConfusionMatrix::from_predictions(y_true, y_pred).unwrap())
    }

    #[test]
    fn test_one_hot_rejects_labels_past_class_limit() {
        assert!(to_categorical(&[0, MAX_CLASSES]).is_err());
        assert!(to_categorical(&[1_000_000_000_000_000_000]).is_err());
        assert_eq!(to_categorical(&[MAX_CLASSES - 1]).unwrap().ncols(), MAX_CLASSES);
        assert_eq!(class_count(&[]).unwrap(), 0);
    }

    #[test]
    fn test_one_hot_round_trips_through_argmax() {
        let labels = vec![2, 0, 1, 2];
        let encoded = to_categorical(&labels).unwrap();
        assert_eq!(encoded.dim(), (4, 3));
        assert_eq!(encoded.row(0).to_vec(), vec![0.0, 0.0, 1.0]);
        assert_eq!(argmax_rows(encoded.view()), labels);
    }

    #[test]
    fn test_confusion_matrix_off_diagonal() {
        let cm = ConfusionMatrix::from_predictions(&[0, 1, 0, 1], &[0, 1, 1, 1]).unwrap();

        assert_eq!(cm.labels, vec![0, 1]);
        assert_eq!(cm.counts, vec![vec![1, 1], vec![0, 2]]);
        assert_eq!(cm.get(0, 1), 1);
        assert_eq!(cm.get(1, 0), 0);
        assert_eq!(cm.total(), 4);
        assert_eq!(cm.trace(), 3);
    }

    #[test]
    fn test_confusion_matrix_includes_predicted_only_labels() {
        let cm = ConfusionMatrix::from_predictions(&[0, 0, 2], &[0, 4, 2]).unwrap();
        assert_eq!(cm.labels, vec![0, 2, 4]);
        assert_eq!(cm.get(0, 4), 1);
        assert_eq!(cm.row_sum(2), 0);
    }

    #[test]
    fn test_confusion_matrix_display() {
        let cm = ConfusionMatrix::from_predictions(&[0, 1, 0, 1], &[0, 1, 1, 1]).unwrap();
        assert_eq!(cm.to_string(), "[[1 1]\n [0 2]]");

        let truth: Vec<usize> = std::iter::repeat(0).take(10).chain([1]).collect();
        let preds = truth.clone();
        let cm = ConfusionMatrix::from_predictions(&truth, &preds).unwrap();
        assert_eq!(cm.to_string(), "[[10  0]\n [ 0  1]]");
    }

    #[test]
    fn test_classification_report_values() {
        let report = report_for(&[0, 1, 0, 1], &[0, 1, 1, 1]);

        let class0 = &report.per_class[0];
        assert!((class0.precision - 1.0).abs() < 1e-12);
        assert!((class0.recall - 0.5).abs() < 1e-12);
        assert_eq!(class0.support, 2);

        let class1 = &report.per_class[1];
        assert!((class1.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((class1.recall - 1.0).abs() < 1e-12);
        assert!((class1.f1_score - 0.8).abs() < 1e-12);

        assert!((report.accuracy - 0.75).abs() < 1e-12);
        assert_eq!(report.support(), 4);
    }

    #[test]
    fn test_classification_report_zero_division_is_zero() {
        let report = report_for(&[0, 0], &[1, 1]);
        assert_eq!(report.per_class[0].precision, 0.0);
        assert_eq!(report.per_class[1].recall, 0.0);
        assert_eq!(report.per_class[1].f1_score, 0.0);
    }

    #[test]
    fn test_classification_report_format() {
        let report = report_for(&[0, 1, 0, 1], &[0, 1, 1, 1]);
        let expected = "              precision    recall  f1-score   support\n\
                        \n\
                        \x20          0       1.00      0.50      0.67         2\n\
                        \x20          1       0.67      1.00      0.80         2\n\
                        \n\
                        \x20   accuracy                           0.75         4\n\
                        \x20  macro avg       0.83      0.75      0.73         4\n\
                        weighted avg       0.83      0.75      0.73         4\n";
        assert_eq!(report.format(), expected);
    }
}
