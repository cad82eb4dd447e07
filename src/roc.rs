// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! One-vs-rest ROC curves for multi-class score matrices
//!
//! Each class column of the score matrix is compared against the binarized
//! labels for that class. The resulting curves are kept in an ordered map
//! keyed by class index and can be drawn as a single line chart.

use crate::figure::{Figure, FigureSink, LegendPosition, LineChart, LineStyle, Series};
use anyhow::{ensure, Result};
use ndarray::{Array2, ArrayView1, ArrayView2};
use serde::Serialize;
use std::collections::BTreeMap;

/// Colors assigned to classes in index order, repeating after the tenth
pub const PALETTE: [&str; 10] = [
    "purple",
    "orange",
    "green",
    "blue",
    "pink",
    "red",
    "yellow",
    "aqua",
    "lightblue",
    "lightgreen",
];

pub fn palette_color(class_index: usize) -> &'static str {
    PALETTE[class_index % PALETTE.len()]
}

/// Indicator matrix with one column per class `0..n_classes`.
/// Labels outside that range produce an all-zero row.
pub fn label_binarize(labels: &[usize], n_classes: usize) -> Array2<u8> {
    let mut indicator = Array2::zeros((labels.len(), n_classes));
    for (row, &label) in labels.iter().enumerate() {
        if label < n_classes {
            indicator[[row, label]] = 1;
        }
    }
    indicator
}

/// ROC curve points, ordered by decreasing threshold
#[derive(Debug, Clone, Serialize)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    /// The first threshold is `+inf` (nothing predicted positive)
    pub thresholds: Vec<f64>,
}

fn second_difference(values: &[f64], i: usize) -> f64 {
    values[i - 1] - 2.0 * values[i] + values[i + 1]
}

/// Compute the ROC curve of one binary indicator column against its scores.
///
/// One point per distinct score, collinear intermediate points dropped.
/// If the column has no positives the true-positive rates are NaN; if it has
/// no negatives the false-positive rates are NaN.
pub fn roc_curve(y_true: ArrayView1<u8>, scores: ArrayView1<f64>) -> Result<RocCurve> {
    ensure!(!scores.is_empty(), "cannot compute a ROC curve without samples");
    ensure!(
        y_true.len() == scores.len(),
        "label length {} does not match score length {}",
        y_true.len(),
        scores.len()
    );

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut tps = Vec::new();
    let mut fps = Vec::new();
    let mut thresholds = Vec::new();
    let (mut tp, mut fp) = (0.0, 0.0);

    for (pos, &idx) in order.iter().enumerate() {
        if y_true[idx] > 0 {
            tp += 1.0;
        } else {
            fp += 1.0;
        }
        let last_of_group = pos + 1 == order.len() || scores[order[pos + 1]] != scores[idx];
        if last_of_group {
            tps.push(tp);
            fps.push(fp);
            thresholds.push(scores[idx]);
        }
    }

    let last = tps.len() - 1;
    let keep: Vec<usize> = (0..tps.len())
        .filter(|&i| {
            i == 0
                || i == last
                || second_difference(&fps, i) != 0.0
                || second_difference(&tps, i) != 0.0
        })
        .collect();

    let total_pos = tps[last];
    let total_neg = fps[last];
    let rate = |count: f64, total: f64| if total > 0.0 { count / total } else { f64::NAN };

    let mut curve = RocCurve {
        fpr: vec![0.0],
        tpr: vec![0.0],
        thresholds: vec![f64::INFINITY],
    };
    for i in keep {
        curve.fpr.push(rate(fps[i], total_neg));
        curve.tpr.push(rate(tps[i], total_pos));
        curve.thresholds.push(thresholds[i]);
    }
    if total_neg <= 0.0 {
        curve.fpr[0] = f64::NAN;
    }
    if total_pos <= 0.0 {
        curve.tpr[0] = f64::NAN;
    }

    Ok(curve)
}

/// Area under a curve by the trapezoidal rule
pub fn auc(x: &[f64], y: &[f64]) -> Result<f64> {
    ensure!(x.len() == y.len(), "x length {} does not match y length {}", x.len(), y.len());
    ensure!(x.len() >= 2, "at least 2 points are needed to compute an area, got {}", x.len());

    Ok(x.windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[0] + ys[1]) / 2.0)
        .sum())
}

/// ROC data for one class
#[derive(Debug, Clone, Serialize)]
pub struct ClassRoc {
    pub false_positive_rates: Vec<f64>,
    pub true_positive_rates: Vec<f64>,
    pub thresholds: Vec<f64>,
    pub area: f64,
}

/// Per-class ROC data keyed by class index `0..n`
#[derive(Debug, Clone, Default, Serialize)]
pub struct MulticlassRoc {
    pub curves: BTreeMap<usize, ClassRoc>,
}

impl MulticlassRoc {
    /// One curve per score column.
    ///
    /// The class count is the width of the score matrix; labels are
    /// binarized over `0..width`.
    pub fn compute(labels: &[usize], scores: ArrayView2<f64>) -> Result<Self> {
        ensure!(scores.nrows() > 0, "prediction scores are empty");
        ensure!(
            labels.len() == scores.nrows(),
            "{} labels given for {} score rows",
            labels.len(),
            scores.nrows()
        );

        let n_classes = scores.ncols();
        let binarized = label_binarize(labels, n_classes);
        let mut curves = BTreeMap::new();

        for class in 0..n_classes {
            let curve = roc_curve(binarized.column(class), scores.column(class))?;
            let area = auc(&curve.fpr, &curve.tpr)?;
            if !area.is_finite() {
                tracing::warn!(
                    "ROC for class {} is undefined: the labels hold only one side of the split",
                    class
                );
            }
            curves.insert(
                class,
                ClassRoc {
                    false_positive_rates: curve.fpr,
                    true_positive_rates: curve.tpr,
                    thresholds: curve.thresholds,
                    area,
                },
            );
        }

        Ok(Self { curves })
    }

    pub fn n_classes(&self) -> usize {
        self.curves.len()
    }

    pub fn area(&self, class: usize) -> Option<f64> {
        self.curves.get(&class).map(|c| c.area)
    }

    /// Legend text for a class, e.g. `Class 2 (area = 0.93)`
    pub fn legend_label(class: usize, area: f64) -> String {
        format!("Class {} (area = {:.2})", class, area)
    }

    /// All class curves plus the chance diagonal on fixed axes
    pub fn to_figure(&self) -> Figure {
        let mut series: Vec<Series> = self
            .curves
            .iter()
            .map(|(&class, roc)| Series {
                label: Some(Self::legend_label(class, roc.area)),
                color: palette_color(class).to_string(),
                style: LineStyle::Solid,
                points: roc
                    .false_positive_rates
                    .iter()
                    .copied()
                    .zip(roc.true_positive_rates.iter().copied())
                    .collect(),
            })
            .collect();

        series.push(Series {
            label: None,
            color: "black".to_string(),
            style: LineStyle::Dashed,
            points: vec![(0.0, 0.0), (1.0, 1.0)],
        });

        Figure::Line(LineChart {
            title: "Multi-class ROC curve".to_string(),
            x_label: "False Positive Rate".to_string(),
            y_label: "True Positive Rate".to_string(),
            x_range: (0.0, 1.0),
            y_range: (0.0, 1.05),
            series,
            legend: Some(LegendPosition::LowerRight),
        })
    }
}

/// Compute per-class ROC curves and show them on one figure
pub fn plot_roc(labels: &[usize], scores: ArrayView2<f64>, sink: &mut dyn FigureSink) -> Result<MulticlassRoc> {
    let roc = MulticlassRoc::compute(labels, scores)?;
    for (class, curve) in &roc.curves {
        tracing::debug!("{}", MulticlassRoc::legend_label(*class, curve.area));
    }
    sink.show(roc.to_figure())?;
    Ok(roc)
}
