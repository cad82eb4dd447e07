// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Model evaluation CLI
//!
//! Usage:
//!   face-eval --model-type svm --classifier centroid
//!   face-eval --model-type cnn --algorithm eigenfaces --dataset ck48 --path ./datasets/ck48

use anyhow::Result;
use clap::Parser;
use face_eval::evaluator::{EvaluationRecord, Evaluator};
use face_eval::figure::{FigureSink, MemorySink, SvgDirectorySink};
use face_eval::models::MlpParams;
use face_eval::training::{TrainingConfig, TrainingDriver};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "face-eval")]
#[command(about = "Evaluate a facial-expression classifier")]
#[command(version)]
struct Args {
    /// Dataset to evaluate on (synthetic, or a name for data at --path)
    #[arg(short, long, default_value = "synthetic")]
    dataset: String,

    /// Path to a class-directory dataset or JSON Lines file
    #[arg(short, long)]
    path: Option<PathBuf>,

    /// Model type tag (cnn, svm, adaboost, mlp)
    #[arg(short, long, default_value = "mlp")]
    model_type: String,

    /// Feature algorithm tag for cnn (eigenfaces, fisherfaces).
    /// Each test row is regrouped into 625 (eigenfaces) or 6 (fisherfaces)
    /// features, so the classifier must have been trained on that width;
    /// with full images fisherfaces fails with a reshape or feature-count error
    #[arg(short, long)]
    algorithm: Option<String>,

    /// Classifier to train (mlp, centroid)
    #[arg(short, long, default_value = "mlp")]
    classifier: String,

    /// Random seed for reproducibility
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Number of samples for the synthetic dataset
    #[arg(short = 'n', long, default_value_t = 400)]
    samples: usize,

    /// Output directory for figures and results
    #[arg(short, long, default_value = "eval/results")]
    output: PathBuf,

    /// Keep figures in memory instead of writing SVG files
    #[arg(long)]
    no_figures: bool,

    /// MLP hidden units
    #[arg(long, default_value_t = 64)]
    hidden_units: usize,

    /// MLP training epochs
    #[arg(long, default_value_t = 300)]
    epochs: usize,

    /// MLP learning rate
    #[arg(long, default_value_t = 0.2)]
    learning_rate: f64,

    /// MLP L2 penalty
    #[arg(long, default_value_t = 1e-4)]
    alpha: f64,
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    tracing::info!("Facial Expression Model Evaluation");
    tracing::info!("==================================");
    tracing::info!("Dataset: {}", args.dataset);
    tracing::info!("Model type: {}", args.model_type);
    tracing::info!("Seed: {}", args.seed);

    let config = TrainingConfig {
        seed: args.seed,
        dataset_id: args.dataset.clone(),
        dataset_path: args.path.map(|p| p.to_string_lossy().to_string()),
        synthetic_samples: args.samples,
        classifier: args.classifier.clone(),
        mlp: MlpParams {
            hidden_units: args.hidden_units,
            epochs: args.epochs,
            learning_rate: args.learning_rate,
            alpha: args.alpha,
            seed: args.seed,
        },
        gallery_size: 0,
        output_dir: args.output.to_string_lossy().to_string(),
    };

    let mut driver = TrainingDriver::new(config.clone());
    let prepared = driver.prepare()?;
    let model = driver.fit_classifier(&prepared.train_x, &prepared.splits.train_y)?;

    let mut sink: Box<dyn FigureSink> = if args.no_figures {
        Box::new(MemorySink::new())
    } else {
        Box::new(SvgDirectorySink::new(&args.output.join("figures"))?)
    };

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let report = {
        let mut evaluator = Evaluator::new(&mut out, &mut sink);
        evaluator.evaluate(
            model.as_ref(),
            &args.model_type,
            &prepared.test_x,
            &prepared.splits.test_y,
            args.algorithm.as_deref(),
        )?
    };
    drop(out);

    let Some(report) = report else {
        tracing::warn!("No evaluation produced");
        return Ok(());
    };

    println!("{}", "=".repeat(70));
    println!("EVALUATION SUMMARY");
    println!("{}", "=".repeat(70));
    println!("{:<20} {:>10} {:>10} {:>10}", "Class", "AUC", "Precision", "Recall");
    println!("{:-<70}", "");
    for class in &report.classification_report.per_class {
        let auc = report
            .roc
            .area(class.label)
            .filter(|a| a.is_finite())
            .map_or("-".to_string(), |a| format!("{:.4}", a));
        println!(
            "{:<20} {:>10} {:>10.4} {:>10.4}",
            prepared
                .dataset_info
                .class_names
                .get(class.label)
                .cloned()
                .unwrap_or_else(|| class.label.to_string()),
            auc,
            class.precision,
            class.recall
        );
    }
    println!("{:-<70}", "");

    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");
    let json_path = args.output.join(format!("eval_{}.json", timestamp));
    EvaluationRecord::new(config, report).save(&json_path)?;
    println!("\nJSON results saved to: {}", json_path.display());

    println!("\nEvaluation complete!");

    Ok(())
}
