// SPDX-License-Identifier: AGPL-3.0-or-later
// SPDX-FileCopyrightText: 2024 Hyperpolymath

//! Standalone training runner
//!
//! Trains a classifier, reports validation and test results and shows a
//! gallery of labelled test faces

use anyhow::Result;
use clap::Parser;
use face_eval::datasets::Dataset;
use face_eval::figure::{FigureSink, MemorySink, SvgDirectorySink};
use face_eval::models::{classifier_by_name, MlpParams, CLASSIFIER_NAMES};
use face_eval::training::{TrainingConfig, TrainingDriver};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "train-driver")]
#[command(about = "Train a facial-expression classifier")]
#[command(version)]
struct Args {
    /// Dataset to use (synthetic, or a name for data at --path)
    #[arg(short, long, default_value = "synthetic")]
    dataset: String,

    /// Path to a class-directory dataset or JSON Lines file
    #[arg(short, long)]
    path: Option<PathBuf>,

    /// Classifier to train (mlp, centroid)
    #[arg(short, long, default_value = "mlp")]
    classifier: String,

    /// Random seed
    #[arg(short, long, default_value_t = 42)]
    seed: u64,

    /// Number of samples for synthetic dataset
    #[arg(short = 'n', long, default_value_t = 400)]
    samples: usize,

    /// Number of test faces to show
    #[arg(short, long, default_value_t = 20)]
    gallery_size: usize,

    /// Output directory for figures and results
    #[arg(short, long, default_value = "eval/results")]
    output: PathBuf,

    /// Output format (json, markdown, both)
    #[arg(short, long, default_value = "both")]
    format: String,

    /// Keep figures in memory instead of writing SVG files
    #[arg(long)]
    no_figures: bool,

    /// List available classifiers
    #[arg(long)]
    list: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    // List available classifiers
    if args.list {
        println!("Available classifiers:");
        println!("----------------------");
        for name in CLASSIFIER_NAMES {
            let classifier = classifier_by_name(name, &MlpParams::default())?;
            println!("  {}: {}", name, classifier.description());
        }
        return Ok(());
    }

    let config = TrainingConfig {
        seed: args.seed,
        dataset_id: args.dataset.clone(),
        dataset_path: args.path.map(|p| p.to_string_lossy().to_string()),
        synthetic_samples: args.samples,
        classifier: args.classifier.clone(),
        mlp: MlpParams {
            seed: args.seed,
            ..MlpParams::default()
        },
        gallery_size: args.gallery_size,
        output_dir: args.output.to_string_lossy().to_string(),
    };

    let mut driver = TrainingDriver::new(config);

    let dataset = driver.load_dataset()?;
    let labels: Vec<usize> = dataset.samples.iter().map(|s| s.label).collect();
    println!("\nDataset: {}", dataset.config.name);
    println!("  Samples: {}", dataset.total_samples());
    println!("  Image size: {}x{}", dataset.config.image_width, dataset.config.image_height);
    println!("\nLabel distribution:");
    for (label, count) in Dataset::label_distribution(&labels) {
        let name = dataset.config.class_names.get(label).map_or("?", |s| s.as_str());
        println!("  {} ({}): {} ({:.1}%)", label, name, count, count as f64 / labels.len() as f64 * 100.0);
    }

    println!("\n{}", "=".repeat(70));
    println!("TRAINING {}", args.classifier.to_uppercase());
    println!("{}", "=".repeat(70));

    let mut sink: Box<dyn FigureSink> = if args.no_figures {
        Box::new(MemorySink::new())
    } else {
        Box::new(SvgDirectorySink::new(&args.output.join("gallery"))?)
    };

    let results = driver.run(&mut std::io::stdout(), sink.as_mut())?;

    std::fs::create_dir_all(&args.output)?;
    let timestamp = chrono::Utc::now().format("%Y%m%d_%H%M%S");

    if args.format == "json" || args.format == "both" {
        let json_path = args.output.join(format!("train_{}_{}.json", args.dataset, timestamp));
        TrainingDriver::save_results(&results, &json_path)?;
        println!("\nJSON results saved to: {}", json_path.display());
    }

    if args.format == "markdown" || args.format == "both" {
        let report = TrainingDriver::generate_report(&results);
        let md_path = args.output.join(format!("train_{}_{}.md", args.dataset, timestamp));
        std::fs::write(&md_path, report)?;
        println!("Markdown report saved to: {}", md_path.display());
    }

    println!("\n{}", "=".repeat(70));
    println!("Training complete!");

    Ok(())
}
