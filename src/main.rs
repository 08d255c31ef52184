//! Tomato Leaf Disease Classifier CLI
//!
//! Entry point for training the CNN, running inference on images and
//! inspecting saved model artifacts.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::{info, warn};

use tomato_leaf::backend::{backend_name, default_device, InferenceBackend, TrainingBackend};
use tomato_leaf::dataset::loader::DatasetSplit;
use tomato_leaf::inference::{collect_images, evaluate_images, Predictor};
use tomato_leaf::model::artifact::{artifact_stem, metadata_path, weights_path, ModelMetadata};
use tomato_leaf::training::config::TRAINING_INFO_NAME;
use tomato_leaf::training::{run_training, TrainingConfig, TrainingReport};
use tomato_leaf::utils::logging::{init_logging, LogConfig};
use tomato_leaf::utils::format_number;

/// Tomato Leaf Disease Classification
///
/// Trains a small CNN on directory-organized tomato leaf photos and runs
/// inference with the saved model.
#[derive(Parser, Debug)]
#[command(name = "tomato_leaf")]
#[command(version)]
#[command(about = "Tomato leaf disease classification with Burn", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Train the classifier
    Train {
        /// JSON training configuration; flags below override its values
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Dataset root containing train/ and optionally val/
        #[arg(short, long)]
        data_dir: Option<PathBuf>,

        /// Output directory for models and the training record
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Number of training epochs
        #[arg(short, long)]
        epochs: Option<usize>,

        /// Batch size for training
        #[arg(short, long)]
        batch_size: Option<usize>,

        /// Initial learning rate
        #[arg(short, long)]
        learning_rate: Option<f64>,

        /// Fraction held out per class when there is no val/ directory
        #[arg(long)]
        validation_split: Option<f64>,

        /// Epochs without improvement before stopping (0 disables)
        #[arg(long)]
        patience: Option<usize>,

        /// Epochs without improvement before reducing the learning rate
        #[arg(long)]
        lr_patience: Option<usize>,

        /// Random seed for shuffling and augmentation
        #[arg(long)]
        seed: Option<u64>,

        /// Disable data augmentation
        #[arg(long, default_value = "false")]
        no_augmentation: bool,

        /// Quick mode: use at most this many images per class
        #[arg(long)]
        max_samples: Option<usize>,
    },

    /// Run inference on a single image or directory
    ///
    /// For a directory, images inside class folders are scored against the
    /// label the folder names.
    Infer {
        /// Path to input image or directory
        #[arg(short, long)]
        input: PathBuf,

        /// Path to the trained model (stem, .mpk or .json)
        #[arg(short, long, default_value = "output/best_tomato_model")]
        model: PathBuf,
    },

    /// Print the architecture metadata of a saved model
    Info {
        /// Path to the trained model (stem, .mpk or .json)
        #[arg(short, long, default_value = "output/best_tomato_model")]
        model: PathBuf,
    },

    /// Show dataset statistics
    Stats {
        /// Dataset root containing train/ and optionally val/
        #[arg(short, long, default_value = "data")]
        data_dir: PathBuf,

        /// Fraction held out per class when there is no val/ directory
        #[arg(long, default_value = "0.2")]
        validation_split: f64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::verbose()
    } else {
        LogConfig::default()
    };

    let _ = init_logging(&log_config);

    print_banner();

    match cli.command {
        Commands::Train {
            config,
            data_dir,
            output_dir,
            epochs,
            batch_size,
            learning_rate,
            validation_split,
            patience,
            lr_patience,
            seed,
            no_augmentation,
            max_samples,
        } => {
            let mut training_config = match config {
                Some(path) => TrainingConfig::load(&path)
                    .with_context(|| format!("Failed to load training config {:?}", path))?,
                None => TrainingConfig::default(),
            };

            if let Some(v) = data_dir {
                training_config.data_dir = v;
            }
            if let Some(v) = output_dir {
                training_config.output_dir = v;
            }
            if let Some(v) = epochs {
                training_config.epochs = v;
            }
            if let Some(v) = batch_size {
                training_config.batch_size = v;
            }
            if let Some(v) = learning_rate {
                training_config.learning_rate = v;
            }
            if let Some(v) = validation_split {
                training_config.validation_split = v;
            }
            if let Some(v) = patience {
                training_config.early_stopping_patience = v;
            }
            if let Some(v) = lr_patience {
                training_config.lr_patience = v;
            }
            if let Some(v) = seed {
                training_config.seed = v;
            }
            if no_augmentation {
                training_config.augment = false;
            }
            if let Some(v) = max_samples {
                println!(
                    "{}",
                    format!("Quick mode: at most {} images per class", v)
                        .yellow()
                        .bold()
                );
                training_config.max_samples_per_class = Some(v);
            }

            cmd_train(&training_config)?;
        }

        Commands::Infer { input, model } => {
            cmd_infer(&input, &model)?;
        }

        Commands::Info { model } => {
            cmd_info(&model)?;
        }

        Commands::Stats {
            data_dir,
            validation_split,
        } => {
            cmd_stats(&data_dir, validation_split)?;
        }
    }

    Ok(())
}

fn print_banner() {
    println!(
        "{}",
        r#"
 ================================================================
    Tomato Leaf Disease Classifier
    CNN training and inference with Burn + Rust
 ================================================================
  "#
        .green()
    );
}

fn cmd_train(config: &TrainingConfig) -> Result<()> {
    info!("Training on backend: {}", backend_name());

    let device = default_device();
    let report = run_training::<TrainingBackend>(config, &device)
        .context("Training failed")?;

    println!("{}", "Summary:".cyan().bold());
    println!("  Epochs run:          {}", report.epochs_completed);
    println!("  Training time:       {}", report.training_time);
    println!("  Final val accuracy:  {:.2}%", report.final_val_accuracy * 100.0);
    if let Some(epoch) = report.best_epoch {
        println!(
            "  Best val accuracy:   {:.2}% (epoch {})",
            report.best_val_accuracy * 100.0,
            epoch
        );
    }

    Ok(())
}

fn cmd_infer(input: &Path, model: &Path) -> Result<()> {
    info!("Running inference");
    info!("  Input: {:?}", input);
    info!("  Model: {:?}", model);

    println!("{}", "Inference Configuration:".cyan().bold());
    println!("  Input:   {}", input.display());
    println!("  Model:   {}", model.display());
    println!("  Backend: {}", backend_name());
    println!();

    if !input.exists() {
        bail!("Input path not found: {}", input.display());
    }

    println!("{}", "Loading model...".cyan());
    let device = default_device();
    let predictor = Predictor::<InferenceBackend>::load(model, &device)
        .with_context(|| format!("Failed to load model {:?}", model))?;
    println!(
        "  {} {} classes, {} parameters",
        "Loaded:".green(),
        predictor.labels().len(),
        format_number(predictor.num_params())
    );
    println!();

    if !input.is_dir() {
        let result = predictor
            .predict_file(input)
            .with_context(|| format!("Failed to classify {:?}", input))?;
        println!("{}", result.display());
        return Ok(());
    }

    let images = collect_images(input);
    if images.is_empty() {
        bail!("No images found in {}", input.display());
    }

    println!("{}", "Running inference...".cyan());
    println!();

    let (outcomes, tally) = evaluate_images(&predictor, &images);
    let mut failures = 0usize;
    for outcome in &outcomes {
        match &outcome.prediction {
            Ok(result) => {
                print!("{}", result.display());
                match (&outcome.expected, outcome.is_correct()) {
                    (Some(expected), Some(true)) => {
                        println!("Actual: {} {}", expected.yellow(), "correct".green())
                    }
                    (Some(expected), _) => {
                        println!("Actual: {} {}", expected.yellow(), "wrong".red())
                    }
                    (None, _) => {}
                }
                println!();
            }
            Err(e) => {
                failures += 1;
                warn!("Skipping {:?}: {}", outcome.path, e);
                println!("{} {}: {}", "Error:".red(), outcome.path.display(), e);
            }
        }
    }

    println!(
        "{} {} images, {} failed",
        "Processed".cyan().bold(),
        images.len(),
        failures
    );
    if tally.total > 0 {
        println!("{} {}", "Accuracy:".cyan().bold(), tally.summary());
    }

    Ok(())
}

fn cmd_info(model: &Path) -> Result<()> {
    let stem = artifact_stem(model);
    let sidecar = metadata_path(&stem);

    let metadata = if sidecar.exists() {
        let json = std::fs::read_to_string(&sidecar)
            .with_context(|| format!("Failed to read {:?}", sidecar))?;
        serde_json::from_str::<ModelMetadata>(&json)
            .with_context(|| format!("Invalid metadata {:?}", sidecar))?
    } else {
        // No sidecar: load the weights to describe them
        let predictor = Predictor::<InferenceBackend>::load(&stem, &default_device())
            .with_context(|| format!("Failed to load model {:?}", stem))?;
        predictor.metadata().clone()
    };

    println!("{}", "Model Information:".cyan().bold());
    println!("  Architecture:  {}", metadata.architecture);
    println!("  Weights:       {}", weights_path(&stem).display());
    println!(
        "  Input shape:   {}x{}x{}",
        metadata.input_shape[0], metadata.input_shape[1], metadata.input_shape[2]
    );
    println!("  Feature len:   {}", metadata.feature_len());
    println!("  Output shape:  {:?}", metadata.output_shape());
    println!("  Parameters:    {}", format_number(metadata.total_params));
    println!("  Created:       {}", metadata.created_at.format("%Y-%m-%d %H:%M:%S UTC"));
    if let (Some(epoch), Some(acc)) = (metadata.epoch, metadata.val_accuracy) {
        println!("  Snapshot:      epoch {} ({:.2}% val accuracy)", epoch, acc * 100.0);
    }
    println!();

    println!("{}", "Layers:".cyan().bold());
    for layer in &metadata.layers {
        println!(
            "  {:12} {:10} {:20} {:>10}",
            layer.name,
            format!("{:?}", layer.kind),
            format!("{:?}", layer.shape),
            format_number(layer.params)
        );
    }
    println!();

    println!("{}", "Labels:".cyan().bold());
    for (idx, label) in metadata.labels.iter().enumerate() {
        println!("  {:2}. {}", idx, label);
    }

    // Training record written next to the model by `train`
    let record_path = stem
        .parent()
        .map(|dir| dir.join(TRAINING_INFO_NAME))
        .unwrap_or_else(|| PathBuf::from(TRAINING_INFO_NAME));
    if record_path.is_file() {
        match TrainingReport::load(&record_path) {
            Ok(report) => {
                println!();
                println!("{}", "Training Record:".cyan().bold());
                println!("  Epochs run:        {}", report.epochs_completed);
                println!("  Training time:     {}", report.training_time);
                println!("  Best val accuracy: {:.2}%", report.best_val_accuracy * 100.0);
                println!("  Stop reason:       {:?}", report.stop_reason);
            }
            Err(e) => warn!("Ignoring unreadable training record {:?}: {}", record_path, e),
        }
    }

    Ok(())
}

fn cmd_stats(data_dir: &Path, validation_split: f64) -> Result<()> {
    info!("Computing dataset statistics for: {:?}", data_dir);

    let split = DatasetSplit::load(data_dir, validation_split)
        .with_context(|| format!("Failed to load dataset {:?}", data_dir))?;

    println!("{}", "Training Set:".cyan().bold());
    split.train.stats().print();
    println!();
    println!(
        "{} ({:?})",
        "Validation Set:".cyan().bold(),
        split.validation_source
    );
    split.val.stats().print();

    Ok(())
}
