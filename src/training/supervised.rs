//! Supervised Training Implementation
//!
//! A custom training loop on Burn's optimizer API rather than the
//! high-level `LearnerBuilder`, so the epoch-end bookkeeping (best
//! snapshot, early stopping, plateau LR reduction) stays explicit.

use burn::{
    data::dataloader::batcher::Batcher,
    data::dataset::Dataset,
    module::{AutodiffModule, Module},
    nn::loss::CrossEntropyLossConfig,
    optim::{AdamConfig, GradientsParams, Optimizer},
    prelude::*,
    tensor::{backend::AutodiffBackend, ElementConversion},
};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info};

use crate::dataset::augmentation::AugmentationConfig;
use crate::dataset::burn_dataset::{AugmentingBatcher, LeafBatch, LeafBatcher, LeafDataset};
use crate::dataset::loader::DatasetSplit;
use crate::model::artifact::{ModelArtifact, ModelMetadata};
use crate::model::cnn::{TomatoClassifier, TomatoClassifierConfig};
use crate::training::callbacks::{BestCheckpoint, EarlyStopping, EpochMetrics, ReduceOnPlateau};
use crate::training::config::TrainingConfig;
use crate::training::history::{EpochRecord, RunSummary, StopReason, TrainingReport};
use crate::utils::error::{Result, TomatoError};
use crate::utils::format_number;
use crate::utils::logging::TrainingLogger;

/// Run training with the given configuration
///
/// # Type Parameters
/// * `B` - The autodiff backend to use (e.g., `Autodiff<NdArray>` or `Autodiff<Cuda>`)
///
/// Writes the best snapshot, the final model, `training_info.json` and the
/// `training_history.svg` curves into `config.output_dir`, then returns the report.
pub fn run_training<B>(config: &TrainingConfig, device: &B::Device) -> Result<TrainingReport>
where
    B: AutodiffBackend,
{
    config.validate()?;

    println!("{}", "Initializing Training...".green().bold());
    println!("  Device: {:?}", device);

    std::fs::create_dir_all(&config.output_dir)?;

    // Load the dataset
    println!("{}", "Loading Dataset...".cyan());
    let mut split = DatasetSplit::load(&config.data_dir, config.validation_split)?;
    if let Some(max) = config.max_samples_per_class {
        split.truncate_per_class(max);
        info!("Limited to {} samples per class", max);
    }

    let labels = split.labels();
    println!();
    println!("{}", "Training Set:".cyan().bold());
    split.train.stats().print();
    println!();
    println!("{}", "Validation Set:".cyan().bold());
    split.val.stats().print();

    let image_size = config.model.input_size;
    let train_dataset = LeafDataset::new(split.train.to_pairs(), image_size);
    let val_dataset = LeafDataset::new(split.val.to_pairs(), image_size);

    let augmentation = if config.augment {
        config.augmentation.clone()
    } else {
        AugmentationConfig::none()
    };
    let train_batcher = AugmentingBatcher::new(image_size, augmentation, config.seed);
    let val_batcher = LeafBatcher::new(image_size);

    // Create model
    println!();
    println!("{}", "Creating Model...".cyan());
    let model_config: TomatoClassifierConfig = config.model.clone().with_num_classes(labels.len());
    let mut model = TomatoClassifier::<B>::new(&model_config, device);
    let total_params = model.num_params();
    println!("  Parameters: {}", format_number(total_params));

    let mut optimizer = AdamConfig::new().init();

    // Print training config
    println!();
    println!("{}", "Training Configuration:".cyan().bold());
    println!("  Training samples:   {}", train_dataset.len());
    println!("  Validation samples: {}", val_dataset.len());
    println!("  Classes:            {}", labels.len());
    println!("  Epochs:             {}", config.epochs);
    println!("  Batch size:         {}", config.batch_size);
    println!("  Learning rate:      {}", config.learning_rate);
    println!("  Augmentation:       {}", if config.augment { "on" } else { "off" });
    println!(
        "  Early stopping:     {} (patience {})",
        config.early_stopping_monitor, config.early_stopping_patience
    );
    println!(
        "  LR on plateau:      {} x{} (patience {}, min {:.0e})",
        config.lr_monitor, config.lr_reduce_factor, config.lr_patience, config.min_lr
    );
    println!();

    println!("{}", "Starting Training...".green().bold());
    println!();

    let mut checkpoint = BestCheckpoint::new();
    let mut early_stopping = EarlyStopping::new(
        config.early_stopping_monitor,
        config.early_stopping_patience,
        config.min_delta,
    );
    let mut plateau = ReduceOnPlateau::new(
        config.lr_monitor,
        config.learning_rate,
        config.lr_reduce_factor,
        config.lr_patience,
        config.min_lr,
        config.min_delta,
    );
    let mut logger = TrainingLogger::new(config.epochs);
    let mut history: Vec<EpochRecord> = Vec::with_capacity(config.epochs);
    let mut restore_point: Option<(usize, TomatoClassifier<B>)> = None;
    let mut stop_reason = StopReason::Completed;

    // Create RNG for epoch shuffling
    let mut epoch_rng = ChaCha8Rng::seed_from_u64(config.seed);

    for epoch_number in 1..=config.epochs {
        logger.start_epoch(epoch_number);
        let learning_rate = plateau.get_lr();

        println!(
            "{}",
            format!("Epoch {}/{}", epoch_number, config.epochs).yellow().bold()
        );

        // Training phase
        let mut indices: Vec<usize> = (0..train_dataset.len()).collect();
        indices.shuffle(&mut epoch_rng);

        let progress = epoch_progress_bar(indices.len());
        let mut loss_sum = 0.0f64;
        let mut correct = 0usize;
        let mut seen = 0usize;

        for batch_indices in indices.chunks(config.batch_size) {
            let items = train_dataset.load_batch(batch_indices);
            progress.inc(batch_indices.len() as u64);
            if items.is_empty() {
                continue;
            }

            let batch: LeafBatch<B> = train_batcher.batch(items, device);
            let batch_len = batch.targets.dims()[0];

            let output = model.forward(batch.images);
            let loss = CrossEntropyLossConfig::new()
                .init(&output.device())
                .forward(output.clone(), batch.targets.clone());

            let loss_value: f64 = loss.clone().into_scalar().elem();
            loss_sum += loss_value * batch_len as f64;
            correct += count_correct(output, batch.targets);
            seen += batch_len;

            // Backward pass
            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optimizer.step(learning_rate, model, grads);

            progress.set_message(format!(
                "loss {:.4} acc {:.2}%",
                loss_sum / seen as f64,
                100.0 * correct as f64 / seen as f64
            ));
        }
        progress.finish_and_clear();

        if seen == 0 {
            return Err(TomatoError::Training(
                "No training image could be decoded in this epoch".to_string(),
            ));
        }

        // Validation phase
        let (val_loss, val_accuracy) =
            evaluate(&model.valid(), &val_dataset, &val_batcher, config.batch_size, device)?;

        let metrics = EpochMetrics {
            train_loss: loss_sum / seen as f64,
            train_accuracy: correct as f64 / seen as f64,
            val_loss,
            val_accuracy,
        };

        // Best snapshot
        let is_best = checkpoint.update(epoch_number, val_accuracy);
        if is_best {
            logger.log_new_best(epoch_number, val_accuracy);
            save_artifact(
                &model,
                &model_config,
                &labels,
                Some((epoch_number, val_accuracy)),
                &config.best_model_path(),
            )?;
        }

        // Early stopping
        let decision = early_stopping.update(epoch_number, &metrics);
        if decision.improved && config.restore_best_weights {
            restore_point = Some((epoch_number, model.clone()));
        }

        // Learning rate for the next epoch
        let next_lr = plateau.step(&metrics);
        if next_lr < learning_rate {
            logger.log_lr_reduced(learning_rate, next_lr);
        }

        let record = EpochRecord {
            epoch: epoch_number,
            train_loss: metrics.train_loss,
            train_accuracy: metrics.train_accuracy,
            val_loss,
            val_accuracy,
            learning_rate,
            duration_secs: logger.epoch_elapsed().as_secs_f64(),
            is_best,
        };
        logger.end_epoch(&record);
        history.push(record);

        println!(
            "  {} Loss: {:.4} | Train Acc: {:.2}% | Val Loss: {:.4} | Val Acc: {:.2}% {}",
            "→".cyan(),
            metrics.train_loss,
            metrics.train_accuracy * 100.0,
            val_loss,
            val_accuracy * 100.0,
            if is_best {
                "(best)".green().to_string()
            } else {
                String::new()
            }
        );
        println!();

        if decision.stop {
            logger.log_early_stop(epoch_number, early_stopping.wait(), early_stopping.best_epoch());
            let restored_epoch = match restore_point.take() {
                Some((restored_epoch, best_model)) => {
                    info!("Restoring weights from epoch {}", restored_epoch);
                    model = best_model;
                    Some(restored_epoch)
                }
                None => None,
            };
            stop_reason = StopReason::EarlyStopped {
                epoch: epoch_number,
                restored_epoch,
            };
            break;
        }
    }

    // Save the final model
    println!("{}", "Saving Model...".cyan());
    save_artifact(&model, &model_config, &labels, None, &config.final_model_path())?;

    logger.log_complete(history.len(), checkpoint.best_accuracy());

    let report = TrainingReport::from_history(
        history,
        RunSummary {
            class_names: labels,
            total_params,
            train_samples: train_dataset.len(),
            val_samples: val_dataset.len(),
            validation_source: split.validation_source,
        },
        stop_reason,
        checkpoint.best_epoch(),
        logger.elapsed().as_secs_f64(),
        config,
    );
    report.save(config.training_info_path())?;
    report.write_history_chart(config.history_chart_path())?;

    println!();
    println!("{}", "Training Complete!".green().bold());
    println!("  Best validation accuracy: {:.2}%", report.best_val_accuracy * 100.0);
    println!("  Best model:  {:?}", config.best_model_path().with_extension("mpk"));
    println!("  Final model: {:?}", config.final_model_path().with_extension("mpk"));
    println!("  Record:      {:?}", config.training_info_path());
    println!("  Curves:      {:?}", config.history_chart_path());
    println!();

    Ok(report)
}

fn epoch_progress_bar(len: usize) -> ProgressBar {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("  {spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Number of rows whose argmax matches the target
fn count_correct<B: Backend>(output: Tensor<B, 2>, targets: Tensor<B, 1, Int>) -> usize {
    let n = targets.dims()[0];
    let predictions = output.argmax(1).reshape([n]);
    let correct: i64 = predictions.equal(targets).int().sum().into_scalar().elem();
    correct as usize
}

/// Mean loss and accuracy over a dataset (no augmentation, inference mode)
fn evaluate<B: Backend>(
    model: &TomatoClassifier<B>,
    dataset: &LeafDataset,
    batcher: &LeafBatcher,
    batch_size: usize,
    device: &B::Device,
) -> Result<(f64, f64)> {
    let loss_fn = CrossEntropyLossConfig::new().init(device);
    let indices: Vec<usize> = (0..dataset.len()).collect();

    let mut loss_sum = 0.0f64;
    let mut correct = 0usize;
    let mut total = 0usize;

    for batch_indices in indices.chunks(batch_size) {
        let items = dataset.load_batch(batch_indices);
        if items.is_empty() {
            continue;
        }

        let batch: LeafBatch<B> = batcher.batch(items, device);
        let batch_len = batch.targets.dims()[0];
        let output = model.forward(batch.images);

        let loss: f64 = loss_fn
            .forward(output.clone(), batch.targets.clone())
            .into_scalar()
            .elem();
        loss_sum += loss * batch_len as f64;
        correct += count_correct(output, batch.targets);
        total += batch_len;
    }

    if total == 0 {
        return Err(TomatoError::Training(
            "No validation image could be decoded".to_string(),
        ));
    }

    debug!("Validation: {} / {} correct", correct, total);
    Ok((loss_sum / total as f64, correct as f64 / total as f64))
}

fn save_artifact<B: AutodiffBackend>(
    model: &TomatoClassifier<B>,
    model_config: &TomatoClassifierConfig,
    labels: &[String],
    snapshot: Option<(usize, f64)>,
    path: &std::path::Path,
) -> Result<()> {
    let inner = model.valid();
    let mut metadata = ModelMetadata::new(&inner, model_config, labels.to_vec());
    if let Some((epoch, val_accuracy)) = snapshot {
        metadata = metadata.with_snapshot(epoch, val_accuracy);
    }
    ModelArtifact::new(inner, metadata).save(path)?;
    Ok(())
}
