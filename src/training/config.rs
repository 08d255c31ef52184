//! Training Configuration
//!
//! Hyperparameters and bookkeeping policy settings for a training run.
//! Loadable from JSON; every field has a default, so a partial file works.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::dataset::augmentation::AugmentationConfig;
use crate::model::cnn::TomatoClassifierConfig;
use crate::training::callbacks::Monitor;
use crate::utils::error::{Result, TomatoError};

/// File name of the best-accuracy snapshot (without extension)
pub const BEST_MODEL_NAME: &str = "best_tomato_model";

/// File name of the end-of-training model (without extension)
pub const FINAL_MODEL_NAME: &str = "tomato_model_final";

/// File name of the training record
pub const TRAINING_INFO_NAME: &str = "training_info.json";

/// File name of the accuracy and loss curves
pub const HISTORY_CHART_NAME: &str = "training_history.svg";

/// Training configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Dataset root containing `train/` and optionally `val/`
    pub data_dir: PathBuf,

    /// Directory receiving model artifacts and the training record
    pub output_dir: PathBuf,

    /// Number of training epochs
    pub epochs: usize,

    /// Batch size for training and evaluation
    pub batch_size: usize,

    /// Initial learning rate (Adam)
    pub learning_rate: f64,

    /// Fraction of each class held out when there is no `val/` directory
    pub validation_split: f64,

    /// Random seed for shuffling and augmentation
    pub seed: u64,

    /// Apply random augmentation to training images
    pub augment: bool,

    /// Augmentation ranges
    pub augmentation: AugmentationConfig,

    /// Metric watched by early stopping
    pub early_stopping_monitor: Monitor,

    /// Epochs without improvement before stopping (0 disables)
    pub early_stopping_patience: usize,

    /// Minimum change that counts as an improvement
    pub min_delta: f64,

    /// Restore the weights of the best early-stopping epoch when stopping early
    pub restore_best_weights: bool,

    /// Metric watched by the learning rate reduction
    pub lr_monitor: Monitor,

    /// Learning rate multiplier applied on a plateau
    pub lr_reduce_factor: f64,

    /// Epochs without improvement before reducing the learning rate
    pub lr_patience: usize,

    /// Lower bound of the learning rate
    pub min_lr: f64,

    /// Use at most this many images per class (quick runs)
    pub max_samples_per_class: Option<usize>,

    /// Network architecture; `num_classes` is taken from the dataset
    pub model: TomatoClassifierConfig,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            output_dir: PathBuf::from("output"),
            epochs: 10,
            batch_size: 32,
            learning_rate: 1e-3,
            validation_split: 0.2,
            seed: 42,
            augment: true,
            augmentation: AugmentationConfig::default(),
            early_stopping_monitor: Monitor::ValAccuracy,
            early_stopping_patience: 10,
            min_delta: 0.0,
            restore_best_weights: true,
            lr_monitor: Monitor::ValLoss,
            lr_reduce_factor: 0.5,
            lr_patience: 5,
            min_lr: 1e-7,
            max_samples_per_class: None,
            model: TomatoClassifierConfig::new(),
        }
    }
}

impl TrainingConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let fail = |msg: &str| Err(TomatoError::Config(msg.to_string()));

        if self.epochs == 0 {
            return fail("epochs must be greater than 0");
        }
        if self.batch_size == 0 {
            return fail("batch_size must be greater than 0");
        }
        if !(self.learning_rate > 0.0) {
            return fail("learning_rate must be positive");
        }
        if !(0.0..1.0).contains(&self.validation_split) {
            return fail("validation_split must be in [0, 1)");
        }
        if !(self.lr_reduce_factor > 0.0 && self.lr_reduce_factor < 1.0) {
            return fail("lr_reduce_factor must be in (0, 1)");
        }
        if !(self.min_delta.is_finite() && self.min_delta >= 0.0) {
            return fail("min_delta must be finite and non-negative");
        }
        if self.min_lr < 0.0 || self.min_lr > self.learning_rate {
            return fail("min_lr must be in [0, learning_rate]");
        }
        if self.model.input_size == 0 || self.model.input_size % 8 != 0 {
            return fail("model.input_size must be a positive multiple of 8");
        }
        if self.max_samples_per_class == Some(0) {
            return fail("max_samples_per_class must be greater than 0");
        }

        Ok(())
    }

    /// Path stem of the best snapshot
    pub fn best_model_path(&self) -> PathBuf {
        self.output_dir.join(BEST_MODEL_NAME)
    }

    /// Path stem of the final model
    pub fn final_model_path(&self) -> PathBuf {
        self.output_dir.join(FINAL_MODEL_NAME)
    }

    /// Path of the training record
    pub fn training_info_path(&self) -> PathBuf {
        self.output_dir.join(TRAINING_INFO_NAME)
    }

    /// Path of the training curves chart
    pub fn history_chart_path(&self) -> PathBuf {
        self.output_dir.join(HISTORY_CHART_NAME)
    }

    /// Save configuration to a JSON file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load configuration from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| TomatoError::Config(format!("Cannot read {:?}: {}", path, e)))?;
        serde_json::from_str(&json)
            .map_err(|e| TomatoError::Config(format!("Invalid config {:?}: {}", path, e)))
    }
}
