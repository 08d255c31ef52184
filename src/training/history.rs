//! Training history and the `training_info.json` record

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dataset::loader::ValidationSource;
use crate::training::config::TrainingConfig;
use crate::utils::charts::{
    generate_line_charts, DataSeries, LineChart, COLOR_TRAIN, COLOR_VALIDATION,
};
use crate::utils::error::Result;
use crate::utils::format_duration;

/// Metrics that can diverge are written as `null` and read back as NaN
mod metric {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_finite() {
            serializer.serialize_f64(*value)
        } else {
            serializer.serialize_none()
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
    }
}

/// Metrics recorded for one epoch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    /// 1-based epoch number
    pub epoch: usize,
    #[serde(with = "metric")]
    pub train_loss: f64,
    #[serde(with = "metric")]
    pub train_accuracy: f64,
    #[serde(with = "metric")]
    pub val_loss: f64,
    #[serde(with = "metric")]
    pub val_accuracy: f64,
    /// Learning rate used during this epoch
    pub learning_rate: f64,
    pub duration_secs: f64,
    /// A new best snapshot was saved after this epoch
    pub is_best: bool,
}

/// Why training ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum StopReason {
    /// All configured epochs ran
    Completed,
    /// Early stopping fired after `epoch`
    EarlyStopped { epoch: usize, restored_epoch: Option<usize> },
}

/// Summary of a finished training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub training_time_secs: f64,
    pub training_time: String,
    pub epochs_completed: usize,
    #[serde(with = "metric")]
    pub final_train_accuracy: f64,
    #[serde(with = "metric")]
    pub final_val_accuracy: f64,
    #[serde(with = "metric")]
    pub final_train_loss: f64,
    #[serde(with = "metric")]
    pub final_val_loss: f64,
    pub best_val_accuracy: f64,
    pub best_epoch: Option<usize>,
    pub stop_reason: StopReason,
    pub class_names: Vec<String>,
    pub total_params: usize,
    pub train_samples: usize,
    pub val_samples: usize,
    pub validation_source: ValidationSource,
    pub best_model_path: PathBuf,
    pub final_model_path: PathBuf,
    pub backend: String,
    pub finished_at: DateTime<Utc>,
    pub history: Vec<EpochRecord>,
    pub config: TrainingConfig,
}

/// Fields of a report known once the dataset and model exist
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub class_names: Vec<String>,
    pub total_params: usize,
    pub train_samples: usize,
    pub val_samples: usize,
    pub validation_source: ValidationSource,
}

impl TrainingReport {
    /// Assemble the report from the epoch history
    pub fn from_history(
        history: Vec<EpochRecord>,
        summary: RunSummary,
        stop_reason: StopReason,
        best_epoch: Option<usize>,
        elapsed_secs: f64,
        config: &TrainingConfig,
    ) -> Self {
        let last = history.last();
        let best_val_accuracy = history
            .iter()
            .map(|r| r.val_accuracy)
            .fold(0.0f64, f64::max);

        Self {
            training_time_secs: elapsed_secs,
            training_time: format_duration(elapsed_secs),
            epochs_completed: history.len(),
            final_train_accuracy: last.map(|r| r.train_accuracy).unwrap_or(0.0),
            final_val_accuracy: last.map(|r| r.val_accuracy).unwrap_or(0.0),
            final_train_loss: last.map(|r| r.train_loss).unwrap_or(0.0),
            final_val_loss: last.map(|r| r.val_loss).unwrap_or(0.0),
            best_val_accuracy,
            best_epoch,
            stop_reason,
            class_names: summary.class_names,
            total_params: summary.total_params,
            train_samples: summary.train_samples,
            val_samples: summary.val_samples,
            validation_source: summary.validation_source,
            best_model_path: config.best_model_path(),
            final_model_path: config.final_model_path(),
            backend: crate::backend::backend_name().to_string(),
            finished_at: Utc::now(),
            history,
            config: config.clone(),
        }
    }

    /// Write the record as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Read a record back
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Accuracy and loss panels, training and validation curves per epoch
    pub fn history_charts(&self) -> [LineChart; 2] {
        let series = |metric: fn(&EpochRecord) -> f64| -> Vec<(f64, f64)> {
            self.history.iter().map(|r| (r.epoch as f64, metric(r))).collect()
        };

        let train_acc = DataSeries::new("train", series(|r| r.train_accuracy), COLOR_TRAIN);
        let val_acc = DataSeries::new("validation", series(|r| r.val_accuracy), COLOR_VALIDATION);
        let train_loss = DataSeries::new("train", series(|r| r.train_loss), COLOR_TRAIN);
        let val_loss = DataSeries::new("validation", series(|r| r.val_loss), COLOR_VALIDATION);

        let accuracy = LineChart::new("Model Accuracy", "Epoch", "Accuracy")
            .with_y_range(0.0, 1.0)
            .with_series(train_acc)
            .with_series(val_acc);
        let loss = LineChart::new("Model Loss", "Epoch", "Loss")
            .with_series(train_loss)
            .with_series(val_loss);

        [accuracy, loss]
    }

    /// Write the accuracy and loss curves as an SVG file
    pub fn write_history_chart<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        generate_line_charts(&self.history_charts(), path.as_ref())?;
        Ok(())
    }
}
