//! Epoch-end bookkeeping policies
//!
//! - [`BestCheckpoint`]: keep the snapshot with the best validation accuracy
//! - [`EarlyStopping`]: stop after `patience` epochs without improvement
//! - [`ReduceOnPlateau`]: scale the learning rate down when a metric stalls
//!
//! Each policy only sees the metrics of a finished epoch and reports what
//! the training loop should do; none of them touches the model.

use serde::{Deserialize, Serialize};

/// Metrics of one finished epoch
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochMetrics {
    pub train_loss: f64,
    pub train_accuracy: f64,
    pub val_loss: f64,
    pub val_accuracy: f64,
}

/// Metric watched by a policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Monitor {
    ValAccuracy,
    ValLoss,
}

impl Monitor {
    /// Direction in which the metric improves
    pub fn mode(&self) -> PlateauMode {
        match self {
            Monitor::ValAccuracy => PlateauMode::Max,
            Monitor::ValLoss => PlateauMode::Min,
        }
    }

    /// Read the watched value from the epoch metrics
    pub fn value(&self, metrics: &EpochMetrics) -> f64 {
        match self {
            Monitor::ValAccuracy => metrics.val_accuracy,
            Monitor::ValLoss => metrics.val_loss,
        }
    }
}

impl std::fmt::Display for Monitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Monitor::ValAccuracy => write!(f, "val_accuracy"),
            Monitor::ValLoss => write!(f, "val_loss"),
        }
    }
}

/// Mode for plateau detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlateauMode {
    /// Metric should decrease (e.g., loss)
    Min,
    /// Metric should increase (e.g., accuracy)
    Max,
}

impl PlateauMode {
    fn initial_best(&self) -> f64 {
        match self {
            PlateauMode::Min => f64::INFINITY,
            PlateauMode::Max => f64::NEG_INFINITY,
        }
    }

    /// Whether `current` beats `best` by more than `min_delta`
    ///
    /// NaN never counts as an improvement.
    pub fn improved(&self, current: f64, best: f64, min_delta: f64) -> bool {
        match self {
            PlateauMode::Min => current < best - min_delta,
            PlateauMode::Max => current > best + min_delta,
        }
    }
}

/// Tracks the best validation accuracy for snapshotting
#[derive(Debug, Clone)]
pub struct BestCheckpoint {
    best_accuracy: f64,
    best_epoch: Option<usize>,
}

impl Default for BestCheckpoint {
    fn default() -> Self {
        Self::new()
    }
}

impl BestCheckpoint {
    pub fn new() -> Self {
        Self {
            best_accuracy: f64::NEG_INFINITY,
            best_epoch: None,
        }
    }

    /// Record an epoch; returns true when the snapshot should be saved
    ///
    /// Only a strict improvement over the best accuracy seen counts.
    pub fn update(&mut self, epoch: usize, val_accuracy: f64) -> bool {
        if val_accuracy > self.best_accuracy {
            self.best_accuracy = val_accuracy;
            self.best_epoch = Some(epoch);
            true
        } else {
            false
        }
    }

    /// Best accuracy seen so far (0 before the first epoch)
    pub fn best_accuracy(&self) -> f64 {
        if self.best_epoch.is_some() {
            self.best_accuracy
        } else {
            0.0
        }
    }

    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }
}

/// Outcome of an early-stopping update
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StopDecision {
    /// The monitored metric reached a new best this epoch
    pub improved: bool,
    /// Training should stop after this epoch
    pub stop: bool,
}

/// Stops training when the monitored metric stalls
#[derive(Debug, Clone)]
pub struct EarlyStopping {
    monitor: Monitor,
    patience: usize,
    min_delta: f64,
    best: f64,
    best_epoch: Option<usize>,
    wait: usize,
}

impl EarlyStopping {
    pub fn new(monitor: Monitor, patience: usize, min_delta: f64) -> Self {
        Self {
            monitor,
            patience,
            min_delta: min_delta.abs(),
            best: monitor.mode().initial_best(),
            best_epoch: None,
            wait: 0,
        }
    }

    /// Record an epoch's metrics
    pub fn update(&mut self, epoch: usize, metrics: &EpochMetrics) -> StopDecision {
        let current = self.monitor.value(metrics);
        let improved = self.monitor.mode().improved(current, self.best, self.min_delta);

        if improved {
            self.best = current;
            self.best_epoch = Some(epoch);
            self.wait = 0;
        } else {
            self.wait += 1;
        }

        let stop = self.patience > 0 && self.wait >= self.patience;
        StopDecision { improved, stop }
    }

    /// Consecutive epochs without improvement
    pub fn wait(&self) -> usize {
        self.wait
    }

    /// Epoch of the best monitored value
    pub fn best_epoch(&self) -> Option<usize> {
        self.best_epoch
    }
}

/// Reduce-on-plateau learning rate state
#[derive(Debug, Clone)]
pub struct ReduceOnPlateau {
    monitor: Monitor,
    best_metric: f64,
    epochs_without_improvement: usize,
    current_lr: f64,
    reduction_factor: f64,
    patience: usize,
    min_lr: f64,
    min_delta: f64,
}

impl ReduceOnPlateau {
    /// Create a new reduce-on-plateau state
    pub fn new(
        monitor: Monitor,
        initial_lr: f64,
        reduction_factor: f64,
        patience: usize,
        min_lr: f64,
        min_delta: f64,
    ) -> Self {
        Self {
            monitor,
            best_metric: monitor.mode().initial_best(),
            epochs_without_improvement: 0,
            current_lr: initial_lr,
            reduction_factor,
            patience,
            min_lr,
            min_delta: min_delta.abs(),
        }
    }

    /// Update with an epoch's metrics and return the learning rate for the next epoch
    ///
    /// After `patience` non-improving epochs the rate is multiplied by the
    /// reduction factor (never below `min_lr`) and the wait counter resets.
    pub fn step(&mut self, metrics: &EpochMetrics) -> f64 {
        let metric = self.monitor.value(metrics);

        if self.monitor.mode().improved(metric, self.best_metric, self.min_delta) {
            self.best_metric = metric;
            self.epochs_without_improvement = 0;
        } else {
            self.epochs_without_improvement += 1;

            if self.patience > 0 && self.epochs_without_improvement >= self.patience {
                let new_lr = (self.current_lr * self.reduction_factor).max(self.min_lr);
                if new_lr < self.current_lr {
                    self.current_lr = new_lr;
                    self.epochs_without_improvement = 0;
                }
            }
        }

        self.current_lr
    }

    /// Get the current learning rate
    pub fn get_lr(&self) -> f64 {
        self.current_lr
    }
}
