//! Logging Module
//!
//! Structured logging for the CLI, the training loop and the inference
//! server, built on `tracing`. `RUST_LOG` overrides the configured level.

use std::time::{Duration, Instant};

use tracing::{debug, info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::training::history::EpochRecord;

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Minimum log level to display
    pub level: LogLevel,
    /// Whether to include target (module path)
    pub include_target: bool,
    /// Whether to include thread IDs
    pub include_thread_ids: bool,
    /// Whether to use ANSI colors
    pub ansi_colors: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            include_target: false,
            include_thread_ids: false,
            ansi_colors: true,
        }
    }
}

impl LogConfig {
    /// Debug level with module paths and thread ids
    pub fn verbose() -> Self {
        Self {
            level: LogLevel::Debug,
            include_target: true,
            include_thread_ids: true,
            ..Self::default()
        }
    }

    /// Plain output for log collectors
    pub fn production() -> Self {
        Self {
            include_target: true,
            ansi_colors: false,
            ..Self::default()
        }
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }
}

/// Log level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    const ALL: [LogLevel; 5] = [
        LogLevel::Trace,
        LogLevel::Debug,
        LogLevel::Info,
        LogLevel::Warn,
        LogLevel::Error,
    ];

    /// Filter directive name
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Parse a level name; unknown names fall back to `Info`
    pub fn parse(s: &str) -> Self {
        let s = s.trim().to_ascii_lowercase();
        if s == "warning" {
            return LogLevel::Warn;
        }
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .unwrap_or(LogLevel::Info)
    }
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filter used when `RUST_LOG` is unset or invalid
pub fn default_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::new(level.as_str())
}

/// Install the global subscriber
///
/// Returns an error message if a global subscriber was already installed.
pub fn init_logging(config: &LogConfig) -> Result<(), String> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(config.level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_ansi(config.ansi_colors)
        .with_target(config.include_target)
        .with_thread_ids(config.include_thread_ids)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| format!("Failed to initialize logging: {}", e))
}

/// Emits the structured events of a training run
pub struct TrainingLogger {
    total_epochs: usize,
    epoch_start: Instant,
    run_start: Instant,
}

impl TrainingLogger {
    pub fn new(total_epochs: usize) -> Self {
        let now = Instant::now();
        Self {
            total_epochs,
            epoch_start: now,
            run_start: now,
        }
    }

    /// Mark the start of epoch `epoch` (1-based)
    pub fn start_epoch(&mut self, epoch: usize) {
        self.epoch_start = Instant::now();
        debug!("Epoch {}/{} started", epoch, self.total_epochs);
    }

    /// Time spent in the current epoch
    pub fn epoch_elapsed(&self) -> Duration {
        self.epoch_start.elapsed()
    }

    /// Estimated time left, from the mean duration of the epochs run so far
    pub fn eta(&self, epochs_done: usize) -> Duration {
        if epochs_done == 0 {
            return Duration::ZERO;
        }
        let remaining = self.total_epochs.saturating_sub(epochs_done) as u32;
        (self.run_start.elapsed() / epochs_done as u32) * remaining
    }

    pub fn end_epoch(&self, record: &EpochRecord) {
        info!(
            epoch = record.epoch,
            train_loss = record.train_loss,
            train_accuracy = record.train_accuracy,
            val_loss = record.val_loss,
            val_accuracy = record.val_accuracy,
            learning_rate = record.learning_rate,
            "Epoch {}/{} done in {:.1}s (ETA {:.0}s)",
            record.epoch,
            self.total_epochs,
            record.duration_secs,
            self.eta(record.epoch).as_secs_f64()
        );
    }

    pub fn log_new_best(&self, epoch: usize, val_accuracy: f64) {
        info!(epoch, val_accuracy, "New best model saved");
    }

    pub fn log_lr_reduced(&self, from: f64, to: f64) {
        info!(from, to, "Learning rate reduced");
    }

    pub fn log_early_stop(
        &self,
        epoch: usize,
        epochs_without_improvement: usize,
        best_epoch: Option<usize>,
    ) {
        warn!(
            epoch,
            best_epoch,
            "Early stopping: no improvement for {} epochs",
            epochs_without_improvement
        );
    }

    pub fn log_complete(&self, epochs_run: usize, best_val_accuracy: f64) {
        info!(
            epochs_run,
            best_val_accuracy,
            "Training finished in {:.1}s",
            self.run_start.elapsed().as_secs_f64()
        );
    }

    /// Wall-clock time since the run started
    pub fn elapsed(&self) -> Duration {
        self.run_start.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parse() {
        assert_eq!(LogLevel::parse("debug"), LogLevel::Debug);
        assert_eq!(LogLevel::parse(" INFO "), LogLevel::Info);
        assert_eq!(LogLevel::parse("Warning"), LogLevel::Warn);
        assert_eq!(LogLevel::parse("loud"), LogLevel::Info);
        assert_eq!(Level::from(LogLevel::Error), Level::ERROR);
        assert_eq!(LogLevel::Trace.to_string(), "trace");
    }

    #[test]
    fn test_presets() {
        assert!(LogConfig::verbose().include_thread_ids);
        let production = LogConfig::production().with_level(LogLevel::Warn);
        assert_eq!(production.level, LogLevel::Warn);
        assert!(!production.ansi_colors);
    }

    #[test]
    fn test_eta_is_zero_before_first_epoch_and_after_last() {
        let logger = TrainingLogger::new(3);
        assert_eq!(logger.eta(0), Duration::ZERO);
        assert_eq!(logger.eta(3), Duration::ZERO);
        // Overshooting the epoch count must not underflow
        assert_eq!(logger.eta(5), Duration::ZERO);
    }
}
