//! Training module for the tomato leaf classifier
//!
//! This module provides:
//! - Main training loop with Burn framework
//! - Best-snapshot, early-stopping and plateau learning rate policies
//! - Training configuration and the persisted training record
//!
//! ## Outputs
//!
//! A run writes four things into the output directory:
//! 1. `best_tomato_model.{mpk,json}` whenever validation accuracy strictly improves
//! 2. `tomato_model_final.{mpk,json}` when the run ends
//! 3. `training_info.json` with the per-epoch history and summary
//! 4. `training_history.svg` with the accuracy and loss curves

pub mod callbacks;
pub mod config;
pub mod history;
pub mod supervised;

// Re-export main types for convenience
pub use callbacks::{BestCheckpoint, EarlyStopping, EpochMetrics, Monitor, ReduceOnPlateau};
pub use config::TrainingConfig;
pub use history::{EpochRecord, StopReason, TrainingReport};
pub use supervised::run_training;
