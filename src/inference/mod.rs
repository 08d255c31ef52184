//! Inference module for model prediction
//!
//! This module provides:
//! - Deterministic request-time preprocessing (image bytes or feature vectors)
//! - A `Predictor` wrapping a loaded model artifact
//! - Labelled evaluation of image folders named after their class
//!
//! The same `Predictor` backs the CLI `infer` command and the HTTP server.

pub mod evaluation;
pub mod predictor;
pub mod preprocess;

// Re-export main types for convenience
pub use evaluation::{collect_images, evaluate_images, expected_label, ImageOutcome, LabelledTally};
pub use predictor::{PredictionResult, Predictor, RankedClass};
