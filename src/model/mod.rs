//! Model module for the CNN architecture using the Burn framework
//!
//! This module provides:
//! - The tomato leaf CNN and its configuration
//! - The on-disk model artifact (weights + metadata sidecar)

pub mod artifact;
pub mod cnn;

// Re-export main types for convenience
pub use artifact::{LayerKind, LayerSpec, ModelArtifact, ModelMetadata};
pub use cnn::{TomatoClassifier, TomatoClassifierConfig};
