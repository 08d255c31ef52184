//! # Tomato Leaf Disease Classifier
//!
//! A Rust library for classifying tomato leaf diseases with a small CNN built
//! on the Burn framework.
//!
//! ## Modules
//!
//! - `dataset`: Directory loading, class labels, augmentation and Burn batching
//! - `model`: CNN architecture and the on-disk model artifact
//! - `training`: Training loop, early stopping and learning rate reduction
//! - `inference`: Preprocessing and prediction with a loaded artifact
//! - `utils`: Logging, errors and formatting helpers
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tomato_leaf::backend::{default_device, DefaultBackend};
//! use tomato_leaf::inference::Predictor;
//!
//! let predictor = Predictor::<DefaultBackend>::load("output/best_tomato_model", &default_device())?;
//! let bytes = std::fs::read("leaf.jpg")?;
//! let result = predictor.predict_bytes(&bytes)?;
//! println!("{} ({:.2}%)", result.label, result.confidence * 100.0);
//! ```

pub mod backend;
pub mod dataset;
pub mod inference;
pub mod model;
pub mod training;
pub mod utils;

// Re-export commonly used items for convenience
pub use dataset::loader::{DatasetSplit, TomatoDataset};
pub use dataset::{LeafBatch, LeafBatcher, LeafItem};
pub use inference::predictor::{PredictionResult, Predictor};
pub use model::artifact::{ModelArtifact, ModelMetadata};
pub use model::cnn::{TomatoClassifier, TomatoClassifierConfig};
pub use training::{TrainingConfig, TrainingReport};
pub use utils::error::{Result, TomatoError};

/// Number of tomato leaf classes (nine diseases plus healthy)
pub const NUM_CLASSES: usize = 10;

/// Input image size (square) expected by the network
pub const IMAGE_SIZE: usize = 128;

/// Number of colour channels expected by the network
pub const CHANNELS: usize = 3;

/// Version of the library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
