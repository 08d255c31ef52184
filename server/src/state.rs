//! Application state for the inference server
//!
//! Holds the loaded model (if any) and startup information.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use tomato_leaf::backend::{default_device, InferenceBackend};
use tomato_leaf::model::artifact::weights_path;
use tomato_leaf::{ModelMetadata, Predictor};

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Model artifact stem (or `.mpk` / `.json` path)
    pub model_path: PathBuf,
}

/// Short description of the loaded model
#[derive(Clone, Debug, Serialize)]
pub struct ModelSummary {
    pub path: String,
    pub architecture: String,
    pub num_classes: usize,
    pub total_params: usize,
    pub val_accuracy: Option<f64>,
}

/// The loaded model with its metadata
///
/// Metadata is copied out so read-only routes never wait on the predictor lock.
pub struct LoadedModel {
    pub predictor: Mutex<Predictor<InferenceBackend>>,
    pub metadata: ModelMetadata,
    pub summary: ModelSummary,
}

/// Shared application state
pub struct AppState {
    /// Server configuration
    pub config: ServerConfig,
    /// `None` when no usable artifact was found at startup
    pub model: Option<Arc<LoadedModel>>,
    /// Server start time
    pub started_at: Instant,
    pub started_at_utc: DateTime<Utc>,
}

impl AppState {
    /// Load the model once; a missing or broken artifact leaves the server degraded
    pub fn load(config: ServerConfig) -> Self {
        let model = match Predictor::<InferenceBackend>::load(&config.model_path, &default_device()) {
            Ok(predictor) => {
                info!(
                    "Model loaded from {:?} ({} classes)",
                    weights_path(&config.model_path),
                    predictor.labels().len()
                );
                Some(Arc::new(LoadedModel::new(predictor, &config.model_path)))
            }
            Err(e) => {
                warn!(
                    "No model loaded from {:?}: {}. /predict will return 503",
                    config.model_path, e
                );
                None
            }
        };

        Self::with_model(config, model)
    }

    pub fn with_model(config: ServerConfig, model: Option<Arc<LoadedModel>>) -> Self {
        Self {
            config,
            model,
            started_at: Instant::now(),
            started_at_utc: Utc::now(),
        }
    }

    pub fn model_loaded(&self) -> bool {
        self.model.is_some()
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

impl LoadedModel {
    pub fn new(predictor: Predictor<InferenceBackend>, path: &std::path::Path) -> Self {
        let metadata = predictor.metadata().clone();
        let summary = ModelSummary {
            path: weights_path(path).display().to_string(),
            architecture: metadata.architecture.clone(),
            num_classes: metadata.num_classes,
            total_params: predictor.num_params(),
            val_accuracy: metadata.val_accuracy,
        };

        Self {
            predictor: Mutex::new(predictor),
            metadata,
            summary,
        }
    }
}

pub type SharedState = Arc<AppState>;
