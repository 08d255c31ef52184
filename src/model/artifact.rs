//! Model artifact: weights plus a JSON metadata sidecar
//!
//! An artifact named `output/best_tomato_model` is stored as two files:
//! - `output/best_tomato_model.mpk`: the weights (burn `CompactRecorder`)
//! - `output/best_tomato_model.json`: [`ModelMetadata`]
//!
//! Loading rebuilds the network from the stored configuration and checks
//! that every weight shape matches the recorded layer specs.

use std::path::{Path, PathBuf};

use burn::module::Module;
use burn::record::CompactRecorder;
use burn::tensor::backend::Backend;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::dataset::CLASS_NAMES;
use crate::model::cnn::{TomatoClassifier, TomatoClassifierConfig};
use crate::utils::error::{Result, TomatoError};

/// Architecture identifier written into the metadata
pub const ARCHITECTURE: &str = "tomato_leaf_cnn";

/// Kind of a parameterized layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerKind {
    Conv2d,
    BatchNorm,
    Dense,
}

/// Description of one parameterized layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub name: String,
    pub kind: LayerKind,
    /// Kernel shape: `[out, in, kh, kw]` for conv, `[features]` for batch norm,
    /// `[in, out]` for dense
    pub shape: Vec<usize>,
    pub activation: Option<String>,
    /// Trainable parameters of the layer
    pub params: usize,
}

impl LayerSpec {
    pub fn conv(index: usize, out_channels: usize, in_channels: usize, kernel: usize) -> Self {
        Self {
            name: format!("conv2d_{}", index),
            kind: LayerKind::Conv2d,
            shape: vec![out_channels, in_channels, kernel, kernel],
            activation: Some("relu".to_string()),
            params: out_channels * in_channels * kernel * kernel + out_channels,
        }
    }

    pub fn batch_norm(index: usize, features: usize) -> Self {
        Self {
            name: format!("batch_norm_{}", index),
            kind: LayerKind::BatchNorm,
            shape: vec![features],
            activation: None,
            params: 2 * features,
        }
    }

    pub fn dense(name: &str, inputs: usize, outputs: usize, activation: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: LayerKind::Dense,
            shape: vec![inputs, outputs],
            activation: Some(activation.to_string()),
            params: inputs * outputs + outputs,
        }
    }
}

/// Metadata sidecar of a model artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub architecture: String,
    /// `[height, width, channels]`
    pub input_shape: [usize; 3],
    pub num_classes: usize,
    /// Class labels in output order
    #[serde(default)]
    pub labels: Vec<String>,
    pub layers: Vec<LayerSpec>,
    pub total_params: usize,
    pub config: TomatoClassifierConfig,
    pub created_at: DateTime<Utc>,
    pub library_version: String,
    /// Validation accuracy when the snapshot was taken
    #[serde(default)]
    pub val_accuracy: Option<f64>,
    /// Epoch (1-based) when the snapshot was taken
    #[serde(default)]
    pub epoch: Option<usize>,
}

impl ModelMetadata {
    /// Describe a model built from `config`
    pub fn new<B: Backend>(
        model: &TomatoClassifier<B>,
        config: &TomatoClassifierConfig,
        labels: Vec<String>,
    ) -> Self {
        Self {
            architecture: ARCHITECTURE.to_string(),
            input_shape: [config.input_size, config.input_size, config.in_channels],
            num_classes: config.num_classes,
            labels,
            layers: model.layer_specs(),
            total_params: model.num_params(),
            config: config.clone(),
            created_at: Utc::now(),
            library_version: crate::VERSION.to_string(),
            val_accuracy: None,
            epoch: None,
        }
    }

    /// Attach the validation accuracy and epoch of a training snapshot
    pub fn with_snapshot(mut self, epoch: usize, val_accuracy: f64) -> Self {
        self.epoch = Some(epoch);
        self.val_accuracy = Some(val_accuracy);
        self
    }

    /// Output shape of the network for a single input
    pub fn output_shape(&self) -> [usize; 1] {
        [self.num_classes]
    }

    /// Length of a flat feature vector accepted by the network
    pub fn feature_len(&self) -> usize {
        self.input_shape.iter().product()
    }

    /// The declared input shape must be the one the stored config builds
    fn check_input_shape(&self) -> Result<()> {
        let built = [self.config.input_size, self.config.input_size, self.config.in_channels];
        if self.input_shape != built {
            return Err(TomatoError::Model(format!(
                "metadata input shape {:?} does not match the network config {:?}",
                self.input_shape, built
            )));
        }
        Ok(())
    }

    /// Labels to report, falling back to the default class names
    fn resolved_labels(&self) -> Result<Vec<String>> {
        if self.labels.is_empty() {
            if self.num_classes != CLASS_NAMES.len() {
                return Err(TomatoError::Model(format!(
                    "metadata lists no labels and {} classes has no default label set",
                    self.num_classes
                )));
            }
            return Ok(CLASS_NAMES.iter().map(|s| s.to_string()).collect());
        }

        if self.labels.len() != self.num_classes {
            return Err(TomatoError::Model(format!(
                "metadata lists {} labels for {} classes",
                self.labels.len(),
                self.num_classes
            )));
        }

        Ok(self.labels.clone())
    }
}

/// Strip a trailing `.mpk` or `.json` so both files can be addressed
pub fn artifact_stem<P: AsRef<Path>>(path: P) -> PathBuf {
    let path = path.as_ref();
    match path.extension().and_then(|e| e.to_str()) {
        Some("mpk") | Some("json") => path.with_extension(""),
        _ => path.to_path_buf(),
    }
}

/// Path of the weight file for an artifact stem
pub fn weights_path<P: AsRef<Path>>(stem: P) -> PathBuf {
    artifact_stem(stem).with_extension("mpk")
}

/// Path of the metadata sidecar for an artifact stem
pub fn metadata_path<P: AsRef<Path>>(stem: P) -> PathBuf {
    artifact_stem(stem).with_extension("json")
}

/// A loaded (or about to be saved) model with its metadata
#[derive(Debug)]
pub struct ModelArtifact<B: Backend> {
    pub model: TomatoClassifier<B>,
    pub metadata: ModelMetadata,
}

impl<B: Backend> ModelArtifact<B> {
    pub fn new(model: TomatoClassifier<B>, metadata: ModelMetadata) -> Self {
        Self { model, metadata }
    }

    /// Write the weights and the metadata sidecar
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<PathBuf> {
        let stem = artifact_stem(path);
        if let Some(parent) = stem.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        self.model
            .clone()
            .save_file(stem.clone(), &CompactRecorder::new())
            .map_err(|e| TomatoError::Model(format!("Failed to save weights: {:?}", e)))?;

        let json = serde_json::to_string_pretty(&self.metadata)?;
        std::fs::write(metadata_path(&stem), json)?;

        info!("Saved model artifact to {:?}", weights_path(&stem));
        Ok(stem)
    }

    /// Load an artifact and verify its weight shapes
    pub fn load<P: AsRef<Path>>(path: P, device: &B::Device) -> Result<Self> {
        let stem = artifact_stem(path);
        let weights = weights_path(&stem);
        if !weights.is_file() {
            return Err(TomatoError::PathNotFound(weights));
        }

        let mut metadata = read_metadata(&stem)?;
        metadata.labels = metadata.resolved_labels()?;
        metadata.check_input_shape()?;

        let model = TomatoClassifier::<B>::new(&metadata.config, device)
            .load_file(stem.clone(), &CompactRecorder::new(), device)
            .map_err(|e| TomatoError::Model(format!("Failed to load weights {:?}: {:?}", weights, e)))?;

        verify_layers(&metadata.layers, &model.layer_specs())?;

        if model.num_classes() != metadata.num_classes {
            return Err(TomatoError::Model(format!(
                "model has {} outputs but metadata declares {} classes",
                model.num_classes(),
                metadata.num_classes
            )));
        }

        info!(
            "Loaded model artifact {:?} ({} params, {} classes)",
            weights, metadata.total_params, metadata.num_classes
        );

        Ok(Self { model, metadata })
    }
}

/// Read the metadata sidecar, or describe the default network if it is absent
fn read_metadata(stem: &Path) -> Result<ModelMetadata> {
    let path = metadata_path(stem);
    if path.is_file() {
        let json = std::fs::read_to_string(&path)?;
        return serde_json::from_str(&json)
            .map_err(|e| TomatoError::Model(format!("Invalid metadata {:?}: {}", path, e)));
    }

    warn!("No metadata sidecar at {:?}, assuming the default architecture", path);
    let config = TomatoClassifierConfig::new();
    Ok(ModelMetadata {
        architecture: ARCHITECTURE.to_string(),
        input_shape: [config.input_size, config.input_size, config.in_channels],
        num_classes: config.num_classes,
        labels: Vec::new(),
        layers: config.layer_specs(),
        total_params: config.layer_specs().iter().map(|l| l.params).sum(),
        config,
        created_at: Utc::now(),
        library_version: crate::VERSION.to_string(),
        val_accuracy: None,
        epoch: None,
    })
}

fn verify_layers(expected: &[LayerSpec], actual: &[LayerSpec]) -> Result<()> {
    if expected.len() != actual.len() {
        return Err(TomatoError::Model(format!(
            "metadata lists {} layers, weights have {}",
            expected.len(),
            actual.len()
        )));
    }

    for (e, a) in expected.iter().zip(actual) {
        if e.kind != a.kind || e.shape != a.shape {
            return Err(TomatoError::Model(format!(
                "layer '{}' shape mismatch: metadata {:?} {:?}, weights {:?} {:?}",
                e.name, e.kind, e.shape, a.kind, a.shape
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::{Tensor, TensorData};
    use burn_ndarray::NdArray;
    use tempfile::TempDir;

    type TestBackend = NdArray;

    fn small_config() -> TomatoClassifierConfig {
        TomatoClassifierConfig::new().with_input_size(16).with_base_filters(2).with_dense_units(4)
    }

    fn labels() -> Vec<String> {
        CLASS_NAMES.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_artifact_paths() {
        assert_eq!(artifact_stem("out/model.mpk"), PathBuf::from("out/model"));
        assert_eq!(artifact_stem("out/model.json"), PathBuf::from("out/model"));
        assert_eq!(artifact_stem("out/model"), PathBuf::from("out/model"));
        assert_eq!(weights_path("out/model"), PathBuf::from("out/model.mpk"));
        assert_eq!(metadata_path("out/model.mpk"), PathBuf::from("out/model.json"));
    }

    #[test]
    fn test_round_trip_preserves_predictions() {
        let tmp = TempDir::new().unwrap();
        let device = Default::default();
        let config = small_config();
        let model = TomatoClassifier::<TestBackend>::new(&config, &device);
        let metadata = ModelMetadata::new(&model, &config, labels()).with_snapshot(3, 0.75);

        let input = || {
            Tensor::<TestBackend, 4>::from_floats(
                TensorData::new(vec![0.25f32; 3 * 16 * 16], [1, 3, 16, 16]),
                &device,
            )
        };
        let before = model.forward_softmax(input()).into_data().to_vec::<f32>().unwrap();

        let stem = ModelArtifact::new(model, metadata)
            .save(tmp.path().join("nested/model"))
            .unwrap();
        assert!(weights_path(&stem).is_file());
        assert!(metadata_path(&stem).is_file());

        let loaded = ModelArtifact::<TestBackend>::load(&stem, &device).unwrap();
        let after = loaded.model.forward_softmax(input()).into_data().to_vec::<f32>().unwrap();

        // Weights are stored at half precision
        for (b, a) in before.iter().zip(&after) {
            assert!((b - a).abs() < 1e-2, "{} vs {}", b, a);
        }
        assert_eq!(loaded.metadata.labels.len(), 10);
        assert_eq!(loaded.metadata.epoch, Some(3));
        assert_eq!(loaded.metadata.input_shape, [16, 16, 3]);
    }

    #[test]
    fn test_shape_mismatch_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let device = Default::default();
        let config = small_config();
        let model = TomatoClassifier::<TestBackend>::new(&config, &device);
        let mut metadata = ModelMetadata::new(&model, &config, labels());
        metadata.layers[0].shape = vec![99, 3, 3, 3];

        let stem = ModelArtifact::new(model, metadata).save(tmp.path().join("m")).unwrap();
        let err = ModelArtifact::<TestBackend>::load(&stem, &device).unwrap_err();
        assert!(err.to_string().contains("shape mismatch"));
    }

    #[test]
    fn test_input_shape_mismatch_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let device = Default::default();
        let config = small_config();
        let model = TomatoClassifier::<TestBackend>::new(&config, &device);
        let mut metadata = ModelMetadata::new(&model, &config, labels());
        metadata.input_shape = [128, 128, 3];

        let stem = ModelArtifact::new(model, metadata).save(tmp.path().join("m")).unwrap();
        let err = ModelArtifact::<TestBackend>::load(&stem, &device).unwrap_err();
        assert!(err.to_string().contains("input shape"));
    }

    #[test]
    fn test_label_count_mismatch_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let device = Default::default();
        let config = small_config();
        let model = TomatoClassifier::<TestBackend>::new(&config, &device);
        let metadata = ModelMetadata::new(&model, &config, vec!["Healthy".to_string()]);

        let stem = ModelArtifact::new(model, metadata).save(tmp.path().join("m")).unwrap();
        assert!(ModelArtifact::<TestBackend>::load(&stem, &device).is_err());
    }

    #[test]
    fn test_missing_weights() {
        let tmp = TempDir::new().unwrap();
        let err = ModelArtifact::<TestBackend>::load(tmp.path().join("absent"), &Default::default())
            .unwrap_err();
        assert!(matches!(err, TomatoError::PathNotFound(_)));
    }

    #[test]
    fn test_default_layer_params() {
        let config = TomatoClassifierConfig::new();
        let total: usize = config.layer_specs().iter().map(|l| l.params).sum();
        assert_eq!(total, 4_289_418);
    }
}
