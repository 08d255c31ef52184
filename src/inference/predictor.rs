//! Inference Predictor Module
//!
//! Runs a loaded model artifact on images or raw feature vectors and turns
//! the softmax output into a labelled prediction.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use burn::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::dataset::is_healthy;
use crate::inference::preprocess::{chw_to_tensor, decode_image, features_to_chw, image_to_chw, open_image};
use crate::model::artifact::{ModelArtifact, ModelMetadata};
use crate::model::cnn::TomatoClassifier;
use crate::utils::error::{Result, TomatoError};

/// Number of ranked predictions kept in a result
pub const TOP_K: usize = 3;

/// One entry of the ranked predictions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedClass {
    pub class_index: usize,
    pub label: String,
    pub probability: f32,
}

/// Result of a single prediction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Path to the input image (if applicable)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_path: Option<PathBuf>,

    /// Predicted class label
    pub label: String,

    /// Predicted class index
    pub class_index: usize,

    /// Probability of the predicted class, in [0, 1]
    pub confidence: f32,

    /// Whether the predicted class is the healthy class
    pub is_healthy: bool,

    /// Probability of every class, keyed by label
    pub probabilities: BTreeMap<String, f32>,

    /// Highest ranked classes, best first
    pub top_k: Vec<RankedClass>,

    /// Inference time in milliseconds
    pub inference_time_ms: f64,
}

impl PredictionResult {
    /// Build a result from a probability distribution and the label list
    pub fn new(
        probabilities: &[f32],
        labels: &[String],
        inference_time: Duration,
        image_path: Option<PathBuf>,
    ) -> Result<Self> {
        if probabilities.len() != labels.len() || probabilities.is_empty() {
            return Err(TomatoError::Model(format!(
                "model produced {} probabilities for {} labels",
                probabilities.len(),
                labels.len()
            )));
        }

        let mut ranked: Vec<(usize, f32)> = probabilities.iter().copied().enumerate().collect();
        // Stable sort keeps the lower index first on ties
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

        let (class_index, confidence) = ranked[0];
        let label = labels[class_index].clone();

        let top_k = ranked
            .iter()
            .take(TOP_K)
            .map(|&(idx, p)| RankedClass {
                class_index: idx,
                label: labels[idx].clone(),
                probability: p,
            })
            .collect();

        Ok(Self {
            image_path,
            is_healthy: is_healthy(&label),
            label,
            class_index,
            confidence,
            probabilities: labels.iter().cloned().zip(probabilities.iter().copied()).collect(),
            top_k,
            inference_time_ms: inference_time.as_secs_f64() * 1000.0,
        })
    }

    /// Pretty print the prediction result
    pub fn display(&self) -> String {
        let mut output = String::new();

        if let Some(path) = &self.image_path {
            output.push_str(&format!("Image: {:?}\n", path));
        }

        output.push_str(&format!(
            "Prediction: {} (class {}){}\n",
            self.label,
            self.class_index,
            if self.is_healthy { " - healthy leaf" } else { "" }
        ));
        output.push_str(&format!("Confidence: {:.2}%\n", self.confidence * 100.0));
        output.push_str(&format!("Inference time: {:.2} ms\n", self.inference_time_ms));

        output.push_str(&format!("\nTop-{} predictions:\n", self.top_k.len()));
        for (i, ranked) in self.top_k.iter().enumerate() {
            output.push_str(&format!(
                "  {}. {} (class {}) - {:.2}%\n",
                i + 1,
                ranked.label,
                ranked.class_index,
                ranked.probability * 100.0
            ));
        }

        output
    }
}

/// Predictor holding a loaded model for repeated inference
#[derive(Debug)]
pub struct Predictor<B: Backend> {
    model: TomatoClassifier<B>,
    metadata: ModelMetadata,
    device: B::Device,
}

impl<B: Backend> Predictor<B> {
    /// Load a model artifact from disk
    pub fn load<P: AsRef<Path>>(path: P, device: &B::Device) -> Result<Self> {
        let artifact = ModelArtifact::<B>::load(path, device)?;
        Ok(Self::from_artifact(artifact, device))
    }

    /// Wrap an already loaded artifact
    pub fn from_artifact(artifact: ModelArtifact<B>, device: &B::Device) -> Self {
        Self {
            model: artifact.model,
            metadata: artifact.metadata,
            device: device.clone(),
        }
    }

    /// Metadata of the loaded artifact
    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    /// Class labels in output order
    pub fn labels(&self) -> &[String] {
        &self.metadata.labels
    }

    /// Input size (square) expected by the network
    pub fn input_size(&self) -> usize {
        self.metadata.config.input_size
    }

    /// Trainable parameter count of the loaded network
    pub fn num_params(&self) -> usize {
        self.model.num_params()
    }

    /// Predict from encoded image bytes (JPEG, PNG, ...)
    pub fn predict_bytes(&self, bytes: &[u8]) -> Result<PredictionResult> {
        let start = Instant::now();
        let img = decode_image(bytes)?;
        let chw = image_to_chw(&img, self.input_size());
        self.run(chw, start, None)
    }

    /// Predict from an image file
    pub fn predict_file<P: AsRef<Path>>(&self, path: P) -> Result<PredictionResult> {
        let start = Instant::now();
        let img = open_image(&path)?;
        let chw = image_to_chw(&img, self.input_size());
        self.run(chw, start, Some(path.as_ref().to_path_buf()))
    }

    /// Predict from a flat `H x W x C` feature vector with values in [0, 1]
    pub fn predict_features(&self, features: &[f32]) -> Result<PredictionResult> {
        let start = Instant::now();
        let chw = features_to_chw(features, self.input_size())?;
        self.run(chw, start, None)
    }

    fn run(&self, chw: Vec<f32>, start: Instant, image_path: Option<PathBuf>) -> Result<PredictionResult> {
        let input = chw_to_tensor::<B>(chw, self.input_size(), &self.device);
        let probabilities = self
            .model
            .forward_softmax(input)
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| TomatoError::Model(format!("Failed to read model output: {:?}", e)))?;

        let result = PredictionResult::new(&probabilities, self.labels(), start.elapsed(), image_path)?;
        debug!(
            label = %result.label,
            confidence = result.confidence,
            "Prediction in {:.2} ms",
            result.inference_time_ms
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::CLASS_NAMES;
    use crate::model::cnn::TomatoClassifierConfig;
    use burn_ndarray::NdArray;
    use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    type TestBackend = NdArray;

    fn labels() -> Vec<String> {
        CLASS_NAMES.iter().map(|s| s.to_string()).collect()
    }

    fn predictor() -> Predictor<TestBackend> {
        let device = Default::default();
        let config = TomatoClassifierConfig::new()
            .with_input_size(16)
            .with_base_filters(2)
            .with_dense_units(4);
        let model = TomatoClassifier::<TestBackend>::new(&config, &device);
        let metadata = ModelMetadata::new(&model, &config, labels());
        Predictor::from_artifact(ModelArtifact::new(model, metadata), &device)
    }

    fn leaf_png() -> Vec<u8> {
        let img = RgbImage::from_fn(40, 40, |x, y| Rgb([(x * 6) as u8, 180, (y * 6) as u8]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_result_from_distribution() {
        let mut probs = vec![0.01f32; 10];
        probs[9] = 0.82;
        probs[2] = 0.10;
        let result = PredictionResult::new(&probs, &labels(), Duration::from_millis(5), None).unwrap();

        assert_eq!(result.label, "Healthy");
        assert_eq!(result.class_index, 9);
        assert!(result.is_healthy);
        assert!((result.confidence - 0.82).abs() < 1e-6);
        assert!(result.confidence > result.top_k[1].probability);
        assert_eq!(result.top_k[1].label, "Late_blight");
        assert_eq!(result.probabilities.len(), 10);
        assert!(result.display().contains("Healthy"));
    }

    #[test]
    fn test_result_rejects_label_mismatch() {
        assert!(PredictionResult::new(&[0.5, 0.5], &labels(), Duration::ZERO, None).is_err());
    }

    #[test]
    fn test_predict_bytes_distribution() {
        let predictor = predictor();
        let result = predictor.predict_bytes(&leaf_png()).unwrap();

        let sum: f32 = result.probabilities.values().sum();
        assert!((sum - 1.0).abs() < 1e-4);
        assert!((0.0..=1.0).contains(&result.confidence));
        let max = result.probabilities.values().cloned().fold(f32::MIN, f32::max);
        assert_eq!(result.confidence, max);
        assert_eq!(result.label, CLASS_NAMES[result.class_index]);
    }

    #[test]
    fn test_same_bytes_same_prediction() {
        let predictor = predictor();
        let bytes = leaf_png();
        let a = predictor.predict_bytes(&bytes).unwrap();
        let b = predictor.predict_bytes(&bytes).unwrap();
        assert_eq!(a.label, b.label);
        assert_eq!(a.confidence, b.confidence);
    }

    #[test]
    fn test_predict_features() {
        let predictor = predictor();
        let len = predictor.metadata().feature_len();
        assert_eq!(len, 16 * 16 * 3);
        let result = predictor.predict_features(&vec![0.5f32; len]).unwrap();
        assert!(CLASS_NAMES.contains(&result.label.as_str()));

        let err = predictor.predict_features(&[0.5f32; 7]).unwrap_err();
        assert!(err.is_client_error());
    }

    #[test]
    fn test_predict_bytes_rejects_garbage() {
        let predictor = predictor();
        assert!(predictor.predict_bytes(b"GIF89a-nope").unwrap_err().is_client_error());
    }
}
