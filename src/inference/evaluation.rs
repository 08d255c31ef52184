//! Labelled evaluation of a directory of images
//!
//! Images stored under class folders (`Tomato___Late_blight/leaf.jpg`)
//! carry their expected label in the parent directory name, so a folder
//! tree can be scored against a trained model.

use std::path::{Path, PathBuf};

use burn::prelude::*;
use walkdir::WalkDir;

use crate::dataset::{is_image_file, label_from_dir};
use crate::inference::predictor::{PredictionResult, Predictor};
use crate::utils::error::Result;

/// Image files under `root`, recursively, in path order
pub fn collect_images<P: AsRef<Path>>(root: P) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file() && is_image_file(entry.path()))
        .map(|entry| entry.into_path())
        .collect();
    files.sort();
    files
}

/// Expected label of an image, derived from its parent directory
///
/// `None` when the directory does not name one of `labels`.
pub fn expected_label(path: &Path, labels: &[String]) -> Option<String> {
    let dir_name = path.parent()?.file_name()?.to_str()?;
    let label = label_from_dir(dir_name);
    labels.contains(&label).then_some(label)
}

/// Running count of correct predictions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LabelledTally {
    pub correct: usize,
    pub total: usize,
}

impl LabelledTally {
    /// Record one labelled prediction; returns whether it was correct
    pub fn record(&mut self, expected: &str, predicted: &str) -> bool {
        let is_correct = expected == predicted;
        self.total += 1;
        if is_correct {
            self.correct += 1;
        }
        is_correct
    }

    /// Fraction correct, 0 when nothing was recorded
    pub fn accuracy(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }

    /// `correct/total (xx.x%)`
    pub fn summary(&self) -> String {
        format!("{}/{} ({:.1}%)", self.correct, self.total, self.accuracy() * 100.0)
    }
}

/// Prediction for one image of a directory run
#[derive(Debug)]
pub struct ImageOutcome {
    pub path: PathBuf,
    pub expected: Option<String>,
    pub prediction: Result<PredictionResult>,
}

impl ImageOutcome {
    /// `Some(true)` for a correct labelled prediction, `None` when unlabelled or failed
    pub fn is_correct(&self) -> Option<bool> {
        match (&self.expected, &self.prediction) {
            (Some(expected), Ok(result)) => Some(*expected == result.label),
            _ => None,
        }
    }
}

/// Predict every image and tally the labelled ones
pub fn evaluate_images<B: Backend>(
    predictor: &Predictor<B>,
    images: &[PathBuf],
) -> (Vec<ImageOutcome>, LabelledTally) {
    let mut tally = LabelledTally::default();

    let outcomes = images
        .iter()
        .map(|path| {
            let expected = expected_label(path, predictor.labels());
            let prediction = predictor.predict_file(path);
            if let (Some(expected), Ok(result)) = (&expected, &prediction) {
                tally.record(expected, &result.label);
            }
            ImageOutcome {
                path: path.clone(),
                expected,
                prediction,
            }
        })
        .collect();

    (outcomes, tally)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::CLASS_NAMES;
    use crate::model::artifact::{ModelArtifact, ModelMetadata};
    use crate::model::cnn::{TomatoClassifier, TomatoClassifierConfig};
    use burn_ndarray::NdArray;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn labels() -> Vec<String> {
        CLASS_NAMES.iter().map(|s| s.to_string()).collect()
    }

    fn write_leaf(path: &Path) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbImage::from_fn(24, 24, |x, y| Rgb([(x * 9) as u8, 120, (y * 9) as u8]))
            .save(path)
            .unwrap();
    }

    fn leaf_tree(tmp: &TempDir) -> PathBuf {
        let root = tmp.path().join("test_images");
        write_leaf(&root.join("Tomato___Late_blight/a.png"));
        write_leaf(&root.join("Tomato___Late_blight/b.png"));
        write_leaf(&root.join("Tomato___healthy/c.png"));
        write_leaf(&root.join("loose.png"));
        std::fs::write(root.join("Tomato___healthy/notes.txt"), "not an image").unwrap();
        root
    }

    #[test]
    fn test_collect_images_recurses_and_filters() {
        let tmp = TempDir::new().unwrap();
        let root = leaf_tree(&tmp);

        let images = collect_images(&root);
        assert_eq!(images.len(), 4);
        assert!(images[0].ends_with("Tomato___Late_blight/a.png"));
        assert!(images.iter().all(|p| is_image_file(p)));
    }

    #[test]
    fn test_expected_label_from_parent_directory() {
        let labels = labels();
        assert_eq!(
            expected_label(Path::new("x/Tomato___Late_blight/a.png"), &labels).as_deref(),
            Some("Late_blight")
        );
        assert_eq!(
            expected_label(Path::new("x/Tomato___healthy/c.jpg"), &labels).as_deref(),
            Some("Healthy")
        );
        assert_eq!(expected_label(Path::new("test_images/loose.png"), &labels), None);
    }

    #[test]
    fn test_tally_summary() {
        let mut tally = LabelledTally::default();
        assert_eq!(tally.summary(), "0/0 (0.0%)");

        assert!(tally.record("Healthy", "Healthy"));
        assert!(!tally.record("Late_blight", "Healthy"));
        assert!(tally.record("Late_blight", "Late_blight"));
        assert_eq!(tally, LabelledTally { correct: 2, total: 3 });
        assert_eq!(tally.summary(), "2/3 (66.7%)");
    }

    #[test]
    fn test_evaluate_images_counts_only_labelled_files() {
        let tmp = TempDir::new().unwrap();
        let root = leaf_tree(&tmp);

        let device = Default::default();
        let config = TomatoClassifierConfig::new()
            .with_input_size(16)
            .with_base_filters(2)
            .with_dense_units(4);
        let model = TomatoClassifier::<NdArray>::new(&config, &device);
        let metadata = ModelMetadata::new(&model, &config, labels());
        let predictor = Predictor::from_artifact(ModelArtifact::new(model, metadata), &device);

        let images = collect_images(&root);
        let (outcomes, tally) = evaluate_images(&predictor, &images);

        assert_eq!(outcomes.len(), 4);
        assert_eq!(tally.total, 3);
        let correct = outcomes.iter().filter(|o| o.is_correct() == Some(true)).count();
        assert_eq!(tally.correct, correct);

        let loose = outcomes.iter().find(|o| o.path.ends_with("loose.png")).unwrap();
        assert_eq!(loose.expected, None);
        assert_eq!(loose.is_correct(), None);
        assert!(loose.prediction.is_ok());
    }
}
