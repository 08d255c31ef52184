//! Tomato Leaf Dataset Loader
//!
//! Discovers class directories on disk and organizes them into the
//! training and validation sets used by the training job.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::{is_image_file, label_from_dir};
use crate::utils::error::{Result, TomatoError};

/// A single image sample with its label and metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageSample {
    /// Path to the image file
    pub path: PathBuf,
    /// Class label index
    pub label: usize,
    /// Class directory name (e.g., "Tomato___Late_blight")
    pub class_dir: String,
}

/// Labeled tomato leaf images found under a single directory
#[derive(Debug, Clone)]
pub struct TomatoDataset {
    /// Root directory of the dataset
    pub root_dir: PathBuf,
    /// All samples, grouped by class and sorted by file name within a class
    pub samples: Vec<ImageSample>,
    /// Class directory names in label order
    pub class_dirs: Vec<String>,
}

impl TomatoDataset {
    /// Scan a directory of class folders
    ///
    /// Class directories are sorted byte-wise and numbered in that order.
    /// Missing root, no class folders or zero images are errors.
    pub fn new<P: AsRef<Path>>(root_dir: P) -> Result<Self> {
        let root_dir = root_dir.as_ref().to_path_buf();
        info!("Loading tomato leaf dataset from: {:?}", root_dir);

        if !root_dir.is_dir() {
            return Err(TomatoError::PathNotFound(root_dir));
        }

        let mut class_dirs: Vec<String> = Vec::new();
        for entry in std::fs::read_dir(&root_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    class_dirs.push(name.to_string());
                }
            }
        }
        class_dirs.sort();

        if class_dirs.is_empty() {
            return Err(TomatoError::Dataset(format!(
                "No class directories found in {:?}",
                root_dir
            )));
        }

        info!("Found {} classes", class_dirs.len());

        let mut samples = Vec::new();
        for (label, class_dir) in class_dirs.iter().enumerate() {
            let before = samples.len();

            for entry in WalkDir::new(root_dir.join(class_dir))
                .min_depth(1)
                .max_depth(1)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let path = entry.path().to_path_buf();
                if entry.file_type().is_file() && is_image_file(&path) {
                    samples.push(ImageSample {
                        path,
                        label,
                        class_dir: class_dir.clone(),
                    });
                }
            }

            let count = samples.len() - before;
            if count == 0 {
                warn!("Class '{}' has no images", class_dir);
            }
            debug!("Class '{}' (label {}): {} samples", class_dir, label, count);
        }

        if samples.is_empty() {
            return Err(TomatoError::Dataset(format!(
                "No images (jpg, jpeg, png, bmp) found under {:?}",
                root_dir
            )));
        }

        info!("Loaded {} total samples", samples.len());

        Ok(Self {
            root_dir,
            samples,
            class_dirs,
        })
    }

    /// Get the number of samples in the dataset
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the dataset is empty
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Get the number of classes
    pub fn num_classes(&self) -> usize {
        self.class_dirs.len()
    }

    /// Display labels in class order
    pub fn labels(&self) -> Vec<String> {
        self.class_dirs.iter().map(|d| label_from_dir(d)).collect()
    }

    /// Get samples for a specific class
    pub fn samples_by_class(&self, class_idx: usize) -> Vec<&ImageSample> {
        self.samples
            .iter()
            .filter(|s| s.label == class_idx)
            .collect()
    }

    /// Split off a validation subset
    ///
    /// For every class the first `fraction` of its sorted files
    /// (`floor(fraction * n)`) go to validation and the rest to training.
    pub fn hold_out(self, fraction: f64) -> Result<(TomatoDataset, TomatoDataset)> {
        if !(0.0..1.0).contains(&fraction) {
            return Err(TomatoError::Config(format!(
                "validation_split must be in [0, 1), got {}",
                fraction
            )));
        }

        let mut train = Vec::new();
        let mut val = Vec::new();

        for class_idx in 0..self.num_classes() {
            let class_samples = self.samples_by_class(class_idx);
            let split = (fraction * class_samples.len() as f64).floor() as usize;
            val.extend(class_samples[..split].iter().map(|s| (*s).clone()));
            train.extend(class_samples[split..].iter().map(|s| (*s).clone()));
        }

        let make = |samples| TomatoDataset {
            root_dir: self.root_dir.clone(),
            samples,
            class_dirs: self.class_dirs.clone(),
        };

        Ok((make(train), make(val)))
    }

    /// Keep at most `max_per_class` samples of every class (quick mode)
    pub fn truncate_per_class(&mut self, max_per_class: usize) {
        let mut seen = vec![0usize; self.num_classes()];
        self.samples.retain(|s| {
            seen[s.label] += 1;
            seen[s.label] <= max_per_class
        });
    }

    /// (path, label) pairs for the Burn dataset
    pub fn to_pairs(&self) -> Vec<(PathBuf, usize)> {
        self.samples
            .iter()
            .map(|s| (s.path.clone(), s.label))
            .collect()
    }

    /// Get statistics about the dataset
    pub fn stats(&self) -> DatasetStats {
        let mut class_counts = vec![0usize; self.num_classes()];
        for sample in &self.samples {
            class_counts[sample.label] += 1;
        }

        DatasetStats {
            total_samples: self.samples.len(),
            num_classes: self.num_classes(),
            class_counts,
            class_names: self.labels(),
        }
    }
}

/// Where the validation samples came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationSource {
    /// A separate `val/` directory
    Directory,
    /// Held out from `train/` by fraction
    HeldOut,
}

/// Training and validation sets sharing one class list
#[derive(Debug, Clone)]
pub struct DatasetSplit {
    pub train: TomatoDataset,
    pub val: TomatoDataset,
    pub validation_source: ValidationSource,
}

impl DatasetSplit {
    /// Load `<data_dir>/train` and either `<data_dir>/val` or a held-out fraction
    pub fn load<P: AsRef<Path>>(data_dir: P, validation_split: f64) -> Result<Self> {
        let data_dir = data_dir.as_ref();
        let train_dir = data_dir.join("train");
        let val_dir = data_dir.join("val");

        if !train_dir.is_dir() {
            return Err(TomatoError::Dataset(format!(
                "Training directory not found: {:?} (expected <data_dir>/train/<class>/*.jpg)",
                train_dir
            )));
        }

        let train = TomatoDataset::new(&train_dir)?;

        let split = if val_dir.is_dir() {
            let val = TomatoDataset::new(&val_dir)?;
            check_same_classes(&train.class_dirs, &val.class_dirs)?;
            info!("Using separate validation directory {:?}", val_dir);
            Self {
                train,
                val,
                validation_source: ValidationSource::Directory,
            }
        } else {
            info!(
                "No validation directory, holding out {:.0}% of each class",
                validation_split * 100.0
            );
            let (train, val) = train.hold_out(validation_split)?;
            Self {
                train,
                val,
                validation_source: ValidationSource::HeldOut,
            }
        };

        if split.train.is_empty() {
            return Err(TomatoError::Dataset(
                "Training set is empty after the validation split".to_string(),
            ));
        }
        if split.val.is_empty() {
            return Err(TomatoError::Dataset(
                "Validation set is empty; add images or raise validation_split".to_string(),
            ));
        }

        Ok(split)
    }

    /// Display labels in label order
    pub fn labels(&self) -> Vec<String> {
        self.train.labels()
    }

    /// Limit both sets to `max_per_class` samples per class
    pub fn truncate_per_class(&mut self, max_per_class: usize) {
        self.train.truncate_per_class(max_per_class);
        self.val.truncate_per_class(max_per_class);
    }
}

fn check_same_classes(train: &[String], val: &[String]) -> Result<()> {
    if train == val {
        return Ok(());
    }

    let train_set: BTreeSet<_> = train.iter().collect();
    let val_set: BTreeSet<_> = val.iter().collect();
    let only_train: Vec<_> = train_set.difference(&val_set).collect();
    let only_val: Vec<_> = val_set.difference(&train_set).collect();

    Err(TomatoError::Dataset(format!(
        "Class directories differ between train and val (only in train: {:?}, only in val: {:?})",
        only_train, only_val
    )))
}

/// Statistics about the dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetStats {
    pub total_samples: usize,
    pub num_classes: usize,
    pub class_counts: Vec<usize>,
    pub class_names: Vec<String>,
}

impl DatasetStats {
    /// Print statistics to console
    pub fn print(&self) {
        println!("  Total samples: {}", self.total_samples);
        println!("  Number of classes: {}", self.num_classes);
        println!("\n  Samples per class:");

        for (idx, (name, count)) in self.class_names.iter().zip(&self.class_counts).enumerate() {
            let bar_len = if self.total_samples > 0 {
                (*count as f32 / self.total_samples as f32 * 40.0) as usize
            } else {
                0
            };
            let bar: String = "█".repeat(bar_len);
            println!("    {:2}. {:38} {:5} {}", idx, name, count, bar);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn write_images(dir: &Path, class: &str, count: usize) {
        let class_dir = dir.join(class);
        std::fs::create_dir_all(&class_dir).unwrap();
        for i in 0..count {
            let img = RgbImage::from_pixel(8, 8, Rgb([10, 200, 30]));
            img.save(class_dir.join(format!("img_{:03}.png", i))).unwrap();
        }
    }

    #[test]
    fn test_scan_sorts_classes_and_files() {
        let tmp = TempDir::new().unwrap();
        write_images(tmp.path(), "Tomato___healthy", 3);
        write_images(tmp.path(), "Tomato___Bacterial_spot", 2);
        std::fs::write(tmp.path().join("Tomato___healthy/readme.txt"), "x").unwrap();

        let ds = TomatoDataset::new(tmp.path()).unwrap();
        assert_eq!(ds.num_classes(), 2);
        assert_eq!(ds.len(), 5);
        assert_eq!(ds.labels(), vec!["Bacterial_spot", "Healthy"]);
        assert_eq!(ds.samples[0].label, 0);
        assert!(ds.samples[2].path.ends_with("img_000.png"));
    }

    #[test]
    fn test_missing_directory_is_error() {
        let tmp = TempDir::new().unwrap();
        let err = TomatoDataset::new(tmp.path().join("nope")).unwrap_err();
        assert!(matches!(err, TomatoError::PathNotFound(_)));
    }

    #[test]
    fn test_zero_images_is_error() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("Tomato___healthy")).unwrap();
        let err = TomatoDataset::new(tmp.path()).unwrap_err();
        assert!(matches!(err, TomatoError::Dataset(_)));
    }

    #[test]
    fn test_hold_out_takes_first_fraction_per_class() {
        let tmp = TempDir::new().unwrap();
        write_images(tmp.path(), "Tomato___Early_blight", 10);
        write_images(tmp.path(), "Tomato___healthy", 5);

        let ds = TomatoDataset::new(tmp.path()).unwrap();
        let (train, val) = ds.hold_out(0.2).unwrap();

        assert_eq!(val.len(), 3);
        assert_eq!(train.len(), 12);
        assert!(val.samples[0].path.ends_with("img_000.png"));
        assert!(val.samples[1].path.ends_with("img_001.png"));
        assert!(train
            .samples
            .iter()
            .all(|s| !val.samples.contains(s)));
    }

    #[test]
    fn test_hold_out_rejects_bad_fraction() {
        let tmp = TempDir::new().unwrap();
        write_images(tmp.path(), "Tomato___healthy", 2);
        let ds = TomatoDataset::new(tmp.path()).unwrap();
        assert!(ds.hold_out(1.5).is_err());
    }

    #[test]
    fn test_split_uses_val_directory() {
        let tmp = TempDir::new().unwrap();
        write_images(&tmp.path().join("train"), "Tomato___healthy", 4);
        write_images(&tmp.path().join("val"), "Tomato___healthy", 2);

        let split = DatasetSplit::load(tmp.path(), 0.2).unwrap();
        assert_eq!(split.validation_source, ValidationSource::Directory);
        assert_eq!(split.train.len(), 4);
        assert_eq!(split.val.len(), 2);
    }

    #[test]
    fn test_split_rejects_mismatched_classes() {
        let tmp = TempDir::new().unwrap();
        write_images(&tmp.path().join("train"), "Tomato___healthy", 2);
        write_images(&tmp.path().join("val"), "Tomato___Leaf_Mold", 2);

        let err = DatasetSplit::load(tmp.path(), 0.2).unwrap_err();
        assert!(err.to_string().contains("differ"));
    }

    #[test]
    fn test_split_missing_train_dir() {
        let tmp = TempDir::new().unwrap();
        assert!(DatasetSplit::load(tmp.path(), 0.2).is_err());
    }

    #[test]
    fn test_truncate_per_class() {
        let tmp = TempDir::new().unwrap();
        write_images(tmp.path(), "Tomato___Early_blight", 6);
        write_images(tmp.path(), "Tomato___healthy", 2);

        let mut ds = TomatoDataset::new(tmp.path()).unwrap();
        ds.truncate_per_class(3);
        assert_eq!(ds.stats().class_counts, vec![3, 2]);
    }
}
