//! Dataset module for tomato leaf data handling
//!
//! This module provides functionality for:
//! - Discovering the labeled class directories on disk
//! - Holding out a validation subset per class
//! - Randomized augmentation for training robustness
//! - Burn `Dataset`/`Batcher` integration
//!
//! ## Directory Layout
//!
//! ```text
//! data_dir/
//! ├── train/
//! │   ├── Tomato___Bacterial_spot/
//! │   ├── ...
//! │   └── Tomato___healthy/
//! └── val/            (optional, same class folders)
//! ```

pub mod augmentation;
pub mod burn_dataset;
pub mod loader;

// Re-export main types for convenience
pub use augmentation::{AugmentationConfig, Augmenter};
pub use burn_dataset::{AugmentingBatcher, LeafBatch, LeafBatcher, LeafDataset, LeafItem};
pub use loader::{DatasetSplit, DatasetStats, ImageSample, TomatoDataset};

/// Prefix shared by every class directory of the tomato subset
pub const CLASS_DIR_PREFIX: &str = "Tomato___";

/// Image file extensions picked up when scanning class directories
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// Display labels in training-index order (sorted directory names)
pub const CLASS_NAMES: [&str; crate::NUM_CLASSES] = [
    "Bacterial_spot",
    "Early_blight",
    "Late_blight",
    "Leaf_Mold",
    "Septoria_leaf_spot",
    "Spider_mites Two-spotted_spider_mite",
    "Target_Spot",
    "Tomato_Yellow_Leaf_Curl_Virus",
    "Tomato_mosaic_virus",
    "Healthy",
];

/// Derive the display label of a class directory
///
/// `Tomato___Late_blight` becomes `Late_blight`, `Tomato___healthy` becomes `Healthy`.
pub fn label_from_dir(dir_name: &str) -> String {
    let stripped = dir_name.strip_prefix(CLASS_DIR_PREFIX).unwrap_or(dir_name);
    if stripped.eq_ignore_ascii_case("healthy") {
        "Healthy".to_string()
    } else {
        stripped.to_string()
    }
}

/// Check if a display label denotes a healthy leaf
pub fn is_healthy(label: &str) -> bool {
    label.eq_ignore_ascii_case("healthy")
}

/// Whether a path has one of the accepted image extensions
pub fn is_image_file(path: &std::path::Path) -> bool {
    path.extension()
        .map(|ext| {
            let ext = ext.to_string_lossy().to_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}
