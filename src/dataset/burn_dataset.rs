//! Burn Dataset Integration for Tomato Leaf Images
//!
//! This module implements Burn's Dataset trait and Batcher for data loading
//! and batching during training.
//!
//! ## Augmentation Support
//!
//! - `LeafBatcher`: Standard batcher without augmentation (for validation)
//! - `AugmentingBatcher`: Applies a fresh random transform per item (for training)

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use burn::data::dataloader::batcher::Batcher;
use burn::data::dataset::Dataset;
use burn::prelude::*;
use image::RgbImage;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use tracing::warn;

use crate::dataset::augmentation::{AugmentationConfig, Augmenter};
use crate::inference::preprocess::{open_image, resize_rgb, to_chw};
use crate::utils::error::Result;
use crate::CHANNELS;

/// A single decoded image, already resized to the network input size
#[derive(Clone, Debug)]
pub struct LeafItem {
    /// RGB pixels at `image_size x image_size`
    pub image: RgbImage,
    /// Class label index
    pub label: usize,
}

impl LeafItem {
    /// Create a new item by loading and resizing an image
    pub fn from_path(path: &Path, label: usize, image_size: usize) -> Result<Self> {
        let img = open_image(path)?;

        Ok(Self {
            image: resize_rgb(&img, image_size as u32),
            label,
        })
    }
}

/// Tomato leaf dataset implementing Burn's Dataset trait
///
/// Images are loaded lazily on demand.
#[derive(Debug, Clone)]
pub struct LeafDataset {
    /// List of (image_path, label) pairs
    samples: Vec<(PathBuf, usize)>,
    /// Target image size
    image_size: usize,
}

impl LeafDataset {
    /// Create a new dataset from a list of samples
    pub fn new(samples: Vec<(PathBuf, usize)>, image_size: usize) -> Self {
        Self {
            samples,
            image_size,
        }
    }

    /// Load the given indices in parallel, skipping unreadable images
    pub fn load_batch(&self, indices: &[usize]) -> Vec<LeafItem> {
        indices
            .par_iter()
            .filter_map(|&i| self.get(i))
            .collect()
    }
}

impl Dataset<LeafItem> for LeafDataset {
    fn get(&self, index: usize) -> Option<LeafItem> {
        let (path, label) = self.samples.get(index)?;
        match LeafItem::from_path(path, *label, self.image_size) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("Skipping unreadable image: {}", e);
                None
            }
        }
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// A batch of leaf images
#[derive(Clone, Debug)]
pub struct LeafBatch<B: Backend> {
    /// Batch of images with shape [batch_size, 3, height, width], values in [0, 1]
    pub images: Tensor<B, 4>,
    /// Batch of labels with shape [batch_size]
    pub targets: Tensor<B, 1, Int>,
}

fn build_batch<B: Backend>(
    images_data: Vec<f32>,
    targets_data: Vec<i64>,
    image_size: usize,
    device: &B::Device,
) -> LeafBatch<B> {
    let batch_size = targets_data.len();

    let images = Tensor::<B, 4>::from_floats(
        TensorData::new(images_data, [batch_size, CHANNELS, image_size, image_size]),
        device,
    );
    let targets =
        Tensor::<B, 1, Int>::from_data(TensorData::new(targets_data, [batch_size]), device);

    LeafBatch { images, targets }
}

/// Batcher for validation batches (no augmentation)
#[derive(Clone, Debug)]
pub struct LeafBatcher {
    image_size: usize,
}

impl LeafBatcher {
    /// Create a batcher with a custom image size
    pub fn new(image_size: usize) -> Self {
        Self { image_size }
    }
}

impl<B: Backend> Batcher<B, LeafItem, LeafBatch<B>> for LeafBatcher {
    fn batch(&self, items: Vec<LeafItem>, device: &B::Device) -> LeafBatch<B> {
        let images_data: Vec<f32> = items.iter().flat_map(|item| to_chw(&item.image)).collect();
        let targets_data: Vec<i64> = items.iter().map(|item| item.label as i64).collect();

        build_batch(images_data, targets_data, self.image_size, device)
    }
}

/// Batcher that applies on-the-fly augmentation
///
/// Every call draws a new batch seed from `seed` and an internal counter,
/// and every item gets its own generator derived from that batch seed, so
/// a run is reproducible while items are augmented in parallel.
pub struct AugmentingBatcher {
    image_size: usize,
    augmenter: Augmenter,
    seed: u64,
    batches: AtomicU64,
}

impl Clone for AugmentingBatcher {
    fn clone(&self) -> Self {
        Self {
            image_size: self.image_size,
            augmenter: self.augmenter.clone(),
            seed: self.seed,
            batches: AtomicU64::new(self.batches.load(Ordering::Relaxed)),
        }
    }
}

impl std::fmt::Debug for AugmentingBatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AugmentingBatcher")
            .field("image_size", &self.image_size)
            .field("config", self.augmenter.config())
            .finish()
    }
}

impl AugmentingBatcher {
    /// Create with a specific augmentation config
    pub fn new(image_size: usize, config: AugmentationConfig, seed: u64) -> Self {
        Self {
            image_size,
            augmenter: Augmenter::new(config),
            seed,
            batches: AtomicU64::new(0),
        }
    }

    fn next_batch_seed(&self) -> u64 {
        let n = self.batches.fetch_add(1, Ordering::Relaxed);
        self.seed
            .wrapping_mul(6364136223846793005)
            .wrapping_add(n.wrapping_mul(1442695040888963407))
    }
}

impl<B: Backend> Batcher<B, LeafItem, LeafBatch<B>> for AugmentingBatcher {
    fn batch(&self, items: Vec<LeafItem>, device: &B::Device) -> LeafBatch<B> {
        let batch_seed = self.next_batch_seed();

        let images_data: Vec<f32> = items
            .par_iter()
            .enumerate()
            .map(|(i, item)| {
                let mut rng = ChaCha8Rng::seed_from_u64(batch_seed.wrapping_add(i as u64));
                to_chw(&self.augmenter.augment(&item.image, &mut rng))
            })
            .collect::<Vec<_>>()
            .concat();
        let targets_data: Vec<i64> = items.iter().map(|item| item.label as i64).collect();

        build_batch(images_data, targets_data, self.image_size, device)
    }
}
