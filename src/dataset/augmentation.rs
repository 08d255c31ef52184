//! Data Augmentation Module for Tomato Leaf Classification
//!
//! Randomized geometric augmentation applied to training images only.
//! Every augmentation (rotation, shift, shear, zoom, horizontal flip) is
//! folded into one affine transform, and the output is produced with a
//! single inverse warp using bilinear sampling. Source coordinates outside
//! the image are clamped to the border, so out-of-bounds regions repeat the
//! nearest edge pixel.
//!
//! # Augmentation Strategy
//!
//! - **Training**: A fresh random transform per image per epoch
//! - **Validation/Inference**: No augmentation (deterministic)

use image::{Rgb, RgbImage};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};


/// Configuration for data augmentation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AugmentationConfig {
    /// Maximum rotation angle in degrees (applies ±rotation_range)
    pub rotation_range: f32,
    /// Maximum horizontal shift as a fraction of the width
    pub width_shift_range: f32,
    /// Maximum vertical shift as a fraction of the height
    pub height_shift_range: f32,
    /// Maximum shear angle in degrees (applies ±shear_range)
    pub shear_range: f32,
    /// Zoom factor drawn from [1 - zoom_range, 1 + zoom_range] per axis
    pub zoom_range: f32,
    /// Randomly mirror images left to right
    pub horizontal_flip: bool,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            rotation_range: 20.0,
            width_shift_range: 0.2,
            height_shift_range: 0.2,
            shear_range: 0.2,
            zoom_range: 0.2,
            horizontal_flip: true,
        }
    }
}

impl AugmentationConfig {
    /// Disable all augmentations (for validation/inference)
    pub fn none() -> Self {
        Self {
            rotation_range: 0.0,
            width_shift_range: 0.0,
            height_shift_range: 0.0,
            shear_range: 0.0,
            zoom_range: 0.0,
            horizontal_flip: false,
        }
    }

    /// True when no transform can ever be produced
    pub fn is_identity(&self) -> bool {
        self.rotation_range == 0.0
            && self.width_shift_range == 0.0
            && self.height_shift_range == 0.0
            && self.shear_range == 0.0
            && self.zoom_range == 0.0
            && !self.horizontal_flip
    }
}

/// One randomly drawn set of transform parameters
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AffineParams {
    /// Rotation in degrees
    pub rotation: f32,
    /// Horizontal shift in pixels
    pub shift_x: f32,
    /// Vertical shift in pixels
    pub shift_y: f32,
    /// Shear in degrees
    pub shear: f32,
    /// Horizontal zoom factor
    pub zoom_x: f32,
    /// Vertical zoom factor
    pub zoom_y: f32,
    /// Mirror left to right
    pub flip: bool,
}

impl AffineParams {
    /// The transform that leaves an image untouched
    pub fn identity() -> Self {
        Self {
            rotation: 0.0,
            shift_x: 0.0,
            shift_y: 0.0,
            shear: 0.0,
            zoom_x: 1.0,
            zoom_y: 1.0,
            flip: false,
        }
    }

    /// 2x2 linear part mapping centered output coordinates to source coordinates
    fn matrix(&self) -> [[f32; 2]; 2] {
        let theta = self.rotation.to_radians();
        let shear = self.shear.to_radians();
        let (sin_t, cos_t) = theta.sin_cos();

        // rotation * shear * zoom
        let rs = [
            [cos_t, -cos_t * shear.sin() - sin_t * shear.cos()],
            [sin_t, -sin_t * shear.sin() + cos_t * shear.cos()],
        ];

        [
            [rs[0][0] * self.zoom_x, rs[0][1] * self.zoom_y],
            [rs[1][0] * self.zoom_x, rs[1][1] * self.zoom_y],
        ]
    }
}

/// Image augmenter that applies random affine transformations
#[derive(Clone, Debug)]
pub struct Augmenter {
    config: AugmentationConfig,
}

impl Augmenter {
    /// Create a new augmenter with the given configuration
    pub fn new(config: AugmentationConfig) -> Self {
        Self { config }
    }

    /// The active configuration
    pub fn config(&self) -> &AugmentationConfig {
        &self.config
    }

    /// Draw transform parameters for an image of the given size
    pub fn sample_params(&self, width: u32, height: u32, rng: &mut ChaCha8Rng) -> AffineParams {
        let c = &self.config;

        let rotation = symmetric(rng, c.rotation_range);
        let shift_x = symmetric(rng, c.width_shift_range) * width as f32;
        let shift_y = symmetric(rng, c.height_shift_range) * height as f32;
        let shear = symmetric(rng, c.shear_range);
        let (zoom_x, zoom_y) = if c.zoom_range > 0.0 {
            (
                rng.gen_range(1.0 - c.zoom_range..=1.0 + c.zoom_range),
                rng.gen_range(1.0 - c.zoom_range..=1.0 + c.zoom_range),
            )
        } else {
            (1.0, 1.0)
        };
        let flip = c.horizontal_flip && rng.gen::<bool>();

        AffineParams {
            rotation,
            shift_x,
            shift_y,
            shear,
            zoom_x,
            zoom_y,
            flip,
        }
    }

    /// Apply a random transform to an image
    pub fn augment(&self, img: &RgbImage, rng: &mut ChaCha8Rng) -> RgbImage {
        if self.config.is_identity() {
            return img.clone();
        }
        let params = self.sample_params(img.width(), img.height(), rng);
        warp(img, &params)
    }
}

fn symmetric(rng: &mut ChaCha8Rng, range: f32) -> f32 {
    if range > 0.0 {
        rng.gen_range(-range..=range)
    } else {
        0.0
    }
}

/// Inverse-warp an image with the given parameters
///
/// Each output pixel is mapped back into the source image and sampled
/// bilinearly; coordinates are clamped to the border (nearest fill).
pub fn warp(img: &RgbImage, params: &AffineParams) -> RgbImage {
    let (width, height) = img.dimensions();
    let m = params.matrix();
    let cx = (width as f32 - 1.0) / 2.0;
    let cy = (height as f32 - 1.0) / 2.0;

    let mut output = RgbImage::new(width, height);

    for y in 0..height {
        for x in 0..width {
            // Flip is the last forward step, so it is undone first
            let ox = if params.flip { width - 1 - x } else { x };
            let dx = ox as f32 - cx;
            let dy = y as f32 - cy;

            let src_x = cx + m[0][0] * dx + m[0][1] * dy + params.shift_x;
            let src_y = cy + m[1][0] * dx + m[1][1] * dy + params.shift_y;

            output.put_pixel(x, y, bilinear_sample(img, src_x, src_y));
        }
    }

    output
}

/// Sample a pixel using bilinear interpolation with edge clamping
fn bilinear_sample(img: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let (width, height) = img.dimensions();
    let max_x = (width - 1) as f32;
    let max_y = (height - 1) as f32;

    let x = if x.is_finite() { x.clamp(0.0, max_x) } else { 0.0 };
    let y = if y.is_finite() { y.clamp(0.0, max_y) } else { 0.0 };

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(width - 1);
    let y1 = (y0 + 1).min(height - 1);

    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = img.get_pixel(x0, y0);
    let p10 = img.get_pixel(x1, y0);
    let p01 = img.get_pixel(x0, y1);
    let p11 = img.get_pixel(x1, y1);

    let mut result = [0u8; 3];
    for c in 0..3 {
        let v = p00[c] as f32 * (1.0 - fx) * (1.0 - fy)
            + p10[c] as f32 * fx * (1.0 - fy)
            + p01[c] as f32 * (1.0 - fx) * fy
            + p11[c] as f32 * fx * fy;

        result[c] = v.round().clamp(0.0, 255.0) as u8;
    }

    Rgb(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn create_test_image() -> RgbImage {
        let mut img = RgbImage::new(64, 64);
        for (x, y, pixel) in img.enumerate_pixels_mut() {
            *pixel = Rgb([(x * 4) as u8, (y * 4) as u8, 128]);
        }
        img
    }

    #[test]
    fn test_default_config() {
        let config = AugmentationConfig::default();
        assert_eq!(config.rotation_range, 20.0);
        assert_eq!(config.zoom_range, 0.2);
        assert!(config.horizontal_flip);
        assert!(AugmentationConfig::none().is_identity());
    }

    #[test]
    fn test_identity_warp_preserves_image() {
        let img = create_test_image();
        let out = warp(&img, &AffineParams::identity());
        assert_eq!(out, img);
    }

    #[test]
    fn test_flip_mirrors_columns() {
        let img = create_test_image();
        let params = AffineParams {
            flip: true,
            ..AffineParams::identity()
        };
        let out = warp(&img, &params);
        assert_eq!(out.get_pixel(0, 10), img.get_pixel(63, 10));
        assert_eq!(out.get_pixel(63, 5), img.get_pixel(0, 5));
    }

    #[test]
    fn test_large_shift_fills_with_edge_pixels() {
        let img = create_test_image();
        let params = AffineParams {
            shift_x: 1000.0,
            ..AffineParams::identity()
        };
        let out = warp(&img, &params);
        // Every column samples past the right border and repeats it
        for y in 0..64 {
            assert_eq!(out.get_pixel(0, y), img.get_pixel(63, y));
        }
    }

    #[test]
    fn test_sampled_params_within_ranges() {
        let aug = Augmenter::new(AugmentationConfig::default());
        let mut rng = ChaCha8Rng::seed_from_u64(42);

        for _ in 0..200 {
            let p = aug.sample_params(128, 128, &mut rng);
            assert!(p.rotation.abs() <= 20.0);
            assert!(p.shift_x.abs() <= 0.2 * 128.0);
            assert!(p.shift_y.abs() <= 0.2 * 128.0);
            assert!(p.shear.abs() <= 0.2);
            assert!((0.8..=1.2).contains(&p.zoom_x));
            assert!((0.8..=1.2).contains(&p.zoom_y));
        }
    }

    #[test]
    fn test_augment_is_reproducible_with_seed() {
        let aug = Augmenter::new(AugmentationConfig::default());
        let img = create_test_image();

        let a = aug.augment(&img, &mut ChaCha8Rng::seed_from_u64(7));
        let b = aug.augment(&img, &mut ChaCha8Rng::seed_from_u64(7));
        assert_eq!(a, b);
        assert_eq!(a.dimensions(), (64, 64));
    }

    #[test]
    fn test_identity_config_returns_input() {
        let aug = Augmenter::new(AugmentationConfig::none());
        let img = create_test_image();
        let out = aug.augment(&img, &mut ChaCha8Rng::seed_from_u64(1));
        assert_eq!(out, img);
    }
}
