//! Request-time preprocessing
//!
//! Turns raw image bytes or a flat feature vector into the `[1, 3, H, W]`
//! input the network expects. Every step is deterministic.

use std::io::Cursor;
use std::path::Path;

use burn::prelude::*;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader, RgbImage};

use crate::utils::error::{Result, TomatoError};
use crate::CHANNELS;

/// Decode raw image bytes (format sniffed from the content)
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage> {
    if bytes.is_empty() {
        return Err(TomatoError::ImageDecode("empty image payload".to_string()));
    }

    ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| TomatoError::ImageDecode(e.to_string()))?
        .decode()
        .map_err(|e| TomatoError::ImageDecode(e.to_string()))
}

/// Open and decode an image file
pub fn open_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
    let path = path.as_ref();
    ImageReader::open(path)
        .map_err(|e| TomatoError::ImageLoad(path.to_path_buf(), e.to_string()))?
        .with_guessed_format()
        .map_err(|e| TomatoError::ImageLoad(path.to_path_buf(), e.to_string()))?
        .decode()
        .map_err(|e| TomatoError::ImageLoad(path.to_path_buf(), e.to_string()))
}

/// Convert to RGB8 and resize to a square of `size` pixels
pub fn resize_rgb(img: &DynamicImage, size: u32) -> RgbImage {
    img.resize_exact(size, size, FilterType::Triangle).to_rgb8()
}

/// Convert an RGB image to CHW float data normalized to [0, 1]
pub fn to_chw(img: &RgbImage) -> Vec<f32> {
    let (width, height) = img.dimensions();
    let num_pixels = (width * height) as usize;
    let mut data = vec![0.0f32; CHANNELS * num_pixels];

    for (i, pixel) in img.pixels().enumerate() {
        data[i] = pixel[0] as f32 / 255.0;
        data[num_pixels + i] = pixel[1] as f32 / 255.0;
        data[2 * num_pixels + i] = pixel[2] as f32 / 255.0;
    }

    data
}

/// Full image pipeline: RGB8, resize, scale to [0, 1], CHW
pub fn image_to_chw(img: &DynamicImage, size: usize) -> Vec<f32> {
    to_chw(&resize_rgb(img, size as u32))
}

/// Validate a flat `H x W x C` feature vector and reorder it to CHW
///
/// Rejects the wrong length and any value that is not finite or lies
/// outside [0, 1].
pub fn features_to_chw(features: &[f32], size: usize) -> Result<Vec<f32>> {
    let num_pixels = size * size;
    let expected = num_pixels * CHANNELS;

    if features.len() != expected {
        return Err(TomatoError::InvalidInput(format!(
            "expected {} feature values ({}x{}x{}), got {}",
            expected,
            size,
            size,
            CHANNELS,
            features.len()
        )));
    }

    if let Some((idx, value)) = features
        .iter()
        .enumerate()
        .find(|(_, v)| !v.is_finite() || **v < 0.0 || **v > 1.0)
    {
        return Err(TomatoError::InvalidInput(format!(
            "feature values must be in [0, 1]; index {} is {}",
            idx, value
        )));
    }

    let mut chw = vec![0.0f32; expected];
    for (i, pixel) in features.chunks_exact(CHANNELS).enumerate() {
        for (c, value) in pixel.iter().enumerate() {
            chw[c * num_pixels + i] = *value;
        }
    }

    Ok(chw)
}

/// Wrap CHW data into a `[1, 3, size, size]` tensor
pub fn chw_to_tensor<B: Backend>(chw: Vec<f32>, size: usize, device: &B::Device) -> Tensor<B, 4> {
    Tensor::<B, 4>::from_floats(TensorData::new(chw, [1, CHANNELS, size, size]), device)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;
    use image::{ImageFormat, Rgb};

    type TestBackend = NdArray;

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 77]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn test_decode_and_preprocess_shape_and_range() {
        let img = decode_image(&png_bytes(300, 200)).unwrap();
        let chw = image_to_chw(&img, 128);
        assert_eq!(chw.len(), 3 * 128 * 128);
        assert!(chw.iter().all(|v| (0.0..=1.0).contains(v)));

        let device = Default::default();
        let tensor = chw_to_tensor::<TestBackend>(chw, 128, &device);
        assert_eq!(tensor.dims(), [1, 3, 128, 128]);
    }

    #[test]
    fn test_preprocess_is_deterministic() {
        let bytes = png_bytes(64, 64);
        let a = image_to_chw(&decode_image(&bytes).unwrap(), 32);
        let b = image_to_chw(&decode_image(&bytes).unwrap(), 32);
        assert_eq!(a, b);
    }

    #[test]
    fn test_grayscale_is_converted_to_rgb() {
        let gray = DynamicImage::ImageLuma8(image::GrayImage::from_pixel(10, 10, image::Luma([255])));
        let chw = image_to_chw(&gray, 8);
        assert_eq!(chw.len(), 3 * 8 * 8);
        assert!(chw.iter().all(|v| (*v - 1.0).abs() < 1e-6));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode_image(b"definitely not an image").unwrap_err();
        assert!(err.is_client_error());
        assert!(decode_image(&[]).unwrap_err().is_client_error());
    }

    #[test]
    fn test_features_reordered_to_chw() {
        // 2x2 image, pixel i has RGB = (i, i + 10, i + 20) / 100
        let mut hwc = Vec::new();
        for i in 0..4 {
            hwc.extend([i as f32 / 100.0, (i + 10) as f32 / 100.0, (i + 20) as f32 / 100.0]);
        }
        let chw = features_to_chw(&hwc, 2).unwrap();
        assert_eq!(&chw[0..4], &[0.0, 0.01, 0.02, 0.03]);
        assert_eq!(&chw[4..8], &[0.10, 0.11, 0.12, 0.13]);
        assert_eq!(&chw[8..12], &[0.20, 0.21, 0.22, 0.23]);
    }

    #[test]
    fn test_features_wrong_length() {
        let err = features_to_chw(&[0.5; 10], 128).unwrap_err();
        assert!(err.is_client_error());
        assert!(err.to_string().contains("49152"));
    }

    #[test]
    fn test_features_out_of_range() {
        let mut features = vec![0.5f32; 12];
        features[5] = 1.5;
        assert!(features_to_chw(&features, 2).is_err());
        features[5] = f32::NAN;
        assert!(features_to_chw(&features, 2).is_err());
    }
}
