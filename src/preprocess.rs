//! Image preprocessing for gesture model inference.
//!
//! Reproduces the validation-time transform the heads were trained with:
//! resize the shorter side to the target size, center-crop a square, scale
//! to [0, 1] and normalize per channel with the ImageNet statistics.

use crate::error::PredictError;
use image::{imageops::FilterType, DynamicImage, GenericImageView};
use ndarray::Array4;

/// Per-channel normalization constants the checkpoints were trained with.
pub const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Turns raw image bytes into a normalized NCHW tensor of shape
/// `(1, 3, input_size, input_size)`.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    input_size: u32,
}

impl Preprocessor {
    pub fn new(input_size: u32) -> Self {
        Self { input_size }
    }

    pub fn input_size(&self) -> u32 {
        self.input_size
    }

    /// Decode image bytes and apply the full transform.
    pub fn decode_and_transform(&self, bytes: &[u8]) -> Result<Array4<f32>, PredictError> {
        let img = image::load_from_memory(bytes)
            .map_err(|e| PredictError::ImageDecode(e.to_string()))?;
        Ok(self.transform(&img))
    }

    /// Resize, center-crop and normalize an already decoded image.
    pub fn transform(&self, img: &DynamicImage) -> Array4<f32> {
        let size = self.input_size;
        let (width, height) = img.dimensions();

        // Scale so the shorter side lands exactly on the target size.
        let scale = size as f32 / width.min(height).max(1) as f32;
        let new_width = ((width as f32 * scale).round() as u32).max(size);
        let new_height = ((height as f32 * scale).round() as u32).max(size);
        let resized = img.resize_exact(new_width, new_height, FilterType::Triangle);

        let x0 = (new_width - size) / 2;
        let y0 = (new_height - size) / 2;
        let rgb = resized.crop_imm(x0, y0, size, size).to_rgb8();

        let side = size as usize;
        let mut input = Array4::<f32>::zeros((1, 3, side, side));
        for y in 0..size {
            for x in 0..size {
                let pixel = rgb.get_pixel(x, y);
                for c in 0..3 {
                    input[[0, c, y as usize, x as usize]] =
                        (pixel[c] as f32 / 255.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
                }
            }
        }

        input
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    fn solid_image(width: u32, height: u32, value: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(
            width,
            height,
            image::Rgb([value, value, value]),
        ))
    }

    #[test]
    fn test_output_shape() {
        let preprocessor = Preprocessor::new(32);
        let tensor = preprocessor.transform(&solid_image(64, 48, 128));
        assert_eq!(tensor.shape(), &[1, 3, 32, 32]);
    }

    #[test]
    fn test_normalization_of_white_pixel() {
        let preprocessor = Preprocessor::new(8);
        let tensor = preprocessor.transform(&solid_image(8, 8, 255));

        for c in 0..3 {
            let expected = (1.0 - IMAGENET_MEAN[c]) / IMAGENET_STD[c];
            let actual = tensor[[0, c, 4, 4]];
            assert!(
                (actual - expected).abs() < 1e-5,
                "channel {}: {} vs {}",
                c,
                actual,
                expected
            );
        }
    }

    #[test]
    fn test_upscales_small_images() {
        let preprocessor = Preprocessor::new(32);
        let tensor = preprocessor.transform(&solid_image(10, 7, 0));
        assert_eq!(tensor.shape(), &[1, 3, 32, 32]);
    }

    #[test]
    fn test_malformed_bytes_fail_with_decode_error() {
        let preprocessor = Preprocessor::new(32);
        let err = preprocessor
            .decode_and_transform(b"definitely not an image")
            .unwrap_err();
        assert!(matches!(err, PredictError::ImageDecode(_)));
    }
}
