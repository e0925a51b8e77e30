//! Image preprocessing for model inference
//!
//! Images are letterboxed into the model's input size: an aspect ratio
//! preserving resize followed by centre padding, then normalised into an
//! NCHW `f32` tensor.

use crate::{
    error::{RemoveBgError, Result},
    models::PreprocessingConfig,
};
use image::{DynamicImage, ImageBuffer, RgbImage};
use ndarray::Array4;

/// Placement of the resized image inside the model canvas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// Scale factor applied to the original image
    pub scale: f32,
    /// Resized image width
    pub scaled_width: u32,
    /// Resized image height
    pub scaled_height: u32,
    /// Horizontal offset of the resized image in the canvas
    pub offset_x: u32,
    /// Vertical offset of the resized image in the canvas
    pub offset_y: u32,
}

impl Letterbox {
    /// Compute the placement of an `original` sized image in a `canvas` (width, height)
    ///
    /// # Errors
    /// - Zero sized image or canvas
    pub fn compute(original: (u32, u32), canvas: (u32, u32)) -> Result<Self> {
        let (orig_width, orig_height) = original;
        let (canvas_width, canvas_height) = canvas;
        if orig_width == 0 || orig_height == 0 {
            return Err(RemoveBgError::processing("Cannot preprocess an empty image"));
        }
        if canvas_width == 0 || canvas_height == 0 {
            return Err(RemoveBgError::invalid_config("Model input size must be non-zero"));
        }

        let scale = (canvas_width as f32 / orig_width as f32)
            .min(canvas_height as f32 / orig_height as f32);
        let scaled_width = ((orig_width as f32 * scale).round() as u32).clamp(1, canvas_width);
        let scaled_height = ((orig_height as f32 * scale).round() as u32).clamp(1, canvas_height);

        Ok(Self {
            scale,
            scaled_width,
            scaled_height,
            offset_x: (canvas_width - scaled_width) / 2,
            offset_y: (canvas_height - scaled_height) / 2,
        })
    }
}

/// Configuration for preprocessing behavior
#[derive(Debug, Clone)]
pub struct PreprocessingOptions {
    /// Padding color for aspect ratio preservation (RGB)
    pub padding_color: [u8; 3],
}

impl Default for PreprocessingOptions {
    fn default() -> Self {
        Self {
            padding_color: [255, 255, 255],
        }
    }
}

/// Image to tensor conversion
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Letterbox and normalise an image into a `1x3xHxW` tensor
    ///
    /// # Errors
    /// - Empty image or invalid model input size
    pub fn preprocess_image(
        image: &DynamicImage,
        preprocessing_config: &PreprocessingConfig,
        options: &PreprocessingOptions,
    ) -> Result<(Letterbox, Array4<f32>)> {
        let [target_height, target_width] = preprocessing_config.target_size;
        let rgb_image = image.to_rgb8();
        let letterbox = Letterbox::compute(rgb_image.dimensions(), (target_width, target_height))?;

        let resized = image::imageops::resize(
            &rgb_image,
            letterbox.scaled_width,
            letterbox.scaled_height,
            image::imageops::FilterType::Triangle,
        );

        let padding = options.padding_color;
        let mut canvas = ImageBuffer::from_pixel(
            target_width,
            target_height,
            image::Rgb([padding[0], padding[1], padding[2]]),
        );
        image::imageops::replace(
            &mut canvas,
            &resized,
            i64::from(letterbox.offset_x),
            i64::from(letterbox.offset_y),
        );

        let tensor = Self::canvas_to_tensor(&canvas, preprocessing_config);
        Ok((letterbox, tensor))
    }

    /// Preprocess with default options
    ///
    /// # Errors
    /// - Empty image or invalid model input size
    pub fn preprocess_for_inference(
        image: &DynamicImage,
        preprocessing_config: &PreprocessingConfig,
    ) -> Result<(Letterbox, Array4<f32>)> {
        Self::preprocess_image(image, preprocessing_config, &PreprocessingOptions::default())
    }

    fn canvas_to_tensor(canvas: &RgbImage, preprocessing_config: &PreprocessingConfig) -> Array4<f32> {
        let (width, height) = canvas.dimensions();
        let mean = preprocessing_config.normalization_mean;
        let std = preprocessing_config.normalization_std;

        Array4::from_shape_fn((1, 3, height as usize, width as usize), |(_, c, y, x)| {
            let pixel = canvas.get_pixel(x as u32, y as u32);
            let (value, mean, std) = match c {
                0 => (pixel[0], mean[0], std[0]),
                1 => (pixel[1], mean[1], std[1]),
                _ => (pixel[2], mean[2], std[2]),
            };
            (f32::from(value) / 255.0 - mean) / std
        })
    }
}
