//! Background removal processor
//!
//! `BackgroundRemover` is the bytes-to-bytes capability the command layer
//! calls. `BackgroundRemovalProcessor` implements it on top of an
//! `InferenceBackend`: decode, letterbox, infer, mask, encode PNG.

use crate::{
    config::{BackendType, RemovalConfig},
    error::{RemoveBgError, Result},
    inference::InferenceBackend,
    models::{ModelManager, PreprocessingConfig},
    utils::{ImagePreprocessor, Letterbox},
};
use image::{DynamicImage, GrayImage, ImageFormat, Luma, Rgba, RgbaImage};
use log::{debug, info};
use ndarray::Array4;
use std::io::Cursor;
use std::time::Instant;

/// Removes the background from an encoded image
pub trait BackgroundRemover {
    /// Turn encoded image bytes into encoded output image bytes
    ///
    /// # Errors
    /// - Undecodable input, inference or encoding failures
    fn remove(&mut self, image_bytes: &[u8]) -> Result<Vec<u8>>;
}

/// Creates background removers for a configuration
pub trait RemoverFactory: Send + Sync {
    /// Load the removal capability
    ///
    /// # Errors
    /// - `DependencyMissing` when the model or backend is unavailable
    /// - Model loading or backend initialization failures
    fn create(&self, config: &RemovalConfig) -> Result<Box<dyn BackgroundRemover>>;
}

/// Factory trait for creating inference backends
pub trait BackendFactory: Send + Sync {
    /// Create a backend instance of the specified type with the given model manager
    ///
    /// # Errors
    /// - `DependencyMissing` when the backend was not compiled in
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_manager: ModelManager,
    ) -> Result<Box<dyn InferenceBackend>>;

    /// List backend types compiled into this build
    fn available_backends(&self) -> Vec<BackendType>;
}

/// Backend factory for the backends enabled by cargo features
pub struct DefaultBackendFactory;

impl BackendFactory for DefaultBackendFactory {
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_manager: ModelManager,
    ) -> Result<Box<dyn InferenceBackend>> {
        match backend_type {
            #[cfg(feature = "onnx")]
            BackendType::Onnx => Ok(Box::new(crate::backends::OnnxBackend::with_model_manager(
                model_manager,
            ))),
            #[cfg(feature = "tract")]
            BackendType::Tract => Ok(Box::new(crate::backends::TractBackend::with_model_manager(
                model_manager,
            ))),
            #[allow(unreachable_patterns)]
            other => {
                drop(model_manager);
                Err(RemoveBgError::dependency_missing(
                    format!("{other} backend"),
                    format!("Please install: rebuild remove_bg with `--features {other}`"),
                ))
            },
        }
    }

    fn available_backends(&self) -> Vec<BackendType> {
        let mut backends = Vec::new();
        #[cfg(feature = "onnx")]
        backends.push(BackendType::Onnx);
        #[cfg(feature = "tract")]
        backends.push(BackendType::Tract);
        backends
    }
}

/// Production remover factory: resolves the model and builds a processor
pub struct DefaultRemoverFactory {
    backend_factory: Box<dyn BackendFactory>,
}

impl DefaultRemoverFactory {
    #[must_use]
    pub fn new() -> Self {
        Self::with_backend_factory(Box::new(DefaultBackendFactory))
    }

    /// Use a custom backend factory
    #[must_use]
    pub fn with_backend_factory(backend_factory: Box<dyn BackendFactory>) -> Self {
        Self { backend_factory }
    }
}

impl Default for DefaultRemoverFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl RemoverFactory for DefaultRemoverFactory {
    fn create(&self, config: &RemovalConfig) -> Result<Box<dyn BackgroundRemover>> {
        config.validate()?;
        debug!("Model: {}", config.model.source.display_name());
        debug!("Backend: {}, provider: {}", config.backend_type, config.execution_provider);

        let model_manager = ModelManager::from_spec(&config.model, config.cache_dir.as_deref())?;
        let backend = self
            .backend_factory
            .create_backend(config.backend_type, model_manager)?;
        let processor = BackgroundRemovalProcessor::with_backend(backend, config)?;
        Ok(Box::new(processor))
    }
}

/// Segmentation based background remover
pub struct BackgroundRemovalProcessor {
    backend: Box<dyn InferenceBackend>,
    preprocessing_config: PreprocessingConfig,
}

impl BackgroundRemovalProcessor {
    /// Initialize `backend` and wrap it in a processor
    ///
    /// # Errors
    /// - Backend initialization failures
    /// - Invalid preprocessing configuration
    pub fn with_backend(mut backend: Box<dyn InferenceBackend>, config: &RemovalConfig) -> Result<Self> {
        if let Some(load_time) = backend.initialize(config)? {
            info!("Model loaded in {}ms", load_time.as_millis());
        }
        let preprocessing_config = backend.get_preprocessing_config()?;
        Ok(Self {
            backend,
            preprocessing_config,
        })
    }

    /// Remove the background of a decoded image
    ///
    /// # Errors
    /// - Preprocessing, inference or mask generation failures
    pub fn process_image(&mut self, image: &DynamicImage) -> Result<RgbaImage> {
        let start = Instant::now();

        let (letterbox, input_tensor) =
            ImagePreprocessor::preprocess_for_inference(image, &self.preprocessing_config)?;
        let output_tensor = self.backend.infer(&input_tensor)?;
        let mask = self.tensor_to_mask(&output_tensor, &letterbox, (image.width(), image.height()))?;
        let result = apply_mask(image, &mask);

        debug!("Processed {}x{} image in {}ms", image.width(), image.height(), start.elapsed().as_millis());
        Ok(result)
    }

    /// Map the `1x1xHxW` output tensor back onto the original image
    fn tensor_to_mask(
        &self,
        tensor: &Array4<f32>,
        letterbox: &Letterbox,
        original_dimensions: (u32, u32),
    ) -> Result<GrayImage> {
        let (batch, channels, mask_height, mask_width) = tensor.dim();
        if batch != 1 || channels != 1 || mask_height == 0 || mask_width == 0 {
            return Err(RemoveBgError::processing(format!(
                "Invalid output tensor shape: {:?}",
                tensor.shape()
            )));
        }

        // The output may be at a different resolution than the model input
        let [canvas_height, canvas_width] = self.preprocessing_config.target_size;
        let ratio_x = mask_width as f32 / canvas_width as f32;
        let ratio_y = mask_height as f32 / canvas_height as f32;

        let (orig_width, orig_height) = original_dimensions;
        Ok(GrayImage::from_fn(orig_width, orig_height, |x, y| {
            let canvas_x = (x as f32 + 0.5) * letterbox.scale + letterbox.offset_x as f32;
            let canvas_y = (y as f32 + 0.5) * letterbox.scale + letterbox.offset_y as f32;
            let tensor_x = ((canvas_x * ratio_x) as usize).min(mask_width - 1);
            let tensor_y = ((canvas_y * ratio_y) as usize).min(mask_height - 1);

            let value = tensor
                .get([0, 0, tensor_y, tensor_x])
                .copied()
                .unwrap_or(0.0);
            Luma([(value.clamp(0.0, 1.0) * 255.0) as u8])
        }))
    }
}

/// Use the mask as alpha; fully transparent pixels become `[0, 0, 0, 0]`
fn apply_mask(image: &DynamicImage, mask: &GrayImage) -> RgbaImage {
    let mut result = image.to_rgba8();
    for (x, y, pixel) in result.enumerate_pixels_mut() {
        let alpha = mask.get_pixel(x, y)[0];
        *pixel = if alpha > 0 {
            Rgba([pixel[0], pixel[1], pixel[2], alpha])
        } else {
            Rgba([0, 0, 0, 0])
        };
    }
    result
}

impl BackgroundRemover for BackgroundRemovalProcessor {
    #[tracing::instrument(skip_all, fields(input_bytes = image_bytes.len()))]
    fn remove(&mut self, image_bytes: &[u8]) -> Result<Vec<u8>> {
        let image = image::load_from_memory(image_bytes)?;
        let result = self.process_image(&image)?;

        let mut encoded = Vec::new();
        DynamicImage::ImageRgba8(result).write_to(&mut Cursor::new(&mut encoded), ImageFormat::Png)?;
        tracing::debug!(output_bytes = encoded.len(), "encoded PNG");
        Ok(encoded)
    }
}
