//! Deterministic backend for exercising the pipeline without a model

use crate::{
    config::RemovalConfig,
    error::{RemoveBgError, Result},
    inference::InferenceBackend,
    models::{ModelInfo, PreprocessingConfig},
};
use ndarray::Array4;
use std::time::Duration;

/// Backend producing a centred elliptical foreground mask
///
/// The ellipse spans half of each output dimension, so the middle of any
/// letterboxed image is foreground and its corners are background.
#[derive(Debug, Clone)]
pub struct MockBackend {
    initialized: bool,
    preprocessing_config: PreprocessingConfig,
    fail_inference: bool,
}

impl MockBackend {
    /// Mock backend with a 64x64 model input
    #[must_use]
    pub fn new() -> Self {
        Self::with_target_size(64)
    }

    /// Mock backend with a square model input of `size` pixels
    #[must_use]
    pub fn with_target_size(size: u32) -> Self {
        Self {
            initialized: false,
            preprocessing_config: PreprocessingConfig {
                target_size: [size, size],
                ..PreprocessingConfig::default()
            },
            fail_inference: false,
        }
    }

    /// Mock backend whose inference always fails
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_inference: true,
            ..Self::new()
        }
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceBackend for MockBackend {
    fn initialize(&mut self, _config: &RemovalConfig) -> Result<Option<Duration>> {
        if self.initialized {
            return Ok(None);
        }
        self.initialized = true;
        Ok(Some(Duration::ZERO))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        if !self.initialized {
            return Err(RemoveBgError::internal("Backend not initialized"));
        }
        if self.fail_inference {
            return Err(RemoveBgError::inference("Mock inference failure"));
        }

        let (batch, _, height, width) = input.dim();
        let center_x = width as f32 / 2.0;
        let center_y = height as f32 / 2.0;
        let radius_x = (width as f32 / 4.0).max(1.0);
        let radius_y = (height as f32 / 4.0).max(1.0);

        Ok(Array4::from_shape_fn((batch, 1, height, width), |(_, _, y, x)| {
            let dx = (x as f32 + 0.5 - center_x) / radius_x;
            let dy = (y as f32 + 0.5 - center_y) / radius_y;
            if dx * dx + dy * dy <= 1.0 {
                1.0
            } else {
                0.0
            }
        }))
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(self.preprocessing_config.clone())
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        Ok(ModelInfo {
            name: "mock".to_string(),
            precision: "fp32".to_string(),
            size_bytes: 0,
        })
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}
