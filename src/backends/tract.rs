//! Tract backend
//!
//! Pure Rust inference through Tract. Only the CPU execution provider is
//! supported; no native libraries are needed at runtime.

use crate::config::RemovalConfig;
use crate::error::{RemoveBgError, Result};
use crate::inference::InferenceBackend;
use crate::models::{ModelInfo, ModelManager, PreprocessingConfig};
use ndarray::Array4;
use std::time::{Duration, Instant};
use tract_onnx::prelude::*;

type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

/// Tract backend for running background removal models using pure Rust inference
#[derive(Debug)]
pub struct TractBackend {
    model: Option<TractModel>,
    model_manager: ModelManager,
}

impl TractBackend {
    /// List Tract execution providers as `(name, available, description)`
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        vec![(
            "CPU".to_string(),
            true,
            "Pure Rust CPU inference with no external dependencies".to_string(),
        )]
    }

    /// Create a backend for the given model
    #[must_use]
    pub fn with_model_manager(model_manager: ModelManager) -> Self {
        Self {
            model: None,
            model_manager,
        }
    }

    fn load_model(&mut self) -> Result<Duration> {
        let model_load_start = Instant::now();

        let model_data = self.model_manager.load_model()?;
        let model_info = self.model_manager.get_info()?;
        let [height, width] = self.model_manager.get_preprocessing_config()?.target_size;

        log::info!(
            "Initializing Tract backend with model {} ({})",
            model_info.name,
            model_info.precision
        );

        // Pin the input shape so the graph can be fully typed and optimized
        let input_fact = InferenceFact::dt_shape(
            f32::datum_type(),
            tvec![1usize, 3, height as usize, width as usize],
        );

        let model = onnx()
            .model_for_read(&mut std::io::Cursor::new(model_data))
            .map_err(|e| RemoveBgError::model(format!("Failed to load ONNX model: {e}")))?
            .with_input_fact(0, input_fact)
            .map_err(|e| RemoveBgError::model(format!("Failed to set input shape: {e}")))?
            .into_optimized()
            .map_err(|e| RemoveBgError::model(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| RemoveBgError::model(format!("Failed to create runnable model: {e}")))?;

        self.model = Some(model);

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "Tract backend initialized in {}ms",
            model_load_time.as_millis()
        );
        Ok(model_load_time)
    }
}

impl InferenceBackend for TractBackend {
    fn initialize(&mut self, _config: &RemovalConfig) -> Result<Option<Duration>> {
        if self.model.is_some() {
            return Ok(None);
        }
        self.load_model().map(Some)
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| RemoveBgError::internal("Backend not initialized"))?;

        log::debug!("Running Tract inference on input tensor {:?}", input.shape());
        let inference_start = Instant::now();

        let input_tensor = Tensor::from(input.clone());
        let outputs = model
            .run(tvec![input_tensor.into()])
            .map_err(|e| RemoveBgError::inference(format!("Tract inference failed: {e}")))?;

        let output_tensor = outputs
            .into_iter()
            .next()
            .ok_or_else(|| RemoveBgError::inference("No output tensor found"))?
            .into_arc_tensor();
        let output_data = output_tensor.to_array_view::<f32>().map_err(|e| {
            RemoveBgError::inference(format!("Failed to convert output tensor: {e}"))
        })?;

        let &[batch, channels, height, width] = output_data.shape() else {
            return Err(RemoveBgError::processing(format!(
                "Expected 4D output tensor, got {}D",
                output_data.ndim()
            )));
        };
        let data: Vec<f32> = output_data.iter().copied().collect();
        let output_array = Array4::from_shape_vec((batch, channels, height, width), data)
            .map_err(|e| RemoveBgError::processing(format!("Failed to reshape output tensor: {e}")))?;

        log::debug!(
            "Tract inference completed in {}ms",
            inference_start.elapsed().as_millis()
        );
        Ok(output_array)
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        self.model_manager.get_preprocessing_config()
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        self.model_manager.get_info()
    }

    fn is_initialized(&self) -> bool {
        self.model.is_some()
    }
}
