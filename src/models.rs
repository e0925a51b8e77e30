//! Model resolution and loading
//!
//! A model is either a cached HuggingFace-style repository
//! (`config.json`, `preprocessor_config.json`, `onnx/model*.onnx`) or an
//! external path to such a directory or to a bare `.onnx` file.

use crate::cache::ModelCache;
use crate::error::{RemoveBgError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// ONNX files inside a model repository, by precision variant
const VARIANT_FILES: &[(&str, &str)] = &[("fp32", "onnx/model.onnx"), ("fp16", "onnx/model_fp16.onnx")];

/// Model source specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ModelSource {
    /// Model repository in the local cache, by model ID
    Cached(String),
    /// Model repository directory or `.onnx` file on the filesystem
    External(PathBuf),
}

impl ModelSource {
    /// Get a display name for tracing and logging
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            ModelSource::External(path) => format!(
                "external:{}",
                path.file_name().unwrap_or_default().to_string_lossy()
            ),
            ModelSource::Cached(model_id) => format!("cached:{model_id}"),
        }
    }
}

/// Complete model specification including source and optional variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub source: ModelSource,
    pub variant: Option<String>,
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self {
            source: ModelSource::Cached(ModelCache::get_default_model_id()),
            variant: None,
        }
    }
}

impl ModelSpec {
    /// Interpret a `--model` argument: existing paths are external, anything else a cache ID
    #[must_use]
    pub fn parse(arg: &str) -> Self {
        let path = Path::new(arg);
        let source = if path.exists() {
            ModelSource::External(path.to_path_buf())
        } else if arg.starts_with("https://") {
            ModelSource::Cached(ModelCache::url_to_model_id(arg))
        } else {
            ModelSource::Cached(arg.to_string())
        };
        Self {
            source,
            variant: None,
        }
    }

    /// Attach a precision variant
    #[must_use]
    pub fn with_variant(mut self, variant: Option<String>) -> Self {
        self.variant = variant;
        self
    }
}

/// Image preprocessing parameters expected by a model
#[derive(Debug, Clone, PartialEq)]
pub struct PreprocessingConfig {
    /// Square input size `[height, width]`
    pub target_size: [u32; 2],
    /// Per-channel mean in the 0-1 range
    pub normalization_mean: [f32; 3],
    /// Per-channel standard deviation in the 0-1 range
    pub normalization_std: [f32; 3],
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        // ISNet defaults: 1024x1024, mean 128/255, std 256/255
        Self {
            target_size: [1024, 1024],
            normalization_mean: [128.0 / 255.0; 3],
            normalization_std: [256.0 / 255.0; 3],
        }
    }
}

impl PreprocessingConfig {
    /// Parse a HuggingFace `preprocessor_config.json` document
    ///
    /// Mean and standard deviation are given in the 0-255 range there.
    ///
    /// # Errors
    /// - Missing or malformed `size`, `image_mean` or `image_std`
    pub fn from_huggingface(preprocessor: &serde_json::Value) -> Result<Self> {
        let size = preprocessor
            .get("size")
            .ok_or_else(|| RemoveBgError::invalid_config("Missing size in preprocessor config"))?;
        let dimension = |key: &str| -> Result<u32> {
            size.get(key)
                .and_then(serde_json::Value::as_u64)
                .and_then(|v| u32::try_from(v).ok())
                .filter(|v| *v > 0)
                .ok_or_else(|| {
                    RemoveBgError::invalid_config(format!("Missing or invalid {key} in size config"))
                })
        };
        let height = dimension("height")?;
        let width = dimension("width")?;

        Ok(Self {
            target_size: [height, width],
            normalization_mean: Self::parse_channels(preprocessor, "image_mean")?,
            normalization_std: Self::parse_channels(preprocessor, "image_std")?,
        })
    }

    fn parse_channels(preprocessor: &serde_json::Value, key: &str) -> Result<[f32; 3]> {
        let values = preprocessor
            .get(key)
            .and_then(serde_json::Value::as_array)
            .ok_or_else(|| {
                RemoveBgError::invalid_config(format!("Missing {key} in preprocessor config"))
            })?;

        if values.len() < 3 {
            return Err(RemoveBgError::invalid_config(format!(
                "{key} must have at least 3 values"
            )));
        }

        let mut channels = [0.0f32; 3];
        for (slot, value) in channels.iter_mut().zip(values) {
            let raw = value.as_f64().ok_or_else(|| {
                RemoveBgError::invalid_config(format!("{key} values must be numbers"))
            })?;
            *slot = (raw / 255.0) as f32;
        }
        Ok(channels)
    }
}

/// Model information and metadata
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: String,
    pub precision: String,
    pub size_bytes: u64,
}

/// Resolved model files on disk
#[derive(Debug, Clone)]
pub struct ModelManager {
    name: String,
    precision: String,
    model_file: PathBuf,
    preprocessor_file: Option<PathBuf>,
}

impl ModelManager {
    /// Resolve a model specification to files on disk
    ///
    /// # Errors
    /// - `DependencyMissing` when the model is not cached or the path does not exist
    /// - `InvalidConfig` for a model ID that is not a plain directory name
    /// - Cache directory cannot be determined
    pub fn from_spec(spec: &ModelSpec, cache_root: Option<&Path>) -> Result<Self> {
        match &spec.source {
            ModelSource::External(path) => Self::with_external_model(path, spec.variant.as_deref()),
            ModelSource::Cached(model_id) => {
                ModelCache::validate_model_id(model_id)?;
                let cache = ModelCache::locate(cache_root)?;
                if !cache.is_model_cached(model_id) {
                    return Err(RemoveBgError::dependency_missing(
                        format!("Model '{model_id}'"),
                        download_hint(model_id),
                    ));
                }
                Self::from_repository(
                    model_id,
                    &cache.get_model_path(model_id),
                    spec.variant.as_deref(),
                )
            },
        }
    }

    /// Use a model repository directory or a bare `.onnx` file
    ///
    /// # Errors
    /// - `DependencyMissing` when the path or requested variant does not exist
    pub fn with_external_model(path: &Path, variant: Option<&str>) -> Result<Self> {
        if !path.exists() {
            return Err(RemoveBgError::dependency_missing(
                format!("Model path '{}'", path.display()),
                "Point --model at a model directory or .onnx file, or run: remove_bg --download-model",
            ));
        }

        let name = path
            .file_stem()
            .map_or_else(|| "model".to_string(), |s| s.to_string_lossy().into_owned());

        if path.is_dir() {
            return Self::from_repository(&name, path, variant);
        }

        let sidecar = path
            .parent()
            .map(|dir| dir.join("preprocessor_config.json"))
            .filter(|p| p.is_file());
        Ok(Self {
            name,
            precision: variant.unwrap_or("fp32").to_string(),
            model_file: path.to_path_buf(),
            preprocessor_file: sidecar,
        })
    }

    fn from_repository(name: &str, dir: &Path, variant: Option<&str>) -> Result<Self> {
        let candidates: Vec<&(&str, &str)> = match variant {
            Some(requested) => {
                let matching: Vec<_> =
                    VARIANT_FILES.iter().filter(|(v, _)| *v == requested).collect();
                if matching.is_empty() {
                    return Err(RemoveBgError::invalid_config(format!(
                        "Unknown model variant '{requested}'. Supported: fp32, fp16"
                    )));
                }
                matching
            },
            None => VARIANT_FILES.iter().collect(),
        };

        let (precision, relative) = candidates
            .into_iter()
            .find(|(_, relative)| dir.join(relative).is_file())
            .ok_or_else(|| {
                RemoveBgError::dependency_missing(
                    format!(
                        "ONNX model file{} in '{}'",
                        variant.map(|v| format!(" ({v})")).unwrap_or_default(),
                        dir.display()
                    ),
                    download_hint(name),
                )
            })?;

        let preprocessor = dir.join("preprocessor_config.json");
        Ok(Self {
            name: name.to_string(),
            precision: (*precision).to_string(),
            model_file: dir.join(relative),
            preprocessor_file: preprocessor.is_file().then_some(preprocessor),
        })
    }

    /// Read the ONNX model bytes
    ///
    /// # Errors
    /// - File I/O errors when reading model data
    pub fn load_model(&self) -> Result<Vec<u8>> {
        fs::read(&self.model_file)
            .map_err(|e| RemoveBgError::file_io_error("read model file", &self.model_file, &e))
    }

    /// Model name, precision and file size
    ///
    /// # Errors
    /// - Model file metadata not readable
    pub fn get_info(&self) -> Result<ModelInfo> {
        let size_bytes = fs::metadata(&self.model_file)
            .map_err(|e| RemoveBgError::file_io_error("inspect model file", &self.model_file, &e))?
            .len();
        Ok(ModelInfo {
            name: self.name.clone(),
            precision: self.precision.clone(),
            size_bytes,
        })
    }

    /// Preprocessing parameters, from `preprocessor_config.json` when present
    ///
    /// # Errors
    /// - Unreadable or malformed preprocessor config
    pub fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        let Some(path) = &self.preprocessor_file else {
            return Ok(PreprocessingConfig::default());
        };
        let content = fs::read_to_string(path)
            .map_err(|e| RemoveBgError::file_io_error("read preprocessor config", path, &e))?;
        let value: serde_json::Value = serde_json::from_str(&content).map_err(|e| {
            RemoveBgError::invalid_config(format!("Failed to parse preprocessor_config.json: {e}"))
        })?;
        PreprocessingConfig::from_huggingface(&value)
    }

    /// Path of the resolved `.onnx` file
    #[must_use]
    pub fn model_path(&self) -> &Path {
        &self.model_file
    }
}

/// Remediation hint for a model that is not available locally
fn download_hint(model_id: &str) -> String {
    if model_id == ModelCache::get_default_model_id() {
        "Please download the model: remove_bg --download-model".to_string()
    } else if model_id.contains("--") {
        format!(
            "Please download the model: remove_bg --download-model https://huggingface.co/{}",
            model_id.replacen("--", "/", 1)
        )
    } else {
        "Please download a model (remove_bg --download-model) or pass --model <path>".to_string()
    }
}
