#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]

//! # remove_bg
//!
//! Background removal for a single image, driven by a salient-object
//! segmentation model (`ISNet` by default) running on ONNX Runtime or Tract.
//!
//! The `remove_bg` binary reads an image, predicts a foreground mask, and
//! writes a PNG whose alpha channel comes from that mask:
//!
//! ```text
//! $ remove_bg photo.jpg photo_nobg.png
//! [RemoveBG] Loading image: photo.jpg
//! [RemoveBG] Processing with AI model...
//! [RemoveBG] Saved to: photo_nobg.png
//! [RemoveBG] Output size: 482113 bytes
//! ```
//!
//! ## Library usage
//!
//! ```rust,no_run
//! use remove_bg::{remove_background_from_bytes, RemovalConfig};
//!
//! # fn example() -> remove_bg::Result<()> {
//! let config = RemovalConfig::default();
//! let png = remove_background_from_bytes(&std::fs::read("input.jpg")?, &config)?;
//! std::fs::write("output.png", png)?;
//! # Ok(())
//! # }
//! ```
//!
//! Models are never fetched implicitly. Download one first with
//! `remove_bg --download-model` or [`ModelDownloader`].
//!
//! ### Feature Flags
//!
//! - `onnx` (default): ONNX Runtime backend with CUDA and `CoreML` providers
//! - `tract` (default): Pure Rust backend
//! - `cli` (default): command-line front end, progress bars, and tracing subscriber

pub mod backends;
pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod download;
pub mod error;
pub mod inference;
pub mod models;
pub mod processor;
pub mod removal;
pub mod services;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod utils;

pub use cache::{format_size, ModelCache};
pub use config::{BackendType, ExecutionProvider, RemovalConfig, RemovalConfigBuilder};
pub use download::{parse_huggingface_url, validate_model_url, ModelDownloader};
pub use error::{RemoveBgError, Result};
pub use inference::InferenceBackend;
pub use models::{ModelManager, ModelSource, ModelSpec};
pub use processor::{
    BackendFactory, BackgroundRemovalProcessor, BackgroundRemover, DefaultBackendFactory, DefaultRemoverFactory,
    RemoverFactory,
};
pub use removal::remove_background;
pub use services::StatusReporter;
pub use utils::{ExecutionProviderManager, ProviderInfo};

#[cfg(feature = "cli")]
pub use tracing_config::{init_cli_tracing, TracingConfig, TracingFormat};

/// Remove the background of an encoded image held in memory
///
/// Returns PNG bytes with the background made transparent.
pub fn remove_background_from_bytes(image_bytes: &[u8], config: &RemovalConfig) -> Result<Vec<u8>> {
    let mut remover = DefaultRemoverFactory::new().create(config)?;
    remover.remove(image_bytes)
}
