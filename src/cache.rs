//! Model cache location and layout
//!
//! Downloaded models live under `<cache root>/models/<model id>/`, where the
//! cache root is `REMOVE_BG_CACHE_DIR` if set, otherwise the XDG cache
//! directory (`~/.cache/remove-bg` on Linux).

use crate::error::{RemoveBgError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the cache root
pub const CACHE_DIR_ENV: &str = "REMOVE_BG_CACHE_DIR";

const DEFAULT_MODEL_URL: &str = "https://huggingface.co/imgly/isnet-general-onnx";
const HUGGINGFACE_PREFIX: &str = "https://huggingface.co/";

/// Model cache manager
#[derive(Debug, Clone)]
pub struct ModelCache {
    cache_dir: PathBuf,
}

impl ModelCache {
    /// Open the default cache, creating the directory if needed
    ///
    /// # Errors
    /// - Failed to determine cache directory
    /// - Failed to create cache directory
    pub fn new() -> Result<Self> {
        let cache_dir = Self::get_cache_dir()?;
        Self::ensure_dir(&cache_dir)?;
        Ok(Self { cache_dir })
    }

    /// Open a cache rooted at a custom directory
    ///
    /// # Errors
    /// - Failed to create cache directory
    pub fn with_custom_cache_dir(cache_root: &Path) -> Result<Self> {
        let cache_dir = cache_root.join("models");
        Self::ensure_dir(&cache_dir)?;
        Ok(Self { cache_dir })
    }

    /// Open a cache rooted at `cache_root` if given, else the default cache
    ///
    /// # Errors
    /// - Failed to determine or create the cache directory
    pub fn from_override(cache_root: Option<&Path>) -> Result<Self> {
        match cache_root {
            Some(root) => Self::with_custom_cache_dir(root),
            None => Self::new(),
        }
    }

    /// Locate the cache without creating any directory
    ///
    /// # Errors
    /// - Failed to determine the default cache directory
    pub fn locate(cache_root: Option<&Path>) -> Result<Self> {
        let cache_dir = match cache_root {
            Some(root) => root.join("models"),
            None => Self::get_cache_dir()?,
        };
        Ok(Self { cache_dir })
    }

    fn ensure_dir(cache_dir: &Path) -> Result<()> {
        if !cache_dir.exists() {
            fs::create_dir_all(cache_dir).map_err(|e| {
                RemoveBgError::file_io_error("create cache directory", cache_dir, &e)
            })?;
        }
        Ok(())
    }

    fn get_cache_dir() -> Result<PathBuf> {
        if let Ok(cache_override) = std::env::var(CACHE_DIR_ENV) {
            return Ok(PathBuf::from(cache_override).join("models"));
        }

        Ok(dirs::cache_dir()
            .ok_or_else(|| {
                RemoveBgError::invalid_config(format!(
                    "Failed to determine cache directory. Set {CACHE_DIR_ENV} environment variable."
                ))
            })?
            .join("remove-bg")
            .join("models"))
    }

    /// Generate a cache-safe model ID from a URL
    ///
    /// # Examples
    /// ```
    /// use remove_bg::cache::ModelCache;
    ///
    /// let id = ModelCache::url_to_model_id("https://huggingface.co/imgly/isnet-general-onnx");
    /// assert_eq!(id, "imgly--isnet-general-onnx");
    /// ```
    #[must_use]
    pub fn url_to_model_id(url: &str) -> String {
        if let Some(repo_path) = url.strip_prefix(HUGGINGFACE_PREFIX) {
            // `<user>/<repo>` only; `/tree/main` and similar suffixes name the same repository
            repo_path
                .split('/')
                .filter(|segment| !segment.is_empty())
                .take(2)
                .collect::<Vec<_>>()
                .join("--")
        } else {
            use sha2::{Digest, Sha256};
            let mut hasher = Sha256::new();
            hasher.update(url.as_bytes());
            let hash_string = format!("url-{:x}", hasher.finalize());
            hash_string.get(..16).unwrap_or(&hash_string).to_string()
        }
    }

    /// Check that a model ID names a single directory inside the cache
    ///
    /// # Errors
    /// - Empty ID, path separators, or `..`
    pub fn validate_model_id(model_id: &str) -> Result<()> {
        if model_id.is_empty() || model_id.contains(['/', '\\']) || model_id.contains("..") {
            return Err(RemoveBgError::invalid_config(format!(
                "Invalid model ID '{model_id}'. Pass a cached model ID, a HuggingFace URL, or an existing path"
            )));
        }
        Ok(())
    }

    /// Check if a model directory exists and holds at least one ONNX variant
    #[must_use]
    pub fn is_model_cached(&self, model_id: &str) -> bool {
        let model_path = self.cache_dir.join(model_id);
        model_path.is_dir() && Self::validate_model_directory(&model_path)
    }

    /// Path of a model directory (may not exist)
    #[must_use]
    pub fn get_model_path(&self, model_id: &str) -> PathBuf {
        self.cache_dir.join(model_id)
    }

    fn validate_model_directory(model_path: &Path) -> bool {
        let onnx_dir = model_path.join("onnx");
        onnx_dir.join("model.onnx").is_file() || onnx_dir.join("model_fp16.onnx").is_file()
    }

    /// Model ID of the default model
    #[must_use]
    pub fn get_default_model_id() -> String {
        Self::url_to_model_id(DEFAULT_MODEL_URL)
    }

    /// URL of the default model repository
    #[must_use]
    pub fn get_default_model_url() -> &'static str {
        DEFAULT_MODEL_URL
    }

    /// Directory holding all cached models
    #[must_use]
    pub fn get_current_cache_dir(&self) -> &PathBuf {
        &self.cache_dir
    }
}

/// Format a byte count in human-readable units
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    let unit = UNITS.get(unit_index).unwrap_or(&"B");
    if unit_index == 0 {
        format!("{bytes} {unit}")
    } else {
        format!("{size:.1} {unit}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_url_to_model_id() {
        assert_eq!(
            ModelCache::url_to_model_id("https://huggingface.co/imgly/isnet-general-onnx"),
            "imgly--isnet-general-onnx"
        );
        assert_eq!(
            ModelCache::url_to_model_id("https://huggingface.co/ZhengPeng7/BiRefNet/"),
            "ZhengPeng7--BiRefNet"
        );

        assert_eq!(
            ModelCache::url_to_model_id("https://huggingface.co/imgly/isnet-general-onnx/tree/main"),
            "imgly--isnet-general-onnx"
        );

        let id = ModelCache::url_to_model_id("https://example.com/model.onnx");
        assert!(id.starts_with("url-"));
        assert_eq!(id.len(), 16);
        assert_eq!(id, ModelCache::url_to_model_id("https://example.com/model.onnx"));
    }

    #[test]
    fn test_default_model_constants() {
        assert_eq!(ModelCache::get_default_model_id(), "imgly--isnet-general-onnx");
        assert_eq!(
            ModelCache::get_default_model_url(),
            "https://huggingface.co/imgly/isnet-general-onnx"
        );
    }

    #[test]
    fn test_custom_cache_dir() {
        let temp_dir = TempDir::new().unwrap();
        let custom_root = temp_dir.path().join("custom_cache");

        let cache = ModelCache::with_custom_cache_dir(&custom_root).unwrap();
        assert!(custom_root.join("models").is_dir());
        assert_eq!(cache.get_current_cache_dir(), &custom_root.join("models"));
        assert_eq!(
            cache.get_model_path("some--model"),
            custom_root.join("models").join("some--model")
        );
    }

    #[test]
    fn test_locate_does_not_create_directories() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("never_created");

        let cache = ModelCache::locate(Some(&root)).unwrap();
        assert_eq!(cache.get_current_cache_dir(), &root.join("models"));
        assert!(!cache.is_model_cached("imgly--isnet-general-onnx"));
        assert!(!root.exists());
    }

    #[test]
    fn test_validate_model_id() {
        assert!(ModelCache::validate_model_id("imgly--isnet-general-onnx").is_ok());
        assert!(ModelCache::validate_model_id("url-0123456789ab").is_ok());

        for id in ["", "../outside", "a/b", "..", "a\\b", "/etc"] {
            let err = ModelCache::validate_model_id(id).unwrap_err();
            assert!(matches!(err, RemoveBgError::InvalidConfig(_)), "{id} should be rejected");
        }
    }

    #[test]
    fn test_is_model_cached_requires_onnx_file() {
        let temp_dir = TempDir::new().unwrap();
        let cache = ModelCache::with_custom_cache_dir(temp_dir.path()).unwrap();
        let model_dir = cache.get_model_path("imgly--isnet-general-onnx");

        assert!(!cache.is_model_cached("imgly--isnet-general-onnx"));

        fs::create_dir_all(model_dir.join("onnx")).unwrap();
        assert!(!cache.is_model_cached("imgly--isnet-general-onnx"));

        fs::write(model_dir.join("onnx").join("model_fp16.onnx"), b"onnx").unwrap();
        assert!(cache.is_model_cached("imgly--isnet-general-onnx"));
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1024), "1.0 KB");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(1024 * 1024), "1.0 MB");
        assert_eq!(format_size(1024 * 1024 * 1024), "1.0 GB");
    }
}
