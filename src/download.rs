//! Model downloading from `HuggingFace` repositories
//!
//! A repository is fetched into a staging directory inside the cache and
//! renamed into place once every required file is present, so the cache never
//! holds a half-downloaded model.

use crate::cache::ModelCache;
use crate::error::{RemoveBgError, Result};
use futures_util::stream::TryStreamExt;
#[cfg(feature = "cli")]
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::StreamReader;

const HUGGINGFACE_PREFIX: &str = "https://huggingface.co/";

/// Configuration files every model repository must provide
const REQUIRED_FILES: &[&str] = &["config.json", "preprocessor_config.json"];

/// ONNX model files to attempt downloading; at least one must succeed
const ONNX_FILES: &[(&str, &str)] = &[
    ("onnx/model.onnx", "fp32"),
    ("onnx/model_fp16.onnx", "fp16"),
];

/// Progress display that degrades to a no-op without the `cli` feature
#[derive(Debug)]
pub enum ProgressIndicator {
    #[cfg(feature = "cli")]
    Indicatif(ProgressBar),
    NoOp,
}

#[cfg_attr(not(feature = "cli"), allow(unused_variables))]
impl ProgressIndicator {
    fn new(show_progress: bool) -> Self {
        #[cfg(feature = "cli")]
        if show_progress {
            let style = ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}",
            )
            .map(|style| style.progress_chars("#>-"))
            .unwrap_or_else(|_| ProgressStyle::default_bar());
            let pb = ProgressBar::new(0);
            pb.set_style(style);
            return Self::Indicatif(pb);
        }
        Self::NoOp
    }

    fn set_message(&self, msg: String) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_message(msg),
            Self::NoOp => {},
        }
    }

    fn start_file(&self, total: Option<u64>) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => {
                pb.set_length(total.unwrap_or(0));
                pb.set_position(0);
            },
            Self::NoOp => {},
        }
    }

    fn set_position(&self, pos: u64) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_position(pos),
            Self::NoOp => {},
        }
    }

    fn finish_with_message(&self, msg: String) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.finish_with_message(msg),
            Self::NoOp => {},
        }
    }
}

/// Model downloader with progress reporting
#[derive(Debug)]
pub struct ModelDownloader {
    client: Client,
    cache: ModelCache,
}

impl ModelDownloader {
    /// Create a downloader for the cache rooted at `cache_root` (default cache if `None`)
    ///
    /// # Errors
    /// - Failed to create HTTP client
    /// - Failed to initialize model cache
    pub fn new(cache_root: Option<&Path>) -> Result<Self> {
        Self::with_cache(ModelCache::from_override(cache_root)?)
    }

    /// Create a downloader for an existing cache
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn with_cache(cache: ModelCache) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(300))
            .build()
            .map_err(|e| RemoveBgError::network_error("Failed to create HTTP client", e))?;
        Ok(Self::with_client(client, cache))
    }

    /// Create a downloader with a preconfigured HTTP client (proxies, timeouts)
    #[must_use]
    pub fn with_client(client: Client, cache: ModelCache) -> Self {
        Self { client, cache }
    }

    /// Download a model repository into the cache and return its model ID
    ///
    /// Already cached models are not downloaded again.
    ///
    /// # Errors
    /// - Unsupported URL
    /// - Network errors or no ONNX variant available
    /// - File system errors while staging or moving files
    pub async fn download_model(&self, url: &str, show_progress: bool) -> Result<String> {
        let (user, repo) = parse_huggingface_url(url)?;
        let base_url = format!("{HUGGINGFACE_PREFIX}{user}/{repo}");
        let model_id = ModelCache::url_to_model_id(&base_url);
        log::info!("Downloading model {model_id} from {url}");

        if self.cache.is_model_cached(&model_id) {
            log::info!("Model already cached: {model_id}");
            return Ok(model_id);
        }

        let staging_dir = self.create_staging_dir(&model_id)?;
        let final_dir = self.cache.get_model_path(&model_id);
        let progress = ProgressIndicator::new(show_progress);

        let result = self
            .download_model_files(&base_url, &staging_dir, &progress)
            .await
            .and_then(|()| Self::install(&staging_dir, &final_dir));

        match result {
            Ok(()) => {
                progress.finish_with_message(format!("Downloaded {model_id}"));
                log::info!("Successfully downloaded model: {model_id}");
                Ok(model_id)
            },
            Err(e) => {
                if staging_dir.exists() {
                    if let Err(cleanup_err) = fs::remove_dir_all(&staging_dir) {
                        log::warn!("Failed to clean up staging directory: {cleanup_err}");
                    }
                }
                progress.finish_with_message("Download failed".to_string());
                Err(e)
            },
        }
    }

    /// Staging directory inside the cache, so the final rename stays on one filesystem
    fn create_staging_dir(&self, model_id: &str) -> Result<PathBuf> {
        let staging_dir = self
            .cache
            .get_current_cache_dir()
            .join(format!(".{model_id}.partial"));

        if staging_dir.exists() {
            fs::remove_dir_all(&staging_dir).map_err(|e| {
                RemoveBgError::file_io_error("remove stale staging directory", &staging_dir, &e)
            })?;
        }
        fs::create_dir_all(&staging_dir).map_err(|e| {
            RemoveBgError::file_io_error("create staging directory", &staging_dir, &e)
        })?;
        Ok(staging_dir)
    }

    fn install(staging_dir: &Path, final_dir: &Path) -> Result<()> {
        if final_dir.exists() {
            fs::remove_dir_all(final_dir).map_err(|e| {
                RemoveBgError::file_io_error("remove incomplete model directory", final_dir, &e)
            })?;
        }
        fs::rename(staging_dir, final_dir).map_err(|e| {
            RemoveBgError::file_io_error("move downloaded model to cache", final_dir, &e)
        })
    }

    async fn download_model_files(
        &self,
        base_url: &str,
        download_dir: &Path,
        progress: &ProgressIndicator,
    ) -> Result<()> {
        let raw_base = format!("{base_url}/resolve/main/");

        for file_name in REQUIRED_FILES {
            progress.set_message(format!("Downloading {file_name}"));
            self.download_file(&format!("{raw_base}{file_name}"), &download_dir.join(file_name), progress)
                .await?;
        }

        let mut downloaded_models = 0;
        for (file_path, variant) in ONNX_FILES {
            progress.set_message(format!("Downloading {variant} model"));
            match self
                .download_file(&format!("{raw_base}{file_path}"), &download_dir.join(file_path), progress)
                .await
            {
                Ok(digest) => {
                    downloaded_models += 1;
                    log::info!("Downloaded {variant} model variant");
                    log::debug!("sha256({file_path}) = {digest}");
                },
                Err(e) => log::warn!("Failed to download {variant} variant: {e}"),
            }
        }

        if downloaded_models == 0 {
            return Err(RemoveBgError::network_error(
                "Failed to download any ONNX model variants",
                std::io::Error::new(std::io::ErrorKind::NotFound, "No model files found"),
            ));
        }
        Ok(())
    }

    /// Stream one file to disk, returning its hex sha256 digest
    async fn download_file(
        &self,
        url: &str,
        local_path: &Path,
        progress: &ProgressIndicator,
    ) -> Result<String> {
        log::debug!("Downloading: {url} -> {}", local_path.display());

        if let Some(parent) = local_path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| RemoveBgError::file_io_error("create directory", parent, &e))?;
        }

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| RemoveBgError::network_error(format!("Failed to download {url}"), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RemoveBgError::network_error(
                format!("HTTP error {status} for {url}"),
                std::io::Error::other("HTTP error"),
            ));
        }

        progress.start_file(response.content_length());

        let mut file = tokio::fs::File::create(local_path)
            .await
            .map_err(|e| RemoveBgError::file_io_error("create file", local_path, &e))?;
        let mut stream = StreamReader::new(response.bytes_stream().map_err(std::io::Error::other));

        let mut hasher = Sha256::new();
        let mut downloaded = 0u64;
        let mut buffer = vec![0; 64 * 1024];
        loop {
            let bytes_read = stream
                .read(&mut buffer)
                .await
                .map_err(|e| RemoveBgError::network_error("Failed to read download stream", e))?;
            if bytes_read == 0 {
                break;
            }
            let chunk = buffer.get(..bytes_read).unwrap_or_default();
            hasher.update(chunk);
            file.write_all(chunk)
                .await
                .map_err(|e| RemoveBgError::file_io_error("write to file", local_path, &e))?;

            downloaded += bytes_read as u64;
            progress.set_position(downloaded);
        }

        file.flush()
            .await
            .map_err(|e| RemoveBgError::file_io_error("flush file", local_path, &e))?;

        log::debug!("Downloaded {downloaded} bytes to {}", local_path.display());
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// The cache this downloader writes into
    #[must_use]
    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }
}

/// Validate that a URL is a supported model repository
///
/// Only `https://huggingface.co/<user>/<repo>` URLs are supported, with an
/// optional trailing slash.
///
/// # Errors
/// - Empty, non-HuggingFace, or incomplete repository URL
pub fn validate_model_url(url: &str) -> Result<()> {
    parse_huggingface_url(url).map(|_| ())
}

/// Split a `HuggingFace` repository URL into `(user, repository)`
///
/// # Errors
/// - Empty, non-HuggingFace, or incomplete repository URL
pub fn parse_huggingface_url(url: &str) -> Result<(String, String)> {
    if url.is_empty() {
        return Err(RemoveBgError::invalid_config("Model URL cannot be empty"));
    }

    let Some(repo_path) = url.strip_prefix(HUGGINGFACE_PREFIX) else {
        return Err(RemoveBgError::invalid_config(format!(
            "Unsupported URL format: {url}. Only HuggingFace repositories are supported (https://huggingface.co/...)"
        )));
    };

    let mut parts = repo_path.trim_end_matches('/').split('/');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(user), Some(repo), None) if !user.is_empty() && !repo.is_empty() => {
            Ok((user.to_string(), repo.to_string()))
        },
        _ => Err(RemoveBgError::invalid_config(format!(
            "Invalid HuggingFace repository URL: {url}. Expected format: https://huggingface.co/username/repo-name"
        ))),
    }
}
