//! Background removal command-line tool
//!
//! `remove_bg <input_path> <output_path>` removes the background of one image.
//! Exit code 0 on success, 1 on usage errors, a missing input file, or any
//! processing failure.

use super::config::CliConfigBuilder;
use crate::{
    cache::{format_size, ModelCache},
    download::ModelDownloader,
    processor::{DefaultRemoverFactory, RemoverFactory},
    removal::remove_background,
    services::StatusReporter,
    tracing_config::init_cli_tracing,
    utils::ExecutionProviderManager,
};
use anyhow::{Context, Result};
use clap::{error::ErrorKind, Parser};
use std::ffi::OsString;
use std::io::Write;
use std::path::PathBuf;

/// Successful run
pub const EXIT_SUCCESS: u8 = 0;
/// Usage error, missing input, or processing failure
pub const EXIT_FAILURE: u8 = 1;

/// One-line usage printed on argument errors
pub const USAGE: &str = "Usage: remove_bg <input_path> <output_path>";

/// Background removal CLI tool
#[derive(Parser, Debug)]
#[command(name = "remove_bg", author, version, about, long_about = None)]
pub struct Cli {
    /// Input image file
    #[arg(value_name = "INPUT_PATH", required_unless_present_any = ["download_model", "show_providers"])]
    pub input_path: Option<PathBuf>,

    /// Output image file (PNG with transparent background)
    #[arg(value_name = "OUTPUT_PATH", required_unless_present_any = ["download_model", "show_providers"])]
    pub output_path: Option<PathBuf>,

    /// Model directory, .onnx file, cached model ID, or HuggingFace URL of a downloaded model
    #[arg(short, long, value_name = "MODEL")]
    pub model: Option<String>,

    /// Execution provider in format backend:provider (e.g., onnx:auto, onnx:coreml, tract:cpu)
    #[arg(short, long, default_value = "onnx:auto")]
    pub execution_provider: String,

    /// Model precision variant [default: fp32, falling back to fp16]
    #[arg(long, value_parser = ["fp32", "fp16"])]
    pub variant: Option<String>,

    /// Number of inference threads (0 = auto-detect)
    #[arg(short, long, default_value_t = 0)]
    pub threads: usize,

    /// Use a custom model cache directory
    #[arg(long, value_name = "PATH")]
    pub cache_dir: Option<PathBuf>,

    /// Enable verbose logging (-v: INFO, -vv: DEBUG, -vvv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Download a model repository into the cache and exit
    #[arg(
        long,
        value_name = "URL",
        num_args = 0..=1,
        default_missing_value = "https://huggingface.co/imgly/isnet-general-onnx"
    )]
    pub download_model: Option<String>,

    /// Show execution provider availability and exit
    #[arg(long)]
    pub show_providers: bool,
}

/// Entry point for the `remove_bg` binary
pub async fn main() -> u8 {
    let mut stdout = std::io::stdout();
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => return report_parse_error(&e, &mut stdout),
    };

    if let Err(e) = init_cli_tracing(cli.verbose).context("Failed to initialize tracing") {
        eprintln!("{e:#}");
        return EXIT_FAILURE;
    }

    dispatch(&cli, &DefaultRemoverFactory::new(), &mut stdout).await
}

/// Parse `args` (including the program name) and run with an injected remover factory
///
/// Does not install a tracing subscriber.
pub async fn run<I, T>(args: I, factory: &dyn RemoverFactory, out: &mut dyn Write) -> u8
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match Cli::try_parse_from(args) {
        Ok(cli) => dispatch(&cli, factory, out).await,
        Err(e) => report_parse_error(&e, out),
    }
}

fn report_parse_error(error: &clap::Error, out: &mut dyn Write) -> u8 {
    match error.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
            let _ = write!(out, "{}", error.render());
            EXIT_SUCCESS
        },
        _ => {
            let _ = writeln!(out, "{USAGE}");
            eprintln!("{}", error.render());
            EXIT_FAILURE
        },
    }
}

async fn dispatch(cli: &Cli, factory: &dyn RemoverFactory, out: &mut dyn Write) -> u8 {
    if cli.show_providers {
        show_provider_diagnostics(out);
        return EXIT_SUCCESS;
    }

    if let Some(url) = &cli.download_model {
        let mut reporter = StatusReporter::new(out);
        return match download_model(cli, url, &mut reporter).await {
            Ok(()) => EXIT_SUCCESS,
            Err(e) => {
                reporter.report(&format!("Error: {e:#}"));
                EXIT_FAILURE
            },
        };
    }

    let (Some(input_path), Some(output_path)) = (&cli.input_path, &cli.output_path) else {
        let _ = writeln!(out, "{USAGE}");
        return EXIT_FAILURE;
    };

    let mut reporter = StatusReporter::new(out);
    if !input_path.exists() {
        reporter.report(&format!("Input file not found: {}", input_path.display()));
        return EXIT_FAILURE;
    }

    let config = match CliConfigBuilder::from_cli(cli) {
        Ok(config) => config,
        Err(e) => {
            reporter.report(&format!("Error: {e:#}"));
            return EXIT_FAILURE;
        },
    };
    tracing::info!(
        backend = %config.backend_type,
        provider = %config.execution_provider,
        model = %config.model.source.display_name(),
        "starting background removal"
    );

    if remove_background(input_path, output_path, factory, &config, &mut reporter) {
        EXIT_SUCCESS
    } else {
        EXIT_FAILURE
    }
}

async fn download_model(cli: &Cli, url: &str, reporter: &mut StatusReporter<'_>) -> Result<()> {
    let downloader =
        ModelDownloader::new(cli.cache_dir.as_deref()).context("Failed to create model downloader")?;

    reporter.report(&format!("Downloading model from: {url}"));
    let model_id = downloader
        .download_model(url, true)
        .await
        .context("Failed to download model")?;

    let model_path = downloader.cache().get_model_path(&model_id);
    reporter.report(&format!("Model ID: {model_id}"));
    reporter.report(&format!("Cache location: {}", model_path.display()));

    if let Ok(info) = crate::models::ModelManager::with_external_model(&model_path, None)
        .and_then(|manager| manager.get_info())
    {
        reporter.report(&format!("Model size: {} ({})", format_size(info.size_bytes), info.precision));
    }
    if model_id != ModelCache::get_default_model_id() {
        reporter.report(&format!("To use this model: remove_bg --model {model_id} <input_path> <output_path>"));
    }
    Ok(())
}

fn show_provider_diagnostics(out: &mut dyn Write) {
    let cpu_count = std::thread::available_parallelism()
        .map(std::num::NonZero::get)
        .unwrap_or(1);
    let _ = writeln!(out, "Backend and Execution Provider Diagnostics");
    let _ = writeln!(out, "System: {cpu_count} CPU cores detected");
    let _ = writeln!(out);
    let _ = writeln!(out, "Execution Providers:");
    for provider in ExecutionProviderManager::list_all_providers() {
        let status = if provider.available { "available" } else { "not available" };
        let _ = writeln!(out, "  {}: {} - {}", provider.name, status, provider.description);
    }
}
