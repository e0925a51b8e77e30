//! End-to-end tests for the `remove_bg` command flow
//!
//! The remover is injected through `RemoverFactory`, so these tests never
//! need a model or an inference runtime.

#![cfg(feature = "cli")]

use remove_bg::{
    cli::{self, EXIT_FAILURE, EXIT_SUCCESS, USAGE},
    BackgroundRemover, RemovalConfig, RemoveBgError, RemoverFactory, Result,
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

struct FixedRemover;

impl BackgroundRemover for FixedRemover {
    fn remove(&mut self, _image_bytes: &[u8]) -> Result<Vec<u8>> {
        Ok(b"X".to_vec())
    }
}

struct FailingRemover;

impl BackgroundRemover for FailingRemover {
    fn remove(&mut self, _image_bytes: &[u8]) -> Result<Vec<u8>> {
        Err(RemoveBgError::processing("segmentation exploded"))
    }
}

#[derive(Clone, Copy)]
enum Behaviour {
    Succeed,
    FailRemoval,
    MissingDependency,
}

/// Counts how often the removal capability is loaded
struct CountingFactory {
    behaviour: Behaviour,
    calls: AtomicUsize,
}

impl CountingFactory {
    fn new(behaviour: Behaviour) -> Self {
        Self {
            behaviour,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl RemoverFactory for CountingFactory {
    fn create(&self, _config: &RemovalConfig) -> Result<Box<dyn BackgroundRemover>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behaviour {
            Behaviour::Succeed => Ok(Box::new(FixedRemover)),
            Behaviour::FailRemoval => Ok(Box::new(FailingRemover)),
            Behaviour::MissingDependency => Err(RemoveBgError::dependency_missing(
                "onnxruntime",
                "Please install: rebuild remove_bg with `--features onnx`",
            )),
        }
    }
}

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
        }
    }

    fn input(&self) -> PathBuf {
        let path = self.dir.path().join("photo.jpg");
        std::fs::write(&path, b"raw image bytes").unwrap();
        path
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

async fn run_cli(args: &[&str], factory: &dyn RemoverFactory) -> (u8, Vec<String>) {
    let mut out = Vec::new();
    let code = cli::run(args.iter().copied(), factory, &mut out).await;
    let lines = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect();
    (code, lines)
}

fn arg(path: &Path) -> &str {
    path.to_str().unwrap()
}

#[tokio::test]
async fn test_successful_run_reports_every_step() {
    let workspace = Workspace::new();
    let input = workspace.input();
    let output = workspace.path("photo_nobg.png");
    let factory = CountingFactory::new(Behaviour::Succeed);

    let (code, lines) = run_cli(&["remove_bg", arg(&input), arg(&output)], &factory).await;

    assert_eq!(code, EXIT_SUCCESS);
    assert_eq!(std::fs::read(&output).unwrap(), b"X");
    assert_eq!(factory.calls(), 1);
    assert_eq!(
        lines,
        [
            format!("[RemoveBG] Loading image: {}", input.display()),
            "[RemoveBG] Processing with AI model...".to_string(),
            format!("[RemoveBG] Saved to: {}", output.display()),
            "[RemoveBG] Output size: 1 bytes".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_existing_output_is_overwritten() {
    let workspace = Workspace::new();
    let input = workspace.input();
    let output = workspace.path("out.png");
    std::fs::write(&output, b"previous contents, much longer than one byte").unwrap();
    let factory = CountingFactory::new(Behaviour::Succeed);

    let (code, lines) = run_cli(&["remove_bg", arg(&input), arg(&output)], &factory).await;

    assert_eq!(code, EXIT_SUCCESS);
    assert_eq!(std::fs::read(&output).unwrap(), b"X");
    assert_eq!(lines.last().unwrap(), "[RemoveBG] Output size: 1 bytes");
}

#[tokio::test]
async fn test_missing_input_never_loads_remover() {
    let workspace = Workspace::new();
    let input = workspace.path("nonexistent.jpg");
    let output = workspace.path("out.png");
    let factory = CountingFactory::new(Behaviour::Succeed);

    let (code, lines) = run_cli(&["remove_bg", arg(&input), arg(&output)], &factory).await;

    assert_eq!(code, EXIT_FAILURE);
    assert_eq!(lines, [format!("[RemoveBG] Input file not found: {}", input.display())]);
    assert_eq!(factory.calls(), 0);
    assert!(!output.exists());
}

#[tokio::test]
async fn test_wrong_argument_count_prints_usage() {
    let factory = CountingFactory::new(Behaviour::Succeed);

    for args in [
        vec!["remove_bg"],
        vec!["remove_bg", "only_input.jpg"],
        vec!["remove_bg", "a.jpg", "b.png", "c.png"],
    ] {
        let (code, lines) = run_cli(&args, &factory).await;
        assert_eq!(code, EXIT_FAILURE, "args: {args:?}");
        assert!(lines.iter().any(|line| line == USAGE), "args: {args:?}, output: {lines:?}");
    }
    assert_eq!(factory.calls(), 0);
}

#[tokio::test]
async fn test_missing_dependency_reports_hint_and_writes_nothing() {
    let workspace = Workspace::new();
    let input = workspace.input();
    let output = workspace.path("out.png");
    let factory = CountingFactory::new(Behaviour::MissingDependency);

    let (code, lines) = run_cli(&["remove_bg", arg(&input), arg(&output)], &factory).await;

    assert_eq!(code, EXIT_FAILURE);
    assert_eq!(
        lines,
        [
            "[RemoveBG] Dependency error: onnxruntime is not available",
            "[RemoveBG] Please install: rebuild remove_bg with `--features onnx`",
        ]
    );
    assert!(!output.exists());
}

#[tokio::test]
async fn test_removal_failure_reports_error() {
    let workspace = Workspace::new();
    let input = workspace.input();
    let output = workspace.path("out.png");
    let factory = CountingFactory::new(Behaviour::FailRemoval);

    let (code, lines) = run_cli(&["remove_bg", arg(&input), arg(&output)], &factory).await;

    assert_eq!(code, EXIT_FAILURE);
    assert_eq!(
        lines,
        [
            format!("[RemoveBG] Loading image: {}", input.display()),
            "[RemoveBG] Processing with AI model...".to_string(),
            "[RemoveBG] Error: Processing error: segmentation exploded".to_string(),
        ]
    );
    assert!(!output.exists());
}

#[tokio::test]
async fn test_unwritable_output_reports_error() {
    let workspace = Workspace::new();
    let input = workspace.input();
    let output = workspace.path("missing_dir/out.png");
    let factory = CountingFactory::new(Behaviour::Succeed);

    let (code, lines) = run_cli(&["remove_bg", arg(&input), arg(&output)], &factory).await;

    assert_eq!(code, EXIT_FAILURE);
    let last = lines.last().unwrap();
    assert!(last.starts_with("[RemoveBG] Error: "), "unexpected: {last}");
    assert!(!lines.iter().any(|line| line.contains("Saved to")));
}

#[tokio::test]
async fn test_invalid_provider_is_reported_before_loading() {
    let workspace = Workspace::new();
    let input = workspace.input();
    let output = workspace.path("out.png");
    let factory = CountingFactory::new(Behaviour::Succeed);

    let (code, lines) = run_cli(
        &["remove_bg", "-e", "gpu:fast", arg(&input), arg(&output)],
        &factory,
    )
    .await;

    assert_eq!(code, EXIT_FAILURE);
    assert_eq!(factory.calls(), 0);
    assert!(lines[0].starts_with("[RemoveBG] Error: Invalid execution provider"));
}

#[tokio::test]
async fn test_help_and_version_exit_successfully() {
    let factory = CountingFactory::new(Behaviour::Succeed);

    let (code, lines) = run_cli(&["remove_bg", "--help"], &factory).await;
    assert_eq!(code, EXIT_SUCCESS);
    assert!(lines.iter().any(|line| line.contains("--download-model")));

    let (code, lines) = run_cli(&["remove_bg", "--version"], &factory).await;
    assert_eq!(code, EXIT_SUCCESS);
    assert!(lines[0].starts_with("remove_bg"));
    assert_eq!(factory.calls(), 0);
}

#[tokio::test]
async fn test_show_providers_needs_no_paths() {
    let factory = CountingFactory::new(Behaviour::Succeed);

    let (code, lines) = run_cli(&["remove_bg", "--show-providers"], &factory).await;

    assert_eq!(code, EXIT_SUCCESS);
    assert!(lines.iter().any(|line| line.contains("onnx:cpu")));
    assert_eq!(factory.calls(), 0);
}

#[tokio::test]
async fn test_download_rejects_unsupported_url() {
    let workspace = Workspace::new();
    let factory = CountingFactory::new(Behaviour::Succeed);

    let (code, lines) = run_cli(
        &[
            "remove_bg",
            "--cache-dir",
            arg(workspace.dir.path()),
            "--download-model",
            "https://example.com/model.onnx",
        ],
        &factory,
    )
    .await;

    assert_eq!(code, EXIT_FAILURE);
    let last = lines.last().unwrap();
    assert!(last.starts_with("[RemoveBG] Error: Failed to download model"), "unexpected: {last}");
    assert!(last.contains("Only HuggingFace repositories are supported"));
}
