//! Single-image background removal operation
//!
//! Wraps one `BackgroundRemover` call with file I/O and status reporting.
//! Every failure is reported and turned into `false`; nothing propagates.

use crate::{
    config::RemovalConfig,
    error::{RemoveBgError, Result},
    processor::RemoverFactory,
    services::StatusReporter,
};
use std::fs;
use std::path::Path;
use tracing::{info_span, warn};

/// Remove the background of `input_path` and write the result to `output_path`
///
/// The remover is loaded before any file is touched, so a missing dependency
/// never reads the input or creates the output.
pub fn remove_background(
    input_path: &Path,
    output_path: &Path,
    factory: &dyn RemoverFactory,
    config: &RemovalConfig,
    reporter: &mut StatusReporter<'_>,
) -> bool {
    let _span = info_span!(
        "remove_background",
        input = %input_path.display(),
        output = %output_path.display()
    )
    .entered();

    match run(input_path, output_path, factory, config, reporter) {
        Ok(()) => true,
        Err(RemoveBgError::DependencyMissing { dependency, hint }) => {
            warn!(%dependency, "removal dependency unavailable");
            reporter.report(&format!("Dependency error: {dependency} is not available"));
            reporter.report(&hint);
            false
        },
        Err(e) => {
            warn!(error = %e, "background removal failed");
            reporter.report(&format!("Error: {e}"));
            false
        },
    }
}

fn run(
    input_path: &Path,
    output_path: &Path,
    factory: &dyn RemoverFactory,
    config: &RemovalConfig,
    reporter: &mut StatusReporter<'_>,
) -> Result<()> {
    let mut remover = factory.create(config)?;

    reporter.report(&format!("Loading image: {}", input_path.display()));
    let input = fs::read(input_path)
        .map_err(|e| RemoveBgError::file_io_error("read input image", input_path, &e))?;

    reporter.report("Processing with AI model...");
    let output = remover.remove(&input)?;

    fs::write(output_path, &output)
        .map_err(|e| RemoveBgError::file_io_error("write output image", output_path, &e))?;
    reporter.report(&format!("Saved to: {}", output_path.display()));

    let written = fs::metadata(output_path)
        .map_err(|e| RemoveBgError::file_io_error("inspect output image", output_path, &e))?
        .len();
    reporter.report(&format!("Output size: {written} bytes"));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::processor::BackgroundRemover;
    use tempfile::TempDir;

    struct FixedRemover(&'static [u8]);

    impl BackgroundRemover for FixedRemover {
        fn remove(&mut self, _image_bytes: &[u8]) -> Result<Vec<u8>> {
            Ok(self.0.to_vec())
        }
    }

    struct FixedFactory;

    impl RemoverFactory for FixedFactory {
        fn create(&self, _config: &RemovalConfig) -> Result<Box<dyn BackgroundRemover>> {
            Ok(Box::new(FixedRemover(b"X")))
        }
    }

    struct MissingFactory;

    impl RemoverFactory for MissingFactory {
        fn create(&self, _config: &RemovalConfig) -> Result<Box<dyn BackgroundRemover>> {
            Err(RemoveBgError::dependency_missing(
                "Model 'imgly--isnet-general-onnx'",
                "Please download the model: remove_bg --download-model",
            ))
        }
    }

    struct FailingRemover;

    impl BackgroundRemover for FailingRemover {
        fn remove(&mut self, _image_bytes: &[u8]) -> Result<Vec<u8>> {
            Err(RemoveBgError::processing("segmentation failed"))
        }
    }

    struct FailingFactory;

    impl RemoverFactory for FailingFactory {
        fn create(&self, _config: &RemovalConfig) -> Result<Box<dyn BackgroundRemover>> {
            Ok(Box::new(FailingRemover))
        }
    }

    fn run_with(factory: &dyn RemoverFactory, input: &Path, output: &Path) -> (bool, String) {
        let mut out = Vec::new();
        let ok = remove_background(
            input,
            output,
            factory,
            &RemovalConfig::default(),
            &mut StatusReporter::new(&mut out),
        );
        (ok, String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_success_writes_bytes_verbatim() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in.jpg");
        let output = temp_dir.path().join("out.png");
        fs::write(&input, b"image").unwrap();

        let (ok, text) = run_with(&FixedFactory, &input, &output);
        assert!(ok);
        assert_eq!(fs::read(&output).unwrap(), b"X");

        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], format!("[RemoveBG] Loading image: {}", input.display()));
        assert_eq!(lines[1], "[RemoveBG] Processing with AI model...");
        assert_eq!(lines[2], format!("[RemoveBG] Saved to: {}", output.display()));
        assert_eq!(lines[3], "[RemoveBG] Output size: 1 bytes");
    }

    #[test]
    fn test_missing_dependency_reports_hint_and_writes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in.jpg");
        let output = temp_dir.path().join("out.png");
        fs::write(&input, b"image").unwrap();

        let (ok, text) = run_with(&MissingFactory, &input, &output);
        assert!(!ok);
        assert!(!output.exists());
        assert!(!text.contains("Loading image"));
        assert!(text.contains("[RemoveBG] Dependency error: Model 'imgly--isnet-general-onnx' is not available"));
        assert!(text.contains("[RemoveBG] Please download the model: remove_bg --download-model"));
    }

    #[test]
    fn test_processing_failure_reports_error() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in.jpg");
        let output = temp_dir.path().join("out.png");
        fs::write(&input, b"image").unwrap();

        let (ok, text) = run_with(&FailingFactory, &input, &output);
        assert!(!ok);
        assert!(!output.exists());
        assert!(text.contains("[RemoveBG] Error: Processing error: segmentation failed"));
    }

    #[test]
    fn test_unreadable_input_reports_error() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("missing.jpg");
        let output = temp_dir.path().join("out.png");

        let (ok, text) = run_with(&FixedFactory, &input, &output);
        assert!(!ok);
        assert!(text.contains("[RemoveBG] Error: IO error: Failed to read input image"));
        assert!(!output.exists());
    }

    #[test]
    fn test_unwritable_output_reports_error() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in.jpg");
        fs::write(&input, b"image").unwrap();
        let output = temp_dir.path().join("no-such-dir").join("out.png");

        let (ok, text) = run_with(&FixedFactory, &input, &output);
        assert!(!ok);
        assert!(text.contains("Failed to write output image"));
    }
}
