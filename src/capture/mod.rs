use std::path::Path;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

use crate::storage::temp_capture_path;
use image::DynamicImage;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("command failed: {command}: {message}")]
    CommandFailed { command: String, message: String },
    #[error("command io error: {command}")]
    CommandIo {
        command: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid capture artifact: {message}")]
    InvalidCaptureArtifact { message: String },
    #[error("failed to read captured image: {message}")]
    ImageReadFailed { message: String },
    #[error("captured image is empty ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },
}

/// Source of raw screen pixels.
pub trait CaptureBackend {
    /// Writes the whole composed virtual screen to `output` as an image file.
    fn run_full_capture(&self, output: &Path) -> Result<(), CaptureError>;
    fn load_image(&self, path: &Path) -> Result<DynamicImage, CaptureError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCaptureBackend;

impl CaptureBackend for SystemCaptureBackend {
    fn run_full_capture(&self, output: &Path) -> Result<(), CaptureError> {
        // Without an output selector grim grabs every output in layout space.
        run_command_status("grim", &[], output)
    }

    fn load_image(&self, path: &Path) -> Result<DynamicImage, CaptureError> {
        image::open(path).map_err(|err| CaptureError::ImageReadFailed {
            message: err.to_string(),
        })
    }
}

pub fn capture_full_screen() -> Result<DynamicImage, CaptureError> {
    capture_full_screen_with(&SystemCaptureBackend)
}

pub fn capture_full_screen_with<B: CaptureBackend>(
    backend: &B,
) -> Result<DynamicImage, CaptureError> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|err| CaptureError::InvalidCaptureArtifact {
            message: format!("system time before unix epoch: {err}"),
        })?;
    let capture_id = now.as_nanos().to_string();
    let temp_path = temp_capture_path(&capture_id);
    if let Some(parent) = temp_path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| CaptureError::CommandIo {
            command: "mkdir".to_string(),
            source: err,
        })?;
    }

    tracing::info!(path = %temp_path.display(), "starting screenshot capture");
    let result = backend
        .run_full_capture(&temp_path)
        .and_then(|()| backend.load_image(&temp_path));
    cleanup_temp_capture_file(&temp_path);

    let image = result?;
    if image.width() == 0 || image.height() == 0 {
        return Err(CaptureError::EmptyImage {
            width: image.width(),
            height: image.height(),
        });
    }

    tracing::info!(
        width = image.width(),
        height = image.height(),
        "screenshot captured"
    );
    Ok(image)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TempCaptureCleanupOutcome {
    Removed,
    NotFound,
    Failed,
}

fn cleanup_temp_capture_file(temp_path: &Path) -> TempCaptureCleanupOutcome {
    cleanup_temp_capture_file_with(temp_path, |path| std::fs::remove_file(path))
}

fn cleanup_temp_capture_file_with<F>(temp_path: &Path, remove_file: F) -> TempCaptureCleanupOutcome
where
    F: FnOnce(&Path) -> std::io::Result<()>,
{
    match remove_file(temp_path) {
        Ok(()) => {
            tracing::debug!(path = %temp_path.display(), "temporary capture file removed");
            TempCaptureCleanupOutcome::Removed
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(
                path = %temp_path.display(),
                "temporary capture file was never written"
            );
            TempCaptureCleanupOutcome::NotFound
        }
        Err(err) => {
            tracing::warn!(
                path = %temp_path.display(),
                ?err,
                "failed to cleanup temporary capture file"
            );
            TempCaptureCleanupOutcome::Failed
        }
    }
}

fn run_command_status(command: &str, args: &[&str], output: &Path) -> Result<(), CaptureError> {
    let status = Command::new(command)
        .args(args)
        .arg(output)
        .status()
        .map_err(|err| CaptureError::CommandIo {
            command: command.to_string(),
            source: err,
        })?;

    if status.success() {
        Ok(())
    } else {
        Err(CaptureError::CommandFailed {
            command: command.to_string(),
            message: format!("command exited with status: {status}"),
        })
    }
}
