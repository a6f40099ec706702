use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDateTime};
use image::{DynamicImage, ImageFormat};
use thiserror::Error;

const FILE_PREFIX: &str = "screenshot_";
const FILE_EXTENSION: &str = "png";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const DEFAULT_FALLBACK_TEMP_DIR: &str = "/tmp/snapsight";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Writes screenshots as `screenshot_YYYYMMDD_HHMMSS.png` under one directory.
///
/// Two saves in the same second share a file name; the later one overwrites.
#[derive(Debug, Clone)]
pub struct StorageService {
    save_dir: PathBuf,
}

impl StorageService {
    pub fn new(save_dir: impl Into<PathBuf>) -> Self {
        Self {
            save_dir: save_dir.into(),
        }
    }

    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    pub fn target_path_at(&self, timestamp: NaiveDateTime) -> PathBuf {
        self.save_dir.join(screenshot_file_name(timestamp))
    }

    pub fn save_image(&self, image: &DynamicImage) -> StorageResult<PathBuf> {
        self.save_image_at(image, Local::now().naive_local())
    }

    pub fn save_image_at(
        &self,
        image: &DynamicImage,
        timestamp: NaiveDateTime,
    ) -> StorageResult<PathBuf> {
        fs::create_dir_all(&self.save_dir)?;

        let target = self.target_path_at(timestamp);
        if target.exists() {
            tracing::debug!(path = %target.display(), "overwriting screenshot saved in the same second");
        }
        image
            .save_with_format(&target, ImageFormat::Png)
            .map_err(|source| StorageError::Encode {
                path: target.clone(),
                source,
            })?;

        tracing::info!(
            path = %target.display(),
            width = image.width(),
            height = image.height(),
            "screenshot saved"
        );
        Ok(target)
    }
}

pub fn screenshot_file_name(timestamp: NaiveDateTime) -> String {
    format!(
        "{FILE_PREFIX}{}.{FILE_EXTENSION}",
        timestamp.format(TIMESTAMP_FORMAT)
    )
}

/// Scratch location for raw captures before they are decoded.
pub fn temp_capture_path(capture_id: &str) -> PathBuf {
    let mut path = default_runtime_temp_dir();
    path.push(format!("capture_{capture_id}.png"));
    path
}

fn default_runtime_temp_dir() -> PathBuf {
    std::env::var("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_FALLBACK_TEMP_DIR))
}
