//! Error types for wingseg

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Setup, validation and persistence failures. Anything of this type that
/// reaches the orchestrator aborts the run.
#[derive(Error, Debug)]
pub enum SegError {
    #[error("dataset path not found: {0}")]
    DatasetNotFound(PathBuf),

    #[error("no images found in dataset {0}")]
    EmptyDataset(PathBuf),

    #[error("model load failed: {0}")]
    ModelLoad(String),

    #[error("invalid arguments: {0}")]
    Validation(String),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("image error at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("metadata error: {0}")]
    Metadata(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("worker pool error: {0}")]
    Pool(String),
}

impl SegError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        SegError::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn image(path: impl AsRef<Path>, source: image::ImageError) -> Self {
        SegError::Image {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, SegError>;

/// Pipeline stage at which a single image failed.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Stage {
    Resize,
    Detect,
    Mask,
    Write,
    Panic,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Resize => "resize",
            Stage::Detect => "detect",
            Stage::Mask => "mask",
            Stage::Write => "write",
            Stage::Panic => "panic",
        };
        f.write_str(s)
    }
}

/// Per-image failure. Returned from workers as a value, never propagated
/// past the pool.
#[derive(Error, Debug, Clone)]
#[error("{stage} failed for {}: {message}", image.display())]
pub struct ImageFailure {
    pub image: PathBuf,
    pub stage: Stage,
    pub message: String,
}

impl ImageFailure {
    pub fn new(image: &Path, stage: Stage, message: impl Into<String>) -> Self {
        Self {
            image: image.to_path_buf(),
            stage,
            message: message.into(),
        }
    }
}
