//! Batch segmentation of wing images into reproducible run directories.
pub mod aggregator;
pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod fs_scan;
pub mod hw;
pub mod identity;
pub mod layout;
pub mod mask;
pub mod metadata;
pub mod models;
pub mod pipeline;
pub mod postprocess;
pub mod resize;
pub mod scanner;
pub mod types;

pub use app::{RunOutcome, RunSummary, segment};
pub use config::SegmentConfig;
pub use error::{ImageFailure, Result, SegError, Stage};
pub use models::{Detector, MaskGenerator, Models, load_models};
pub use types::{ClassId, Detection, RunParameters};
