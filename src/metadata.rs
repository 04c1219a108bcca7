//! Run descriptor (`metadata.json`) and its store.
//!
//! The descriptor is written twice per run: once before any image is
//! processed (`completed = false`) and once at finalization. A crash in
//! between leaves `completed = false` on disk, which blocks resume-skip.
//! Writes go through a temp file in the run directory followed by a rename.
use crate::error::{Result, SegError};
use crate::hw::HwInfo;
use crate::identity::DatasetFingerprint;
use crate::types::RunParameters;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DatasetInfo {
    pub dataset_hash: DatasetFingerprint,
    pub num_images: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunStatus {
    pub completed: bool,
    pub processing_time_seconds: Option<f64>,
    pub package_version: String,
    pub errors: Option<String>,
    #[serde(default)]
    pub failed_images: Vec<String>,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub finished_at: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunMetadata {
    pub dataset: DatasetInfo,
    pub run_parameters: RunParameters,
    pub run_hardware: HwInfo,
    pub run_status: RunStatus,
}

impl RunMetadata {
    /// Descriptor for a run that has not finished yet.
    pub fn in_progress(
        dataset_hash: DatasetFingerprint,
        num_images: usize,
        run_parameters: RunParameters,
        run_hardware: HwInfo,
        started_at: String,
    ) -> Self {
        Self {
            dataset: DatasetInfo {
                dataset_hash,
                num_images,
            },
            run_parameters,
            run_hardware,
            run_status: RunStatus {
                completed: false,
                processing_time_seconds: None,
                package_version: env!("CARGO_PKG_VERSION").to_string(),
                errors: None,
                failed_images: Vec::new(),
                started_at: Some(started_at),
                finished_at: None,
            },
        }
    }
}

/// What is on disk at a descriptor path.
#[derive(Debug)]
pub enum Descriptor {
    Missing,
    Malformed(String),
    Present(Box<RunMetadata>),
}

impl Descriptor {
    pub fn is_completed(&self) -> bool {
        matches!(self, Descriptor::Present(m) if m.run_status.completed)
    }
}

#[derive(Clone, Debug)]
pub struct RunMetadataStore {
    path: PathBuf,
}

impl RunMetadataStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Descriptor {
        read_descriptor(&self.path)
    }

    /// Pretty JSON with sorted keys, replaced atomically.
    pub fn write(&self, meta: &RunMetadata) -> Result<()> {
        let dir = self
            .path
            .parent()
            .ok_or_else(|| SegError::Config(format!("no parent for {}", self.path.display())))?;
        std::fs::create_dir_all(dir).map_err(|e| SegError::io(dir, e))?;

        let value = serde_json::to_value(meta)?;
        let mut s = serde_json::to_string_pretty(&value)?;
        s.push('\n');

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| SegError::io(dir, e))?;
        tmp.write_all(s.as_bytes())
            .map_err(|e| SegError::io(tmp.path(), e))?;
        tmp.as_file()
            .sync_all()
            .map_err(|e| SegError::io(tmp.path(), e))?;
        tmp.persist(&self.path)
            .map_err(|e| SegError::io(&self.path, e.error))?;
        Ok(())
    }
}

pub fn read_descriptor(path: &Path) -> Descriptor {
    let s = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Descriptor::Missing,
        Err(e) => return Descriptor::Malformed(e.to_string()),
    };
    match serde_json::from_str::<RunMetadata>(&s) {
        Ok(m) => Descriptor::Present(Box::new(m)),
        Err(e) => Descriptor::Malformed(e.to_string()),
    }
}
