//! Deterministic run identity.
//!
//! - `fingerprint`: blake3 over every file's relative path and byte size,
//!   visited in sorted walk order. Content edits that keep the size are not
//!   detected.
//! - `identifier`: UUIDv5 under [`RUN_NAMESPACE`] of the blake3 hex digest
//!   of the canonical JSON of `{dataset_hash, parameters}`. Canonical JSON is
//!   compact `serde_json` output with object keys sorted.
use crate::error::{Result, SegError};
use crate::fs_scan;
use crate::types::RunParameters;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use uuid::Uuid;

/// Namespace for run identifiers. Changing it changes every run id.
pub const RUN_NAMESPACE: Uuid = Uuid::from_u128(0x3c1f_8a52_94d7_5e0b_a6e2_7d41_c09b_58f3);

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetFingerprint(String);

impl fmt::Display for DatasetFingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RunIdentifier(Uuid);

impl RunIdentifier {
    /// First 8 hex digits, as shown in scan reports.
    pub fn short(&self) -> String {
        self.0.simple().to_string()[..8].to_string()
    }
}

impl fmt::Display for RunIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

pub fn fingerprint(dataset: &Path) -> Result<DatasetFingerprint> {
    if !dataset.is_dir() {
        return Err(SegError::DatasetNotFound(dataset.to_path_buf()));
    }

    let mut hasher = blake3::Hasher::new();
    for entry in fs_scan::sorted_files(dataset) {
        // follows symlinks; skips entries whose target vanished
        let Ok(meta) = std::fs::metadata(entry.path()) else {
            continue;
        };
        let rel = fs_scan::portable_relative(dataset, entry.path());
        hasher.update(rel.as_bytes());
        hasher.update(&[0]);
        hasher.update(meta.len().to_string().as_bytes());
        hasher.update(&[0]);
    }

    Ok(DatasetFingerprint(hasher.finalize().to_hex().to_string()))
}

#[derive(Serialize)]
struct IdentityInput<'a> {
    dataset_hash: &'a DatasetFingerprint,
    parameters: &'a RunParameters,
}

/// Sorted-key compact JSON. `serde_json::Map` is a `BTreeMap` unless
/// `preserve_order` is enabled, which this crate never does.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String> {
    let v = serde_json::to_value(value)?;
    Ok(serde_json::to_string(&v)?)
}

pub fn identifier(fp: &DatasetFingerprint, params: &RunParameters) -> Result<RunIdentifier> {
    let canonical = canonical_json(&IdentityInput {
        dataset_hash: fp,
        parameters: params,
    })?;
    let digest = blake3::hash(canonical.as_bytes()).to_hex();
    Ok(RunIdentifier(Uuid::new_v5(&RUN_NAMESPACE, digest.as_bytes())))
}
