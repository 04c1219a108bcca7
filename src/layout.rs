use crate::error::{Result, SegError};
use crate::identity::RunIdentifier;
use crate::types::{ClassId, RunParameters};
use std::fs;
use std::path::{Path, PathBuf};

pub const METADATA_FILE: &str = "metadata.json";
pub const SEGMENTATION_CSV: &str = "segmentation.csv";
pub const RUN_LOG: &str = "run.log";

/// Where a run directory goes. Resolved in declaration order by the CLI:
/// a custom root wins over a base directory, which wins over the default.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OutputPlacement {
    /// Used verbatim as the run directory.
    Custom(PathBuf),
    /// `<base>/<dataset>_<run id>`
    Base(PathBuf),
    /// `<dataset parent>/<dataset>_<run id>`
    Default,
}

impl OutputPlacement {
    pub fn from_flags(custom: Option<PathBuf>, base: Option<PathBuf>) -> Self {
        match (custom, base) {
            (Some(c), _) => OutputPlacement::Custom(c),
            (None, Some(b)) => OutputPlacement::Base(b),
            (None, None) => OutputPlacement::Default,
        }
    }
}

pub fn run_dir_name(dataset_name: &str, id: &RunIdentifier) -> String {
    format!("{}_{}", dataset_name, id)
}

/// Run directory for `dataset` (already absolute) under `placement`.
pub fn resolve_run_dir(placement: &OutputPlacement, dataset: &Path, id: &RunIdentifier) -> PathBuf {
    let name = run_dir_name(&crate::fs_scan::dataset_name(dataset), id);
    match placement {
        OutputPlacement::Custom(dir) => dir.clone(),
        OutputPlacement::Base(base) => base.join(name),
        OutputPlacement::Default => dataset
            .parent()
            .map(|p| p.join(&name))
            .unwrap_or_else(|| PathBuf::from(&name)),
    }
}

/// Materialized directory tree of one run. Optional directories are
/// `Some` exactly when the feature that writes into them is enabled.
#[derive(Clone, Debug)]
pub struct OutputLayout {
    pub run_dir: PathBuf,
    pub masks: PathBuf,
    pub logs: PathBuf,
    pub resized: Option<PathBuf>,
    pub seg_viz: Option<PathBuf>,
    pub crops: Option<PathBuf>,
    pub crops_bg_removed: Option<PathBuf>,
    pub full_bg_removed: Option<PathBuf>,
}

fn ensure_dir(p: &Path) -> Result<()> {
    fs::create_dir_all(p).map_err(|e| SegError::io(p, e))
}

fn optional_dir(run_dir: &Path, name: &str, enabled: bool) -> Result<Option<PathBuf>> {
    if !enabled {
        return Ok(None);
    }
    let p = run_dir.join(name);
    ensure_dir(&p)?;
    Ok(Some(p))
}

impl OutputLayout {
    /// Create the run directory and the subdirectories the enabled
    /// features need. Safe to call repeatedly.
    pub fn materialize(run_dir: PathBuf, params: &RunParameters) -> Result<Self> {
        ensure_dir(&run_dir)?;
        let masks = run_dir.join("masks");
        let logs = run_dir.join("logs");
        ensure_dir(&masks)?;
        ensure_dir(&logs)?;

        Ok(Self {
            resized: optional_dir(&run_dir, "resized", params.size.is_some())?,
            seg_viz: optional_dir(&run_dir, "seg_viz", params.visualize_segmentation)?,
            crops: optional_dir(&run_dir, "crops", params.crop_by_class)?,
            crops_bg_removed: optional_dir(
                &run_dir,
                "crops_bg_removed",
                params.crop_by_class && params.remove_crops_background,
            )?,
            full_bg_removed: optional_dir(&run_dir, "full_bg_removed", params.remove_full_background)?,
            masks,
            logs,
            run_dir,
        })
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.run_dir.join(METADATA_FILE)
    }

    pub fn segmentation_csv(&self) -> PathBuf {
        self.run_dir.join(SEGMENTATION_CSV)
    }

    pub fn run_log(&self) -> PathBuf {
        self.logs.join(RUN_LOG)
    }

    pub fn mask_path(&self, rel: &Path) -> PathBuf {
        mirrored(&self.masks, rel, "_mask")
    }

    pub fn viz_path(&self, rel: &Path) -> Option<PathBuf> {
        self.seg_viz.as_deref().map(|d| mirrored(d, rel, "_viz"))
    }

    pub fn resized_path(&self, rel: &Path) -> Option<PathBuf> {
        self.resized.as_deref().map(|d| mirrored(d, rel, ""))
    }

    pub fn crop_path(&self, class: ClassId, rel: &Path, index: usize) -> Option<PathBuf> {
        self.crops
            .as_deref()
            .map(|d| mirrored(&d.join(class.name()), rel, &format!("_{}_{}", class.name(), index)))
    }

    pub fn crop_bg_removed_path(&self, class: ClassId, rel: &Path, index: usize) -> Option<PathBuf> {
        self.crops_bg_removed
            .as_deref()
            .map(|d| mirrored(&d.join(class.name()), rel, &format!("_{}_{}", class.name(), index)))
    }

    pub fn full_bg_removed_path(&self, rel: &Path) -> Option<PathBuf> {
        self.full_bg_removed
            .as_deref()
            .map(|d| mirrored(d, rel, "_bg_removed"))
    }
}

/// `<dir>/<rel parent>/<rel stem><suffix>.png`
fn mirrored(dir: &Path, rel: &Path, suffix: &str) -> PathBuf {
    let stem = rel
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let parent = rel.parent().unwrap_or(Path::new(""));
    dir.join(parent).join(format!("{}{}.png", stem, suffix))
}

/// Create the parent directory of an artefact about to be written.
pub fn ensure_parent(p: &Path) -> Result<()> {
    match p.parent() {
        Some(parent) => ensure_dir(parent),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{self, DatasetFingerprint};
    use crate::types::TargetSize;

    fn params() -> RunParameters {
        RunParameters {
            sam_model_name: "box".into(),
            yolo_model_name: "sidecar".into(),
            resize_mode: None,
            size: None,
            padding_color: None,
            interpolation: None,
            bbox_padding: 0,
            visualize_segmentation: false,
            crop_by_class: false,
            remove_crops_background: false,
            remove_full_background: false,
            background_color: None,
            num_workers: 1,
        }
    }

    fn run_id() -> RunIdentifier {
        let fp: DatasetFingerprint = serde_json::from_str("\"ff\"").unwrap();
        identity::identifier(&fp, &params()).unwrap()
    }

    #[test]
    fn test_placement_priority() {
        let p = OutputPlacement::from_flags(Some("/c".into()), Some("/b".into()));
        assert_eq!(p, OutputPlacement::Custom("/c".into()));
        let p = OutputPlacement::from_flags(None, Some("/b".into()));
        assert_eq!(p, OutputPlacement::Base("/b".into()));
        assert_eq!(OutputPlacement::from_flags(None, None), OutputPlacement::Default);
    }

    #[test]
    fn test_resolve_run_dir() {
        let id = run_id();
        let ds = Path::new("/data/wings");
        let name = format!("wings_{}", id);

        assert_eq!(
            resolve_run_dir(&OutputPlacement::Default, ds, &id),
            Path::new("/data").join(&name)
        );
        assert_eq!(
            resolve_run_dir(&OutputPlacement::Base("/out".into()), ds, &id),
            Path::new("/out").join(&name)
        );
        assert_eq!(
            resolve_run_dir(&OutputPlacement::Custom("/exact".into()), ds, &id),
            PathBuf::from("/exact")
        );
    }

    #[test]
    fn test_materialize_minimal() {
        let dir = tempfile::tempdir().unwrap();
        let run_dir = dir.path().join("run");
        let layout = OutputLayout::materialize(run_dir.clone(), &params()).unwrap();

        assert!(run_dir.join("masks").is_dir());
        assert!(run_dir.join("logs").is_dir());
        for d in ["resized", "seg_viz", "crops", "crops_bg_removed", "full_bg_removed"] {
            assert!(!run_dir.join(d).exists(), "{} should not exist", d);
        }
        assert!(layout.crops.is_none());
        assert!(layout.crop_path(ClassId::Body, Path::new("a.png"), 0).is_none());
    }

    #[test]
    fn test_materialize_all_features_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let run_dir = dir.path().join("run");
        let mut p = params();
        p.size = Some(TargetSize { width: 8, height: 8 });
        p.visualize_segmentation = true;
        p.crop_by_class = true;
        p.remove_crops_background = true;
        p.remove_full_background = true;

        OutputLayout::materialize(run_dir.clone(), &p).unwrap();
        let layout = OutputLayout::materialize(run_dir.clone(), &p).unwrap();
        for d in ["resized", "seg_viz", "crops", "crops_bg_removed", "full_bg_removed"] {
            assert!(run_dir.join(d).is_dir(), "{} missing", d);
        }

        let rel = Path::new("sub/img01.jpg");
        assert_eq!(layout.mask_path(rel), run_dir.join("masks/sub/img01_mask.png"));
        assert_eq!(layout.viz_path(rel).unwrap(), run_dir.join("seg_viz/sub/img01_viz.png"));
        assert_eq!(layout.resized_path(rel).unwrap(), run_dir.join("resized/sub/img01.png"));
        assert_eq!(
            layout.crop_path(ClassId::Ruler, rel, 1).unwrap(),
            run_dir.join("crops/ruler/sub/img01_ruler_1.png")
        );
        assert_eq!(
            layout.crop_bg_removed_path(ClassId::Ruler, rel, 0).unwrap(),
            run_dir.join("crops_bg_removed/ruler/sub/img01_ruler_0.png")
        );
        assert_eq!(
            layout.full_bg_removed_path(rel).unwrap(),
            run_dir.join("full_bg_removed/sub/img01_bg_removed.png")
        );
        assert_eq!(layout.metadata_path(), run_dir.join("metadata.json"));
    }
}
