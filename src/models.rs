//! Detector and mask-generator seams.
//!
//! The real models live outside this crate. The built-in backends make the
//! CLI usable without them: `sidecar` reads precomputed detections from a
//! JSON file next to each image, `box` turns every detection's rectangle
//! into mask pixels.
use crate::error::{Result, SegError};
use crate::mask::ClassMask;
use crate::resize::FrameTransform;
use crate::types::{BoundingBox, ClassId, Detection, RunParameters};
use anyhow::{Context, anyhow};
use image::RgbImage;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const SIDECAR_DETECTOR: &str = "sidecar";
pub const BOX_MASK_GENERATOR: &str = "box";

/// The image handed to the models, plus where it came from.
pub struct Frame<'a> {
    pub image: &'a RgbImage,
    pub source: &'a Path,
    /// Source-pixel to frame-pixel mapping (identity when not resized).
    pub transform: FrameTransform,
}

/// Object detector. Output order is the order the mask generator paints
/// in, so later detections win overlaps.
pub trait Detector: Send + Sync {
    fn detect(&self, frame: &Frame<'_>) -> anyhow::Result<Vec<Detection>>;
}

/// Produces one class mask for a frame from all of its detections.
pub trait MaskGenerator: Send + Sync {
    fn generate(&self, frame: &Frame<'_>, detections: &[Detection]) -> anyhow::Result<ClassMask>;
}

#[derive(Debug, Deserialize)]
struct SidecarEntry {
    bbox: [f32; 4],
    class_id: u8,
}

/// Reads `<stem>.detections.json` beside the image. Boxes are in source
/// image pixels and are mapped through the frame transform.
#[derive(Debug, Default)]
pub struct SidecarDetector;

impl SidecarDetector {
    pub fn sidecar_path(source: &Path) -> PathBuf {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        source.with_file_name(format!("{}.detections.json", stem))
    }
}

impl Detector for SidecarDetector {
    fn detect(&self, frame: &Frame<'_>) -> anyhow::Result<Vec<Detection>> {
        let path = Self::sidecar_path(frame.source);
        let s = match std::fs::read_to_string(&path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("read {}", path.display())),
        };
        let entries: Vec<SidecarEntry> =
            serde_json::from_str(&s).with_context(|| format!("parse {}", path.display()))?;

        entries
            .into_iter()
            .map(|e| {
                let class = ClassId::from_id(e.class_id)
                    .ok_or_else(|| anyhow!("unknown class id {} in {}", e.class_id, path.display()))?;
                let [x0, y0, x1, y1] = e.bbox;
                Ok(Detection {
                    bbox: frame.transform.apply(&BoundingBox::new(x0, y0, x1, y1)),
                    class,
                })
            })
            .collect()
    }
}

/// Fills each detection's box with its class id, in detector order.
#[derive(Debug, Default)]
pub struct BoxMaskGenerator;

impl MaskGenerator for BoxMaskGenerator {
    fn generate(&self, frame: &Frame<'_>, detections: &[Detection]) -> anyhow::Result<ClassMask> {
        let (w, h) = frame.image.dimensions();
        let mut mask = ClassMask::new(w, h);
        mask.paint_boxes(detections);
        Ok(mask)
    }
}

/// Loaded model pair shared by every worker.
#[derive(Clone)]
pub struct Models {
    pub detector: Arc<dyn Detector>,
    pub mask_generator: Arc<dyn MaskGenerator>,
}

impl Models {
    pub fn new(detector: Arc<dyn Detector>, mask_generator: Arc<dyn MaskGenerator>) -> Self {
        Self {
            detector,
            mask_generator,
        }
    }
}

/// Resolve the model identifiers of a run. Unknown identifiers are a
/// setup failure.
pub fn load_models(params: &RunParameters) -> Result<Models> {
    let detector: Arc<dyn Detector> = match params.yolo_model_name.as_str() {
        SIDECAR_DETECTOR => Arc::new(SidecarDetector),
        other => return Err(SegError::ModelLoad(format!("unknown detector model '{}'", other))),
    };
    let mask_generator: Arc<dyn MaskGenerator> = match params.sam_model_name.as_str() {
        BOX_MASK_GENERATOR => Arc::new(BoxMaskGenerator),
        other => {
            return Err(SegError::ModelLoad(format!(
                "unknown mask generator model '{}'",
                other
            )));
        }
    };
    Ok(Models::new(detector, mask_generator))
}
