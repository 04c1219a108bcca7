//! Per-image pipeline: load, resize, detect, mask, write artefacts.
use crate::aggregator::SegmentationAggregator;
use crate::config::SegmentConfig;
use crate::error::{ImageFailure, SegError, Stage};
use crate::fs_scan;
use crate::layout::{self, OutputLayout};
use crate::mask::{self, ClassMask};
use crate::models::{Frame, Models};
use crate::postprocess;
use crate::resize::{self, FrameTransform};
use image::{GrayImage, RgbImage};
use std::path::Path;
use tracing::{debug, info, warn};

/// Everything a worker needs, borrowed from the orchestrator.
pub struct RunContext<'a> {
    pub config: &'a SegmentConfig,
    pub dataset_root: &'a Path,
    pub layout: &'a OutputLayout,
    pub models: &'a Models,
    pub aggregator: &'a SegmentationAggregator,
}

/// How an image finished when it did not fail.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ImageOutcome {
    Segmented { crops: usize },
    NoDetections,
    /// Could not be decoded; skipped without counting as a failure.
    Unreadable,
}

fn write_failure(image: &Path, e: SegError) -> ImageFailure {
    ImageFailure::new(image, Stage::Write, e.to_string())
}

fn save_rgb(image: &Path, img: &RgbImage, target: &Path) -> Result<(), ImageFailure> {
    layout::ensure_parent(target).map_err(|e| write_failure(image, e))?;
    img.save(target)
        .map_err(|e| write_failure(image, SegError::image(target, e)))
}

fn save_gray(image: &Path, img: &GrayImage, target: &Path) -> Result<(), ImageFailure> {
    layout::ensure_parent(target).map_err(|e| write_failure(image, e))?;
    img.save(target)
        .map_err(|e| write_failure(image, SegError::image(target, e)))
}

pub fn process_image(ctx: &RunContext<'_>, path: &Path) -> Result<ImageOutcome, ImageFailure> {
    let rel = fs_scan::relative_to(ctx.dataset_root, path);
    let params = &ctx.config.params;

    let original = match image::open(path) {
        Ok(img) => img.to_rgb8(),
        Err(e) => {
            warn!("Failed to read image {}: {}", path.display(), e);
            return Ok(ImageOutcome::Unreadable);
        }
    };

    let (working, transform) = match ctx.config.resize_spec() {
        Some(spec) => {
            let (img, t) = resize::resize_image(&original, &spec);
            if img.width() == 0 || img.height() == 0 {
                return Err(ImageFailure::new(path, Stage::Resize, "resize produced an empty image"));
            }
            if let Some(target) = ctx.layout.resized_path(&rel) {
                save_rgb(path, &img, &target)?;
            }
            (img, t)
        }
        None => (original, FrameTransform::IDENTITY),
    };
    let color = ctx.config.background_color();

    let frame = Frame {
        image: &working,
        source: path,
        transform,
    };

    let detections = ctx
        .models
        .detector
        .detect(&frame)
        .map_err(|e| ImageFailure::new(path, Stage::Detect, format!("{:#}", e)))?;
    if detections.is_empty() {
        info!("No detections for image: {}", path.display());
        return Ok(ImageOutcome::NoDetections);
    }
    debug!("{} detections for {}", detections.len(), path.display());

    let class_mask: ClassMask = ctx
        .models
        .mask_generator
        .generate(&frame, &detections)
        .map_err(|e| ImageFailure::new(path, Stage::Mask, format!("{:#}", e)))?;
    if class_mask.dimensions() != working.dimensions() {
        return Err(ImageFailure::new(
            path,
            Stage::Mask,
            format!(
                "mask is {:?} but image is {:?}",
                class_mask.dimensions(),
                working.dimensions()
            ),
        ));
    }

    save_gray(path, class_mask.as_gray(), &ctx.layout.mask_path(&rel))?;

    if let Some(target) = ctx.layout.viz_path(&rel) {
        let viz = mask::render_overlay(&working, &class_mask);
        save_rgb(path, &viz, &target)?;
    }

    let mut crop_count = 0;
    if params.crop_by_class {
        for crop in postprocess::extract_crops(&working, &class_mask, params.bbox_padding) {
            if let Some(target) = ctx.layout.crop_path(crop.class, &rel, crop.index) {
                save_rgb(path, &crop.image, &target)?;
                debug!("Cropped '{}' saved to {}", crop.class, target.display());
            }
            if let Some(target) = ctx.layout.crop_bg_removed_path(crop.class, &rel, crop.index) {
                let removed = postprocess::composite_background(&crop.image, &crop.mask, color);
                save_rgb(path, &removed, &target)?;
            }
            crop_count += 1;
        }
    }

    if let Some(target) = ctx.layout.full_bg_removed_path(&rel) {
        let foreground = class_mask.foreground_for(detections.iter().map(|d| d.class));
        if mask::is_empty(&foreground) {
            warn!(
                "No foreground detected for image: {}. Full background removal skipped.",
                path.display()
            );
        } else {
            let removed = postprocess::composite_background(&working, &foreground, color);
            save_rgb(path, &removed, &target)?;
        }
    }

    ctx.aggregator.record(path, &class_mask.present_classes());
    Ok(ImageOutcome::Segmented { crops: crop_count })
}
