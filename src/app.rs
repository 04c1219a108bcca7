//! Run orchestration.
//!
//! `Init -> Scanning -> (SkipExisting | Running) -> Finalizing`. Setup
//! failures return `Err` before any descriptor is written. Per-image
//! failures are collected as values and only affect the final descriptor.
use crate::aggregator::SegmentationAggregator;
use crate::config::SegmentConfig;
use crate::error::{ImageFailure, Result, SegError, Stage};
use crate::fs_scan;
use crate::hw;
use crate::identity::{self, RunIdentifier};
use crate::layout::{self, OutputLayout};
use crate::metadata::{Descriptor, RunMetadata, RunMetadataStore};
use crate::models::Models;
use crate::pipeline::{self, ImageOutcome, RunContext};
use rayon::prelude::*;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::{debug, error, info, warn};

/// Counts and failures of a run that went through `Running`.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: RunIdentifier,
    pub run_dir: PathBuf,
    pub num_images: usize,
    pub segmented: usize,
    pub no_detections: usize,
    pub unreadable: usize,
    pub crops: usize,
    pub failures: Vec<ImageFailure>,
    pub elapsed: Duration,
}

impl RunSummary {
    pub fn completed(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn error_summary(&self) -> Option<String> {
        if self.failures.is_empty() {
            None
        } else {
            Some(format!(
                "{} of {} images failed during processing",
                self.failures.len(),
                self.num_images
            ))
        }
    }
}

#[derive(Debug, Clone)]
pub enum RunOutcome {
    /// A completed run with the same identity already exists.
    Skipped {
        run_id: RunIdentifier,
        run_dir: PathBuf,
    },
    Finished(RunSummary),
}

fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string())
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "worker panicked".to_string()
    }
}

/// Run one image, turning a panic inside a model into a failure value.
fn run_isolated(ctx: &RunContext<'_>, path: &Path) -> std::result::Result<ImageOutcome, ImageFailure> {
    match panic::catch_unwind(AssertUnwindSafe(|| pipeline::process_image(ctx, path))) {
        Ok(r) => r,
        Err(payload) => Err(ImageFailure::new(path, Stage::Panic, panic_message(payload))),
    }
}

pub fn segment(cfg: &SegmentConfig, models: &Models) -> Result<RunOutcome> {
    let start = Instant::now();
    let params = &cfg.params;

    // Init
    let dataset = fs_scan::resolve_dataset(&cfg.dataset)?;
    let fingerprint = identity::fingerprint(&dataset)?;
    let run_id = identity::identifier(&fingerprint, params)?;
    let run_dir = layout::resolve_run_dir(&cfg.placement, &dataset, &run_id);
    let layout = OutputLayout::materialize(run_dir, params)?;
    info!("Run {} -> {}", run_id, layout.run_dir.display());

    // Scanning
    let images = fs_scan::discover_images(&dataset)?;
    if images.is_empty() {
        error!("No images found in the dataset.");
        return Err(SegError::EmptyDataset(dataset));
    }
    info!("Found {} images in {}", images.len(), dataset.display());

    // SkipExisting
    let store = RunMetadataStore::new(layout.metadata_path());
    match store.read() {
        d if d.is_completed() && !cfg.force => {
            info!(
                "Processing already completed for dataset '{}' with the specified parameters.",
                dataset.display()
            );
            return Ok(RunOutcome::Skipped {
                run_id,
                run_dir: layout.run_dir,
            });
        }
        Descriptor::Malformed(e) => warn!("Ignoring unreadable {}: {}", store.path().display(), e),
        _ => {}
    }

    // Running
    let workers = params.num_workers.max(1).min(images.len());
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| SegError::Pool(e.to_string()))?;

    let mut meta = RunMetadata::in_progress(
        fingerprint,
        images.len(),
        params.clone(),
        hw::detect_hw(cfg.device, params.num_workers),
        now_rfc3339(),
    );
    store.write(&meta)?;

    let aggregator = SegmentationAggregator::new();
    let ctx = RunContext {
        config: cfg,
        dataset_root: &dataset,
        layout: &layout,
        models,
        aggregator: &aggregator,
    };

    let done = AtomicUsize::new(0);
    let total = images.len();
    info!("Processing {} images with {} workers", total, workers);
    let results: Vec<std::result::Result<ImageOutcome, ImageFailure>> = pool.install(|| {
        images
            .par_iter()
            .map(|p| {
                let r = run_isolated(&ctx, p);
                let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                debug!("[{}/{}] {}", n, total, p.display());
                r
            })
            .collect()
    });

    // drain
    let mut summary = RunSummary {
        run_id,
        run_dir: layout.run_dir.clone(),
        num_images: total,
        segmented: 0,
        no_detections: 0,
        unreadable: 0,
        crops: 0,
        failures: Vec::new(),
        elapsed: Duration::ZERO,
    };
    for r in results {
        match r {
            Ok(ImageOutcome::Segmented { crops }) => {
                summary.segmented += 1;
                summary.crops += crops;
            }
            Ok(ImageOutcome::NoDetections) => summary.no_detections += 1,
            Ok(ImageOutcome::Unreadable) => summary.unreadable += 1,
            Err(f) => {
                error!("Error processing image: {}", f);
                summary.failures.push(f);
            }
        }
    }

    // Finalizing
    if aggregator.is_empty() {
        warn!("No image produced a segmentation row.");
    } else {
        debug!("{} segmentation rows", aggregator.len());
    }
    let mut errors = summary.error_summary();
    if let Err(e) = aggregator.export(&layout.segmentation_csv()) {
        error!("Failed to write segmentation table: {}", e);
        let msg = format!("segmentation table not written: {}", e);
        errors = Some(match errors {
            Some(prev) => format!("{}; {}", prev, msg),
            None => msg,
        });
    }

    summary.elapsed = start.elapsed();
    meta.run_status.completed = errors.is_none();
    meta.run_status.processing_time_seconds = Some(summary.elapsed.as_secs_f64());
    meta.run_status.errors = errors;
    meta.run_status.failed_images = summary
        .failures
        .iter()
        .map(|f| fs_scan::portable_relative(&dataset, &f.image))
        .collect();
    meta.run_status.finished_at = Some(now_rfc3339());
    store.write(&meta)?;

    if let Err(e) = append_run_log(&layout, &meta, &summary) {
        warn!("Could not append run log: {}", e);
    }

    if meta.run_status.completed {
        info!(
            "Processing completed successfully. Outputs are available at: {}",
            layout.run_dir.display()
        );
    } else {
        warn!(
            "Processing completed with errors. Outputs are available at: {}",
            layout.run_dir.display()
        );
    }

    Ok(RunOutcome::Finished(summary))
}

fn append_run_log(layout: &OutputLayout, meta: &RunMetadata, s: &RunSummary) -> std::io::Result<()> {
    let mut f = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(layout.run_log())?;
    let status = &meta.run_status;
    writeln!(
        f,
        "run={} started={} finished={} images={} segmented={} no_detections={} unreadable={} crops={} failed={} seconds={:.3} completed={}",
        s.run_id,
        status.started_at.as_deref().unwrap_or("-"),
        status.finished_at.as_deref().unwrap_or("-"),
        s.num_images,
        s.segmented,
        s.no_detections,
        s.unreadable,
        s.crops,
        s.failures.len(),
        s.elapsed.as_secs_f64(),
        status.completed,
    )?;
    for failure in &s.failures {
        writeln!(f, "  failed: {}", failure)?;
    }
    Ok(())
}
