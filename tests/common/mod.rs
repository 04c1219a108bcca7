#![allow(dead_code)]

use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use wingseg::mask::ClassMask;
use wingseg::models::{Detector, Frame, MaskGenerator, Models};
use wingseg::types::BoundingBox;
use wingseg::{ClassId, Detection};

/// `<tmp>/wings` with `n` solid 20x20 PNGs named `img_<i>.png`.
pub fn dataset(tmp: &Path, n: usize) -> PathBuf {
    let root = tmp.join("wings");
    std::fs::create_dir_all(&root).unwrap();
    for i in 0..n {
        let img = RgbImage::from_fn(20, 20, |x, y| Rgb([(x * 10) as u8, (y * 10) as u8, i as u8]));
        img.save(root.join(format!("img_{}.png", i))).unwrap();
    }
    root
}

pub fn file_name(frame: &Frame<'_>) -> String {
    frame
        .source
        .file_name()
        .unwrap()
        .to_string_lossy()
        .to_string()
}

/// A body box and a ruler box on every image.
pub struct FixedDetector;

impl Detector for FixedDetector {
    fn detect(&self, _frame: &Frame<'_>) -> anyhow::Result<Vec<Detection>> {
        Ok(vec![
            Detection {
                bbox: BoundingBox::new(2.0, 2.0, 8.0, 8.0),
                class: ClassId::Body,
            },
            Detection {
                bbox: BoundingBox::new(12.0, 12.0, 18.0, 18.0),
                class: ClassId::Ruler,
            },
        ])
    }
}

pub struct EmptyDetector;

impl Detector for EmptyDetector {
    fn detect(&self, _frame: &Frame<'_>) -> anyhow::Result<Vec<Detection>> {
        Ok(Vec::new())
    }
}

/// Errors on one file name, otherwise behaves like [`FixedDetector`].
pub struct FailingDetector(pub &'static str);

impl Detector for FailingDetector {
    fn detect(&self, frame: &Frame<'_>) -> anyhow::Result<Vec<Detection>> {
        if file_name(frame) == self.0 {
            anyhow::bail!("inference failed");
        }
        FixedDetector.detect(frame)
    }
}

/// Panics on one file name.
pub struct PanickingDetector(pub &'static str);

impl Detector for PanickingDetector {
    fn detect(&self, frame: &Frame<'_>) -> anyhow::Result<Vec<Detection>> {
        if file_name(frame) == self.0 {
            panic!("model crashed");
        }
        FixedDetector.detect(frame)
    }
}

/// Paints each detection pixel by pixel, in order.
pub struct OverlayMaskGenerator;

impl MaskGenerator for OverlayMaskGenerator {
    fn generate(&self, frame: &Frame<'_>, detections: &[Detection]) -> anyhow::Result<ClassMask> {
        let (w, h) = frame.image.dimensions();
        let mut mask = ClassMask::new(w, h);
        for d in detections {
            let Some((x0, y0, x1, y1)) = d.bbox.clamped(w, h) else {
                continue;
            };
            for y in y0..y1 {
                for x in x0..x1 {
                    mask.set(x, y, d.class);
                }
            }
        }
        Ok(mask)
    }
}

/// [`FixedDetector`] that counts how often it was asked.
pub struct CountingDetector(pub Arc<AtomicUsize>);

impl Detector for CountingDetector {
    fn detect(&self, frame: &Frame<'_>) -> anyhow::Result<Vec<Detection>> {
        self.0.fetch_add(1, Ordering::SeqCst);
        FixedDetector.detect(frame)
    }
}

pub fn models(detector: impl Detector + 'static) -> Models {
    Models::new(Arc::new(detector), Arc::new(OverlayMaskGenerator))
}

pub fn csv_rows(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .skip(1)
        .map(str::to_string)
        .collect()
}
