//! Per-pixel class masks.
use crate::types::{ClassId, Detection};
use image::{GrayImage, Luma, Rgb, RgbImage};
use std::collections::BTreeSet;

/// Grid of class ids, one per pixel of the (possibly resized) image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassMask(GrayImage);

impl ClassMask {
    /// All background.
    pub fn new(width: u32, height: u32) -> Self {
        Self(GrayImage::new(width, height))
    }

    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.0.dimensions()
    }

    pub fn get(&self, x: u32, y: u32) -> u8 {
        self.0.get_pixel(x, y).0[0]
    }

    pub fn set(&mut self, x: u32, y: u32, class: ClassId) {
        self.0.put_pixel(x, y, Luma([class.id()]));
    }

    pub fn as_gray(&self) -> &GrayImage {
        &self.0
    }

    /// Paint each detection's box with its class id, in order. Later
    /// detections overwrite earlier ones where boxes overlap.
    pub fn paint_boxes(&mut self, detections: &[Detection]) {
        let (w, h) = self.dimensions();
        for det in detections {
            let Some((x0, y0, x1, y1)) = det.bbox.clamped(w, h) else {
                continue;
            };
            for y in y0..y1 {
                for x in x0..x1 {
                    self.set(x, y, det.class);
                }
            }
        }
    }

    /// Classes of the vocabulary present in the mask, background included.
    pub fn present_classes(&self) -> BTreeSet<ClassId> {
        let mut seen = [false; 256];
        for p in self.0.pixels() {
            seen[p.0[0] as usize] = true;
        }
        ClassId::ALL
            .into_iter()
            .filter(|c| seen[c.id() as usize])
            .collect()
    }

    /// 255 where the pixel belongs to `class`, 0 elsewhere.
    pub fn binary_for(&self, class: ClassId) -> GrayImage {
        let id = class.id();
        GrayImage::from_fn(self.width(), self.height(), |x, y| {
            if self.get(x, y) == id { Luma([255]) } else { Luma([0]) }
        })
    }

    /// Union of the per-class binaries for every non-background class in
    /// `classes`.
    pub fn foreground_for<I: IntoIterator<Item = ClassId>>(&self, classes: I) -> GrayImage {
        let mut wanted = [false; 256];
        for c in classes {
            if !c.is_background() {
                wanted[c.id() as usize] = true;
            }
        }
        GrayImage::from_fn(self.width(), self.height(), |x, y| {
            if wanted[self.get(x, y) as usize] { Luma([255]) } else { Luma([0]) }
        })
    }
}

pub fn is_empty(binary: &GrayImage) -> bool {
    binary.pixels().all(|p| p.0[0] == 0)
}

/// JET colormap on `v` in 0..=255.
fn jet(v: u8) -> [u8; 3] {
    let t = v as f32 / 255.0;
    let channel = |center: f32| -> u8 {
        let c = 1.5 - (4.0 * (t - center)).abs();
        (c.clamp(0.0, 1.0) * 255.0).round() as u8
    };
    [channel(0.75), channel(0.5), channel(0.25)]
}

/// Color-mapped overlay: class id x25 through JET, blended 0.7 image /
/// 0.3 colormap.
pub fn render_overlay(image: &RgbImage, mask: &ClassMask) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let src = image.get_pixel(x, y).0;
        let id = if x < mask.width() && y < mask.height() {
            mask.get(x, y)
        } else {
            0
        };
        let cm = jet(id.saturating_mul(25));
        let mut out = [0u8; 3];
        for i in 0..3 {
            out[i] = (0.7 * src[i] as f32 + 0.3 * cm[i] as f32).round().clamp(0.0, 255.0) as u8;
        }
        Rgb(out)
    })
}
