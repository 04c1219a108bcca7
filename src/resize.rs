use crate::types::{BoundingBox, FillColor, Interpolation, ResizeMode, TargetSize};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

/// Resize settings after validation; only built when a size was given.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ResizeSpec {
    pub size: TargetSize,
    pub mode: ResizeMode,
    pub padding_color: FillColor,
    pub interpolation: Interpolation,
}

pub fn filter_for(interp: Interpolation) -> FilterType {
    match interp {
        Interpolation::Nearest | Interpolation::NearestExact => FilterType::Nearest,
        Interpolation::Linear | Interpolation::LinearExact | Interpolation::Area => FilterType::Triangle,
        Interpolation::Cubic => FilterType::CatmullRom,
        Interpolation::Lanczos4 => FilterType::Lanczos3,
    }
}

/// Maps source-image coordinates into the resized frame.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FrameTransform {
    pub scale_x: f64,
    pub scale_y: f64,
    pub offset_x: f64,
    pub offset_y: f64,
}

impl FrameTransform {
    pub const IDENTITY: FrameTransform = FrameTransform {
        scale_x: 1.0,
        scale_y: 1.0,
        offset_x: 0.0,
        offset_y: 0.0,
    };

    pub fn apply(&self, b: &BoundingBox) -> BoundingBox {
        let x = |v: f32| (v as f64 * self.scale_x + self.offset_x) as f32;
        let y = |v: f32| (v as f64 * self.scale_y + self.offset_y) as f32;
        BoundingBox::new(x(b.x0), y(b.y0), x(b.x1), y(b.y1))
    }
}

pub fn resize_image(img: &RgbImage, spec: &ResizeSpec) -> (RgbImage, FrameTransform) {
    let filter = filter_for(spec.interpolation);
    let (tw, th) = (spec.size.width, spec.size.height);
    let (w, h) = img.dimensions();
    match spec.mode {
        ResizeMode::Distort => {
            let t = FrameTransform {
                scale_x: tw as f64 / w.max(1) as f64,
                scale_y: th as f64 / h.max(1) as f64,
                offset_x: 0.0,
                offset_y: 0.0,
            };
            (imageops::resize(img, tw, th, filter), t)
        }
        ResizeMode::Pad => pad_resize(img, tw, th, filter, spec.padding_color),
    }
}

/// Fit inside `tw` x `th` keeping aspect ratio, centered on a filled canvas.
fn pad_resize(
    img: &RgbImage,
    tw: u32,
    th: u32,
    filter: FilterType,
    color: FillColor,
) -> (RgbImage, FrameTransform) {
    let (w, h) = img.dimensions();
    let mut canvas = RgbImage::from_pixel(tw, th, Rgb(color.rgb()));
    if w == 0 || h == 0 {
        return (canvas, FrameTransform::IDENTITY);
    }

    let scale = (tw as f64 / w as f64).min(th as f64 / h as f64);
    let nw = ((w as f64 * scale).round() as u32).clamp(1, tw);
    let nh = ((h as f64 * scale).round() as u32).clamp(1, th);

    let scaled = imageops::resize(img, nw, nh, filter);
    let x = (tw - nw) / 2;
    let y = (th - nh) / 2;
    imageops::replace(&mut canvas, &scaled, x as i64, y as i64);
    let t = FrameTransform {
        scale_x: nw as f64 / w as f64,
        scale_y: nh as f64 / h as f64,
        offset_x: x as f64,
        offset_y: y as f64,
    };
    (canvas, t)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(mode: ResizeMode, w: u32, h: u32, color: FillColor) -> ResizeSpec {
        ResizeSpec {
            size: TargetSize { width: w, height: h },
            mode,
            padding_color: color,
            interpolation: Interpolation::Nearest,
        }
    }

    #[test]
    fn test_distort_hits_target() {
        let img = RgbImage::from_pixel(40, 10, Rgb([10, 20, 30]));
        let (out, t) = resize_image(&img, &spec(ResizeMode::Distort, 16, 16, FillColor::Black));
        assert_eq!(out.dimensions(), (16, 16));
        assert_eq!(out.get_pixel(8, 8), &Rgb([10, 20, 30]));
        let b = t.apply(&BoundingBox::new(0.0, 0.0, 40.0, 10.0));
        assert_eq!(b, BoundingBox::new(0.0, 0.0, 16.0, 16.0));
    }

    #[test]
    fn test_pad_preserves_aspect_and_fills() {
        let img = RgbImage::from_pixel(40, 10, Rgb([10, 20, 30]));
        let (out, t) = resize_image(&img, &spec(ResizeMode::Pad, 16, 16, FillColor::White));
        assert_eq!(out.dimensions(), (16, 16));
        // 40x10 -> 16x4, centered vertically at rows 6..10
        assert_eq!(out.get_pixel(0, 0), &Rgb([255, 255, 255]));
        assert_eq!(out.get_pixel(8, 5), &Rgb([255, 255, 255]));
        assert_eq!(out.get_pixel(8, 6), &Rgb([10, 20, 30]));
        assert_eq!(out.get_pixel(8, 9), &Rgb([10, 20, 30]));
        assert_eq!(out.get_pixel(8, 10), &Rgb([255, 255, 255]));
        let b = t.apply(&BoundingBox::new(0.0, 0.0, 40.0, 10.0));
        assert_eq!(b, BoundingBox::new(0.0, 6.0, 16.0, 10.0));
    }

    #[test]
    fn test_filter_mapping() {
        assert_eq!(filter_for(Interpolation::Area), FilterType::Triangle);
        assert_eq!(filter_for(Interpolation::Lanczos4), FilterType::Lanczos3);
        assert_eq!(filter_for(Interpolation::NearestExact), FilterType::Nearest);
    }
}
