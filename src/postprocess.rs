//! Mask-derived postprocessing: per-class crops and background compositing.
//!
//! Components are 8-connected. Only outermost components yield crops; a
//! component sitting inside a hole of another component of the same class
//! is covered by the enclosing component's rectangle. Crops of one class
//! are ordered by the raster position of each component's first pixel.
use crate::mask::ClassMask;
use crate::types::{ClassId, FillColor};
use image::{GrayImage, ImageBuffer, Pixel, Rgb, RgbImage, imageops};
use std::collections::VecDeque;

/// Rectangle in image coordinates, `x + width` exclusive.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct CropRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// One connected component of one class, cut out of image and class mask.
#[derive(Clone, Debug)]
pub struct Crop {
    pub class: ClassId,
    /// Position among this class's components in this image.
    pub index: usize,
    pub rect: CropRect,
    pub image: RgbImage,
    /// Class binary (255 / 0) over the same rectangle.
    pub mask: GrayImage,
}

#[derive(Debug)]
struct Component {
    min_x: u32,
    min_y: u32,
    max_x: u32,
    max_y: u32,
    external: bool,
}

/// Outermost 8-connected components of the nonzero pixels of `binary`.
fn external_components(binary: &GrayImage) -> Vec<Component> {
    let (w, h) = binary.dimensions();
    let (wu, hu) = (w as usize, h as usize);
    let fg = |x: usize, y: usize| binary.get_pixel(x as u32, y as u32).0[0] > 0;

    // background reachable from the border through 4-connected steps
    let mut outside = vec![false; wu * hu];
    let mut queue = VecDeque::new();
    for y in 0..hu {
        for x in 0..wu {
            let border = x == 0 || y == 0 || x + 1 == wu || y + 1 == hu;
            if border && !fg(x, y) {
                outside[y * wu + x] = true;
                queue.push_back((x, y));
            }
        }
    }
    while let Some((x, y)) = queue.pop_front() {
        for (nx, ny) in neighbors4(x, y, wu, hu) {
            let i = ny * wu + nx;
            if !outside[i] && !fg(nx, ny) {
                outside[i] = true;
                queue.push_back((nx, ny));
            }
        }
    }

    let mut labelled = vec![false; wu * hu];
    let mut components = Vec::new();
    for sy in 0..hu {
        for sx in 0..wu {
            if labelled[sy * wu + sx] || !fg(sx, sy) {
                continue;
            }
            let mut comp = Component {
                min_x: sx as u32,
                min_y: sy as u32,
                max_x: sx as u32,
                max_y: sy as u32,
                external: false,
            };
            labelled[sy * wu + sx] = true;
            queue.push_back((sx, sy));
            while let Some((x, y)) = queue.pop_front() {
                comp.min_x = comp.min_x.min(x as u32);
                comp.min_y = comp.min_y.min(y as u32);
                comp.max_x = comp.max_x.max(x as u32);
                comp.max_y = comp.max_y.max(y as u32);

                if x == 0 || y == 0 || x + 1 == wu || y + 1 == hu {
                    comp.external = true;
                }
                for (nx, ny) in neighbors4(x, y, wu, hu) {
                    if outside[ny * wu + nx] {
                        comp.external = true;
                    }
                }
                for (nx, ny) in neighbors8(x, y, wu, hu) {
                    let i = ny * wu + nx;
                    if !labelled[i] && fg(nx, ny) {
                        labelled[i] = true;
                        queue.push_back((nx, ny));
                    }
                }
            }
            components.push(comp);
        }
    }

    components.retain(|c| c.external);
    components
}

fn neighbors4(x: usize, y: usize, w: usize, h: usize) -> impl Iterator<Item = (usize, usize)> {
    let cand = [
        (x.wrapping_sub(1), y),
        (x + 1, y),
        (x, y.wrapping_sub(1)),
        (x, y + 1),
    ];
    cand.into_iter().filter(move |&(nx, ny)| nx < w && ny < h)
}

fn neighbors8(x: usize, y: usize, w: usize, h: usize) -> impl Iterator<Item = (usize, usize)> {
    let mut cand = [(0usize, 0usize); 8];
    let mut n = 0;
    for dy in [-1isize, 0, 1] {
        for dx in [-1isize, 0, 1] {
            if dx == 0 && dy == 0 {
                continue;
            }
            cand[n] = (
                (x as isize + dx) as usize,
                (y as isize + dy) as usize,
            );
            n += 1;
        }
    }
    cand.into_iter().filter(move |&(nx, ny)| nx < w && ny < h)
}

fn padded_rect(c: &Component, padding: u32, w: u32, h: u32) -> CropRect {
    let x = c.min_x.saturating_sub(padding);
    let y = c.min_y.saturating_sub(padding);
    let x_end = (c.max_x + 1).saturating_add(padding).min(w);
    let y_end = (c.max_y + 1).saturating_add(padding).min(h);
    CropRect {
        x,
        y,
        width: x_end - x,
        height: y_end - y,
    }
}

/// One crop per outermost component of every non-background class.
/// `padding` grows each rectangle on all sides, clamped to the image.
pub fn extract_crops(image: &RgbImage, mask: &ClassMask, padding: u32) -> Vec<Crop> {
    let (w, h) = mask.dimensions();
    let mut crops = Vec::new();

    for class in ClassId::foreground() {
        let binary = mask.binary_for(class);
        for (index, comp) in external_components(&binary).iter().enumerate() {
            let rect = padded_rect(comp, padding, w, h);
            crops.push(Crop {
                class,
                index,
                rect,
                image: imageops::crop_imm(image, rect.x, rect.y, rect.width, rect.height).to_image(),
                mask: imageops::crop_imm(&binary, rect.x, rect.y, rect.width, rect.height).to_image(),
            });
        }
    }

    crops
}

/// Keep `image` where `mask > 0`, solid `color` elsewhere. Multi-channel
/// masks are reduced to luma first. Mask pixels outside the mask's extent
/// count as zero.
pub fn composite_background<P>(image: &RgbImage, mask: &ImageBuffer<P, Vec<u8>>, color: FillColor) -> RgbImage
where
    P: Pixel<Subpixel = u8>,
{
    let fill = Rgb(color.rgb());
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let keep = x < mask.width() && y < mask.height() && mask.get_pixel(x, y).to_luma().0[0] > 0;
        if keep { *image.get_pixel(x, y) } else { fill }
    })
}
