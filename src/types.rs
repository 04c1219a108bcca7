use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Fixed segmentation vocabulary. Mask pixels hold the discriminant.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ClassId {
    Background = 0,
    Generic = 1,
    RightForewing = 2,
    LeftForewing = 3,
    RightHindwing = 4,
    LeftHindwing = 5,
    Ruler = 6,
    WhiteBalance = 7,
    Label = 8,
    ColorCard = 9,
    Body = 10,
}

impl ClassId {
    pub const COUNT: usize = 11;

    /// Vocabulary in id order; also the column order of the segmentation table.
    pub const ALL: [ClassId; ClassId::COUNT] = [
        ClassId::Background,
        ClassId::Generic,
        ClassId::RightForewing,
        ClassId::LeftForewing,
        ClassId::RightHindwing,
        ClassId::LeftHindwing,
        ClassId::Ruler,
        ClassId::WhiteBalance,
        ClassId::Label,
        ClassId::ColorCard,
        ClassId::Body,
    ];

    pub fn from_id(id: u8) -> Option<ClassId> {
        Self::ALL.get(id as usize).copied()
    }

    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            ClassId::Background => "background",
            ClassId::Generic => "generic",
            ClassId::RightForewing => "right_forewing",
            ClassId::LeftForewing => "left_forewing",
            ClassId::RightHindwing => "right_hindwing",
            ClassId::LeftHindwing => "left_hindwing",
            ClassId::Ruler => "ruler",
            ClassId::WhiteBalance => "white_balance",
            ClassId::Label => "label",
            ClassId::ColorCard => "color_card",
            ClassId::Body => "body",
        }
    }

    pub fn is_background(self) -> bool {
        self == ClassId::Background
    }

    /// Every class except background, in id order.
    pub fn foreground() -> impl Iterator<Item = ClassId> {
        Self::ALL.into_iter().filter(|c| !c.is_background())
    }
}

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Axis-aligned box in pixel coordinates, `x1`/`y1` exclusive.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl BoundingBox {
    pub fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Integer pixel span clamped to a `width` x `height` frame.
    /// Returns `None` when nothing of the box lies inside the frame.
    pub fn clamped(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let clamp = |v: f32, max: u32| -> u32 {
            if !v.is_finite() || v <= 0.0 {
                0
            } else {
                (v.round() as u64).min(max as u64) as u32
            }
        };
        let x0 = clamp(self.x0.min(self.x1), width);
        let x1 = clamp(self.x0.max(self.x1), width);
        let y0 = clamp(self.y0.min(self.y1), height);
        let y1 = clamp(self.y0.max(self.y1), height);
        if x1 <= x0 || y1 <= y0 {
            None
        } else {
            Some((x0, y0, x1, y1))
        }
    }
}

/// One detector proposal. Consumed read-only by the pipeline.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub class: ClassId,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ResizeMode {
    /// Stretch to the target without preserving aspect ratio.
    Distort,
    /// Preserve aspect ratio and fill the slack with the padding color.
    Pad,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
#[value(rename_all = "snake_case")]
pub enum Interpolation {
    Nearest,
    Linear,
    Cubic,
    Area,
    Lanczos4,
    LinearExact,
    NearestExact,
}

impl fmt::Display for Interpolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Interpolation::Nearest => "nearest",
            Interpolation::Linear => "linear",
            Interpolation::Cubic => "cubic",
            Interpolation::Area => "area",
            Interpolation::Lanczos4 => "lanczos4",
            Interpolation::LinearExact => "linear_exact",
            Interpolation::NearestExact => "nearest_exact",
        };
        f.write_str(s)
    }
}

/// The two fill colors used for padding and background replacement.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FillColor {
    Black,
    White,
}

impl FillColor {
    pub fn rgb(self) -> [u8; 3] {
        match self {
            FillColor::Black => [0, 0, 0],
            FillColor::White => [255, 255, 255],
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum Device {
    Cpu,
    Cuda,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cpu => f.write_str("cpu"),
            Device::Cuda => f.write_str("cuda"),
        }
    }
}

/// Target frame for resizing, always stored as `[width, height]`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(from = "[u32; 2]", into = "[u32; 2]")]
pub struct TargetSize {
    pub width: u32,
    pub height: u32,
}

impl From<[u32; 2]> for TargetSize {
    fn from([width, height]: [u32; 2]) -> Self {
        Self { width, height }
    }
}

impl From<TargetSize> for [u32; 2] {
    fn from(s: TargetSize) -> Self {
        [s.width, s.height]
    }
}

impl fmt::Display for TargetSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Every option that affects output bytes. Together with the dataset
/// fingerprint this is the identity of a run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunParameters {
    pub sam_model_name: String,
    pub yolo_model_name: String,
    pub resize_mode: Option<ResizeMode>,
    pub size: Option<TargetSize>,
    pub padding_color: Option<FillColor>,
    pub interpolation: Option<Interpolation>,
    pub bbox_padding: u32,
    pub visualize_segmentation: bool,
    pub crop_by_class: bool,
    pub remove_crops_background: bool,
    pub remove_full_background: bool,
    pub background_color: Option<FillColor>,
    pub num_workers: usize,
}
