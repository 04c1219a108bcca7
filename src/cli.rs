use crate::config::SegmentConfig;
use crate::error::Result;
use crate::models::{BOX_MASK_GENERATOR, SIDECAR_DETECTOR};
use crate::types::{Device, FillColor, Interpolation, ResizeMode};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Batch wing image segmentation")]
pub struct Cli {
    /// Debug-level logging unless RUST_LOG says otherwise.
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Segment every image of a dataset into a run directory.
    Segment(SegmentArgs),
    /// Summarize the existing runs of a dataset.
    ScanRuns(ScanArgs),
    /// Run a command described by a YAML file.
    RunConfig {
        #[arg(long, env = "WINGSEG_CONFIG")]
        config: PathBuf,
    },
}

#[derive(Args, Debug, Clone)]
pub struct SegmentArgs {
    #[arg(long)]
    pub dataset: PathBuf,

    /// One value for a square target, or width and height.
    #[arg(long, num_args = 1..)]
    pub size: Option<Vec<u32>>,

    #[arg(long, value_enum)]
    pub resize_mode: Option<ResizeMode>,

    #[arg(long, value_enum)]
    pub padding_color: Option<FillColor>,

    #[arg(long, value_enum)]
    pub interpolation: Option<Interpolation>,

    #[arg(long, allow_negative_numbers = true)]
    pub bbox_padding: Option<i64>,

    #[arg(long, conflicts_with = "custom_output_dir")]
    pub outputs_base_dir: Option<PathBuf>,

    #[arg(long)]
    pub custom_output_dir: Option<PathBuf>,

    #[arg(long, default_value = BOX_MASK_GENERATOR)]
    pub sam_model: String,

    #[arg(long, default_value = SIDECAR_DETECTOR)]
    pub yolo_model: String,

    #[arg(long, value_enum, default_value_t = Device::Cpu)]
    pub device: Device,

    #[arg(long, default_value_t = 1)]
    pub num_workers: usize,

    #[arg(long)]
    pub visualize_segmentation: bool,

    #[arg(long)]
    pub crop_by_class: bool,

    /// Reprocess even if a completed run with the same identity exists.
    #[arg(long)]
    pub force: bool,

    #[arg(long)]
    pub remove_crops_background: bool,

    #[arg(long)]
    pub remove_full_background: bool,

    #[arg(long, value_enum)]
    pub background_color: Option<FillColor>,
}

impl SegmentArgs {
    pub fn into_config(self) -> Result<SegmentConfig> {
        SegmentConfig::builder(self.dataset)
            .size(self.size)
            .resize_mode(self.resize_mode)
            .padding_color(self.padding_color)
            .interpolation(self.interpolation)
            .bbox_padding(self.bbox_padding)
            .outputs_base_dir(self.outputs_base_dir)
            .custom_output_dir(self.custom_output_dir)
            .sam_model(self.sam_model)
            .yolo_model(self.yolo_model)
            .device(self.device)
            .num_workers(self.num_workers)
            .visualize_segmentation(self.visualize_segmentation)
            .crop_by_class(self.crop_by_class)
            .force(self.force)
            .remove_crops_background(self.remove_crops_background)
            .remove_full_background(self.remove_full_background)
            .background_color(self.background_color)
            .build()
    }
}

#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    #[arg(long)]
    pub dataset: PathBuf,

    /// Directory holding the run directories, if not beside the dataset.
    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    #[arg(long, conflicts_with = "output_dir")]
    pub custom_output_dir: Option<PathBuf>,
}
