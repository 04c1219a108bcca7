use crate::error::{Result, SegError};
use crate::layout::OutputPlacement;
use crate::models::{BOX_MASK_GENERATOR, SIDECAR_DETECTOR};
use crate::resize::ResizeSpec;
use crate::types::{Device, FillColor, Interpolation, ResizeMode, RunParameters, TargetSize};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};

/// Validated configuration of one `segment` invocation. Built once, then
/// only borrowed.
#[derive(Clone, Debug)]
pub struct SegmentConfig {
    pub dataset: PathBuf,
    pub params: RunParameters,
    pub device: Device,
    pub placement: OutputPlacement,
    pub force: bool,
}

impl SegmentConfig {
    pub fn builder(dataset: impl Into<PathBuf>) -> SegmentConfigBuilder {
        SegmentConfigBuilder::new(dataset.into())
    }

    pub fn resize_spec(&self) -> Option<ResizeSpec> {
        let p = &self.params;
        Some(ResizeSpec {
            size: p.size?,
            mode: p.resize_mode?,
            padding_color: p.padding_color.unwrap_or(FillColor::Black),
            interpolation: p.interpolation.unwrap_or(Interpolation::Area),
        })
    }

    pub fn background_color(&self) -> FillColor {
        self.params.background_color.unwrap_or(FillColor::Black)
    }
}

/// Raw option values, checked together in [`SegmentConfigBuilder::build`].
#[derive(Clone, Debug)]
pub struct SegmentConfigBuilder {
    dataset: PathBuf,
    size: Option<Vec<u32>>,
    resize_mode: Option<ResizeMode>,
    padding_color: Option<FillColor>,
    interpolation: Option<Interpolation>,
    bbox_padding: Option<i64>,
    outputs_base_dir: Option<PathBuf>,
    custom_output_dir: Option<PathBuf>,
    sam_model: String,
    yolo_model: String,
    device: Device,
    num_workers: usize,
    visualize_segmentation: bool,
    crop_by_class: bool,
    force: bool,
    remove_crops_background: bool,
    remove_full_background: bool,
    background_color: Option<FillColor>,
}

impl SegmentConfigBuilder {
    fn new(dataset: PathBuf) -> Self {
        Self {
            dataset,
            size: None,
            resize_mode: None,
            padding_color: None,
            interpolation: None,
            bbox_padding: None,
            outputs_base_dir: None,
            custom_output_dir: None,
            sam_model: BOX_MASK_GENERATOR.to_string(),
            yolo_model: SIDECAR_DETECTOR.to_string(),
            device: Device::Cpu,
            num_workers: 1,
            visualize_segmentation: false,
            crop_by_class: false,
            force: false,
            remove_crops_background: false,
            remove_full_background: false,
            background_color: None,
        }
    }

    pub fn size(mut self, size: Option<Vec<u32>>) -> Self {
        self.size = size;
        self
    }

    pub fn resize_mode(mut self, mode: Option<ResizeMode>) -> Self {
        self.resize_mode = mode;
        self
    }

    pub fn padding_color(mut self, color: Option<FillColor>) -> Self {
        self.padding_color = color;
        self
    }

    pub fn interpolation(mut self, interp: Option<Interpolation>) -> Self {
        self.interpolation = interp;
        self
    }

    pub fn bbox_padding(mut self, padding: Option<i64>) -> Self {
        self.bbox_padding = padding;
        self
    }

    pub fn outputs_base_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.outputs_base_dir = dir;
        self
    }

    pub fn custom_output_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.custom_output_dir = dir;
        self
    }

    pub fn sam_model(mut self, name: impl Into<String>) -> Self {
        self.sam_model = name.into();
        self
    }

    pub fn yolo_model(mut self, name: impl Into<String>) -> Self {
        self.yolo_model = name.into();
        self
    }

    pub fn device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    pub fn num_workers(mut self, n: usize) -> Self {
        self.num_workers = n;
        self
    }

    pub fn visualize_segmentation(mut self, on: bool) -> Self {
        self.visualize_segmentation = on;
        self
    }

    pub fn crop_by_class(mut self, on: bool) -> Self {
        self.crop_by_class = on;
        self
    }

    pub fn force(mut self, on: bool) -> Self {
        self.force = on;
        self
    }

    pub fn remove_crops_background(mut self, on: bool) -> Self {
        self.remove_crops_background = on;
        self
    }

    pub fn remove_full_background(mut self, on: bool) -> Self {
        self.remove_full_background = on;
        self
    }

    pub fn background_color(mut self, color: Option<FillColor>) -> Self {
        self.background_color = color;
        self
    }

    pub fn build(self) -> Result<SegmentConfig> {
        let invalid = |msg: &str| Err(SegError::Validation(msg.to_string()));

        let size = match &self.size {
            Some(v) => {
                let target = match v.as_slice() {
                    [s] => TargetSize { width: *s, height: *s },
                    [w, h] => TargetSize { width: *w, height: *h },
                    _ => {
                        return invalid(
                            "--size must accept either one value (square resize) or two values (width and height)",
                        );
                    }
                };
                if target.width == 0 || target.height == 0 {
                    return invalid("--size values must be positive integers");
                }
                if self.resize_mode.is_none() {
                    return invalid("--resize-mode must be specified when --size is provided");
                }
                Some(target)
            }
            None => {
                if self.resize_mode.is_some() {
                    return invalid("resizing options (--resize-mode) require --size to be specified");
                }
                if self.padding_color.is_some() {
                    return invalid("resizing options (--padding-color) require --size to be specified");
                }
                None
            }
        };

        if self.remove_crops_background && !self.crop_by_class {
            return invalid("--remove-crops-background requires --crop-by-class to be set");
        }
        let removal = self.remove_crops_background || self.remove_full_background;
        if self.background_color.is_some() && !removal {
            return invalid("--background-color can only be set when background removal is enabled");
        }
        if self.custom_output_dir.is_some() && self.outputs_base_dir.is_some() {
            return invalid("cannot specify both --outputs-base-dir and --custom-output-dir");
        }
        let bbox_padding = match self.bbox_padding {
            None => 0,
            Some(p) if p < 0 => return invalid("--bbox-padding must be a non-negative integer"),
            Some(p) => u32::try_from(p)
                .map_err(|_| SegError::Validation("--bbox-padding is too large".to_string()))?,
        };
        if self.num_workers == 0 {
            return invalid("--num-workers must be at least 1");
        }

        let padded = self.resize_mode == Some(ResizeMode::Pad);
        let params = RunParameters {
            sam_model_name: self.sam_model,
            yolo_model_name: self.yolo_model,
            resize_mode: self.resize_mode,
            size,
            padding_color: if padded {
                Some(self.padding_color.unwrap_or(FillColor::Black))
            } else {
                None
            },
            interpolation: size.map(|_| self.interpolation.unwrap_or(Interpolation::Area)),
            bbox_padding,
            visualize_segmentation: self.visualize_segmentation,
            crop_by_class: self.crop_by_class,
            remove_crops_background: self.remove_crops_background,
            remove_full_background: self.remove_full_background,
            background_color: if removal {
                Some(self.background_color.unwrap_or(FillColor::Black))
            } else {
                None
            },
            num_workers: self.num_workers,
        };

        Ok(SegmentConfig {
            dataset: self.dataset,
            params,
            device: self.device,
            placement: OutputPlacement::from_flags(self.custom_output_dir, self.outputs_base_dir),
            force: self.force,
        })
    }
}

/// YAML run file: a subcommand plus its flags.
///
/// ```yaml
/// command: segment
/// flags:
///   dataset: /data/wings
///   size: [256, 256]
///   resize-mode: pad
///   crop-by-class: true
/// ```
#[derive(Debug, Deserialize)]
pub struct RunFile {
    pub command: String,
    #[serde(default)]
    pub flags: BTreeMap<String, serde_yaml::Value>,
}

const RUN_FILE_COMMANDS: [&str; 2] = ["segment", "scan-runs"];

pub fn load_run_file(path: &Path) -> Result<RunFile> {
    let file = File::open(path).map_err(|e| SegError::io(path, e))?;
    serde_yaml::from_reader(file).map_err(|e| SegError::Config(format!("{}: {}", path.display(), e)))
}

fn scalar(v: &serde_yaml::Value) -> Option<String> {
    match v {
        serde_yaml::Value::String(s) => Some(s.clone()),
        serde_yaml::Value::Number(n) => Some(n.to_string()),
        serde_yaml::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

impl RunFile {
    /// Command line equivalent, starting with the program name.
    pub fn to_argv(&self) -> Result<Vec<String>> {
        let command = self.command.replace('_', "-");
        if !RUN_FILE_COMMANDS.contains(&command.as_str()) {
            return Err(SegError::Config(format!("unknown command '{}'", self.command)));
        }

        let mut argv = vec!["wingseg".to_string(), command];
        for (key, value) in &self.flags {
            let flag = format!("--{}", key.trim_start_matches('-').replace('_', "-"));
            match value {
                serde_yaml::Value::Null | serde_yaml::Value::Bool(false) => {}
                serde_yaml::Value::Bool(true) => argv.push(flag),
                serde_yaml::Value::Sequence(items) => {
                    argv.push(flag);
                    for item in items {
                        let s = scalar(item).ok_or_else(|| {
                            SegError::Config(format!("flag '{}' has a non-scalar list item", key))
                        })?;
                        argv.push(s);
                    }
                }
                other => {
                    let s = scalar(other)
                        .ok_or_else(|| SegError::Config(format!("flag '{}' has an unsupported value", key)))?;
                    argv.push(flag);
                    argv.push(s);
                }
            }
        }
        Ok(argv)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> SegmentConfigBuilder {
        SegmentConfig::builder("/data/wings")
    }

    #[test]
    fn test_defaults() {
        let cfg = base().build().unwrap();
        assert_eq!(cfg.params.num_workers, 1);
        assert_eq!(cfg.params.size, None);
        assert_eq!(cfg.params.interpolation, None);
        assert_eq!(cfg.params.background_color, None);
        assert_eq!(cfg.placement, OutputPlacement::Default);
        assert!(cfg.resize_spec().is_none());
    }

    #[test]
    fn test_square_size_and_defaults() {
        let cfg = base()
            .size(Some(vec![256]))
            .resize_mode(Some(ResizeMode::Pad))
            .build()
            .unwrap();
        assert_eq!(cfg.params.size, Some(TargetSize { width: 256, height: 256 }));
        assert_eq!(cfg.params.padding_color, Some(FillColor::Black));
        assert_eq!(cfg.params.interpolation, Some(Interpolation::Area));
        assert!(cfg.resize_spec().is_some());
    }

    #[test]
    fn test_size_validation() {
        assert!(base().size(Some(vec![1, 2, 3])).resize_mode(Some(ResizeMode::Distort)).build().is_err());
        assert!(base().size(Some(vec![])).resize_mode(Some(ResizeMode::Distort)).build().is_err());
        assert!(base().size(Some(vec![0, 5])).resize_mode(Some(ResizeMode::Distort)).build().is_err());
        assert!(base().size(Some(vec![64])).build().is_err());
        assert!(base().resize_mode(Some(ResizeMode::Pad)).build().is_err());
        assert!(base().padding_color(Some(FillColor::White)).build().is_err());
    }

    #[test]
    fn test_distort_drops_padding_color() {
        let cfg = base()
            .size(Some(vec![10, 20]))
            .resize_mode(Some(ResizeMode::Distort))
            .padding_color(Some(FillColor::White))
            .build()
            .unwrap();
        assert_eq!(cfg.params.padding_color, None);
    }

    #[test]
    fn test_background_flags() {
        assert!(base().remove_crops_background(true).build().is_err());
        assert!(base().background_color(Some(FillColor::White)).build().is_err());

        let cfg = base().remove_full_background(true).build().unwrap();
        assert_eq!(cfg.params.background_color, Some(FillColor::Black));

        let cfg = base()
            .crop_by_class(true)
            .remove_crops_background(true)
            .background_color(Some(FillColor::White))
            .build()
            .unwrap();
        assert_eq!(cfg.background_color(), FillColor::White);
    }

    #[test]
    fn test_output_dirs_exclusive() {
        let err = base()
            .custom_output_dir(Some("/a".into()))
            .outputs_base_dir(Some("/b".into()))
            .build()
            .unwrap_err();
        assert!(matches!(err, SegError::Validation(_)));

        let cfg = base().outputs_base_dir(Some("/b".into())).build().unwrap();
        assert_eq!(cfg.placement, OutputPlacement::Base("/b".into()));
    }

    #[test]
    fn test_bbox_padding_and_workers() {
        assert!(base().bbox_padding(Some(-1)).build().is_err());
        assert_eq!(base().bbox_padding(Some(4)).build().unwrap().params.bbox_padding, 4);
        assert!(base().num_workers(0).build().is_err());
    }

    #[test]
    fn test_run_file_to_argv() {
        let yaml = r#"
command: segment
flags:
  dataset: /data/wings
  size: [256, 128]
  resize_mode: pad
  crop-by-class: true
  force: false
  background-color: null
"#;
        let rf: RunFile = serde_yaml::from_str(yaml).unwrap();
        let argv = rf.to_argv().unwrap();
        assert_eq!(
            argv,
            vec![
                "wingseg",
                "segment",
                "--crop-by-class",
                "--dataset",
                "/data/wings",
                "--resize-mode",
                "pad",
                "--size",
                "256",
                "128",
            ]
        );
    }

    #[test]
    fn test_run_file_unknown_command() {
        let rf: RunFile = serde_yaml::from_str("command: resize_images_flat_dir\n").unwrap();
        assert!(matches!(rf.to_argv(), Err(SegError::Config(_))));
    }
}
