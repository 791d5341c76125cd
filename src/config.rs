use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_LABELS_DIR: &str = "uuv/vision/data/labels";
pub const DEFAULT_IMAGES_ROOT: &str = "uuv/vision/data/images";
pub const DEFAULT_SCENE: &str = "uuv/Blender/Prompts/prueba1.blend";

/// Command-line arguments for converting COCO bounding boxes to YOLO label files.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct ConvertArgs {
    /// Path to the COCO json file
    #[arg(long = "p_json")]
    pub p_json: PathBuf,

    /// Directory receiving one label file per image
    #[arg(long = "output_dir", default_value = DEFAULT_LABELS_DIR)]
    pub output_dir: PathBuf,

    /// What to do with label files left over from earlier runs
    #[arg(long = "write_mode", value_enum, default_value = "append")]
    pub write_mode: WriteMode,

    /// Class id written in front of every box
    #[arg(long = "class_id", default_value_t = 0)]
    pub class_id: u32,
}

impl ConvertArgs {
    pub fn into_config(self) -> ConvertConfig {
        ConvertConfig {
            json_path: self.p_json,
            output_dir: self.output_dir,
            write_mode: self.write_mode,
            class_id: self.class_id,
        }
    }
}

/// Command-line arguments for rendering a synthetic dataset through the host application.
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct RenderArgs {
    /// Path to the scene file
    #[arg(long = "p_scene", default_value = DEFAULT_SCENE)]
    pub p_scene: PathBuf,

    /// Number of frames to render, at most the trajectory length
    #[arg(long = "v_frames")]
    pub v_frames: Option<usize>,

    /// Horizontal resolution in pixels
    #[arg(long = "v_resolution_x", default_value_t = 640)]
    pub v_resolution_x: u32,

    /// Vertical resolution in pixels
    #[arg(long = "v_resolution_y", default_value_t = 480)]
    pub v_resolution_y: u32,

    /// Name of the dataset folder
    #[arg(long = "v_dataset_name")]
    pub v_dataset_name: String,

    /// Directory holding one folder per dataset
    #[arg(long = "output_root", default_value = DEFAULT_IMAGES_ROOT)]
    pub output_root: PathBuf,

    /// Command starting the host application bridge
    #[arg(long = "host_cmd", default_value = "blenderproc run host_bridge.py")]
    pub host_cmd: String,

    /// Objects whose name starts with this prefix are annotated
    #[arg(long = "category_prefix", default_value = "Gun")]
    pub category_prefix: String,

    /// Category id given to the annotated objects
    #[arg(long = "category_id", default_value_t = 1)]
    pub category_id: u32,

    /// Image format of the rendered color frames
    #[arg(long = "color_format", value_enum, default_value = "jpeg")]
    pub color_format: ColorFormat,

    /// JPEG quality for the color frames
    #[arg(long = "jpg_quality", default_value_t = 95, value_parser = validate_quality)]
    pub jpg_quality: u8,

    /// What to do with annotations left over from earlier runs
    #[arg(long = "write_mode", value_enum, default_value = "append")]
    pub write_mode: WriteMode,
}

impl RenderArgs {
    pub fn into_config(self) -> RenderConfig {
        RenderConfig {
            scene: self.p_scene,
            frames: self.v_frames.unwrap_or(crate::camera::TRAJECTORY_FRAMES),
            resolution_x: self.v_resolution_x,
            resolution_y: self.v_resolution_y,
            dataset_name: self.v_dataset_name,
            output_root: self.output_root,
            category_prefix: self.category_prefix,
            category_id: self.category_id,
            color_format: self.color_format,
            jpg_quality: self.jpg_quality,
            write_mode: self.write_mode,
        }
    }
}

/// Settings for one COCO to YOLO conversion run.
#[derive(Debug, Clone)]
pub struct ConvertConfig {
    pub json_path: PathBuf,
    pub output_dir: PathBuf,
    pub write_mode: WriteMode,
    pub class_id: u32,
}

impl ConvertConfig {
    pub fn new(json_path: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            json_path: json_path.into(),
            output_dir: output_dir.into(),
            write_mode: WriteMode::Append,
            class_id: 0,
        }
    }
}

/// Settings for one render run.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    pub scene: PathBuf,
    pub frames: usize,
    pub resolution_x: u32,
    pub resolution_y: u32,
    pub dataset_name: String,
    pub output_root: PathBuf,
    pub category_prefix: String,
    pub category_id: u32,
    pub color_format: ColorFormat,
    pub jpg_quality: u8,
    pub write_mode: WriteMode,
}

impl RenderConfig {
    pub fn new(dataset_name: impl Into<String>, output_root: impl Into<PathBuf>) -> Self {
        Self {
            scene: PathBuf::from(DEFAULT_SCENE),
            frames: crate::camera::TRAJECTORY_FRAMES,
            resolution_x: 640,
            resolution_y: 480,
            dataset_name: dataset_name.into(),
            output_root: output_root.into(),
            category_prefix: "Gun".to_string(),
            category_id: 1,
            color_format: ColorFormat::Jpeg,
            jpg_quality: 95,
            write_mode: WriteMode::Append,
        }
    }

    /// Directory receiving the images and the COCO file of this dataset
    pub fn dataset_dir(&self) -> PathBuf {
        self.output_root.join(&self.dataset_name)
    }
}

/// Policy for output left behind by earlier runs
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Default)]
pub enum WriteMode {
    /// Keep existing output and add to it
    #[default]
    Append,
    /// Replace existing output
    Overwrite,
    /// Fail if output already exists
    Reject,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum, Debug, Default)]
pub enum ColorFormat {
    #[default]
    Jpeg,
    Png,
}

impl ColorFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ColorFormat::Jpeg => "jpg",
            ColorFormat::Png => "png",
        }
    }
}

// Validate that the quality is between 1 and 100
pub fn validate_quality(s: &str) -> Result<u8, String> {
    match u8::from_str(s) {
        Ok(val) if (1..=100).contains(&val) => Ok(val),
        _ => Err("QUALITY must be between 1 and 100".to_string()),
    }
}
