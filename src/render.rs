//! Frame loop driving the host application
//!
//! The host owns scene loading, rendering and segmentation. It is reached
//! through [`RenderBackend`]; this module replays the camera trajectory and
//! hands every rendered frame to the [`CocoWriter`].

use image::{ImageBuffer, Luma, RgbImage};
use log::{info, warn};
use nalgebra as na;
use std::path::{Path, PathBuf};

use crate::camera::{Intrinsics, Trajectory, TRAJECTORY_FRAMES};
use crate::coco::{CocoWriter, WriterOptions, WrittenFrame};
use crate::config::RenderConfig;
use crate::error::Result;
use crate::scene::{assign_categories, ObjectKind, SceneObject};
use crate::utils::{create_progress_bar, ensure_output_directory};

/// Per-pixel instance index, 0 is background
pub type InstanceSegmap = ImageBuffer<Luma<u16>, Vec<u16>>;

/// Attributes of one instance index in the segmentation map
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct InstanceAttribute {
    pub idx: u32,
    #[serde(default)]
    pub category_id: Option<u32>,
    pub name: String,
}

/// Color image and instance segmentation of one rendered frame
#[derive(Debug, Clone)]
pub struct RenderedFrame {
    pub colors: RgbImage,
    pub instance_segmap: InstanceSegmap,
    pub instance_attributes: Vec<InstanceAttribute>,
}

/// Operations the host application has to provide
pub trait RenderBackend {
    fn open_scene(&mut self, scene: &Path) -> Result<()>;

    /// Jump to `frame` and return the camera's world matrix
    fn camera_pose_at(&mut self, frame: u32) -> Result<na::Matrix4<f64>>;

    fn set_intrinsics(&mut self, intrinsics: &Intrinsics, width: u32, height: u32) -> Result<()>;

    /// Load the objects of the given kinds from the scene file
    fn load_objects(&mut self, scene: &Path, kinds: &[ObjectKind]) -> Result<Vec<SceneObject>>;

    fn set_category(&mut self, object_name: &str, category_id: u32) -> Result<()>;

    fn reset_keyframes(&mut self) -> Result<()>;

    fn add_camera_pose(&mut self, pose: &na::Matrix4<f64>) -> Result<()>;

    /// Render color and the instance segmentation map for the current camera pose
    fn render(&mut self) -> Result<RenderedFrame>;
}

#[derive(Debug, Clone)]
pub struct RenderSummary {
    pub dataset_dir: PathBuf,
    pub frames_rendered: usize,
    pub annotations_written: usize,
    pub image_ids: Option<(u64, u64)>,
}

impl RenderSummary {
    pub fn new(dataset_dir: PathBuf) -> Self {
        Self {
            dataset_dir,
            frames_rendered: 0,
            annotations_written: 0,
            image_ids: None,
        }
    }

    fn record(&mut self, written: &WrittenFrame) {
        self.frames_rendered += 1;
        self.annotations_written += written.annotations;
        self.image_ids = Some(match self.image_ids {
            None => (written.image_id, written.image_id),
            Some((first, _)) => (first, written.image_id),
        });
    }

    pub fn print_summary(&self) {
        info!("=== Render Summary ===");
        info!("Dataset directory: {}", self.dataset_dir.display());
        info!("Frames rendered: {}", self.frames_rendered);
        info!("Annotations written: {}", self.annotations_written);
        if let Some((first, last)) = self.image_ids {
            info!("Image ids: {}..={}", first, last);
        }
        if self.frames_rendered > 0 && self.annotations_written == 0 {
            warn!("No annotated object was visible in any frame");
        }
    }
}

/// Render `config.frames` frames along the scene's camera path into a COCO dataset
pub fn run_render<B: RenderBackend + ?Sized>(
    config: &RenderConfig,
    backend: &mut B,
) -> Result<RenderSummary> {
    info!("Opening scene {}", config.scene.display());
    backend.open_scene(&config.scene)?;
    let trajectory = Trajectory::sample(&mut *backend, TRAJECTORY_FRAMES)?;
    info!("Sampled {} camera poses", trajectory.len());

    backend.set_intrinsics(
        &Intrinsics::calibrated(),
        config.resolution_x,
        config.resolution_y,
    )?;

    let mut objects =
        backend.load_objects(&config.scene, &[ObjectKind::Mesh, ObjectKind::Camera])?;
    for obj in &objects {
        info!("Loaded {:?} {}", obj.kind, obj.name);
    }
    let tagged = assign_categories(&mut objects, &config.category_prefix, config.category_id);
    for name in &tagged {
        backend.set_category(name, config.category_id)?;
    }
    if tagged.is_empty() {
        warn!(
            "No object name starts with {:?}, frames will carry no annotations",
            config.category_prefix
        );
    }

    trajectory.check_frames(config.frames)?;

    let dataset_dir = ensure_output_directory(&config.dataset_dir())?;
    let mut writer = CocoWriter::open(
        &dataset_dir,
        WriterOptions {
            color_format: config.color_format,
            jpg_quality: config.jpg_quality,
            write_mode: config.write_mode,
        },
    )?;

    let mut summary = RenderSummary::new(dataset_dir);
    let pb = create_progress_bar(config.frames as u64, "Render");
    for frame in 0..config.frames {
        backend.reset_keyframes()?;
        backend.add_camera_pose(&trajectory.pose(frame)?.to_matrix())?;
        let rendered = backend.render()?;
        let written = writer.write_frame(&rendered)?;
        summary.record(&written);
        pb.inc(1);
    }
    pb.finish_with_message("Rendering complete");

    Ok(summary)
}
