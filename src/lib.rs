//! Synthetic dataset tools for the UUV vision pipeline
//!
//! This library drives a 3D host application to render COCO-annotated frames
//! along a scene's camera path, and converts COCO bounding boxes to YOLO label files.

pub mod camera;
pub mod coco;
pub mod config;
pub mod conversion;
pub mod error;
pub mod host;
pub mod render;
pub mod scene;
pub mod utils;

// Re-export commonly used types and functions
pub use config::{ColorFormat, ConvertArgs, ConvertConfig, RenderArgs, RenderConfig, WriteMode};
pub use conversion::{convert_coco_file, ConversionSummary, YoloLabel};
pub use error::{Error, Result};
pub use render::{run_render, RenderBackend, RenderSummary, RenderedFrame};

// COCO-specific exports
pub use coco::{CocoFile, CocoWriter, WriterOptions};
