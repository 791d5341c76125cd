use indicatif::ProgressBar;
use log::{info, warn};
use rayon::prelude::*;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::{ConvertConfig, WriteMode};
use crate::error::{Error, Result};
use crate::utils::{create_progress_bar, ensure_output_directory, read_json};

/// The part of a COCO file the converter needs
#[derive(Debug, Clone, Deserialize)]
pub struct LabelSource {
    pub annotations: Vec<SourceAnnotation>,
}

/// One COCO annotation, reduced to its box and the size of its image
#[derive(Debug, Clone, Deserialize)]
pub struct SourceAnnotation {
    pub image_id: u64,
    /// `[left, top, width, height]` in pixels
    pub bbox: [f64; 4],
    pub width: f64,
    pub height: f64,
}

impl SourceAnnotation {
    /// Normalize this annotation; `index` is its position in the file
    pub fn to_yolo(&self, index: usize, class_id: u32) -> Result<YoloLabel> {
        let dimension = if self.width == 0.0 {
            Some("width")
        } else if self.height == 0.0 {
            Some("height")
        } else {
            None
        };
        if let Some(dimension) = dimension {
            return Err(Error::ZeroDimension {
                index,
                image_id: self.image_id,
                dimension,
            });
        }

        let [x_center, y_center, width, height] =
            normalize_bbox(&self.bbox, self.width, self.height);
        Ok(YoloLabel {
            class_id,
            x_center,
            y_center,
            width,
            height,
        })
    }
}

/// A box in normalized center-xywh form
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YoloLabel {
    pub class_id: u32,
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
}

impl YoloLabel {
    /// `"<class> <cx> <cy> <w> <h>"` without the trailing newline
    pub fn to_line(&self) -> String {
        format!(
            "{} {} {} {} {}",
            self.class_id,
            format_value(self.x_center),
            format_value(self.y_center),
            format_value(self.width),
            format_value(self.height)
        )
    }
}

/// Convert an absolute `[left, top, width, height]` box to center-xywh over the
/// image size, rounded to 4 decimals. The image size must be nonzero.
pub fn normalize_bbox(bbox: &[f64; 4], width: f64, height: f64) -> [f64; 4] {
    [
        round4(bbox[0] / width + (bbox[2] / 2.0) / width),
        round4(bbox[1] / height + (bbox[3] / 2.0) / height),
        round4(bbox[2] / width),
        round4(bbox[3] / height),
    ]
}

/// Round to 4 decimals on the exact binary value, ties to even
pub fn round4(value: f64) -> f64 {
    format!("{:.4}", value).parse().unwrap_or(value)
}

// Shortest form that reads back to the same value, keeping ".0" on integral values
fn format_value(value: f64) -> String {
    let s = value.to_string();
    if s.contains('.') || !value.is_finite() {
        s
    } else {
        format!("{}.0", s)
    }
}

/// Label file name for an image id, zero-padded to 6 digits
pub fn label_file_name(image_id: u64) -> String {
    format!("{:06}.txt", image_id)
}

/// Normalize every annotation and group the lines by image, keeping file order per image
pub fn convert_annotations(
    annotations: &[SourceAnnotation],
    class_id: u32,
) -> Result<BTreeMap<u64, Vec<String>>> {
    let mut groups: BTreeMap<u64, Vec<String>> = BTreeMap::new();
    for (index, annotation) in annotations.iter().enumerate() {
        let label = annotation.to_yolo(index, class_id)?;
        groups
            .entry(annotation.image_id)
            .or_default()
            .push(label.to_line());
    }
    Ok(groups)
}

/// Write one label file per image. Each file is written by a single task.
pub fn write_label_files(
    labels_dir: &Path,
    groups: &BTreeMap<u64, Vec<String>>,
    mode: WriteMode,
    pb: &ProgressBar,
) -> Result<()> {
    if mode == WriteMode::Reject {
        if let Some(path) = groups
            .keys()
            .map(|id| labels_dir.join(label_file_name(*id)))
            .find(|path| path.exists())
        {
            return Err(Error::AlreadyExists { path });
        }
    }

    groups.par_iter().try_for_each(|(image_id, lines)| {
        let path = labels_dir.join(label_file_name(*image_id));
        let file = open_label_file(&path, mode).map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => Error::AlreadyExists { path: path.clone() },
            _ => Error::Io(e),
        })?;

        let mut writer = BufWriter::new(file);
        for line in lines {
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
            pb.inc(1);
        }
        writer.flush()?;
        Ok(())
    })
}

fn open_label_file(path: &Path, mode: WriteMode) -> io::Result<File> {
    let mut options = OpenOptions::new();
    match mode {
        WriteMode::Append => options.create(true).append(true),
        WriteMode::Overwrite => options.create(true).write(true).truncate(true),
        WriteMode::Reject => options.create_new(true).write(true),
    };
    options.open(path)
}

#[derive(Debug, Clone)]
pub struct ConversionSummary {
    pub json_path: PathBuf,
    pub output_dir: PathBuf,
    pub annotations: usize,
    pub label_files: usize,
    pub write_mode: WriteMode,
}

impl ConversionSummary {
    pub fn print_summary(&self) {
        info!("=== Conversion Summary ===");
        info!("Source: {}", self.json_path.display());
        info!("Label directory: {}", self.output_dir.display());
        info!("Annotations converted: {}", self.annotations);
        info!("Label files written: {}", self.label_files);
        if self.annotations == 0 {
            warn!("The source file holds no annotations");
        }
        if self.write_mode == WriteMode::Append {
            info!("Lines were appended; rerunning on the same file duplicates them.");
        }
    }
}

/// Convert one COCO file into YOLO label files
pub fn convert_coco_file(config: &ConvertConfig) -> Result<ConversionSummary> {
    let source: LabelSource = read_json(&config.json_path)?;
    info!(
        "Read {} annotations from {}",
        source.annotations.len(),
        config.json_path.display()
    );

    let groups = convert_annotations(&source.annotations, config.class_id)?;
    let output_dir = ensure_output_directory(&config.output_dir)?;

    let pb = create_progress_bar(
        source.annotations.len() as u64,
        &format!("File being processed: {}", config.json_path.display()),
    );
    write_label_files(&output_dir, &groups, config.write_mode, &pb)?;
    pb.finish_with_message("Conversion complete");

    Ok(ConversionSummary {
        json_path: config.json_path.clone(),
        output_dir,
        annotations: source.annotations.len(),
        label_files: groups.len(),
        write_mode: config.write_mode,
    })
}
