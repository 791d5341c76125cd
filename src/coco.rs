//! COCO format data structures and the dataset writer
//!
//! Rendered frames are stored as `images/NNNNNN.<ext>` next to a single
//! `coco_annotations.json`. Every annotation carries the frame width and height,
//! which is what the label converter divides by.

use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, RgbImage};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::config::{ColorFormat, WriteMode};
use crate::error::{Error, Result};
use crate::render::RenderedFrame;
use crate::utils::{ensure_output_directory, read_json, recreate_output_directory};

pub const COCO_FILE_NAME: &str = "coco_annotations.json";
pub const IMAGES_DIR_NAME: &str = "images";
pub const SUPERCATEGORY: &str = "coco_annotations";

/// COCO dataset information
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Info {
    pub description: String,
    pub url: String,
    pub version: String,
    pub year: i32,
    pub contributor: String,
    pub date_created: String,
}

impl Default for Info {
    fn default() -> Self {
        let now = chrono::Utc::now();
        Self {
            description: SUPERCATEGORY.to_string(),
            url: String::new(),
            version: "0.1.0".to_string(),
            year: chrono::Datelike::year(&now),
            contributor: "Unknown".to_string(),
            date_created: now.format("%Y-%m-%d %H:%M:%S").to_string(),
        }
    }
}

/// COCO license information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct License {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub url: String,
}

impl Default for License {
    fn default() -> Self {
        Self {
            id: 1,
            name: "Attribution-NonCommercial-ShareAlike License".to_string(),
            url: "http://creativecommons.org/licenses/by-nc-sa/2.0/".to_string(),
        }
    }
}

/// COCO category information
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Category {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub supercategory: String,
}

/// COCO image information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Image {
    pub id: u64,
    pub file_name: String,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub license: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_captured: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coco_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flickr_url: Option<String>,
}

impl Image {
    pub fn new(id: u64, file_name: String, width: u32, height: u32) -> Self {
        Self {
            id,
            file_name,
            width,
            height,
            license: 1,
            date_captured: Some(chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()),
            coco_url: None,
            flickr_url: None,
        }
    }
}

/// Uncompressed run-length encoding, counted column by column from a background run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rle {
    pub counts: Vec<u32>,
    /// `[height, width]`
    pub size: [u32; 2],
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum Segmentation {
    Rle(Rle),
    CompressedRle { counts: String, size: [u32; 2] },
    Polygon(Vec<Vec<f64>>),
}

/// COCO annotation information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    pub id: u64,
    pub image_id: u64,
    pub category_id: u32,
    #[serde(default)]
    pub iscrowd: u32,
    pub area: f64,
    pub bbox: [f64; 4], // [x, y, width, height]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segmentation: Option<Segmentation>,
    pub width: u32,
    pub height: u32,
}

/// Complete COCO dataset structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CocoFile {
    #[serde(default)]
    pub info: Info,
    #[serde(default)]
    pub licenses: Vec<License>,
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub images: Vec<Image>,
    #[serde(default)]
    pub annotations: Vec<Annotation>,
}

impl Default for CocoFile {
    fn default() -> Self {
        Self {
            info: Info::default(),
            licenses: vec![License::default()],
            categories: Vec::new(),
            images: Vec::new(),
            annotations: Vec::new(),
        }
    }
}

/// Settings for the COCO writer
#[derive(Debug, Clone, Copy)]
pub struct WriterOptions {
    pub color_format: ColorFormat,
    pub jpg_quality: u8,
    pub write_mode: WriteMode,
}

impl Default for WriterOptions {
    fn default() -> Self {
        Self {
            color_format: ColorFormat::Jpeg,
            jpg_quality: 95,
            write_mode: WriteMode::Append,
        }
    }
}

/// What one call to [`CocoWriter::write_frame`] produced
#[derive(Debug, Clone)]
pub struct WrittenFrame {
    pub image_id: u64,
    pub file_name: String,
    pub annotations: usize,
}

/// Writer for a COCO dataset directory, flushed after every frame
pub struct CocoWriter {
    dataset_dir: PathBuf,
    options: WriterOptions,
    coco: CocoFile,
    next_image_id: u64,
    next_annotation_id: u64,
}

impl CocoWriter {
    /// Open the dataset directory, honouring the write mode for an existing COCO file
    pub fn open(dataset_dir: &Path, options: WriterOptions) -> Result<Self> {
        let coco_path = dataset_dir.join(COCO_FILE_NAME);
        let images_dir = dataset_dir.join(IMAGES_DIR_NAME);

        let coco = match options.write_mode {
            WriteMode::Append if coco_path.exists() => {
                let existing: CocoFile = read_json(&coco_path)?;
                info!(
                    "Appending to {} ({} images, {} annotations)",
                    coco_path.display(),
                    existing.images.len(),
                    existing.annotations.len()
                );
                existing
            }
            WriteMode::Reject if coco_path.exists() => {
                return Err(Error::AlreadyExists { path: coco_path });
            }
            WriteMode::Reject
                if images_dir.is_dir() && fs::read_dir(&images_dir)?.next().is_some() =>
            {
                return Err(Error::AlreadyExists { path: images_dir });
            }
            WriteMode::Overwrite => {
                recreate_output_directory(&images_dir)?;
                CocoFile::default()
            }
            _ => CocoFile::default(),
        };

        let next_image_id = coco.images.iter().map(|i| i.id + 1).max().unwrap_or(0);
        let next_annotation_id = coco
            .annotations
            .iter()
            .map(|a| a.id + 1)
            .max()
            .unwrap_or(1);

        let writer = Self {
            dataset_dir: dataset_dir.to_path_buf(),
            options,
            coco,
            next_image_id,
            next_annotation_id,
        };
        // The old COCO file must not outlive the images it names
        if options.write_mode == WriteMode::Overwrite {
            writer.flush()?;
        }
        Ok(writer)
    }

    pub fn coco(&self) -> &CocoFile {
        &self.coco
    }

    pub fn coco_path(&self) -> PathBuf {
        self.dataset_dir.join(COCO_FILE_NAME)
    }

    /// Store the color image and one annotation per categorized instance of the frame
    pub fn write_frame(&mut self, frame: &RenderedFrame) -> Result<WrittenFrame> {
        let (width, height) = frame.colors.dimensions();
        if frame.instance_segmap.dimensions() != (width, height) {
            let (seg_w, seg_h) = frame.instance_segmap.dimensions();
            return Err(Error::Host(format!(
                "segmentation map is {}x{} but the color image is {}x{}",
                seg_w, seg_h, width, height
            )));
        }

        ensure_output_directory(&self.dataset_dir.join(IMAGES_DIR_NAME))?;

        let image_id = self.next_image_id;
        let file_name = format!(
            "{}/{:06}.{}",
            IMAGES_DIR_NAME,
            image_id,
            self.options.color_format.extension()
        );
        self.save_color(&frame.colors, &self.dataset_dir.join(&file_name))?;
        self.coco
            .images
            .push(Image::new(image_id, file_name.clone(), width, height));
        self.next_image_id += 1;

        let mut annotations = 0;
        for attribute in &frame.instance_attributes {
            // Instances without a category are background
            let Some(category_id) = attribute.category_id else {
                continue;
            };

            let mask: Vec<bool> = frame
                .instance_segmap
                .pixels()
                .map(|p| u32::from(p.0[0]) == attribute.idx)
                .collect();
            let Some(bbox) = mask_bbox(&mask, width, height) else {
                debug!("Instance {} is not visible in image {}", attribute.name, image_id);
                continue;
            };
            let area = mask.iter().filter(|&&v| v).count() as f64;

            self.ensure_category(category_id, &attribute.name);
            self.coco.annotations.push(Annotation {
                id: self.next_annotation_id,
                image_id,
                category_id,
                iscrowd: 0,
                area,
                bbox,
                segmentation: Some(Segmentation::Rle(binary_mask_to_rle(&mask, width, height))),
                width,
                height,
            });
            self.next_annotation_id += 1;
            annotations += 1;
        }

        self.flush()?;

        Ok(WrittenFrame {
            image_id,
            file_name,
            annotations,
        })
    }

    fn ensure_category(&mut self, id: u32, name: &str) {
        if !self.coco.categories.iter().any(|c| c.id == id) {
            self.coco.categories.push(Category {
                id,
                name: name.to_string(),
                supercategory: SUPERCATEGORY.to_string(),
            });
            self.coco.categories.sort_by_key(|c| c.id);
        }
    }

    fn save_color(&self, colors: &RgbImage, path: &Path) -> Result<()> {
        match self.options.color_format {
            ColorFormat::Jpeg => {
                let mut writer = BufWriter::new(File::create(path)?);
                JpegEncoder::new_with_quality(&mut writer, self.options.jpg_quality)
                    .encode_image(colors)?;
                writer.flush()?;
            }
            ColorFormat::Png => colors.save_with_format(path, ImageFormat::Png)?,
        }
        Ok(())
    }

    /// Rewrite the COCO file with everything collected so far
    pub fn flush(&self) -> Result<()> {
        let mut writer = BufWriter::new(File::create(self.coco_path())?);
        serde_json::to_writer(&mut writer, &self.coco)?;
        writer.flush()?;
        Ok(())
    }
}

/// Encode a row-major binary mask as column-major uncompressed RLE
pub fn binary_mask_to_rle(mask: &[bool], width: u32, height: u32) -> Rle {
    let (w, h) = (width as usize, height as usize);
    let mut counts = Vec::new();
    let mut current = false;
    let mut run = 0u32;

    for x in 0..w {
        for y in 0..h {
            let value = mask[y * w + x];
            if value != current {
                counts.push(run);
                run = 0;
                current = value;
            }
            run += 1;
        }
    }
    counts.push(run);

    Rle {
        counts,
        size: [height, width],
    }
}

/// Bounding box `[x, y, width, height]` of the set pixels, inclusive of both edges
pub fn mask_bbox(mask: &[bool], width: u32, height: u32) -> Option<[f64; 4]> {
    let w = width as usize;
    let mut bounds: Option<(usize, usize, usize, usize)> = None;

    for (i, _) in mask
        .iter()
        .take(w * height as usize)
        .enumerate()
        .filter(|(_, v)| **v)
    {
        let (x, y) = (i % w, i / w);
        bounds = Some(match bounds {
            None => (x, y, x, y),
            Some((x_min, y_min, x_max, y_max)) => {
                (x_min.min(x), y_min.min(y), x_max.max(x), y_max.max(y))
            }
        });
    }

    bounds.map(|(x_min, y_min, x_max, y_max)| {
        [
            x_min as f64,
            y_min as f64,
            (x_max - x_min + 1) as f64,
            (y_max - y_min + 1) as f64,
        ]
    })
}
