use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while rendering datasets or converting their annotations.
#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error("annotation {index} (image {image_id}) has zero image {dimension}")]
    ZeroDimension {
        index: usize,
        image_id: u64,
        dimension: &'static str,
    },

    #[error("frame {frame} is out of range, the trajectory has {available} poses")]
    FrameOutOfRange { frame: usize, available: usize },

    #[error("{} already exists", path.display())]
    AlreadyExists { path: PathBuf },

    #[error("invalid intrinsics: {0}")]
    InvalidIntrinsics(String),

    #[error("host application: {0}")]
    Host(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
