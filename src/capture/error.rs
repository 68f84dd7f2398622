use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("cannot open video stream: {0}")]
    StreamOpen(String),
    #[error("failed to capture a frame: {0}")]
    FrameDecode(String),
    #[error("failed to create directory {}: {source}", .path.display())]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        source: image::ImageError,
    },
}
