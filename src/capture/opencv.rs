use image::RgbImage;
use opencv::core::{CV_8UC3, Mat};
use opencv::prelude::*;
use opencv::{imgproc, videoio};
use tracing::warn;

use crate::capture::CaptureError;
use crate::capture::source::{VideoOpener, VideoSource};
use crate::resolver::StreamUrl;

/// 基于 OpenCV `VideoCapture` 打开视频流
#[derive(Debug, Clone, Copy)]
pub struct OpenCvOpener;

pub struct OpenCvSource {
    capture: videoio::VideoCapture,
}

impl VideoOpener for OpenCvOpener {
    type Source = OpenCvSource;

    async fn open(&self, url: &StreamUrl) -> Result<OpenCvSource, CaptureError> {
        let capture = videoio::VideoCapture::from_file(url.as_str(), videoio::CAP_ANY)
            .map_err(|e| CaptureError::StreamOpen(format!("{}: {}", url, e)))?;
        // 先包装, 打开失败时也会走 `release`
        let source = OpenCvSource { capture };

        let opened = source
            .capture
            .is_opened()
            .map_err(|e| CaptureError::StreamOpen(format!("{}: {}", url, e)))?;
        if !opened {
            return Err(CaptureError::StreamOpen(url.to_string()));
        }

        Ok(source)
    }
}

impl VideoSource for OpenCvSource {
    async fn read_frame(&mut self) -> Result<Option<RgbImage>, CaptureError> {
        let mut frame = Mat::default();
        let grabbed = self
            .capture
            .read(&mut frame)
            .map_err(|e| CaptureError::FrameDecode(e.to_string()))?;

        if !grabbed || frame.empty() {
            return Ok(None);
        }

        mat_to_rgb(&frame).map(Some)
    }
}

impl Drop for OpenCvSource {
    fn drop(&mut self) {
        if let Err(e) = self.capture.release() {
            warn!("Failed to release video capture: {}", e);
        }
    }
}

fn mat_to_rgb(frame: &Mat) -> Result<RgbImage, CaptureError> {
    if frame.typ() != CV_8UC3 {
        return Err(CaptureError::FrameDecode(format!(
            "unsupported frame type {}",
            frame.typ()
        )));
    }

    let mut rgb = Mat::default();
    imgproc::cvt_color_def(frame, &mut rgb, imgproc::COLOR_BGR2RGB)
        .map_err(|e| CaptureError::FrameDecode(e.to_string()))?;

    let size = rgb
        .size()
        .map_err(|e| CaptureError::FrameDecode(e.to_string()))?;
    let data = rgb
        .data_bytes()
        .map_err(|e| CaptureError::FrameDecode(e.to_string()))?
        .to_vec();

    RgbImage::from_raw(size.width as u32, size.height as u32, data)
        .ok_or_else(|| CaptureError::FrameDecode("frame buffer size mismatch".to_string()))
}
