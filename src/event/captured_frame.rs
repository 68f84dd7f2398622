use chrono::{DateTime, Local};
use image::RgbImage;

use crate::resolver::StreamUrl;

/// 从视频源解码出的一帧, 等待落盘
pub struct CapturedFrame {
    pub source: StreamUrl,
    pub image: RgbImage,
    pub captured_at: DateTime<Local>,
}

impl CapturedFrame {
    pub fn new(source: StreamUrl, image: RgbImage, captured_at: DateTime<Local>) -> Self {
        Self {
            source,
            image,
            captured_at,
        }
    }
}
