use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Datelike, Local, Timelike};
use image::ImageFormat;
use tracing::{debug, info};

use crate::capture::CaptureError;
use crate::config::TimestampMode;
use crate::event::CapturedFrame;

/// 按日期分区的本地帧存档
///
/// 路径为 `<root>/<year>/<month>/<day>/<day>-<month>-<year>.<hour>h.jpg`,
/// 同一小时内后保存的帧会覆盖之前的文件
#[derive(Debug, Clone)]
pub struct HistoryStore {
    root: PathBuf,
    mode: TimestampMode,
    startup: DateTime<Local>,
}

impl HistoryStore {
    pub fn new(root: impl Into<PathBuf>, mode: TimestampMode, startup: DateTime<Local>) -> Self {
        Self {
            root: root.into(),
            mode,
            startup,
        }
    }

    /// 创建启动日期对应的保存目录
    pub fn prepare(&self) -> Result<PathBuf, CaptureError> {
        let directory = self.save_directory(&self.startup);
        create_dir(&directory)?;
        info!("Saving frames to {}", directory.display());
        Ok(directory)
    }

    /// 下一帧命名所用的时间
    pub fn timestamp(&self) -> DateTime<Local> {
        match self.mode {
            TimestampMode::Startup => self.startup,
            TimestampMode::PerCapture => Local::now(),
        }
    }

    pub fn save_directory(&self, timestamp: &DateTime<Local>) -> PathBuf {
        self.root
            .join(timestamp.year().to_string())
            .join(timestamp.month().to_string())
            .join(timestamp.day().to_string())
    }

    pub fn file_name(timestamp: &DateTime<Local>) -> String {
        format!(
            "{}-{}-{}.{}h.jpg",
            timestamp.day(),
            timestamp.month(),
            timestamp.year(),
            timestamp.hour()
        )
    }

    pub fn frame_path(&self, timestamp: &DateTime<Local>) -> PathBuf {
        self.save_directory(timestamp)
            .join(Self::file_name(timestamp))
    }

    /// 以 JPEG 写入一帧, 同名文件直接覆盖
    pub fn save(&self, frame: &CapturedFrame) -> Result<PathBuf, CaptureError> {
        let timestamp = self.timestamp();
        let path = self.frame_path(&timestamp);

        // 启动目录已存在, 跨天后需要新建
        if self.mode == TimestampMode::PerCapture {
            create_dir(&self.save_directory(&timestamp))?;
        }

        frame
            .image
            .save_with_format(&path, ImageFormat::Jpeg)
            .map_err(|source| CaptureError::Write {
                path: path.clone(),
                source,
            })?;

        debug!(
            "Wrote frame from {} captured at {} to {}",
            frame.source,
            frame.captured_at.format("%Y-%m-%d %H:%M:%S"),
            path.display()
        );
        Ok(path)
    }
}

fn create_dir(directory: &Path) -> Result<(), CaptureError> {
    fs::create_dir_all(directory).map_err(|source| CaptureError::CreateDir {
        path: directory.to_path_buf(),
        source,
    })
}
