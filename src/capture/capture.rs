use std::path::PathBuf;

use chrono::Local;
use tracing::{error, info};

use crate::capture::CaptureError;
use crate::capture::source::{VideoOpener, VideoSource};
use crate::event::CapturedFrame;
use crate::resolver::StreamUrl;
use crate::storage::HistoryStore;

/// 从视频流截取一帧并存入历史目录
pub struct FrameCapturer<O> {
    opener: O,
    store: HistoryStore,
}

impl<O: VideoOpener> FrameCapturer<O> {
    pub fn new(opener: O, store: HistoryStore) -> Self {
        Self { opener, store }
    }

    /// 截取一帧并记录结果, 返回写入的路径
    pub async fn capture_one_frame(&self, url: &StreamUrl) -> Option<PathBuf> {
        match self.try_capture(url).await {
            Ok(path) => {
                let file_name = path
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default();
                info!("Frame saved as {}", file_name);
                Some(path)
            }
            Err(e @ CaptureError::StreamOpen(_)) => {
                error!("Error: {}", e);
                None
            }
            Err(e) => {
                error!("Failed to capture frame from {}: {}", url, e);
                None
            }
        }
    }

    /// 打开视频流, 只读取一帧并保存
    ///
    /// 任何返回路径上视频源都会被释放
    pub async fn try_capture(&self, url: &StreamUrl) -> Result<PathBuf, CaptureError> {
        let mut source = self.opener.open(url).await?;

        let image = source.read_frame().await?.ok_or_else(|| {
            CaptureError::FrameDecode(format!("no frame could be decoded from {}", url))
        })?;
        drop(source);

        let frame = CapturedFrame::new(url.clone(), image, Local::now());
        self.store.save(&frame)
    }
}
