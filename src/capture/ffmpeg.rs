use std::process::Stdio;
use std::time::Duration;

use image::{ImageFormat, RgbImage};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStdout, Command};
use tokio::time::timeout;
use tracing::debug;

use crate::capture::CaptureError;
use crate::capture::source::{VideoOpener, VideoSource};
use crate::config::VideoConfig;
use crate::resolver::StreamUrl;

/// 通过 `ffmpeg` 进程打开视频流
#[derive(Debug, Clone)]
pub struct FfmpegOpener {
    ffmpeg_path: String,
    timeout: Duration,
}

/// 正在把首帧以 PNG 写到 stdout 的 `ffmpeg` 进程
///
/// 一次截帧只建立这一个连接, drop 时进程会被杀掉
#[derive(Debug)]
pub struct FfmpegSource {
    url: StreamUrl,
    // 仅为持有进程句柄, drop 即释放
    _child: Child,
    stdout: BufReader<ChildStdout>,
    timeout: Duration,
}

impl FfmpegOpener {
    pub fn new(config: &VideoConfig) -> Self {
        Self {
            ffmpeg_path: config.ffmpeg_path.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    fn command(&self, url: &StreamUrl) -> Command {
        let mut command = Command::new(&self.ffmpeg_path);
        command
            .args(["-hide_banner", "-loglevel", "error", "-nostdin"])
            .args(["-i", url.as_str()])
            .args(["-an", "-sn"])
            .args(["-frames:v", "1"])
            .args(["-f", "image2pipe", "-vcodec", "png", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

impl VideoOpener for FfmpegOpener {
    type Source = FfmpegSource;

    async fn open(&self, url: &StreamUrl) -> Result<FfmpegSource, CaptureError> {
        let mut child = self.command(url).spawn().map_err(|e| {
            CaptureError::StreamOpen(format!("failed to spawn {}: {}", self.ffmpeg_path, e))
        })?;
        let stdout = child.stdout.take().ok_or_else(|| {
            CaptureError::StreamOpen(format!("{} has no stdout pipe", self.ffmpeg_path))
        })?;
        let mut stdout = BufReader::new(stdout);

        // 等到首批帧数据到达, 或进程在没有输出的情况下退出
        let has_output = match timeout(self.timeout, stdout.fill_buf()).await {
            Ok(Ok(buf)) => !buf.is_empty(),
            Ok(Err(e)) => {
                return Err(CaptureError::StreamOpen(format!(
                    "failed to read from {}: {}",
                    self.ffmpeg_path, e
                )));
            }
            Err(_) => {
                return Err(CaptureError::StreamOpen(format!(
                    "{} timed out after {}s on {}",
                    self.ffmpeg_path,
                    self.timeout.as_secs(),
                    url
                )));
            }
        };

        if !has_output {
            let reason = timeout(self.timeout, exit_reason(&mut child))
                .await
                .unwrap_or_else(|_| "no output".to_string());
            return Err(CaptureError::StreamOpen(format!("{} ({})", url, reason)));
        }

        debug!("ffmpeg is streaming a frame from {}", url);
        Ok(FfmpegSource {
            url: url.clone(),
            _child: child,
            stdout,
            timeout: self.timeout,
        })
    }
}

impl VideoSource for FfmpegSource {
    async fn read_frame(&mut self) -> Result<Option<RgbImage>, CaptureError> {
        let mut bytes = Vec::new();
        timeout(self.timeout, self.stdout.read_to_end(&mut bytes))
            .await
            .map_err(|_| {
                CaptureError::FrameDecode(format!(
                    "reading a frame from {} timed out after {}s",
                    self.url,
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| CaptureError::FrameDecode(format!("failed to read frame data: {}", e)))?;

        if bytes.is_empty() {
            debug!("ffmpeg has no more frames for {}", self.url);
            return Ok(None);
        }

        decode_png_frame(&bytes).map(Some)
    }
}

/// 已关闭 stdout 的进程的退出状态和 stderr
async fn exit_reason(child: &mut Child) -> String {
    let mut stderr = String::new();
    if let Some(mut pipe) = child.stderr.take() {
        let _ = pipe.read_to_string(&mut stderr).await;
    }

    match child.wait().await {
        Ok(status) => format!("{}: {}", status, stderr.trim()),
        Err(e) => format!("failed to wait for ffmpeg: {}", e),
    }
}

fn decode_png_frame(bytes: &[u8]) -> Result<RgbImage, CaptureError> {
    image::load_from_memory_with_format(bytes, ImageFormat::Png)
        .map(|image| image.to_rgb8())
        .map_err(|e| CaptureError::FrameDecode(format!("invalid frame data: {}", e)))
}
