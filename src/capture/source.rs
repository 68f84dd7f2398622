use anyhow::Result;
use image::RgbImage;

use crate::capture::CaptureError;
use crate::capture::ffmpeg::{FfmpegOpener, FfmpegSource};
#[cfg(feature = "opencv")]
use crate::capture::opencv::{OpenCvOpener, OpenCvSource};
use crate::config::{VideoBackend, VideoConfig};
use crate::resolver::StreamUrl;

/// 已打开的视频流
///
/// 持有的资源(进程、解码句柄)在 drop 时释放
pub trait VideoSource {
    /// 读取下一帧, `Ok(None)` 表示没有可解码的帧
    fn read_frame(&mut self) -> impl Future<Output = Result<Option<RgbImage>, CaptureError>>;
}

/// 将视频流 URL 打开为 [`VideoSource`]
pub trait VideoOpener {
    type Source: VideoSource;

    fn open(&self, url: &StreamUrl) -> impl Future<Output = Result<Self::Source, CaptureError>>;
}

/// 由 `video.backend` 选择的视频后端
pub enum Backend {
    Ffmpeg(FfmpegOpener),
    #[cfg(feature = "opencv")]
    OpenCv(OpenCvOpener),
}

pub enum BackendSource {
    Ffmpeg(FfmpegSource),
    #[cfg(feature = "opencv")]
    OpenCv(OpenCvSource),
}

impl Backend {
    pub fn from_config(config: &VideoConfig) -> Result<Self> {
        match config.backend {
            VideoBackend::Ffmpeg => Ok(Backend::Ffmpeg(FfmpegOpener::new(config))),
            #[cfg(feature = "opencv")]
            VideoBackend::Opencv => Ok(Backend::OpenCv(OpenCvOpener)),
            #[cfg(not(feature = "opencv"))]
            VideoBackend::Opencv => {
                anyhow::bail!("the opencv backend is not compiled in, rebuild with `--features opencv`")
            }
        }
    }
}

impl VideoOpener for Backend {
    type Source = BackendSource;

    async fn open(&self, url: &StreamUrl) -> Result<BackendSource, CaptureError> {
        match self {
            Backend::Ffmpeg(opener) => opener.open(url).await.map(BackendSource::Ffmpeg),
            #[cfg(feature = "opencv")]
            Backend::OpenCv(opener) => opener.open(url).await.map(BackendSource::OpenCv),
        }
    }
}

impl VideoSource for BackendSource {
    async fn read_frame(&mut self) -> Result<Option<RgbImage>, CaptureError> {
        match self {
            BackendSource::Ffmpeg(source) => source.read_frame().await,
            #[cfg(feature = "opencv")]
            BackendSource::OpenCv(source) => source.read_frame().await,
        }
    }
}
