//! 单元测试共用的夹具

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use chrono::{DateTime, Local, TimeZone};
use image::RgbImage;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::capture::{CaptureError, VideoOpener, VideoSource};
use crate::config::Config;
use crate::resolver::StreamUrl;

/// 指向 `base_url` 的短超时配置
pub fn test_config(base_url: &str) -> Config {
    let mut config = Config::default();
    config.camera.base_url = base_url.to_string();
    config.camera.request_timeout_secs = 5;
    config.poll.interval_secs = 1;
    config.poll.max_interval_secs = 8;
    config
}

pub fn local_time(year: i32, month: u32, day: u32, hour: u32) -> DateTime<Local> {
    Local
        .with_ymd_and_hms(year, month, day, hour, 5, 0)
        .earliest()
        .unwrap()
}

/// 系统临时目录下的全新空目录, guard drop 时整个目录被删除
pub fn temp_dir(name: &str) -> TempDir {
    tempfile::Builder::new()
        .prefix(&format!("stream-snapshot-{}-", name))
        .tempdir()
        .unwrap()
}

/// 没有任何服务监听的地址
pub async fn unreachable_base_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

/// 进程内的 `/load.jsp` 模拟接口, 返回固定状态码和响应体
pub struct MockEndpoint {
    pub base_url: String,
    hits: Arc<AtomicUsize>,
    server: JoinHandle<()>,
}

impl MockEndpoint {
    pub async fn start(status: u16, body: &str) -> Self {
        let status = StatusCode::from_u16(status).unwrap();
        let body = body.to_string();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        let app = Router::new().route(
            "/load.jsp",
            get(move || {
                let counter = counter.clone();
                let body = body.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    (status, body)
                }
            }),
        );

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{}", addr),
            hits,
            server,
        }
    }

    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

impl Drop for MockEndpoint {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// 返回预置帧并统计句柄打开/释放次数的模拟视频源
#[derive(Clone)]
pub struct MockOpener {
    frame: Option<RgbImage>,
    fail_open: bool,
    opens: Arc<AtomicUsize>,
    releases: Arc<AtomicUsize>,
}

pub struct MockSource {
    frame: Option<RgbImage>,
    releases: Arc<AtomicUsize>,
}

impl MockOpener {
    fn new(frame: Option<RgbImage>, fail_open: bool) -> Self {
        Self {
            frame,
            fail_open,
            opens: Arc::new(AtomicUsize::new(0)),
            releases: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_frame(frame: RgbImage) -> Self {
        Self::new(Some(frame), false)
    }

    pub fn without_frame() -> Self {
        Self::new(None, false)
    }

    pub fn failing_open() -> Self {
        Self::new(None, true)
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }
}

impl VideoOpener for MockOpener {
    type Source = MockSource;

    async fn open(&self, url: &StreamUrl) -> Result<MockSource, CaptureError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let source = MockSource {
            frame: self.frame.clone(),
            releases: self.releases.clone(),
        };
        if self.fail_open {
            return Err(CaptureError::StreamOpen(url.to_string()));
        }
        Ok(source)
    }
}

impl VideoSource for MockSource {
    async fn read_frame(&mut self) -> Result<Option<RgbImage>, CaptureError> {
        Ok(self.frame.take())
    }
}

impl Drop for MockSource {
    fn drop(&mut self) {
        self.releases.fetch_add(1, Ordering::SeqCst);
    }
}
