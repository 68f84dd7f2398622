use std::fmt;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Config;

/// 未能取得视频流地址的原因
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("network failure: {0}")]
    Network(#[from] reqwest::Error),
    #[error("unexpected status code {0}")]
    BadStatus(StatusCode),
    #[error("malformed JSON body: {0}")]
    MalformedJson(#[from] serde_json::Error),
    #[error("response has no `videoname`")]
    MissingField,
}

/// `load.jsp` 的响应体
#[derive(Debug, Clone, Deserialize)]
pub struct VideoUrlInfo {
    #[serde(default)]
    pub videoname: Option<String>,
}

/// 摄像头当前视频流的完整地址
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamUrl(String);

impl StreamUrl {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 向摄像头接口查询当前的视频流
pub struct StreamResolver {
    http: Client,
    base_url: String,
    load_url: String,
}

impl StreamResolver {
    pub fn new(config: &Config) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.camera.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url().to_string(),
            load_url: config.load_url(),
        })
    }

    pub fn load_url(&self) -> &str {
        &self.load_url
    }

    /// 解析当前视频流地址, 失败时记录原因
    pub async fn resolve(&self) -> Option<StreamUrl> {
        match self.try_resolve().await {
            Ok(url) => {
                info!("Using video URL: {}", url);
                Some(url)
            }
            Err(ResolveError::BadStatus(status)) => {
                warn!("Failed to fetch video URL, status code: {}", status);
                None
            }
            Err(e) => {
                warn!("Error fetching video URL from {}: {}", self.load_url, e);
                None
            }
        }
    }

    pub async fn try_resolve(&self) -> Result<StreamUrl, ResolveError> {
        debug!("Requesting {}", self.load_url);
        let response = self.http.get(&self.load_url).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ResolveError::BadStatus(status));
        }

        let body = response.text().await?;
        stream_url_from_body(&self.base_url, &body)
    }
}

/// 将 `load.jsp` 响应中的 `videoname` 拼接到基础地址上
///
/// 响应体必须是 JSON 对象, 数组等其他形状一律视为格式错误
pub fn stream_url_from_body(base_url: &str, body: &str) -> Result<StreamUrl, ResolveError> {
    let object: Map<String, Value> = serde_json::from_str(body)?;
    let info: VideoUrlInfo = serde_json::from_value(Value::Object(object))?;
    match info.videoname {
        Some(name) if !name.is_empty() => Ok(StreamUrl(format!("{}/{}", base_url, name))),
        _ => Err(ResolveError::MissingField),
    }
}
