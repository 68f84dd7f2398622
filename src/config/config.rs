use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub camera: CameraConfig,
    pub poll: PollConfig,
    pub storage: StorageConfig,
    pub video: VideoConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub base_url: String,
    pub load_path: String,
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollConfig {
    pub interval_secs: u64,
    pub timestamp: TimestampMode,
    pub backoff: bool,
    pub max_interval_secs: u64,
}

/// 保存目录和文件名所依据的时间点
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampMode {
    /// 进程启动时取一次
    #[default]
    Startup,
    /// 每次截帧时重新计算
    PerCapture,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub backend: VideoBackend,
    pub ffmpeg_path: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoBackend {
    #[default]
    Ffmpeg,
    Opencv,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl fmt::Display for PollConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "interval={}s, timestamp={:?}, backoff={}, max_interval={}s",
            self.interval_secs, self.timestamp, self.backoff, self.max_interval_secs
        )
    }
}

impl fmt::Display for VideoConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "backend={:?}, ffmpeg={}, timeout={}s",
            self.backend, self.ffmpeg_path, self.timeout_secs
        )
    }
}

impl Config {
    /// 从指定路径加载配置
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).context("Failed to read config file")?;
        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    /// 获取默认配置文件路径
    pub fn default_config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Unable to determine the user config directory")?
            .join("stream-snapshot");
        Ok(config_dir.join("config.toml"))
    }

    /// 选择运行所用的配置
    ///
    /// 显式指定的路径必须能加载; 否则默认路径存在时使用它, 再否则使用内置默认值
    pub fn discover(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path)
                .with_context(|| format!("Config file {}", path.display()));
        }

        match Self::default_config_path() {
            Ok(path) if path.exists() => Self::load_from(&path)
                .with_context(|| format!("Config file {}", path.display())),
            _ => {
                let config = Self::default();
                config.validate()?;
                Ok(config)
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let base_url = self.camera.base_url.trim();
        if base_url.is_empty() {
            anyhow::bail!("camera.base_url must not be empty");
        }
        if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
            anyhow::bail!(
                "camera.base_url must start with http:// or https://, got {}",
                base_url
            );
        }
        if self.camera.load_path.trim_matches('/').is_empty() {
            anyhow::bail!("camera.load_path must not be empty");
        }
        if self.camera.request_timeout_secs == 0 {
            anyhow::bail!("camera.request_timeout_secs must be greater than 0");
        }

        if self.poll.interval_secs == 0 {
            anyhow::bail!("poll.interval_secs must be greater than 0");
        }
        if self.poll.max_interval_secs < self.poll.interval_secs {
            anyhow::bail!(
                "poll.max_interval_secs ({}) must not be smaller than poll.interval_secs ({})",
                self.poll.max_interval_secs,
                self.poll.interval_secs
            );
        }

        if self.storage.path.trim().is_empty() {
            anyhow::bail!("storage.path must not be empty");
        }

        if self.video.timeout_secs == 0 {
            anyhow::bail!("video.timeout_secs must be greater than 0");
        }
        if self.video.backend == VideoBackend::Opencv && !cfg!(feature = "opencv") {
            anyhow::bail!("video.backend = \"opencv\" requires building with the `opencv` feature");
        }

        Ok(())
    }

    /// 去掉末尾斜杠的基础 URL
    pub fn base_url(&self) -> &str {
        self.camera.base_url.trim().trim_end_matches('/')
    }

    /// 返回当前视频名的接口地址
    pub fn load_url(&self) -> String {
        format!(
            "{}/{}",
            self.base_url(),
            self.camera.load_path.trim_start_matches('/')
        )
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            base_url: "http://101.109.253.60:8999".to_string(),
            load_path: "load.jsp".to_string(),
            request_timeout_secs: 30,
        }
    }
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval_secs: 60,
            timestamp: TimestampMode::Startup,
            backoff: false,
            max_interval_secs: 600,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: "history_pictures".to_string(),
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            backend: VideoBackend::Ffmpeg,
            ffmpeg_path: "ffmpeg".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config() {
        let config = Config::load_from("config/config.example.toml").unwrap();
        assert_eq!(config.camera.base_url, "http://101.109.253.60:8999");
        assert_eq!(config.camera.load_path, "load.jsp");
        assert_eq!(config.poll.interval_secs, 60);
        assert_eq!(config.poll.timestamp, TimestampMode::Startup);
        assert_eq!(config.storage.path, "history_pictures");
        assert_eq!(config.video.backend, VideoBackend::Ffmpeg);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [camera]
            base_url = "http://camera.local:8080"

            [poll]
            timestamp = "per_capture"
            "#,
        )
        .unwrap();
        assert_eq!(config.camera.base_url, "http://camera.local:8080");
        assert_eq!(config.camera.load_path, "load.jsp");
        assert_eq!(config.poll.interval_secs, 60);
        assert_eq!(config.poll.timestamp, TimestampMode::PerCapture);
        assert_eq!(config.logging.level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_default_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_empty_base_url() {
        let mut config = Config::default();
        config.camera.base_url = "  ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_base_url_scheme() {
        let mut config = Config::default();
        config.camera.base_url = "101.109.253.60:8999".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_interval() {
        let mut config = Config::default();
        config.poll.interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_max_interval_below_interval() {
        let mut config = Config::default();
        config.poll.max_interval_secs = 30;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_empty_storage_path() {
        let mut config = Config::default();
        config.storage.path = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_zero_timeouts() {
        let mut config = Config::default();
        config.camera.request_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.video.timeout_secs = 0;
        assert!(config.validate().is_err());
    }

    #[cfg(not(feature = "opencv"))]
    #[test]
    fn test_validate_opencv_without_feature() {
        let mut config = Config::default();
        config.video.backend = VideoBackend::Opencv;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_url() {
        let config = Config::default();
        assert_eq!(config.load_url(), "http://101.109.253.60:8999/load.jsp");

        let mut config = Config::default();
        config.camera.base_url = "http://camera.local/".to_string();
        config.camera.load_path = "/load.jsp".to_string();
        assert_eq!(config.load_url(), "http://camera.local/load.jsp");
    }

    #[test]
    fn test_discover_explicit_missing_file() {
        let missing = Path::new("config/does-not-exist.toml");
        assert!(Config::discover(Some(missing)).is_err());
    }
}
