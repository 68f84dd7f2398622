use anyhow::{Context, Result};
use chrono::Local;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::capture::{Backend, FrameCapturer};
use crate::config::{Config, init};
use crate::resolver::{StreamResolver, StreamUrl};
use crate::storage::HistoryStore;
use crate::watcher::Watcher;

#[derive(Parser)]
#[command(name = "stream-snapshot")]
#[command(about = "摄像头视频流定时截帧工具", long_about = None)]
#[command(version)]
pub struct Cli {
    /// 省略时默认执行 `watch`
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 持续轮询摄像头并保存截帧
    Watch(WatchArgs),

    /// 解析一次当前视频流地址并输出
    Resolve {
        #[command(flatten)]
        common: CommonArgs,
    },

    /// 从指定视频流地址截取一帧
    Snapshot {
        /// 视频流完整地址
        url: String,

        #[command(flatten)]
        common: CommonArgs,

        #[command(flatten)]
        storage: StorageArgs,
    },
}

#[derive(Args, Default)]
pub struct CommonArgs {
    /// 配置文件路径(默认使用用户配置目录, 其次为内置默认值)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// 日志等级 (trace, debug, info, warn, error)
    #[arg(short, long)]
    pub log_level: Option<String>,
}

/// 只对会写入截帧的子命令有效
#[derive(Args, Default)]
pub struct StorageArgs {
    /// 截帧存储根目录
    #[arg(short = 's', long)]
    pub storage_path: Option<PathBuf>,
}

#[derive(Args, Default)]
pub struct WatchArgs {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(flatten)]
    pub storage: StorageArgs,

    /// 最大轮询次数(0表示无限制)
    #[arg(short, long, default_value = "0")]
    pub max_count: usize,

    /// 摄像头基础地址
    #[arg(short, long)]
    pub base_url: Option<String>,

    /// 轮询间隔(秒)
    #[arg(short, long)]
    pub interval: Option<u64>,
}

impl CommonArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(level) = &self.log_level {
            config.logging.level = level.clone();
        }
    }
}

impl StorageArgs {
    fn apply(&self, config: &mut Config) {
        if let Some(path) = &self.storage_path {
            config.storage.path = path.to_string_lossy().to_string();
        }
    }
}

/// CLI 入口函数
pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        None => watch(WatchArgs::default()).await,
        Some(Commands::Watch(args)) => watch(args).await,
        Some(Commands::Resolve { common }) => resolve(common).await,
        Some(Commands::Snapshot {
            url,
            common,
            storage,
        }) => snapshot(url, common, storage).await,
    }
}

/// 加载配置, 应用命令行覆盖项并校验, 然后初始化日志
fn load_config(common: &CommonArgs, overrides: impl FnOnce(&mut Config)) -> Result<Config> {
    let mut config = Config::discover(common.config.as_deref())?;
    common.apply(&mut config);
    overrides(&mut config);
    config.validate()?;

    init::init(&config.logging);
    Ok(config)
}

fn open_store(config: &Config) -> Result<HistoryStore> {
    let store = HistoryStore::new(&config.storage.path, config.poll.timestamp, Local::now());
    store.prepare().context("Failed to create the save directory")?;
    Ok(store)
}

async fn watch(args: WatchArgs) -> Result<()> {
    let config = load_config(&args.common, |config| {
        args.storage.apply(config);
        if let Some(base_url) = &args.base_url {
            config.camera.base_url = base_url.clone();
        }
        if let Some(interval) = args.interval {
            config.poll.interval_secs = interval;
            config.poll.max_interval_secs = config.poll.max_interval_secs.max(interval);
        }
    })?;
    info!("Video settings: {}", config.video);

    let store = open_store(&config)?;
    let resolver = StreamResolver::new(&config)?;
    let capturer = FrameCapturer::new(Backend::from_config(&config.video)?, store);
    let watcher = Watcher::new(resolver, capturer, config.poll.clone());

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, shutting down");
            on_signal.cancel();
        }
    });

    watcher.run(cancel, args.max_count).await;
    Ok(())
}

async fn resolve(common: CommonArgs) -> Result<()> {
    let config = load_config(&common, |_| {})?;
    let resolver = StreamResolver::new(&config)?;

    let url = resolver.try_resolve().await.with_context(|| {
        format!(
            "Could not retrieve a valid video URL from {}",
            resolver.load_url()
        )
    })?;
    println!("{}", url);
    Ok(())
}

async fn snapshot(url: String, common: CommonArgs, storage: StorageArgs) -> Result<()> {
    let config = load_config(&common, |config| storage.apply(config))?;
    let store = open_store(&config)?;
    let capturer = FrameCapturer::new(Backend::from_config(&config.video)?, store);

    let path = capturer.try_capture(&StreamUrl::new(url)).await?;
    println!("{}", path.display());
    Ok(())
}
