use std::path::PathBuf;
use std::time::Duration;

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::capture::{FrameCapturer, VideoOpener};
use crate::config::PollConfig;
use crate::resolver::StreamResolver;

/// 单次轮询的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    NoUrl,
    Captured(PathBuf),
    CaptureFailed,
}

/// 解析 → 截帧 → 休眠 主循环
pub struct Watcher<O> {
    resolver: StreamResolver,
    capturer: FrameCapturer<O>,
    poll: PollConfig,
}

impl<O: VideoOpener> Watcher<O> {
    pub fn new(resolver: StreamResolver, capturer: FrameCapturer<O>, poll: PollConfig) -> Self {
        info!("Poll settings: {}", poll);
        Self {
            resolver,
            capturer,
            poll,
        }
    }

    /// 持续轮询, 直到被取消或达到 `max_cycles` 次(0 表示无限制)
    ///
    /// 返回完成的轮询次数
    pub async fn run(&self, cancel: CancellationToken, max_cycles: usize) -> usize {
        let limit = if max_cycles == 0 {
            usize::MAX
        } else {
            max_cycles
        };
        let mut cycles = 0;
        let mut consecutive_failures = 0u32;

        info!("Watching {}", self.resolver.load_url());

        loop {
            if cancel.is_cancelled() {
                info!("Watcher received cancellation signal");
                break;
            }

            let outcome = self.run_cycle().await;
            cycles += 1;

            if outcome == CycleOutcome::NoUrl {
                consecutive_failures = consecutive_failures.saturating_add(1);
            } else {
                consecutive_failures = 0;
            }

            if cycles >= limit {
                info!("Completed {} poll cycles, stopping", cycles);
                break;
            }

            let delay = self.next_delay(consecutive_failures);
            debug!("Next poll in {}s", delay.as_secs());
            tokio::select! {
                _ = sleep(delay) => {}
                _ = cancel.cancelled() => {
                    info!("Watcher cancelled during interval");
                    break;
                }
            }
        }

        info!("Watcher stopped after {} cycles", cycles);
        cycles
    }

    /// 执行一次解析 → 截帧, 不包含之后的休眠
    pub async fn run_cycle(&self) -> CycleOutcome {
        let Some(url) = self.resolver.resolve().await else {
            warn!("Could not retrieve a valid video URL.");
            return CycleOutcome::NoUrl;
        };

        match self.capturer.capture_one_frame(&url).await {
            Some(path) => CycleOutcome::Captured(path),
            None => CycleOutcome::CaptureFailed,
        }
    }

    /// 连续 `failures` 次未取到 URL 后, 下一次轮询前的等待时长
    pub fn next_delay(&self, failures: u32) -> Duration {
        let interval = self.poll.interval_secs;
        if !self.poll.backoff || failures == 0 {
            return Duration::from_secs(interval);
        }

        let factor = 1u64.checked_shl(failures.min(32)).unwrap_or(u64::MAX);
        let secs = interval
            .saturating_mul(factor)
            .min(self.poll.max_interval_secs);
        Duration::from_secs(secs)
    }
}
