use crate::config::LoggingConfig;
use tracing_subscriber::{EnvFilter, fmt};

/// 初始化日志系统
///
/// 设置了 `RUST_LOG` 时以它为准; 否则使用 `logging.level`,
/// 该值已被命令行的 `--log-level` 覆盖. 无法解析的级别退回 `info`
pub fn init(config: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| level_filter(&config.level));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(true)
        .init();
}

fn level_filter(level: &str) -> EnvFilter {
    EnvFilter::try_new(level).unwrap_or_else(|e| {
        eprintln!("Invalid log level {:?} ({}), falling back to info", level, e);
        EnvFilter::new("info")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_filter() {
        assert_eq!(level_filter("debug").to_string(), "debug");
        assert_eq!(
            level_filter("stream_snapshot=trace").to_string(),
            "stream_snapshot=trace"
        );
    }

    #[test]
    fn test_invalid_level_falls_back_to_info() {
        assert_eq!(level_filter("stream_snapshot=loud").to_string(), "info");
    }
}
