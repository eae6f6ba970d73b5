//! 日志基础设施
//!
//! 控制台 + 滚动日志文件双输出，级别来自配置，
//! 也可用 RUST_LOG 环境变量覆盖。

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogConfig;

/// 初始化日志系统，返回的 guard 需要在 main 中持有到进程退出
pub fn init(config: &LogConfig) -> WorkerGuard {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.clone()));

    let file_appender = tracing_appender::rolling::daily(&config.path, &config.filename);
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer())
        .with(fmt::layer().with_writer(file_writer).with_ansi(false))
        .init();

    guard
}
