//! apptpl 服务入口
//!
//! 启动流程：解析命令行 -> 加载配置 -> 初始化日志 -> 构造 AppState ->
//! 组装路由 -> 监听并服务 -> 收到 SIGINT/SIGTERM 后优雅退出并关闭连接池。

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{debug, info};

use apptpl::app;
use apptpl::app::meta::{APP_NAME, APP_VERSION};
use apptpl::infrastructure::logger;
use apptpl::{AppConfig, AppState};

const DEFAULT_CONFIG: &str = "etc/apptpl.toml";

struct Args {
    config: String,
    debug: bool,
}

/// 命令行：-f <配置文件> -D（调试日志） -v（打印版本后退出）
fn parse_args() -> Args {
    let mut args = Args { config: DEFAULT_CONFIG.to_string(), debug: false };
    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-f" => {
                if let Some(path) = iter.next() {
                    args.config = path;
                }
            }
            "-D" => args.debug = true,
            "-v" => {
                println!("{} v{}", APP_NAME, APP_VERSION);
                std::process::exit(0);
            }
            other => {
                eprintln!("unknown argument: {}", other);
                eprintln!("usage: {} [-f config] [-D] [-v]", APP_NAME);
                std::process::exit(2);
            }
        }
    }
    args
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.ok();
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("收到 SIGINT"),
        _ = terminate => info!("收到 SIGTERM"),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = parse_args();

    let mut config = AppConfig::load_from_file(&args.config)?;
    if args.debug {
        config.log.level = "debug".to_string();
    }

    // guard 持有到进程结束，保证文件日志落盘
    let _guard = logger::init(&config.log);

    info!("BEGIN... {} v{}, config={}, debug={}", APP_NAME, APP_VERSION, args.config, args.debug);
    debug!("config: {:?}", config);

    let addr = format!("{}:{}", config.host, config.port);
    let state = Arc::new(AppState::new(config)?);
    let router = app::build_router(state.clone());

    let listener = TcpListener::bind(&addr).await?;
    info!("🚀 API server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.shutdown().await;
    info!("END... {}", chrono::Utc::now().to_rfc3339());
    Ok(())
}
