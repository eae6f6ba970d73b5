//! 应用状态
//!
//! 启动时间、配置、连接池提供者和 TTL 缓存都挂在这里，
//! 由 main 显式构造后以 Arc 注入各个 Router，不使用进程级全局变量。

use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;

use crate::config::AppConfig;
use crate::core::cache::TtlCache;
use crate::infrastructure::database::{MysqlProvider, PgProvider};

/// 全部 handler 共享的应用状态
pub struct AppState {
    pub config: AppConfig,
    pub started_at: DateTime<Utc>,
    /// 短 TTL 结果缓存（list tables 防击穿）
    pub cache: TtlCache,
    pub mysql: MysqlProvider,
    pub postgres: PgProvider,
    /// ClickHouse HTTP 客户端
    pub http_client: reqwest::Client,
    /// Redis 连接管理器，首次使用时建立
    pub redis: OnceCell<redis::aio::ConnectionManager>,
    /// MinIO S3 客户端，首次使用时建立
    pub s3: OnceCell<aws_sdk_s3::Client>,
}

impl AppState {
    pub fn new(config: AppConfig) -> anyhow::Result<Self> {
        let mysql = MysqlProvider::new(config.mysql.clone());
        let postgres = PgProvider::new(config.postgresql.clone());
        let http_client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;

        Ok(Self {
            config,
            started_at: Utc::now(),
            cache: TtlCache::new(),
            mysql,
            postgres,
            http_client,
            redis: OnceCell::new(),
            s3: OnceCell::new(),
        })
    }

    /// 服务退出时关闭连接池（只关一次）
    pub async fn shutdown(&self) {
        self.mysql.close().await;
        self.postgres.close().await;
    }
}
