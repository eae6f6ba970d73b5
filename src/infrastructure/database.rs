//! 数据库基础设施
//!
//! 连接池提供者：池在首次查询时建立并复用，handler 只借用不持有；
//! 服务关闭时由 AppState 统一关闭。

use sqlx::mysql::MySqlPoolOptions;
use sqlx::postgres::PgPoolOptions;
use sqlx::{MySqlPool, PgPool};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::info;

use crate::config::DbConfig;

/// 连接/查询最大超时（秒）
const DB_MAX_TIMEOUT: u64 = 30;

/// MySQL 连接池提供者
pub struct MysqlProvider {
    config: DbConfig,
    pool: OnceCell<MySqlPool>,
}

impl MysqlProvider {
    pub fn new(config: DbConfig) -> Self {
        Self { config, pool: OnceCell::new() }
    }

    pub fn database(&self) -> &str {
        &self.config.database
    }

    /// 获取连接池，首次调用时建立
    pub async fn pool(&self) -> Result<&MySqlPool, sqlx::Error> {
        self.pool
            .get_or_try_init(|| async {
                let pool = MySqlPoolOptions::new()
                    .max_connections(self.config.max_open_conns.max(1))
                    .idle_timeout(Duration::from_secs(self.config.max_idle_secs))
                    .acquire_timeout(Duration::from_secs(DB_MAX_TIMEOUT))
                    .connect(&self.config.dsn)
                    .await?;
                info!("连接 mysql [{}] 成功", self.config.database);
                Ok(pool)
            })
            .await
    }

    pub async fn close(&self) {
        if let Some(pool) = self.pool.get() {
            pool.close().await;
        }
    }
}

/// PostgreSQL 连接池提供者
pub struct PgProvider {
    config: DbConfig,
    pool: OnceCell<PgPool>,
}

impl PgProvider {
    pub fn new(config: DbConfig) -> Self {
        Self { config, pool: OnceCell::new() }
    }

    pub fn database(&self) -> &str {
        &self.config.database
    }

    pub async fn pool(&self) -> Result<&PgPool, sqlx::Error> {
        self.pool
            .get_or_try_init(|| async {
                let pool = PgPoolOptions::new()
                    .max_connections(self.config.max_open_conns.max(1))
                    .idle_timeout(Duration::from_secs(self.config.max_idle_secs))
                    .acquire_timeout(Duration::from_secs(DB_MAX_TIMEOUT))
                    .connect(&self.config.dsn)
                    .await?;
                info!("连接 postgresql [{}] 成功", self.config.database);
                Ok(pool)
            })
            .await
    }

    pub async fn close(&self) {
        if let Some(pool) = self.pool.get() {
            pool.close().await;
        }
    }
}
