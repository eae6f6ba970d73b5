//! # apptpl
//!
//! 数据库/对象存储信息查询与导出 API 服务模板，提供：
//! - MySQL / PostgreSQL / ClickHouse 元数据和表数据查询
//! - Redis key 浏览、MinIO 对象浏览、主机信息查询
//! - 统一的流式导出管道（JSON / Excel / Word）

pub mod app;
pub mod config;
pub mod core;
pub mod export;
pub mod infrastructure;
pub mod state;

pub use config::AppConfig;
pub use state::AppState;
