//! /meta 路由
//!
//! 服务自身的元信息：状态、版本、脱敏配置、运行时健康信息。

use axum::extract::State;
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use sysinfo::{Pid, System};

use crate::core::error::ApiResult;

use super::{html_page, SharedState};

pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(index))
        .route("/status", get(status))
        .route("/version", get(version))
        .route("/config", get(config))
        .route("/healthz", get(healthz))
}

// GET /meta
async fn index() -> Response {
    html_page(
        r#"<html><body><h1>Meta Information</h1>
<a href="/meta/status">/meta/status</a><br>
<a href="/meta/version">/meta/version</a><br>
<a href="/meta/config">/meta/config</a><br>
<a href="/meta/healthz">/meta/healthz</a><br>
<h1>Sub modules</h1>
<a href="/mysql">/mysql</a><br>
<a href="/minio">/minio</a><br>
<a href="/redis">/redis</a><br>
<a href="/clickhouse">/clickhouse</a><br>
<a href="/postgresql">/postgresql</a><br>
<a href="/host">/host</a><br>
</body></html>"#,
    )
}

// GET /meta/status
async fn status(State(state): State<SharedState>) -> Json<Value> {
    Json(json!({
        "status": "running",
        "runtime": state.started_at.to_rfc3339(),
    }))
}

// GET /meta/version
async fn version() -> String {
    format!("{} v{}", APP_NAME, APP_VERSION)
}

// GET /meta/config
// 密码字段在序列化时跳过，不会出现在响应里
async fn config(State(state): State<SharedState>) -> ApiResult<Json<Value>> {
    let value = serde_json::to_value(&state.config)
        .map_err(|e| crate::core::error::ApiError::internal(e.to_string()))?;
    Ok(Json(value))
}

// GET /meta/healthz
// 进程级运行时信息
async fn healthz(State(state): State<SharedState>) -> Json<Value> {
    let uptime_secs = (chrono::Utc::now() - state.started_at).num_seconds();
    let pid = std::process::id();

    let sys = System::new_all();
    let process = sys.process(Pid::from_u32(pid));

    Json(json!({
        "name": APP_NAME,
        "version": APP_VERSION,
        "pid": pid,
        "started_at": state.started_at.to_rfc3339(),
        "uptime_secs": uptime_secs,
        "memory_bytes": process.map(|p| p.memory()),
        "virtual_memory_bytes": process.map(|p| p.virtual_memory()),
    }))
}
