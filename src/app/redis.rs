//! /redis 路由
//!
//! key 浏览：按前缀列 key，按类型分派取值
//! （string / list / hash / set / zset）。
//! 连接用 ConnectionManager，断线自动重连，首次使用时建立。

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde_json::{json, Value};
use tracing::{debug, trace};

use crate::core::error::{ApiError, ApiResult};
use crate::state::AppState;

use super::SharedState;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/db/:db/keys", get(keys))
        .route("/db/:db/keys/:prefix", get(keys_with_prefix))
        .route("/db/:db/key/:key", get(key_value))
}

/// 取共享连接，首次调用时按配置建立并 ping 通
async fn connection(state: &AppState) -> ApiResult<ConnectionManager> {
    let manager = state
        .redis
        .get_or_try_init(|| async {
            let conf = &state.config.redis;
            let url = if conf.password.is_empty() {
                format!("redis://{}/{}", conf.addr, conf.db)
            } else {
                format!("redis://:{}@{}/{}", conf.password, conf.addr, conf.db)
            };
            let client = redis::Client::open(url)?;
            let manager = ConnectionManager::new(client).await?;
            debug!("连接 redis [{}] 成功", conf.addr);
            Ok::<_, redis::RedisError>(manager)
        })
        .await?;
    Ok(manager.clone())
}

// GET /redis/db/:db/keys
async fn keys(State(state): State<SharedState>, Path(_db): Path<u32>) -> ApiResult<Json<Value>> {
    list_keys(&state, "*").await
}

// GET /redis/db/:db/keys/:prefix
async fn keys_with_prefix(
    State(state): State<SharedState>,
    Path((_db, prefix)): Path<(u32, String)>,
) -> ApiResult<Json<Value>> {
    let pattern = if prefix.ends_with('*') {
        prefix
    } else {
        format!("{}*", prefix)
    };
    list_keys(&state, &pattern).await
}

async fn list_keys(state: &AppState, pattern: &str) -> ApiResult<Json<Value>> {
    trace!("redis get key with prefix: {}", pattern);
    let mut conn = connection(state).await?;
    let mut keys: Vec<String> = conn.keys(pattern).await?;
    keys.sort();
    Ok(Json(json!({ "keys": keys })))
}

// GET /redis/db/:db/key/:key
// 按 key 的类型分派读取
async fn key_value(
    State(state): State<SharedState>,
    Path((_db, key)): Path<(u32, String)>,
) -> ApiResult<Json<Value>> {
    let mut conn = connection(&state).await?;

    let datatype: String = redis::cmd("TYPE").arg(&key).query_async(&mut conn).await?;
    trace!("redis key '{}' type: {}", key, datatype);

    let value = match datatype.as_str() {
        "string" => {
            let v: String = conn.get(&key).await?;
            json!(v)
        }
        "list" => {
            let v: Vec<String> = conn.lrange(&key, 0, -1).await?;
            json!(v)
        }
        "hash" => {
            let v: HashMap<String, String> = conn.hgetall(&key).await?;
            json!(v)
        }
        "set" => {
            let v: Vec<String> = conn.smembers(&key).await?;
            json!(v)
        }
        "zset" => {
            let v: Vec<String> = conn.zrange(&key, 0, -1).await?;
            json!(v)
        }
        "none" => return Err(ApiError::not_found(format!("key '{}' not found", key))),
        other => {
            return Err(ApiError::bad_request(format!("unknown key type: {}", other)))
        }
    };
    Ok(Json(value))
}
