//! /clickhouse 路由
//!
//! 走 ClickHouse 的 HTTP 接口（8123），查询加 FORMAT JSONEachRow：
//! 响应体一行一个 JSON 对象，正好是行通道的元素格式，
//! 按换行切分即可入通道，无需驱动层。

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use serde_json::Value;
use tracing::trace;

use crate::core::error::{ApiError, ApiResult};
use crate::export::{pipeline, ExportQuery, RowReceiver};
use crate::state::AppState;

use super::{dispatch_export, parse_mime, SharedState};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/tables", get(tables))
        .route("/table/:table", get(table_dump))
        .route("/table/:table/columns", get(table_columns))
}

// GET /clickhouse/tables?mime=json|excel|docx
async fn tables(
    State(state): State<SharedState>,
    Query(q): Query<ExportQuery>,
) -> ApiResult<Response> {
    let mime = parse_mime(q.mime_str())?;
    let database = state.config.clickhouse.database.clone();
    let sql = format!(
        "select database, name, uuid, engine, is_temporary,
            metadata_modification_time, engine_full, partition_key,
            sorting_key, primary_key, storage_policy, total_rows,
            total_bytes, comment, has_own_data
        from system.tables where database = '{}'",
        database
    );

    let rx = query_rows(&state, sql).await?;
    let basename = format!("{}-tables", database);
    let title = format!("数据库 Clickhouse - {} tables", database);
    dispatch_export(mime, rx, None, &basename, &title).await
}

// GET /clickhouse/table/:table/columns?mime=json|excel|docx
async fn table_columns(
    State(state): State<SharedState>,
    Path(table): Path<String>,
    Query(q): Query<ExportQuery>,
) -> ApiResult<Response> {
    let mime = parse_mime(q.mime_str())?;
    let sql = format!(
        "select database, table, name, type, position, default_kind,
            default_expression, compression_codec, numeric_precision,
            numeric_precision_radix, numeric_scale, datetime_precision, comment
        from system.columns
        where database = '{}' and table = '{}'
        order by position",
        state.config.clickhouse.database, table
    );

    let rx = query_rows(&state, sql).await?;
    let basename = format!("{}-columns", table);
    let title = format!("{} columns", table);
    dispatch_export(mime, rx, None, &basename, &title).await
}

// GET /clickhouse/table/:table?limit=100&mime=json|excel|docx
async fn table_dump(
    State(state): State<SharedState>,
    Path(table): Path<String>,
    Query(q): Query<ExportQuery>,
) -> ApiResult<Response> {
    let mime = parse_mime(q.mime_str())?;
    let limit = q.limit_or_default();

    // excel/docx 需要稳定列序，提前取 system.columns 的 position 序
    let columns = get_columns(&state, &table).await?;
    if columns.is_empty() {
        return Err(ApiError::not_found(format!("table '{}' not found", table)));
    }

    let sql = format!("select * from {} limit {}", table, limit);
    let rx = query_rows(&state, sql).await?;
    dispatch_export(mime, rx, Some(columns), &table, &table).await
}

/// 发起 HTTP 查询并把 JSONEachRow 响应体接到行通道。
/// 非 2xx 响应在此处整体读出，作为查询错误返回（fail-fast）。
async fn query_rows(state: &AppState, sql: String) -> ApiResult<RowReceiver> {
    let conf = &state.config.clickhouse;
    trace!("clickhouse sql: {}", sql);

    let mut req = state
        .http_client
        .post(conf.url.as_str())
        .query(&[("database", conf.database.as_str())])
        .body(format!("{} FORMAT JSONEachRow", sql));
    if !conf.user.is_empty() {
        req = req.basic_auth(&conf.user, Some(&conf.password));
    }

    let resp = req.send().await?;
    if !resp.status().is_success() {
        let status = resp.status();
        let text = resp.text().await.unwrap_or_default();
        return Err(ApiError::internal(format!("clickhouse {}: {}", status, text)));
    }
    Ok(pipeline::spawn_json_lines(resp))
}

/// 按 position 序取列名
async fn get_columns(state: &AppState, table: &str) -> ApiResult<Vec<String>> {
    let sql = format!(
        "select name from system.columns
        where database = '{}' and table = '{}'
        order by position",
        state.config.clickhouse.database, table
    );
    let mut rx = query_rows(state, sql).await?;
    let mut columns = Vec::new();
    while let Some(item) = rx.recv().await {
        let row = item.map_err(|e| ApiError::internal(e.to_string()))?;
        let v: Value = serde_json::from_str(&row)
            .map_err(|e| ApiError::internal(e.to_string()))?;
        if let Some(name) = v.get("name").and_then(Value::as_str) {
            columns.push(name.to_string());
        }
    }
    Ok(columns)
}
