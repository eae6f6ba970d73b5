//! /mysql 路由
//!
//! information_schema 元数据查询与单表 dump。
//! 元数据查询让 MySQL 用 json_object() 直接产出 JSON（字段顺序不保证，
//! excel 导出时需要显式列序）；describe / ddl 这类语句无法产出 JSON，
//! 走主机侧列扫描重编码。

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use tracing::trace;

use crate::core::error::{ApiError, ApiResult};
use crate::export::{json, pipeline, ExportMime, ExportQuery};
use crate::state::AppState;

use super::{dispatch_export, html_page, json_body, parse_mime, SharedState};

/// tables/views 列表缓存 TTL
const TABLES_CACHE_TTL: Duration = Duration::from_secs(5);

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(index))
        .route("/tables", get(tables))
        .route("/views", get(views))
        .route("/table/:table", get(table_dump))
        .route("/table/:table/columns", get(table_columns))
        .route("/table/:table/indexes", get(table_indexes))
        .route("/table/:table/constraints", get(table_constraints))
        .route("/table/:table/keys", get(table_keys))
        .route("/table/:table/references", get(table_references))
        .route("/table/:table/stats", get(table_stats))
        .route("/table/:table/describe", get(table_describe))
        .route("/table/:table/ddl", get(table_ddl))
        .route("/view/:table", get(table_dump))
        .route("/view/:table/columns", get(table_columns))
        .route("/view/:table/indexes", get(table_indexes))
        .route("/view/:table/constraints", get(table_constraints))
        .route("/view/:table/keys", get(table_keys))
        .route("/view/:table/references", get(table_references))
        .route("/view/:table/stats", get(table_stats))
        .route("/view/:table/describe", get(table_describe))
        .route("/view/:table/ddl", get(table_ddl))
        .route("/procedures", get(procedures))
        .route("/procedure/:procedure", get(procedure))
        .route("/events", get(events))
        .route("/event/:event", get(event))
        .route("/triggers", get(triggers))
        .route("/trigger/:trigger", get(trigger))
}

// GET /mysql
async fn index() -> Response {
    html_page(
        r#"<html><body><h1>Mysql Information</h1>
<a href="/mysql/tables?mime=json">tables</a><br>
<a href="/mysql/table/:table?mime=json">table/:table_name/[columns|indexes|constraints|keys|references|stats|describe|ddl]</a><br>
<a href="/mysql/views?mime=json">views</a><br>
<a href="/mysql/view/:view?mime=json">view/:view_name/[columns|indexes|constraints|keys|references|stats|describe|ddl]</a><br>
<a href="/mysql/procedures">procedures</a><br>
<a href="/mysql/procedure/:procedure">procedure/:procedure_name</a><br>
<a href="/mysql/events">events</a><br>
<a href="/mysql/event/:event">event/:event_name</a><br>
<a href="/mysql/triggers">triggers</a><br>
<a href="/mysql/trigger/:trigger">trigger/:trigger_name</a><br>
</body></html>"#,
    )
}

// GET /mysql/tables?mime=json|excel|docx
async fn tables(
    State(state): State<SharedState>,
    Query(q): Query<ExportQuery>,
) -> ApiResult<Response> {
    tables_views(state, q, "BASE TABLE", "tables").await
}

// GET /mysql/views?mime=json|excel|docx
async fn views(
    State(state): State<SharedState>,
    Query(q): Query<ExportQuery>,
) -> ApiResult<Response> {
    tables_views(state, q, "VIEW", "views").await
}

async fn tables_views(
    state: Arc<AppState>,
    q: ExportQuery,
    table_type: &str,
    kind: &str,
) -> ApiResult<Response> {
    let mime = parse_mime(q.mime_str())?;
    let database = state.mysql.database().to_string();
    let sql = format!(
        "select json_object(
            'table_catalog', table_catalog,
            'table_schema', table_schema,
            'table_name', table_name,
            'table_type', table_type,
            'table_rows', table_rows,
            'avg_row_length', avg_row_length,
            'data_length', data_length,
            'max_data_length', max_data_length,
            'index_length', index_length,
            'data_free', data_free,
            'create_time', create_time,
            'table_collation', table_collation,
            'table_comment', table_comment
            ) as json
        from INFORMATION_SCHEMA.TABLES
        where table_schema = '{}' and table_type = '{}'",
        database, table_type
    );

    // json 模式走 5 秒缓存，减轻高频刷新下的数据库压力
    if mime == ExportMime::Json {
        let cache_key = format!("mysql:{}", kind);
        if let Some(cached) = state.cache.get(&cache_key) {
            trace!("mysql {} 命中缓存", kind);
            return Ok(json_body(cached));
        }
        let pool = state.mysql.pool().await?.clone();
        let rx = pipeline::spawn_mysql_json_rows(pool, sql);
        let body = json::collect_json_array(rx).await?;
        state.cache.set(&cache_key, body.clone(), TABLES_CACHE_TTL);
        return Ok(json_body(body));
    }

    let pool = state.mysql.pool().await?.clone();
    let rx = pipeline::spawn_mysql_json_rows(pool, sql);
    let basename = format!("{}-{}", database, kind);
    let title = format!("数据库 Mysql - {} {}", database, kind);
    dispatch_export(mime, rx, None, &basename, &title).await
}

// GET /mysql/table/:table?limit=100&mime=json|excel|docx
async fn table_dump(
    State(state): State<SharedState>,
    Path(table): Path<String>,
    Query(q): Query<ExportQuery>,
) -> ApiResult<Response> {
    let mime = parse_mime(q.mime_str())?;
    let limit = q.limit_or_default();

    let columns = get_columns(&state, &table).await?;
    if columns.is_empty() {
        return Err(ApiError::not_found(format!("table '{}' not found", table)));
    }

    // 列序来自 ordinal_position，excel 表头沿用同一顺序
    let mut sql = String::from("select json_object(");
    for (i, col) in columns.iter().enumerate() {
        if i > 0 {
            sql.push(',');
        }
        sql.push_str(&format!("'{}', `{}`", col, col));
    }
    sql.push_str(&format!(") as json from {} limit {}", table, limit));

    let pool = state.mysql.pool().await?.clone();
    let rx = pipeline::spawn_mysql_json_rows(pool, sql);
    dispatch_export(mime, rx, Some(columns), &table, &table).await
}

// GET /mysql/table/:table/columns?mime=json|excel|docx
async fn table_columns(
    State(state): State<SharedState>,
    Path(table): Path<String>,
    Query(q): Query<ExportQuery>,
) -> ApiResult<Response> {
    let mime = parse_mime(q.mime_str())?;
    let sql = format!(
        "select json_object(
            'table_catalog', table_catalog,
            'table_schema', table_schema,
            'table_name', table_name,
            'column_name', column_name,
            'ordinal_position', ordinal_position,
            'column_default', column_default,
            'is_nullable', is_nullable,
            'data_type', data_type,
            'column_type', column_type,
            'column_key', column_key,
            'collation_name', collation_name,
            'column_comment', column_comment
            ) as json
        from INFORMATION_SCHEMA.COLUMNS
        where table_schema = '{}' and table_name = '{}'
        order by ordinal_position",
        state.mysql.database(),
        table
    );

    let pool = state.mysql.pool().await?.clone();
    let rx = pipeline::spawn_mysql_json_rows(pool, sql);
    let basename = format!("{}-columns", table);
    let title = format!("{} columns", table);
    dispatch_export(mime, rx, None, &basename, &title).await
}

// GET /mysql/table/:table/indexes?mime=json|excel|docx
async fn table_indexes(
    State(state): State<SharedState>,
    Path(table): Path<String>,
    Query(q): Query<ExportQuery>,
) -> ApiResult<Response> {
    let mime = parse_mime(q.mime_str())?;
    let sql = format!(
        "select json_object(
            'table_catalog', table_catalog,
            'table_schema', table_schema,
            'table_name', table_name,
            'index_name', index_name,
            'index_type', index_type,
            'index_schema', index_schema,
            'nullable', nullable,
            'is_visible', is_visible,
            'non_unique', non_unique,
            'index_comment', index_comment,
            'collation', collation,
            'cardinality', cardinality,
            'columns', columns
            ) as json
        from (
            select
                table_catalog, table_schema, table_name,
                index_name, index_type, index_schema,
                nullable, is_visible, non_unique,
                index_comment, collation, cardinality,
                GROUP_CONCAT(column_name ORDER BY seq_in_index) AS columns
            from information_schema.statistics
            where table_schema = '{}' and table_name = '{}'
            group by table_schema, table_name, index_name
        ) as b",
        state.mysql.database(),
        table
    );

    let pool = state.mysql.pool().await?.clone();
    let rx = pipeline::spawn_mysql_json_rows(pool, sql);
    let basename = format!("{}-indexes", table);
    let title = format!("{} indexes", table);
    dispatch_export(mime, rx, None, &basename, &title).await
}

// GET /mysql/table/:table/constraints
async fn table_constraints(
    State(state): State<SharedState>,
    Path(table): Path<String>,
) -> ApiResult<Response> {
    let sql = format!(
        "SELECT CONSTRAINT_NAME, CONSTRAINT_TYPE, TABLE_NAME
        FROM information_schema.TABLE_CONSTRAINTS
        WHERE TABLE_SCHEMA = '{}' AND TABLE_NAME = '{}'",
        state.mysql.database(),
        table
    );
    map_rows_json(&state, sql).await
}

// GET /mysql/table/:table/keys 表外键
async fn table_keys(
    State(state): State<SharedState>,
    Path(table): Path<String>,
) -> ApiResult<Response> {
    let sql = format!(
        "select * from information_schema.key_column_usage
        where REFERENCED_TABLE_NAME is not null
        and TABLE_SCHEMA = '{}' and TABLE_NAME = '{}'",
        state.mysql.database(),
        table
    );
    map_rows_json(&state, sql).await
}

// GET /mysql/table/:table/references 引用本表的外键
async fn table_references(
    State(state): State<SharedState>,
    Path(table): Path<String>,
) -> ApiResult<Response> {
    let sql = format!(
        "select * from information_schema.key_column_usage
        where REFERENCED_TABLE_SCHEMA = '{}' and REFERENCED_TABLE_NAME = '{}'",
        state.mysql.database(),
        table
    );
    map_rows_json(&state, sql).await
}

// GET /mysql/table/:table/stats
async fn table_stats(
    State(state): State<SharedState>,
    Path(table): Path<String>,
) -> ApiResult<Response> {
    let sql = format!(
        "select * from information_schema.tables
        where TABLE_SCHEMA = '{}' and TABLE_NAME = '{}'",
        state.mysql.database(),
        table
    );
    map_rows_json(&state, sql).await
}

// GET /mysql/table/:table/describe
async fn table_describe(
    State(state): State<SharedState>,
    Path(table): Path<String>,
) -> ApiResult<Response> {
    map_rows_json(&state, format!("describe {}", table)).await
}

// GET /mysql/table/:table/ddl
async fn table_ddl(
    State(state): State<SharedState>,
    Path(table): Path<String>,
) -> ApiResult<Response> {
    map_rows_json(&state, format!("show create table {}", table)).await
}

// GET /mysql/procedures
async fn procedures(State(state): State<SharedState>) -> ApiResult<Response> {
    let sql = format!("SHOW PROCEDURE STATUS where db = '{}'", state.mysql.database());
    map_rows_json(&state, sql).await
}

// GET /mysql/procedure/:procedure
async fn procedure(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> ApiResult<Response> {
    map_rows_json(&state, format!("SHOW CREATE PROCEDURE {}", name)).await
}

// GET /mysql/events
async fn events(State(state): State<SharedState>) -> ApiResult<Response> {
    let sql = format!("SHOW EVENTS from {}", state.mysql.database());
    map_rows_json(&state, sql).await
}

// GET /mysql/event/:event
async fn event(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> ApiResult<Response> {
    map_rows_json(&state, format!("SHOW CREATE EVENT {}", name)).await
}

// GET /mysql/triggers
async fn triggers(State(state): State<SharedState>) -> ApiResult<Response> {
    let sql = format!("SHOW triggers from {}", state.mysql.database());
    map_rows_json(&state, sql).await
}

// GET /mysql/trigger/:trigger
async fn trigger(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> ApiResult<Response> {
    map_rows_json(&state, format!("SHOW CREATE trigger {}", name)).await
}

/// 列扫描重编码路径：语句自身无法产出 JSON，主机侧转 map 后流式输出
async fn map_rows_json(state: &AppState, sql: String) -> ApiResult<Response> {
    let pool = state.mysql.pool().await?.clone();
    let rx = pipeline::spawn_mysql_map_rows(pool, sql);
    Ok(json_body(json::collect_json_array(rx).await?))
}

/// 按 ordinal_position 取表的列名列表
async fn get_columns(state: &AppState, table: &str) -> ApiResult<Vec<String>> {
    let sql = format!(
        "select column_name from INFORMATION_SCHEMA.COLUMNS
        where table_schema = '{}' and table_name = '{}'
        order by ordinal_position",
        state.mysql.database(),
        table
    );
    let pool = state.mysql.pool().await?;
    let rows: Vec<(String,)> = sqlx::query_as(&sql).fetch_all(pool).await?;
    Ok(rows.into_iter().map(|(c,)| c).collect())
}
