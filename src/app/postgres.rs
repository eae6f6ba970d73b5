//! /postgresql 路由
//!
//! 系统目录查询用 json_build_object 产出 JSON，
//! 单表 dump 用 row_to_json，列序由服务端保证。

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::routing::get;
use axum::Router;

use crate::core::error::ApiResult;
use crate::export::{json, pipeline, ExportQuery};
use crate::state::AppState;

use super::{dispatch_export, html_page, json_body, parse_mime, SharedState};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(index))
        .route("/tables", get(tables))
        .route("/views", get(views))
        .route("/table/:table", get(table_dump))
        .route("/table/:table/columns", get(table_columns))
        .route("/table/:table/indexes", get(table_indexes))
        .route("/view/:table", get(table_dump))
        .route("/view/:table/columns", get(table_columns))
        .route("/procedures", get(procedures))
        .route("/procedure/:procedure", get(procedure))
}

// GET /postgresql
async fn index() -> Response {
    html_page(
        r#"<html><body><h1>Postgresql Information</h1>
<a href="/postgresql/tables?mime=json">tables</a><br>
<a href="/postgresql/table/:table?mime=json">table/:table_name/[columns|indexes]</a><br>
<a href="/postgresql/views?mime=json">views</a><br>
<a href="/postgresql/view/:view?mime=json">view/:view_name/[columns]</a><br>
<a href="/postgresql/procedures">procedures</a><br>
<a href="/postgresql/procedure/:procedure">procedure/:procedure_name</a><br>
</body></html>"#,
    )
}

// GET /postgresql/tables?mime=json|excel|docx
async fn tables(
    State(state): State<SharedState>,
    Query(q): Query<ExportQuery>,
) -> ApiResult<Response> {
    let mime = parse_mime(q.mime_str())?;
    let sql = "select json_build_object(
            'schemaname', tab.schemaname,
            'tablename', tab.tablename,
            'oid', cla.\"oid\",
            'tableowner', tab.tableowner,
            'tablespace', tab.tablespace,
            'hasindexes', tab.hasindexes,
            'hasrules', tab.hasrules,
            'hastriggers', tab.hastriggers,
            'rowsecurity', tab.rowsecurity,
            'rows', stat.n_live_tup,
            'description', des.description
        ) as json
        from pg_tables tab
            left join pg_class cla on tab.tablename = cla.relname
            left join pg_description des on des.objoid = cla.oid and objsubid = 0
            left join pg_stat_user_tables stat on tab.tablename = stat.relname
        order by tab.schemaname, tab.tablename"
        .to_string();

    let pool = state.postgres.pool().await?.clone();
    let rx = pipeline::spawn_pg_json_rows(pool, sql);
    let database = state.postgres.database();
    let basename = format!("{}-tables", database);
    let title = format!("数据库 Postgresql - {} tables", database);
    dispatch_export(mime, rx, None, &basename, &title).await
}

// GET /postgresql/views?mime=json|excel|docx
async fn views(
    State(state): State<SharedState>,
    Query(q): Query<ExportQuery>,
) -> ApiResult<Response> {
    let mime = parse_mime(q.mime_str())?;
    let sql = "select json_build_object(
            'schemaname', viw.schemaname,
            'viewname', viw.viewname,
            'oid', cla.\"oid\",
            'viewowner', viw.viewowner,
            'reltablespace', cla.reltablespace,
            'reltype', cla.reltype,
            'definition', viw.definition,
            'relhasindex', cla.relhasindex,
            'relhastriggers', cla.relhastriggers,
            'relrowsecurity', cla.relrowsecurity,
            'rows', stat.n_live_tup,
            'description', des.description
        ) as json
        from pg_views viw
            left join pg_class cla on viw.viewname = cla.relname
            left join pg_description des on des.objoid = cla.oid and objsubid = 0
            left join pg_stat_user_tables stat on viw.viewname = stat.relname
        order by viw.schemaname, viw.viewname"
        .to_string();

    let pool = state.postgres.pool().await?.clone();
    let rx = pipeline::spawn_pg_json_rows(pool, sql);
    let database = state.postgres.database();
    let basename = format!("{}-views", database);
    let title = format!("数据库 Postgresql - {} views", database);
    dispatch_export(mime, rx, None, &basename, &title).await
}

// GET /postgresql/table/:table?limit=100&mime=json|excel|docx
async fn table_dump(
    State(state): State<SharedState>,
    Path(table): Path<String>,
    Query(q): Query<ExportQuery>,
) -> ApiResult<Response> {
    let mime = parse_mime(q.mime_str())?;
    let limit = q.limit_or_default();
    let sql = format!("select row_to_json({}) as json from {} limit {}", table, table, limit);

    let pool = state.postgres.pool().await?.clone();
    let rx = pipeline::spawn_pg_json_rows(pool, sql);
    dispatch_export(mime, rx, None, &table, &table).await
}

// GET /postgresql/table/:table/columns?mime=json|excel|docx
async fn table_columns(
    State(state): State<SharedState>,
    Path(table): Path<String>,
    Query(q): Query<ExportQuery>,
) -> ApiResult<Response> {
    let mime = parse_mime(q.mime_str())?;
    let sql = format!(
        "select json_build_object(
            'ordinal_position', col.ordinal_position,
            'column_name', col.column_name,
            'table_schema', col.table_schema,
            'table_name', col.table_name,
            'data_type', col.data_type,
            'character_maximum_length', col.character_maximum_length,
            'numeric_precision', col.numeric_precision,
            'numeric_scale', col.numeric_scale,
            'is_nullable', col.is_nullable,
            'column_default', col.column_default,
            'description', des.description) as json
        from information_schema.columns col left join pg_description des
            on col.table_name::regclass = des.objoid
            and col.ordinal_position = des.objsubid
        where table_name = '{}'
        order by ordinal_position",
        table
    );

    let pool = state.postgres.pool().await?.clone();
    let rx = pipeline::spawn_pg_json_rows(pool, sql);
    let basename = format!("{}-columns", table);
    let title = format!("{} columns", table);
    dispatch_export(mime, rx, None, &basename, &title).await
}

// GET /postgresql/table/:table/indexes?mime=json|excel|docx
async fn table_indexes(
    State(state): State<SharedState>,
    Path(table): Path<String>,
    Query(q): Query<ExportQuery>,
) -> ApiResult<Response> {
    let mime = parse_mime(q.mime_str())?;
    let sql = format!(
        "select json_build_object(
            'indexname', a.indexname,
            'schemaname', a.schemaname,
            'tablename', a.tablename,
            'tablespace', a.tablespace,
            'indexdef', a.indexdef,
            'amname', b.amname,
            'indexrelid', c.indexrelid,
            'indnatts', c.indnatts,
            'indisunique', c.indisunique,
            'indisprimary', c.indisprimary,
            'indisclustered', c.indisclustered,
            'description', d.description) as json
        from
            pg_am b left join pg_class f on
            b.oid = f.relam left join pg_stat_all_indexes e on
            f.oid = e.indexrelid left join pg_index c on
            e.indexrelid = c.indexrelid left outer join pg_description d on
            c.indexrelid = d.objoid,
            pg_indexes a
        where
            a.schemaname = e.schemaname
            and a.tablename = e.relname
            and a.indexname = e.indexrelname
            and e.relname = '{}'",
        table
    );

    let pool = state.postgres.pool().await?.clone();
    let rx = pipeline::spawn_pg_json_rows(pool, sql);
    let basename = format!("{}-indexes", table);
    let title = format!("{} indexes", table);
    dispatch_export(mime, rx, None, &basename, &title).await
}

// GET /postgresql/procedures
async fn procedures(State(state): State<SharedState>) -> ApiResult<Response> {
    let sql = "select
            routine_catalog,
            routine_schema,
            routine_name,
            routine_type,
            routine_body,
            routine_definition,
            parameter_style,
            data_type
        from information_schema.routines"
        .to_string();
    map_rows_json(&state, sql).await
}

// GET /postgresql/procedure/:procedure
async fn procedure(
    State(state): State<SharedState>,
    Path(name): Path<String>,
) -> ApiResult<Response> {
    map_rows_json(&state, format!("select * from pg_proc where proname = '{}'", name)).await
}

/// 列扫描重编码路径：pg_proc 等系统表含无法直接 JSON 化的列，主机侧转 map
async fn map_rows_json(state: &AppState, sql: String) -> ApiResult<Response> {
    let pool = state.postgres.pool().await?.clone();
    let rx = pipeline::spawn_pg_map_rows(pool, sql);
    Ok(json_body(json::collect_json_array(rx).await?))
}
