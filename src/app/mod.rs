//! 业务 handler 模块
//!
//! 每个后端一个子模块，各自导出一个 Router，由 main 挂到对应前缀下。
//! 导出类端点共用 dispatch_export：先校验 mime 再查库。

use std::sync::Arc;

use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::{middleware, routing::get, Router};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::core::error::{ApiError, ApiResult};
use crate::export::{
    attachment_response, docx, excel, json, ExportMime, RowReceiver, DOCX_CONTENT_TYPE,
    XLSX_CONTENT_TYPE,
};
use crate::state::AppState;

pub mod clickhouse;
pub mod host;
pub mod meta;
pub mod minio;
pub mod mysql;
pub mod postgres;
pub mod redis;

pub type SharedState = Arc<AppState>;

/// 组装全部路由与中间件
pub fn build_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(|| async { axum::response::Redirect::permanent("/meta") }))
        .nest("/meta", meta::router())
        .nest("/mysql", mysql::router())
        .nest("/postgresql", postgres::router())
        .nest("/clickhouse", clickhouse::router())
        .nest("/redis", redis::router())
        .nest("/minio", minio::router())
        .nest("/host", host::router())
        .layer(middleware::from_fn(
            crate::core::middleware::request_logging_middleware,
        ))
        .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 行通道按 mime 分发到对应的文档写入端。
/// 调用方必须在发起查询前用 `ExportMime::parse` 校验过 mime。
pub(crate) async fn dispatch_export(
    mime: ExportMime,
    rx: RowReceiver,
    headers: Option<Vec<String>>,
    basename: &str,
    title: &str,
) -> ApiResult<Response> {
    match mime {
        ExportMime::Json => Ok((
            [(header::CONTENT_TYPE, "application/json")],
            json::json_array_body(rx),
        )
            .into_response()),
        ExportMime::Excel => {
            let bytes = excel::rows_to_xlsx(rx, headers, title.to_string()).await?;
            Ok(attachment_response(
                &format!("{}.xlsx", basename),
                XLSX_CONTENT_TYPE,
                bytes,
            ))
        }
        ExportMime::Docx => {
            let bytes = docx::rows_to_docx(rx, headers, title.to_string()).await?;
            Ok(attachment_response(
                &format!("{}.docx", basename),
                DOCX_CONTENT_TYPE,
                bytes,
            ))
        }
    }
}

/// mime 参数解析，不支持的值直接 400
pub(crate) fn parse_mime(mime: &str) -> ApiResult<ExportMime> {
    ExportMime::parse(mime).ok_or_else(|| ApiError::unsupported_mime(mime))
}

/// text/html 响应（各模块首页导航）
pub(crate) fn html_page(body: &'static str) -> Response {
    ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], body).into_response()
}

/// application/json 响应（已序列化好的字符串）
pub(crate) fn json_body(body: String) -> Response {
    ([(header::CONTENT_TYPE, "application/json")], body).into_response()
}
