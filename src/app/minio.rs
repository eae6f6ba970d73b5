//! /minio 路由
//!
//! 走 S3 兼容 API：自定义 endpoint + path-style 寻址。
//! 客户端首次使用时构建（静态凭据，不走环境变量链）。

use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::{debug, trace};

use crate::core::error::{ApiError, ApiResult};
use crate::export::attachment_response;
use crate::state::AppState;

use super::SharedState;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/buckets", get(buckets))
        .route("/bucket/:bucket/objects", get(objects))
        .route("/bucket/:bucket/object-meta/:object", get(object_meta))
        .route("/bucket/:bucket/object/:object", get(object_download))
}

/// 取 S3 客户端，首次调用时构建
async fn client(state: &AppState) -> &aws_sdk_s3::Client {
    state
        .s3
        .get_or_init(|| async {
            let conf = &state.config.minio;
            let credentials =
                Credentials::new(&conf.user, &conf.password, None, None, "minio-static");
            let sdk_config = aws_config::defaults(BehaviorVersion::latest())
                .endpoint_url(&conf.endpoint)
                .region(Region::new(conf.region.clone()))
                .credentials_provider(credentials)
                .load()
                .await;
            // MinIO 不支持 virtual-host 寻址，必须 path-style
            let s3_config = aws_sdk_s3::config::Builder::from(&sdk_config)
                .force_path_style(true)
                .build();
            debug!("构建 minio s3 客户端 [{}]", conf.endpoint);
            aws_sdk_s3::Client::from_conf(s3_config)
        })
        .await
}

// GET /minio/buckets
async fn buckets(State(state): State<SharedState>) -> ApiResult<Json<Value>> {
    trace!("/minio/buckets");
    let out = client(&state)
        .await
        .list_buckets()
        .send()
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?;

    let buckets: Vec<Value> = out
        .buckets()
        .iter()
        .map(|b| {
            json!({
                "name": b.name().unwrap_or_default(),
                "creation_date": b.creation_date().map(|d| d.to_string()),
            })
        })
        .collect();
    Ok(Json(json!(buckets)))
}

// GET /minio/bucket/:bucket/objects
async fn objects(
    State(state): State<SharedState>,
    Path(bucket): Path<String>,
) -> ApiResult<Json<Value>> {
    trace!("/minio/bucket/{}/objects", bucket);
    let mut pages = client(&state)
        .await
        .list_objects_v2()
        .bucket(&bucket)
        .into_paginator()
        .send();

    let mut keys: Vec<String> = Vec::new();
    while let Some(page) = pages.next().await {
        let page = page.map_err(|e| ApiError::internal(e.to_string()))?;
        for obj in page.contents() {
            if let Some(key) = obj.key() {
                keys.push(key.to_string());
            }
        }
    }
    Ok(Json(json!(keys)))
}

// GET /minio/bucket/:bucket/object-meta/:object
async fn object_meta(
    State(state): State<SharedState>,
    Path((bucket, object)): Path<(String, String)>,
) -> ApiResult<Json<Value>> {
    trace!("/minio/bucket/{}/object-meta/{}", bucket, object);
    let out = client(&state)
        .await
        .head_object()
        .bucket(&bucket)
        .key(&object)
        .send()
        .await
        .map_err(|e| {
            ApiError::internal(format!(
                "bucket: '{}', object: '{}', {}",
                bucket, object, e
            ))
        })?;

    Ok(Json(json!({
        "bucket": bucket,
        "key": object,
        "content_length": out.content_length(),
        "content_type": out.content_type(),
        "etag": out.e_tag(),
        "last_modified": out.last_modified().map(|d| d.to_string()),
        "metadata": out.metadata(),
    })))
}

// GET /minio/bucket/:bucket/object/:object
// 以附件下载
async fn object_download(
    State(state): State<SharedState>,
    Path((bucket, object)): Path<(String, String)>,
) -> ApiResult<Response> {
    trace!("/minio/bucket/{}/object/{}", bucket, object);
    let out = client(&state)
        .await
        .get_object()
        .bucket(&bucket)
        .key(&object)
        .send()
        .await
        .map_err(|e| {
            ApiError::internal(format!(
                "bucket: '{}', object: '{}', {}",
                bucket, object, e
            ))
        })?;

    let content_type = out
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let bytes = out
        .body
        .collect()
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .into_bytes();

    Ok(attachment_response(&object, &content_type, bytes.to_vec()))
}
