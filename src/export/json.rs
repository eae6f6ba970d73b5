//! JSON 流式输出
//!
//! 把行通道转换成 HTTP 流式响应体：边读边写，不在内存里攒完整数组。
//! 中途收到 Err 时让流返回 IO 错误，连接被服务器端中止，
//! 客户端看到的是失败而不是一个截断的"成功"数组。

use async_stream::stream;
use axum::body::Body;
use tracing::error;

use super::RowReceiver;

/// 通道 → `[row,row,...]` 形式的流式响应体
pub fn json_array_body(mut rx: RowReceiver) -> Body {
    let s = stream! {
        yield Ok::<_, std::io::Error>(String::from("["));
        let mut first = true;
        while let Some(item) = rx.recv().await {
            match item {
                Ok(row) => {
                    if first {
                        first = false;
                        yield Ok(row);
                    } else {
                        yield Ok(format!(",{}", row));
                    }
                }
                Err(e) => {
                    // 响应头已发出，只能中止连接来暴露失败
                    error!("导出流中断: {}", e);
                    yield Err(std::io::Error::other(e.to_string()));
                    return;
                }
            }
        }
        yield Ok(String::from("]"));
    };
    Body::from_stream(s)
}

/// 通道 → 完整 JSON 数组字符串（小结果集 / 需要缓存的场合）
pub async fn collect_json_array(mut rx: RowReceiver) -> Result<String, super::ExportError> {
    let mut out = String::from("[");
    let mut first = true;
    while let Some(item) = rx.recv().await {
        let row = item?;
        if first {
            first = false;
        } else {
            out.push(',');
        }
        out.push_str(&row);
    }
    out.push(']');
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{pipeline, ExportError};

    #[tokio::test]
    async fn test_collect_json_array() {
        let (tx, rx) = pipeline::channel();
        tokio::spawn(async move {
            tx.send(Ok("{\"id\":1,\"name\":\"a\"}".to_string())).await.unwrap();
            tx.send(Ok("{\"id\":2,\"name\":\"b\"}".to_string())).await.unwrap();
            tx.send(Ok("{\"id\":3,\"name\":\"c\"}".to_string())).await.unwrap();
        });
        let body = collect_json_array(rx).await.unwrap();
        assert_eq!(
            body,
            "[{\"id\":1,\"name\":\"a\"},{\"id\":2,\"name\":\"b\"},{\"id\":3,\"name\":\"c\"}]"
        );
        let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed.as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_collect_empty_is_empty_array() {
        let (tx, rx) = pipeline::channel();
        drop(tx);
        assert_eq!(collect_json_array(rx).await.unwrap(), "[]");
    }

    #[tokio::test]
    async fn test_collect_surfaces_mid_stream_error() {
        let (tx, rx) = pipeline::channel();
        tokio::spawn(async move {
            tx.send(Ok("{\"id\":1}".to_string())).await.unwrap();
            tx.send(Err(ExportError::Query("server has gone away".to_string())))
                .await
                .unwrap();
        });
        let err = collect_json_array(rx).await.unwrap_err();
        assert!(err.to_string().contains("server has gone away"));
    }

    #[tokio::test]
    async fn test_streaming_body_aborts_on_error() {
        use http_body_util::BodyExt;

        let (tx, rx) = pipeline::channel();
        tokio::spawn(async move {
            tx.send(Ok("{\"id\":1}".to_string())).await.unwrap();
            tx.send(Err(ExportError::Query("boom".to_string()))).await.unwrap();
        });
        let body = json_array_body(rx);
        // 收集整个 body 必须失败，而不是得到一个截断的数组
        assert!(body.collect().await.is_err());
    }

    #[tokio::test]
    async fn test_streaming_body_success() {
        use http_body_util::BodyExt;

        let (tx, rx) = pipeline::channel();
        tokio::spawn(async move {
            tx.send(Ok("{\"id\":1}".to_string())).await.unwrap();
            tx.send(Ok("{\"id\":2}".to_string())).await.unwrap();
        });
        let bytes = json_array_body(rx).collect().await.unwrap().to_bytes();
        assert_eq!(&bytes[..], b"[{\"id\":1},{\"id\":2}]");
    }
}
