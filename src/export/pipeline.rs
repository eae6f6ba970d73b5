//! 行通道：查询游标与文档写入端之间的有界队列
//!
//! 通道元素是 `Result<String, ExportError>`：Ok 为一行已序列化的 JSON，
//! Err 表示生产者中途失败，消费者必须停止并向上暴露错误，
//! 不能把截断的流当成正常结束。通道关闭且无 Err 才是成功结束。

use futures::TryStreamExt;
use serde_json::Value;
use sqlx::mysql::MySqlRow;
use sqlx::postgres::PgRow;
use sqlx::{Column, MySqlPool, PgPool, Row};
use tokio::sync::mpsc;
use tracing::{trace, warn};

use super::ExportError;

/// 通道容量：内存上界 = 容量 × 行大小，与结果集行数无关
pub const CHANNEL_CAPACITY: usize = 100;

pub type RowSender = mpsc::Sender<Result<String, ExportError>>;
pub type RowReceiver = mpsc::Receiver<Result<String, ExportError>>;

pub fn channel() -> (RowSender, RowReceiver) {
    mpsc::channel(CHANNEL_CAPACITY)
}

/// MySQL：SQL 本身返回单列 JSON（json_object），逐行送入通道。
/// 行解码失败只记日志并跳过；查询失败送 Err 后立刻结束（fail-fast）。
pub fn spawn_mysql_json_rows(pool: MySqlPool, sql: String) -> RowReceiver {
    let (tx, rx) = channel();
    tokio::spawn(async move {
        trace!("mysql sql: {}", sql);
        let mut rows = sqlx::query(&sql).fetch(&pool);
        let mut count: u64 = 0;
        loop {
            match rows.try_next().await {
                Ok(Some(row)) => match row.try_get::<Value, _>(0) {
                    Ok(v) => {
                        count += 1;
                        if tx.send(Ok(v.to_string())).await.is_err() {
                            // 消费端已经离开（客户端断开），直接收尾
                            return;
                        }
                    }
                    Err(e) => warn!("mysql 行解码失败，跳过: {}", e),
                },
                Ok(None) => break,
                Err(e) => {
                    let _ = tx.send(Err(ExportError::Query(e.to_string()))).await;
                    return;
                }
            }
        }
        trace!("mysql query rows: {}", count);
    });
    rx
}

/// MySQL：任意 SQL，按列名在主机侧重编码成 JSON map（describe / ddl 一类语句）
pub fn spawn_mysql_map_rows(pool: MySqlPool, sql: String) -> RowReceiver {
    let (tx, rx) = channel();
    tokio::spawn(async move {
        trace!("mysql sql: {}", sql);
        let mut rows = sqlx::query(&sql).fetch(&pool);
        loop {
            match rows.try_next().await {
                Ok(Some(row)) => {
                    let v = mysql_row_to_json(&row);
                    if tx.send(Ok(v.to_string())).await.is_err() {
                        return;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    let _ = tx.send(Err(ExportError::Query(e.to_string()))).await;
                    return;
                }
            }
        }
    });
    rx
}

/// PostgreSQL：任意 SQL，按列名在主机侧重编码成 JSON map（pg_proc 一类系统表）
pub fn spawn_pg_map_rows(pool: PgPool, sql: String) -> RowReceiver {
    let (tx, rx) = channel();
    tokio::spawn(async move {
        trace!("postgresql sql: {}", sql);
        let mut rows = sqlx::query(&sql).fetch(&pool);
        loop {
            match rows.try_next().await {
                Ok(Some(row)) => {
                    let v = pg_row_to_json(&row);
                    if tx.send(Ok(v.to_string())).await.is_err() {
                        return;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    let _ = tx.send(Err(ExportError::Query(e.to_string()))).await;
                    return;
                }
            }
        }
    });
    rx
}

/// PostgreSQL：SQL 本身返回单列 JSON（row_to_json / json_build_object）
pub fn spawn_pg_json_rows(pool: PgPool, sql: String) -> RowReceiver {
    let (tx, rx) = channel();
    tokio::spawn(async move {
        trace!("postgresql sql: {}", sql);
        let mut rows = sqlx::query(&sql).fetch(&pool);
        let mut count: u64 = 0;
        loop {
            match rows.try_next().await {
                Ok(Some(row)) => match row.try_get::<Value, _>(0) {
                    Ok(v) => {
                        count += 1;
                        if tx.send(Ok(v.to_string())).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => warn!("postgresql 行解码失败，跳过: {}", e),
                },
                Ok(None) => break,
                Err(e) => {
                    let _ = tx.send(Err(ExportError::Query(e.to_string()))).await;
                    return;
                }
            }
        }
        trace!("postgresql query rows: {}", count);
    });
    rx
}

/// HTTP 响应体按行切分送入通道（ClickHouse FORMAT JSONEachRow：一行一个 JSON 对象）
pub fn spawn_json_lines(resp: reqwest::Response) -> RowReceiver {
    let (tx, rx) = channel();
    tokio::spawn(async move {
        let mut stream = resp.bytes_stream();
        let mut buf: Vec<u8> = Vec::new();
        loop {
            match stream.try_next().await {
                Ok(Some(chunk)) => {
                    buf.extend_from_slice(&chunk);
                    while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                        let line: Vec<u8> = buf.drain(..=pos).collect();
                        if let Some(row) = decode_line(&line[..line.len() - 1]) {
                            if tx.send(Ok(row)).await.is_err() {
                                return;
                            }
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    let _ = tx.send(Err(ExportError::Query(e.to_string()))).await;
                    return;
                }
            }
        }
        // 收尾：最后一行可能没有换行符
        if let Some(row) = decode_line(&buf) {
            let _ = tx.send(Ok(row)).await;
        }
    });
    rx
}

fn decode_line(line: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(line).ok()?.trim();
    if text.is_empty() {
        return None;
    }
    Some(text.to_string())
}

/// MySQL 行转 JSON map。能按字符串取出的列取字符串，
/// 否则依次尝试整数、浮点、布尔，全部失败记为 null（对应 Go 版的 []byte 转 string 回退）。
pub fn mysql_row_to_json(row: &MySqlRow) -> Value {
    let mut map = serde_json::Map::new();
    for (i, col) in row.columns().iter().enumerate() {
        let v = if let Ok(v) = row.try_get::<Option<String>, _>(i) {
            v.map(Value::String).unwrap_or(Value::Null)
        } else if let Ok(v) = row.try_get::<Option<i64>, _>(i) {
            v.map(Value::from).unwrap_or(Value::Null)
        } else if let Ok(v) = row.try_get::<Option<f64>, _>(i) {
            v.map(Value::from).unwrap_or(Value::Null)
        } else if let Ok(v) = row.try_get::<Option<bool>, _>(i) {
            v.map(Value::from).unwrap_or(Value::Null)
        } else if let Ok(v) = row.try_get::<Option<Vec<u8>>, _>(i) {
            v.map(|b| Value::String(String::from_utf8_lossy(&b).into_owned()))
                .unwrap_or(Value::Null)
        } else {
            Value::Null
        };
        map.insert(col.name().to_string(), v);
    }
    Value::Object(map)
}

/// PostgreSQL 行转 JSON map，回退顺序同上
pub fn pg_row_to_json(row: &PgRow) -> Value {
    let mut map = serde_json::Map::new();
    for (i, col) in row.columns().iter().enumerate() {
        let v = if let Ok(v) = row.try_get::<Option<String>, _>(i) {
            v.map(Value::String).unwrap_or(Value::Null)
        } else if let Ok(v) = row.try_get::<Option<i64>, _>(i) {
            v.map(Value::from).unwrap_or(Value::Null)
        } else if let Ok(v) = row.try_get::<Option<f64>, _>(i) {
            v.map(Value::from).unwrap_or(Value::Null)
        } else if let Ok(v) = row.try_get::<Option<bool>, _>(i) {
            v.map(Value::from).unwrap_or(Value::Null)
        } else {
            Value::Null
        };
        map.insert(col.name().to_string(), v);
    }
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_channel_preserves_order() {
        let (tx, mut rx) = channel();
        tokio::spawn(async move {
            for i in 0..10 {
                tx.send(Ok(format!("{{\"n\":{}}}", i))).await.unwrap();
            }
        });
        let mut got = Vec::new();
        while let Some(item) = rx.recv().await {
            got.push(item.unwrap());
        }
        assert_eq!(got.len(), 10);
        assert_eq!(got[0], "{\"n\":0}");
        assert_eq!(got[9], "{\"n\":9}");
    }

    #[tokio::test]
    async fn test_channel_backpressure() {
        // 填满通道后 try_send 必须失败，生产端只能挂起等待消费
        let (tx, _rx) = channel();
        for i in 0..CHANNEL_CAPACITY {
            tx.try_send(Ok(i.to_string())).unwrap();
        }
        assert!(tx.try_send(Ok("overflow".to_string())).is_err());
    }

    #[tokio::test]
    async fn test_error_is_tagged_not_silent() {
        // 出错后消费者必须能区分"截断"与"正常结束"
        let (tx, mut rx) = channel();
        tokio::spawn(async move {
            tx.send(Ok("{\"a\":1}".to_string())).await.unwrap();
            tx.send(Ok("{\"a\":2}".to_string())).await.unwrap();
            tx.send(Err(ExportError::Query("connection reset".to_string())))
                .await
                .unwrap();
        });
        let mut rows = 0;
        let mut saw_error = false;
        while let Some(item) = rx.recv().await {
            match item {
                Ok(_) => rows += 1,
                Err(_) => {
                    saw_error = true;
                    break;
                }
            }
        }
        assert_eq!(rows, 2);
        assert!(saw_error);
    }
}
