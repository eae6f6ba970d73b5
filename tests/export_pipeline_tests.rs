//! 导出管道集成测试
//!
//! 不连真实数据库，直接向通道喂行，验证管道的可观测性质：
//! 顺序、行数、背压、错误必须浮出而不是悄悄截断。

use apptpl::export::json::{collect_json_array, json_array_body};
use apptpl::export::pipeline::{channel, CHANNEL_CAPACITY};
use apptpl::export::{docx, excel, ExportError};
use http_body_util::BodyExt;

#[tokio::test]
async fn test_three_rows_in_order() {
    let (tx, rx) = channel();
    tokio::spawn(async move {
        for (id, name) in [(1, "a"), (2, "b"), (3, "c")] {
            tx.send(Ok(format!("{{\"id\":{},\"name\":\"{}\"}}", id, name)))
                .await
                .unwrap();
        }
    });

    let body = collect_json_array(rx).await.unwrap();
    assert_eq!(
        body,
        r#"[{"id":1,"name":"a"},{"id":2,"name":"b"},{"id":3,"name":"c"}]"#
    );
}

#[tokio::test]
async fn test_n_rows_parse_as_n_elements() {
    let n = 500;
    let (tx, rx) = channel();
    tokio::spawn(async move {
        for i in 0..n {
            tx.send(Ok(format!("{{\"n\":{}}}", i))).await.unwrap();
        }
    });

    let body = collect_json_array(rx).await.unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();
    let arr = parsed.as_array().unwrap();
    assert_eq!(arr.len(), n);
    assert_eq!(arr[0]["n"], 0);
    assert_eq!(arr[n - 1]["n"], (n - 1) as u64);
}

#[tokio::test]
async fn test_producer_blocks_at_capacity() {
    // 消费者不动时，生产者最多能入队 CHANNEL_CAPACITY 行，
    // 之后必须挂起等待，内存上界与总行数无关
    let (tx, mut rx) = channel();

    for i in 0..CHANNEL_CAPACITY {
        tx.try_send(Ok(i.to_string())).unwrap();
    }
    assert!(tx.try_send(Ok("one-too-many".to_string())).is_err());

    // 消费一行之后又能入队一行
    rx.recv().await.unwrap().unwrap();
    tx.try_send(Ok("fits-now".to_string())).unwrap();
}

#[tokio::test]
async fn test_failure_after_two_of_five_rows() {
    let (tx, mut rx) = channel();
    tokio::spawn(async move {
        tx.send(Ok("{\"n\":1}".to_string())).await.unwrap();
        tx.send(Ok("{\"n\":2}".to_string())).await.unwrap();
        tx.send(Err(ExportError::Query("query interrupted".to_string())))
            .await
            .unwrap();
        // 生产者 fail-fast，不会再发剩下的 3 行
    });

    let mut rows = 0;
    let mut error: Option<ExportError> = None;
    while let Some(item) = rx.recv().await {
        match item {
            Ok(_) => rows += 1,
            Err(e) => {
                error = Some(e);
                break;
            }
        }
    }
    assert_eq!(rows, 2);
    assert!(error.unwrap().to_string().contains("query interrupted"));
}

#[tokio::test]
async fn test_streaming_body_never_fakes_success() {
    let (tx, rx) = channel();
    tokio::spawn(async move {
        tx.send(Ok("{\"n\":1}".to_string())).await.unwrap();
        tx.send(Err(ExportError::Query("connection lost".to_string())))
            .await
            .unwrap();
    });

    // 中途失败时响应体整体收集必须失败，客户端不会拿到合法 JSON
    let result = json_array_body(rx).collect().await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_dropping_consumer_stops_producer() {
    let (tx, rx) = channel();
    drop(rx);
    // 客户端断开后生产者的 send 失败，任务应就此退出
    assert!(tx.send(Ok("{}".to_string())).await.is_err());
}

#[tokio::test]
async fn test_excel_fixed_header_order_and_missing_keys() {
    let (tx, rx) = channel();
    tokio::spawn(async move {
        tx.send(Ok("{\"id\":1,\"name\":\"a\"}".to_string())).await.unwrap();
        // 缺 name 列，应渲染为空单元格而不是报错
        tx.send(Ok("{\"id\":2}".to_string())).await.unwrap();
    });

    let headers = Some(vec!["id".to_string(), "name".to_string()]);
    let bytes = excel::rows_to_xlsx(rx, headers, "t".to_string()).await.unwrap();
    assert_eq!(&bytes[..2], b"PK");
}

#[tokio::test]
async fn test_docx_writer_consumes_channel() {
    let (tx, rx) = channel();
    tokio::spawn(async move {
        for i in 0..10 {
            tx.send(Ok(format!("{{\"n\":{}}}", i))).await.unwrap();
        }
    });

    let bytes = docx::rows_to_docx(rx, None, "数据".to_string()).await.unwrap();
    assert_eq!(&bytes[..2], b"PK");
}
