//! Word 导出
//!
//! 消费行通道生成 docx：标题、产生时间、数据表格、行数小结。
//! 表格需要整体构建才能打包，但行通道仍然限制了查询端的内存峰值。

use chrono::Local;
use docx_rs::{Docx, Paragraph, Run, Table, TableCell, TableRow};
use serde_json::Value;
use std::io::Cursor;

use super::{ExportError, RowReceiver};

fn text_cell(text: &str) -> TableCell {
    TableCell::new().add_paragraph(Paragraph::new().add_run(Run::new().add_text(text)))
}

fn header_cell(text: &str) -> TableCell {
    TableCell::new()
        .add_paragraph(Paragraph::new().add_run(Run::new().add_text(text).bold()))
}

fn cell_text(v: Option<&Value>) -> String {
    match v {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// 行通道 → docx 字节。headers 为空时取首行按 key 排序作表头。
pub async fn rows_to_docx(
    mut rx: RowReceiver,
    headers: Option<Vec<String>>,
    title: String,
) -> Result<Vec<u8>, ExportError> {
    tokio::task::spawn_blocking(move || {
        let mut headers = headers;
        let mut table_rows: Vec<TableRow> = Vec::new();
        let mut count: u64 = 0;

        while let Some(item) = rx.blocking_recv() {
            let row = item?;
            let obj: Value = serde_json::from_str(&row)
                .map_err(|e| ExportError::Docx(format!("行不是合法 JSON: {}", e)))?;
            if headers.is_none() {
                let mut keys: Vec<String> = obj
                    .as_object()
                    .map(|m| m.keys().cloned().collect())
                    .unwrap_or_default();
                keys.sort();
                headers = Some(keys);
            }
            let cols = headers.as_ref().map(|h| h.as_slice()).unwrap_or_default();
            if table_rows.is_empty() {
                table_rows.push(TableRow::new(
                    cols.iter().map(|h| header_cell(h)).collect(),
                ));
            }
            table_rows.push(TableRow::new(
                cols.iter()
                    .map(|h| text_cell(&cell_text(obj.get(h))))
                    .collect(),
            ));
            count += 1;
        }

        if table_rows.is_empty() {
            if let Some(cols) = headers.as_ref() {
                table_rows.push(TableRow::new(
                    cols.iter().map(|h| header_cell(h)).collect(),
                ));
            }
        }

        let now = Local::now().format("%Y-%m-%d %H:%M:%S");
        let mut docx = Docx::new()
            .add_paragraph(
                Paragraph::new().add_run(Run::new().add_text(title.as_str()).bold().size(32)),
            )
            .add_paragraph(
                Paragraph::new().add_run(Run::new().add_text(format!("产生时间: {}", now))),
            );
        if !table_rows.is_empty() {
            docx = docx.add_table(Table::new(table_rows));
        }
        docx = docx.add_paragraph(
            Paragraph::new().add_run(Run::new().add_text(format!("共 {} 行", count))),
        );

        let mut buf = Cursor::new(Vec::new());
        docx.build()
            .pack(&mut buf)
            .map_err(|e| ExportError::Docx(e.to_string()))?;
        Ok(buf.into_inner())
    })
    .await
    .map_err(|e| ExportError::Task(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::pipeline;

    #[tokio::test]
    async fn test_rows_to_docx_produces_document() {
        let (tx, rx) = pipeline::channel();
        tokio::spawn(async move {
            tx.send(Ok("{\"id\":1,\"name\":\"a\"}".to_string())).await.unwrap();
            tx.send(Ok("{\"id\":2,\"name\":\"b\"}".to_string())).await.unwrap();
        });
        let bytes = rows_to_docx(rx, None, "表数据".to_string()).await.unwrap();
        // docx 是 zip 容器
        assert!(bytes.len() > 4);
        assert_eq!(&bytes[..2], b"PK");
    }

    #[tokio::test]
    async fn test_rows_to_docx_empty() {
        let (tx, rx) = pipeline::channel();
        drop(tx);
        let bytes = rows_to_docx(rx, Some(vec!["id".to_string()]), "空表".to_string())
            .await
            .unwrap();
        assert_eq!(&bytes[..2], b"PK");
    }

    #[tokio::test]
    async fn test_rows_to_docx_surfaces_error() {
        let (tx, rx) = pipeline::channel();
        tokio::spawn(async move {
            tx.send(Err(ExportError::Query("timeout".to_string()))).await.unwrap();
        });
        let err = rows_to_docx(rx, None, "表数据".to_string()).await.unwrap_err();
        assert!(err.to_string().contains("timeout"));
    }
}
