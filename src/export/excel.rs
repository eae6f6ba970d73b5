//! Excel 导出
//!
//! 消费行通道生成 xlsx：表头一行（加粗、黄色底），之后逐行写入。
//! xlsxwriter 是同步库且只写文件路径，所以放到阻塞线程池里跑，
//! 输出文件用临时文件承载，读回字节后随 RAII 删除。

use serde_json::Value;
use xlsxwriter::prelude::*;

use super::{ExportError, RowReceiver};

/// 表头单元格底色
const HEADER_BG: u32 = 0xFFFF99;

/// 列序号转 Excel 列名：0 -> A，25 -> Z，26 -> AA
pub fn column_name(mut index: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    name.reverse();
    String::from_utf8(name).unwrap_or_default()
}

/// 单元格文本：字符串不带引号，null 为空串，其余用 JSON 字面量
fn cell_text(v: Option<&Value>) -> String {
    match v {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// 行通道 → xlsx 字节。headers 为空时取首行按 key 排序作表头。
pub async fn rows_to_xlsx(
    mut rx: RowReceiver,
    headers: Option<Vec<String>>,
    sheet_name: String,
) -> Result<Vec<u8>, ExportError> {
    tokio::task::spawn_blocking(move || {
        let tmp = tempfile::Builder::new()
            .suffix(".xlsx")
            .tempfile()?;
        let path = tmp.path().to_string_lossy().into_owned();

        let workbook =
            Workbook::new(&path).map_err(|e| ExportError::Excel(e.to_string()))?;
        let mut sheet = workbook
            .add_worksheet(Some(&sheet_name))
            .map_err(|e| ExportError::Excel(e.to_string()))?;

        let mut header_format = Format::new();
        header_format.set_bold().set_bg_color(FormatColor::Custom(HEADER_BG));

        let mut headers = headers;
        let mut row_idx: u32 = 0;

        while let Some(item) = rx.blocking_recv() {
            let row = item?;
            let obj: Value = serde_json::from_str(&row)
                .map_err(|e| ExportError::Excel(format!("行不是合法 JSON: {}", e)))?;
            if headers.is_none() {
                let mut keys: Vec<String> = obj
                    .as_object()
                    .map(|m| m.keys().cloned().collect())
                    .unwrap_or_default();
                keys.sort();
                headers = Some(keys);
            }
            let cols = headers.as_ref().map(|h| h.as_slice()).unwrap_or_default();
            if row_idx == 0 {
                for (c, name) in cols.iter().enumerate() {
                    sheet
                        .write_string(0, c as u16, name, Some(&header_format))
                        .map_err(|e| ExportError::Excel(e.to_string()))?;
                }
                row_idx = 1;
            }
            for (c, name) in cols.iter().enumerate() {
                let text = cell_text(obj.get(name));
                sheet
                    .write_string(row_idx, c as u16, &text, None)
                    .map_err(|e| ExportError::Excel(e.to_string()))?;
            }
            row_idx += 1;
        }

        // 空结果集也要给出表头（有预设表头时）
        if row_idx == 0 {
            if let Some(cols) = headers.as_ref() {
                for (c, name) in cols.iter().enumerate() {
                    sheet
                        .write_string(0, c as u16, name, Some(&header_format))
                        .map_err(|e| ExportError::Excel(e.to_string()))?;
                }
            }
        }

        workbook.close().map_err(|e| ExportError::Excel(e.to_string()))?;
        let bytes = std::fs::read(&path)?;
        Ok(bytes)
    })
    .await
    .map_err(|e| ExportError::Task(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::pipeline;

    #[test]
    fn test_column_name() {
        assert_eq!(column_name(0), "A");
        assert_eq!(column_name(1), "B");
        assert_eq!(column_name(25), "Z");
        assert_eq!(column_name(26), "AA");
        assert_eq!(column_name(27), "AB");
        assert_eq!(column_name(51), "AZ");
        assert_eq!(column_name(52), "BA");
        assert_eq!(column_name(701), "ZZ");
        assert_eq!(column_name(702), "AAA");
    }

    #[test]
    fn test_cell_text() {
        use serde_json::json;
        assert_eq!(cell_text(None), "");
        assert_eq!(cell_text(Some(&Value::Null)), "");
        assert_eq!(cell_text(Some(&json!("abc"))), "abc");
        assert_eq!(cell_text(Some(&json!(42))), "42");
        assert_eq!(cell_text(Some(&json!(1.5))), "1.5");
        assert_eq!(cell_text(Some(&json!(true))), "true");
    }

    #[tokio::test]
    async fn test_rows_to_xlsx_produces_workbook() {
        let (tx, rx) = pipeline::channel();
        tokio::spawn(async move {
            tx.send(Ok("{\"id\":1,\"name\":\"a\"}".to_string())).await.unwrap();
            tx.send(Ok("{\"id\":2,\"name\":\"b\"}".to_string())).await.unwrap();
        });
        let bytes = rows_to_xlsx(rx, None, "数据".to_string()).await.unwrap();
        // xlsx 是 zip 容器，以 PK 开头
        assert!(bytes.len() > 4);
        assert_eq!(&bytes[..2], b"PK");
    }

    #[tokio::test]
    async fn test_rows_to_xlsx_surfaces_error() {
        let (tx, rx) = pipeline::channel();
        tokio::spawn(async move {
            tx.send(Ok("{\"id\":1}".to_string())).await.unwrap();
            tx.send(Err(ExportError::Query("lost connection".to_string())))
                .await
                .unwrap();
        });
        let err = rows_to_xlsx(rx, None, "数据".to_string()).await.unwrap_err();
        assert!(err.to_string().contains("lost connection"));
    }
}
