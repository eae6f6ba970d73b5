//! 流式导出模块
//!
//! 查询端（生产者）把逐行 JSON 字符串写入有界通道，
//! 文档端（消费者）从通道增量生成 JSON / Excel / Word 输出，
//! 内存占用与结果集行数无关。

pub mod docx;
pub mod excel;
pub mod json;
pub mod pipeline;

pub use pipeline::{RowReceiver, CHANNEL_CAPACITY};

use axum::http::header;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;

/// 导出管道错误类型
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// 查询执行失败（连接或 SQL 错误），对当前请求是致命的
    #[error("查询执行失败: {0}")]
    Query(String),

    #[error("IO 错误: {0}")]
    Io(#[from] std::io::Error),

    #[error("Excel 写入失败: {0}")]
    Excel(String),

    #[error("Word 写入失败: {0}")]
    Docx(String),

    #[error("导出任务失败: {0}")]
    Task(String),
}

/// 导出格式，来自 `?mime=` 参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportMime {
    Json,
    Excel,
    Docx,
}

impl ExportMime {
    /// 解析 mime 参数，未知值返回 None（handler 返回 400）
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "json" => Some(Self::Json),
            "excel" => Some(Self::Excel),
            "docx" => Some(Self::Docx),
            _ => None,
        }
    }
}

/// 导出类端点的通用查询参数
#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    /// json（缺省）| excel | docx
    pub mime: Option<String>,
    /// 单表 dump 的行数上限
    pub limit: Option<u32>,
}

impl ExportQuery {
    pub fn mime_str(&self) -> &str {
        self.mime.as_deref().unwrap_or("json")
    }

    /// limit 缺省 100，超过 10000 回退到 100（与原有行为一致）
    pub fn limit_or_default(&self) -> u32 {
        match self.limit {
            Some(n) if n >= 1 && n <= 10000 => n,
            _ => 100,
        }
    }
}

pub const XLSX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const DOCX_CONTENT_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";

/// 以附件形式返回生成好的文档字节
pub fn attachment_response(filename: &str, content_type: &str, bytes: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        bytes,
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_parse() {
        assert_eq!(ExportMime::parse("json"), Some(ExportMime::Json));
        assert_eq!(ExportMime::parse("excel"), Some(ExportMime::Excel));
        assert_eq!(ExportMime::parse("docx"), Some(ExportMime::Docx));
        assert_eq!(ExportMime::parse("xml"), None);
        assert_eq!(ExportMime::parse(""), None);
    }

    #[test]
    fn test_limit_bounds() {
        let q = ExportQuery { mime: None, limit: None };
        assert_eq!(q.limit_or_default(), 100);
        let q = ExportQuery { mime: None, limit: Some(500) };
        assert_eq!(q.limit_or_default(), 500);
        // 超出上限回退缺省值
        let q = ExportQuery { mime: None, limit: Some(20000) };
        assert_eq!(q.limit_or_default(), 100);
        let q = ExportQuery { mime: None, limit: Some(0) };
        assert_eq!(q.limit_or_default(), 100);
    }
}
