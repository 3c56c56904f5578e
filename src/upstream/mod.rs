//! 上游翻译服务模块
//!
//! 翻译/摘要的实际逻辑位于外部 HTTP 服务，本模块只负责传输：
//! 组装 multipart 请求、选择端点、把响应体交给中继引擎。

pub mod client;
pub mod error;
pub mod request;

pub use client::{endpoints, TranslationClient, UpstreamResponse, SUMMARIZE_PDF_ONLY};
pub use error::UpstreamError;
pub use request::{
    parse_flag, FileRef, InputFile, TranslationRequest, MASTER_MODE_MAX_TOTAL_CHARS,
};
