//! 请求处理器
//!
//! - `storage`: 签名 URL
//! - `translate`: 翻译与摘要（流式中继）
//! - `passthrough`: 导出、下载、健康检查、清空缓存

pub mod passthrough;
pub mod storage;
pub mod translate;

pub use passthrough::{clear_cache, download, export_summary, health};
pub use storage::{signed_url_read, signed_url_write};
pub use translate::{summarize, translate};
