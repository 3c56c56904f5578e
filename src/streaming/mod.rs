//! 流式中继核心模块
//!
//! 把上游的换行分隔 JSON 进度流逐行转发给浏览器，并在流结束时
//! 改写最终事件的下载地址。
//!
//! # 主要组件
//!
//! - `error`: 流式错误类型定义
//! - `line_decoder`: 字节流分行解码器
//! - `event`: 进度事件模型
//! - `relay`: 单行扣留的中继引擎
//! - `relocation`: 产物迁移
//! - `metrics`: 中继指标
//! - `traits`: 流类型别名与迁移扩展点

pub mod error;
pub mod event;
pub mod line_decoder;
pub mod metrics;
pub mod relay;
pub mod relocation;
pub mod traits;

// 重新导出核心类型
pub use error::StreamError;
pub use event::{EventFields, ProgressEvent};
pub use line_decoder::{frame_lines, LineDecoder, DEFAULT_MAX_LINE_BYTES};
pub use metrics::{RelayMetrics, RelocationOutcome};
pub use relay::{finalize_line, RelayEngine};
pub use relocation::{
    default_artifact_name, filename_from_disposition, relocated_object_name, ArtifactRelocator,
    RelocationError, RELOCATED_URL_EXPIRES_SECS,
};
pub use traits::{
    chunks_to_stream_response, reqwest_stream_to_stream_response, ArtifactRelocation,
    StreamResponse,
};
