//! docrelay 核心库
//!
//! 浏览器端文档翻译/摘要应用的服务端：
//! - `storage`: 对象存储网关（签名 URL、缓冲区读写）
//! - `upstream`: 上游翻译服务客户端
//! - `streaming`: 进度流中继引擎
//! - `server`: HTTP 请求编排
//! - `config` / `telemetry`: 配置与日志

pub mod config;
pub mod server;
pub mod storage;
pub mod streaming;
pub mod telemetry;
pub mod upstream;

pub use config::{load_config, Config, ConfigError};
pub use server::{build_router, run, ApiError, AppState, ServerError};
pub use storage::{ObjectStorage, StorageError};
pub use streaming::{ArtifactRelocation, ProgressEvent, RelayEngine, StreamError};
pub use upstream::{TranslationClient, TranslationRequest, UpstreamError};
