//! 遥测模块
//!
//! 初始化 tracing 订阅器。各组件通过 tracing 宏记录日志，
//! 并使用 `[RELAY]`、`[UPSTREAM]`、`[STORAGE]`、`[AUTH]`、`[SERVER]` 前缀区分来源。

mod logging;

pub use logging::{build_filter, init_tracing};
