//! 流式中继错误类型
//!
//! 定义中继过程中可能发生的错误。响应一旦开始流式输出便无法再修改状态码，
//! 因此这些错误会以"流异常终止"的形式暴露给客户端（连接被中断）。

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 流式中继错误类型
#[derive(Debug, Clone, Error, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "details")]
pub enum StreamError {
    /// 网络错误
    ///
    /// 读取上游字节流时连接被重置、超时或中断。
    #[error("网络错误: {0}")]
    Network(String),

    /// 上游错误
    ///
    /// 上游在流中途报告了失败。
    #[error("上游错误 ({status}): {message}")]
    Upstream {
        /// HTTP 状态码
        status: u16,
        /// 错误消息
        message: String,
    },

    /// 缓冲区溢出
    ///
    /// 单行数据超过了配置的最大行长度，且仍未遇到换行符。
    #[error("缓冲区溢出: 单行超过 {limit} 字节")]
    BufferOverflow {
        /// 配置的上限
        limit: usize,
    },

    /// 编码错误
    ///
    /// 重新序列化最终事件失败。
    #[error("编码错误: {0}")]
    Encode(String),
}

impl From<std::io::Error> for StreamError {
    fn from(err: std::io::Error) -> Self {
        StreamError::Network(err.to_string())
    }
}

impl From<reqwest::Error> for StreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StreamError::Network(format!("读取超时: {}", err))
        } else if err.is_connect() {
            StreamError::Network(format!("连接失败: {}", err))
        } else {
            StreamError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for StreamError {
    fn from(err: serde_json::Error) -> Self {
        StreamError::Encode(err.to_string())
    }
}

impl StreamError {
    /// 创建网络错误
    pub fn network(msg: impl Into<String>) -> Self {
        StreamError::Network(msg.into())
    }

    /// 创建上游错误
    pub fn upstream(status: u16, message: impl Into<String>) -> Self {
        StreamError::Upstream {
            status,
            message: message.into(),
        }
    }

    /// 获取错误类型字符串（用于日志）
    pub fn error_type(&self) -> &'static str {
        match self {
            StreamError::Network(_) => "network_error",
            StreamError::Upstream { .. } => "upstream_error",
            StreamError::BufferOverflow { .. } => "buffer_overflow",
            StreamError::Encode(_) => "encode_error",
        }
    }
}
