//! 上游翻译服务错误类型
//!
//! 上游错误一律不自动重试：翻译任务耗时长且不幂等，重试交给用户决定。

use thiserror::Error;

/// 上游错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    /// 输入校验失败，请求未发出
    #[error("{0}")]
    InvalidInput(String),

    /// 上游不可达（连接失败、DNS、读取中断等）
    #[error("上游不可达: {0}")]
    Network(String),

    /// 上游返回非成功状态码
    #[error("上游返回错误 ({status}): {message}")]
    Status {
        /// HTTP 状态码
        status: u16,
        /// 响应内容（已截断）
        message: String,
    },

    /// 上游响应没有可读的响应体
    #[error("Upstream had no body")]
    EmptyBody,
}

impl UpstreamError {
    /// 对调用方暴露的 HTTP 状态码
    pub fn status_code(&self) -> u16 {
        match self {
            UpstreamError::InvalidInput(_) => 400,
            UpstreamError::Status { status, .. } => *status,
            UpstreamError::Network(_) | UpstreamError::EmptyBody => 502,
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            UpstreamError::InvalidInput(_) => "invalid_input",
            UpstreamError::Network(_) => "upstream_unreachable",
            UpstreamError::Status { .. } => "upstream_status",
            UpstreamError::EmptyBody => "upstream_no_body",
        }
    }

    /// 从 HTTP 状态码创建错误
    pub fn from_http_status(status: u16, body: &str) -> Self {
        UpstreamError::Status {
            status,
            message: truncate_message(body, 200),
        }
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            UpstreamError::Network(format!("请求超时: {}", err))
        } else if err.is_connect() {
            UpstreamError::Network(format!("连接失败: {}", err))
        } else {
            UpstreamError::Network(err.to_string())
        }
    }
}

/// 截断消息到指定字符数
fn truncate_message(msg: &str, max_chars: usize) -> String {
    let trimmed = msg.trim();
    if trimmed.chars().count() <= max_chars {
        trimmed.to_string()
    } else {
        let truncated: String = trimmed.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}
