//! API 错误类型
//!
//! 所有处理器返回 `Result<Response, ApiError>`，错误统一渲染为
//! `{"error": {"type": ..., "message": ...}}`。
//!
//! 流式响应一旦开始，后续错误只能通过中断响应体体现，不会经过这里。

use crate::storage::StorageError;
use crate::upstream::UpstreamError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

/// API 错误
#[derive(Debug, Error)]
pub enum ApiError {
    /// 缺少有效会话
    #[error("Unauthorized")]
    Unauthorized,

    /// 请求字段缺失或非法
    #[error("{0}")]
    Validation(String),

    /// 上游服务错误
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    /// 对象存储错误
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// 内部错误
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// 创建校验错误
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    /// HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Upstream(e) => {
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ApiError::Storage(e) => match e {
                StorageError::NotFound(_) => StatusCode::NOT_FOUND,
                StorageError::Configuration(_) | StorageError::InvalidKey(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                StorageError::Request(_) | StorageError::Status { .. } => StatusCode::BAD_GATEWAY,
            },
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            ApiError::Unauthorized => "unauthorized",
            ApiError::Validation(_) => "validation_error",
            ApiError::Upstream(e) => e.error_type(),
            ApiError::Storage(StorageError::Configuration(_)) => "configuration_error",
            ApiError::Storage(StorageError::NotFound(_)) => "not_found",
            ApiError::Storage(_) => "storage_error",
            ApiError::Internal(_) => "internal_error",
        }
    }

    /// 展示给调用方的消息
    ///
    /// 上游状态错误直接使用其消息（上游响应体或处理器给出的说明）。
    pub fn message(&self) -> String {
        match self {
            ApiError::Upstream(UpstreamError::Status { message, .. }) => message.clone(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            ApiError::Storage(e) if e.is_configuration() => {
                tracing::error!("[SERVER] 存储配置错误: {}", e)
            }
            ApiError::Internal(msg) => tracing::error!("[SERVER] 内部错误: {}", msg),
            ApiError::Upstream(e) => tracing::warn!("[UPSTREAM] 请求失败: {}", e),
            _ => {}
        }

        let body = serde_json::json!({
            "error": {
                "type": self.error_type(),
                "message": self.message(),
            }
        });
        (status, Json(body)).into_response()
    }
}
