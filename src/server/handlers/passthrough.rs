//! 透传端点
//!
//! 导出摘要、下载上游文件、健康检查和清空缓存。
//! 这些端点不经过中继引擎，只转发请求并镜像响应。

use crate::server::auth::verify_session;
use crate::server::error::ApiError;
use crate::server::response::passthrough_response;
use crate::server::AppState;
use crate::upstream::UpstreamError;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    response::Response,
    Json,
};
use std::collections::HashMap;

/// 导出摘要为文档
pub async fn export_summary(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, ApiError> {
    verify_session(&headers, &state.config.auth)?;

    let value: serde_json::Value =
        serde_json::from_slice(&body).map_err(|_| ApiError::validation("Invalid JSON body"))?;
    let summary = value
        .get("summary")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| ApiError::validation("Missing summary"))?;

    let upstream = state
        .upstream
        .export_summary(summary)
        .await
        .map_err(|e| with_status_message(e, "Failed to export summary"))?;
    Ok(passthrough_response(upstream))
}

/// 下载上游文件
///
/// `path` 总是拼接在上游基础地址之后，不接受绝对地址。
pub async fn download(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Response, ApiError> {
    let path = params
        .get("path")
        .filter(|p| !p.is_empty())
        .ok_or_else(|| ApiError::validation("Missing path"))?;

    let upstream = state
        .upstream
        .download(path)
        .await
        .map_err(|e| with_status_message(e, "Failed to fetch file"))?;
    Ok(passthrough_response(upstream))
}

/// 上游健康检查
pub async fn health(State(state): State<AppState>) -> Result<Json<serde_json::Value>, ApiError> {
    Ok(Json(state.upstream.health().await?))
}

/// 清空上游缓存
pub async fn clear_cache(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, ApiError> {
    verify_session(&headers, &state.config.auth)?;
    let result = state.upstream.clear_cache().await?;
    tracing::info!("[UPSTREAM] 已清空上游缓存");
    Ok(Json(result))
}

/// 上游返回非成功状态时，保留状态码并替换为统一的提示
fn with_status_message(e: UpstreamError, message: &str) -> ApiError {
    match e {
        UpstreamError::Status { status, message: body } => {
            tracing::warn!("[UPSTREAM] {} ({}): {}", message, status, body);
            ApiError::Upstream(UpstreamError::Status {
                status,
                message: message.to_string(),
            })
        }
        other => ApiError::Upstream(other),
    }
}
