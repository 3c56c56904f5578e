//! 响应构建
//!
//! - `relay_response`: 进度流，经过中继引擎逐行转发
//! - `passthrough_response`: 二进制文件，原样转发

use crate::streaming::RelayEngine;
use crate::upstream::UpstreamResponse;
use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

/// 上游未声明类型时进度流使用的内容类型
pub const EVENT_STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// 构建中继进度流响应
///
/// 关闭所有中间层缓冲，保证每一行到达后立即送达浏览器。
pub fn relay_response(upstream: UpstreamResponse, engine: RelayEngine) -> Response {
    let UpstreamResponse {
        status,
        content_type,
        content_disposition,
        body,
    } = upstream;

    let mut builder = Response::builder()
        .status(StatusCode::from_u16(status).unwrap_or(StatusCode::OK))
        .header(
            header::CONTENT_TYPE,
            content_type.unwrap_or_else(|| EVENT_STREAM_CONTENT_TYPE.to_string()),
        )
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .header("X-Accel-Buffering", "no");
    if let Some(disposition) = content_disposition {
        builder = builder.header(header::CONTENT_DISPOSITION, disposition);
    }

    builder
        .body(Body::from_stream(engine.relay(body)))
        .unwrap_or_else(|_| build_failure("Failed to build streaming response"))
}

/// 构建文件透传响应
///
/// 仅镜像 `content-type` 和 `content-disposition`，响应体不做任何处理。
pub fn passthrough_response(upstream: UpstreamResponse) -> Response {
    let UpstreamResponse {
        content_type,
        content_disposition,
        body,
        ..
    } = upstream;

    let mut builder = Response::builder().status(StatusCode::OK);
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    if let Some(disposition) = content_disposition {
        builder = builder.header(header::CONTENT_DISPOSITION, disposition);
    }

    builder
        .body(Body::from_stream(body))
        .unwrap_or_else(|_| build_failure("Failed to build passthrough response"))
}

fn build_failure(message: &str) -> Response {
    tracing::error!("[SERVER] {}", message);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({"error": {"type": "internal_error", "message": message}})),
    )
        .into_response()
}
