//! 签名 URL 端点
//!
//! - `GET /storage/signed-url?objectName&expiresInSeconds`: 读取链接
//! - `POST /storage/signed-url`: 写入链接，绑定上传时的内容类型

use crate::server::auth::verify_session;
use crate::server::error::ApiError;
use crate::server::AppState;
use crate::storage::{validate_expires, SignedUrlAction, SignedUrlOptions, UploadTarget};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use serde::Serialize;
use std::collections::HashMap;

/// 签名失败时返回给调用方的消息
pub const SIGNING_FAILED: &str = "Failed to generate signed URL";

/// 读取链接响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReadUrlResponse {
    pub url: String,
    pub method: &'static str,
    pub object_name: String,
    pub expires_in_seconds: u64,
}

/// 写入链接响应
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteUrlResponse {
    pub url: String,
    pub method: &'static str,
    pub object_name: String,
}

/// 生成读取链接
pub async fn signed_url_read(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<ReadUrlResponse>, ApiError> {
    verify_session(&headers, &state.config.auth)?;

    let object_name = params
        .get("objectName")
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::validation("objectName is required"))?
        .to_string();

    let expires_in_seconds = match params.get("expiresInSeconds").map(|v| v.trim()) {
        Some(raw) if !raw.is_empty() => {
            let value: u64 = raw.parse().map_err(|_| {
                ApiError::validation("expiresInSeconds must be a positive integer")
            })?;
            validate_expires(value).map_err(ApiError::Validation)?;
            value
        }
        _ => state.config.storage.default_expires_secs,
    };

    let url = state
        .storage
        .signed_url(
            &object_name,
            SignedUrlAction::Read,
            &SignedUrlOptions::read(expires_in_seconds),
        )
        .await
        .map_err(signing_failed)?;

    Ok(Json(ReadUrlResponse {
        url,
        method: SignedUrlAction::Read.http_method(),
        object_name,
        expires_in_seconds,
    }))
}

/// 生成写入链接
pub async fn signed_url_write(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WriteUrlResponse>, ApiError> {
    verify_session(&headers, &state.config.auth)?;

    let value: serde_json::Value =
        serde_json::from_slice(&body).map_err(|_| ApiError::validation("Invalid JSON"))?;
    let target: UploadTarget = serde_json::from_value(value)
        .map_err(|e| ApiError::validation(format!("Invalid body: {}", e)))?;
    target
        .validate()
        .map_err(|e| ApiError::validation(format!("Invalid body: {}", e)))?;
    let target = target.normalized();

    let expires_in_seconds = target
        .expires_in_seconds
        .unwrap_or(state.config.storage.default_expires_secs);
    let url = state
        .storage
        .signed_url(
            &target.object_name,
            SignedUrlAction::Write,
            &SignedUrlOptions::write(expires_in_seconds, target.content_type.clone()),
        )
        .await
        .map_err(signing_failed)?;

    tracing::info!(
        "[STORAGE] 签发写入链接: {} ({}, {}s)",
        target.object_name,
        target.content_type,
        expires_in_seconds
    );

    Ok(Json(WriteUrlResponse {
        url,
        method: SignedUrlAction::Write.http_method(),
        object_name: target.object_name,
    }))
}

fn signing_failed(e: crate::storage::StorageError) -> ApiError {
    tracing::error!("[STORAGE] 签名失败: {}", e);
    ApiError::Internal(SIGNING_FAILED.to_string())
}
