//! 产物迁移
//!
//! 把上游托管的翻译结果复制到本应用的存储桶，并用短期签名读链接替换
//! 最终事件中的 `downloadUrl`。浏览器因此不再需要直接访问上游服务，
//! 所有下载都走同一套签名 URL 机制。

use crate::storage::{ObjectStorage, SignedUrlAction, SignedUrlOptions, StorageError};
use crate::streaming::traits::ArtifactRelocation;
use crate::upstream::{TranslationClient, UpstreamError};
use async_trait::async_trait;
use bytes::BytesMut;
use chrono::Utc;
use futures::StreamExt;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// 迁移后签名链接的默认有效期（秒）
pub const RELOCATED_URL_EXPIRES_SECS: u64 = 300;

/// 迁移产物的对象名前缀
pub const RELOCATED_PREFIX: &str = "translated";

static FILENAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)filename\s*=\s*"?([^";]+)"?"#).expect("valid regex"));

/// 迁移错误
///
/// 中继引擎会吞掉该错误并回退到原始地址，调用方永远看不到它。
#[derive(Debug, Error)]
pub enum RelocationError {
    /// 从上游获取产物失败
    #[error("获取产物失败: {0}")]
    Fetch(#[from] UpstreamError),

    /// 写入存储或签名失败
    #[error("存储产物失败: {0}")]
    Storage(#[from] StorageError),
}

/// 产物迁移器
pub struct ArtifactRelocator {
    upstream: TranslationClient,
    storage: Arc<dyn ObjectStorage>,
    expires_in_seconds: u64,
}

impl ArtifactRelocator {
    /// 创建迁移器
    pub fn new(upstream: TranslationClient, storage: Arc<dyn ObjectStorage>) -> Self {
        Self {
            upstream,
            storage,
            expires_in_seconds: RELOCATED_URL_EXPIRES_SECS,
        }
    }

    /// 设置签名链接有效期
    pub fn with_expires_in_seconds(mut self, expires_in_seconds: u64) -> Self {
        self.expires_in_seconds = expires_in_seconds;
        self
    }
}

#[async_trait]
impl ArtifactRelocation for ArtifactRelocator {
    async fn relocate(&self, download_url: &str) -> Result<String, RelocationError> {
        let response = self.upstream.fetch_artifact(download_url).await?;

        let content_type = response
            .content_type
            .clone()
            .unwrap_or_else(|| crate::storage::DEFAULT_CONTENT_TYPE.to_string());
        let file_name = response
            .content_disposition
            .as_deref()
            .and_then(filename_from_disposition)
            .unwrap_or_else(|| default_artifact_name(&content_type));

        let mut body = response.body;
        let mut buffer = BytesMut::new();
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| UpstreamError::Network(e.to_string()))?;
            buffer.extend_from_slice(&chunk);
        }

        let object_name = relocated_object_name(&file_name);
        let size = buffer.len();
        self.storage
            .upload_buffer(&object_name, buffer.freeze(), &content_type)
            .await?;

        let url = self
            .storage
            .signed_url(
                &object_name,
                SignedUrlAction::Read,
                &SignedUrlOptions::read(self.expires_in_seconds),
            )
            .await?;

        tracing::info!(
            "[RELAY] 产物已迁移: {} -> {} ({} 字节, {})",
            download_url,
            object_name,
            size,
            content_type
        );
        Ok(url)
    }
}

/// 从 content-disposition 中提取文件名
///
/// 支持 `filename="a.docx"` 和 `filename=a.docx` 两种写法，去掉路径分隔符。
pub fn filename_from_disposition(disposition: &str) -> Option<String> {
    let raw = FILENAME_RE.captures(disposition)?.get(1)?.as_str();
    let name = sanitize_file_name(raw);
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}

/// 缺少文件名时使用基于时间戳的默认名
pub fn default_artifact_name(content_type: &str) -> String {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let ext = match mime.as_str() {
        "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => ".docx",
        "application/pdf" => ".pdf",
        "text/plain" => ".txt",
        _ => "",
    };
    format!("translated-{}{}", Utc::now().timestamp_millis(), ext)
}

/// 生成全新的迁移对象名：`translated/<uuid>-<filename>`
pub fn relocated_object_name(file_name: &str) -> String {
    format!(
        "{}/{}-{}",
        RELOCATED_PREFIX,
        Uuid::new_v4(),
        sanitize_file_name(file_name)
    )
}

fn sanitize_file_name(name: &str) -> String {
    let last = name
        .rsplit(|c| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();
    last.trim().to_string()
}
