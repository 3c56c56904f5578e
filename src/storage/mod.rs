//! 对象存储网关
//!
//! 对外提供限时、限定方法的签名 URL，以及缓冲区上传/下载/删除。
//! 网关本身无状态，可被多个中继实例并发调用。
//!
//! # 主要组件
//!
//! - `ObjectStorage`: 存储后端抽象
//! - `gcs`: Google Cloud Storage（V4 签名）实现
//! - `memory`: 进程内实现（本地开发与测试）

pub mod error;
pub mod gcs;
pub mod memory;

use crate::config::{StorageBackend, StorageConfig};
use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use error::StorageError;
pub use gcs::GcsStorage;
pub use memory::MemoryStorage;

/// 调用方未指定时的签名 URL 有效期（秒）
pub const DEFAULT_SIGNED_URL_EXPIRES_SECS: u64 = 15 * 60;

/// V4 签名允许的最长有效期（7 天）
pub const MAX_SIGNED_URL_EXPIRES_SECS: u64 = 604_800;

/// 未声明内容类型时使用的默认值
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// 签名 URL 的操作类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignedUrlAction {
    /// 读取（GET）
    Read,
    /// 写入（PUT）
    Write,
}

impl SignedUrlAction {
    /// 对应的 HTTP 方法
    pub fn http_method(&self) -> &'static str {
        match self {
            SignedUrlAction::Read => "GET",
            SignedUrlAction::Write => "PUT",
        }
    }
}

/// 签名选项
#[derive(Debug, Clone, Default)]
pub struct SignedUrlOptions {
    /// 有效期（秒），缺省为 `DEFAULT_SIGNED_URL_EXPIRES_SECS`
    pub expires_in_seconds: Option<u64>,
    /// 写入时绑定的内容类型，缺省为 `application/octet-stream`
    pub content_type: Option<String>,
}

impl SignedUrlOptions {
    /// 读取签名选项
    pub fn read(expires_in_seconds: u64) -> Self {
        Self {
            expires_in_seconds: Some(expires_in_seconds),
            content_type: None,
        }
    }

    /// 写入签名选项
    pub fn write(expires_in_seconds: u64, content_type: impl Into<String>) -> Self {
        Self {
            expires_in_seconds: Some(expires_in_seconds),
            content_type: Some(content_type.into()),
        }
    }

    /// 实际使用的有效期
    pub fn effective_expires(&self) -> u64 {
        self.expires_in_seconds
            .unwrap_or(DEFAULT_SIGNED_URL_EXPIRES_SECS)
    }

    /// 实际使用的内容类型
    pub fn effective_content_type(&self) -> &str {
        self.content_type.as_deref().unwrap_or(DEFAULT_CONTENT_TYPE)
    }
}

/// 已下载的对象
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    /// 对象内容
    pub bytes: Bytes,
    /// 声明的内容类型
    pub content_type: String,
}

/// 客户端申请写入权限时提交的上传目标
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadTarget {
    /// 对象名（不透明、类路径、每次上传唯一）
    pub object_name: String,
    /// 上传时必须使用的内容类型
    pub content_type: String,
    /// 有效期（秒）
    #[serde(default)]
    pub expires_in_seconds: Option<u64>,
}

impl UploadTarget {
    /// 校验字段，返回可直接展示给调用方的错误信息
    pub fn validate(&self) -> Result<(), String> {
        if self.object_name.trim().is_empty() {
            return Err("objectName is required".to_string());
        }
        if self.content_type.trim().is_empty() {
            return Err("contentType is required".to_string());
        }
        if let Some(expires) = self.expires_in_seconds {
            validate_expires(expires)?;
        }
        Ok(())
    }

    /// 去掉对象名和内容类型首尾空白，与读取链接使用的对象名保持一致
    pub fn normalized(self) -> Self {
        Self {
            object_name: self.object_name.trim().to_string(),
            content_type: self.content_type.trim().to_string(),
            expires_in_seconds: self.expires_in_seconds,
        }
    }
}

/// 校验签名有效期
pub fn validate_expires(expires_in_seconds: u64) -> Result<(), String> {
    if expires_in_seconds == 0 || expires_in_seconds > MAX_SIGNED_URL_EXPIRES_SECS {
        return Err(format!(
            "expiresInSeconds must be between 1 and {}",
            MAX_SIGNED_URL_EXPIRES_SECS
        ));
    }
    Ok(())
}

/// 对象存储后端
///
/// 所有操作都是对存储服务的网络调用，不做本地缓存。
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// 生成签名 URL
    ///
    /// 写入 URL 绑定签名时的内容类型，上传时使用其他内容类型会被存储层拒绝。
    async fn signed_url(
        &self,
        object_name: &str,
        action: SignedUrlAction,
        options: &SignedUrlOptions,
    ) -> Result<String, StorageError>;

    /// 下载对象，不存在时返回 `NotFound`
    async fn download_object(&self, object_name: &str) -> Result<StoredObject, StorageError>;

    /// 上传缓冲区，同名对象会被覆盖
    async fn upload_buffer(
        &self,
        object_name: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// 删除对象，对象不存在时不报错
    async fn delete_object(&self, object_name: &str) -> Result<(), StorageError>;

    /// 后端名称（用于日志）
    fn backend_name(&self) -> &'static str;
}

/// 根据配置构建存储后端
pub fn from_config(config: &StorageConfig) -> Arc<dyn ObjectStorage> {
    match config.backend {
        StorageBackend::Gcs => Arc::new(GcsStorage::from_config(config)),
        StorageBackend::Memory => Arc::new(MemoryStorage::new(
            config.bucket.clone().unwrap_or_else(|| "local".to_string()),
        )),
    }
}
