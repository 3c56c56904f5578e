//! 对象存储错误类型

use thiserror::Error;

/// 对象存储错误
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    /// 配置错误（缺少凭证或存储桶），属于致命错误，不重试
    #[error("存储配置错误: {0}")]
    Configuration(String),

    /// 对象不存在
    #[error("对象不存在: {0}")]
    NotFound(String),

    /// 私钥无法解析或签名失败
    #[error("签名密钥无效: {0}")]
    InvalidKey(String),

    /// 请求存储服务失败（网络层）
    #[error("存储请求失败: {0}")]
    Request(String),

    /// 存储服务返回非成功状态码
    #[error("存储服务返回错误 ({status}): {message}")]
    Status {
        /// HTTP 状态码
        status: u16,
        /// 响应内容（已截断）
        message: String,
    },
}

impl StorageError {
    /// 是否为配置错误
    pub fn is_configuration(&self) -> bool {
        matches!(self, StorageError::Configuration(_) | StorageError::InvalidKey(_))
    }
}

impl From<reqwest::Error> for StorageError {
    fn from(err: reqwest::Error) -> Self {
        StorageError::Request(err.to_string())
    }
}
