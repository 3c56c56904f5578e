//! 配置类型定义
//!
//! 所有字段都带默认值，YAML 中可以只写需要覆盖的部分。

use serde::{Deserialize, Serialize};

/// 默认监听地址
pub const DEFAULT_HOST: &str = "127.0.0.1";
/// 默认监听端口
pub const DEFAULT_PORT: u16 = 3000;
/// 默认上传大小上限（100 MiB）
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;
/// 默认上游地址
pub const DEFAULT_UPSTREAM_BASE_URL: &str = "http://localhost:8000";
/// 默认 GCS 端点
pub const DEFAULT_GCS_ENDPOINT: &str = "https://storage.googleapis.com";

/// 主配置结构
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Config {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,
    /// 上游翻译服务配置
    #[serde(default)]
    pub upstream: UpstreamConfig,
    /// 对象存储配置
    #[serde(default)]
    pub storage: StorageConfig,
    /// 认证配置
    #[serde(default)]
    pub auth: AuthConfig,
    /// 中继配置
    #[serde(default)]
    pub relay: RelayConfig,
    /// 日志配置
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,
    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
    /// 单个请求体上限（字节）
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: usize,
    /// TLS 配置
    #[serde(default)]
    pub tls: TlsConfig,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_max_upload_bytes() -> usize {
    DEFAULT_MAX_UPLOAD_BYTES
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_upload_bytes: default_max_upload_bytes(),
            tls: TlsConfig::default(),
        }
    }
}

/// TLS 配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct TlsConfig {
    /// 是否启用 TLS
    #[serde(default)]
    pub enable: bool,
    /// 证书路径（PEM）
    #[serde(default)]
    pub cert_path: Option<String>,
    /// 私钥路径（PEM）
    #[serde(default)]
    pub key_path: Option<String>,
}

/// 上游翻译服务配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UpstreamConfig {
    /// 基础地址
    #[serde(default = "default_upstream_base_url")]
    pub base_url: String,
    /// 连接超时（秒）
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_upstream_base_url() -> String {
    DEFAULT_UPSTREAM_BASE_URL.to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_upstream_base_url(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

/// 存储后端类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Google Cloud Storage
    #[default]
    Gcs,
    /// 进程内存储（本地开发）
    Memory,
}

/// 对象存储配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StorageConfig {
    /// 存储后端
    #[serde(default)]
    pub backend: StorageBackend,
    /// 存储桶名称
    #[serde(default)]
    pub bucket: Option<String>,
    /// GCP 项目 ID
    #[serde(default)]
    pub project_id: Option<String>,
    /// 服务账号邮箱
    #[serde(default)]
    pub client_email: Option<String>,
    /// 服务账号私钥（PKCS#8 PEM）
    #[serde(default)]
    pub private_key: Option<String>,
    /// GCS 端点
    #[serde(default = "default_gcs_endpoint")]
    pub endpoint: String,
    /// 签名 URL 接口的默认有效期（秒）
    #[serde(default = "default_expires_secs")]
    pub default_expires_secs: u64,
    /// 迁移产物下载链接的有效期（秒）
    #[serde(default = "default_relocated_expires_secs")]
    pub relocated_expires_secs: u64,
}

fn default_gcs_endpoint() -> String {
    DEFAULT_GCS_ENDPOINT.to_string()
}

fn default_expires_secs() -> u64 {
    600
}

fn default_relocated_expires_secs() -> u64 {
    300
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            bucket: None,
            project_id: None,
            client_email: None,
            private_key: None,
            endpoint: default_gcs_endpoint(),
            default_expires_secs: default_expires_secs(),
            relocated_expires_secs: default_relocated_expires_secs(),
        }
    }
}

/// 认证配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuthConfig {
    /// 有效的会话令牌
    #[serde(default)]
    pub session_tokens: Vec<String>,
    /// 会话 Cookie 名称
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
}

fn default_cookie_name() -> String {
    "session_token".to_string()
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_tokens: Vec::new(),
            cookie_name: default_cookie_name(),
        }
    }
}

/// 中继配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RelayConfig {
    /// 单行最大字节数
    #[serde(default = "default_max_line_bytes")]
    pub max_line_bytes: usize,
}

fn default_max_line_bytes() -> usize {
    crate::streaming::DEFAULT_MAX_LINE_BYTES
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_line_bytes: default_max_line_bytes(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 是否输出 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
