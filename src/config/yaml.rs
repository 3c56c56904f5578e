//! YAML 配置加载
//!
//! 加载顺序：配置文件 → 环境变量覆盖 → 校验。
//! 环境变量名沿用部署环境已有的命名（`PYTHON_API_BASE`、`GCS_BUCKET_NAME` 等）。

use super::path_utils::expand_tilde;
use super::types::Config;
use crate::storage::MAX_SIGNED_URL_EXPIRES_SECS;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// 指定配置文件路径的环境变量
pub const CONFIG_PATH_ENV: &str = "DOCRELAY_CONFIG";
/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "~/.docrelay/config.yaml";

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 读取文件失败
    #[error("读取配置文件失败: {0}")]
    Io(#[from] std::io::Error),

    /// YAML 解析失败
    #[error("配置解析失败: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// 显式指定的配置文件不存在
    #[error("配置文件不存在: {0}")]
    NotFound(PathBuf),

    /// 配置值非法
    #[error("配置验证错误: {0}")]
    Invalid(String),
}

/// 加载配置（使用进程环境变量）
pub fn load_config(path: Option<&Path>) -> Result<Config, ConfigError> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// 加载配置，环境变量查找函数可替换
pub fn load_config_with<F>(path: Option<&Path>, lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let (path, explicit) = match path {
        Some(path) => (expand_tilde(path), true),
        None => match lookup(CONFIG_PATH_ENV).filter(|v| !v.trim().is_empty()) {
            Some(path) => (expand_tilde(path.trim()), true),
            None => (expand_tilde(DEFAULT_CONFIG_PATH), false),
        },
    };

    let mut config = if path.exists() {
        let content = std::fs::read_to_string(&path)?;
        tracing::info!("[SERVER] 加载配置文件: {}", path.display());
        parse_yaml(&content)?
    } else if explicit {
        return Err(ConfigError::NotFound(path));
    } else {
        tracing::debug!("[SERVER] 未找到配置文件 {}，使用默认配置", path.display());
        Config::default()
    };

    apply_env_overrides(&mut config, lookup);
    config.validate()?;
    Ok(config)
}

/// 解析 YAML 内容，空文档视为默认配置
pub fn parse_yaml(content: &str) -> Result<Config, ConfigError> {
    if content.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(content)?)
}

/// 应用环境变量覆盖
///
/// 空字符串视为未设置。
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| {
        lookup(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    if let Some(base_url) = get("PYTHON_API_BASE") {
        config.upstream.base_url = base_url;
    }
    if let Some(bucket) = get("GCS_BUCKET_NAME") {
        config.storage.bucket = Some(bucket);
    }
    if let Some(project_id) = get("GCP_PROJECT_ID") {
        config.storage.project_id = Some(project_id);
    }
    if let Some(email) = get("GCP_CLIENT_EMAIL") {
        config.storage.client_email = Some(email);
    }
    if let Some(key) = get("GCP_PRIVATE_KEY") {
        // 部署平台常把多行私钥存成带字面量 \n 的单行
        config.storage.private_key = Some(key.replace("\\n", "\n"));
    }
    if let Some(host) = get("DOCRELAY_HOST") {
        config.server.host = host;
    }
    if let Some(port) = get("DOCRELAY_PORT") {
        match port.parse() {
            Ok(port) => config.server.port = port,
            Err(_) => tracing::warn!("[SERVER] 忽略无效的 DOCRELAY_PORT: {}", port),
        }
    }
    if let Some(tokens) = get("DOCRELAY_SESSION_TOKENS") {
        config.auth.session_tokens = tokens
            .split(',')
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
            .collect();
    }
    if let Some(level) = get("DOCRELAY_LOG_LEVEL") {
        config.logging.level = level;
    }
}

impl Config {
    /// 校验配置
    ///
    /// 存储凭证不在这里检查，缺失时由存储层在使用时返回配置错误。
    pub fn validate(&self) -> Result<(), ConfigError> {
        match url::Url::parse(&self.upstream.base_url) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "上游地址必须是 http(s) URL: {}",
                    self.upstream.base_url
                )))
            }
        }

        if self.server.port == 0 {
            return Err(ConfigError::Invalid("端口号不能为 0".to_string()));
        }

        if self.server.max_upload_bytes == 0 {
            return Err(ConfigError::Invalid("上传大小上限不能为 0".to_string()));
        }

        for (name, value) in [
            ("default_expires_secs", self.storage.default_expires_secs),
            ("relocated_expires_secs", self.storage.relocated_expires_secs),
        ] {
            if value == 0 || value > MAX_SIGNED_URL_EXPIRES_SECS {
                return Err(ConfigError::Invalid(format!(
                    "{} 必须在 1..={} 之间",
                    name, MAX_SIGNED_URL_EXPIRES_SECS
                )));
            }
        }

        if self.relay.max_line_bytes == 0 {
            return Err(ConfigError::Invalid("单行最大字节数不能为 0".to_string()));
        }

        let tls = &self.server.tls;
        if tls.enable && (tls.cert_path.is_none() || tls.key_path.is_none()) {
            return Err(ConfigError::Invalid(
                "启用 TLS 时必须同时配置 cert_path 和 key_path".to_string(),
            ));
        }

        Ok(())
    }
}
