//! 配置管理模块
//!
//! 提供 YAML 配置文件加载、环境变量覆盖和配置校验

mod path_utils;
mod types;
mod yaml;

pub use path_utils::expand_tilde;
pub use types::{
    AuthConfig, Config, LoggingConfig, RelayConfig, ServerConfig, StorageBackend, StorageConfig,
    TlsConfig, UpstreamConfig,
};
pub use yaml::{
    apply_env_overrides, load_config, load_config_with, parse_yaml, ConfigError, CONFIG_PATH_ENV,
    DEFAULT_CONFIG_PATH,
};
