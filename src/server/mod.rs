//! HTTP 服务器
//!
//! 请求编排入口：认证、模式选择、调用上游，并把进度流交给中继引擎。
//!
//! # 路由
//!
//! | 方法 | 路径 | 认证 |
//! |------|------|------|
//! | GET/POST | `/storage/signed-url` | 是 |
//! | POST | `/translate` | 是 |
//! | POST | `/summarize` | 是 |
//! | POST | `/export-summary` | 是 |
//! | POST | `/clear-cache` | 是 |
//! | GET | `/download` | 否 |
//! | GET | `/health` | 否 |

pub mod auth;
pub mod error;
pub mod handlers;
pub mod response;

use crate::config::{expand_tilde, Config};
use crate::storage::{self, ObjectStorage};
use crate::streaming::{ArtifactRelocation, ArtifactRelocator};
use crate::upstream::{TranslationClient, UpstreamError};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use thiserror::Error;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

pub use error::ApiError;

/// 服务器启动错误
#[derive(Debug, Error)]
pub enum ServerError {
    /// 监听地址无效
    #[error("监听地址无效: {0}")]
    InvalidAddress(String),

    /// 绑定端口失败
    #[error("绑定 {addr} 失败: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// TLS 配置错误
    #[error("TLS 配置错误: {0}")]
    Tls(String),

    /// 上游客户端初始化失败
    #[error("上游客户端初始化失败: {0}")]
    Upstream(#[from] UpstreamError),

    /// 运行期 IO 错误
    #[error("服务器运行错误: {0}")]
    Io(#[from] std::io::Error),
}

/// 应用状态
///
/// 所有成员都可以在请求间安全共享；单个请求的可变状态只存在于中继流内部。
#[derive(Clone)]
pub struct AppState {
    /// 配置
    pub config: Arc<Config>,
    /// 上游客户端
    pub upstream: TranslationClient,
    /// 对象存储
    pub storage: Arc<dyn ObjectStorage>,
    /// 产物迁移
    pub relocator: Arc<dyn ArtifactRelocation>,
}

impl AppState {
    /// 根据配置构建所有组件
    pub fn from_config(config: Config) -> Result<Self, ServerError> {
        let upstream = TranslationClient::from_config(&config.upstream)?;
        let storage = storage::from_config(&config.storage);
        Ok(Self::new(config, upstream, storage))
    }

    /// 使用已有组件构建，迁移器由上游客户端和存储组合而成
    pub fn new(
        config: Config,
        upstream: TranslationClient,
        storage: Arc<dyn ObjectStorage>,
    ) -> Self {
        let relocator = ArtifactRelocator::new(upstream.clone(), storage.clone())
            .with_expires_in_seconds(config.storage.relocated_expires_secs);
        Self {
            config: Arc::new(config),
            upstream,
            storage,
            relocator: Arc::new(relocator),
        }
    }

    /// 替换迁移实现
    pub fn with_relocator(mut self, relocator: Arc<dyn ArtifactRelocation>) -> Self {
        self.relocator = relocator;
        self
    }
}

/// 构建路由
pub fn build_router(state: AppState) -> Router {
    let max_upload_bytes = state.config.server.max_upload_bytes;

    Router::new()
        .route(
            "/storage/signed-url",
            get(handlers::signed_url_read).post(handlers::signed_url_write),
        )
        .route("/translate", post(handlers::translate))
        .route("/summarize", post(handlers::summarize))
        .route("/export-summary", post(handlers::export_summary))
        .route("/download", get(handlers::download))
        .route("/health", get(handlers::health))
        .route("/clear-cache", post(handlers::clear_cache))
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// 启动服务器，直到收到 Ctrl-C
pub async fn run(config: Config) -> Result<(), ServerError> {
    let addr = resolve_listen_addr(&config.server.host, config.server.port).await?;

    if config.auth.session_tokens.is_empty() {
        tracing::warn!("[AUTH] 未配置会话令牌，所有受保护的端点都会返回 401");
    }

    let tls = config.server.tls.clone();
    let state = AppState::from_config(config)?;
    tracing::info!(
        "[SERVER] 存储后端: {}, 上游: {}",
        state.storage.backend_name(),
        state.upstream.base_url()
    );
    let app = build_router(state);

    if tls.enable {
        let (cert_path, key_path) = match (tls.cert_path, tls.key_path) {
            (Some(cert), Some(key)) => (expand_tilde(cert), expand_tilde(key)),
            _ => {
                return Err(ServerError::Tls(
                    "启用 TLS 时必须配置 cert_path 和 key_path".to_string(),
                ))
            }
        };
        let rustls = axum_server::tls_rustls::RustlsConfig::from_pem_file(&cert_path, &key_path)
            .await
            .map_err(|e| ServerError::Tls(format!("{}: {}", cert_path.display(), e)))?;

        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            shutdown_handle.graceful_shutdown(Some(std::time::Duration::from_secs(10)));
        });

        tracing::info!("[SERVER] 监听 https://{}", addr);
        axum_server::bind_rustls(addr, rustls)
            .handle(handle)
            .serve(app.into_make_service())
            .await?;
    } else {
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        tracing::info!("[SERVER] 监听 http://{}", addr);
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
    }

    tracing::info!("[SERVER] 已停止");
    Ok(())
}

/// 解析监听地址
///
/// IP 字面量（含不带方括号的 IPv6）直接使用，主机名（如 `localhost`）走系统解析取第一个结果。
pub async fn resolve_listen_addr(host: &str, port: u16) -> Result<SocketAddr, ServerError> {
    let host = host.trim().trim_start_matches('[').trim_end_matches(']');
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }

    let invalid =
        |reason: String| ServerError::InvalidAddress(format!("{}:{} ({})", host, port, reason));
    tokio::net::lookup_host((host, port))
        .await
        .map_err(|e| invalid(e.to_string()))?
        .next()
        .ok_or_else(|| invalid("主机名没有解析结果".to_string()))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("[SERVER] 无法监听退出信号: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("[SERVER] 收到退出信号，等待进行中的请求结束");
}
