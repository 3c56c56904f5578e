use anyhow::Context;
use docrelay_lib::{config, server, telemetry};
use std::path::PathBuf;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env 不存在时忽略
    let _ = dotenvy::dotenv();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let config = config::load_config(config_path.as_deref()).context("加载配置失败")?;

    telemetry::init_tracing(&config.logging);
    tracing::info!("[SERVER] docrelay v{} 启动", env!("CARGO_PKG_VERSION"));

    server::run(config).await.context("服务器异常退出")?;
    Ok(())
}
