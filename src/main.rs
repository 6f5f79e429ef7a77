mod common;
mod hec;
mod http_client;
mod interaction;
mod model;
mod proxy;

#[cfg(test)]
mod test_support;

use std::net::SocketAddr;

use clap::Parser;
use model::arg::Args;
use model::config::Config;
use proxy::AppState;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // .env 文件可选，不存在时直接使用进程环境
    let env_loaded = match &args.env_file {
        Some(path) => dotenvy::from_path(path).map(|_| path.display().to_string()),
        None => dotenvy::dotenv().map(|p| p.display().to_string()),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match env_loaded {
        Ok(path) => tracing::info!("已加载环境文件: {}", path),
        Err(e) if args.env_file.is_some() => {
            tracing::warn!("加载环境文件失败: {}", e);
        }
        Err(_) => {}
    }

    let config = Config::from_env();

    tracing::info!("Ollama 上游: {}", config.ollama_host);
    tracing::info!(
        "交互日志: {}",
        if config.enable_logging { "开启" } else { "关闭" }
    );
    tracing::info!(
        "Splunk HEC: {}",
        config.hec_url.as_deref().unwrap_or("未配置")
    );
    tracing::info!(
        "HEC Token: {}",
        if config.hec_token.is_some() { "已配置" } else { "未配置" }
    );
    tracing::info!("HEC 证书校验: {}", config.verify_ssl);
    if config.enable_logging && !config.hec_configured() {
        tracing::warn!("HEC 未完整配置，交互记录将不会被投递");
    }

    let state = AppState::from_config(config)?;
    let app = proxy::create_router(state);

    let listener = tokio::net::TcpListener::bind((args.host.as_str(), args.port)).await?;
    tracing::info!("启动 Ollama 日志代理: {}", listener.local_addr()?);
    tracing::info!("可用端点:");
    tracing::info!("  GET  /health");
    tracing::info!("  GET  /config");
    tracing::info!("  *    /{{path}} -> Ollama");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
