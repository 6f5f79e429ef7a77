//! 代理共享状态与中间件

use std::sync::Arc;

use crate::hec::{HecSink, RecordSink};
use crate::http_client::build_upstream_client;
use crate::model::config::Config;

/// 应用共享状态
///
/// 配置启动后只读；HTTP 连接池本身支持并发使用，无需额外加锁。
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    /// 上游 Ollama 客户端
    pub client: reqwest::Client,
    /// 交互记录接收端
    pub sink: Arc<dyn RecordSink>,
}

impl AppState {
    /// 按配置创建状态，HEC 日志汇随之启动
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let sink = HecSink::new(&config)?;
        Ok(Self {
            client: build_upstream_client()?,
            sink: Arc::new(sink),
            config: Arc::new(config),
        })
    }
}

/// CORS 中间件层
///
/// 允许所有来源，代理通常只在内网暴露给 Open WebUI 等前端。
pub fn cors_layer() -> tower_http::cors::CorsLayer {
    use tower_http::cors::{Any, CorsLayer};

    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
}
