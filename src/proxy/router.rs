//! 代理路由配置

use axum::{Router, routing::get};

use super::handlers::{get_config, health, proxy_request};
use super::middleware::{AppState, cors_layer};

/// 创建代理路由
///
/// # 端点
/// - `GET /health` - 健康检查
/// - `GET /config` - 查看配置（不含密钥）
/// - `{GET,POST,PUT,DELETE,PATCH} /{path}` - 透明代理到 Ollama
///
/// 具体路由优先于通配代理；具体路径上的其他方法同样落到代理。
/// `OPTIONS` 由 CORS 层直接应答，不会到达代理。
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health).fallback(proxy_request))
        .route("/config", get(get_config).fallback(proxy_request))
        .fallback(proxy_request)
        .layer(cors_layer())
        .with_state(state)
}
