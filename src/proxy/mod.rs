//! Ollama 日志代理
//!
//! 透明转发所有请求到上游，并在旁路组装交互记录提交给日志汇

mod error;
mod handlers;
mod middleware;
mod router;
mod stream;

pub use middleware::AppState;
pub use router::create_router;
