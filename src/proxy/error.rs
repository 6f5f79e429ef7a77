//! 代理错误类型

use axum::{
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};

/// 主路径（转发）上的错误，总是如实返回给调用方
#[derive(Debug)]
pub enum ProxyError {
    /// 读取入站请求体失败
    InvalidRequest(String),
    /// 上游不可达、超时或响应读取失败
    Upstream(String),
    /// 构建响应失败
    ResponseBuild(String),
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ProxyError::ResponseBuild(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_type(&self) -> &'static str {
        match self {
            ProxyError::InvalidRequest(_) => "invalid_request_error",
            ProxyError::Upstream(_) => "upstream_error",
            ProxyError::ResponseBuild(_) => "internal_error",
        }
    }
}

impl std::fmt::Display for ProxyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProxyError::InvalidRequest(msg) => write!(f, "Failed to read request body: {}", msg),
            ProxyError::Upstream(msg) => write!(f, "Upstream request failed: {}", msg),
            ProxyError::ResponseBuild(msg) => write!(f, "Failed to build response: {}", msg),
        }
    }
}

impl std::error::Error for ProxyError {}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            Json(serde_json::json!({
                "error": {"type": self.error_type(), "message": self.to_string()}
            })),
        )
            .into_response()
    }
}
