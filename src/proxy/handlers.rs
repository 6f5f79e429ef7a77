//! 代理 HTTP 处理器

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Method, Request, StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use chrono::Utc;
use futures::StreamExt;
use serde_json::Value;

use crate::http_client::UPSTREAM_TIMEOUT_SECS;
use crate::interaction::{InteractionRecord, RequestMeta, stream_requested};

use super::error::ProxyError;
use super::middleware::AppState;
use super::stream::{LoggedStream, StreamLog};

/// 允许代理的请求方法
const PROXY_METHODS: [Method; 5] = [
    Method::GET,
    Method::POST,
    Method::PUT,
    Method::DELETE,
    Method::PATCH,
];

/// GET /health
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "logging_enabled": state.config.enable_logging,
        "hec_configured": state.config.hec_configured(),
    }))
}

/// GET /config
/// 查看当前配置（不暴露密钥）
pub async fn get_config(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.config.public_view())
}

/// 单次转发的上下文
struct Forward {
    state: AppState,
    method: Method,
    url: String,
    started: Instant,
    record: Option<InteractionRecord>,
}

impl Forward {
    /// 上游失败：记录错误并提交，然后把失败交给调用方
    fn fail(self, err: reqwest::Error) -> ProxyError {
        tracing::error!("转发到上游失败: {} {} - {}", self.method, self.url, err);
        if let Some(mut record) = self.record {
            record.apply_error(err.to_string(), self.started.elapsed());
            self.state.sink.submit(record);
        }
        ProxyError::Upstream(err.to_string())
    }
}

/// `/{path}` 透明代理
///
/// 请求原样转发到上游；按请求体的 `stream` 字段选择缓冲或流式转发。
/// 日志旁路不改变、不延迟返回给调用方的字节。
pub async fn proxy_request(
    State(state): State<AppState>,
    request: Request<Body>,
) -> Result<Response, ProxyError> {
    if !PROXY_METHODS.contains(request.method()) {
        return Ok(StatusCode::METHOD_NOT_ALLOWED.into_response());
    }

    let started = Instant::now();
    let timestamp = Utc::now();
    let client_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string());

    let (parts, body) = request.into_parts();
    let method = parts.method;
    let path = parts.uri.path();
    let path = path.strip_prefix('/').unwrap_or(path).to_string();
    let url = state.config.upstream_url(
        parts
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/"),
    );

    let mut headers = parts.headers;
    headers.remove(header::HOST);
    headers.remove(header::CONTENT_LENGTH);

    let body = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|e| ProxyError::InvalidRequest(e.to_string()))?;

    // 解析失败不影响转发，只会让日志记录变得简略
    let request_json: Option<Value> = if body.is_empty() {
        None
    } else {
        serde_json::from_slice(&body).ok()
    };
    let streaming = stream_requested(request_json.as_ref());

    let request_id = uuid::Uuid::new_v4().to_string();
    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        streaming,
        "代理请求"
    );

    #[cfg(feature = "sensitive-logs")]
    tracing::debug!(request_id = %request_id, "请求体: {}", String::from_utf8_lossy(&body));

    let record = state.config.enable_logging.then(|| {
        let meta = RequestMeta {
            request_id,
            timestamp,
            method: method.to_string(),
            path,
            client_ip,
        };
        InteractionRecord::from_request(meta, request_json.as_ref())
    });

    let upstream = state
        .client
        .request(method.clone(), url.as_str())
        .headers(headers)
        .body(body);

    let forward = Forward {
        state,
        method,
        url,
        started,
        record,
    };

    if streaming {
        forward_streaming(forward, upstream).await
    } else {
        forward_buffered(forward, upstream).await
    }
}

/// 非流式：缓冲完整响应后原样返回，响应构建完成后再异步解析并提交日志
async fn forward_buffered(
    forward: Forward,
    upstream: reqwest::RequestBuilder,
) -> Result<Response, ProxyError> {
    let resp = match upstream
        .timeout(Duration::from_secs(UPSTREAM_TIMEOUT_SECS))
        .send()
        .await
    {
        Ok(resp) => resp,
        Err(e) => return Err(forward.fail(e)),
    };

    let status = resp.status();
    let upstream_headers = resp.headers().clone();
    let bytes = match resp.bytes().await {
        Ok(bytes) => bytes,
        Err(e) => return Err(forward.fail(e)),
    };
    let elapsed = forward.started.elapsed();

    #[cfg(feature = "sensitive-logs")]
    tracing::debug!("上游响应体: {}", String::from_utf8_lossy(&bytes));

    let response = build_response(status, &upstream_headers, Body::from(bytes.clone()), false);

    let Forward { state, record, .. } = forward;
    if let Some(record) = record {
        let sink = state.sink.clone();
        tokio::spawn(async move {
            let mut record = record;
            record.apply_buffered_response(status.as_u16(), &bytes, elapsed);
            sink.submit(record);
        });
    }

    response
}

/// 流式：逐块原样转发，同时在旁路累积日志
async fn forward_streaming(
    forward: Forward,
    upstream: reqwest::RequestBuilder,
) -> Result<Response, ProxyError> {
    let resp = match upstream.send().await {
        Ok(resp) => resp,
        Err(e) => return Err(forward.fail(e)),
    };

    let status = resp.status();
    let upstream_headers = resp.headers().clone();

    let Forward {
        state,
        started,
        record,
        ..
    } = forward;
    let log = record.map(|record| StreamLog::new(record, status.as_u16(), started, state.sink.clone()));
    let stream = LoggedStream::new(resp.bytes_stream().boxed(), log);

    build_response(status, &upstream_headers, Body::from_stream(stream), true)
}

/// 用上游状态码和响应头构建响应
///
/// 逐跳头不复制；流式响应重新分帧，因此同时去掉 `content-length`。
fn build_response(
    status: StatusCode,
    upstream_headers: &HeaderMap,
    body: Body,
    streaming: bool,
) -> Result<Response, ProxyError> {
    let mut response = Response::builder()
        .status(status)
        .body(body)
        .map_err(|e| ProxyError::ResponseBuild(e.to_string()))?;

    let headers = response.headers_mut();
    for (name, value) in upstream_headers.iter() {
        if name == header::TRANSFER_ENCODING || name == header::CONNECTION {
            continue;
        }
        if streaming && name == header::CONTENT_LENGTH {
            continue;
        }
        headers.append(name.clone(), value.clone());
    }

    Ok(response)
}
