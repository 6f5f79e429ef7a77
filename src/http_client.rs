//! HTTP Client 构建模块
//!
//! Input: 超时与证书校验设置
//! Output: reqwest::Client
//! Pos: 上游转发与 HEC 投递共用的客户端构建

use reqwest::Client;
use std::time::Duration;

/// 上游请求超时（秒），与模型推理的最长等待时间一致
pub const UPSTREAM_TIMEOUT_SECS: u64 = 300;

/// 建连超时（秒）
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// 构建转发到上游的 HTTP Client
///
/// 只设置建连超时和读超时：读超时约束相邻两个分块之间的空闲时间，
/// 长时间的流式生成不会被整体超时截断。非流式请求在请求级别另设总超时。
pub fn build_upstream_client() -> anyhow::Result<Client> {
    let client = Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .read_timeout(Duration::from_secs(UPSTREAM_TIMEOUT_SECS))
        .build()?;
    Ok(client)
}

/// 构建 HEC 投递使用的 HTTP Client
///
/// # Arguments
/// * `timeout` - 单次请求总超时
/// * `verify_ssl` - 是否校验证书（内网自签名证书时关闭）
pub fn build_sink_client(timeout: Duration, verify_ssl: bool) -> anyhow::Result<Client> {
    let mut builder = Client::builder().timeout(timeout);

    if !verify_ssl {
        builder = builder.danger_accept_invalid_certs(true);
        tracing::debug!("HEC Client 已关闭证书校验");
    }

    Ok(builder.build()?)
}
