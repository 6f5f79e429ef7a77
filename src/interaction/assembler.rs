//! 交互记录组装
//!
//! 纯数据变换，不做任何 I/O：
//! 1. 请求到达时根据请求体填充记录
//! 2. 非流式响应：解析完整响应体补全记录
//! 3. 流式响应：逐块累积文本，结束时以最后一个可解析分块的计数器补全记录

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::common::{round_to, truncate_chars};

use super::model::{EVENT_TYPE, InteractionRecord, PerformanceMetrics, SamplingOptions};
use super::types::{ChatMessage, OllamaRequest, OllamaResponse};

/// 最新用户消息截断长度（字符）
pub const MAX_USER_MESSAGE_CHARS: usize = 1000;
/// generate 提示词截断长度（字符）
pub const MAX_PROMPT_CHARS: usize = 2000;
/// 助手回复截断长度（字符）
pub const MAX_RESPONSE_CHARS: usize = 5000;

/// 请求元信息（与请求体无关的部分）
#[derive(Debug, Clone)]
pub struct RequestMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub path: String,
    pub client_ip: Option<String>,
}

/// 计算生成速度（token/s），保留 2 位小数
///
/// `eval_count` 缺失或为 0、耗时不为正时返回 `None`，不会产生无穷大或 NaN。
pub fn tokens_per_second(eval_count: Option<u64>, elapsed: Duration) -> Option<f64> {
    let count = eval_count.filter(|c| *c > 0)?;
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return None;
    }
    Some(round_to(count as f64 / secs, 2))
}

/// 请求是否要求流式响应
///
/// 只有 JSON 布尔值 `true` 才走流式；缺失或其他类型一律按非流式处理。
pub fn stream_requested(body: Option<&Value>) -> bool {
    body.and_then(|v| v.get("stream"))
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn truncated(s: &str, max_chars: usize) -> String {
    truncate_chars(s, max_chars).to_string()
}

impl InteractionRecord {
    /// 根据请求创建记录
    ///
    /// `body` 为解析后的请求 JSON；无法解析时只保留请求元信息。
    pub fn from_request(meta: RequestMeta, body: Option<&Value>) -> Self {
        let mut record = InteractionRecord {
            request_id: meta.request_id,
            timestamp: meta.timestamp.to_rfc3339(),
            event_type: EVENT_TYPE,
            method: meta.method,
            path: meta.path,
            client_ip: meta.client_ip,
            ..Default::default()
        };

        let request = match body.map(OllamaRequest::deserialize) {
            Some(Ok(request)) => request,
            Some(Err(e)) => {
                tracing::debug!("请求体不符合 Ollama 格式，仅记录基础信息: {}", e);
                return record;
            }
            None => return record,
        };

        record.model = request.model;
        record.stream = request.stream.unwrap_or(false);

        // messages 优先于 prompt
        if let Some(messages) = request.messages {
            // 不是对象的条目原样保留，但不参与角色查找
            let parsed: Vec<ChatMessage> = messages
                .iter()
                .filter_map(|m| ChatMessage::deserialize(m).ok())
                .collect();

            record.message_count = Some(messages.len());
            record.latest_user_message = parsed
                .iter()
                .rev()
                .find(|m| m.has_role("user"))
                .map(|m| truncated(&m.content_text(), MAX_USER_MESSAGE_CHARS));

            let system_prompts: Vec<String> = parsed
                .iter()
                .filter(|m| m.has_role("system"))
                .map(|m| m.content_text())
                .collect();
            if !system_prompts.is_empty() {
                record.system_prompts = Some(system_prompts);
            }
            record.messages = Some(messages);
        } else if let Some(prompt) = request.prompt {
            record.prompt = Some(truncated(&prompt, MAX_PROMPT_CHARS));
        }

        if let Some(options) = request.options.as_ref() {
            record.options = SamplingOptions::from_options(options);
        }

        record.tools = request.tools;
        record.format = request.format;
        record
    }

    /// 用完整缓冲的响应体补全记录
    ///
    /// 响应不是合法 JSON 时记录原始文本和解析错误。
    pub fn apply_buffered_response(&mut self, status: u16, body: &[u8], elapsed: Duration) {
        match parse_buffered(body) {
            Ok((json, resp)) => {
                if let Some(message) = &resp.message {
                    let content = message.content.as_deref().unwrap_or("");
                    self.set_assistant_text(content);
                    self.assistant_role = message.role.clone();
                    self.tool_calls = message.tool_calls.clone();
                } else if let Some(text) = &resp.response {
                    self.set_assistant_text(text);
                }

                self.metrics = PerformanceMetrics::from(&resp);
                self.tokens_per_second = tokens_per_second(resp.eval_count, elapsed);
                self.context_length = resp.context.as_ref().map(Vec::len);
                self.full_response_json = Some(json);
            }
            Err(e) => {
                self.set_assistant_text(&String::from_utf8_lossy(body));
                self.parse_error = Some(e.to_string());
            }
        }

        self.duration_seconds = Some(round_to(elapsed.as_secs_f64(), 3));
        self.status_code = Some(status);
    }

    /// 流结束（正常结束、出错或客户端断开）时补全记录
    pub fn apply_stream(&mut self, acc: StreamAccumulator, status: u16, elapsed: Duration) {
        self.stream = true;
        self.set_assistant_text(acc.text());
        self.duration_seconds = Some(round_to(elapsed.as_secs_f64(), 3));
        self.status_code = Some(status);

        if let Some(last) = acc.last_chunk {
            self.metrics = PerformanceMetrics::from(&last);
            self.tokens_per_second = tokens_per_second(last.eval_count, elapsed);
        }
    }

    /// 上游调用失败
    pub fn apply_error(&mut self, error: impl Into<String>, elapsed: Duration) {
        self.error = Some(error.into());
        self.duration_seconds = Some(round_to(elapsed.as_secs_f64(), 3));
    }

    fn set_assistant_text(&mut self, text: &str) {
        self.assistant_response = Some(truncated(text, MAX_RESPONSE_CHARS));
        self.response_length = Some(text.chars().count());
    }
}

fn parse_buffered(body: &[u8]) -> serde_json::Result<(Value, OllamaResponse)> {
    let json: Value = serde_json::from_slice(body)?;
    let resp = OllamaResponse::deserialize(&json)?;
    Ok((json, resp))
}

/// 流式响应累积器
///
/// 每个流式请求一个，只在该请求的生命周期内存在。
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    text: String,
    last_chunk: Option<OllamaResponse>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 尝试把一个分块解析为一个 JSON 对象并累积
    ///
    /// 解码或解析失败时跳过该块，返回 `false`；不影响分块转发。
    pub fn feed(&mut self, chunk: &[u8]) -> bool {
        let Ok(line) = std::str::from_utf8(chunk) else {
            return false;
        };
        let line = line.trim();
        if line.is_empty() {
            return false;
        }
        match serde_json::from_str::<OllamaResponse>(line) {
            Ok(data) => {
                if let Some(text) = data.text() {
                    self.text.push_str(text);
                }
                self.last_chunk = Some(data);
                true
            }
            Err(_) => false,
        }
    }

    /// 已累积的完整文本
    pub fn text(&self) -> &str {
        &self.text
    }
}
