//! 交互记录数据模型

use serde::Serialize;
use serde_json::Value;

use super::types::OllamaResponse;

/// 事件类型标记
pub const EVENT_TYPE: &str = "ollama_interaction";

/// 采样参数（来自请求体 `options`）
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SamplingOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_ctx: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_penalty: Option<f64>,
}

impl SamplingOptions {
    /// 逐字段读取，缺失或类型不符的字段保持缺失
    pub fn from_options(options: &Value) -> Self {
        Self {
            temperature: options.get("temperature").and_then(Value::as_f64),
            top_p: options.get("top_p").and_then(Value::as_f64),
            top_k: options.get("top_k").and_then(Value::as_i64),
            num_ctx: options.get("num_ctx").and_then(Value::as_i64),
            repeat_penalty: options.get("repeat_penalty").and_then(Value::as_f64),
        }
    }
}

/// 上游返回的性能计数器
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_duration_ns: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load_duration_ns: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_eval_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_eval_duration_ns: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eval_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub eval_duration_ns: Option<u64>,
}

impl From<&OllamaResponse> for PerformanceMetrics {
    fn from(resp: &OllamaResponse) -> Self {
        Self {
            done: resp.done,
            total_duration_ns: resp.total_duration,
            load_duration_ns: resp.load_duration,
            prompt_eval_count: resp.prompt_eval_count,
            prompt_eval_duration_ns: resp.prompt_eval_duration,
            eval_count: resp.eval_count,
            eval_duration_ns: resp.eval_duration,
        }
    }
}

/// 单次代理请求的交互记录
///
/// 请求到达时创建，随响应（或流）消费逐步补全，完成后只投递一次。
/// 缺失字段在序列化时省略，而不是写成 `null`。
#[derive(Debug, Clone, Default, Serialize)]
pub struct InteractionRecord {
    pub request_id: String,
    pub timestamp: String,
    pub event_type: &'static str,
    pub method: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_ip: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub stream: bool,

    // ============ 请求内容 ============
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latest_user_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompts: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(flatten)]
    pub options: SamplingOptions,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<Value>,

    // ============ 响应内容 ============
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assistant_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assistant_role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Value>,
    #[serde(flatten)]
    pub metrics: PerformanceMetrics,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_per_second: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_length: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub full_response_json: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<String>,

    // ============ 结果 ============
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
