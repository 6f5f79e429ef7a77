//! Ollama 请求/响应线上格式（只声明日志关心的字段）

use serde::de::{DeserializeOwned, Deserializer};
use serde::Deserialize;
use serde_json::Value;

/// 字段类型不符时视为缺失，不影响其他字段
fn lenient<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).ok())
}

/// `/api/chat` 与 `/api/generate` 的请求体
///
/// 每个字段独立宽松解析：某个字段类型不对只会丢失该字段。
#[derive(Debug, Default, Deserialize)]
pub struct OllamaRequest {
    #[serde(default, deserialize_with = "lenient")]
    pub model: Option<String>,
    #[serde(default, deserialize_with = "lenient")]
    pub stream: Option<bool>,
    /// chat 风格，原样保留每条消息
    #[serde(default, deserialize_with = "lenient")]
    pub messages: Option<Vec<Value>>,
    /// generate 风格
    #[serde(default, deserialize_with = "lenient")]
    pub prompt: Option<String>,
    /// 采样参数，逐字段宽松读取
    #[serde(default)]
    pub options: Option<Value>,
    #[serde(default)]
    pub tools: Option<Value>,
    #[serde(default)]
    pub format: Option<Value>,
}

/// 对话消息中日志关心的部分
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ChatMessage {
    #[serde(default, deserialize_with = "lenient")]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<Value>,
}

impl ChatMessage {
    pub fn has_role(&self, role: &str) -> bool {
        self.role.as_deref() == Some(role)
    }

    /// 文本内容；非字符串内容按 JSON 文本返回，缺失时为空串
    pub fn content_text(&self) -> String {
        match &self.content {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        }
    }
}

/// 非流式响应体，同时也是流式响应中每一行的格式
#[derive(Debug, Default, Clone, Deserialize)]
pub struct OllamaResponse {
    #[serde(default)]
    pub message: Option<ResponseMessage>,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub done: Option<bool>,
    #[serde(default)]
    pub total_duration: Option<u64>,
    #[serde(default)]
    pub load_duration: Option<u64>,
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    #[serde(default)]
    pub prompt_eval_duration: Option<u64>,
    #[serde(default)]
    pub eval_count: Option<u64>,
    #[serde(default)]
    pub eval_duration: Option<u64>,
    /// generate 接口返回的上下文 token
    #[serde(default)]
    pub context: Option<Vec<Value>>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Value>,
}

impl OllamaResponse {
    /// 本块贡献的助手文本：优先 `message.content`，其次 `response`
    pub fn text(&self) -> Option<&str> {
        match &self.message {
            Some(message) => Some(message.content.as_deref().unwrap_or("")),
            None => self.response.as_deref(),
        }
    }
}
