//! Splunk HEC 线上格式

use serde::Serialize;

use crate::interaction::InteractionRecord;

pub const SOURCE_TYPE: &str = "ollama:interactions:json";
pub const SOURCE: &str = "ollama_proxy";
pub const HOST: &str = "rag-system";

/// HEC 事件（每次投递尝试前构造）
#[derive(Debug, Serialize)]
pub struct HecEvent<'a> {
    /// 发送时间（Unix 秒，带小数）
    pub time: f64,
    pub sourcetype: &'static str,
    pub source: &'static str,
    pub host: &'static str,
    pub event: &'a InteractionRecord,
}

impl<'a> HecEvent<'a> {
    pub fn new(event: &'a InteractionRecord) -> Self {
        let now = chrono::Utc::now();
        Self {
            time: now.timestamp_micros() as f64 / 1_000_000.0,
            sourcetype: SOURCE_TYPE,
            source: SOURCE,
            host: HOST,
            event,
        }
    }
}
