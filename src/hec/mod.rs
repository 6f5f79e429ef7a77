//! Splunk HEC 日志汇
//!
//! 交互记录的带外投递，失败完全在此边界内吸收

pub mod sink;
pub mod types;

pub use sink::{HecSink, RecordSink};
