//! 交互日志模块
//!
//! 从代理的请求/响应（含流式分块）组装结构化交互记录

pub mod assembler;
pub mod model;
pub mod types;

pub use assembler::{RequestMeta, StreamAccumulator, stream_requested};
pub use model::InteractionRecord;
