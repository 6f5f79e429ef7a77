use std::path::PathBuf;

use clap::Parser;

/// Ollama 日志代理
#[derive(Parser, Debug)]
#[command(name = "ollama-logger", version, about)]
pub struct Args {
    /// 监听地址
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// 监听端口
    #[arg(short, long, default_value_t = 11435)]
    pub port: u16,

    /// .env 文件路径（未指定时尝试加载当前目录下的 .env）
    #[arg(long)]
    pub env_file: Option<PathBuf>,
}
