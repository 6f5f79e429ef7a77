use std::time::Duration;

use serde::Serialize;

/// 默认上游 Ollama 地址
pub const DEFAULT_OLLAMA_HOST: &str = "http://rag-ollama:11434";

/// HEC 投递参数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HecSettings {
    /// 最大尝试次数（含首次）
    pub max_attempts: u32,
    /// 单次请求超时
    pub timeout: Duration,
    /// 退避基数，第 n 次失败后等待 base * 2^n
    pub backoff_base: Duration,
}

impl Default for HecSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            timeout: Duration::from_secs(10),
            backoff_base: Duration::from_secs(1),
        }
    }
}

/// 代理运行配置
///
/// 启动时从环境变量构建一次，之后只读共享，请求处理过程中不再读取环境。
#[derive(Debug, Clone)]
pub struct Config {
    /// 上游 Ollama 地址（已去除结尾的 `/`）
    pub ollama_host: String,
    /// Splunk HEC 地址
    pub hec_url: Option<String>,
    /// Splunk HEC Token
    pub hec_token: Option<String>,
    /// 是否校验 HEC 证书
    pub verify_ssl: bool,
    /// 是否启用交互日志（默认开启）
    pub enable_logging: bool,
    pub hec: HecSettings,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ollama_host: DEFAULT_OLLAMA_HOST.to_string(),
            hec_url: None,
            hec_token: None,
            verify_ssl: false,
            enable_logging: true,
            hec: HecSettings::default(),
        }
    }
}

/// 读取非空字符串变量
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// `"true"`（忽略大小写）视为开启，其余取值视为关闭
fn flag(value: Option<String>, default: bool) -> bool {
    match value {
        Some(v) => v.trim().eq_ignore_ascii_case("true"),
        None => default,
    }
}

impl Config {
    /// 从进程环境变量加载配置
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 通过任意查找函数加载配置（测试中无需修改进程环境）
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let ollama_host = non_empty(lookup("OLLAMA_HOST"))
            .unwrap_or_else(|| DEFAULT_OLLAMA_HOST.to_string())
            .trim_end_matches('/')
            .to_string();

        Self {
            ollama_host,
            hec_url: non_empty(lookup("SPLUNK_HEC_URL")),
            hec_token: non_empty(lookup("SPLUNK_HEC_TOKEN")),
            verify_ssl: flag(lookup("VERIFY_SSL"), false),
            enable_logging: flag(lookup("ENABLE_LOGGING"), true),
            hec: HecSettings::default(),
        }
    }

    /// HEC 地址与 Token 是否都已配置
    pub fn hec_configured(&self) -> bool {
        self.hec_url.is_some() && self.hec_token.is_some()
    }

    /// 拼接上游目标地址，只去掉一个开头的 `/`，不做路径规范化
    pub fn upstream_url(&self, path_and_query: &str) -> String {
        let path = path_and_query.strip_prefix('/').unwrap_or(path_and_query);
        format!("{}/{}", self.ollama_host, path)
    }

    /// `/config` 端点视图（不暴露任何密钥）
    pub fn public_view(&self) -> ConfigView {
        ConfigView {
            logging_enabled: self.enable_logging,
            ollama_host: self.ollama_host.clone(),
            hec_url_configured: self.hec_url.is_some(),
            hec_token_configured: self.hec_token.is_some(),
            ssl_verify: self.verify_ssl,
        }
    }
}

/// 对外展示的配置
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ConfigView {
    pub logging_enabled: bool,
    pub ollama_host: String,
    pub hec_url_configured: bool,
    pub hec_token_configured: bool,
    pub ssl_verify: bool,
}
