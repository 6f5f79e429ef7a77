//! HEC 投递
//!
//! 交互记录通过 mpsc channel 提交给后台任务，提交方永不等待投递结果。
//! 每条记录最多尝试 `max_attempts` 次，失败后指数退避，最终失败只记本地日志并丢弃。

use reqwest::Client;
use tokio::sync::mpsc;

use crate::http_client::build_sink_client;
use crate::interaction::InteractionRecord;
use crate::model::config::{Config, HecSettings};

use super::types::HecEvent;

/// 待投递队列容量
const QUEUE_CAPACITY: usize = 1024;

/// 交互记录的接收端
///
/// 代理只依赖这个接口提交记录；实现必须立即返回，不得把失败传回提交方。
pub trait RecordSink: Send + Sync {
    fn submit(&self, record: InteractionRecord);
}

/// 单条记录的投递结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// 第 n 次尝试成功
    Delivered { attempts: u32 },
    /// 尝试次数耗尽后丢弃
    Dropped { attempts: u32 },
}

/// HEC HTTP 客户端（单条记录的带重试投递）
#[derive(Clone)]
pub struct HecClient {
    client: Client,
    url: String,
    token: String,
    settings: HecSettings,
}

impl HecClient {
    pub fn new(
        url: impl Into<String>,
        token: impl Into<String>,
        settings: HecSettings,
        verify_ssl: bool,
    ) -> anyhow::Result<Self> {
        Ok(Self {
            client: build_sink_client(settings.timeout, verify_ssl)?,
            url: url.into(),
            token: token.into(),
            settings,
        })
    }

    /// 投递一条记录，失败时按 `backoff_base * 2^attempt` 退避重试
    ///
    /// 永不返回错误，所有失败只记录本地日志。
    pub async fn deliver(&self, record: &InteractionRecord) -> DeliveryOutcome {
        let max_attempts = self.settings.max_attempts.max(1);

        for attempt in 0..max_attempts {
            match self.send_once(record).await {
                Ok(()) => {
                    tracing::info!(
                        "✓ 已发送事件到 HEC: {} - {}",
                        record.model.as_deref().unwrap_or("-"),
                        record.path
                    );
                    return DeliveryOutcome::Delivered {
                        attempts: attempt + 1,
                    };
                }
                Err(e) => {
                    tracing::warn!(
                        "✗ HEC 发送失败（第 {}/{} 次）: {}",
                        attempt + 1,
                        max_attempts,
                        e
                    );
                }
            }

            if attempt + 1 < max_attempts {
                tokio::time::sleep(self.settings.backoff_base * 2u32.pow(attempt)).await;
            }
        }

        tracing::error!(
            "HEC 投递失败，已丢弃记录 {}（共尝试 {} 次）",
            record.request_id,
            max_attempts
        );
        DeliveryOutcome::Dropped {
            attempts: max_attempts,
        }
    }

    async fn send_once(&self, record: &InteractionRecord) -> anyhow::Result<()> {
        let resp = self
            .client
            .post(&self.url)
            .header("Authorization", format!("Splunk {}", self.token))
            .json(&HecEvent::new(record))
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("请求发送失败: {}", e))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("HTTP {}: {}", status, body);
        }
        Ok(())
    }
}

enum SinkState {
    /// 日志关闭
    Disabled,
    /// 日志开启但 HEC 未配置
    Unconfigured,
    Active(mpsc::Sender<InteractionRecord>),
}

/// HEC 日志汇
///
/// 通过 mpsc channel 异步投递，可从同步代码（包括 `Drop`）安全调用。
pub struct HecSink {
    state: SinkState,
}

impl HecSink {
    /// 根据配置创建日志汇，已配置时启动后台消费任务
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        if !config.enable_logging {
            return Ok(Self::disabled());
        }

        let (Some(url), Some(token)) = (&config.hec_url, &config.hec_token) else {
            return Ok(Self {
                state: SinkState::Unconfigured,
            });
        };

        let client = HecClient::new(url.clone(), token.clone(), config.hec, config.verify_ssl)?;
        Ok(Self::with_client(client))
    }

    /// 使用现成的 HecClient 启动后台消费任务
    pub fn with_client(client: HecClient) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        tokio::spawn(Self::consume_loop(client, rx));
        Self {
            state: SinkState::Active(tx),
        }
    }

    pub fn disabled() -> Self {
        Self {
            state: SinkState::Disabled,
        }
    }

    /// 后台消费循环，每条记录独立投递，慢速 HEC 不会阻塞后续记录
    async fn consume_loop(client: HecClient, mut rx: mpsc::Receiver<InteractionRecord>) {
        while let Some(record) = rx.recv().await {
            let client = client.clone();
            tokio::spawn(async move {
                match client.deliver(&record).await {
                    DeliveryOutcome::Delivered { attempts } => {
                        tracing::debug!("记录 {} 已投递（{} 次尝试）", record.request_id, attempts);
                    }
                    DeliveryOutcome::Dropped { attempts } => {
                        tracing::debug!("记录 {} 已丢弃（{} 次尝试）", record.request_id, attempts);
                    }
                }
            });
        }
        tracing::debug!("HEC 投递消费循环已退出");
    }
}

impl RecordSink for HecSink {
    /// 提交一条记录（非阻塞，fire-and-forget）
    fn submit(&self, record: InteractionRecord) {
        match &self.state {
            SinkState::Disabled => {}
            SinkState::Unconfigured => {
                tracing::warn!("日志已启用但 HEC 地址或 Token 未配置，跳过发送");
            }
            SinkState::Active(sender) => {
                if let Err(e) = sender.try_send(record) {
                    tracing::warn!("HEC 记录提交失败（channel 已满或已关闭）: {}", e);
                }
            }
        }
    }
}
