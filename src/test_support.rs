//! 测试辅助：本地 mock 服务与收集型日志汇

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    Router,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use serde_json::Value;

use crate::hec::RecordSink;
use crate::interaction::InteractionRecord;

/// 在 127.0.0.1 随机端口上启动一个 axum 服务
pub async fn spawn_router(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    addr
}

/// 获取一个当前没有监听者的地址
pub fn unused_addr() -> SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

/// mock HEC 收到的一次请求
#[derive(Debug, Clone)]
pub struct ReceivedEvent {
    pub at: Instant,
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct MockSinkState {
    status: StatusCode,
    received: Arc<Mutex<Vec<ReceivedEvent>>>,
}

/// mock HEC 端点，按固定状态码应答并记录所有请求
pub struct MockSink {
    addr: SocketAddr,
    received: Arc<Mutex<Vec<ReceivedEvent>>>,
}

async fn record_event(
    State(state): State<MockSinkState>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let event = ReceivedEvent {
        at: Instant::now(),
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: serde_json::from_slice(&body).unwrap_or(Value::Null),
    };
    state.received.lock().unwrap().push(event);
    state.status
}

impl MockSink {
    pub async fn start(status: StatusCode) -> Self {
        let received = Arc::new(Mutex::new(Vec::new()));
        let state = MockSinkState {
            status,
            received: received.clone(),
        };
        let router = Router::new().fallback(record_event).with_state(state);
        let addr = spawn_router(router).await;
        Self { addr, received }
    }

    pub fn url(&self) -> String {
        format!("http://{}/services/collector", self.addr)
    }

    pub fn received(&self) -> Vec<ReceivedEvent> {
        self.received.lock().unwrap().clone()
    }

    /// 等待至少收到 `count` 条请求，超时后返回当前已收到的内容
    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<ReceivedEvent> {
        let deadline = Instant::now() + timeout;
        loop {
            let received = self.received();
            if received.len() >= count || Instant::now() >= deadline {
                return received;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

/// 在内存中收集提交的记录
#[derive(Default)]
pub struct CollectingSink {
    records: Mutex<Vec<InteractionRecord>>,
}

impl CollectingSink {
    pub fn records(&self) -> Vec<InteractionRecord> {
        self.records.lock().unwrap().clone()
    }

    pub async fn wait_for(&self, count: usize, timeout: Duration) -> Vec<InteractionRecord> {
        let deadline = Instant::now() + timeout;
        loop {
            let records = self.records();
            if records.len() >= count || Instant::now() >= deadline {
                return records;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl RecordSink for CollectingSink {
    fn submit(&self, record: InteractionRecord) {
        self.records.lock().unwrap().push(record);
    }
}
