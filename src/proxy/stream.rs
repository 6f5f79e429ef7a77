//! 流式响应旁路
//!
//! 把上游分块原样转交给客户端，同时尝试解析每个分块补全交互记录。
//! 流正常结束、出错或被提前丢弃（客户端断开）时，记录都会且只会提交一次。

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use bytes::Bytes;
use futures::Stream;

use crate::hec::RecordSink;
use crate::interaction::{InteractionRecord, StreamAccumulator};

/// 单个流式请求的日志状态
pub struct StreamLog {
    record: InteractionRecord,
    acc: StreamAccumulator,
    status: u16,
    started: Instant,
    sink: Arc<dyn RecordSink>,
}

impl StreamLog {
    pub fn new(
        record: InteractionRecord,
        status: u16,
        started: Instant,
        sink: Arc<dyn RecordSink>,
    ) -> Self {
        Self {
            record,
            acc: StreamAccumulator::new(),
            status,
            started,
            sink,
        }
    }

    fn finish(self, error: Option<String>) {
        let Self {
            mut record,
            acc,
            status,
            started,
            sink,
        } = self;
        record.apply_stream(acc, status, started.elapsed());
        if error.is_some() {
            record.error = error;
        }
        sink.submit(record);
    }
}

/// 带日志旁路的上游字节流
pub struct LoggedStream<S> {
    inner: S,
    log: Option<StreamLog>,
}

impl<S> LoggedStream<S> {
    /// `log` 为 `None`（日志关闭）时只做透传
    pub fn new(inner: S, log: Option<StreamLog>) -> Self {
        Self { inner, log }
    }

    fn finish(&mut self, error: Option<String>) {
        if let Some(log) = self.log.take() {
            log.finish(error);
        }
    }
}

impl<S, E> Stream for LoggedStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::error::Error + Send + Sync + 'static,
{
    type Item = Result<Bytes, io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        match Pin::new(&mut self.inner).poll_next(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                if let Some(log) = self.log.as_mut() {
                    log.acc.feed(&chunk);
                }
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                tracing::error!("上游流中断: {}", e);
                self.finish(Some(e.to_string()));
                Poll::Ready(Some(Err(io::Error::other(e))))
            }
            Poll::Ready(None) => {
                self.finish(None);
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl<S> Drop for LoggedStream<S> {
    fn drop(&mut self) {
        if self.log.is_some() {
            tracing::debug!("客户端提前断开，提交已累积的部分记录");
            self.finish(None);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use futures::stream;

    use crate::test_support::CollectingSink;

    fn chunks() -> Vec<Result<Bytes, io::Error>> {
        ["A", "B", "C", "D", "E"]
            .iter()
            .enumerate()
            .map(|(i, text)| {
                let done = i == 4;
                let line = if done {
                    format!(
                        "{{\"message\":{{\"role\":\"assistant\",\"content\":\"{}\"}},\"done\":true,\"eval_count\":5}}\n",
                        text
                    )
                } else {
                    format!(
                        "{{\"message\":{{\"role\":\"assistant\",\"content\":\"{}\"}},\"done\":false}}\n",
                        text
                    )
                };
                Ok(Bytes::from(line))
            })
            .collect()
    }

    fn logged(
        items: Vec<Result<Bytes, io::Error>>,
        sink: &Arc<CollectingSink>,
    ) -> LoggedStream<stream::Iter<std::vec::IntoIter<Result<Bytes, io::Error>>>> {
        let record = InteractionRecord {
            request_id: "req-1".to_string(),
            ..Default::default()
        };
        let log = StreamLog::new(record, 200, Instant::now(), sink.clone());
        LoggedStream::new(stream::iter(items), Some(log))
    }

    #[tokio::test]
    async fn test_chunks_relayed_verbatim_and_logged_once() {
        let sink = Arc::new(CollectingSink::default());
        let mut items = chunks();
        items.insert(2, Ok(Bytes::from_static(b"{not json")));
        let expected: Vec<Bytes> = items
            .iter()
            .map(|r| r.as_ref().unwrap().clone())
            .collect();

        let relayed: Vec<Bytes> = logged(items, &sink)
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert_eq!(relayed, expected);
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].assistant_response.as_deref(), Some("ABCDE"));
        assert_eq!(records[0].metrics.done, Some(true));
        assert_eq!(records[0].metrics.eval_count, Some(5));
        assert!(records[0].stream);
        assert!(records[0].error.is_none());
    }

    #[tokio::test]
    async fn test_early_drop_still_logs_partial_text_once() {
        let sink = Arc::new(CollectingSink::default());
        let mut stream = logged(chunks(), &sink);

        stream.next().await.unwrap().unwrap();
        stream.next().await.unwrap().unwrap();
        assert!(sink.records().is_empty());
        drop(stream);

        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].assistant_response.as_deref(), Some("AB"));
        assert_eq!(records[0].metrics.done, Some(false));
    }

    #[tokio::test]
    async fn test_upstream_error_logs_error_and_propagates() {
        let sink = Arc::new(CollectingSink::default());
        let mut items = chunks();
        items.truncate(1);
        items.push(Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset")));

        let results: Vec<Result<Bytes, io::Error>> = logged(items, &sink).collect().await;

        assert_eq!(results.len(), 2);
        assert!(results[1].is_err());
        let records = sink.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].assistant_response.as_deref(), Some("A"));
        assert!(records[0].error.as_deref().unwrap().contains("reset"));
    }

    #[tokio::test]
    async fn test_passthrough_without_log() {
        let relayed: Vec<Result<Bytes, io::Error>> =
            LoggedStream::new(stream::iter(chunks()), None).collect().await;
        assert_eq!(relayed.len(), 5);
    }
}
