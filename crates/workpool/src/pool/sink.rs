//! Bounded result sink and the consumer-side stream

use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};

use async_channel::{Receiver, Sender};
use futures::Stream;

use crate::job::JobResult;

/// Create a bounded result conduit
pub(crate) fn result_channel<T>(capacity: usize) -> (ResultSink<T>, ResultStream<T>) {
    let (tx, rx) = async_channel::bounded(capacity);
    (ResultSink { tx }, ResultStream { rx: Box::pin(rx) })
}

/// Worker side of the result conduit
pub(crate) struct ResultSink<T> {
    tx: Sender<JobResult<T>>,
}

impl<T> Clone for ResultSink<T> {
    fn clone(&self) -> Self {
        Self {
            tx: self.tx.clone(),
        }
    }
}

impl<T> ResultSink<T> {
    /// Publish a result, waiting while the buffer is full
    ///
    /// Fails only when no consumer is left to read it; the completion
    /// tracker closes the sink after the last worker is gone.
    pub(crate) async fn publish(&self, result: JobResult<T>) -> Result<(), JobResult<T>> {
        self.tx.send(result).await.map_err(|err| err.into_inner())
    }

    /// Close the sink; returns true only for the call that closed it
    pub(crate) fn close(&self) -> bool {
        self.tx.close()
    }

    pub(crate) fn len(&self) -> usize {
        self.tx.len()
    }
}

/// Stream of job results
///
/// Finite and single-pass: it ends once every worker has stopped and all
/// buffered results were taken. Clones share the same results; each result
/// is delivered to exactly one of them.
pub struct ResultStream<T> {
    rx: Pin<Box<Receiver<JobResult<T>>>>,
}

impl<T> Clone for ResultStream<T> {
    fn clone(&self) -> Self {
        Self {
            rx: Box::pin((*self.rx).clone()),
        }
    }
}

impl<T> ResultStream<T> {
    /// Next result, or None once the pool has stopped and the buffer is empty
    pub async fn recv(&self) -> Option<JobResult<T>> {
        self.rx.recv().await.ok()
    }

    /// Results buffered and not yet taken
    pub fn buffered(&self) -> usize {
        self.rx.len()
    }

    /// Whether the stream has ended
    pub fn is_terminated(&self) -> bool {
        self.rx.is_closed() && self.rx.is_empty()
    }
}

impl<T> Stream for ResultStream<T> {
    type Item = JobResult<T>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.as_mut().poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobId;
    use futures::StreamExt;
    use std::time::Duration;

    fn ok(id: u64) -> JobResult<u64> {
        JobResult::new(JobId(id), 0, Ok(id), Duration::ZERO)
    }

    #[tokio::test]
    async fn test_stream_ends_after_close() {
        let (sink, stream) = result_channel(4);
        sink.publish(ok(1)).await.unwrap();
        sink.publish(ok(2)).await.unwrap();
        assert_eq!(sink.len(), 2);
        assert!(sink.close());
        assert!(!sink.close());

        assert!(!stream.is_terminated());
        let ids: Vec<u64> = stream.map(|r| r.job_id().0).collect().await;
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_publish_blocks_when_full() {
        let (sink, stream) = result_channel(1);
        sink.publish(ok(1)).await.unwrap();

        let blocked = tokio::time::timeout(Duration::from_millis(30), sink.publish(ok(2))).await;
        assert!(blocked.is_err());

        assert_eq!(stream.recv().await.unwrap().job_id(), JobId(1));
        sink.publish(ok(3)).await.unwrap();
        assert_eq!(ResultStream::buffered(&stream), 1);
    }

    #[tokio::test]
    async fn test_clones_share_results() {
        let (sink, first) = result_channel(4);
        let second = first.clone();
        sink.publish(ok(1)).await.unwrap();
        sink.publish(ok(2)).await.unwrap();
        sink.close();

        assert_eq!(first.recv().await.unwrap().job_id(), JobId(1));
        assert_eq!(second.recv().await.unwrap().job_id(), JobId(2));
        assert!(first.recv().await.is_none());
        assert!(second.is_terminated());
    }
}
