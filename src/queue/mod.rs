/// Batching throttle queue for read calls
///
/// Bursts of UI-triggered reads are admitted FIFO and drained in fixed-size
/// groups with a pause between groups, keeping the call rate under the
/// provider's implicit limit. Each queued operation runs under the retry
/// executor; one operation's failure never blocks its siblings.
use futures::future::{join_all, BoxFuture};
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

use crate::config::QueueConfig;
use crate::errors::{ErrorKind, RpcError};
use crate::retry::{RetryExecutor, RetryPolicy};
use crate::transport::TransportError;

/// One pending read: the wrapped operation plus its completion signal,
/// alive only for a single pass through the queue
type QueuedRequest = BoxFuture<'static, ()>;

struct QueueInner {
    pending: Mutex<VecDeque<QueuedRequest>>,
    /// True while the singleton drain task is alive
    draining: AtomicBool,
    batch_size: usize,
    inter_batch_delay: Duration,
    executor: RetryExecutor,
    policy: RetryPolicy,
}

#[derive(Clone)]
pub struct BatchQueue {
    inner: Arc<QueueInner>,
}

impl BatchQueue {
    pub fn new(config: &QueueConfig, executor: RetryExecutor, policy: RetryPolicy) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                pending: Mutex::new(VecDeque::new()),
                draining: AtomicBool::new(false),
                batch_size: config.batch_size.max(1),
                inter_batch_delay: Duration::from_millis(config.inter_batch_delay_ms),
                executor,
                policy,
            }),
        }
    }

    /// Enqueue a read operation and await its final outcome
    ///
    /// The operation is wrapped in the retry executor before queuing, so the
    /// returned future settles only once retries are exhausted or a result
    /// is in. Admission order is FIFO across batches; completion order
    /// within a batch is unspecified.
    pub async fn add<T, F, Fut>(&self, op: F) -> Result<T, RpcError>
    where
        T: Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, TransportError>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let executor = self.inner.executor.clone();
        let policy = self.inner.policy.clone();

        let job: QueuedRequest = Box::pin(async move {
            let outcome = executor.execute_call(&policy, op).await;
            // receiver may have been abandoned; nothing left to do then
            let _ = tx.send(outcome);
        });

        self.inner.pending.lock().push_back(job);
        self.ensure_draining();

        rx.await.unwrap_or_else(|_| {
            Err(RpcError::new(
                ErrorKind::Unknown,
                "queued operation was dropped before completing",
            ))
        })
    }

    /// Number of requests waiting for a drain pass
    pub fn pending_len(&self) -> usize {
        self.inner.pending.lock().len()
    }

    /// Start the drain loop if it is not already running
    fn ensure_draining(&self) {
        if !self.inner.draining.swap(true, Ordering::SeqCst) {
            let inner = self.inner.clone();
            tokio::spawn(drain_loop(inner));
        }
    }
}

impl std::fmt::Debug for BatchQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchQueue")
            .field("pending", &self.pending_len())
            .field("batch_size", &self.inner.batch_size)
            .finish()
    }
}

/// Singleton drain task: run up to `batch_size` requests concurrently,
/// await the whole group, pause, repeat; exits when the queue runs dry
async fn drain_loop(inner: Arc<QueueInner>) {
    loop {
        let batch: Vec<QueuedRequest> = {
            let mut pending = inner.pending.lock();
            let take = pending.len().min(inner.batch_size);
            pending.drain(..take).collect()
        };

        if batch.is_empty() {
            inner.draining.store(false, Ordering::SeqCst);
            // an add() may have slipped in between the drain and the store;
            // reclaim the loop if so, otherwise its ensure_draining won
            if inner.pending.lock().is_empty() || inner.draining.swap(true, Ordering::SeqCst) {
                return;
            }
            continue;
        }

        log::debug!("draining batch of {} queued calls", batch.len());
        join_all(batch).await;

        if !inner.pending.lock().is_empty() {
            tokio::time::sleep(inner.inter_batch_delay).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, AtomicU32};
    use std::time::Instant;

    fn test_queue(batch_size: usize, delay_ms: u64) -> BatchQueue {
        let config = QueueConfig {
            batch_size,
            inter_batch_delay_ms: delay_ms,
        };
        BatchQueue::new(&config, RetryExecutor::default(), RetryPolicy::read())
    }

    #[tokio::test]
    async fn returns_operation_results() {
        let queue = test_queue(5, 10);
        let result = queue.add(|| async { Ok::<_, TransportError>(21u64 * 2) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_batch_size() {
        let queue = test_queue(5, 20);
        let in_flight = Arc::new(AtomicI32::new(0));
        let peak = Arc::new(AtomicI32::new(0));

        let handles: Vec<_> = (0..12)
            .map(|_| {
                let queue = queue.clone();
                let in_flight = in_flight.clone();
                let peak = peak.clone();
                tokio::spawn(async move {
                    queue
                        .add(move || {
                            let in_flight = in_flight.clone();
                            let peak = peak.clone();
                            async move {
                                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                                peak.fetch_max(now, Ordering::SeqCst);
                                tokio::time::sleep(Duration::from_millis(20)).await;
                                in_flight.fetch_sub(1, Ordering::SeqCst);
                                Ok::<_, TransportError>(())
                            }
                        })
                        .await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert!(peak.load(Ordering::SeqCst) <= 5, "peak was {}", peak.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn failed_operations_do_not_block_siblings() {
        let queue = test_queue(3, 10);

        let failing = {
            let queue = queue.clone();
            tokio::spawn(async move {
                queue
                    .add(|| async {
                        Err::<u32, _>(TransportError::protocol("execution reverted: nope"))
                    })
                    .await
            })
        };
        let succeeding = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.add(|| async { Ok::<_, TransportError>(1u32) }).await })
        };

        assert_eq!(
            failing.await.unwrap().unwrap_err().kind(),
            ErrorKind::ContractError
        );
        assert_eq!(succeeding.await.unwrap().unwrap(), 1);
    }

    #[tokio::test]
    async fn batches_are_separated_by_the_configured_delay() {
        let queue = test_queue(2, 100);
        let start = Instant::now();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let queue = queue.clone();
                tokio::spawn(async move {
                    queue.add(|| async { Ok::<_, TransportError>(()) }).await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        // two batches of two, one inter-batch pause between them
        assert!(start.elapsed() >= Duration::from_millis(100));
    }

    #[tokio::test]
    async fn drain_loop_restarts_after_going_idle() {
        let queue = test_queue(5, 10);

        queue.add(|| async { Ok::<_, TransportError>(1u8) }).await.unwrap();
        // give the drain task time to park itself
        tokio::time::sleep(Duration::from_millis(30)).await;

        let again = queue.add(|| async { Ok::<_, TransportError>(2u8) }).await;
        assert_eq!(again.unwrap(), 2);
    }

    #[tokio::test]
    async fn queued_operations_are_retried() {
        let config = QueueConfig {
            batch_size: 5,
            inter_batch_delay_ms: 10,
        };
        let policy = RetryPolicy {
            base_delay: Duration::from_millis(5),
            jitter: Duration::ZERO,
            ..RetryPolicy::read()
        };
        let queue = BatchQueue::new(&config, RetryExecutor::default(), policy);

        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let result = queue
            .add(move || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(TransportError::connectivity("connection reset"))
                    } else {
                        Ok(99u32)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 99);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }
}
