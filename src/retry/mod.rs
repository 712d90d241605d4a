/// Retry-with-backoff executor
///
/// The one place in the system where retry decisions are made. Everything
/// else either classifies-and-delegates or passes errors through unchanged.
/// A failure recovered by retry is invisible to the caller; only the final
/// outcome crosses the module boundary.
use std::future::Future;

use crate::errors::{Classifier, ErrorKind, RpcError};
use crate::transport::TransportError;

pub mod policy;
pub use policy::RetryPolicy;

#[derive(Debug, Clone, Default)]
pub struct RetryExecutor {
    classifier: Classifier,
}

impl RetryExecutor {
    pub fn new(classifier: Classifier) -> Self {
        Self { classifier }
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    /// Run an already-classified operation under the policy
    ///
    /// Attempt 1 runs immediately (after the policy's warm-up, if any).
    /// Terminal kinds fail without consuming remaining attempts; `Unknown`
    /// is retried at most once regardless of the attempt budget. Exhaustion
    /// fails with the last classified error, so callers can still branch on
    /// cause.
    pub async fn execute<T, F, Fut>(&self, policy: &RetryPolicy, mut op: F) -> Result<T, RpcError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RpcError>>,
    {
        if let Some(warmup) = policy.warmup {
            tokio::time::sleep(warmup).await;
        }

        let mut unknown_retries = 0u32;
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => {
                    if attempt > 1 {
                        log::debug!("call recovered on attempt {}/{}", attempt, policy.max_attempts);
                    }
                    return Ok(value);
                }
                Err(error) => {
                    let kind = error.kind();
                    if kind.is_terminal() {
                        // user rejection is not a failure, keep it out of warn logs
                        if kind == ErrorKind::UserRejected {
                            log::debug!("call rejected by user, not retrying");
                        } else {
                            log::warn!("call failed terminally ({}): {}", kind, error.detail());
                        }
                        return Err(error);
                    }
                    if attempt >= policy.max_attempts {
                        log::warn!(
                            "call failed after {} attempts ({}): {}",
                            attempt,
                            kind,
                            error.detail()
                        );
                        return Err(error);
                    }
                    if kind == ErrorKind::Unknown {
                        if unknown_retries >= 1 {
                            log::warn!("unclassified error persisted, giving up: {}", error.detail());
                            return Err(error);
                        }
                        unknown_retries += 1;
                    }

                    let delay = policy.delay_for(kind, attempt);
                    log::debug!(
                        "attempt {}/{} failed ({}), retrying in {}ms",
                        attempt,
                        policy.max_attempts,
                        kind,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Run a raw transport operation, classifying each failure first
    pub async fn execute_call<T, F, Fut>(
        &self,
        policy: &RetryPolicy,
        mut op: F,
    ) -> Result<T, RpcError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let classifier = &self.classifier;
        self.execute(policy, || {
            let fut = op();
            async move { fut.await.map_err(|e| classifier.classify_full(&e)) }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(5),
            multiplier: 2.0,
            max_delay: Duration::from_millis(50),
            jitter: Duration::ZERO,
            warmup: None,
        }
    }

    #[tokio::test]
    async fn retry_bound_is_exact() {
        let executor = RetryExecutor::default();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), RpcError> = executor
            .execute(&fast_policy(3), || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(RpcError::new(ErrorKind::RateLimited, "throttled")) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::RateLimited);
    }

    #[tokio::test]
    async fn terminal_errors_short_circuit() {
        let executor = RetryExecutor::default();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), RpcError> = executor
            .execute(&fast_policy(5), || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(RpcError::contract_error("reverted", None)) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::ContractError);
    }

    #[tokio::test]
    async fn user_rejection_short_circuits() {
        let executor = RetryExecutor::default();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), RpcError> = executor
            .execute(&fast_policy(5), || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(RpcError::new(ErrorKind::UserRejected, "declined in wallet")) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::UserRejected);
    }

    #[tokio::test]
    async fn unknown_is_retried_at_most_once() {
        let executor = RetryExecutor::default();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), RpcError> = executor
            .execute(&fast_policy(10), || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(RpcError::new(ErrorKind::Unknown, "???")) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Unknown);
    }

    #[tokio::test]
    async fn single_attempt_policy_never_retries() {
        let executor = RetryExecutor::default();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), RpcError> = executor
            .execute(&fast_policy(1), || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(RpcError::new(ErrorKind::TransientRpc, "flaky")) }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let executor = RetryExecutor::default();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = executor
            .execute(&fast_policy(3), || {
                let n = counter.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(RpcError::new(ErrorKind::TransientRpc, "flaky"))
                    } else {
                        Ok(42u64)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn execute_call_classifies_raw_errors() {
        let executor = RetryExecutor::default();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<(), RpcError> = executor
            .execute_call(&fast_policy(4), || {
                counter.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(TransportError {
                        http_status: Some(429),
                        message: "too many requests".to_string(),
                        ..Default::default()
                    })
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 4);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::RateLimited);
    }
}
