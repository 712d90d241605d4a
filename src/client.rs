/// Client facade bundling the resilience primitives
///
/// One `ShieldClient` is constructed at application start with a transport
/// and configuration, then handed to whoever needs it - there are no
/// module-level singletons. Consumers use three entry points: the cache,
/// the batching queue, and transaction submission.
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{de::DeserializeOwned, Serialize};

use crate::cache::TtlCache;
use crate::config::ShieldConfig;
use crate::errors::{Classifier, RpcError};
use crate::queue::BatchQueue;
use crate::retry::RetryExecutor;
use crate::stats::{CallStats, StatsSnapshot};
use crate::submitter::TransactionSubmitter;
use crate::transport::{RpcTransport, TransportError, TxReceipt, TxRequest};

#[derive(Clone)]
pub struct ShieldClient {
    cache: Arc<TtlCache>,
    queue: BatchQueue,
    submitter: Arc<TransactionSubmitter>,
    stats: Arc<CallStats>,
}

impl ShieldClient {
    pub fn new(transport: Arc<dyn RpcTransport>, config: &ShieldConfig) -> Self {
        Self::with_classifier(transport, config, Classifier::new())
    }

    /// Construct with a provider-specific classifier override installed
    pub fn with_classifier(
        transport: Arc<dyn RpcTransport>,
        config: &ShieldConfig,
        classifier: Classifier,
    ) -> Self {
        let executor = RetryExecutor::new(classifier);
        let queue = BatchQueue::new(
            &config.queue,
            executor.clone(),
            config.read_retry.to_policy(),
        );
        let submitter = TransactionSubmitter::new(
            transport,
            executor,
            config.tx_retry.to_policy(),
            config.submitter.clone(),
        );

        Self {
            cache: Arc::new(TtlCache::new(&config.cache)),
            queue,
            submitter: Arc::new(submitter),
            stats: Arc::new(CallStats::new()),
        }
    }

    pub fn cache(&self) -> &TtlCache {
        &self.cache
    }

    pub fn queue(&self) -> &BatchQueue {
        &self.queue
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Read-through call: cache lookup, then the batching queue on a miss,
    /// storing the fresh value on success
    pub async fn cached_call<T, F, Fut>(
        &self,
        key: &str,
        ttl: Duration,
        op: F,
    ) -> Result<T, RpcError>
    where
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, TransportError>> + Send + 'static,
    {
        let label = key.split(':').next().unwrap_or(key).to_string();

        if let Some(value) = self.cache.get::<T>(key) {
            self.stats.record_cache_hit();
            return Ok(value);
        }
        self.stats.record_cache_miss();
        self.stats.record_call(&label);

        match self.queue.add(op).await {
            Ok(value) => {
                self.cache.set(key, &value, ttl);
                Ok(value)
            }
            Err(error) => {
                self.stats.record_error(&label);
                Err(error)
            }
        }
    }

    /// Submit a state-changing call; bypasses the cache entirely
    pub async fn submit_transaction(&self, call: &TxRequest) -> Result<TxReceipt, RpcError> {
        self.stats.record_call("submit_transaction");
        let result = self.submitter.submit_transaction(call).await;
        if result.is_err() {
            self.stats.record_error("submit_transaction");
        }
        result
    }
}

impl std::fmt::Debug for ShieldClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShieldClient")
            .field("queue", &self.queue)
            .finish()
    }
}
