/// Transaction submission policy
///
/// Drives one logical transaction through gas pricing, optional dry-run
/// estimation, submission, and confirmation, under the transaction-grade
/// retry policy. Stages per attempt:
///
/// `PricingGas -> EstimatingGas -> Submitting -> WaitingConfirmation`
///
/// Gas pricing never fails an attempt. A definite revert during estimation
/// fails fast as a contract error before anything is broadcast. A slow or
/// failing node probe before the confirmation wait turns the whole attempt
/// into a transient failure so the retry executor re-runs it instead of
/// parking on a stalled node.
use std::sync::Arc;
use std::time::Duration;

use crate::config::SubmitterConfig;
use crate::errors::{ErrorKind, RpcError};
use crate::retry::{RetryExecutor, RetryPolicy};
use crate::timeout::with_timeout;
use crate::transport::{GasPricePlan, RpcTransport, TxReceipt, TxRequest};

/// Stage of a single submission attempt, for logging and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitStage {
    PricingGas,
    EstimatingGas,
    Submitting,
    WaitingConfirmation,
}

pub struct TransactionSubmitter {
    transport: Arc<dyn RpcTransport>,
    executor: RetryExecutor,
    policy: RetryPolicy,
    config: SubmitterConfig,
}

impl TransactionSubmitter {
    pub fn new(
        transport: Arc<dyn RpcTransport>,
        executor: RetryExecutor,
        policy: RetryPolicy,
        config: SubmitterConfig,
    ) -> Self {
        Self {
            transport,
            executor,
            policy,
            config,
        }
    }

    /// Submit a transaction and wait for its inclusion
    ///
    /// Retries whole attempts on transient failures; user rejection,
    /// definite reverts, and on-chain failure receipts are terminal.
    pub async fn submit_transaction(&self, call: &TxRequest) -> Result<TxReceipt, RpcError> {
        self.executor.execute(&self.policy, || self.attempt(call)).await
    }

    async fn attempt(&self, call: &TxRequest) -> Result<TxReceipt, RpcError> {
        let classifier = self.executor.classifier();

        log::debug!("transaction attempt entering {:?}", SubmitStage::PricingGas);
        let plan = self.price_gas(call).await;

        if self.config.dry_run {
            log::debug!("transaction attempt entering {:?}", SubmitStage::EstimatingGas);
            if let Err(error) = self.transport.estimate_gas(call).await {
                let classified = classifier.classify_full(&error);
                if classified.kind() == ErrorKind::ContractError {
                    // the call would definitely revert; do not broadcast it
                    return Err(classified);
                }
                log::debug!("gas estimation inconclusive, submitting anyway: {}", error);
            }
        }

        log::debug!("transaction attempt entering {:?}", SubmitStage::Submitting);
        let tx_hash = self
            .transport
            .submit(call, &plan)
            .await
            .map_err(|e| classifier.classify_full(&e))?;
        log::info!("transaction submitted: {}", tx_hash);

        if let Some(probe_ms) = self.config.probe_timeout_ms {
            let probe = with_timeout(
                Duration::from_millis(probe_ms),
                self.transport.health_check(),
            )
            .await;
            match probe {
                Ok(Ok(())) => {}
                _ => {
                    // node slow or unhealthy; retry the attempt rather than
                    // wait on a possibly-stalled confirmation
                    return Err(RpcError::new(
                        ErrorKind::TransientRpc,
                        format!("node failed health probe after submitting {}", tx_hash),
                    ));
                }
            }
        }

        log::debug!(
            "transaction attempt entering {:?}",
            SubmitStage::WaitingConfirmation
        );
        let receipt = with_timeout(
            Duration::from_millis(self.config.confirmation_timeout_ms),
            self.transport.wait_for_receipt(&tx_hash),
        )
        .await?
        .map_err(|e| classifier.classify_full(&e))?;

        if !receipt.succeeded() {
            // included on-chain but reverted; retrying cannot help
            return Err(RpcError::contract_error(
                format!("transaction {} failed on-chain with status {}", tx_hash, receipt.status),
                None,
            ));
        }

        log::info!(
            "transaction confirmed: {} (block {:?})",
            receipt.tx_hash,
            receipt.block_number
        );
        Ok(receipt)
    }

    /// Resolve the gas plan via the fallback chain
    ///
    /// Explicit override -> latest-block gas price x multiplier -> provider
    /// fee estimation x multiplier -> let the signing agent decide. Absence
    /// of a price is not an error.
    async fn price_gas(&self, call: &TxRequest) -> GasPricePlan {
        if let Some(price) = call.gas_price_override {
            return GasPricePlan {
                gas_price: Some(price),
            };
        }

        match self.transport.gas_price().await {
            Ok(price) => {
                return GasPricePlan {
                    gas_price: Some(scale(price, self.config.gas_price_multiplier)),
                };
            }
            Err(e) => log::debug!("latest-block gas price unavailable: {}", e),
        }

        match self.transport.fee_estimate().await {
            Ok(price) => GasPricePlan {
                gas_price: Some(scale(price, self.config.fee_estimate_multiplier)),
            },
            Err(e) => {
                log::debug!("fee estimation unavailable, deferring to signer: {}", e);
                GasPricePlan { gas_price: None }
            }
        }
    }
}

impl std::fmt::Debug for TransactionSubmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionSubmitter")
            .field("config", &self.config)
            .finish()
    }
}

fn scale(price: u128, multiplier: f64) -> u128 {
    (price as f64 * multiplier) as u128
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Classifier;
    use crate::testing::MockTransport;
    use crate::transport::TransportError;
    use serde_json::json;

    // "lottery closed" encoded as Error(string)
    const REVERT_DATA: &str = "0x08c379a0\
        0000000000000000000000000000000000000000000000000000000000000020\
        000000000000000000000000000000000000000000000000000000000000000e\
        6c6f747465727920636c6f736564000000000000000000000000000000000000";

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(5),
            multiplier: 2.0,
            max_delay: Duration::from_millis(50),
            jitter: Duration::ZERO,
            warmup: None,
        }
    }

    fn submitter_with(transport: Arc<MockTransport>, config: SubmitterConfig) -> TransactionSubmitter {
        TransactionSubmitter::new(
            transport,
            RetryExecutor::new(Classifier::new()),
            fast_policy(),
            config,
        )
    }

    fn quiet_config() -> SubmitterConfig {
        SubmitterConfig {
            probe_timeout_ms: None,
            confirmation_timeout_ms: 1_000,
            ..SubmitterConfig::default()
        }
    }

    #[tokio::test]
    async fn happy_path_confirms() {
        let transport = Arc::new(MockTransport::new());
        let submitter = submitter_with(transport.clone(), quiet_config());

        let receipt = submitter
            .submit_transaction(&TxRequest::new(json!({"to": "0xdead"})))
            .await
            .unwrap();

        assert!(receipt.succeeded());
        assert_eq!(transport.invocations("submit"), 1);
    }

    #[tokio::test]
    async fn estimation_revert_never_reaches_submission() {
        let transport = Arc::new(MockTransport::new());
        transport.push_estimate_gas(Err(TransportError {
            code: Some(3),
            message: "execution reverted".to_string(),
            data: Some(json!(REVERT_DATA)),
            ..Default::default()
        }));
        let submitter = submitter_with(transport.clone(), quiet_config());

        let error = submitter
            .submit_transaction(&TxRequest::new(json!({})))
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::ContractError);
        assert_eq!(error.revert_reason(), Some("lottery closed"));
        assert_eq!(transport.invocations("submit"), 0);
        // terminal: estimation ran once, no retries
        assert_eq!(transport.invocations("estimate_gas"), 1);
    }

    #[tokio::test]
    async fn inconclusive_estimation_failure_is_ignored() {
        let transport = Arc::new(MockTransport::new());
        transport.push_estimate_gas(Err(TransportError::connectivity("connection reset")));
        let submitter = submitter_with(transport.clone(), quiet_config());

        let receipt = submitter
            .submit_transaction(&TxRequest::new(json!({})))
            .await
            .unwrap();

        assert!(receipt.succeeded());
        assert_eq!(transport.invocations("submit"), 1);
    }

    #[tokio::test]
    async fn reverted_receipt_is_terminal_contract_error() {
        let transport = Arc::new(MockTransport::new());
        transport.push_receipt(Ok(TxReceipt {
            tx_hash: "0xfeed".to_string(),
            status: 0,
            block_number: Some(10),
        }));
        let submitter = submitter_with(transport.clone(), quiet_config());

        let error = submitter
            .submit_transaction(&TxRequest::new(json!({})))
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::ContractError);
        assert_eq!(transport.invocations("submit"), 1);
    }

    #[tokio::test]
    async fn transient_submit_failures_are_retried() {
        let transport = Arc::new(MockTransport::new());
        transport.push_submit(Err(TransportError::connectivity("connection refused")));
        let submitter = submitter_with(transport.clone(), quiet_config());

        let receipt = submitter
            .submit_transaction(&TxRequest::new(json!({})))
            .await
            .unwrap();

        assert!(receipt.succeeded());
        assert_eq!(transport.invocations("submit"), 2);
    }

    #[tokio::test]
    async fn failed_probe_turns_attempt_transient() {
        let transport = Arc::new(MockTransport::new());
        transport.push_health(Err(TransportError::connectivity("probe refused")));
        let config = SubmitterConfig {
            probe_timeout_ms: Some(100),
            confirmation_timeout_ms: 1_000,
            ..SubmitterConfig::default()
        };
        let submitter = submitter_with(transport.clone(), config);

        let receipt = submitter
            .submit_transaction(&TxRequest::new(json!({})))
            .await
            .unwrap();

        assert!(receipt.succeeded());
        // first attempt submitted, probe failed, second attempt went through
        assert_eq!(transport.invocations("submit"), 2);
        assert_eq!(transport.invocations("wait_for_receipt"), 1);
    }

    #[tokio::test]
    async fn gas_fallback_uses_fee_estimate_when_gas_price_fails() {
        let transport = Arc::new(MockTransport::new());
        transport.push_gas_price(Err(TransportError::protocol("method not supported")));
        transport.push_fee_estimate(Ok(100));
        let submitter = submitter_with(transport.clone(), quiet_config());

        submitter
            .submit_transaction(&TxRequest::new(json!({})))
            .await
            .unwrap();

        // 100 x 1.2 fee-estimation multiplier
        assert_eq!(transport.last_gas_plan(), Some(GasPricePlan { gas_price: Some(120) }));
    }

    #[tokio::test]
    async fn gas_fallback_defers_to_signer_when_all_sources_fail() {
        let transport = Arc::new(MockTransport::new());
        transport.push_gas_price(Err(TransportError::protocol("unsupported")));
        transport.push_fee_estimate(Err(TransportError::protocol("unsupported")));
        let submitter = submitter_with(transport.clone(), quiet_config());

        submitter
            .submit_transaction(&TxRequest::new(json!({})))
            .await
            .unwrap();

        assert_eq!(transport.last_gas_plan(), Some(GasPricePlan { gas_price: None }));
    }

    #[tokio::test]
    async fn explicit_override_skips_the_chain() {
        let transport = Arc::new(MockTransport::new());
        let submitter = submitter_with(transport.clone(), quiet_config());

        submitter
            .submit_transaction(&TxRequest::new(json!({})).with_gas_price(555))
            .await
            .unwrap();

        assert_eq!(transport.invocations("gas_price"), 0);
        assert_eq!(transport.last_gas_plan(), Some(GasPricePlan { gas_price: Some(555) }));
    }

    #[tokio::test]
    async fn user_rejection_from_submit_is_not_retried() {
        let transport = Arc::new(MockTransport::new());
        transport.push_submit(Err(TransportError {
            code: Some(4001),
            message: "User rejected the request".to_string(),
            ..Default::default()
        }));
        let submitter = submitter_with(transport.clone(), quiet_config());

        let error = submitter
            .submit_transaction(&TxRequest::new(json!({})))
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::UserRejected);
        assert_eq!(transport.invocations("submit"), 1);
    }
}
