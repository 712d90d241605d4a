/// Scripted transport for tests
///
/// Each surface of [`RpcTransport`] has a FIFO script of outcomes; when a
/// script runs dry the mock answers with a benign success so tests only
/// spell out the interesting steps. Every invocation is recorded so tests
/// can assert how often (and whether) a surface was hit.
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;

use async_trait::async_trait;

use crate::transport::{GasPricePlan, RpcTransport, TransportError, TxReceipt, TxRequest};

#[derive(Default)]
struct Scripts {
    call: VecDeque<Result<Value, TransportError>>,
    gas_price: VecDeque<Result<u128, TransportError>>,
    fee_estimate: VecDeque<Result<u128, TransportError>>,
    estimate_gas: VecDeque<Result<u64, TransportError>>,
    submit: VecDeque<Result<String, TransportError>>,
    receipts: VecDeque<Result<TxReceipt, TransportError>>,
    health: VecDeque<Result<(), TransportError>>,
}

#[derive(Default)]
pub struct MockTransport {
    scripts: Mutex<Scripts>,
    invocation_log: Mutex<Vec<String>>,
    gas_plans: Mutex<Vec<GasPricePlan>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_call(&self, outcome: Result<Value, TransportError>) {
        self.scripts.lock().call.push_back(outcome);
    }

    pub fn push_gas_price(&self, outcome: Result<u128, TransportError>) {
        self.scripts.lock().gas_price.push_back(outcome);
    }

    pub fn push_fee_estimate(&self, outcome: Result<u128, TransportError>) {
        self.scripts.lock().fee_estimate.push_back(outcome);
    }

    pub fn push_estimate_gas(&self, outcome: Result<u64, TransportError>) {
        self.scripts.lock().estimate_gas.push_back(outcome);
    }

    pub fn push_submit(&self, outcome: Result<String, TransportError>) {
        self.scripts.lock().submit.push_back(outcome);
    }

    pub fn push_receipt(&self, outcome: Result<TxReceipt, TransportError>) {
        self.scripts.lock().receipts.push_back(outcome);
    }

    pub fn push_health(&self, outcome: Result<(), TransportError>) {
        self.scripts.lock().health.push_back(outcome);
    }

    /// How many times the named surface was invoked
    pub fn invocations(&self, surface: &str) -> usize {
        self.invocation_log
            .lock()
            .iter()
            .filter(|s| s.as_str() == surface)
            .count()
    }

    /// Gas plan passed to the most recent `submit`
    pub fn last_gas_plan(&self) -> Option<GasPricePlan> {
        self.gas_plans.lock().last().copied()
    }

    fn record(&self, surface: &str) {
        self.invocation_log.lock().push(surface.to_string());
    }

    fn default_receipt() -> TxReceipt {
        TxReceipt {
            tx_hash: "0xmock".to_string(),
            status: 1,
            block_number: Some(1),
        }
    }
}

#[async_trait]
impl RpcTransport for MockTransport {
    async fn call(&self, method: &str, _params: Value) -> Result<Value, TransportError> {
        self.record("call");
        self.record(method);
        self.scripts
            .lock()
            .call
            .pop_front()
            .unwrap_or(Ok(Value::Null))
    }

    async fn gas_price(&self) -> Result<u128, TransportError> {
        self.record("gas_price");
        self.scripts.lock().gas_price.pop_front().unwrap_or(Ok(100))
    }

    async fn fee_estimate(&self) -> Result<u128, TransportError> {
        self.record("fee_estimate");
        self.scripts.lock().fee_estimate.pop_front().unwrap_or(Ok(80))
    }

    async fn estimate_gas(&self, _call: &TxRequest) -> Result<u64, TransportError> {
        self.record("estimate_gas");
        self.scripts
            .lock()
            .estimate_gas
            .pop_front()
            .unwrap_or(Ok(21_000))
    }

    async fn submit(
        &self,
        _call: &TxRequest,
        plan: &GasPricePlan,
    ) -> Result<String, TransportError> {
        self.record("submit");
        self.gas_plans.lock().push(*plan);
        self.scripts
            .lock()
            .submit
            .pop_front()
            .unwrap_or(Ok("0xmock".to_string()))
    }

    async fn wait_for_receipt(&self, _tx_hash: &str) -> Result<TxReceipt, TransportError> {
        self.record("wait_for_receipt");
        self.scripts
            .lock()
            .receipts
            .pop_front()
            .unwrap_or(Ok(Self::default_receipt()))
    }

    async fn health_check(&self) -> Result<(), TransportError> {
        self.record("health_check");
        self.scripts.lock().health.pop_front().unwrap_or(Ok(()))
    }
}
