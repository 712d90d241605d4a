/// Reference JSON-RPC 2.0 transport over HTTP
///
/// Maps HTTP status, JSON-RPC error objects, and connection failures into
/// the structured [`TransportError`] shape; no classification happens here.
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::config::TransportConfig;

use super::{GasPricePlan, RpcTransport, TransportError, TxReceipt, TxRequest};

pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    receipt_poll_interval: Duration,
    next_id: AtomicU64,
}

impl HttpTransport {
    pub fn new(config: &TransportConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            client,
            url: config.url.clone(),
            receipt_poll_interval: Duration::from_millis(config.receipt_poll_interval_ms),
            next_id: AtomicU64::new(1),
        })
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(TransportError {
                http_status: Some(status.as_u16()),
                message: format!("{} returned {}: {}", method, status, body),
                ..Default::default()
            });
        }

        let body: Value = response.json().await.map_err(|e| {
            TransportError::protocol(format!("{} returned unparseable body: {}", method, e))
        })?;

        if let Some(error) = body.get("error") {
            return Err(TransportError {
                code: error.get("code").and_then(Value::as_i64),
                message: error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("RPC error")
                    .to_string(),
                data: error.get("data").cloned().filter(|d| !d.is_null()),
                ..Default::default()
            });
        }

        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }

    /// Merge the gas plan into the caller's transaction object
    fn with_gas_plan(call: &TxRequest, plan: &GasPricePlan) -> Value {
        let mut params = call.params.clone();
        if let (Some(price), Value::Object(map)) = (plan.gas_price, &mut params) {
            map.insert("gasPrice".to_string(), json!(format!("0x{:x}", price)));
        }
        params
    }
}

#[async_trait]
impl RpcTransport for HttpTransport {
    async fn call(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        self.request(method, params).await
    }

    async fn gas_price(&self) -> Result<u128, TransportError> {
        let result = self.request("eth_gasPrice", json!([])).await?;
        parse_quantity(&result)
    }

    async fn fee_estimate(&self) -> Result<u128, TransportError> {
        let result = self
            .request("eth_maxPriorityFeePerGas", json!([]))
            .await?;
        parse_quantity(&result)
    }

    async fn estimate_gas(&self, call: &TxRequest) -> Result<u64, TransportError> {
        let result = self
            .request("eth_estimateGas", json!([call.params]))
            .await?;
        parse_quantity(&result).map(|q| q as u64)
    }

    async fn submit(&self, call: &TxRequest, plan: &GasPricePlan) -> Result<String, TransportError> {
        let params = Self::with_gas_plan(call, plan);
        let result = self.request("eth_sendTransaction", json!([params])).await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| TransportError::protocol("eth_sendTransaction returned a non-string hash"))
    }

    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TxReceipt, TransportError> {
        // polls until the node reports inclusion; callers bound the total
        // wait with a timeout race
        loop {
            let result = self
                .request("eth_getTransactionReceipt", json!([tx_hash]))
                .await?;

            if !result.is_null() {
                let status = result
                    .get("status")
                    .map(|s| parse_quantity(s).map(|q| q as u64))
                    .transpose()?
                    .unwrap_or(1);
                let block_number = result
                    .get("blockNumber")
                    .filter(|b| !b.is_null())
                    .map(|b| parse_quantity(b).map(|q| q as u64))
                    .transpose()?;
                return Ok(TxReceipt {
                    tx_hash: tx_hash.to_string(),
                    status,
                    block_number,
                });
            }

            tokio::time::sleep(self.receipt_poll_interval).await;
        }
    }

    async fn health_check(&self) -> Result<(), TransportError> {
        self.request("eth_blockNumber", json!([])).await.map(|_| ())
    }
}

fn from_reqwest(error: reqwest::Error) -> TransportError {
    if error.is_connect() || error.is_timeout() {
        TransportError::connectivity(format!("request failed: {}", error))
    } else {
        TransportError::protocol(format!("request failed: {}", error))
    }
}

/// Parse a JSON-RPC quantity (0x-prefixed hex string or plain number)
fn parse_quantity(value: &Value) -> Result<u128, TransportError> {
    match value {
        Value::String(s) => {
            let digits = s.strip_prefix("0x").unwrap_or(s);
            u128::from_str_radix(digits, 16)
                .map_err(|e| TransportError::protocol(format!("bad quantity '{}': {}", s, e)))
        }
        Value::Number(n) => n
            .as_u64()
            .map(u128::from)
            .ok_or_else(|| TransportError::protocol(format!("bad quantity '{}'", n))),
        other => Err(TransportError::protocol(format!(
            "bad quantity '{}'",
            other
        ))),
    }
}
