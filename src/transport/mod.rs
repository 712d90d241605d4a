/// Transport boundary for the resilience core
///
/// The transport is the only external dependency: a black box accepting
/// JSON-RPC-shaped calls against remote chain state. Contract specifics
/// (ABIs, addresses, signing) stay with the caller - calls cross this
/// boundary as opaque JSON params.
use async_trait::async_trait;
use serde_json::Value;

pub mod http;
pub use http::HttpTransport;

// =============================================================================
// TRANSPORT ERROR SHAPE
// =============================================================================

/// Raw failure shape produced by a transport
///
/// Carries the structured fields the classifier inspects: JSON-RPC error
/// code, HTTP status, the provider's message, and any attached error data
/// (ABI-encoded revert bytes for execution failures).
#[derive(Debug, Clone, Default)]
pub struct TransportError {
    /// JSON-RPC error object code, when the provider returned one
    pub code: Option<i64>,
    /// HTTP status, when the failure happened at the HTTP layer
    pub http_status: Option<u16>,
    /// Provider or transport message
    pub message: String,
    /// JSON-RPC error `data` field (revert bytes, provider extensions)
    pub data: Option<Value>,
    /// Set by the transport for connection-level failures (refused, DNS,
    /// socket timeout) where no response was received at all
    pub connectivity: bool,
}

impl TransportError {
    pub fn connectivity(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            connectivity: true,
            ..Default::default()
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }
}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (self.code, self.http_status) {
            (Some(code), _) => write!(f, "RPC error {}: {}", code, self.message),
            (None, Some(status)) => write!(f, "HTTP {}: {}", status, self.message),
            (None, None) => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for TransportError {}

// =============================================================================
// TRANSACTION TYPES
// =============================================================================

/// A state-changing call, built by the caller, opaque to this core
#[derive(Debug, Clone)]
pub struct TxRequest {
    /// Transaction object the transport forwards verbatim (minus gas pricing)
    pub params: Value,
    /// Explicit gas price override; skips the fallback chain entirely
    pub gas_price_override: Option<u128>,
}

impl TxRequest {
    pub fn new(params: Value) -> Self {
        Self {
            params,
            gas_price_override: None,
        }
    }

    pub fn with_gas_price(mut self, gas_price: u128) -> Self {
        self.gas_price_override = Some(gas_price);
        self
    }
}

/// Gas pricing decision for one submission attempt
///
/// `None` means "let the signing agent choose". Once a plan is resolved it
/// is reused for the whole attempt; a fresh attempt recomputes it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GasPricePlan {
    pub gas_price: Option<u128>,
}

/// Inclusion outcome of a submitted transaction
#[derive(Debug, Clone)]
pub struct TxReceipt {
    pub tx_hash: String,
    /// On-chain status code; 1 means success, anything else is a revert
    pub status: u64,
    pub block_number: Option<u64>,
}

impl TxReceipt {
    pub fn succeeded(&self) -> bool {
        self.status == 1
    }
}

// =============================================================================
// TRANSPORT TRAIT
// =============================================================================

/// The request/response surface a resilience client runs against
///
/// Implementations map their native failures into [`TransportError`] with as
/// many structured fields filled in as the provider exposes; classification
/// happens above this boundary, never inside it.
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Perform a read call and return the raw result value
    async fn call(&self, method: &str, params: Value) -> Result<Value, TransportError>;

    /// Gas price from the latest block
    async fn gas_price(&self) -> Result<u128, TransportError>;

    /// Provider fee estimation, where supported
    async fn fee_estimate(&self) -> Result<u128, TransportError>;

    /// Dry-run gas estimation for a transaction; a revert-shaped error here
    /// means the transaction would definitely fail on-chain
    async fn estimate_gas(&self, call: &TxRequest) -> Result<u64, TransportError>;

    /// Submit the transaction with the chosen gas plan, returning its handle
    async fn submit(&self, call: &TxRequest, plan: &GasPricePlan) -> Result<String, TransportError>;

    /// Wait until the transaction is included and return its receipt
    ///
    /// May poll indefinitely; callers bound the wait with a timeout race.
    async fn wait_for_receipt(&self, tx_hash: &str) -> Result<TxReceipt, TransportError>;

    /// Cheap liveness probe (block-height query or equivalent)
    async fn health_check(&self) -> Result<(), TransportError>;
}
