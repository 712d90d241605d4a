/// Error handling for the resilience core
///
/// Every failure in the system is reduced to exactly one `ErrorKind` before
/// any retry, backoff, or caller-facing decision is made. The classifier in
/// `classify` is the single place raw transport errors are interpreted;
/// everything else consumes `ErrorKind` through `RpcError`.
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod classify;
pub use classify::Classifier;

// =============================================================================
// ERROR KINDS
// =============================================================================

/// Classification of every failure the core can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Operator explicitly declined the request - never retried
    UserRejected,
    /// Provider-side throttling - retried with the longest backoff
    RateLimited,
    /// Malformed/unavailable/method-not-found/connectivity - standard backoff
    TransientRpc,
    /// Deadline elapsed while waiting - outcome unknown, standard backoff
    Timeout,
    /// Definite on-chain revert - terminal, reason surfaced when decodable
    ContractError,
    /// Unclassified - retried at most once, then surfaced
    Unknown,
}

impl ErrorKind {
    /// Terminal kinds fail immediately without consuming retry attempts
    pub fn is_terminal(&self) -> bool {
        matches!(self, ErrorKind::UserRejected | ErrorKind::ContractError)
    }

    /// Whether the retry executor may re-invoke the operation for this kind
    pub fn is_retryable(&self) -> bool {
        !self.is_terminal()
    }

    /// Short human-readable description used in user-facing messages
    pub fn describe(&self) -> &'static str {
        match self {
            ErrorKind::UserRejected => "request was rejected by the user",
            ErrorKind::RateLimited => "the RPC provider is rate limiting requests",
            ErrorKind::TransientRpc => "the RPC provider is temporarily unavailable",
            ErrorKind::Timeout => "the operation timed out before completing",
            ErrorKind::ContractError => "the contract call reverted",
            ErrorKind::Unknown => "the RPC call failed for an unrecognized reason",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::UserRejected => write!(f, "UserRejected"),
            ErrorKind::RateLimited => write!(f, "RateLimited"),
            ErrorKind::TransientRpc => write!(f, "TransientRpc"),
            ErrorKind::Timeout => write!(f, "Timeout"),
            ErrorKind::ContractError => write!(f, "ContractError"),
            ErrorKind::Unknown => write!(f, "Unknown"),
        }
    }
}

// =============================================================================
// MAIN ERROR TYPE
// =============================================================================

/// Classified failure carried across the module boundary
///
/// The display form is always derived from the kind (plus the decoded revert
/// reason for contract errors), never from a raw transport dump. The raw
/// transport message stays available through [`RpcError::detail`] for logs.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{}", user_message(.kind, .revert_reason))]
pub struct RpcError {
    kind: ErrorKind,
    message: String,
    revert_reason: Option<String>,
}

fn user_message(kind: &ErrorKind, revert_reason: &Option<String>) -> String {
    match (kind, revert_reason) {
        (ErrorKind::ContractError, Some(reason)) => {
            format!("the contract call reverted: {}", reason)
        }
        (kind, _) => kind.describe().to_string(),
    }
}

impl RpcError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            revert_reason: None,
        }
    }

    /// Contract revert with an optional decoded reason string
    pub fn contract_error(message: impl Into<String>, revert_reason: Option<String>) -> Self {
        Self {
            kind: ErrorKind::ContractError,
            message: message.into(),
            revert_reason,
        }
    }

    /// Deadline elapsed; the wrapped operation's outcome is unknown
    pub fn timeout(waited: Duration) -> Self {
        Self {
            kind: ErrorKind::Timeout,
            message: format!("deadline of {}ms elapsed", waited.as_millis()),
            revert_reason: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Decoded revert reason, when the transport supplied ABI revert data
    pub fn revert_reason(&self) -> Option<&str> {
        self.revert_reason.as_deref()
    }

    /// Raw transport-level detail, for logging only
    pub fn detail(&self) -> &str {
        &self.message
    }
}
