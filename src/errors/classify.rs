/// Transport error classification
///
/// Single source of truth for mapping raw transport failures into
/// [`ErrorKind`]s. Inspection order: user-cancellation signals, provider
/// override, rate-limit signals, transient-RPC signals, contract-revert
/// signals, then `Unknown`. User rejection always wins - no co-occurring
/// signal and no provider override may reclassify it as retryable.
use std::sync::Arc;

use serde_json::Value;

use crate::constants::{
    CODE_EXECUTION_ERROR, CODE_INTERNAL_ERROR, CODE_INVALID_PARAMS, CODE_LIMIT_EXCEEDED,
    CODE_METHOD_NOT_FOUND, CODE_PARSE_ERROR, CODE_USER_REJECTED, ERROR_STRING_SELECTOR,
    MAX_REVERT_REASON_LEN, PANIC_SELECTOR,
};
use crate::errors::{ErrorKind, RpcError};
use crate::transport::TransportError;

/// Provider-specific mapping hook
///
/// Runs after the user-rejection check and before the built-in rules, so a
/// deployment can correct provider quirks (for example a provider that
/// attaches junk `data` to plain internal errors) without forking the
/// default table.
pub type ProviderOverride = Arc<dyn Fn(&TransportError) -> Option<ErrorKind> + Send + Sync>;

#[derive(Clone, Default)]
pub struct Classifier {
    provider_override: Option<ProviderOverride>,
}

impl Classifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install a per-provider mapping consulted before the built-in rules
    pub fn with_override(
        f: impl Fn(&TransportError) -> Option<ErrorKind> + Send + Sync + 'static,
    ) -> Self {
        Self {
            provider_override: Some(Arc::new(f)),
        }
    }

    /// Map a transport failure to exactly one kind; total, never panics
    pub fn classify(&self, error: &TransportError) -> ErrorKind {
        if is_user_rejection(error) {
            return ErrorKind::UserRejected;
        }
        if let Some(hook) = &self.provider_override {
            if let Some(kind) = hook(error) {
                return kind;
            }
        }
        if is_rate_limited(error) {
            return ErrorKind::RateLimited;
        }
        if is_transient(error) {
            return ErrorKind::TransientRpc;
        }
        if is_contract_revert(error) {
            return ErrorKind::ContractError;
        }
        ErrorKind::Unknown
    }

    /// Classify and build the caller-facing error, decoding any revert data
    pub fn classify_full(&self, error: &TransportError) -> RpcError {
        let kind = self.classify(error);
        if kind == ErrorKind::ContractError {
            let reason = error
                .data
                .as_ref()
                .and_then(decode_revert_reason)
                .or_else(|| extract_reason_from_message(&error.message));
            RpcError::contract_error(error.to_string(), reason)
        } else {
            RpcError::new(kind, error.to_string())
        }
    }
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier")
            .field("provider_override", &self.provider_override.is_some())
            .finish()
    }
}

// =============================================================================
// BUILT-IN RULES
// =============================================================================

fn is_user_rejection(error: &TransportError) -> bool {
    if error.code == Some(CODE_USER_REJECTED) {
        return true;
    }
    let message = error.message.to_lowercase();
    message.contains("user rejected")
        || message.contains("user denied")
        || message.contains("rejected by user")
        || message.contains("user cancelled")
}

fn is_rate_limited(error: &TransportError) -> bool {
    if error.http_status == Some(429) || error.code == Some(CODE_LIMIT_EXCEEDED) {
        return true;
    }
    let message = error.message.to_lowercase();
    message.contains("429") || message.contains("too many requests") || message.contains("rate limit")
}

fn is_transient(error: &TransportError) -> bool {
    if error.connectivity {
        return true;
    }
    if matches!(error.http_status, Some(status) if status >= 500) {
        return true;
    }
    match error.code {
        Some(CODE_PARSE_ERROR) | Some(CODE_METHOD_NOT_FOUND) | Some(CODE_INVALID_PARAMS) => {
            return true;
        }
        // Best-effort heuristic: an internal error without attached data is
        // treated as a provider hiccup; with data it falls through to the
        // revert rules below. Providers that deviate use the override hook.
        Some(CODE_INTERNAL_ERROR) if error.data.is_none() => return true,
        _ => {}
    }
    // Attached error data is a strong revert signal, so the loose message
    // matching only applies when there is none.
    if error.data.is_some() {
        return false;
    }
    let message = error.message.to_lowercase();
    message.contains("timeout")
        || message.contains("timed out")
        || message.contains("connection")
        || message.contains("network")
        || message.contains("temporarily unavailable")
        || message.contains("service unavailable")
}

fn is_contract_revert(error: &TransportError) -> bool {
    if error.data.is_some() || error.code == Some(CODE_EXECUTION_ERROR) {
        return true;
    }
    let message = error.message.to_lowercase();
    message.contains("execution reverted") || message.contains("revert")
}

// =============================================================================
// REVERT DECODING
// =============================================================================

/// Decode ABI-encoded revert data into a human-readable reason
///
/// Handles `Error(string)` (0x08c379a0) and `Panic(uint256)` (0x4e487b71).
/// Providers attach the hex either directly or nested under a `data` field.
pub fn decode_revert_reason(data: &Value) -> Option<String> {
    let hex_str = match data {
        Value::String(s) => s.as_str(),
        Value::Object(map) => map.get("data")?.as_str()?,
        _ => return None,
    };
    decode_revert_hex(hex_str)
}

fn decode_revert_hex(data: &str) -> Option<String> {
    let bytes = hex::decode(data.strip_prefix("0x").unwrap_or(data)).ok()?;
    if bytes.len() < 4 {
        return None;
    }

    if bytes[0..4] == ERROR_STRING_SELECTOR && bytes.len() >= 68 {
        // ABI layout: selector + offset word + length word + string bytes
        let len = bytes[36..68]
            .iter()
            .fold(0usize, |acc, &b| acc.saturating_mul(256).saturating_add(b as usize));
        if len <= MAX_REVERT_REASON_LEN && bytes.len() >= 68 + len {
            return String::from_utf8(bytes[68..68 + len].to_vec()).ok();
        }
    }

    if bytes[0..4] == PANIC_SELECTOR && bytes.len() >= 36 {
        return Some(format!("Panic(0x{:02x})", bytes[35]));
    }

    None
}

fn extract_reason_from_message(message: &str) -> Option<String> {
    let reason = message.strip_prefix("execution reverted:")?.trim();
    if reason.is_empty() {
        None
    } else {
        Some(reason.to_string())
    }
}
