/// Global constants used across rpcshield
///
/// This module contains system-wide constants that are not configurable
/// and are used across multiple modules.

// ============================================================================
// JSON-RPC ERROR CODES
// ============================================================================

/// Parse error (invalid JSON was received by the server)
pub const CODE_PARSE_ERROR: i64 = -32700;

/// Method not found
pub const CODE_METHOD_NOT_FOUND: i64 = -32601;

/// Invalid params
pub const CODE_INVALID_PARAMS: i64 = -32602;

/// Internal error; many providers also use this for execution failures
pub const CODE_INTERNAL_ERROR: i64 = -32603;

/// Request limit exceeded (common provider extension)
pub const CODE_LIMIT_EXCEEDED: i64 = -32005;

/// Execution error with revert data (geth-style)
pub const CODE_EXECUTION_ERROR: i64 = 3;

/// User rejected the request (EIP-1193)
pub const CODE_USER_REJECTED: i64 = 4001;

// ============================================================================
// ABI REVERT SELECTORS
// ============================================================================

/// `Error(string)` selector - standard Solidity require/revert messages
pub const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// `Panic(uint256)` selector - arithmetic panics and assertion failures
pub const PANIC_SELECTOR: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];

/// Longest revert reason string we will decode
pub const MAX_REVERT_REASON_LEN: usize = 1024;

// ============================================================================
// BATCHING DEFAULTS
// ============================================================================

/// Number of queued reads started together per drain pass
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Pause between drain passes while the queue is non-empty
pub const DEFAULT_INTER_BATCH_DELAY_MS: u64 = 500;

// ============================================================================
// RETRY DEFAULTS
// ============================================================================

/// Extra multiplier applied to backoff when the provider is rate limiting
pub const RATE_LIMIT_BACKOFF_FACTOR: f64 = 2.0;

/// Extra cap headroom for rate-limit backoff delays
pub const RATE_LIMIT_CAP_FACTOR: u32 = 2;
