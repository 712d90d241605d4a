use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::constants::{DEFAULT_BATCH_SIZE, DEFAULT_INTER_BATCH_DELAY_MS};
use crate::retry::RetryPolicy;

/// Top-level configuration for a resilience client
///
/// Every section has working defaults; a TOML file may override any subset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShieldConfig {
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default = "RetryConfig::read")]
    pub read_retry: RetryConfig,
    #[serde(default = "RetryConfig::transaction")]
    pub tx_retry: RetryConfig,
    #[serde(default)]
    pub submitter: SubmitterConfig,
    #[serde(default)]
    pub transport: TransportConfig,
}

impl Default for ShieldConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            queue: QueueConfig::default(),
            read_retry: RetryConfig::read(),
            tx_retry: RetryConfig::transaction(),
            submitter: SubmitterConfig::default(),
            transport: TransportConfig::default(),
        }
    }
}

impl ShieldConfig {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// SQLite file backing the shared tier; `None` disables it
    pub db_path: Option<String>,
    /// Namespace for this system's entries in the shared tier
    pub namespace: String,
    /// Key prefixes treated as public data and persisted to the shared tier
    pub shared_prefixes: Vec<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            db_path: Some("rpcshield-cache.db".to_string()),
            namespace: "rpcshield".to_string(),
            shared_prefixes: vec![
                "price:".to_string(),
                "supply:".to_string(),
                "pool:".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Queued reads started together per drain pass
    pub batch_size: usize,
    /// Pause between drain passes while work remains
    pub inter_batch_delay_ms: u64,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            inter_batch_delay_ms: DEFAULT_INTER_BATCH_DELAY_MS,
        }
    }
}

/// Serializable mirror of [`RetryPolicy`]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub multiplier: f64,
    pub max_delay_ms: u64,
    pub jitter_ms: u64,
    pub warmup_ms: Option<u64>,
}

impl RetryConfig {
    pub fn read() -> Self {
        Self::from_policy(&RetryPolicy::read())
    }

    pub fn transaction() -> Self {
        Self::from_policy(&RetryPolicy::transaction())
    }

    fn from_policy(policy: &RetryPolicy) -> Self {
        Self {
            max_attempts: policy.max_attempts,
            base_delay_ms: policy.base_delay.as_millis() as u64,
            multiplier: policy.multiplier,
            max_delay_ms: policy.max_delay.as_millis() as u64,
            jitter_ms: policy.jitter.as_millis() as u64,
            warmup_ms: policy.warmup.map(|w| w.as_millis() as u64),
        }
    }

    pub fn to_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.max(1),
            base_delay: Duration::from_millis(self.base_delay_ms),
            multiplier: self.multiplier,
            max_delay: Duration::from_millis(self.max_delay_ms),
            jitter: Duration::from_millis(self.jitter_ms),
            warmup: self.warmup_ms.map(Duration::from_millis),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitterConfig {
    /// Dry-run gas estimation before submitting, to fail fast on reverts
    pub dry_run: bool,
    /// Applied to the latest-block gas price when no override is given
    pub gas_price_multiplier: f64,
    /// Applied to the provider fee estimation fallback
    pub fee_estimate_multiplier: f64,
    /// Tight deadline for the pre-confirmation health probe; `None` skips it
    pub probe_timeout_ms: Option<u64>,
    /// Deadline for one confirmation wait
    pub confirmation_timeout_ms: u64,
}

impl Default for SubmitterConfig {
    fn default() -> Self {
        Self {
            dry_run: true,
            gas_price_multiplier: 1.1,
            fee_estimate_multiplier: 1.2,
            probe_timeout_ms: Some(2_000),
            confirmation_timeout_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    pub url: String,
    pub request_timeout_ms: u64,
    /// Poll interval while waiting for a transaction receipt
    pub receipt_poll_interval_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8545".to_string(),
            request_timeout_ms: 10_000,
            receipt_poll_interval_ms: 1_000,
        }
    }
}
