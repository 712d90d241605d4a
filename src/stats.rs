/// Call statistics for dashboards and operational visibility
///
/// Tracks per-label call and error counts plus cache hit rates since
/// startup. Purely informational; nothing in the resilience pipeline
/// branches on these numbers.
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug)]
pub struct CallStats {
    calls_per_label: Mutex<HashMap<String, u64>>,
    errors_per_label: Mutex<HashMap<String, u64>>,
    cache_hits: AtomicU64,
    cache_misses: AtomicU64,
    started_at: DateTime<Utc>,
}

impl CallStats {
    pub fn new() -> Self {
        Self {
            calls_per_label: Mutex::new(HashMap::new()),
            errors_per_label: Mutex::new(HashMap::new()),
            cache_hits: AtomicU64::new(0),
            cache_misses: AtomicU64::new(0),
            started_at: Utc::now(),
        }
    }

    pub fn record_call(&self, label: &str) {
        *self.calls_per_label.lock().entry(label.to_string()).or_insert(0) += 1;
    }

    pub fn record_error(&self, label: &str) {
        *self.errors_per_label.lock().entry(label.to_string()).or_insert(0) += 1;
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_miss(&self) {
        self.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let calls_per_label = self.calls_per_label.lock().clone();
        let errors_per_label = self.errors_per_label.lock().clone();
        let total_calls: u64 = calls_per_label.values().sum();

        let elapsed_secs = (Utc::now() - self.started_at).num_seconds().max(0) as f64;
        let calls_per_second = if elapsed_secs > 0.0 {
            total_calls as f64 / elapsed_secs
        } else {
            0.0
        };

        StatsSnapshot {
            total_calls,
            calls_per_label,
            errors_per_label,
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            cache_misses: self.cache_misses.load(Ordering::Relaxed),
            calls_per_second,
            started_at: self.started_at,
        }
    }
}

impl Default for CallStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time view of the counters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub total_calls: u64,
    pub calls_per_label: HashMap<String, u64>,
    pub errors_per_label: HashMap<String, u64>,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub calls_per_second: f64,
    pub started_at: DateTime<Utc>,
}

impl StatsSnapshot {
    pub fn cache_hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}
