/// Cache entry with TTL tracking
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A stored value with its creation and expiry timestamps
///
/// Timestamps are wall-clock so entries written by one process remain
/// meaningful to another process reading the shared tier.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry<T> {
    pub data: T,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl<T> CacheEntry<T> {
    pub fn new(data: T, ttl: Duration) -> Self {
        let now = Utc::now();
        let ttl = ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::days(365));
        Self {
            data,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Elapsed time since the entry was created
    pub fn age(&self) -> Duration {
        (Utc::now() - self.created_at).to_std().unwrap_or(Duration::ZERO)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_entry_is_not_expired() {
        let entry = CacheEntry::new("value", Duration::from_secs(60));
        assert!(!entry.is_expired());
        assert!(entry.age() < Duration::from_secs(1));
    }

    #[test]
    fn zero_ttl_expires_immediately() {
        let entry = CacheEntry::new("value", Duration::ZERO);
        assert!(entry.is_expired());
    }
}
