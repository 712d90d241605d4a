/// Dual-tier TTL cache
///
/// Reads hit a process-local map first and fall back to a shared SQLite
/// tier for keys in the configured shared namespaces, so public data
/// survives restarts and is visible across client instances. Values are
/// stored JSON-serialized. The cache never fails a caller: expired and
/// unreadable entries are absent, persistence problems are swallowed and
/// the local tier stays authoritative.
use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::config::CacheConfig;

pub mod entry;
pub mod store;

pub use entry::CacheEntry;
use store::SharedStore;

#[derive(Debug)]
pub struct TtlCache {
    local: Mutex<HashMap<String, CacheEntry<String>>>,
    shared: Option<SharedStore>,
    shared_prefixes: Vec<String>,
}

impl TtlCache {
    pub fn new(config: &CacheConfig) -> Self {
        let shared = config
            .db_path
            .as_ref()
            .and_then(|path| SharedStore::open(path.as_ref(), &config.namespace));
        if config.db_path.is_some() && shared.is_none() {
            log::warn!("shared cache tier unavailable, running local-only");
        }

        Self {
            local: Mutex::new(HashMap::new()),
            shared,
            shared_prefixes: config.shared_prefixes.clone(),
        }
    }

    /// Whether the key belongs to the shared ("public data") partition
    ///
    /// Static policy from configuration, not a per-call choice.
    fn is_shared_key(&self, key: &str) -> bool {
        self.shared_prefixes.iter().any(|p| key.starts_with(p.as_str()))
    }

    /// Store a value with the given TTL
    ///
    /// Serialization failures drop the value with a debug log; callers are
    /// never failed by the cache.
    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        let data = match serde_json::to_string(value) {
            Ok(data) => data,
            Err(e) => {
                log::debug!("cache set skipped for {}: {}", key, e);
                return;
            }
        };
        let entry = CacheEntry::new(data, ttl);

        if self.is_shared_key(key) {
            if let Some(shared) = &self.shared {
                shared.set(key, &entry);
            }
        }
        self.local.lock().insert(key.to_string(), entry);
    }

    /// Fetch an unexpired value, promoting shared-tier hits into the local
    /// tier on the way out
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        if let Some(entry) = self.local_entry(key) {
            return serde_json::from_str(&entry.data).ok();
        }

        let entry = self.shared_entry(key)?;
        let value = serde_json::from_str(&entry.data).ok()?;
        self.local.lock().insert(key.to_string(), entry);
        Some(value)
    }

    /// Elapsed time since the entry was created, or absent
    pub fn get_age(&self, key: &str) -> Option<Duration> {
        if let Some(entry) = self.local_entry(key) {
            return Some(entry.age());
        }
        self.shared_entry(key).map(|entry| entry.age())
    }

    pub fn delete(&self, key: &str) {
        self.local.lock().remove(key);
        if let Some(shared) = &self.shared {
            shared.delete(key);
        }
    }

    /// Drop the entire local tier and every shared entry in our namespace
    pub fn clear(&self) {
        self.local.lock().clear();
        if let Some(shared) = &self.shared {
            shared.clear_namespace();
        }
    }

    /// Unexpired local entry; expired ones are purged on sight
    fn local_entry(&self, key: &str) -> Option<CacheEntry<String>> {
        let mut local = self.local.lock();
        match local.get(key) {
            Some(entry) if entry.is_expired() => {
                local.remove(key);
                None
            }
            Some(entry) => Some(entry.clone()),
            None => None,
        }
    }

    /// Unexpired shared entry for keys in the shared partition
    fn shared_entry(&self, key: &str) -> Option<CacheEntry<String>> {
        if !self.is_shared_key(key) {
            return None;
        }
        let shared = self.shared.as_ref()?;
        let entry = shared.get(key)?;
        if entry.is_expired() {
            shared.delete(key);
            return None;
        }
        Some(entry)
    }
}
