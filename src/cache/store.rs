/// Shared persistent cache tier backed by SQLite
///
/// Holds the "public" slice of the cache so it survives restarts and is
/// visible to every client instance pointed at the same database file.
/// Persistence failures never reach callers: every operation degrades to
/// "absent" (reads) or a no-op (writes) with a debug log.
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;

use super::entry::CacheEntry;

pub struct SharedStore {
    db: Mutex<Connection>,
    namespace: String,
}

impl SharedStore {
    /// Open (or create) the shared tier; `None` when the database cannot be
    /// opened or initialized, which callers treat as "no shared tier"
    pub fn open(path: &Path, namespace: &str) -> Option<Self> {
        let db = match Connection::open(path) {
            Ok(db) => db,
            Err(e) => {
                log::debug!("shared cache unavailable at {}: {}", path.display(), e);
                return None;
            }
        };

        let created = db.execute(
            "CREATE TABLE IF NOT EXISTS shared_cache (
                key TEXT PRIMARY KEY,
                data TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            )",
            [],
        );
        if let Err(e) = created {
            log::debug!("shared cache schema init failed: {}", e);
            return None;
        }

        Some(Self {
            db: Mutex::new(db),
            namespace: namespace.to_string(),
        })
    }

    fn full_key(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    pub fn get(&self, key: &str) -> Option<CacheEntry<String>> {
        let db = self.db.lock();
        let row = db
            .query_row(
                "SELECT data, created_at, expires_at FROM shared_cache WHERE key = ?1",
                params![self.full_key(key)],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                },
            )
            .optional();

        match row {
            Ok(Some((data, created_ms, expires_ms))) => Some(CacheEntry {
                data,
                created_at: millis_to_datetime(created_ms),
                expires_at: millis_to_datetime(expires_ms),
            }),
            Ok(None) => None,
            Err(e) => {
                log::debug!("shared cache read failed for {}: {}", key, e);
                None
            }
        }
    }

    pub fn set(&self, key: &str, entry: &CacheEntry<String>) {
        let db = self.db.lock();
        let result = db.execute(
            "INSERT OR REPLACE INTO shared_cache (key, data, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                self.full_key(key),
                entry.data,
                entry.created_at.timestamp_millis(),
                entry.expires_at.timestamp_millis()
            ],
        );
        if let Err(e) = result {
            log::debug!("shared cache write failed for {}: {}", key, e);
        }
    }

    pub fn delete(&self, key: &str) {
        let db = self.db.lock();
        if let Err(e) = db.execute(
            "DELETE FROM shared_cache WHERE key = ?1",
            params![self.full_key(key)],
        ) {
            log::debug!("shared cache delete failed for {}: {}", key, e);
        }
    }

    /// Remove every entry under this store's namespace
    pub fn clear_namespace(&self) {
        let db = self.db.lock();
        if let Err(e) = db.execute(
            "DELETE FROM shared_cache WHERE key LIKE ?1",
            params![format!("{}:%", self.namespace)],
        ) {
            log::debug!("shared cache clear failed: {}", e);
        }
    }
}

impl std::fmt::Debug for SharedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedStore")
            .field("namespace", &self.namespace)
            .finish()
    }
}

fn millis_to_datetime(ms: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(ms).single().unwrap_or_else(Utc::now)
}
