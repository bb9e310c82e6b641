//! In-memory TTL cache for aggregated shelf results.
//!
//! Entries are evicted lazily when an expired key is read; there is no
//! background sweep. That bounds staleness, not memory: a high-cardinality
//! filter space grows the map without bound. The stats surface exposes
//! entry count so growth is observable.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;

struct CacheEntry {
    items: Vec<Value>,
    expires_at: Instant,
}

/// Shelf-result cache keyed by the canonical `(shelf, filters)` encoding.
pub struct CacheManager {
    ttl: Duration,
    entries: DashMap<String, CacheEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub ttl_secs: u64,
}

impl CacheManager {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: DashMap::new(),
        }
    }

    /// The cached items, if present and fresh. An expired entry is removed
    /// here, at read time.
    pub fn get(&self, key: &str) -> Option<Vec<Value>> {
        {
            let entry = self.entries.get(key)?;
            if entry.expires_at > Instant::now() {
                log::debug!("cache hit: {key}");
                return Some(entry.items.clone());
            }
        }
        log::debug!("cache expired: {key}");
        self.entries.remove(key);
        None
    }

    /// Store items under `key`, unconditionally overwriting and restarting
    /// the expiry clock from now.
    pub fn set(&self, key: &str, items: Vec<Value>) {
        let expires_at = Instant::now() + self.ttl;
        self.entries.insert(key.to_string(), CacheEntry { items, expires_at });
        log::debug!("cache set: {key} (ttl {:?})", self.ttl);
    }

    pub fn clear(&self) {
        self.entries.clear();
        log::info!("cache cleared");
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            ttl_secs: self.ttl.as_secs(),
        }
    }
}
