//! In-memory response cache for the Torn API.
//!
//! Entries are keyed by `endpoint/id/selections` and are valid for a fixed
//! duration after they were stored. Expired entries are evicted lazily when
//! looked up; nothing sweeps the map in the background.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub payload: Arc<Value>,
    pub stored_at: Instant,
}

impl CacheEntry {
    pub fn new(payload: Arc<Value>) -> Self {
        Self {
            payload,
            stored_at: Instant::now(),
        }
    }

    pub fn age(&self) -> Duration {
        self.stored_at.elapsed()
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.age() >= ttl
    }
}

#[derive(Debug)]
pub struct ResponseCache {
    entries: HashMap<String, CacheEntry>,
    ttl: Duration,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    pub fn cache_key(endpoint: &str, id: &str, selections: &str) -> String {
        format!("{}/{}/{}", endpoint, id, selections)
    }

    /// Look up a live entry, evicting it if it has expired.
    pub fn get(&mut self, key: &str) -> Option<Arc<Value>> {
        let expired = match self.entries.get(key) {
            Some(entry) if !entry.is_expired(self.ttl) => return Some(Arc::clone(&entry.payload)),
            Some(_) => true,
            None => false,
        };
        if expired {
            debug!(key, "Evicting expired cache entry");
            self.entries.remove(key);
        }
        None
    }

    pub fn insert(&mut self, key: String, payload: Arc<Value>) {
        self.entries.insert(key, CacheEntry::new(payload));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Number of stored entries, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
