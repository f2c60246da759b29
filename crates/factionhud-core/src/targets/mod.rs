//! User-curated watch-list of players.
//!
//! Entries are persisted under the `targets` key and refreshed on demand
//! through the shared `NetworkClient`, so refreshes draw on the same cache
//! and rate budget as the roster poller.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::NetworkClient;
use crate::models::TargetEntry;
use crate::storage::{load_or_default, save_or_warn, KeyValueStore, TARGETS_KEY};
use crate::utils::lock;

/// Pause between players during a bulk refresh
pub const REFRESH_SPACING: Duration = Duration::from_millis(600);

pub struct TargetList {
    client: NetworkClient,
    store: Arc<dyn KeyValueStore>,
    entries: Mutex<Vec<TargetEntry>>,
}

impl TargetList {
    pub fn new(client: NetworkClient, store: Arc<dyn KeyValueStore>) -> Self {
        let entries: Vec<TargetEntry> = load_or_default(store.as_ref(), TARGETS_KEY);
        debug!(count = entries.len(), "Loaded targets");
        Self {
            client,
            store,
            entries: Mutex::new(entries),
        }
    }

    fn persist(&self, entries: &[TargetEntry]) {
        save_or_warn(self.store.as_ref(), TARGETS_KEY, entries);
    }

    /// Insert or merge an entry by id
    pub fn add(&self, entry: TargetEntry) -> TargetEntry {
        let mut entries = lock(&self.entries);
        let stored = Self::upsert(&mut entries, entry);
        self.persist(&entries);
        stored
    }

    fn upsert(entries: &mut Vec<TargetEntry>, entry: TargetEntry) -> TargetEntry {
        match entries.iter_mut().find(|e| e.id == entry.id) {
            Some(existing) => {
                existing.merge(entry);
                existing.clone()
            }
            None => {
                entries.push(entry.clone());
                entry
            }
        }
    }

    pub fn remove(&self, id: &str) -> bool {
        let mut entries = lock(&self.entries);
        let before = entries.len();
        entries.retain(|e| e.id != id);
        let removed = entries.len() != before;
        if removed {
            self.persist(&entries);
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<TargetEntry> {
        lock(&self.entries).iter().find(|e| e.id == id).cloned()
    }

    pub fn all(&self) -> Vec<TargetEntry> {
        lock(&self.entries).clone()
    }

    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pull fresh profile data for one player and store it. Adds the player
    /// if not yet listed. Failures are logged and yield `None`.
    pub async fn refresh(&self, id: &str) -> Option<TargetEntry> {
        let payload = match self.client.get_user(id).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!(target_id = id, error = %e, "Target refresh failed");
                return None;
            }
        };

        let mut entries = lock(&self.entries);
        let updated = match entries.iter_mut().find(|e| e.id == id) {
            Some(existing) => {
                existing.apply_user(&payload);
                existing.clone()
            }
            None => {
                let entry = TargetEntry::from_user(id, &payload);
                entries.push(entry.clone());
                entry
            }
        };
        self.persist(&entries);
        debug!(target_id = id, "Target refreshed");
        Some(updated)
    }

    /// Refresh every entry in turn, pausing between players. Returns how
    /// many refreshed successfully.
    pub async fn refresh_all(&self) -> usize {
        let ids: Vec<String> = lock(&self.entries).iter().map(|e| e.id.clone()).collect();
        let mut refreshed = 0;

        for (i, id) in ids.iter().enumerate() {
            if i > 0 {
                tokio::time::sleep(REFRESH_SPACING).await;
            }
            if self.refresh(id).await.is_some() {
                refreshed += 1;
            }
        }

        info!(refreshed, total = ids.len(), "Targets refreshed");
        refreshed
    }

    /// The whole list as pretty-printed JSON
    pub fn export(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&*lock(&self.entries))?)
    }

    /// Upsert every entry in `json` that carries an id. Malformed input
    /// imports nothing.
    pub fn import(&self, json: &str) -> usize {
        let items = match serde_json::from_str::<Value>(json) {
            Ok(Value::Array(items)) => items,
            Ok(_) => {
                warn!("Target import expects a JSON array");
                return 0;
            }
            Err(e) => {
                warn!(error = %e, "Target import is not valid JSON");
                return 0;
            }
        };

        let mut entries = lock(&self.entries);
        let mut imported = 0;
        for item in items {
            match serde_json::from_value::<TargetEntry>(item) {
                Ok(entry) => {
                    Self::upsert(&mut entries, entry);
                    imported += 1;
                }
                Err(e) => debug!(error = %e, "Skipping target without an id"),
            }
        }
        if imported > 0 {
            self.persist(&entries);
        }
        info!(imported, "Targets imported");
        imported
    }
}
