//! Local key-value persistence.
//!
//! Values are JSON documents stored under short keys (`targets`, `dibs`,
//! `notes`, `apiKey`, `tornStatsKey`). `FileStore` keeps one file per key on
//! disk; `MemoryStore` backs tests and ephemeral sessions.

pub mod file;
pub mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use anyhow::{Context, Result};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::warn;

pub const TARGETS_KEY: &str = "targets";
pub const DIBS_KEY: &str = "dibs";
pub const NOTES_KEY: &str = "notes";
pub const API_KEY_KEY: &str = "apiKey";
pub const TORNSTATS_KEY_KEY: &str = "tornStatsKey";

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Value>>;

    fn set(&self, key: &str, value: &Value) -> Result<()>;

    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<()>;

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>>;

    /// Remove every key starting with `prefix`, returning how many went.
    fn clear_prefix(&self, prefix: &str) -> Result<usize> {
        let keys = self.keys_with_prefix(prefix)?;
        for key in &keys {
            self.remove(key)?;
        }
        Ok(keys.len())
    }
}

/// Read and decode a stored value.
pub fn load_json<T: DeserializeOwned>(store: &dyn KeyValueStore, key: &str) -> Result<Option<T>> {
    match store.get(key)? {
        Some(value) => {
            let decoded = serde_json::from_value(value)
                .with_context(|| format!("Failed to decode stored value: {}", key))?;
            Ok(Some(decoded))
        }
        None => Ok(None),
    }
}

/// Read a stored value, falling back to `T::default()` on absence or error.
pub fn load_or_default<T: DeserializeOwned + Default>(store: &dyn KeyValueStore, key: &str) -> T {
    match load_json(store, key) {
        Ok(Some(value)) => value,
        Ok(None) => T::default(),
        Err(e) => {
            warn!(key, error = %e, "Failed to load stored value, using default");
            T::default()
        }
    }
}

pub fn save_json<T: Serialize + ?Sized>(store: &dyn KeyValueStore, key: &str, value: &T) -> Result<()> {
    let value = serde_json::to_value(value)
        .with_context(|| format!("Failed to encode value for: {}", key))?;
    store.set(key, &value)
}

/// Persist a value, logging instead of failing. In-memory state stays
/// authoritative when the disk write fails.
pub fn save_or_warn<T: Serialize + ?Sized>(store: &dyn KeyValueStore, key: &str, value: &T) {
    if let Err(e) = save_json(store, key, value) {
        warn!(key, error = %e, "Failed to persist value");
    }
}

/// Read a stored credential string.
pub fn load_secret(store: &dyn KeyValueStore, key: &str) -> Option<String> {
    load_or_default::<Option<String>>(store, key).filter(|s| !s.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_load_or_default_on_bad_shape() {
        let store = MemoryStore::new();
        store.set(TARGETS_KEY, &json!("not a list")).expect("set");
        let targets: Vec<String> = load_or_default(&store, TARGETS_KEY);
        assert!(targets.is_empty());
    }

    #[test]
    fn test_typed_round_trip() {
        let store = MemoryStore::new();
        save_json(&store, "numbers", &vec![1, 2, 3]).expect("save");
        let loaded: Option<Vec<i32>> = load_json(&store, "numbers").expect("load");
        assert_eq!(loaded, Some(vec![1, 2, 3]));
    }

    #[test]
    fn test_load_secret_ignores_blank() {
        let store = MemoryStore::new();
        assert_eq!(load_secret(&store, API_KEY_KEY), None);
        store.set(API_KEY_KEY, &json!("  ")).expect("set");
        assert_eq!(load_secret(&store, API_KEY_KEY), None);
        store.set(API_KEY_KEY, &json!("abc")).expect("set");
        assert_eq!(load_secret(&store, API_KEY_KEY).as_deref(), Some("abc"));
    }

    #[test]
    fn test_clear_prefix() {
        let store = MemoryStore::new();
        store.set("war.1", &json!(1)).expect("set");
        store.set("war.2", &json!(2)).expect("set");
        store.set("notes", &json!({})).expect("set");

        assert_eq!(store.clear_prefix("war.").expect("clear"), 2);
        assert_eq!(store.keys_with_prefix("").expect("keys"), vec!["notes".to_string()]);
    }
}
