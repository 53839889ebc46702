//! In-memory reference implementation of [`KeyValueStore`].

use crate::{KeyValueStore, StoreError, StoreResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// A key/value store held entirely in memory.
///
/// Used by tests and by embedders that do not persist the vault between
/// launches (the sandboxed engine keeps its own encrypted state server
/// side; local storage is a cache).
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with the given entries.
    #[must_use]
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: RwLock::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    /// Number of stored entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the store holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get_item(&self, key: &str) -> StoreResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> StoreResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> StoreResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }

    async fn merge_item(&self, key: &str, value: &str) -> StoreResult<()> {
        let mut entries = self.entries.write().await;
        merge_into(&mut entries, key, value)
    }

    async fn clear(&self) -> StoreResult<()> {
        let mut entries = self.entries.write().await;
        debug!(count = entries.len(), "clearing memory store");
        entries.clear();
        Ok(())
    }

    async fn get_all_keys(&self) -> StoreResult<Vec<String>> {
        let mut keys: Vec<String> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    async fn multi_get(&self, keys: &[String]) -> StoreResult<Vec<(String, Option<String>)>> {
        let entries = self.entries.read().await;
        Ok(keys
            .iter()
            .map(|key| (key.clone(), entries.get(key).cloned()))
            .collect())
    }

    async fn multi_set(&self, pairs: &[(String, String)]) -> StoreResult<()> {
        let mut entries = self.entries.write().await;
        for (key, value) in pairs {
            entries.insert(key.clone(), value.clone());
        }
        Ok(())
    }

    async fn multi_remove(&self, keys: &[String]) -> StoreResult<()> {
        let mut entries = self.entries.write().await;
        for key in keys {
            entries.remove(key);
        }
        Ok(())
    }

    async fn multi_merge(&self, pairs: &[(String, String)]) -> StoreResult<()> {
        let mut entries = self.entries.write().await;
        for (key, value) in pairs {
            merge_into(&mut entries, key, value)?;
        }
        Ok(())
    }
}

/// Merges a JSON object value into whatever is stored under `key`.
/// An absent entry behaves like an empty object.
fn merge_into(entries: &mut HashMap<String, String>, key: &str, value: &str) -> StoreResult<()> {
    let incoming: Value = serde_json::from_str(value)?;
    if !incoming.is_object() {
        return Err(StoreError::NotMergeable(key.to_string()));
    }

    let merged = match entries.get(key) {
        Some(existing) => {
            let mut base: Value = serde_json::from_str(existing)?;
            if !base.is_object() {
                return Err(StoreError::NotMergeable(key.to_string()));
            }
            deep_merge(&mut base, incoming);
            base
        }
        None => incoming,
    };

    entries.insert(key.to_string(), merged.to_string());
    Ok(())
}

/// Field-wise merge: nested objects merge recursively, everything else is
/// replaced by the incoming value.
fn deep_merge(base: &mut Value, incoming: Value) {
    match (base, incoming) {
        (Value::Object(base_map), Value::Object(incoming_map)) => {
            for (field, value) in incoming_map {
                match base_map.get_mut(&field) {
                    Some(existing) => deep_merge(existing, value),
                    None => {
                        base_map.insert(field, value);
                    }
                }
            }
        }
        (base, incoming) => *base = incoming,
    }
}
