//! Host-supplied key/value storage contract for vaultbridge.
//!
//! The sandbox has no storage of its own; it delegates every storage
//! operation to the host over the bridge. The host fulfils those requests
//! against a [`KeyValueStore`] implementation supplied by the embedder:
//! a platform store in production, [`MemoryStore`] in tests and for
//! embedders that want a purely in-memory vault.
//!
//! The operation set mirrors the storage facade exposed inside the
//! sandbox: single-key get/set/remove/merge, bulk multi-variants, clear,
//! key listing and a flush hint for stores that batch reads.

mod memory;

pub use memory::MemoryStore;

use async_trait::async_trait;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in a storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend itself failed (I/O, platform API, ...).
    #[error("storage backend error: {0}")]
    Backend(String),

    /// A merge target or merge payload was not valid JSON.
    #[error("invalid value: {0}")]
    InvalidValue(#[from] serde_json::Error),

    /// Merge requires JSON objects on both sides.
    #[error("cannot merge non-object value under key '{0}'")]
    NotMergeable(String),
}

/// The storage dependency the host wires into the bridge.
///
/// All operations are promise-like: asynchronous, settling exactly once.
/// Values are opaque strings; the merge operations additionally require
/// the stored and incoming values to be JSON objects, which are merged
/// field by field (nested objects recursively, anything else replaced).
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get_item(&self, key: &str) -> StoreResult<Option<String>>;

    async fn set_item(&self, key: &str, value: &str) -> StoreResult<()>;

    async fn remove_item(&self, key: &str) -> StoreResult<()>;

    async fn merge_item(&self, key: &str, value: &str) -> StoreResult<()>;

    async fn clear(&self) -> StoreResult<()>;

    async fn get_all_keys(&self) -> StoreResult<Vec<String>>;

    /// Hint for stores that batch reads; a store with nothing to flush
    /// returns immediately.
    async fn flush_get_requests(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn multi_get(&self, keys: &[String]) -> StoreResult<Vec<(String, Option<String>)>>;

    async fn multi_set(&self, pairs: &[(String, String)]) -> StoreResult<()>;

    async fn multi_remove(&self, keys: &[String]) -> StoreResult<()>;

    async fn multi_merge(&self, pairs: &[(String, String)]) -> StoreResult<()>;
}
