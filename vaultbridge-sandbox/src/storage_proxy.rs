//! Sandbox-side facade over the host's key/value store.
//!
//! Each operation posts an `async-storage` frame and suspends until the
//! host's correlated response arrives. The proxy owns its own id space,
//! independent of call ids: monotonically increasing from 0 for the
//! lifetime of the runtime instance.

use crate::post::OutboundPost;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::debug;
use vaultbridge_types::{SandboxFrame, StorageFault, StorageOp, StorageRequestId, StorageResponse};

/// A storage response named an id with no pending request.
///
/// Either the host answered twice or it invented an id; both indicate a
/// protocol defect on the other side of the bridge.
#[derive(Debug, Error)]
#[error("no pending storage request {id}")]
pub struct UnknownStorageRequest {
    pub id: StorageRequestId,
}

type PendingStorage = Mutex<HashMap<StorageRequestId, oneshot::Sender<Result<Value, StorageFault>>>>;

/// Forwards storage operations to the host and settles them from the
/// host's replies. Cheap to clone; all clones share the id space and the
/// pending table.
#[derive(Clone)]
pub struct StorageProxy {
    inner: Arc<ProxyInner>,
}

struct ProxyInner {
    next_id: AtomicU64,
    pending: PendingStorage,
    post: OutboundPost,
}

impl StorageProxy {
    /// Creates a proxy posting requests through the given shim.
    #[must_use]
    pub fn new(post: OutboundPost) -> Self {
        Self {
            inner: Arc::new(ProxyInner {
                next_id: AtomicU64::new(0),
                pending: Mutex::new(HashMap::new()),
                post,
            }),
        }
    }

    /// Settles the pending request the response correlates with.
    ///
    /// The receiving half may already be gone (fire-and-forget
    /// operations discard it); that is not an error. An unknown id is.
    pub fn apply_response(&self, response: StorageResponse) -> Result<(), UnknownStorageRequest> {
        let id = response.id();
        let Some(tx) = self.inner.pending.lock().expect("pending lock").remove(&id) else {
            return Err(UnknownStorageRequest { id });
        };

        let outcome = match response {
            StorageResponse::Resolve { result, .. } => Ok(result),
            StorageResponse::Reject { error, .. } => Err(error),
        };
        let _ = tx.send(outcome);
        Ok(())
    }

    /// Number of requests awaiting a response.
    pub fn pending_len(&self) -> usize {
        self.inner.pending.lock().expect("pending lock").len()
    }

    fn send_request(
        &self,
        op: StorageOp,
        args: Vec<Value>,
    ) -> oneshot::Receiver<Result<Value, StorageFault>> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.inner
            .pending
            .lock()
            .expect("pending lock")
            .insert(id, tx);

        debug!(request_id = id, op = %op, "delegating storage operation");
        self.inner.post.post(&SandboxFrame::AsyncStorage { id, op, args });
        rx
    }

    async fn call(&self, op: StorageOp, args: Vec<Value>) -> Result<Value, StorageFault> {
        match self.send_request(op, args).await {
            Ok(outcome) => outcome,
            // The runtime dropped while we were suspended; nothing will
            // ever answer.
            Err(_) => Err(StorageFault::new(
                "ChannelError",
                "sandbox runtime stopped before the storage response arrived",
            )),
        }
    }

    // ── typed operation wrappers ─────────────────────────────────

    pub async fn get_item(&self, key: &str) -> Result<Option<String>, StorageFault> {
        decode_optional_string(self.call(StorageOp::GetItem, vec![Value::from(key)]).await?)
    }

    pub async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageFault> {
        self.call(StorageOp::SetItem, vec![Value::from(key), Value::from(value)])
            .await
            .map(|_| ())
    }

    pub async fn remove_item(&self, key: &str) -> Result<(), StorageFault> {
        self.call(StorageOp::RemoveItem, vec![Value::from(key)])
            .await
            .map(|_| ())
    }

    pub async fn merge_item(&self, key: &str, value: &str) -> Result<(), StorageFault> {
        self.call(StorageOp::MergeItem, vec![Value::from(key), Value::from(value)])
            .await
            .map(|_| ())
    }

    pub async fn clear(&self) -> Result<(), StorageFault> {
        self.call(StorageOp::Clear, vec![]).await.map(|_| ())
    }

    pub async fn get_all_keys(&self) -> Result<Vec<String>, StorageFault> {
        let value = self.call(StorageOp::GetAllKeys, vec![]).await?;
        serde_json::from_value(value)
            .map_err(|err| StorageFault::new("TypeError", format!("expected key list: {err}")))
    }

    /// Fire-and-forget: the request is posted, the eventual response
    /// settles a discarded handler.
    pub fn flush_get_requests(&self) {
        drop(self.send_request(StorageOp::FlushGetRequests, vec![]));
    }

    pub async fn multi_get(
        &self,
        keys: &[String],
    ) -> Result<Vec<(String, Option<String>)>, StorageFault> {
        let args = vec![serde_json::to_value(keys).expect("string list is JSON-safe")];
        let value = self.call(StorageOp::MultiGet, args).await?;
        serde_json::from_value(value)
            .map_err(|err| StorageFault::new("TypeError", format!("expected pair list: {err}")))
    }

    pub async fn multi_set(&self, pairs: &[(String, String)]) -> Result<(), StorageFault> {
        let args = vec![serde_json::to_value(pairs).expect("pair list is JSON-safe")];
        self.call(StorageOp::MultiSet, args).await.map(|_| ())
    }

    pub async fn multi_remove(&self, keys: &[String]) -> Result<(), StorageFault> {
        let args = vec![serde_json::to_value(keys).expect("string list is JSON-safe")];
        self.call(StorageOp::MultiRemove, args).await.map(|_| ())
    }

    pub async fn multi_merge(&self, pairs: &[(String, String)]) -> Result<(), StorageFault> {
        let args = vec![serde_json::to_value(pairs).expect("pair list is JSON-safe")];
        self.call(StorageOp::MultiMerge, args).await.map(|_| ())
    }
}

fn decode_optional_string(value: Value) -> Result<Option<String>, StorageFault> {
    match value {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        other => Err(StorageFault::new(
            "TypeError",
            format!("expected string or null, got {other}"),
        )),
    }
}
