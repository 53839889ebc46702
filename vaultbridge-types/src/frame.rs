//! Frame shapes for both directions of the bridge.
//!
//! The wire format is fixed: every frame is a JSON text blob. Frames sent
//! by the sandbox carry a `type` discriminator; frames sent by the host
//! are either a call (`{id, name, args}`, no discriminator) or a storage
//! response (`{type, id, ...}`), so the host direction is distinguished
//! structurally rather than by tag.

use crate::error::{SerializedError, StorageFault};
use crate::storage::StorageOp;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier for a host-issued call.
///
/// Allocated by the host, monotonically increasing from 0, unique for the
/// lifetime of one bridge instance.
pub type CallId = u64;

/// Identifier for a sandbox-issued storage request.
///
/// A separate id space from [`CallId`], owned by the sandbox side.
pub type StorageRequestId = u64;

/// A host-initiated invocation of a named sandbox function.
///
/// `name` is a dotted path (e.g. `"Vault.sync"`) looked up in the
/// sandbox's handler registry at dispatch time, not at send time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallMessage {
    pub id: CallId,
    pub name: String,
    pub args: Vec<Value>,
}

impl CallMessage {
    /// Creates a new call message.
    #[must_use]
    pub fn new(id: CallId, name: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            id,
            name: name.into(),
            args,
        }
    }
}

/// The host's reply to a delegated storage operation, correlated by the
/// request's id. Storage errors are reduced to `{name, message}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageResponse {
    /// The operation succeeded.
    Resolve {
        id: StorageRequestId,
        result: Value,
    },

    /// The operation failed.
    Reject {
        id: StorageRequestId,
        error: StorageFault,
    },
}

impl StorageResponse {
    /// The id of the storage request this response answers.
    pub fn id(&self) -> StorageRequestId {
        match self {
            Self::Resolve { id, .. } | Self::Reject { id, .. } => *id,
        }
    }
}

/// Frames travelling host → sandbox.
///
/// Variant order matters: a storage response is recognized by its `type`
/// field, a call by its `name`/`args` fields; neither shape parses as the
/// other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HostFrame {
    Storage(StorageResponse),
    Call(CallMessage),
}

/// Frames travelling sandbox → host, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SandboxFrame {
    /// Terminal success for a call.
    Resolve { id: CallId, result: Value },

    /// Terminal failure for a call, carrying the full serialized fault.
    Reject { id: CallId, error: SerializedError },

    /// An error that escaped all call handling. Correlates with nothing;
    /// the host logs it and settles no pending call.
    Error { error: SerializedError },

    /// A storage operation delegated to the host's key/value store.
    AsyncStorage {
        id: StorageRequestId,
        #[serde(rename = "fn")]
        op: StorageOp,
        args: Vec<Value>,
    },
}

impl SandboxFrame {
    /// Builds a `resolve` response for a call.
    #[must_use]
    pub fn resolve(id: CallId, result: Value) -> Self {
        Self::Resolve { id, result }
    }

    /// Builds a `reject` response for a call.
    #[must_use]
    pub fn reject(id: CallId, error: SerializedError) -> Self {
        Self::Reject { id, error }
    }

    /// Builds an unsolicited error frame.
    #[must_use]
    pub fn unsolicited(error: SerializedError) -> Self {
        Self::Error { error }
    }
}
