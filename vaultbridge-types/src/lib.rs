//! Wire protocol types for the vaultbridge cross-realm bridge.
//!
//! The host and the sandbox are separate execution realms that share no
//! memory and communicate exclusively through JSON text frames, one FIFO
//! channel per direction. This crate defines those frames:
//! - host → sandbox: a [`CallMessage`] naming a sandboxed function, or a
//!   [`StorageResponse`] answering a delegated storage operation
//! - sandbox → host: [`SandboxFrame`], tagged by `type`: call
//!   resolution/rejection, an unsolicited realm fault, or a storage
//!   request
//!
//! It also defines the JSON-safe error representations that cross the
//! boundary ([`SerializedError`], [`StorageFault`]) and the closed set of
//! storage operations the sandbox may delegate ([`StorageOp`]).
//!
//! Everything realm-specific (handler registries, pending-call tables,
//! the readiness gate) lives in `vaultbridge-sandbox` and
//! `vaultbridge-host`; this crate stays a leaf.

mod error;
mod frame;
mod storage;

pub use error::{CallFault, SerializedError, StorageFault};
pub use frame::{CallId, CallMessage, HostFrame, SandboxFrame, StorageRequestId, StorageResponse};
pub use storage::StorageOp;

/// Result type alias using the crate's error type.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors that can occur while encoding or decoding frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    MalformedFrame(#[from] serde_json::Error),

    #[error("unknown storage operation: {0}")]
    UnknownStorageOp(String),
}
