//! Error types for the host side of the bridge.

use thiserror::Error;
use vaultbridge_types::CallFault;

/// Errors surfaced to a caller awaiting a sandbox call.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The named sandbox function threw or rejected; the fault is
    /// reconstructed from its serialized form.
    #[error("sandbox call failed: {0}")]
    Call(CallFault),

    /// The sandbox went away before the call settled.
    #[error("sandbox channel closed before the call settled")]
    ChannelClosed,
}

impl BridgeError {
    /// The reconstructed fault, when this is a call-level rejection.
    pub fn fault(&self) -> Option<&CallFault> {
        match self {
            Self::Call(fault) => Some(fault),
            Self::ChannelClosed => None,
        }
    }
}
