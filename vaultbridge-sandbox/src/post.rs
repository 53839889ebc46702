//! Outbound transport shim for the sandbox realm.

use tokio::sync::mpsc;
use tracing::{error, warn};
use vaultbridge_types::SandboxFrame;

/// JSON-encodes sandbox frames and hands them to the outbound channel.
///
/// The sender is bound before the runtime starts, so there is no window
/// in which the transport is half-installed; a send only fails once the
/// host has dropped its receiver, at which point frames are dropped with
/// a warning.
#[derive(Debug, Clone)]
pub struct OutboundPost {
    tx: mpsc::UnboundedSender<String>,
}

impl OutboundPost {
    /// Wraps an outbound frame channel.
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<String>) -> Self {
        Self { tx }
    }

    /// Serializes and sends one frame.
    pub fn post(&self, frame: &SandboxFrame) {
        let text = match serde_json::to_string(frame) {
            Ok(text) => text,
            Err(err) => {
                error!(%err, "failed to encode sandbox frame");
                return;
            }
        };

        if self.tx.send(text).is_err() {
            warn!("host side closed, dropping sandbox frame");
        }
    }
}
