//! One-call assembly of a bridge and its sandbox.
//!
//! The session owns the sandbox lifecycle the way the source component
//! owned its webview: it spawns the runtime, pumps host frames into it,
//! feeds sandbox frames back into the bridge's demux, and releases the
//! readiness gate the moment the runtime reports loaded.

use crate::bridge::{Bridge, BridgeConfig};
use std::sync::Arc;
use tracing::debug;
use vaultbridge_sandbox::{SandboxHandle, SandboxRuntime};
use vaultbridge_storage::KeyValueStore;

/// A running bridge + sandbox pair.
///
/// Dropping the session does not tear the realms down; the pumps stop
/// once either side drops its channel.
pub struct BridgeSession {
    bridge: Bridge,
}

impl BridgeSession {
    /// Spawns the sandbox and wires both frame directions.
    pub fn launch(
        storage: Arc<dyn KeyValueStore>,
        config: BridgeConfig,
        runtime: SandboxRuntime,
    ) -> Self {
        let (bridge, mut host_frames) = Bridge::with_config(storage, config);
        let SandboxHandle {
            frames_in,
            mut frames_out,
            loaded,
        } = runtime.spawn();

        // host → sandbox
        tokio::spawn(async move {
            while let Some(frame) = host_frames.recv().await {
                if frames_in.send(frame).is_err() {
                    debug!("sandbox gone, stopping host pump");
                    break;
                }
            }
        });

        // sandbox → host
        let demux = bridge.clone();
        tokio::spawn(async move {
            while let Some(frame) = frames_out.recv().await {
                demux.handle_message(&frame);
            }
            debug!("sandbox outbound closed, stopping demux pump");
        });

        // The load signal is the readiness trigger; it fires at most once.
        let gate = bridge.clone();
        tokio::spawn(async move {
            if loaded.await.is_ok() {
                gate.mark_ready();
            }
        });

        Self { bridge }
    }

    /// The bridge, for issuing calls and inspecting state.
    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }
}
