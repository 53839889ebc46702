//! Host-realm bridge for vaultbridge.
//!
//! The [`Bridge`] is the host-side half of the cross-realm pair: it
//! allocates call ids, tracks pending calls, gates outbound traffic on
//! the sandbox's one-shot readiness signal, and demultiplexes inbound
//! frames to the pending call they answer, or to the storage fulfilment
//! path when the sandbox delegates a key/value operation.
//!
//! [`BridgeSession`] is the assembly most embedders want: it owns the
//! sandbox lifecycle, pumps the two frame channels, and wires the
//! runtime's loaded signal to the readiness gate. Embedders with their
//! own transport (a webview, a worker process) use [`Bridge`] directly
//! and forward raw frames themselves.

mod bridge;
mod error;
mod session;
mod storage_dispatch;

pub use bridge::{Bridge, BridgeConfig, BridgeFault, FaultHook};
pub use error::BridgeError;
pub use session::BridgeSession;
pub use storage_dispatch::dispatch_storage;
