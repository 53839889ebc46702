//! Sandbox-realm runtime for vaultbridge.
//!
//! This crate is one half of the bridge: the isolated realm that executes
//! named functions on behalf of the host. It owns:
//!
//! - **Registry**: the explicit table of dotted-path handler names.
//!   Call targets are looked up here at dispatch time; an unknown name
//!   rejects with a reference failure instead of evaluating anything.
//! - **Runtime**: the actor consuming host frames and producing sandbox
//!   frames. Each call runs on its own task, never synchronously inside
//!   the message loop.
//! - **Storage proxy**: the sandbox-local facade over the host's
//!   key/value store, correlating requests and responses by id.
//! - **Bundle**: base64 packaging of the injectable script; decoded
//!   before any message traffic.
//!
//! The realm communicates with the host exclusively through JSON text
//! frames over one channel per direction; `vaultbridge-host` holds the
//! other ends.

pub mod bundle;
pub mod registry;
pub mod runtime;
pub mod storage_proxy;

mod post;

pub use bundle::{BundleError, ScriptBundle};
pub use post::OutboundPost;
pub use registry::{Handler, Registry};
pub use runtime::{FaultReporter, SandboxContext, SandboxHandle, SandboxRuntime};
pub use storage_proxy::{StorageProxy, UnknownStorageRequest};
