//! The sandbox actor: consumes host frames, produces sandbox frames.
//!
//! One runtime instance is one isolated realm. It is the exclusive
//! consumer of host → sandbox frames and the exclusive producer of
//! sandbox → host frames; everything else in this crate hangs off it.
//!
//! Startup sequencing: the script bundle is decoded and the business
//! registry installed before the message loop starts, and the loaded
//! signal fires only after both, so no call can ever observe a
//! half-initialized realm.

use crate::bundle::ScriptBundle;
use crate::post::OutboundPost;
use crate::registry::{Handler, Registry};
use crate::storage_proxy::StorageProxy;
use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use vaultbridge_types::{CallFault, CallMessage, HostFrame, SandboxFrame};

/// Everything the business bundle gets to see when it installs itself.
pub struct SandboxContext {
    storage: StorageProxy,
    faults: FaultReporter,
    source: String,
}

impl SandboxContext {
    /// The storage facade, for handlers that persist state via the host.
    pub fn storage(&self) -> StorageProxy {
        self.storage.clone()
    }

    /// The fault reporter, for errors that escape call handling.
    pub fn faults(&self) -> FaultReporter {
        self.faults.clone()
    }

    /// The decoded bundle source.
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Reports errors that are not tied to any pending call, the realm-wide
/// analog of an uncaught-exception handler. Each report becomes an
/// unsolicited error frame; it never settles a call.
#[derive(Clone)]
pub struct FaultReporter {
    post: OutboundPost,
}

impl FaultReporter {
    /// Emits an unsolicited error frame for a fault that escaped all
    /// call handling.
    pub fn report(&self, fault: CallFault) {
        warn!(name = %fault.name, message = %fault.message, "uncaught sandbox fault");
        self.post.post(&SandboxFrame::unsolicited(fault.into()));
    }
}

/// The channel ends the embedder wires to the host side.
pub struct SandboxHandle {
    /// Host → sandbox frames.
    pub frames_in: mpsc::UnboundedSender<String>,
    /// Sandbox → host frames.
    pub frames_out: mpsc::UnboundedReceiver<String>,
    /// Fires once the bundle is decoded and the registry installed.
    pub loaded: oneshot::Receiver<()>,
}

/// A sandbox realm ready to be spawned.
pub struct SandboxRuntime {
    bundle: ScriptBundle,
    builder: Box<dyn FnOnce(&SandboxContext) -> Registry + Send>,
}

impl SandboxRuntime {
    /// Creates a runtime from a script bundle and the business-logic
    /// installer that populates the registry.
    #[must_use]
    pub fn new(
        bundle: ScriptBundle,
        builder: impl FnOnce(&SandboxContext) -> Registry + Send + 'static,
    ) -> Self {
        Self {
            bundle,
            builder: Box::new(builder),
        }
    }

    /// Spawns the realm as an independent task and returns the channel
    /// ends for wiring.
    pub fn spawn(self) -> SandboxHandle {
        let (in_tx, in_rx) = mpsc::unbounded_channel();
        let (out_tx, out_rx) = mpsc::unbounded_channel();
        let (loaded_tx, loaded_rx) = oneshot::channel();

        tokio::spawn(run(self.bundle, self.builder, in_rx, out_tx, loaded_tx));

        SandboxHandle {
            frames_in: in_tx,
            frames_out: out_rx,
            loaded: loaded_rx,
        }
    }
}

async fn run(
    bundle: ScriptBundle,
    builder: Box<dyn FnOnce(&SandboxContext) -> Registry + Send>,
    mut frames_in: mpsc::UnboundedReceiver<String>,
    frames_out: mpsc::UnboundedSender<String>,
    loaded_tx: oneshot::Sender<()>,
) {
    let post = OutboundPost::new(frames_out);

    // Decode-then-evaluate strictly precedes any message traffic.
    let source = match bundle.decode() {
        Ok(source) => source,
        Err(err) => {
            error!(%err, "script bundle failed to decode, sandbox will not start");
            post.post(&SandboxFrame::unsolicited(
                CallFault::new("EvalError", err.to_string()).into(),
            ));
            return;
        }
    };

    let storage = StorageProxy::new(post.clone());
    let faults = FaultReporter { post: post.clone() };
    let context = SandboxContext {
        storage: storage.clone(),
        faults,
        source,
    };
    let registry = Arc::new(builder(&context));

    info!(handlers = registry.len(), "sandbox runtime loaded");
    let _ = loaded_tx.send(());

    while let Some(raw) = frames_in.recv().await {
        handle_frame(&raw, &registry, &storage, &post);
    }

    debug!("inbound channel closed, sandbox runtime stopping");
}

fn handle_frame(raw: &str, registry: &Arc<Registry>, storage: &StorageProxy, post: &OutboundPost) {
    match serde_json::from_str::<HostFrame>(raw) {
        Ok(HostFrame::Call(call)) => dispatch_call(call, Arc::clone(registry), post.clone()),
        Ok(HostFrame::Storage(response)) => {
            if let Err(err) = storage.apply_response(response) {
                // A lookup miss here escaped call handling in the source
                // realm too; it surfaces as an unsolicited fault.
                post.post(&SandboxFrame::unsolicited(
                    CallFault::new("TypeError", err.to_string()).into(),
                ));
            }
        }
        Err(err) => {
            post.post(&SandboxFrame::unsolicited(
                CallFault::new("SyntaxError", err.to_string()).into(),
            ));
        }
    }
}

/// Runs one call on its own task. The handler is never invoked
/// synchronously within the message-loop frame; a panic inside it,
/// before or after its first await, is captured and rejected like any
/// other fault.
fn dispatch_call(call: CallMessage, registry: Arc<Registry>, post: OutboundPost) {
    tokio::spawn(async move {
        let CallMessage { id, name, args } = call;

        let outcome = match registry.lookup(&name) {
            Some(handler) => invoke(handler, args).await,
            None => Err(CallFault::reference_error(&name)),
        };

        match outcome {
            Ok(result) => post.post(&SandboxFrame::resolve(id, result)),
            Err(fault) => {
                debug!(call_id = id, function = %name, fault = %fault, "call rejected");
                post.post(&SandboxFrame::reject(id, fault.into()));
            }
        }
    });
}

async fn invoke(handler: Handler, args: Vec<Value>) -> Result<Value, CallFault> {
    // Creating the future can already panic for a handler that throws
    // before its first suspension point; both phases are captured.
    let future = match std::panic::catch_unwind(AssertUnwindSafe(|| handler(args))) {
        Ok(future) => future,
        Err(panic) => return Err(CallFault::new("Error", panic_message(panic.as_ref()))),
    };

    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(panic) => Err(CallFault::new("Error", panic_message(panic.as_ref()))),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "handler panicked".to_string()
    }
}
