//! The host-side bridge object.
//!
//! Owns the call id counter, the pending-call table and the readiness
//! gate. Calls issued before the sandbox reports loaded are queued and
//! released in issue order (ascending id) the moment readiness fires;
//! readiness fires at most once.

use crate::error::BridgeError;
use crate::storage_dispatch::dispatch_storage;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use vaultbridge_storage::KeyValueStore;
use vaultbridge_types::{
    CallFault, CallId, CallMessage, SandboxFrame, SerializedError, StorageOp, StorageRequestId,
    StorageResponse,
};

/// Diagnostics the bridge surfaces outside any call: unsolicited sandbox
/// faults and protocol defects. Neither settles a pending call.
#[derive(Debug, Clone)]
pub enum BridgeFault {
    /// An error escaped all call handling in the sandbox.
    Unsolicited(SerializedError),
    /// A response named a call id with no pending handler: a double
    /// response or an id the bridge never issued.
    UnknownCallId(CallId),
}

/// Observer for [`BridgeFault`]s. Optional; the default is log-only.
pub type FaultHook = Arc<dyn Fn(BridgeFault) + Send + Sync>;

/// Configuration for a bridge instance.
#[derive(Default)]
pub struct BridgeConfig {
    /// Called for every surfaced fault, in addition to the log line.
    pub fault_hook: Option<FaultHook>,
}

impl fmt::Debug for BridgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BridgeConfig")
            .field("fault_hook", &self.fault_hook.is_some())
            .finish()
    }
}

/// Calls queued behind the readiness gate, plus the id counter. One lock
/// for both so release order is exactly issue order.
struct SendState {
    next_id: CallId,
    ready: bool,
    queued: Vec<String>,
}

struct BridgeInner {
    state: Mutex<SendState>,
    pending: Mutex<HashMap<CallId, oneshot::Sender<Result<Value, BridgeError>>>>,
    outbound: mpsc::UnboundedSender<String>,
    storage: Arc<dyn KeyValueStore>,
    fault_hook: Option<FaultHook>,
}

/// The host side of the bridge. Cheap to clone; clones share all state.
#[derive(Clone)]
pub struct Bridge {
    inner: Arc<BridgeInner>,
}

impl Bridge {
    /// Creates a bridge with the default configuration. Returns the
    /// bridge and the receiver carrying host → sandbox frames, which the
    /// owner forwards into the sandbox transport.
    pub fn new(storage: Arc<dyn KeyValueStore>) -> (Self, mpsc::UnboundedReceiver<String>) {
        Self::with_config(storage, BridgeConfig::default())
    }

    /// Creates a bridge with an explicit configuration.
    pub fn with_config(
        storage: Arc<dyn KeyValueStore>,
        config: BridgeConfig,
    ) -> (Self, mpsc::UnboundedReceiver<String>) {
        let (outbound, rx) = mpsc::unbounded_channel();
        let bridge = Self {
            inner: Arc::new(BridgeInner {
                state: Mutex::new(SendState {
                    next_id: 0,
                    ready: false,
                    queued: Vec::new(),
                }),
                pending: Mutex::new(HashMap::new()),
                outbound,
                storage,
                fault_hook: config.fault_hook,
            }),
        };
        (bridge, rx)
    }

    /// Invokes a named sandbox function and settles with its result.
    ///
    /// The id is allocated and the frame queued (or sent, once ready)
    /// eagerly, before the returned future is first polled. There is no
    /// built-in timeout: if readiness never fires, the future never
    /// settles, and a caller that gives up externally leaves its pending
    /// handler in place.
    pub fn call_function(
        &self,
        name: &str,
        args: Vec<Value>,
    ) -> impl Future<Output = Result<Value, BridgeError>> + Send + 'static {
        let (tx, rx) = oneshot::channel();

        {
            let mut state = self.inner.state.lock().expect("send state lock");
            let id = state.next_id;
            state.next_id += 1;

            self.inner
                .pending
                .lock()
                .expect("pending lock")
                .insert(id, tx);

            let frame = serde_json::to_string(&CallMessage::new(id, name, args))
                .expect("call frame is JSON-safe");
            debug!(call_id = id, function = name, queued = !state.ready, "issuing call");

            if state.ready {
                let _ = self.inner.outbound.send(frame);
            } else {
                state.queued.push(frame);
            }
        }

        async move {
            match rx.await {
                Ok(outcome) => outcome,
                Err(_) => Err(BridgeError::ChannelClosed),
            }
        }
    }

    /// Releases the readiness gate, flushing queued calls in issue
    /// order. Fires at most once; later signals are ignored.
    pub fn mark_ready(&self) {
        let mut state = self.inner.state.lock().expect("send state lock");
        if state.ready {
            debug!("readiness already signalled, ignoring");
            return;
        }
        state.ready = true;

        let queued = std::mem::take(&mut state.queued);
        info!(flushed = queued.len(), "sandbox ready, releasing queued calls");
        // Flushed under the lock so a concurrent call cannot jump the queue.
        for frame in queued {
            let _ = self.inner.outbound.send(frame);
        }
    }

    /// Number of calls awaiting a response.
    pub fn pending_len(&self) -> usize {
        self.inner.pending.lock().expect("pending lock").len()
    }

    /// Parses one raw sandbox frame and dispatches it.
    pub fn handle_message(&self, raw: &str) {
        match serde_json::from_str::<SandboxFrame>(raw) {
            Ok(SandboxFrame::Resolve { id, result }) => self.settle(id, Ok(result)),
            Ok(SandboxFrame::Reject { id, error }) => {
                self.settle(id, Err(BridgeError::Call(CallFault::from(error))));
            }
            Ok(SandboxFrame::Error { error }) => {
                error!(fault = %error, "unsolicited sandbox fault");
                self.raise(BridgeFault::Unsolicited(error));
            }
            Ok(SandboxFrame::AsyncStorage { id, op, args }) => self.fulfil_storage(id, op, args),
            Err(_) => {
                // Not a frame we know. An unrecognized `type` is a
                // warning with no other effect; so is outright garbage.
                let kind = serde_json::from_str::<Value>(raw)
                    .ok()
                    .and_then(|v| v.get("type")?.as_str().map(str::to_string));
                match kind {
                    Some(kind) => warn!(message_type = %kind, "unknown message type"),
                    None => warn!(frame = raw, "unparseable frame from sandbox"),
                }
            }
        }
    }

    /// Settles the pending call for `id`, exactly once. A response for
    /// an id with no handler signals a defect: it is logged and surfaced
    /// but never alters an already-settled call.
    fn settle(&self, id: CallId, outcome: Result<Value, BridgeError>) {
        let handler = self.inner.pending.lock().expect("pending lock").remove(&id);
        match handler {
            Some(tx) => {
                if tx.send(outcome).is_err() {
                    debug!(call_id = id, "caller dropped before settlement");
                }
            }
            None => {
                error!(call_id = id, "response for unknown call id");
                self.raise(BridgeFault::UnknownCallId(id));
            }
        }
    }

    /// Fulfils a delegated storage operation and answers the sandbox
    /// with a response carrying the original request id. Storage faults
    /// travel reduced, name and message only.
    fn fulfil_storage(&self, id: StorageRequestId, op: StorageOp, args: Vec<Value>) {
        let storage = Arc::clone(&self.inner.storage);
        let outbound = self.inner.outbound.clone();

        tokio::spawn(async move {
            let response = match dispatch_storage(storage.as_ref(), op, &args).await {
                Ok(result) => StorageResponse::Resolve { id, result },
                Err(error) => {
                    debug!(request_id = id, op = %op, fault = %error, "storage operation rejected");
                    StorageResponse::Reject { id, error }
                }
            };

            let frame =
                serde_json::to_string(&response).expect("storage response is JSON-safe");
            // Not gated on readiness: a sandbox that sent a request is
            // necessarily past its load signal.
            let _ = outbound.send(frame);
        });
    }

    fn raise(&self, fault: BridgeFault) {
        if let Some(hook) = &self.inner.fault_hook {
            hook(fault);
        }
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock().expect("send state lock");
        f.debug_struct("Bridge")
            .field("next_id", &state.next_id)
            .field("ready", &state.ready)
            .field("queued", &state.queued.len())
            .field("pending", &self.pending_len())
            .finish()
    }
}
