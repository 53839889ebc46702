//! The explicit table of callable sandbox functions.
//!
//! Call targets are registered under their full dotted path (e.g.
//! `"Vault.unlock"`). Lookup happens when a call is dispatched, not when
//! it is sent, so a handler registered after a call was issued but before
//! it is dispatched still resolves.

use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use vaultbridge_types::CallFault;

/// The boxed future a handler returns.
pub type HandlerFuture = Pin<Box<dyn Future<Output = Result<Value, CallFault>> + Send>>;

/// A registered sandbox function: positional JSON args in, JSON value or
/// structured fault out. Synchronous and asynchronous handlers are both
/// expressed this way; the dispatcher treats them identically.
pub type Handler = Arc<dyn Fn(Vec<Value>) -> HandlerFuture + Send + Sync>;

/// Maps dotted-path names to handlers.
#[derive(Default)]
pub struct Registry {
    handlers: HashMap<String, Handler>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under a dotted-path name. A later registration
    /// under the same name replaces the earlier one.
    pub fn register<F, Fut>(&mut self, name: impl Into<String>, handler: F)
    where
        F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, CallFault>> + Send + 'static,
    {
        self.handlers.insert(
            name.into(),
            Arc::new(move |args| Box::pin(handler(args)) as HandlerFuture),
        );
    }

    /// Looks up a handler by its dotted-path name.
    pub fn lookup(&self, name: &str) -> Option<Handler> {
        self.handlers.get(name).cloned()
    }

    /// Whether a handler is registered under the given name.
    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Registry").field("names", &names).finish()
    }
}
