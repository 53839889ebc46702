//! The host-facing vault client.

use crate::state::VaultState;
use serde_json::{Value, json};
use std::sync::{Mutex, RwLock};
use thiserror::Error;
use tracing::{debug, info};
use vaultbridge_host::{Bridge, BridgeError};

/// Operation names the sandboxed engine exposes.
mod ops {
    pub const BOOT: &str = "Vault.boot";
    pub const INIT: &str = "Vault.init";
    pub const LOCK: &str = "Vault.lock";
    pub const SIGNUP: &str = "Vault.signup";
    pub const LOGIN: &str = "Vault.login";
    pub const UNLOCK: &str = "Vault.unlock";
    pub const CONNECT: &str = "Vault.connect";
    pub const SYNC: &str = "Vault.sync";
    pub const SET_PAYMENT_INFORMATION: &str = "Vault.setPaymentInformation";
    pub const ACCOUNTS_FOR_HOSTNAME: &str = "Vault.accountsForHostname";
    pub const CREATE_ACCOUNT: &str = "Vault.createAccount";
    pub const DELETE_ACCOUNT: &str = "Vault.deleteAccount";
    pub const UPDATE_ACCOUNT: &str = "Vault.updateAccount";
    pub const CREATE_INBOX_ENTRY: &str = "Vault.createInboxEntry";
    pub const DELETE_INBOX_ENTRY: &str = "Vault.deleteInboxEntry";
    pub const CLEAR_STORED_DATA: &str = "Vault.clearStoredData";
    pub const DELETE_USER: &str = "Vault.deleteUser";
    pub const RANDOM_ACCOUNT_PASSWORD: &str = "Vault.randomAccountPassword";
    pub const RANDOM_HANDLE: &str = "Vault.randomHandle";
    pub const RANDOM_MASTER_PASSWORD: &str = "Vault.randomMasterPassword";
    pub const RANDOM_SECRET_KEY: &str = "Vault.randomSecretKey";
}

/// Errors surfaced by vault operations.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The underlying bridge call failed.
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// The engine answered with a state blob the client cannot parse.
    #[error("malformed vault state: {0}")]
    State(#[from] serde_json::Error),

    /// The engine answered with a value of an unexpected shape.
    #[error("unexpected engine response: {0}")]
    UnexpectedResponse(Value),
}

/// Configuration passed to the engine at boot.
#[derive(Debug, Clone, Default)]
pub struct VaultClientConfig {
    /// Server the engine syncs against; the engine's default if `None`.
    pub api_host: Option<String>,
    /// Re-attach token from a previous session, if any.
    pub sync_token: Option<String>,
}

/// Callback invoked after every state replacement.
pub type UpdateListener = Box<dyn Fn() + Send + Sync>;

/// Typed operations over the sandboxed vault engine.
///
/// Construction boots and initializes the engine, so a constructed client
/// is always past the engine's readiness; no operation can observe a
/// half-booted engine.
pub struct VaultClient {
    bridge: Bridge,
    state: RwLock<VaultState>,
    listeners: Mutex<Vec<UpdateListener>>,
}

impl VaultClient {
    /// Boots the engine and loads the initial state.
    pub async fn start(bridge: Bridge, config: VaultClientConfig) -> Result<Self, ClientError> {
        bridge
            .call_function(ops::BOOT, vec![option_arg(config.api_host.as_deref())])
            .await?;

        let initial = bridge
            .call_function(ops::INIT, vec![option_arg(config.sync_token.as_deref())])
            .await?;
        let state: VaultState = serde_json::from_value(initial)?;
        info!(kind = state.kind(), "vault engine initialized");

        Ok(Self {
            bridge,
            state: RwLock::new(state),
            listeners: Mutex::new(Vec::new()),
        })
    }

    /// Registers a listener invoked after every state replacement.
    pub fn on_update(&self, listener: impl Fn() + Send + Sync + 'static) {
        self.listeners
            .lock()
            .expect("listeners lock")
            .push(Box::new(listener));
    }

    // ── state getters ────────────────────────────────────────────

    /// A snapshot of the engine's current state.
    pub fn current_state(&self) -> VaultState {
        self.state.read().expect("state lock").clone()
    }

    pub fn handle(&self) -> Option<String> {
        self.state.read().expect("state lock").handle().map(String::from)
    }

    pub fn secret_key(&self) -> Option<String> {
        self.state.read().expect("state lock").secret_key().map(String::from)
    }

    pub fn sync_token(&self) -> Option<String> {
        self.state.read().expect("state lock").sync_token().map(String::from)
    }

    pub fn has_account(&self) -> bool {
        self.state.read().expect("state lock").has_account()
    }

    pub fn locked(&self) -> bool {
        self.state.read().expect("state lock").locked()
    }

    pub fn parsed_entries(&self) -> Option<Value> {
        self.state.read().expect("state lock").parsed_entries().cloned()
    }

    // ── generators (stateless engine calls) ──────────────────────

    pub async fn random_account_password(&self) -> Result<String, ClientError> {
        self.call_string(ops::RANDOM_ACCOUNT_PASSWORD).await
    }

    pub async fn random_handle(&self) -> Result<String, ClientError> {
        self.call_string(ops::RANDOM_HANDLE).await
    }

    pub async fn random_master_password(&self) -> Result<String, ClientError> {
        self.call_string(ops::RANDOM_MASTER_PASSWORD).await
    }

    pub async fn random_secret_key(&self) -> Result<String, ClientError> {
        self.call_string(ops::RANDOM_SECRET_KEY).await
    }

    // ── state-replacing operations ───────────────────────────────

    pub async fn lock(&self) -> Result<VaultState, ClientError> {
        self.transition(ops::LOCK, vec![]).await
    }

    /// Re-initializes the engine, optionally onto a different account.
    pub async fn reset(&self, sync_token: Option<&str>) -> Result<VaultState, ClientError> {
        self.transition(ops::INIT, vec![option_arg(sync_token)]).await
    }

    pub async fn signup(
        &self,
        handle: &str,
        secret_key: &str,
        master_password: &str,
    ) -> Result<VaultState, ClientError> {
        self.transition(
            ops::SIGNUP,
            vec![json!(handle), json!(secret_key), json!(master_password)],
        )
        .await
    }

    pub async fn login(
        &self,
        handle: &str,
        secret_key: &str,
        master_password: &str,
    ) -> Result<VaultState, ClientError> {
        self.transition(
            ops::LOGIN,
            vec![json!(handle), json!(secret_key), json!(master_password)],
        )
        .await
    }

    pub async fn unlock(&self, master_password: &str) -> Result<VaultState, ClientError> {
        self.transition(ops::UNLOCK, vec![json!(master_password)]).await
    }

    pub async fn connect(&self) -> Result<VaultState, ClientError> {
        self.transition(ops::CONNECT, vec![]).await
    }

    pub async fn sync(&self) -> Result<VaultState, ClientError> {
        self.transition(ops::SYNC, vec![]).await
    }

    pub async fn set_payment_information(
        &self,
        payment_information: Value,
    ) -> Result<VaultState, ClientError> {
        self.transition(ops::SET_PAYMENT_INFORMATION, vec![payment_information])
            .await
    }

    pub async fn create_account(&self, id: &str, data: Value) -> Result<VaultState, ClientError> {
        self.transition(ops::CREATE_ACCOUNT, vec![json!(id), data]).await
    }

    pub async fn delete_account(&self, id: &str) -> Result<VaultState, ClientError> {
        self.transition(ops::DELETE_ACCOUNT, vec![json!(id)]).await
    }

    pub async fn update_account(&self, id: &str, data: Value) -> Result<VaultState, ClientError> {
        self.transition(ops::UPDATE_ACCOUNT, vec![json!(id), data]).await
    }

    pub async fn create_inbox_entry(&self, id: &str, data: Value) -> Result<VaultState, ClientError> {
        self.transition(ops::CREATE_INBOX_ENTRY, vec![json!(id), data]).await
    }

    pub async fn delete_inbox_entry(&self, id: &str) -> Result<VaultState, ClientError> {
        self.transition(ops::DELETE_INBOX_ENTRY, vec![json!(id)]).await
    }

    pub async fn clear_stored_data(&self) -> Result<VaultState, ClientError> {
        self.transition(ops::CLEAR_STORED_DATA, vec![]).await
    }

    pub async fn delete_user(&self) -> Result<VaultState, ClientError> {
        self.transition(ops::DELETE_USER, vec![]).await
    }

    // ── queries ──────────────────────────────────────────────────

    /// Accounts matching a hostname; does not touch the cached state.
    pub async fn accounts_for_hostname(&self, hostname: &str) -> Result<Value, ClientError> {
        Ok(self
            .bridge
            .call_function(ops::ACCOUNTS_FOR_HOSTNAME, vec![json!(hostname)])
            .await?)
    }

    // ── internals ────────────────────────────────────────────────

    /// Runs an operation that answers with a fresh state blob, replaces
    /// the cached state and notifies listeners.
    async fn transition(&self, name: &str, args: Vec<Value>) -> Result<VaultState, ClientError> {
        let value = self.bridge.call_function(name, args).await?;
        let state: VaultState = serde_json::from_value(value)?;
        debug!(operation = name, kind = state.kind(), "vault state replaced");

        *self.state.write().expect("state lock") = state.clone();
        self.notify();
        Ok(state)
    }

    async fn call_string(&self, name: &str) -> Result<String, ClientError> {
        match self.bridge.call_function(name, vec![]).await? {
            Value::String(s) => Ok(s),
            other => Err(ClientError::UnexpectedResponse(other)),
        }
    }

    fn notify(&self) {
        for listener in self.listeners.lock().expect("listeners lock").iter() {
            listener();
        }
    }
}

fn option_arg(value: Option<&str>) -> Value {
    value.map_or(Value::Null, Value::from)
}
