//! The opaque vault state blob and its public getters.
//!
//! The sandboxed engine produces one of four state kinds; the wire shape
//! is a `kind`-tagged JSON object with camelCase fields. The client never
//! interprets `parsedEntries` (plugin territory all the way down), so
//! entries stay an opaque JSON value.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The engine's externally visible state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum VaultState {
    /// No account on this device.
    Empty,

    /// An account exists but the master password has not been entered.
    #[serde(rename_all = "camelCase")]
    Locked {
        handle: String,
        secret_key: String,
        sync_token: String,
    },

    /// Entries are decrypted locally; no server session yet.
    #[serde(rename_all = "camelCase")]
    Unlocked {
        handle: String,
        secret_key: String,
        sync_token: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parsed_entries: Option<Value>,
    },

    /// Unlocked with a live server session.
    #[serde(rename_all = "camelCase")]
    Connected {
        handle: String,
        secret_key: String,
        sync_token: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        parsed_entries: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        has_payment_information: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        subscription_status: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        trial_days_left: Option<u32>,
    },
}

impl VaultState {
    /// The wire tag of this state.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Empty => "empty",
            Self::Locked { .. } => "locked",
            Self::Unlocked { .. } => "unlocked",
            Self::Connected { .. } => "connected",
        }
    }

    /// The account handle, absent only before signup/login.
    pub fn handle(&self) -> Option<&str> {
        match self {
            Self::Empty => None,
            Self::Locked { handle, .. }
            | Self::Unlocked { handle, .. }
            | Self::Connected { handle, .. } => Some(handle),
        }
    }

    /// The account's secret key.
    pub fn secret_key(&self) -> Option<&str> {
        match self {
            Self::Empty => None,
            Self::Locked { secret_key, .. }
            | Self::Unlocked { secret_key, .. }
            | Self::Connected { secret_key, .. } => Some(secret_key),
        }
    }

    /// The token used to re-attach this device to the account.
    pub fn sync_token(&self) -> Option<&str> {
        match self {
            Self::Empty => None,
            Self::Locked { sync_token, .. }
            | Self::Unlocked { sync_token, .. }
            | Self::Connected { sync_token, .. } => Some(sync_token),
        }
    }

    /// Whether an account exists on this device.
    pub fn has_account(&self) -> bool {
        !matches!(self, Self::Empty)
    }

    /// Whether entries are currently inaccessible.
    pub fn locked(&self) -> bool {
        matches!(self, Self::Empty | Self::Locked { .. })
    }

    /// Decrypted entries, present only while unlocked or connected.
    pub fn parsed_entries(&self) -> Option<&Value> {
        match self {
            Self::Empty | Self::Locked { .. } => None,
            Self::Unlocked { parsed_entries, .. }
            | Self::Connected { parsed_entries, .. } => parsed_entries.as_ref(),
        }
    }
}

impl Default for VaultState {
    fn default() -> Self {
        Self::Empty
    }
}
