//! The closed set of storage operations the sandbox may delegate.

use crate::ProtocolError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A storage operation name as it appears in the `fn` field of a storage
/// request. The set is fixed; an unknown name fails at parse time rather
/// than reaching the host's store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StorageOp {
    GetItem,
    SetItem,
    RemoveItem,
    MergeItem,
    Clear,
    GetAllKeys,
    FlushGetRequests,
    MultiGet,
    MultiSet,
    MultiRemove,
    MultiMerge,
}

impl StorageOp {
    /// All operations, in wire-name order.
    pub const ALL: [StorageOp; 11] = [
        StorageOp::GetItem,
        StorageOp::SetItem,
        StorageOp::RemoveItem,
        StorageOp::MergeItem,
        StorageOp::Clear,
        StorageOp::GetAllKeys,
        StorageOp::FlushGetRequests,
        StorageOp::MultiGet,
        StorageOp::MultiSet,
        StorageOp::MultiRemove,
        StorageOp::MultiMerge,
    ];

    /// The camelCase wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageOp::GetItem => "getItem",
            StorageOp::SetItem => "setItem",
            StorageOp::RemoveItem => "removeItem",
            StorageOp::MergeItem => "mergeItem",
            StorageOp::Clear => "clear",
            StorageOp::GetAllKeys => "getAllKeys",
            StorageOp::FlushGetRequests => "flushGetRequests",
            StorageOp::MultiGet => "multiGet",
            StorageOp::MultiSet => "multiSet",
            StorageOp::MultiRemove => "multiRemove",
            StorageOp::MultiMerge => "multiMerge",
        }
    }
}

impl fmt::Display for StorageOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageOp {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| ProtocolError::UnknownStorageOp(s.to_string()))
    }
}
