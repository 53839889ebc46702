//! Decodes delegated storage requests into typed store calls.
//!
//! The sandbox sends positional JSON args; this module is the single
//! place that knows which positions each operation expects and how its
//! result is encoded back onto the wire.

use serde_json::Value;
use vaultbridge_storage::{KeyValueStore, StoreError};
use vaultbridge_types::{StorageFault, StorageOp};

/// Invokes `op` on the store with the request's positional args and
/// encodes the result as a JSON value. All failures, malformed args and
/// failing backends alike, come back as the reduced `{name, message}` fault.
pub async fn dispatch_storage(
    store: &dyn KeyValueStore,
    op: StorageOp,
    args: &[Value],
) -> Result<Value, StorageFault> {
    match op {
        StorageOp::GetItem => {
            let key = arg_str(args, 0)?;
            let value = store.get_item(key).await.map_err(reduce)?;
            Ok(value.map_or(Value::Null, Value::String))
        }
        StorageOp::SetItem => {
            let key = arg_str(args, 0)?;
            let value = arg_str(args, 1)?;
            store.set_item(key, value).await.map_err(reduce)?;
            Ok(Value::Null)
        }
        StorageOp::RemoveItem => {
            let key = arg_str(args, 0)?;
            store.remove_item(key).await.map_err(reduce)?;
            Ok(Value::Null)
        }
        StorageOp::MergeItem => {
            let key = arg_str(args, 0)?;
            let value = arg_str(args, 1)?;
            store.merge_item(key, value).await.map_err(reduce)?;
            Ok(Value::Null)
        }
        StorageOp::Clear => {
            store.clear().await.map_err(reduce)?;
            Ok(Value::Null)
        }
        StorageOp::GetAllKeys => {
            let keys = store.get_all_keys().await.map_err(reduce)?;
            Ok(serde_json::to_value(keys).expect("key list is JSON-safe"))
        }
        StorageOp::FlushGetRequests => {
            store.flush_get_requests().await.map_err(reduce)?;
            Ok(Value::Null)
        }
        StorageOp::MultiGet => {
            let keys = arg_string_list(args, 0)?;
            let pairs = store.multi_get(&keys).await.map_err(reduce)?;
            Ok(serde_json::to_value(pairs).expect("pair list is JSON-safe"))
        }
        StorageOp::MultiSet => {
            let pairs = arg_pair_list(args, 0)?;
            store.multi_set(&pairs).await.map_err(reduce)?;
            Ok(Value::Null)
        }
        StorageOp::MultiRemove => {
            let keys = arg_string_list(args, 0)?;
            store.multi_remove(&keys).await.map_err(reduce)?;
            Ok(Value::Null)
        }
        StorageOp::MultiMerge => {
            let pairs = arg_pair_list(args, 0)?;
            store.multi_merge(&pairs).await.map_err(reduce)?;
            Ok(Value::Null)
        }
    }
}

/// Reduces a backend error to the two fields that cross the bridge.
fn reduce(err: StoreError) -> StorageFault {
    let name = match &err {
        StoreError::Backend(_) => "StorageError",
        StoreError::InvalidValue(_) => "SyntaxError",
        StoreError::NotMergeable(_) => "TypeError",
    };
    StorageFault::new(name, err.to_string())
}

fn arg_str<'a>(args: &'a [Value], index: usize) -> Result<&'a str, StorageFault> {
    args.get(index).and_then(Value::as_str).ok_or_else(|| {
        StorageFault::new(
            "TypeError",
            format!("expected a string argument at position {index}"),
        )
    })
}

fn arg_string_list(args: &[Value], index: usize) -> Result<Vec<String>, StorageFault> {
    let value = args.get(index).cloned().unwrap_or(Value::Null);
    serde_json::from_value(value).map_err(|_| {
        StorageFault::new(
            "TypeError",
            format!("expected a key list at position {index}"),
        )
    })
}

fn arg_pair_list(args: &[Value], index: usize) -> Result<Vec<(String, String)>, StorageFault> {
    let value = args.get(index).cloned().unwrap_or(Value::Null);
    serde_json::from_value(value).map_err(|_| {
        StorageFault::new(
            "TypeError",
            format!("expected a key/value pair list at position {index}"),
        )
    })
}
