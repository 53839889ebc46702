//! Direct tests for the storage proxy's id space and correlation table.

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::time::Duration;
use tokio::sync::mpsc;
use vaultbridge_sandbox::{OutboundPost, StorageProxy};
use vaultbridge_types::{SandboxFrame, StorageFault, StorageOp, StorageResponse};

fn proxy_pair() -> (StorageProxy, mpsc::UnboundedReceiver<String>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (StorageProxy::new(OutboundPost::new(tx)), rx)
}

async fn next_request(rx: &mut mpsc::UnboundedReceiver<String>) -> (u64, StorageOp, Vec<Value>) {
    let raw = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for a storage request")
        .expect("proxy dropped");
    match serde_json::from_str(&raw).unwrap() {
        SandboxFrame::AsyncStorage { id, op, args } => (id, op, args),
        other => panic!("expected a storage request, got {other:?}"),
    }
}

#[tokio::test]
async fn set_item_emits_the_exact_request_shape() {
    let (proxy, mut rx) = proxy_pair();

    let pending = tokio::spawn(async move { proxy.set_item("k", "v").await });

    let raw = rx.recv().await.unwrap();
    let wire: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(
        wire,
        json!({"type": "async-storage", "id": 0, "fn": "setItem", "args": ["k", "v"]})
    );

    pending.abort();
}

#[tokio::test]
async fn resolve_settles_the_pending_call() {
    let (proxy, mut rx) = proxy_pair();

    let responder = proxy.clone();
    let pending = tokio::spawn(async move { responder.set_item("k", "v").await });

    let (id, _, _) = next_request(&mut rx).await;
    proxy
        .apply_response(StorageResponse::Resolve {
            id,
            result: Value::Null,
        })
        .unwrap();

    pending.await.unwrap().unwrap();
    assert_eq!(proxy.pending_len(), 0);
}

#[tokio::test]
async fn reject_surfaces_the_reduced_fault() {
    let (proxy, mut rx) = proxy_pair();

    let responder = proxy.clone();
    let pending = tokio::spawn(async move { responder.get_item("k").await });

    let (id, _, _) = next_request(&mut rx).await;
    proxy
        .apply_response(StorageResponse::Reject {
            id,
            error: StorageFault::new("QuotaError", "disk full"),
        })
        .unwrap();

    let fault = pending.await.unwrap().unwrap_err();
    assert_eq!(fault, StorageFault::new("QuotaError", "disk full"));
}

#[tokio::test]
async fn request_ids_increase_from_zero() {
    let (proxy, mut rx) = proxy_pair();

    let first = proxy.clone();
    let a = tokio::spawn(async move { first.get_item("a").await });
    let (id_a, ..) = next_request(&mut rx).await;

    let second = proxy.clone();
    let b = tokio::spawn(async move { second.get_item("b").await });
    let (id_b, ..) = next_request(&mut rx).await;

    assert_eq!((id_a, id_b), (0, 1));
    a.abort();
    b.abort();
}

#[tokio::test]
async fn get_item_decodes_null_and_string() {
    let (proxy, mut rx) = proxy_pair();

    let responder = proxy.clone();
    let missing = tokio::spawn(async move { responder.get_item("missing").await });
    let (id, ..) = next_request(&mut rx).await;
    proxy
        .apply_response(StorageResponse::Resolve { id, result: Value::Null })
        .unwrap();
    assert_eq!(missing.await.unwrap().unwrap(), None);

    let responder = proxy.clone();
    let present = tokio::spawn(async move { responder.get_item("k").await });
    let (id, ..) = next_request(&mut rx).await;
    proxy
        .apply_response(StorageResponse::Resolve { id, result: json!("v") })
        .unwrap();
    assert_eq!(present.await.unwrap().unwrap(), Some("v".to_string()));
}

#[tokio::test]
async fn multi_get_sends_key_list_and_decodes_pairs() {
    let (proxy, mut rx) = proxy_pair();

    let responder = proxy.clone();
    let pending = tokio::spawn(async move {
        responder.multi_get(&["a".to_string(), "b".to_string()]).await
    });

    let (id, op, args) = next_request(&mut rx).await;
    assert_eq!(op, StorageOp::MultiGet);
    assert_eq!(args, vec![json!(["a", "b"])]);

    proxy
        .apply_response(StorageResponse::Resolve {
            id,
            result: json!([["a", "1"], ["b", null]]),
        })
        .unwrap();

    assert_eq!(
        pending.await.unwrap().unwrap(),
        vec![
            ("a".to_string(), Some("1".to_string())),
            ("b".to_string(), None),
        ]
    );
}

#[tokio::test]
async fn flush_is_fire_and_forget() {
    let (proxy, mut rx) = proxy_pair();

    // Returns immediately; the request is still posted and tracked.
    proxy.flush_get_requests();
    let (id, op, _) = next_request(&mut rx).await;
    assert_eq!(op, StorageOp::FlushGetRequests);
    assert_eq!(proxy.pending_len(), 1);

    // The eventual response settles a discarded handler without error.
    proxy
        .apply_response(StorageResponse::Resolve { id, result: Value::Null })
        .unwrap();
    assert_eq!(proxy.pending_len(), 0);
}

#[tokio::test]
async fn handlers_are_removed_exactly_once() {
    let (proxy, mut rx) = proxy_pair();

    let responder = proxy.clone();
    let pending = tokio::spawn(async move { responder.get_item("k").await });
    let (id, ..) = next_request(&mut rx).await;

    proxy
        .apply_response(StorageResponse::Resolve { id, result: json!("v") })
        .unwrap();
    assert_eq!(pending.await.unwrap().unwrap(), Some("v".to_string()));

    // A duplicate response finds no handler: detected, not applied.
    let err = proxy
        .apply_response(StorageResponse::Resolve { id, result: json!("other") })
        .unwrap_err();
    assert_eq!(err.id, id);
}

#[tokio::test]
async fn unknown_id_is_reported() {
    let (proxy, _rx) = proxy_pair();
    let err = proxy
        .apply_response(StorageResponse::Resolve {
            id: 7,
            result: Value::Null,
        })
        .unwrap_err();
    assert_eq!(err.id, 7);
}
