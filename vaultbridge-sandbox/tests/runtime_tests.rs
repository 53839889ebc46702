//! End-to-end tests for the sandbox actor: frames in, frames out.

use serde_json::{Value, json};
use std::time::Duration;
use vaultbridge_sandbox::{Registry, SandboxContext, SandboxHandle, SandboxRuntime, ScriptBundle};
use vaultbridge_types::{CallFault, CallMessage, SandboxFrame, StorageOp};

fn test_bundle() -> ScriptBundle {
    ScriptBundle::compose("/* shim */", "/* business */")
}

fn spawn_with(builder: impl FnOnce(&SandboxContext) -> Registry + Send + 'static) -> SandboxHandle {
    SandboxRuntime::new(test_bundle(), builder).spawn()
}

fn call_frame(id: u64, name: &str, args: Vec<Value>) -> String {
    serde_json::to_string(&CallMessage::new(id, name, args)).unwrap()
}

async fn next_frame(handle: &mut SandboxHandle) -> SandboxFrame {
    let raw = tokio::time::timeout(Duration::from_secs(5), handle.frames_out.recv())
        .await
        .expect("timed out waiting for a sandbox frame")
        .expect("sandbox closed its outbound channel");
    serde_json::from_str(&raw).unwrap()
}

#[tokio::test]
async fn loaded_fires_after_startup() {
    let handle = spawn_with(|_ctx| Registry::new());
    handle.loaded.await.expect("runtime dropped the loaded signal");
}

#[tokio::test]
async fn builder_sees_the_decoded_bundle_source() {
    let seen = std::sync::Arc::new(std::sync::Mutex::new(String::new()));
    let sink = std::sync::Arc::clone(&seen);

    let runtime = SandboxRuntime::new(
        ScriptBundle::compose("shim()", "vaultEngine()"),
        move |ctx| {
            *sink.lock().unwrap() = ctx.source().to_string();
            Registry::new()
        },
    );
    runtime.spawn().loaded.await.unwrap();

    assert_eq!(*seen.lock().unwrap(), "((function () {shim();vaultEngine()})())");
}

#[tokio::test]
async fn corrupt_bundle_never_loads() {
    let runtime = SandboxRuntime::new(ScriptBundle::from_encoded("%%%"), |_ctx| Registry::new());
    let mut handle = runtime.spawn();

    let SandboxFrame::Error { error } = next_frame(&mut handle).await else {
        panic!("expected an unsolicited error frame");
    };
    assert_eq!(error.name.as_deref(), Some("EvalError"));
    assert!(handle.loaded.await.is_err());
}

#[tokio::test]
async fn call_resolves_with_handler_result() {
    let mut handle = spawn_with(|_ctx| {
        let mut registry = Registry::new();
        registry.register("Ctrlpanel.randomHandle", |_args| async { Ok(json!("abc123")) });
        registry
    });

    handle.frames_in.send(call_frame(0, "Ctrlpanel.randomHandle", vec![])).unwrap();

    assert_eq!(
        next_frame(&mut handle).await,
        SandboxFrame::resolve(0, json!("abc123"))
    );
}

#[tokio::test]
async fn handler_receives_positional_args() {
    let mut handle = spawn_with(|_ctx| {
        let mut registry = Registry::new();
        registry.register("Math.add", |args| async move {
            let a = args[0].as_i64().unwrap_or(0);
            let b = args[1].as_i64().unwrap_or(0);
            Ok(json!(a + b))
        });
        registry
    });

    handle.frames_in.send(call_frame(4, "Math.add", vec![json!(2), json!(3)])).unwrap();

    assert_eq!(next_frame(&mut handle).await, SandboxFrame::resolve(4, json!(5)));
}

#[tokio::test]
async fn unknown_name_rejects_with_reference_error() {
    let mut handle = spawn_with(|_ctx| Registry::new());

    handle.frames_in.send(call_frame(1, "Nonexistent.fn", vec![])).unwrap();

    let SandboxFrame::Reject { id, error } = next_frame(&mut handle).await else {
        panic!("a missing handler must reject, never resolve");
    };
    assert_eq!(id, 1);
    assert_eq!(error.name.as_deref(), Some("ReferenceError"));
    assert_eq!(error.message.as_deref(), Some("Nonexistent.fn is not defined"));
}

#[tokio::test]
async fn handler_fault_rejects_with_full_error() {
    let mut handle = spawn_with(|_ctx| {
        let mut registry = Registry::new();
        registry.register("Vault.unlock", |_args| async {
            Err::<Value, _>(
                CallFault::new("AuthError", "wrong master password")
                    .with_stack("vault.js:40:12")
                    .at(40.0, 12.0)
                    .with_code(json!("E_AUTH")),
            )
        });
        registry
    });

    handle.frames_in.send(call_frame(2, "Vault.unlock", vec![json!("guess")])).unwrap();

    let SandboxFrame::Reject { id, error } = next_frame(&mut handle).await else {
        panic!("expected a rejection");
    };
    assert_eq!(id, 2);
    assert_eq!(error.name.as_deref(), Some("AuthError"));
    assert_eq!(error.stack.as_deref(), Some("vault.js:40:12"));
    assert_eq!(error.line, Some(40.0));
    assert_eq!(error.code, Some(json!("E_AUTH")));
}

#[tokio::test]
async fn handler_panic_becomes_rejection() {
    let mut handle = spawn_with(|_ctx| {
        let mut registry = Registry::new();
        registry.register("Vault.explode", |args| async move {
            if args.is_empty() {
                panic!("vault on fire");
            }
            Ok(Value::Null)
        });
        registry
    });

    handle.frames_in.send(call_frame(3, "Vault.explode", vec![])).unwrap();

    let SandboxFrame::Reject { id, error } = next_frame(&mut handle).await else {
        panic!("a panicking handler must reject");
    };
    assert_eq!(id, 3);
    assert_eq!(error.message.as_deref(), Some("vault on fire"));
}

#[tokio::test]
async fn malformed_frame_emits_unsolicited_error() {
    let mut handle = spawn_with(|_ctx| Registry::new());

    handle.frames_in.send("{not json".to_string()).unwrap();

    let SandboxFrame::Error { error } = next_frame(&mut handle).await else {
        panic!("expected an unsolicited error frame");
    };
    assert_eq!(error.name.as_deref(), Some("SyntaxError"));
}

#[tokio::test]
async fn concurrent_calls_settle_independently() {
    let mut handle = spawn_with(|_ctx| {
        let mut registry = Registry::new();
        registry.register("Vault.slow", |_args| async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(json!("slow"))
        });
        registry.register("Vault.fast", |_args| async { Ok(json!("fast")) });
        registry
    });

    handle.frames_in.send(call_frame(0, "Vault.slow", vec![])).unwrap();
    handle.frames_in.send(call_frame(1, "Vault.fast", vec![])).unwrap();

    // The fast call overtakes the slow one; each still settles its own id.
    let first = next_frame(&mut handle).await;
    let second = next_frame(&mut handle).await;
    assert_eq!(first, SandboxFrame::resolve(1, json!("fast")));
    assert_eq!(second, SandboxFrame::resolve(0, json!("slow")));
}

#[tokio::test]
async fn handler_storage_roundtrip_through_runtime() {
    let mut handle = spawn_with(|ctx| {
        let storage = ctx.storage();
        let mut registry = Registry::new();
        registry.register("Vault.persist", move |_args| {
            let storage = storage.clone();
            async move {
                storage
                    .set_item("k", "v")
                    .await
                    .map_err(|fault| CallFault::new(fault.name, fault.message))?;
                Ok(json!("persisted"))
            }
        });
        registry
    });

    handle.frames_in.send(call_frame(0, "Vault.persist", vec![])).unwrap();

    // The handler suspends on the storage round trip first.
    let SandboxFrame::AsyncStorage { id, op, args } = next_frame(&mut handle).await else {
        panic!("expected a storage request");
    };
    assert_eq!((id, op), (0, StorageOp::SetItem));
    assert_eq!(args, vec![json!("k"), json!("v")]);

    handle
        .frames_in
        .send(format!(r#"{{"type":"resolve","id":{id},"result":null}}"#))
        .unwrap();

    assert_eq!(
        next_frame(&mut handle).await,
        SandboxFrame::resolve(0, json!("persisted"))
    );
}

#[tokio::test]
async fn storage_response_with_unknown_id_is_a_fault() {
    let mut handle = spawn_with(|_ctx| Registry::new());

    handle
        .frames_in
        .send(r#"{"type":"resolve","id":99,"result":null}"#.to_string())
        .unwrap();

    let SandboxFrame::Error { error } = next_frame(&mut handle).await else {
        panic!("expected an unsolicited error frame");
    };
    assert_eq!(error.name.as_deref(), Some("TypeError"));
    assert!(error.message.as_deref().unwrap().contains("99"));
}

#[tokio::test]
async fn fault_reporter_emits_unsolicited_error() {
    let mut handle = spawn_with(|ctx| {
        let faults = ctx.faults();
        let mut registry = Registry::new();
        registry.register("Vault.background", move |_args| {
            let faults = faults.clone();
            async move {
                // Background work whose failure is tied to no call.
                tokio::spawn(async move {
                    faults.report(CallFault::new("SyncError", "refresh failed"));
                });
                Ok(Value::Null)
            }
        });
        registry
    });

    handle.frames_in.send(call_frame(0, "Vault.background", vec![])).unwrap();

    let mut saw_resolve = false;
    let mut saw_fault = false;
    for _ in 0..2 {
        match next_frame(&mut handle).await {
            SandboxFrame::Resolve { id: 0, .. } => saw_resolve = true,
            SandboxFrame::Error { error } => {
                assert_eq!(error.name.as_deref(), Some("SyncError"));
                saw_fault = true;
            }
            other => panic!("unexpected frame: {other:?}"),
        }
    }
    assert!(saw_resolve && saw_fault);
}
