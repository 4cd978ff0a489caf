//! Tests for dispatch, subscriptions and the context lifecycle against the
//! mock engine.

use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use serde_json::json;
use tokio::sync::mpsc;

use crate::config::ClientConfig;
use crate::context::Context;
use crate::dispatch::call;
use crate::error::Error;
use crate::mock::INVALID_PARAMS;
use crate::mock::MockEngine;
use crate::mock::Reply;
use crate::mock::UNKNOWN_FUNCTION;
use crate::net::ParamsOfSubscribeCollection;
use crate::net::ParamsOfWaitForCollection;
use crate::net::QUERY_COLLECTION;
use crate::subscription::SUBSCRIBE_COLLECTION;
use crate::subscription::UNSUBSCRIBE;
use crate::subscription::subscribe;
use crate::subscription::unsubscribe;
use crate::subscription::wait_for_collection;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

async fn setup() -> (Arc<MockEngine>, Context) {
    init_tracing();
    let engine = Arc::new(MockEngine::new());
    let context = Context::create(engine.clone(), &ClientConfig::default())
        .await
        .expect("Failed to create context");
    (engine, context)
}

/// Round trip through the pump: once this returns, every response the engine
/// sent earlier has been routed.
async fn sync(context: &Context) {
    let params = json!({ "collection": "_sync", "filter": null, "result": "id" });
    let _: Value = call(context, QUERY_COLLECTION, &params).await.expect("sync call failed");
}

/// Lets background tasks run until `done` holds.
async fn settle(done: impl Fn() -> bool) {
    for _ in 0..1000 {
        if done() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("background work did not settle");
}

fn accounts_query(filter: Value) -> ParamsOfSubscribeCollection {
    ParamsOfSubscribeCollection {
        collection: "accounts".into(),
        filter: Some(filter),
        result: "id balance".into(),
    }
}

#[derive(Debug, Deserialize, PartialEq)]
struct Version {
    version: String,
}

#[derive(Debug, Deserialize, PartialEq)]
struct Row {
    id: String,
    #[serde(default)]
    balance: Option<String>,
}

// ============================================================================
//  DISPATCH
// ============================================================================

#[tokio::test]
async fn test_call_decodes_canned_success() {
    let (engine, context) = setup().await;
    engine.on("client.version", |_| Reply::Success(json!({ "version": "1.44.0" })));

    let result: Version = call(&context, "client.version", &json!({})).await.unwrap();
    assert_eq!(result, Version { version: "1.44.0".into() });
    assert_eq!(context.pending(), 0);
}

#[tokio::test]
async fn test_call_surfaces_engine_failure() {
    let (engine, context) = setup().await;
    engine.on("abi.decode_message", |_| Reply::failure(304, "Invalid message"));

    let result: Result<Value, Error> = call(&context, "abi.decode_message", &json!({})).await;
    match result {
        Err(Error::Engine { code, message, .. }) => {
            assert_eq!(code, 304);
            assert_eq!(message, "Invalid message");
        }
        other => panic!("Expected engine error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_call_unknown_method() {
    let (_engine, context) = setup().await;
    let result: Result<Value, Error> = call(&context, "nope.nothing", &json!({})).await;
    assert_eq!(result.unwrap_err().code(), Some(UNKNOWN_FUNCTION));
}

#[tokio::test]
async fn test_call_rejects_empty_method() {
    let (engine, context) = setup().await;
    let result: Result<Value, Error> = call(&context, "", &json!({})).await;
    assert_eq!(result, Err(Error::InvalidMethod));
    assert!(engine.requests().is_empty());
}

#[tokio::test]
async fn test_call_serialization_error_is_local() {
    let (engine, context) = setup().await;
    engine.on("client.version", |_| Reply::Success(json!({ "version": "1" })));

    // JSON object keys must be strings.
    let mut params = HashMap::new();
    params.insert((1u8, 2u8), 3u8);
    let result: Result<Value, Error> = call(&context, "client.version", &params).await;
    assert!(matches!(result, Err(Error::Serialization(_))));
    assert!(engine.requests().is_empty());

    // The context is unaffected.
    let ok: Version = call(&context, "client.version", &json!({})).await.unwrap();
    assert_eq!(ok.version, "1");
}

#[tokio::test]
async fn test_call_deserialization_error() {
    let (engine, context) = setup().await;
    engine.on("client.version", |_| Reply::Success(json!({ "version": 44 })));

    let result: Result<Version, Error> = call(&context, "client.version", &json!({})).await;
    assert!(matches!(result, Err(Error::Deserialization(_))));
}

#[tokio::test(start_paused = true)]
async fn test_slow_call_does_not_block_others() {
    let (engine, context) = setup().await;
    engine.on("slow", |_| Reply::after(Duration::from_secs(10), Reply::Success(json!(1))));
    engine.on("fast", |_| Reply::Success(json!(2)));

    let slow_ctx = context.clone();
    let slow = tokio::spawn(async move { call::<_, u32>(&slow_ctx, "slow", &json!({})).await });
    tokio::task::yield_now().await;

    let fast: u32 = call(&context, "fast", &json!({})).await.unwrap();
    assert_eq!(fast, 2);
    assert!(!slow.is_finished());

    assert_eq!(slow.await.unwrap().unwrap(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_get_their_own_outcome() {
    let (engine, context) = setup().await;
    engine.on("echo", |params| {
        let jitter = rand::random::<u64>() % 20;
        Reply::after(Duration::from_millis(jitter), Reply::Success(params["n"].clone()))
    });

    let mut tasks = Vec::new();
    for n in 0..64u32 {
        let context = context.clone();
        tasks.push(tokio::spawn(async move {
            let got: u32 = call(&context, "echo", &json!({ "n": n })).await.unwrap();
            assert_eq!(got, n);
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }

    let ids: HashSet<u32> = engine.requests().iter().map(|r| r.request_id).collect();
    assert_eq!(ids.len(), 64);
    assert_eq!(context.pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_abandoned_call_releases_route() {
    let (engine, context) = setup().await;
    engine.on("hang", |_| Reply::Hold);

    let result = tokio::time::timeout(Duration::from_secs(1), call::<_, Value>(&context, "hang", &json!({}))).await;
    assert!(result.is_err());
    assert_eq!(context.pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_request_fails_call() {
    let (engine, context) = setup().await;
    engine.on("lost", |_| Reply::Silent);

    let result = tokio::time::timeout(Duration::from_secs(3600), call::<_, Value>(&context, "lost", &json!({}))).await;
    assert_eq!(result.expect("call still pending"), Err(Error::ChannelClosed));
    assert_eq!(context.pending(), 0);

    // Only that request failed.
    sync(&context).await;
}

// ============================================================================
//  CONTEXT LIFECYCLE
// ============================================================================

#[tokio::test]
async fn test_create_context_failure() {
    init_tracing();
    let engine = Arc::new(MockEngine::new());
    engine.fail_init("no network");

    let result = Context::create(engine.clone(), &ClientConfig::default()).await;
    assert!(matches!(result, Err(Error::EngineInit(msg)) if msg.contains("no network")));
    assert_eq!(engine.live_contexts(), 0);
}

#[tokio::test]
async fn test_destroy_twice_errors() {
    let (engine, context) = setup().await;
    context.destroy().unwrap();
    assert_eq!(context.destroy(), Err(Error::ContextDestroyed));
    assert_eq!(engine.destroyed_contexts(), vec![context.id()]);
}

#[tokio::test]
async fn test_call_after_destroy_errors() {
    let (engine, context) = setup().await;
    context.destroy().unwrap();

    let result: Result<Value, Error> = call(&context, "client.version", &json!({})).await;
    assert_eq!(result, Err(Error::ContextDestroyed));
    assert!(engine.requests().is_empty());
}

#[tokio::test]
async fn test_destroy_fails_pending_calls() {
    let (engine, context) = setup().await;
    engine.on("hang", |_| Reply::Hold);

    let pending_ctx = context.clone();
    let pending = tokio::spawn(async move { call::<_, Value>(&pending_ctx, "hang", &json!({})).await });
    while context.pending() == 0 {
        tokio::task::yield_now().await;
    }

    context.destroy().unwrap();
    assert_eq!(pending.await.unwrap(), Err(Error::ChannelClosed));
}

#[tokio::test]
async fn test_drop_destroys_context_once() {
    let (engine, context) = setup().await;
    let id = context.id();
    let clone = context.clone();
    drop(context);
    assert!(engine.destroyed_contexts().is_empty());

    drop(clone);
    assert_eq!(engine.destroyed_contexts(), vec![id]);
}

// ============================================================================
//  SUBSCRIPTIONS
// ============================================================================

#[tokio::test]
async fn test_subscribe_delivers_in_order() {
    let (engine, context) = setup().await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = subscribe(&context, &accounts_query(json!({})), move |row: Row| {
        let _ = tx.send(row.id);
    })
    .await
    .unwrap();

    for i in 0..5 {
        assert_eq!(engine.emit("accounts", json!({ "id": format!("0:{}", i) })), 1);
    }
    for i in 0..5 {
        assert_eq!(rx.recv().await.unwrap(), format!("0:{}", i));
    }
    assert!(handle.is_active());
}

#[tokio::test]
async fn test_subscribe_projects_and_filters() {
    let (engine, context) = setup().await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    let _handle = subscribe(&context, &accounts_query(json!({ "id": { "eq": "0:abc" } })), move |row: Value| {
        let _ = tx.send(row);
    })
    .await
    .unwrap();

    assert_eq!(engine.emit("accounts", json!({ "id": "0:other", "balance": "0x1" })), 0);
    assert_eq!(engine.emit("accounts", json!({ "id": "0:abc", "balance": "0x2", "boc": "te6" })), 1);

    assert_eq!(rx.recv().await.unwrap(), json!({ "id": "0:abc", "balance": "0x2" }));
}

#[tokio::test]
async fn test_no_delivery_after_unsubscribe() {
    let (engine, context) = setup().await;
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();

    let handle = subscribe(&context, &accounts_query(json!({})), move |row: Row| {
        sink.lock().unwrap().push(row.id);
    })
    .await
    .unwrap();

    engine.emit("accounts", json!({ "id": "0:1" }));
    sync(&context).await;
    assert_eq!(*seen.lock().unwrap(), vec!["0:1".to_string()]);

    unsubscribe(&handle).await.unwrap();
    assert!(!handle.is_active());

    // The engine misbehaves and keeps streaming.
    engine.emit_raw(handle.engine_handle(), json!({ "result": { "id": "0:2" } }));
    sync(&context).await;
    assert_eq!(*seen.lock().unwrap(), vec!["0:1".to_string()]);
}

#[tokio::test]
async fn test_unsubscribe_is_idempotent() {
    let (engine, context) = setup().await;
    let handle = subscribe(&context, &accounts_query(json!({})), |_: Value| {}).await.unwrap();

    handle.unsubscribe().await.unwrap();
    handle.unsubscribe().await.unwrap();
    assert_eq!(engine.calls(UNSUBSCRIBE), 1);
    assert_eq!(engine.live_subscriptions(), 0);
}

#[tokio::test]
async fn test_unsubscribe_releases_correlation_id() {
    let (_engine, context) = setup().await;
    let handle = subscribe(&context, &accounts_query(json!({})), |_: Value| {}).await.unwrap();
    assert_eq!(context.pending(), 1);

    handle.unsubscribe().await.unwrap();
    assert_eq!(context.pending(), 0);
}

#[tokio::test]
async fn test_unsubscribe_after_destroy_is_noop() {
    let (engine, context) = setup().await;
    let handle = subscribe(&context, &accounts_query(json!({})), |_: Value| {}).await.unwrap();

    context.destroy().unwrap();
    assert!(!handle.is_active());
    handle.unsubscribe().await.unwrap();
    assert_eq!(engine.calls(UNSUBSCRIBE), 0);
}

#[tokio::test]
async fn test_two_subscriptions_get_independent_copies() {
    let (engine, context) = setup().await;
    let (tx_a, mut rx_a) = mpsc::unbounded_channel();
    let (tx_b, mut rx_b) = mpsc::unbounded_channel();
    let filter = json!({ "balance": { "gt": "0x0" } });

    let a = subscribe(&context, &accounts_query(filter.clone()), move |row: Row| {
        let _ = tx_a.send(row.id);
    })
    .await
    .unwrap();
    let b = subscribe(&context, &accounts_query(filter), move |row: Row| {
        let _ = tx_b.send(row.id);
    })
    .await
    .unwrap();
    assert_ne!(a.id(), b.id());

    assert_eq!(engine.emit("accounts", json!({ "id": "0:1", "balance": "0x5" })), 2);
    assert_eq!(engine.emit("accounts", json!({ "id": "0:2", "balance": "0x7" })), 2);
    sync(&context).await;

    a.unsubscribe().await.unwrap();
    b.unsubscribe().await.unwrap();

    let mut got_a = Vec::new();
    while let Some(id) = rx_a.recv().await {
        got_a.push(id);
    }
    let mut got_b = Vec::new();
    while let Some(id) = rx_b.recv().await {
        got_b.push(id);
    }
    assert_eq!(got_a, vec!["0:1", "0:2"]);
    assert_eq!(got_b, vec!["0:1", "0:2"]);
}

#[tokio::test]
async fn test_subscribe_rejected_by_engine() {
    let (engine, context) = setup().await;

    let query = ParamsOfSubscribeCollection {
        collection: "accounts".into(),
        filter: Some(json!("id == 1")),
        result: "id".into(),
    };
    let result = subscribe(&context, &query, |_: Value| {}).await;
    assert_eq!(result.unwrap_err().code(), Some(INVALID_PARAMS));
    assert_eq!(context.pending(), 0);
    assert_eq!(engine.live_subscriptions(), 0);
}

#[tokio::test]
async fn test_bad_item_reported_without_ending_subscription() {
    let (engine, context) = setup().await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    let mut handle = subscribe(&context, &accounts_query(json!({})), move |row: Row| {
        let _ = tx.send(row.id);
    })
    .await
    .unwrap();

    engine.emit_raw(handle.engine_handle(), json!({ "result": { "balance": 12 } }));
    engine.emit("accounts", json!({ "id": "0:ok" }));

    assert_eq!(rx.recv().await.unwrap(), "0:ok");
    assert!(matches!(handle.next_error().await, Some(Error::Deserialization(_))));
    assert!(handle.try_next_error().is_none());
    assert!(handle.is_active());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_unsubscribe_races_delivery() {
    let (engine, context) = setup().await;
    let seen = Arc::new(Mutex::new(0usize));
    let sink = seen.clone();

    let handle = subscribe(&context, &accounts_query(json!({})), move |_: Row| {
        std::thread::sleep(Duration::from_millis(2));
        *sink.lock().unwrap() += 1;
    })
    .await
    .unwrap();

    let emitter = engine.clone();
    let flood = tokio::task::spawn_blocking(move || {
        for i in 0..200 {
            emitter.emit("accounts", json!({ "id": format!("0:{}", i) }));
        }
    });

    tokio::time::sleep(Duration::from_millis(10)).await;
    handle.unsubscribe().await.unwrap();
    let after_unsubscribe = *seen.lock().unwrap();

    flood.await.unwrap();
    engine.emit_raw(handle.engine_handle(), json!({ "result": { "id": "0:late" } }));
    sync(&context).await;

    assert_eq!(*seen.lock().unwrap(), after_unsubscribe);
}

#[tokio::test]
async fn test_dropped_subscription_sink_fails_subscribe() {
    let (engine, context) = setup().await;
    engine.on(SUBSCRIBE_COLLECTION, |_| Reply::Silent);

    let result = subscribe(&context, &accounts_query(json!({})), |_: Value| {}).await;
    assert_eq!(result.unwrap_err(), Error::ChannelClosed);
    assert_eq!(context.pending(), 0);
}

#[tokio::test]
async fn test_unsubscribe_engine_failure_keeps_handle_inactive() {
    let (engine, context) = setup().await;
    engine.on(UNSUBSCRIBE, |_| Reply::failure(500, "teardown failed"));
    let seen = Arc::new(Mutex::new(0usize));
    let sink = seen.clone();

    let handle = subscribe(&context, &accounts_query(json!({})), move |_: Row| {
        *sink.lock().unwrap() += 1;
    })
    .await
    .unwrap();

    let result = handle.unsubscribe().await;
    assert_eq!(result.unwrap_err().code(), Some(500));
    assert!(!handle.is_active());

    // The engine still streams, but nothing is delivered.
    assert_eq!(engine.emit("accounts", json!({ "id": "0:1" })), 1);
    sync(&context).await;
    assert_eq!(*seen.lock().unwrap(), 0);

    handle.unsubscribe().await.unwrap();
    assert_eq!(engine.calls(UNSUBSCRIBE), 1);
}

// ============================================================================
//  WAIT FOR COLLECTION
// ============================================================================

fn wait_query() -> ParamsOfWaitForCollection {
    ParamsOfWaitForCollection {
        collection: "accounts".into(),
        filter: None,
        result: "id".into(),
        timeout: None,
    }
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_collection_item_just_before_deadline() {
    let (engine, context) = setup().await;
    let emitter = engine.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(999)).await;
        emitter.emit("accounts", json!({ "id": "0:first" }));
        emitter.emit("accounts", json!({ "id": "0:second" }));
    });

    let row: Row = wait_for_collection(&context, &wait_query(), Duration::from_secs(1)).await.unwrap();
    assert_eq!(row.id, "0:first");
    assert_eq!(engine.live_subscriptions(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_collection_item_just_after_deadline() {
    let (engine, context) = setup().await;
    let emitter = engine.clone();
    let late = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1001)).await;
        emitter.emit("accounts", json!({ "id": "0:late" }))
    });

    let result: Result<Row, Error> = wait_for_collection(&context, &wait_query(), Duration::from_secs(1)).await;
    assert_eq!(result.unwrap_err(), Error::Timeout(Duration::from_secs(1)));

    // Torn down before the late row shows up.
    assert_eq!(late.await.unwrap(), 0);
    assert_eq!(engine.live_subscriptions(), 0);
    assert_eq!(context.pending(), 0);
}

#[tokio::test]
async fn test_wait_for_collection_engine_failure() {
    let (_engine, context) = setup().await;
    let mut query = wait_query();
    query.filter = Some(json!(17));

    let result: Result<Row, Error> = wait_for_collection(&context, &query, Duration::from_secs(1)).await;
    assert_eq!(result.unwrap_err().code(), Some(INVALID_PARAMS));
}

#[tokio::test]
async fn test_wait_for_collection_stream_ended_without_item() {
    let (engine, context) = setup().await;
    // Accepted and finished in the same response.
    engine.on(SUBSCRIBE_COLLECTION, |_| Reply::Success(json!({ "handle": 7 })));

    let result: Result<Row, Error> = wait_for_collection(&context, &wait_query(), Duration::from_secs(1)).await;
    assert_eq!(result.unwrap_err(), Error::ChannelClosed);
    assert_eq!(engine.calls(UNSUBSCRIBE), 0);
    assert_eq!(context.pending(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_wait_for_collection_expired_before_ack_unsubscribes() {
    let (engine, context) = setup().await;

    let result: Result<Row, Error> = wait_for_collection(&context, &wait_query(), Duration::ZERO).await;
    assert_eq!(result.unwrap_err(), Error::Timeout(Duration::ZERO));

    settle(|| engine.live_subscriptions() == 0 && context.pending() == 0).await;
    assert_eq!(engine.calls(UNSUBSCRIBE), 1);
}

#[tokio::test]
async fn test_abandoned_subscribe_unsubscribes_after_ack() {
    let (engine, context) = setup().await;
    let (tx, mut rx) = mpsc::unbounded_channel();

    {
        let query = accounts_query(json!({}));
        let started = subscribe(&context, &query, move |row: Row| {
            let _ = tx.send(row.id);
        });
        // Submitted, then abandoned before the acknowledgement is read.
        let mut started = Box::pin(started);
        assert!(poll_once(started.as_mut()).await.is_none());
    }

    settle(|| engine.live_subscriptions() == 0 && context.pending() == 0).await;
    assert_eq!(engine.calls(UNSUBSCRIBE), 1);
    assert!(rx.recv().await.is_none());
}

/// Polls `future` exactly once.
async fn poll_once<F: std::future::Future + Unpin>(mut future: F) -> Option<F::Output> {
    std::future::poll_fn(|cx| {
        std::task::Poll::Ready(match std::pin::Pin::new(&mut future).poll(cx) {
            std::task::Poll::Ready(output) => Some(output),
            std::task::Poll::Pending => None,
        })
    })
    .await
}
