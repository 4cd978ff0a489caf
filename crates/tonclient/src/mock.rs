//! Mock engine for testing.
//!
//! Answers `net.query_collection`, `net.subscribe_collection` and
//! `net.unsubscribe` from an in-memory collection store, and any other
//! method from handlers registered with `on`. Filters support the scalar
//! operators (`eq`, `ne`, `gt`, `lt`, `ge`, `le`, `in`, `notIn`) and `OR`;
//! result projection keeps top-level fields only.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::time::Duration;

use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use tonrpc::EngineFailure;
use tonrpc::Request;
use tonrpc::Response;

use crate::engine;
use crate::engine::ContextId;
use crate::engine::Engine;
use crate::engine::ResponseSink;
use crate::net::QUERY_COLLECTION;
use crate::subscription::SUBSCRIBE_COLLECTION;
use crate::subscription::UNSUBSCRIBE;

pub const UNKNOWN_FUNCTION: u32 = 1;
pub const INVALID_PARAMS: u32 = 2;

/// How the mock answers one request.
#[derive(Debug, Clone)]
pub enum Reply {
    Success(Value),
    Failure(EngineFailure),
    /// Answer after a delay (uses the tokio clock).
    Delayed(Duration, Box<Reply>),
    /// Drop the request without answering.
    Silent,
    /// Never answer, but keep the request open.
    Hold,
}

impl Reply {
    pub fn failure(code: u32, message: impl Into<String>) -> Self {
        Self::Failure(EngineFailure::new(code, message))
    }

    pub fn after(delay: Duration, reply: Reply) -> Self {
        Self::Delayed(delay, Box::new(reply))
    }
}

type Handler = Arc<dyn Fn(&Value) -> Reply + Send + Sync>;

struct MockSubscription {
    handle: u32,
    context: ContextId,
    request_id: u32,
    collection: String,
    filter: Value,
    result: String,
    sink: ResponseSink,
    live: bool,
}

#[derive(Default)]
struct State {
    live_contexts: HashSet<ContextId>,
    destroyed: Vec<ContextId>,
    handlers: HashMap<String, Handler>,
    collections: HashMap<String, Vec<Value>>,
    subscriptions: Vec<MockSubscription>,
    requests: Vec<Request>,
    next_context: u32,
    next_handle: u32,
    init_failure: Option<String>,
}

#[derive(Default)]
pub struct MockEngine {
    state: Mutex<State>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Answers `method` with `handler`, overriding the built-in methods.
    pub fn on(&self, method: &str, handler: impl Fn(&Value) -> Reply + Send + Sync + 'static) {
        self.state().handlers.insert(method.to_string(), Arc::new(handler));
    }

    /// Makes the next `create_context` fail.
    pub fn fail_init(&self, message: impl Into<String>) {
        self.state().init_failure = Some(message.into());
    }

    /// Stores a row without notifying subscribers.
    pub fn insert(&self, collection: &str, row: Value) {
        self.state()
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(row);
    }

    /// Stores a row and streams it to every live subscription whose filter
    /// matches. Returns the number of deliveries.
    pub fn emit(&self, collection: &str, row: Value) -> usize {
        let mut state = self.state();
        let mut delivered = 0;
        for sub in state.subscriptions.iter().filter(|s| s.live && s.collection == collection) {
            if matches(&row, &sub.filter) {
                let item = json!({ "result": project(&row, &sub.result) });
                let _ = sub.sink.send(Response::item(sub.request_id, &item));
                delivered += 1;
            }
        }
        state
            .collections
            .entry(collection.to_string())
            .or_default()
            .push(row);
        delivered
    }

    /// Sends `payload` as an item for subscription `handle`, live or not.
    pub fn emit_raw(&self, handle: u32, payload: Value) -> bool {
        let state = self.state();
        match state.subscriptions.iter().find(|s| s.handle == handle) {
            Some(sub) => sub.sink.send(Response::item(sub.request_id, &payload)).is_ok(),
            None => false,
        }
    }

    /// Every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<Request> {
        self.state().requests.clone()
    }

    /// Number of requests received for `method`.
    pub fn calls(&self, method: &str) -> usize {
        self.state()
            .requests
            .iter()
            .filter(|r| r.function_name == method)
            .count()
    }

    pub fn live_subscriptions(&self) -> usize {
        self.state().subscriptions.iter().filter(|s| s.live).count()
    }

    pub fn live_contexts(&self) -> usize {
        self.state().live_contexts.len()
    }

    pub fn destroyed_contexts(&self) -> Vec<ContextId> {
        self.state().destroyed.clone()
    }

    fn query(state: &State, params: &Value) -> Reply {
        let collection = params["collection"].as_str().unwrap_or_default();
        let filter = &params["filter"];
        if !is_filter(filter) {
            return Reply::failure(INVALID_PARAMS, "Invalid filter");
        }
        let result = params["result"].as_str().unwrap_or_default();

        let mut rows: Vec<&Value> = state
            .collections
            .get(collection)
            .map(|rows| rows.iter().filter(|row| matches(row, filter)).collect())
            .unwrap_or_default();

        if let Some(order) = params["order"].as_array() {
            rows.sort_by(|a, b| {
                for clause in order {
                    let path = clause["path"].as_str().unwrap_or_default();
                    let ord = compare(&a[path], &b[path]).unwrap_or(Ordering::Equal);
                    let ord = if clause["direction"] == "DESC" { ord.reverse() } else { ord };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }

        let limit = params["limit"].as_u64().map_or(usize::MAX, |l| l as usize);
        let rows: Vec<Value> = rows.into_iter().take(limit).map(|row| project(row, result)).collect();
        Reply::Success(json!({ "result": rows }))
    }

    fn subscribe(state: &mut State, context: ContextId, request_id: u32, params: &Value, sink: &ResponseSink) -> Reply {
        let filter = params["filter"].clone();
        if !is_filter(&filter) {
            return Reply::failure(INVALID_PARAMS, "Invalid filter");
        }

        state.next_handle += 1;
        let handle = state.next_handle;
        state.subscriptions.push(MockSubscription {
            handle,
            context,
            request_id,
            collection: params["collection"].as_str().unwrap_or_default().to_string(),
            filter,
            result: params["result"].as_str().unwrap_or_default().to_string(),
            sink: sink.clone(),
            live: true,
        });
        Reply::Success(json!({ "handle": handle }))
    }

    fn unsubscribe(state: &mut State, params: &Value) -> Reply {
        let handle = params["handle"].as_u64();
        let sub = state
            .subscriptions
            .iter_mut()
            .find(|s| s.live && Some(u64::from(s.handle)) == handle);
        if let Some(sub) = sub {
            sub.live = false;
            // Confirms the teardown on the subscription's own request id.
            let _ = sub.sink.send(Response::nop(sub.request_id, true));
        }
        Reply::Success(json!({}))
    }
}

fn send_reply(request_id: u32, reply: Reply, finished: bool, sink: ResponseSink) {
    match reply {
        Reply::Success(value) => {
            let _ = sink.send(Response::success(request_id, &value, finished));
        }
        Reply::Failure(failure) => {
            let _ = sink.send(Response::error(request_id, &failure));
        }
        Reply::Delayed(delay, reply) => {
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                send_reply(request_id, *reply, finished, sink);
            });
        }
        Reply::Silent => drop(sink),
        Reply::Hold => {
            tokio::spawn(async move {
                let _sink = sink;
                std::future::pending::<()>().await;
            });
        }
    }
}

#[async_trait::async_trait]
impl Engine for MockEngine {
    async fn create_context(&self, config_json: &str) -> engine::Result<ContextId> {
        let mut state = self.state();
        if let Some(message) = state.init_failure.take() {
            return Err(engine::Error::Init(message));
        }
        serde_json::from_str::<Value>(config_json).map_err(|e| engine::Error::Init(e.to_string()))?;

        state.next_context += 1;
        let id = ContextId(state.next_context);
        state.live_contexts.insert(id);
        Ok(id)
    }

    fn request(&self, context: ContextId, request: Request, sink: ResponseSink) -> engine::Result<()> {
        let mut state = self.state();
        if !state.live_contexts.contains(&context) {
            return Err(engine::Error::UnknownContext(context));
        }
        state.requests.push(request.clone());

        let request_id = request.request_id;
        let params: Value = match serde_json::from_str(&request.params_json) {
            Ok(params) => params,
            Err(e) => {
                send_reply(request_id, Reply::failure(INVALID_PARAMS, e.to_string()), true, sink);
                return Ok(());
            }
        };

        let method = request.function_name.as_str();
        let mut finished = true;
        let handler = state.handlers.get(method).cloned();
        let reply = match handler {
            Some(handler) => {
                drop(state);
                handler(&params)
            }
            None => match method {
                QUERY_COLLECTION => Self::query(&state, &params),
                SUBSCRIBE_COLLECTION => {
                    finished = false;
                    Self::subscribe(&mut state, context, request_id, &params, &sink)
                }
                UNSUBSCRIBE => Self::unsubscribe(&mut state, &params),
                other => Reply::failure(UNKNOWN_FUNCTION, format!("Unknown function {}", other)),
            },
        };

        send_reply(request_id, reply, finished, sink);
        Ok(())
    }

    fn destroy_context(&self, context: ContextId) {
        let mut state = self.state();
        state.live_contexts.remove(&context);
        state.destroyed.push(context);
        for sub in state.subscriptions.iter_mut().filter(|s| s.context == context) {
            sub.live = false;
        }
    }
}

fn is_filter(filter: &Value) -> bool {
    filter.is_null() || filter.is_object()
}

fn matches(row: &Value, filter: &Value) -> bool {
    let Some(fields) = filter.as_object() else {
        return filter.is_null();
    };

    let own = fields
        .iter()
        .filter(|(field, _)| field.as_str() != "OR")
        .all(|(field, cond)| matches_field(row.get(field).unwrap_or(&Value::Null), cond));

    own || fields.get("OR").is_some_and(|alt| matches(row, alt))
}

const OPERATORS: [&str; 8] = ["eq", "ne", "gt", "lt", "ge", "le", "in", "notIn"];

fn matches_field(value: &Value, cond: &Value) -> bool {
    let Some(ops) = cond.as_object() else {
        return same(value, cond);
    };
    if ops.keys().any(|op| !OPERATORS.contains(&op.as_str())) {
        // a nested record filter
        return matches(value, cond);
    }

    ops.iter().all(|(op, arg)| match op.as_str() {
        "eq" => same(value, arg),
        "ne" => !same(value, arg),
        "gt" => compare(value, arg) == Some(Ordering::Greater),
        "lt" => compare(value, arg) == Some(Ordering::Less),
        "ge" => matches!(compare(value, arg), Some(Ordering::Greater | Ordering::Equal)),
        "le" => matches!(compare(value, arg), Some(Ordering::Less | Ordering::Equal)),
        "in" => arg.as_array().is_some_and(|xs| xs.iter().any(|x| same(value, x))),
        "notIn" => arg.as_array().is_some_and(|xs| !xs.iter().any(|x| same(value, x))),
        _ => false,
    })
}

fn same(a: &Value, b: &Value) -> bool {
    compare(a, b).map_or(a == b, |ord| ord == Ordering::Equal)
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn project(row: &Value, result: &str) -> Value {
    let Some(fields) = row.as_object() else {
        return row.clone();
    };
    let wanted: Vec<&str> = result
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|s| !s.is_empty())
        .collect();

    let projected: Map<String, Value> = fields
        .iter()
        .filter(|(key, _)| wanted.contains(&key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();
    Value::Object(projected)
}
