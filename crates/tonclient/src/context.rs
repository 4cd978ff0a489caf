//! # Engine Context with Async Pump
//!
//! Owns one engine context and its lifecycle. A background pump task reads
//! every response the engine produces for this context and routes it to the
//! waiting caller (single-shot calls) or to the subscription slot (streams)
//! registered under the response's request id.
//!
//! ## Invariants
//!
//! - The engine context is destroyed exactly once, either by `destroy` or
//!   when the last `Context` clone is dropped.
//! - A request id is never handed out while a route for it is still present.
//! - Every routed call receives exactly one response, or observes its channel
//!   closing when the context goes away or the engine drops its sink.

use std::sync::Arc;
use std::sync::Weak;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tonrpc::Request;
use tonrpc::Response;
use tonrpc::ResponseType;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::config::ClientConfig;
use crate::engine::ContextId;
use crate::engine::Engine;
use crate::engine::ResponseSink;
use crate::engine::SinkEvent;
use crate::error::Error;
use crate::error::Result;
use crate::subscription::StreamSlot;

/// Where the responses for one request id go.
pub(crate) enum Route {
    /// A single-shot call awaiting its outcome.
    Call(oneshot::Sender<Response>),
    /// A streaming subscription.
    Stream(Arc<StreamSlot>),
}

type Routes = DashMap<u32, Route>;

/// Shared handle to one engine context.
///
/// Cheap to clone. Every clone refers to the same engine context; none of
/// them copies engine state.
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

struct Inner {
    id: ContextId,
    engine: Arc<dyn Engine>,
    routes: Arc<Routes>,
    next_request_id: AtomicU32,
    events: mpsc::UnboundedSender<SinkEvent>,
    destroyed: AtomicBool,
    pump: JoinHandle<()>,
}

impl Context {
    /// Starts an engine context and spawns its response pump.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn create(engine: Arc<dyn Engine>, config: &ClientConfig) -> Result<Self> {
        let config_json = serde_json::to_string(config)
            .map_err(|e| Error::EngineInit(format!("Invalid config: {}", e)))?;

        let id = engine
            .create_context(&config_json)
            .await
            .map_err(|e| Error::EngineInit(e.to_string()))?;

        let routes: Arc<Routes> = Arc::new(DashMap::new());
        let (events, rx) = mpsc::unbounded_channel();
        let pump = tokio::spawn(Self::pump(id, rx, routes.clone()));

        info!(context = %id, "engine context created");

        Ok(Self {
            inner: Arc::new(Inner {
                id,
                engine,
                routes,
                next_request_id: AtomicU32::new(1),
                events,
                destroyed: AtomicBool::new(false),
                pump,
            }),
        })
    }

    /// Returns the engine-assigned id of this context.
    pub fn id(&self) -> ContextId {
        self.inner.id
    }

    pub fn is_destroyed(&self) -> bool {
        self.inner.destroyed.load(Ordering::Acquire)
    }

    /// Destroys the engine context.
    ///
    /// Pending calls observe `ChannelClosed`; live subscriptions stop
    /// receiving items. A second call returns `ContextDestroyed`.
    pub fn destroy(&self) -> Result<()> {
        if self.inner.destroyed.swap(true, Ordering::AcqRel) {
            return Err(Error::ContextDestroyed);
        }
        self.inner.teardown();
        info!(context = %self.inner.id, "engine context destroyed");
        Ok(())
    }

    /// Number of requests currently awaiting responses.
    pub fn pending(&self) -> usize {
        self.inner.routes.len()
    }

    /// Allocates a request id that no live route is using.
    pub(crate) fn next_request_id(&self) -> u32 {
        loop {
            let id = self.inner.next_request_id.fetch_add(1, Ordering::Relaxed);
            if id != 0 && !self.inner.routes.contains_key(&id) {
                return id;
            }
        }
    }

    /// Registers `route` for the request and hands the request to the engine.
    pub(crate) fn submit(&self, request: Request, route: Route) -> Result<()> {
        if self.is_destroyed() {
            return Err(Error::ContextDestroyed);
        }

        let request_id = request.request_id;
        self.inner.routes.insert(request_id, route);

        // destroy may have cleared the table between the check and the insert
        if self.is_destroyed() {
            self.inner.routes.remove(&request_id);
            return Err(Error::ContextDestroyed);
        }

        debug!(context = %self.inner.id, request_id, function = %request.function_name, "submit");

        let sink = ResponseSink::new(request_id, self.inner.events.clone());
        if let Err(e) = self.inner.engine.request(self.inner.id, request, sink) {
            self.inner.routes.remove(&request_id);
            return Err(e.into());
        }
        Ok(())
    }

    /// Drops the route for a request id, releasing the id.
    pub(crate) fn forget(&self, request_id: u32) {
        if let Some((_, Route::Stream(slot))) = self.inner.routes.remove(&request_id) {
            slot.close();
        }
    }

    pub(crate) fn downgrade(&self) -> WeakContext {
        WeakContext(Arc::downgrade(&self.inner))
    }

    async fn pump(id: ContextId, mut rx: mpsc::UnboundedReceiver<SinkEvent>, routes: Arc<Routes>) {
        while let Some(event) = rx.recv().await {
            match event {
                SinkEvent::Response(response) => Self::handle_response(response, &routes),
                SinkEvent::Released(request_id) => Self::handle_release(request_id, &routes),
            }
        }

        // All senders are gone: wake every waiter with a closed channel.
        warn!(context = %id, pending = routes.len(), "response stream closed");
        Self::close_all(&routes);
    }

    fn handle_response(response: Response, routes: &Routes) {
        let request_id = response.request_id;

        let slot = match routes.get(&request_id) {
            None => {
                // Late answer for a forgotten or cancelled request.
                debug!(request_id, "no route for response");
                return;
            }
            Some(entry) => match entry.value() {
                Route::Stream(slot) => Some(slot.clone()),
                Route::Call(_) => None,
            },
        };

        let Some(slot) = slot else {
            // Intermediate keep-alives do not settle a call.
            if response.response_type == ResponseType::Nop && !response.finished {
                return;
            }
            if let Some((_, Route::Call(tx))) = routes.remove(&request_id) {
                // Ignore if the caller stopped waiting.
                let _ = tx.send(response);
            }
            return;
        };

        let finished = response.finished;
        match response.response_type {
            ResponseType::Success | ResponseType::Error => slot.acknowledge(response),
            ResponseType::Custom(_) => slot.deliver(&response.params_json),
            ResponseType::Nop => {}
        }

        if finished {
            debug!(request_id, "stream finished");
            routes.remove(&request_id);
            slot.close();
        }
    }

    /// The engine dropped a request's sink. Whoever still waits on it is failed.
    fn handle_release(request_id: u32, routes: &Routes) {
        match routes.remove(&request_id) {
            Some((_, Route::Call(_))) => {
                warn!(request_id, "engine dropped the request without answering");
            }
            Some((_, Route::Stream(slot))) => {
                warn!(request_id, "engine dropped the subscription stream");
                slot.close();
            }
            None => {}
        }
    }

    fn close_all(routes: &Routes) {
        let keys: Vec<u32> = routes.iter().map(|e| *e.key()).collect();
        for key in keys {
            if let Some((_, Route::Stream(slot))) = routes.remove(&key) {
                slot.close();
            }
        }
    }
}

impl Inner {
    fn teardown(&self) {
        self.engine.destroy_context(self.id);
        self.pump.abort();
        Context::close_all(&self.routes);
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if !self.destroyed.swap(true, Ordering::AcqRel) {
            self.teardown();
            debug!(context = %self.id, "engine context released on drop");
        }
    }
}

/// A context reference that does not keep the engine context alive.
pub(crate) struct WeakContext(Weak<Inner>);

impl WeakContext {
    pub(crate) fn upgrade(&self) -> Option<Context> {
        self.0.upgrade().map(|inner| Context { inner })
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.inner.id)
            .field("destroyed", &self.is_destroyed())
            .field("pending", &self.pending())
            .finish()
    }
}
