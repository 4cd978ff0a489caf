//! # Subscription Multiplexer
//!
//! Streams collection changes from the engine into caller-supplied handlers.
//!
//! Each subscription is a `StreamSlot` routed under the request id of its
//! `net.subscribe_collection` request. The pump delivers items to the slot
//! one at a time, in the order the engine emits them.
//!
//! ## Invariants
//!
//! - Delivery and cancellation both take the slot's sink lock, so once
//!   `unsubscribe` returns the handler is never invoked again.
//! - Unsubscribing twice, or after the engine ended the stream, is a no-op.
//! - A single undecodable item is reported on the side error channel and
//!   does not end the subscription.
//! - A `subscribe` abandoned before the engine acknowledged it is torn down
//!   on the engine once the acknowledgement arrives.

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tonrpc::Request;
use tonrpc::Response;
use tracing::debug;
use tracing::warn;

use crate::context::Context;
use crate::context::Route;
use crate::context::WeakContext;
use crate::dispatch;
use crate::error::Error;
use crate::error::Result;
use crate::net::ParamsOfSubscribeCollection;
use crate::net::ParamsOfWaitForCollection;
use crate::net::ResultOfSubscribeCollection;
use crate::net::ResultOfSubscription;

pub const SUBSCRIBE_COLLECTION: &str = "net.subscribe_collection";
pub const UNSUBSCRIBE: &str = "net.unsubscribe";

type ItemSink = Box<dyn FnMut(&str) + Send>;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Routing target for one subscription.
pub(crate) struct StreamSlot {
    active: AtomicBool,
    ack: Mutex<Option<oneshot::Sender<Response>>>,
    sink: Mutex<Option<ItemSink>>,
}

impl StreamSlot {
    fn new(sink: ItemSink) -> (Arc<Self>, oneshot::Receiver<Response>) {
        let (tx, rx) = oneshot::channel();
        let slot = Arc::new(Self {
            active: AtomicBool::new(true),
            ack: Mutex::new(Some(tx)),
            sink: Mutex::new(Some(sink)),
        });
        (slot, rx)
    }

    /// Forwards the engine's answer to the subscribe request. Only the first
    /// answer counts.
    pub(crate) fn acknowledge(&self, response: Response) {
        if let Some(tx) = lock(&self.ack).take() {
            let _ = tx.send(response);
        }
    }

    /// Hands a raw item payload to the handler, unless cancelled.
    pub(crate) fn deliver(&self, payload: &str) {
        let mut guard = lock(&self.sink);
        if let Some(sink) = guard.as_mut() {
            sink(payload);
        }
    }

    /// Stops delivery. Returns whether the slot was still active.
    ///
    /// Waits for an in-progress delivery to finish before returning.
    pub(crate) fn cancel(&self) -> bool {
        let was_active = self.active.swap(false, Ordering::AcqRel);
        // Dropping the sink also drops the handler and the error sender.
        let sink = lock(&self.sink).take();
        drop(sink);
        was_active
    }

    /// Cancels and drops any pending acknowledgement.
    pub(crate) fn close(&self) {
        self.cancel();
        lock(&self.ack).take();
    }

    pub(crate) fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }
}

/// A live subscription, returned by `subscribe`.
///
/// Dropping the handle does not cancel the subscription; call
/// `unsubscribe` for that.
pub struct SubscriptionHandle {
    request_id: u32,
    handle: u32,
    context: Context,
    slot: Arc<StreamSlot>,
    errors: mpsc::UnboundedReceiver<Error>,
}

impl SubscriptionHandle {
    /// The correlation id routing this subscription's items.
    pub fn id(&self) -> u32 {
        self.request_id
    }

    /// The engine-assigned handle used for teardown.
    pub fn engine_handle(&self) -> u32 {
        self.handle
    }

    pub fn is_active(&self) -> bool {
        self.slot.is_active()
    }

    /// Waits for the next item that failed to decode.
    ///
    /// Returns `None` once the subscription has ended and all errors were read.
    pub async fn next_error(&mut self) -> Option<Error> {
        self.errors.recv().await
    }

    /// Returns an already reported decode error, if any.
    pub fn try_next_error(&mut self) -> Option<Error> {
        self.errors.try_recv().ok()
    }

    pub async fn unsubscribe(&self) -> Result<()> {
        unsubscribe(self).await
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("id", &self.request_id)
            .field("engine_handle", &self.handle)
            .field("active", &self.is_active())
            .finish()
    }
}

/// Subscribes to a collection, invoking `on_item` for every streamed row.
///
/// Returns once the engine has accepted the subscription. Fails with
/// `Engine` if the engine rejects it (e.g. a malformed filter).
///
/// Dropping the returned future before that stops local delivery at once;
/// the engine side is unsubscribed in the background when its
/// acknowledgement arrives.
pub async fn subscribe<T, F>(
    context: &Context,
    query: &ParamsOfSubscribeCollection,
    on_item: F,
) -> Result<SubscriptionHandle>
where
    T: DeserializeOwned + Send + 'static,
    F: FnMut(T) + Send + 'static,
{
    let params_json = tonrpc::encode_params(query)?;
    let request_id = context.next_request_id();
    let (err_tx, errors) = mpsc::unbounded_channel();

    let mut on_item = on_item;
    let collection = query.collection.clone();
    let sink: ItemSink = Box::new(move |payload: &str| {
        match tonrpc::decode_payload::<ResultOfSubscription<T>>(payload) {
            Ok(item) => on_item(item.result),
            Err(e) => {
                warn!(request_id, collection = %collection, error = %e, "undecodable subscription item");
                let _ = err_tx.send(Error::from(e));
            }
        }
    });

    let (slot, ack) = StreamSlot::new(sink);
    context.submit(
        Request::new(request_id, SUBSCRIBE_COLLECTION, params_json),
        Route::Stream(slot.clone()),
    )?;

    let mut pending = PendingSubscription { context, request_id, slot: slot.clone(), ack: Some(ack) };
    let response = pending.acknowledged().await?;
    let started: ResultOfSubscribeCollection = match dispatch::decode_outcome(response) {
        Ok(started) => started,
        Err(e) => {
            context.forget(request_id);
            return Err(e);
        }
    };

    debug!(request_id, handle = started.handle, collection = %query.collection, "subscribed");

    Ok(SubscriptionHandle {
        request_id,
        handle: started.handle,
        context: context.clone(),
        slot,
        errors,
    })
}

/// Guard over a submitted subscription whose acknowledgement has not been
/// read yet.
struct PendingSubscription<'a> {
    context: &'a Context,
    request_id: u32,
    slot: Arc<StreamSlot>,
    ack: Option<oneshot::Receiver<Response>>,
}

impl PendingSubscription<'_> {
    async fn acknowledged(&mut self) -> Result<Response> {
        let ack = self.ack.as_mut().ok_or(Error::ChannelClosed)?;
        let response = ack.await.map_err(|_| Error::ChannelClosed);
        self.ack = None;
        response
    }
}

impl Drop for PendingSubscription<'_> {
    fn drop(&mut self) {
        let Some(ack) = self.ack.take() else {
            return;
        };
        self.slot.cancel();

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                runtime.spawn(release(self.context.downgrade(), self.request_id, ack));
            }
            Err(_) => self.context.forget(self.request_id),
        }
    }
}

/// Unsubscribes an abandoned subscription once the engine acknowledges it.
async fn release(context: WeakContext, request_id: u32, ack: oneshot::Receiver<Response>) {
    // Rejected, or the stream or context ended first.
    let Ok(response) = ack.await else {
        return;
    };
    let Some(context) = context.upgrade() else {
        return;
    };
    let started: ResultOfSubscribeCollection = match dispatch::decode_outcome(response) {
        Ok(started) => started,
        Err(_) => {
            context.forget(request_id);
            return;
        }
    };

    debug!(request_id, handle = started.handle, "releasing abandoned subscription");
    match dispatch::call::<_, Value>(&context, UNSUBSCRIBE, &started).await {
        Ok(_) => context.forget(request_id),
        Err(e) => warn!(request_id, handle = started.handle, error = %e, "abandoned subscription teardown failed"),
    }
}

/// Cancels a subscription.
///
/// No handler invocation happens after this returns. The correlation id is
/// released once the engine confirms the teardown.
pub async fn unsubscribe(handle: &SubscriptionHandle) -> Result<()> {
    if !handle.slot.cancel() {
        return Ok(());
    }

    if handle.context.is_destroyed() {
        // The context took every subscription down with it.
        return Ok(());
    }

    let params = ResultOfSubscribeCollection { handle: handle.handle };
    let result: Result<Value> = dispatch::call(&handle.context, UNSUBSCRIBE, &params).await;

    match result {
        Ok(_) => {
            handle.context.forget(handle.request_id);
            debug!(request_id = handle.request_id, handle = handle.handle, "unsubscribed");
            Ok(())
        }
        Err(Error::ContextDestroyed) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Waits for the first row matching the query.
///
/// Subscribes, takes the first item, then unsubscribes. Exactly one of
/// {item, `Timeout`, engine failure} is returned.
pub async fn wait_for_collection<T>(
    context: &Context,
    query: &ParamsOfWaitForCollection,
    timeout: Duration,
) -> Result<T>
where
    T: DeserializeOwned + Send + 'static,
{
    let deadline = Instant::now() + timeout;
    let (tx, rx) = oneshot::channel();
    let mut first = Some(tx);

    let params = ParamsOfSubscribeCollection {
        collection: query.collection.clone(),
        filter: query.filter.clone(),
        result: query.result.clone(),
    };

    let started = tokio::time::timeout_at(
        deadline,
        subscribe(context, &params, move |item: T| {
            if let Some(tx) = first.take() {
                let _ = tx.send(item);
            }
        }),
    )
    .await;

    let handle = match started {
        Ok(handle) => handle?,
        Err(_) => return Err(Error::Timeout(timeout)),
    };

    let outcome = tokio::time::timeout_at(deadline, rx).await;

    if let Err(e) = unsubscribe(&handle).await {
        warn!(request_id = handle.id(), error = %e, "wait_for_collection teardown failed");
    }

    match outcome {
        Ok(Ok(item)) => Ok(item),
        // The engine ended the stream without a matching row.
        Ok(Err(_)) => Err(Error::ChannelClosed),
        Err(_) => Err(Error::Timeout(timeout)),
    }
}
