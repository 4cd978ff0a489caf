//! # Request Dispatcher
//!
//! Turns a (method, typed params) pair into an engine request, suspends the
//! calling task until the pump routes back the answer, and decodes it into
//! the caller's result type.
//!
//! Errors are local to the one call: a failed call never affects the context
//! or other in-flight calls. Nothing is retried here.

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::oneshot;
use tonrpc::Request;
use tonrpc::Response;
use tonrpc::ResponseType;
use tracing::debug;

use crate::context::Context;
use crate::context::Route;
use crate::error::Error;
use crate::error::Result;

/// Calls `method` on the engine and decodes its result.
///
/// Fails with `Serialization` if `params` cannot be encoded, `Engine` if the
/// engine reports a failure, and `Deserialization` if the result does not fit
/// `R`.
pub async fn call<P, R>(context: &Context, method: &str, params: &P) -> Result<R>
where
    P: Serialize + ?Sized,
    R: DeserializeOwned,
{
    if method.is_empty() {
        return Err(Error::InvalidMethod);
    }

    let params_json = tonrpc::encode_params(params)?;
    let request_id = context.next_request_id();
    let (tx, rx) = oneshot::channel();

    context.submit(Request::new(request_id, method, params_json), Route::Call(tx))?;

    // Unregisters the route if this future is dropped before the answer.
    let pending = Pending::new(context, request_id);
    let response = rx.await.map_err(|_| Error::ChannelClosed)?;
    pending.settled();

    debug!(request_id, method, response_type = ?response.response_type, "call settled");
    decode_outcome(response)
}

/// Decodes a single-shot response into a typed outcome.
pub(crate) fn decode_outcome<R: DeserializeOwned>(response: Response) -> Result<R> {
    match response.response_type {
        ResponseType::Error => Err(tonrpc::decode_failure(&response.params_json).into()),
        _ => Ok(tonrpc::decode_payload(&response.params_json)?),
    }
}

/// Guard that forgets a request id unless the request settled.
struct Pending<'a> {
    context: &'a Context,
    request_id: u32,
    armed: bool,
}

impl<'a> Pending<'a> {
    fn new(context: &'a Context, request_id: u32) -> Self {
        Self { context, request_id, armed: true }
    }

    fn settled(mut self) {
        self.armed = false;
    }
}

impl Drop for Pending<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.context.forget(self.request_id);
        }
    }
}
