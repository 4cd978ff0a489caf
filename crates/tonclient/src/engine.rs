//! # Engine Abstraction
//!
//! A minimal interface to the native execution engine.
//!
//! ## Philosophy
//!
//! - **Opaque**: The engine knows nothing about typed params or results. It
//!   receives a method name and JSON text, and answers with JSON text.
//! - **Fire and forget**: `request` returns immediately. Answers arrive later on
//!   the `ResponseSink` handed in with the request, tagged with its request id.
//!   Single-shot results and streams are both built on top of this.

use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tonrpc::Request;
use tonrpc::Response;

/// Strong type for engine context identifiers.
#[derive(Copy, Clone, Debug, Hash, PartialEq, Eq)]
pub struct ContextId(pub u32);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "context-{}", self.0)
    }
}

/// What the response pump receives from the engine side.
pub(crate) enum SinkEvent {
    Response(Response),
    /// Every clone of the sink for this request id was dropped.
    Released(u32),
}

/// Where an engine delivers the responses for one request.
///
/// Clones share the request. Once the engine drops the last clone, a request
/// that is still waiting fails with `ChannelClosed` on the client side.
#[derive(Clone)]
pub struct ResponseSink {
    tx: mpsc::UnboundedSender<SinkEvent>,
    release: Arc<Release>,
}

struct Release {
    request_id: u32,
    tx: mpsc::UnboundedSender<SinkEvent>,
}

impl Drop for Release {
    fn drop(&mut self) {
        let _ = self.tx.send(SinkEvent::Released(self.request_id));
    }
}

impl ResponseSink {
    pub(crate) fn new(request_id: u32, tx: mpsc::UnboundedSender<SinkEvent>) -> Self {
        Self {
            tx: tx.clone(),
            release: Arc::new(Release { request_id, tx }),
        }
    }

    /// The request this sink was handed out with.
    pub fn request_id(&self) -> u32 {
        self.release.request_id
    }

    /// Delivers a response. Fails with `Unavailable` once the context is gone.
    pub fn send(&self, response: Response) -> Result<()> {
        self.tx
            .send(SinkEvent::Response(response))
            .map_err(|_| Error::Unavailable("context closed".to_string()))
    }
}

/// Errors raised by the engine boundary itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The engine refused the configuration or could not start.
    Init(String),
    /// The context id is unknown to the engine (never created or destroyed).
    UnknownContext(ContextId),
    /// The engine is gone and no longer accepts requests.
    Unavailable(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Init(msg) => write!(f, "Engine init failed: {}", msg),
            Self::UnknownContext(id) => write!(f, "Unknown engine context: {}", id),
            Self::Unavailable(msg) => write!(f, "Engine unavailable: {}", msg),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;

/// A native execution engine hosting one or more contexts.
///
/// This trait is designed to be object-safe (`Arc<dyn Engine>`).
#[async_trait::async_trait]
pub trait Engine: Send + Sync + 'static {
    /// Starts a new context from a JSON configuration document.
    async fn create_context(&self, config_json: &str) -> Result<ContextId>;

    /// Submits a request against a context.
    ///
    /// # invariants
    /// - Must not block waiting for the answer.
    /// - Every response for `request` must carry its `request_id` and go to `sink`.
    /// - The last response for a request must be marked `finished`.
    /// - Dropping every clone of `sink` before that fails the request.
    fn request(&self, context: ContextId, request: Request, sink: ResponseSink) -> Result<()>;

    /// Releases a context. Called at most once per context by this crate.
    fn destroy_context(&self, context: ContextId);
}
