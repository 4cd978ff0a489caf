//! # Client Errors
//!
//! Every public operation returns one of these. Callers never see a raw
//! engine payload.

use std::time::Duration;

use serde_json::Value;
use tonrpc::EngineFailure;
use tonrpc::RpcError;

use crate::engine;

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// The engine context could not be started. Fatal to the client.
    EngineInit(String),
    /// Call parameters could not be serialized.
    Serialization(String),
    /// The engine rejected the request or reported a failure.
    Engine { code: u32, message: String, data: Value },
    /// An engine payload did not match the expected type.
    Deserialization(String),
    /// No item arrived within the wait window.
    Timeout(Duration),
    /// The method name was empty.
    InvalidMethod,
    /// The context was destroyed, or destroy was called twice.
    ContextDestroyed,
    /// The engine dropped the request without answering it.
    ChannelClosed,
}

impl Error {
    /// Returns the engine error code for `Engine` failures.
    pub fn code(&self) -> Option<u32> {
        match self {
            Self::Engine { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EngineInit(msg) => write!(f, "Engine init error: {}", msg),
            Self::Serialization(msg) => write!(f, "Serialization error: {}", msg),
            Self::Engine { code, message, .. } => write!(f, "Engine error [{}]: {}", code, message),
            Self::Deserialization(msg) => write!(f, "Deserialization error: {}", msg),
            Self::Timeout(after) => write!(f, "Timed out after {:?}", after),
            Self::InvalidMethod => write!(f, "Method name must not be empty"),
            Self::ContextDestroyed => write!(f, "Engine context already destroyed"),
            Self::ChannelClosed => write!(f, "Response channel closed"),
        }
    }
}

impl std::error::Error for Error {}

impl From<EngineFailure> for Error {
    fn from(failure: EngineFailure) -> Self {
        Self::Engine {
            code: failure.code,
            message: failure.message,
            data: failure.data,
        }
    }
}

impl From<RpcError> for Error {
    fn from(e: RpcError) -> Self {
        match e {
            RpcError::Encode(msg) => Self::Serialization(msg),
            RpcError::Decode(msg) => Self::Deserialization(msg),
        }
    }
}

impl From<engine::Error> for Error {
    fn from(e: engine::Error) -> Self {
        match e {
            engine::Error::Init(msg) => Self::EngineInit(msg),
            engine::Error::UnknownContext(_) => Self::ContextDestroyed,
            engine::Error::Unavailable(_) => Self::ChannelClosed,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
