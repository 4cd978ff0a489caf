//! # Protocol Frames
//!
//! Defines the envelope exchanged with an engine: one `Request` going in, one
//! or more `Response`s coming back under the same request id.
//!
//! ## Invariants
//! - Every request is answered by responses carrying its `request_id`.
//! - The last response for a request has `finished == true`.
//! - Payloads are JSON text; the frame never interprets them.

use serde::Serialize;
use serde_json::Value;

use crate::codec::encode_params;
use crate::error::EngineFailure;
use crate::error::Result;

/// Response type code reserved for streamed subscription items.
pub const SUBSCRIPTION_ITEM: u32 = 100;

/// An outbound call: a method name plus its JSON parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub request_id: u32,
    pub function_name: String,
    pub params_json: String,
}

impl Request {
    pub fn new(request_id: u32, function_name: impl Into<String>, params_json: impl Into<String>) -> Self {
        Self {
            request_id,
            function_name: function_name.into(),
            params_json: params_json.into(),
        }
    }

    /// Builds a request by serializing `params`.
    pub fn encode<P: Serialize>(request_id: u32, function_name: &str, params: &P) -> Result<Self> {
        let params_json = encode_params(params)?;
        Ok(Self::new(request_id, function_name, params_json))
    }
}

/// Kind of an inbound response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    /// The payload is the call result.
    Success,
    /// The payload is an `EngineFailure`.
    Error,
    /// No payload; used to close a stream.
    Nop,
    /// Application defined payload, e.g. a subscription item.
    Custom(u32),
}

impl ResponseType {
    pub fn code(self) -> u32 {
        match self {
            Self::Success => 0,
            Self::Error => 1,
            Self::Nop => 2,
            Self::Custom(code) => code,
        }
    }
}

/// An inbound response for a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub request_id: u32,
    pub params_json: String,
    pub response_type: ResponseType,
    pub finished: bool,
}

impl Response {
    pub fn new(request_id: u32, params_json: impl Into<String>, response_type: ResponseType, finished: bool) -> Self {
        Self {
            request_id,
            params_json: params_json.into(),
            response_type,
            finished,
        }
    }

    pub fn success(request_id: u32, result: &Value, finished: bool) -> Self {
        Self::new(request_id, result.to_string(), ResponseType::Success, finished)
    }

    pub fn error(request_id: u32, failure: &EngineFailure) -> Self {
        // An EngineFailure always serializes; fall back to a bare message if not.
        let json = serde_json::to_string(failure)
            .unwrap_or_else(|_| format!(r#"{{"code":{},"message":"{}"}}"#, failure.code, failure.message));
        Self::new(request_id, json, ResponseType::Error, true)
    }

    pub fn nop(request_id: u32, finished: bool) -> Self {
        Self::new(request_id, "", ResponseType::Nop, finished)
    }

    pub fn item(request_id: u32, item: &Value) -> Self {
        Self::new(request_id, item.to_string(), ResponseType::Custom(SUBSCRIPTION_ITEM), false)
    }
}
