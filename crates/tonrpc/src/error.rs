//! # Error Definitions
//!
//! Failures of the wire layer itself, and the failure document an engine
//! sends back when it rejects a request.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// Operational failures within the wire mechanism itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RpcError {
    /// A value could not be turned into JSON text.
    Encode(String),
    /// JSON text did not match the expected shape.
    Decode(String),
}

impl std::fmt::Display for RpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Encode(msg) => write!(f, "Encode error: {}", msg),
            Self::Decode(msg) => write!(f, "Decode error: {}", msg),
        }
    }
}

impl std::error::Error for RpcError {}

/// A specialized Result type for wire operations.
pub type Result<T> = std::result::Result<T, RpcError>;

/// The payload of an `Error` response.
///
/// These are distinct from `RpcError`; these represent the *engine* refusing
/// or failing a request, whereas `RpcError` represents the wire failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineFailure {
    pub code: u32,
    pub message: String,
    #[serde(default)]
    pub data: Value,
}

impl EngineFailure {
    pub fn new(code: u32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: Value::Null,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }
}

impl std::fmt::Display for EngineFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}
