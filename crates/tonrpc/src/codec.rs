//! # Codec
//!
//! The translation layer between typed Rust values and the JSON text carried
//! in frames.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::EngineFailure;
use crate::error::Result;
use crate::error::RpcError;

/// Error code used when an engine failure document is itself unreadable.
pub const MALFORMED_FAILURE: u32 = 0;

/// Serializes call parameters into JSON text.
pub fn encode_params<P: Serialize + ?Sized>(params: &P) -> Result<String> {
    serde_json::to_string(params).map_err(|e| RpcError::Encode(e.to_string()))
}

/// Decodes a JSON payload into `T`.
///
/// An empty payload is read as `null`, so unit-like results (`()`, `Option`)
/// decode from `Nop`-style answers.
pub fn decode_payload<T: DeserializeOwned>(json: &str) -> Result<T> {
    let json = if json.trim().is_empty() { "null" } else { json };
    serde_json::from_str(json).map_err(|e| RpcError::Decode(e.to_string()))
}

/// Decodes an `Error` response payload.
///
/// Never fails: an unreadable document becomes a failure with code
/// `MALFORMED_FAILURE` whose message is the raw text.
pub fn decode_failure(json: &str) -> EngineFailure {
    match serde_json::from_str::<EngineFailure>(json) {
        Ok(failure) => failure,
        Err(_) => EngineFailure::new(MALFORMED_FAILURE, json),
    }
}
