//! # tonrpc
//!
//! The wire layer between a ledger client and its execution engine.
//!
//! ## Architecture
//!
//! A call is a `Request` (request id, method name, JSON params). The engine
//! answers with one or more `Response`s for that id:
//!
//! - Call: `[request_id, function_name, params_json]`
//! - Response: `[request_id, params_json, response_type, finished]`
//!
//! Single-shot calls get exactly one `Success` or `Error`. Subscriptions get
//! a `Success` acknowledgement, then `Custom(100)` items, then a finishing
//! response once torn down.

pub mod codec;
pub mod error;
pub mod frame;

pub use codec::decode_failure;
pub use codec::decode_payload;
pub use codec::encode_params;
pub use error::EngineFailure;
pub use error::Result;
pub use error::RpcError;
pub use frame::Request;
pub use frame::Response;
pub use frame::ResponseType;
pub use frame::SUBSCRIPTION_ITEM;
