//! # tonclient
//!
//! A typed client over a ledger execution engine.
//!
//! ## Architecture
//!
//! - **Engine**: the opaque native engine behind the `Engine` trait
//! - **Context**: one engine context, its lifecycle and its response pump
//! - **dispatch**: typed single-shot calls (`call<P, R>`)
//! - **subscription**: streaming subscriptions and `wait_for_collection`
//! - **net / abi**: typed modules built on the two above
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tonclient::{ClientConfig, TonClient};
//! use tonclient::mock::MockEngine;
//!
//! # async fn example() -> tonclient::Result<()> {
//! let client = TonClient::new(Arc::new(MockEngine::new()), ClientConfig::default());
//! let account = client.net().accounts().get_account("0:abc").await?;
//! client.destroy()?;
//! # Ok(())
//! # }
//! ```

pub mod abi;
pub mod client;
pub mod config;
pub mod context;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod mock;
pub mod net;
pub mod subscription;
pub mod utils;

pub use client::TonClient;
pub use config::ClientConfig;
pub use context::Context;
pub use engine::ContextId;
pub use engine::Engine;
pub use engine::ResponseSink;
pub use error::Error;
pub use error::Result;
pub use subscription::SubscriptionHandle;

#[cfg(test)]
mod tests;
