//! # Client
//!
//! `TonClient` owns the engine context lifecycle: the context is created on
//! first use and destroyed exactly once, by `destroy` or when the last clone
//! of the client goes away. Modules (`abi`, `net`) borrow it through the
//! client and never tear it down themselves.

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::OnceCell;

use crate::abi::AbiModule;
use crate::config::ClientConfig;
use crate::context::Context;
use crate::dispatch;
use crate::engine::Engine;
use crate::error::Error;
use crate::error::Result;
use crate::net::NetModule;

#[derive(Clone)]
pub struct TonClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    engine: Arc<dyn Engine>,
    config: ClientConfig,
    context: OnceCell<Context>,
    destroyed: AtomicBool,
}

impl TonClient {
    pub fn new(engine: Arc<dyn Engine>, config: ClientConfig) -> Self {
        Self {
            inner: Arc::new(ClientInner {
                engine,
                config,
                context: OnceCell::new(),
                destroyed: AtomicBool::new(false),
            }),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Returns the engine context, starting it on first use.
    pub async fn context(&self) -> Result<Context> {
        if self.inner.destroyed.load(Ordering::Acquire) {
            return Err(Error::ContextDestroyed);
        }

        let context = self
            .inner
            .context
            .get_or_try_init(|| Context::create(self.inner.engine.clone(), &self.inner.config))
            .await?;

        // destroy raced the lazy start
        if self.inner.destroyed.load(Ordering::Acquire) {
            let _ = context.destroy();
            return Err(Error::ContextDestroyed);
        }
        if context.is_destroyed() {
            return Err(Error::ContextDestroyed);
        }
        Ok(context.clone())
    }

    /// Calls an engine method with typed params and result.
    pub async fn request<P, R>(&self, method: &str, params: &P) -> Result<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let context = self.context().await?;
        dispatch::call(&context, method, params).await
    }

    /// Destroys the engine context. Fails with `ContextDestroyed` when
    /// called a second time.
    pub fn destroy(&self) -> Result<()> {
        if self.inner.destroyed.swap(true, Ordering::AcqRel) {
            return Err(Error::ContextDestroyed);
        }
        match self.inner.context.get() {
            Some(context) => context.destroy(),
            // Never started; nothing to tear down.
            None => Ok(()),
        }
    }

    pub fn abi(&self) -> AbiModule {
        AbiModule::new(self.clone())
    }

    pub fn net(&self) -> NetModule {
        NetModule::new(self.clone())
    }
}
