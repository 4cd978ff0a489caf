//! # Collection Query Facade
//!
//! `query`, `wait_for_collection` and `subscribe`, written once for every
//! typed collection. A collection only contributes its name, its row type `T`
//! and its filter type `F`; dispatch and correlation stay in the net module.

use std::marker::PhantomData;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::Error;
use crate::error::Result;
use crate::net::NetModule;
use crate::net::OrderBy;
use crate::net::ParamsOfQueryCollection;
use crate::net::ParamsOfSubscribeCollection;
use crate::net::ParamsOfWaitForCollection;
use crate::subscription::SubscriptionHandle;

/// A typed view over one named ledger collection.
pub struct Collection<T, F> {
    net: NetModule,
    name: &'static str,
    _marker: PhantomData<fn() -> (T, F)>,
}

impl<T, F> Clone for Collection<T, F> {
    fn clone(&self) -> Self {
        Self {
            net: self.net.clone(),
            name: self.name,
            _marker: PhantomData,
        }
    }
}

impl<T, F> Collection<T, F>
where
    T: DeserializeOwned + Send + 'static,
    F: Serialize,
{
    pub(crate) fn new(net: NetModule, name: &'static str) -> Self {
        Self { net, name, _marker: PhantomData }
    }

    pub fn name(&self) -> &str {
        self.name
    }

    /// Returns the rows matching `filter` at call time.
    pub async fn query(
        &self,
        filter: &F,
        result: &str,
        order: Option<Vec<OrderBy>>,
        limit: Option<u32>,
    ) -> Result<Vec<T>> {
        let params = ParamsOfQueryCollection {
            collection: self.name.to_string(),
            filter: Some(to_filter(filter)?),
            result: result.to_string(),
            order,
            limit,
        };
        Ok(self.net.query_collection_as::<T>(&params).await?.result)
    }

    /// Returns the first row matching `filter`, waiting at most `timeout`
    /// (or the client's `wait_for_timeout`).
    pub async fn wait_for_collection(
        &self,
        filter: Option<&F>,
        result: &str,
        timeout: Option<Duration>,
    ) -> Result<T> {
        let params = ParamsOfWaitForCollection {
            collection: self.name.to_string(),
            filter: filter.map(to_filter).transpose()?,
            result: result.to_string(),
            timeout: None,
        };
        self.net.wait_for_collection_within(&params, timeout).await
    }

    /// Streams every matching row into `on_item` until unsubscribed.
    pub async fn subscribe(
        &self,
        filter: &F,
        result: &str,
        on_item: impl FnMut(T) + Send + 'static,
    ) -> Result<SubscriptionHandle> {
        let params = ParamsOfSubscribeCollection {
            collection: self.name.to_string(),
            filter: Some(to_filter(filter)?),
            result: result.to_string(),
        };
        self.net.subscribe_collection_as(&params, on_item).await
    }
}

fn to_filter<F: Serialize>(filter: &F) -> Result<Value> {
    serde_json::to_value(filter).map_err(|e| Error::Serialization(e.to_string()))
}
