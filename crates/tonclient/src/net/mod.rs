//! # Net Module
//!
//! Raw collection access (`query_collection`, `wait_for_collection`,
//! `subscribe_collection`, `unsubscribe`) and the typed collections built on
//! top of it.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::client::TonClient;
use crate::error::Result;
use crate::subscription;
use crate::subscription::SubscriptionHandle;

pub mod accounts;
pub mod collection;
pub mod filter;
pub mod messages;
pub mod query;
pub mod transactions;

pub use accounts::Account;
pub use accounts::AccountFilterInput;
pub use accounts::AccountType;
pub use accounts::Accounts;
pub use collection::Collection;
pub use filter::BooleanFilterInput;
pub use filter::FloatFilterInput;
pub use filter::IntFilterInput;
pub use filter::StringFilterInput;
pub use messages::Message;
pub use messages::MessageFilterInput;
pub use messages::MessageType;
pub use messages::Messages;
pub use query::OrderBy;
pub use query::ParamsOfQueryCollection;
pub use query::ParamsOfSubscribeCollection;
pub use query::ParamsOfWaitForCollection;
pub use query::ResultOfQueryCollection;
pub use query::ResultOfSubscribeCollection;
pub use query::ResultOfSubscription;
pub use query::ResultOfWaitForCollection;
pub use query::SortDirection;
pub use transactions::Transaction;
pub use transactions::TransactionFilterInput;
pub use transactions::Transactions;

pub const QUERY_COLLECTION: &str = "net.query_collection";

#[derive(Clone)]
pub struct NetModule {
    client: TonClient,
}

impl NetModule {
    pub(crate) fn new(client: TonClient) -> Self {
        Self { client }
    }

    pub async fn query_collection(&self, params: &ParamsOfQueryCollection) -> Result<ResultOfQueryCollection> {
        self.query_collection_as(params).await
    }

    pub async fn query_collection_as<T: DeserializeOwned>(
        &self,
        params: &ParamsOfQueryCollection,
    ) -> Result<ResultOfQueryCollection<T>> {
        self.client.request(QUERY_COLLECTION, params).await
    }

    pub async fn wait_for_collection(&self, params: &ParamsOfWaitForCollection) -> Result<ResultOfWaitForCollection> {
        self.wait_for_collection_as(params).await
    }

    pub async fn wait_for_collection_as<T>(
        &self,
        params: &ParamsOfWaitForCollection,
    ) -> Result<ResultOfWaitForCollection<T>>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let timeout = params.timeout.map(|ms| Duration::from_millis(u64::from(ms)));
        let result = self.wait_for_collection_within(params, timeout).await?;
        Ok(ResultOfWaitForCollection { result })
    }

    /// Waits with an exact `timeout`, or the client's `wait_for_timeout`.
    pub(crate) async fn wait_for_collection_within<T>(
        &self,
        params: &ParamsOfWaitForCollection,
        timeout: Option<Duration>,
    ) -> Result<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let timeout = timeout.unwrap_or_else(|| self.client.config().wait_for_timeout());
        let context = self.client.context().await?;
        subscription::wait_for_collection(&context, params, timeout).await
    }

    pub async fn subscribe_collection(
        &self,
        params: &ParamsOfSubscribeCollection,
        on_item: impl FnMut(Value) + Send + 'static,
    ) -> Result<SubscriptionHandle> {
        self.subscribe_collection_as(params, on_item).await
    }

    pub async fn subscribe_collection_as<T>(
        &self,
        params: &ParamsOfSubscribeCollection,
        on_item: impl FnMut(T) + Send + 'static,
    ) -> Result<SubscriptionHandle>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let context = self.client.context().await?;
        subscription::subscribe(&context, params, on_item).await
    }

    /// Cancels a subscription. Idempotent.
    pub async fn unsubscribe(&self, handle: &SubscriptionHandle) -> Result<()> {
        subscription::unsubscribe(handle).await
    }

    pub fn accounts(&self) -> Accounts {
        Collection::new(self.clone(), accounts::COLLECTION)
    }

    pub fn messages(&self) -> Messages {
        Collection::new(self.clone(), messages::COLLECTION)
    }

    pub fn transactions(&self) -> Transactions {
        Collection::new(self.clone(), transactions::COLLECTION)
    }
}
