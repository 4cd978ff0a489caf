//! Collection query descriptors and their engine results.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortDirection {
    #[serde(rename = "ASC")]
    Asc,
    #[serde(rename = "DESC")]
    Desc,
}

/// One ordering clause: a field path and a direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub path: String,
    pub direction: SortDirection,
}

impl OrderBy {
    pub fn asc(path: impl Into<String>) -> Self {
        Self { path: path.into(), direction: SortDirection::Asc }
    }

    pub fn desc(path: impl Into<String>) -> Self {
        Self { path: path.into(), direction: SortDirection::Desc }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamsOfQueryCollection {
    pub collection: String,
    pub filter: Option<Value>,
    /// Space separated result fields, e.g. `"id balance"`.
    pub result: String,
    pub order: Option<Vec<OrderBy>>,
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultOfQueryCollection<T = Value> {
    pub result: Vec<T>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamsOfWaitForCollection {
    pub collection: String,
    pub filter: Option<Value>,
    pub result: String,
    /// Milliseconds; the client's `wait_for_timeout` applies when absent.
    pub timeout: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultOfWaitForCollection<T = Value> {
    pub result: T,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamsOfSubscribeCollection {
    pub collection: String,
    pub filter: Option<Value>,
    pub result: String,
}

/// The engine's acknowledgement of a subscription; also the
/// `net.unsubscribe` parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultOfSubscribeCollection {
    pub handle: u32,
}

/// Wire shape of one streamed item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultOfSubscription<T = Value> {
    pub result: T,
}
