//! The `transactions` collection.

use serde::Deserialize;
use serde::Serialize;

use crate::net::BooleanFilterInput;
use crate::net::Collection;
use crate::net::IntFilterInput;
use crate::net::StringFilterInput;

pub const COLLECTION: &str = "transactions";

pub type Transactions = Collection<Transaction, TransactionFilterInput>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transaction {
    pub id: String,
    pub tr_type: Option<u8>,
    pub status: Option<u8>,
    pub account_addr: Option<String>,
    pub lt: Option<String>,
    pub now: Option<u64>,
    pub aborted: Option<bool>,
    pub in_msg: Option<String>,
    pub out_msgs: Option<Vec<String>>,
    /// Hex encoded nanotokens.
    pub total_fees: Option<String>,
    pub balance_delta: Option<String>,
    pub boc: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionFilterInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<StringFilterInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account_addr: Option<StringFilterInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_msg: Option<StringFilterInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub now: Option<IntFilterInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<BooleanFilterInput>,
    #[serde(rename = "OR", skip_serializing_if = "Option::is_none")]
    pub or: Option<Box<TransactionFilterInput>>,
}

impl TransactionFilterInput {
    pub fn for_account(address: impl Into<String>) -> Self {
        Self { account_addr: Some(StringFilterInput::eq(address.into())), ..Self::default() }
    }

    /// Matches the transaction that processed the given inbound message.
    pub fn for_message(message_id: impl Into<String>) -> Self {
        Self { in_msg: Some(StringFilterInput::eq(message_id.into())), ..Self::default() }
    }
}
