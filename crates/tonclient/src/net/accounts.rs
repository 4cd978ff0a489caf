//! The `accounts` collection.

use serde::Deserialize;
use serde::Serialize;

use crate::error::Result;
use crate::net::Collection;
use crate::net::IntFilterInput;
use crate::net::StringFilterInput;
use crate::utils::Tokens;
use crate::utils::convert_hex_to_token;

pub const COLLECTION: &str = "accounts";

/// Fields fetched by `Accounts::get_account`.
pub const ACCOUNT_FIELDS: &str = "id acc_type boc code_hash data_hash balance last_paid";

pub type Accounts = Collection<Account, AccountFilterInput>;

/// Account status, encoded on the wire as its ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum AccountType {
    Uninitialized,
    Active,
    Frozen,
    NonExist,
}

impl From<AccountType> for u8 {
    fn from(value: AccountType) -> Self {
        match value {
            AccountType::Uninitialized => 0,
            AccountType::Active => 1,
            AccountType::Frozen => 2,
            AccountType::NonExist => 3,
        }
    }
}

impl TryFrom<u8> for AccountType {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Uninitialized),
            1 => Ok(Self::Active),
            2 => Ok(Self::Frozen),
            3 => Ok(Self::NonExist),
            other => Err(format!("unknown account type {}", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OtherCurrency {
    pub currency: u32,
    pub value: String,
}

/// One row of the `accounts` collection. Fields not requested stay at their
/// defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Account {
    pub id: String,
    pub acc_type: Option<AccountType>,
    pub last_paid: u64,
    pub due_payment: u64,
    pub last_trans_lt: u64,
    pub balance_other: Option<Vec<OtherCurrency>>,
    pub split_depth: Option<u32>,
    pub tick: Option<bool>,
    pub tock: Option<bool>,
    pub code: Option<String>,
    pub data: Option<String>,
    pub proof: Option<String>,
    pub boc: Option<String>,
    pub code_hash: Option<String>,
    pub data_hash: Option<String>,
    /// Hex encoded nanotokens, e.g. `"0x3b9aca00"`.
    pub balance: Option<String>,
}

impl Account {
    /// The balance as a token amount; zero when the field was not fetched.
    pub fn balance_tokens(&self) -> Result<Tokens> {
        convert_hex_to_token(self.balance.as_deref().unwrap_or("0x0"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountFilterInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<StringFilterInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub acc_type: Option<IntFilterInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_paid: Option<IntFilterInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub balance: Option<StringFilterInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_hash: Option<StringFilterInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_hash: Option<StringFilterInput>,
    #[serde(rename = "OR", skip_serializing_if = "Option::is_none")]
    pub or: Option<Box<AccountFilterInput>>,
}

impl AccountFilterInput {
    pub fn by_id(address: impl Into<String>) -> Self {
        Self { id: Some(StringFilterInput::eq(address.into())), ..Self::default() }
    }

    pub fn or(mut self, other: AccountFilterInput) -> Self {
        self.or = Some(Box::new(other));
        self
    }
}

impl Accounts {
    /// Fetches one account by address, or `None` if it does not exist.
    pub async fn get_account(&self, address: &str) -> Result<Option<Account>> {
        let filter = AccountFilterInput::by_id(address);
        let rows = self.query(&filter, ACCOUNT_FIELDS, None, Some(1)).await?;
        Ok(rows.into_iter().next())
    }
}
