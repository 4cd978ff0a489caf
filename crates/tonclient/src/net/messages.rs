//! The `messages` collection.

use serde::Deserialize;
use serde::Serialize;

use crate::net::BooleanFilterInput;
use crate::net::Collection;
use crate::net::IntFilterInput;
use crate::net::StringFilterInput;

pub const COLLECTION: &str = "messages";

pub type Messages = Collection<Message, MessageFilterInput>;

/// Message kind, encoded on the wire as its ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum MessageType {
    Internal,
    ExtIn,
    ExtOut,
}

impl From<MessageType> for u8 {
    fn from(value: MessageType) -> Self {
        match value {
            MessageType::Internal => 0,
            MessageType::ExtIn => 1,
            MessageType::ExtOut => 2,
        }
    }
}

impl TryFrom<u8> for MessageType {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Internal),
            1 => Ok(Self::ExtIn),
            2 => Ok(Self::ExtOut),
            other => Err(format!("unknown message type {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Message {
    pub id: String,
    pub msg_type: Option<MessageType>,
    pub status: Option<u8>,
    pub src: Option<String>,
    pub dst: Option<String>,
    /// Hex encoded nanotokens.
    pub value: Option<String>,
    pub body: Option<String>,
    pub boc: Option<String>,
    pub created_lt: Option<String>,
    pub created_at: Option<u64>,
    pub bounce: Option<bool>,
    pub bounced: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageFilterInput {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<StringFilterInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub src: Option<StringFilterInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dst: Option<StringFilterInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg_type: Option<IntFilterInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<IntFilterInput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounced: Option<BooleanFilterInput>,
    #[serde(rename = "OR", skip_serializing_if = "Option::is_none")]
    pub or: Option<Box<MessageFilterInput>>,
}

impl MessageFilterInput {
    pub fn to_address(address: impl Into<String>) -> Self {
        Self { dst: Some(StringFilterInput::eq(address.into())), ..Self::default() }
    }

    pub fn from_address(address: impl Into<String>) -> Self {
        Self { src: Some(StringFilterInput::eq(address.into())), ..Self::default() }
    }

    pub fn or(mut self, other: MessageFilterInput) -> Self {
        self.or = Some(Box::new(other));
        self
    }
}
