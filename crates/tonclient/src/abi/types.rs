//! Parameter and result records for the `abi` module.

use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;

/// A contract ABI, given inline, as JSON text, or as an engine handle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum Abi {
    Contract(Value),
    Json(String),
    Handle(u32),
    Serialized(Value),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    pub public: String,
    pub secret: String,
}

/// How a message should (or should not) be signed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Signer {
    /// Unsigned message.
    None,
    /// Returns `data_to_sign` for later signing with `attach_signature`.
    External { public_key: String },
    /// Signs with the given keys.
    Keys { keys: KeyPair },
    /// Signs through an engine-side signing box.
    SigningBox { handle: u32 },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionHeader {
    pub expire: Option<u32>,
    pub time: Option<u64>,
    pub pubkey: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallSet {
    pub function_name: String,
    pub header: Option<FunctionHeader>,
    pub input: Option<Value>,
}

impl CallSet {
    pub fn new(function_name: impl Into<String>, input: Option<Value>) -> Self {
        Self { function_name: function_name.into(), header: None, input }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploySet {
    /// Base64 encoded TVC.
    pub tvc: String,
    pub workchain_id: Option<i32>,
    pub initial_data: Option<Value>,
    pub initial_pubkey: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamsOfEncodeMessage {
    pub abi: Abi,
    pub address: Option<String>,
    pub deploy_set: Option<DeploySet>,
    pub call_set: Option<CallSet>,
    pub signer: Signer,
    pub processing_try_index: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultOfEncodeMessage {
    pub message: String,
    pub data_to_sign: Option<String>,
    pub address: String,
    pub message_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamsOfEncodeMessageBody {
    pub abi: Abi,
    pub call_set: CallSet,
    pub is_internal: bool,
    pub signer: Signer,
    pub processing_try_index: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultOfEncodeMessageBody {
    pub body: String,
    pub data_to_sign: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamsOfDecodeMessage {
    pub abi: Abi,
    /// Base64 encoded message BOC.
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamsOfDecodeMessageBody {
    pub abi: Abi,
    pub body: String,
    pub is_internal: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageBodyType {
    Input,
    Output,
    InternalOutput,
    Event,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedMessageBody {
    pub body_type: MessageBodyType,
    pub name: String,
    pub value: Option<Value>,
    pub header: Option<FunctionHeader>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum MessageSource {
    Encoded { message: String, abi: Option<Abi> },
    EncodingParams(ParamsOfEncodeMessage),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateInitParams {
    pub abi: Abi,
    pub value: Value,
}

/// Where an account's initial state comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StateInitSource {
    Message { source: MessageSource },
    StateInit { code: String, data: String, library: Option<String> },
    Tvc { tvc: String, public_key: Option<String>, init_params: Option<StateInitParams> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamsOfEncodeAccount {
    pub state_init: StateInitSource,
    pub balance: Option<u64>,
    pub last_trans_lt: Option<u64>,
    pub last_paid: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultOfEncodeAccount {
    /// Base64 encoded account BOC.
    pub account: String,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamsOfAttachSignature {
    pub abi: Abi,
    pub public_key: String,
    pub message: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultOfAttachSignature {
    pub message: String,
    pub message_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamsOfAttachSignatureToMessageBody {
    pub abi: Abi,
    pub public_key: String,
    pub message: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultOfAttachSignatureToMessageBody {
    pub body: String,
}
