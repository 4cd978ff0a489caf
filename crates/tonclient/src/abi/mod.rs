//! # ABI Module
//!
//! Message encoding and decoding according to a contract ABI. Each call is a
//! one-line binding onto the dispatcher; the engine does the work.

use crate::client::TonClient;
use crate::error::Result;

pub mod types;

pub use types::*;

#[derive(Clone)]
pub struct AbiModule {
    client: TonClient,
}

impl AbiModule {
    pub(crate) fn new(client: TonClient) -> Self {
        Self { client }
    }

    /// Encodes a deploy or function call message, signed or unsigned as
    /// `params.signer` says.
    pub async fn encode_message(&self, params: &ParamsOfEncodeMessage) -> Result<ResultOfEncodeMessage> {
        self.client.request("abi.encode_message", params).await
    }

    pub async fn encode_message_body(&self, params: &ParamsOfEncodeMessageBody) -> Result<ResultOfEncodeMessageBody> {
        self.client.request("abi.encode_message_body", params).await
    }

    pub async fn decode_message(&self, params: &ParamsOfDecodeMessage) -> Result<DecodedMessageBody> {
        self.client.request("abi.decode_message", params).await
    }

    pub async fn decode_message_body(&self, params: &ParamsOfDecodeMessageBody) -> Result<DecodedMessageBody> {
        self.client.request("abi.decode_message_body", params).await
    }

    /// Creates an account state BOC from code and data, or from a TVC.
    pub async fn encode_account(&self, params: &ParamsOfEncodeAccount) -> Result<ResultOfEncodeAccount> {
        self.client.request("abi.encode_account", params).await
    }

    /// Combines a hex `signature` with a base64 unsigned message.
    pub async fn attach_signature(&self, params: &ParamsOfAttachSignature) -> Result<ResultOfAttachSignature> {
        self.client.request("abi.attach_signature", params).await
    }

    pub async fn attach_signature_to_message_body(
        &self,
        params: &ParamsOfAttachSignatureToMessageBody,
    ) -> Result<ResultOfAttachSignatureToMessageBody> {
        self.client.request("abi.attach_signature_to_message_body", params).await
    }
}
