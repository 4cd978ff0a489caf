//! # Client Configuration
//!
//! Serialized to JSON and handed to the engine when the context starts.
//! Only `network.wait_for_timeout` is interpreted on this side of the boundary.

use std::time::Duration;

use serde::Deserialize;
use serde::Serialize;

use crate::error::Error;
use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub network: NetworkConfig,
    pub crypto: CryptoConfig,
    pub abi: AbiConfig,
}

impl ClientConfig {
    /// Default configuration pointed at one server.
    pub fn with_server(address: impl Into<String>) -> Self {
        let mut config = Self::default();
        config.network.server_address = Some(address.into());
        config
    }

    /// Reads a configuration document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::EngineInit(format!("Invalid config: {}", e)))
    }

    /// Default timeout for `wait_for_collection`.
    pub fn wait_for_timeout(&self) -> Duration {
        Duration::from_millis(u64::from(self.network.wait_for_timeout))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub server_address: Option<String>,
    pub endpoints: Option<Vec<String>>,
    pub network_retries_count: i8,
    pub message_retries_count: i8,
    /// Milliseconds.
    pub message_processing_timeout: u32,
    /// Milliseconds.
    pub wait_for_timeout: u32,
    /// Milliseconds.
    pub out_of_sync_threshold: u32,
    pub access_key: Option<String>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            server_address: None,
            endpoints: None,
            network_retries_count: 5,
            message_retries_count: 5,
            message_processing_timeout: 40_000,
            wait_for_timeout: 40_000,
            out_of_sync_threshold: 15_000,
            access_key: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    pub mnemonic_dictionary: u8,
    pub mnemonic_word_count: u8,
    pub hdkey_derivation_path: String,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        Self {
            mnemonic_dictionary: 1,
            mnemonic_word_count: 12,
            hdkey_derivation_path: "m/44'/396'/0'/0/0".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbiConfig {
    pub workchain: i32,
    /// Milliseconds.
    pub message_expiration_timeout: u32,
    pub message_expiration_timeout_grow_factor: f32,
}

impl Default for AbiConfig {
    fn default() -> Self {
        Self {
            workchain: 0,
            message_expiration_timeout: 40_000,
            message_expiration_timeout_grow_factor: 1.5,
        }
    }
}
