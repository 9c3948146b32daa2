use std::collections::BTreeMap;
use std::path::Path;

use alloy::primitives::Address;
use serde::Deserialize;

use crate::constants::DEFAULT_NETWORK_KEY;
use crate::OrderError;

/// A contract release file: ABI plus per-chain deployment addresses.
///
/// ```json
/// { "abi": [...], "networkAddresses": { "11155111": "0x...", "default": "0x..." } }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Deployment {
    #[serde(default)]
    pub abi: serde_json::Value,
    pub network_addresses: BTreeMap<String, Address>,
}

impl Deployment {
    /// Read and parse a release file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, OrderError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            OrderError::ConfigError(format!("cannot read deployment {}: {e}", path.display()))
        })?;
        Self::from_json(&raw).map_err(|e| {
            OrderError::ConfigError(format!("invalid deployment {}: {e}", path.display()))
        })
    }

    pub fn from_json(raw: &str) -> Result<Self, OrderError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Address deployed on `chain_id`, falling back to the `default` entry.
    pub fn address_for(&self, chain_id: u64) -> Result<Address, OrderError> {
        self.network_addresses
            .get(&chain_id.to_string())
            .or_else(|| self.network_addresses.get(DEFAULT_NETWORK_KEY))
            .copied()
            .ok_or_else(|| {
                OrderError::ConfigError(format!(
                    "no contract address for chain {chain_id} and no default"
                ))
            })
    }
}
