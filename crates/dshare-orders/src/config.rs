//! Runtime configuration read from the environment (after `.env` is loaded).
//!
//! | Variable            | Required | Meaning                                        |
//! |---------------------|----------|------------------------------------------------|
//! | `RPC_URL`           | yes      | JSON-RPC endpoint                              |
//! | `PRIVATE_KEY`       | one of   | hex signing key                                |
//! | `MNEMONIC`          | one of   | BIP-39 phrase, account `m/44'/60'/0'/0/0`      |
//! | `DEPLOYMENT_PATH`   | no       | order processor release file                   |
//! | `PROCESSOR_ADDRESS` | no       | overrides the release file lookup              |
//! | `GAS_LIMIT`         | no       | fixed gas limit for the order transaction      |
//! | `ORDER_MODE`        | no       | `permit` (default) or `approve`                |
//! | `DRY_RUN`           | no       | `true` to sign and print without sending       |
//! | `ASSET_TOKEN`       | orders   | dShare token address                           |
//! | `PAYMENT_TOKEN`     | orders   | payment token address                          |
//! | `ORDER_AMOUNT`      | orders   | amount in token base units                     |
//! | `ORDER_SELL`        | no       | `true` for sell orders                         |
//! | `ORDER_TYPE`        | no       | `market` (default) or `limit`                  |
//! | `ORDER_PRICE`       | no       | limit price, default 0                         |
//! | `ORDER_TIF`         | no       | `day`, `gtc` (default), `ioc`, `fok`           |
//! | `ORDER_ID`          | cancels  | order to cancel                                |
//! | `USER_ACCOUNT`      | no       | fill listener: only report this requester      |

use std::path::{Path, PathBuf};

use alloy::primitives::{Address, U256};
use alloy::providers::Provider;
use alloy::signers::local::{coins_bip39::English, MnemonicBuilder, PrivateKeySigner};

use crate::chain;
use crate::constants::{DEFAULT_DEPLOYMENT_PATH, MNEMONIC_ACCOUNT_INDEX};
use crate::deployment::Deployment;
use crate::order::{OrderRequest, OrderType, TimeInForce};
use crate::OrderError;

/// Where the signing key comes from.
#[derive(Clone)]
pub enum SignerSource {
    PrivateKey(String),
    Mnemonic(String),
}

impl std::fmt::Debug for SignerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material.
        match self {
            Self::PrivateKey(_) => f.write_str("PrivateKey(..)"),
            Self::Mnemonic(_) => f.write_str("Mnemonic(..)"),
        }
    }
}

impl SignerSource {
    pub fn signer(&self) -> Result<PrivateKeySigner, OrderError> {
        match self {
            Self::PrivateKey(key) => key
                .trim()
                .parse()
                .map_err(|e| OrderError::ConfigError(format!("invalid PRIVATE_KEY: {e}"))),
            Self::Mnemonic(phrase) => MnemonicBuilder::<English>::default()
                .phrase(phrase.trim())
                .index(MNEMONIC_ACCOUNT_INDEX)
                .and_then(|builder| builder.build())
                .map_err(|e| OrderError::ConfigError(format!("invalid MNEMONIC: {e}"))),
        }
    }
}

/// How the processor is allowed to pull the order's tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderMode {
    /// Signed EIP-2612 permit inside one `multicall`.
    #[default]
    Permit,
    /// Separate `approve` transaction, then `requestOrder`.
    Approve,
}

impl std::str::FromStr for OrderMode {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "permit" => Ok(Self::Permit),
            "approve" => Ok(Self::Approve),
            other => Err(OrderError::ConfigError(format!(
                "invalid ORDER_MODE {other:?}, expected permit or approve"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub rpc_url: String,
    pub signer: SignerSource,
    pub deployment_path: PathBuf,
    pub processor: Option<Address>,
    pub gas_limit: Option<u64>,
    pub mode: OrderMode,
    pub dry_run: bool,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, OrderError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, OrderError> {
        let rpc_url = required(&lookup, "RPC_URL")?;

        let signer = match (optional(&lookup, "PRIVATE_KEY"), optional(&lookup, "MNEMONIC")) {
            (Some(key), _) => SignerSource::PrivateKey(key),
            (None, Some(phrase)) => SignerSource::Mnemonic(phrase),
            (None, None) => {
                return Err(OrderError::ConfigError(
                    "PRIVATE_KEY or MNEMONIC is required".to_string(),
                ))
            }
        };

        let (deployment_path, processor) = processor_source(&lookup)?;

        let gas_limit = optional(&lookup, "GAS_LIMIT")
            .map(|v| {
                v.parse::<u64>()
                    .map_err(|e| OrderError::ConfigError(format!("invalid GAS_LIMIT: {e}")))
            })
            .transpose()?;

        let mode = match optional(&lookup, "ORDER_MODE") {
            Some(v) => v.parse::<OrderMode>()?,
            None => OrderMode::default(),
        };
        let dry_run = parse_flag(&lookup, "DRY_RUN")?;

        Ok(Self {
            rpc_url,
            signer,
            deployment_path,
            processor,
            gas_limit,
            mode,
            dry_run,
        })
    }

    /// `PROCESSOR_ADDRESS` if set, else the deployment file entry for the
    /// provider's chain.
    pub async fn processor_address<P: Provider>(
        &self,
        provider: &P,
    ) -> Result<Address, OrderError> {
        resolve_processor(self.processor, &self.deployment_path, provider).await
    }
}

/// Settings for the `OrderFill` listener. Needs no signing key.
#[derive(Debug, Clone)]
pub struct ListenConfig {
    pub rpc_url: String,
    pub deployment_path: PathBuf,
    pub processor: Option<Address>,
    pub user_account: Option<Address>,
}

impl ListenConfig {
    pub fn from_env() -> Result<Self, OrderError> {
        Self::from_lookup(env_lookup)
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, OrderError> {
        let rpc_url = required(&lookup, "RPC_URL")?;
        let (deployment_path, processor) = processor_source(&lookup)?;
        let user_account = optional(&lookup, "USER_ACCOUNT")
            .map(|v| parse_address("USER_ACCOUNT", &v))
            .transpose()?;

        Ok(Self {
            rpc_url,
            deployment_path,
            processor,
            user_account,
        })
    }

    pub async fn processor_address<P: Provider>(
        &self,
        provider: &P,
    ) -> Result<Address, OrderError> {
        resolve_processor(self.processor, &self.deployment_path, provider).await
    }
}

fn processor_source(
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<(PathBuf, Option<Address>), OrderError> {
    let deployment_path = optional(lookup, "DEPLOYMENT_PATH")
        .unwrap_or_else(|| DEFAULT_DEPLOYMENT_PATH.to_string())
        .into();
    let processor = optional(lookup, "PROCESSOR_ADDRESS")
        .map(|v| parse_address("PROCESSOR_ADDRESS", &v))
        .transpose()?;
    Ok((deployment_path, processor))
}

async fn resolve_processor<P: Provider>(
    processor: Option<Address>,
    deployment_path: &Path,
    provider: &P,
) -> Result<Address, OrderError> {
    if let Some(address) = processor {
        return Ok(address);
    }
    let chain_id = chain::chain_id(provider).await?;
    let address = Deployment::load(deployment_path)?.address_for(chain_id)?;
    tracing::debug!(
        %chain_id,
        %address,
        path = %deployment_path.display(),
        "processor from deployment"
    );
    Ok(address)
}

/// Read the order to submit from the process environment.
pub fn order_request_from_env() -> Result<OrderRequest, OrderError> {
    order_request_from_lookup(env_lookup)
}

pub fn order_request_from_lookup(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<OrderRequest, OrderError> {
    let asset_token = parse_address("ASSET_TOKEN", &required(&lookup, "ASSET_TOKEN")?)?;
    let payment_token = parse_address("PAYMENT_TOKEN", &required(&lookup, "PAYMENT_TOKEN")?)?;
    let amount = parse_u256("ORDER_AMOUNT", &required(&lookup, "ORDER_AMOUNT")?)?;

    let sell = parse_flag(&lookup, "ORDER_SELL")?;
    let order_type = match optional(&lookup, "ORDER_TYPE") {
        Some(v) => v.parse::<OrderType>()?,
        None => OrderType::default(),
    };
    let price = match optional(&lookup, "ORDER_PRICE") {
        Some(v) => parse_u256("ORDER_PRICE", &v)?,
        None => U256::ZERO,
    };
    let tif = match optional(&lookup, "ORDER_TIF") {
        Some(v) => v.parse::<TimeInForce>()?,
        None => TimeInForce::default(),
    };

    if amount.is_zero() {
        return Err(OrderError::ConfigError("ORDER_AMOUNT must be non-zero".to_string()));
    }

    Ok(OrderRequest {
        asset_token,
        payment_token,
        sell,
        order_type,
        amount,
        price,
        tif,
    })
}

/// Read the order id to cancel from the process environment.
pub fn order_id_from_env() -> Result<U256, OrderError> {
    parse_u256("ORDER_ID", &required(&env_lookup, "ORDER_ID")?)
}

fn env_lookup(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key).filter(|v| !v.trim().is_empty())
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String, OrderError> {
    optional(lookup, key)
        .ok_or_else(|| OrderError::ConfigError(format!("{key} environment variable is required")))
}

fn parse_flag(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<bool, OrderError> {
    match optional(lookup, key) {
        Some(v) => v
            .trim()
            .to_ascii_lowercase()
            .parse::<bool>()
            .map_err(|e| OrderError::ConfigError(format!("invalid {key}: {e}"))),
        None => Ok(false),
    }
}

fn parse_address(key: &str, value: &str) -> Result<Address, OrderError> {
    value
        .trim()
        .parse()
        .map_err(|e| OrderError::ConfigError(format!("invalid {key}: {e}")))
}

fn parse_u256(key: &str, value: &str) -> Result<U256, OrderError> {
    value
        .trim()
        .parse()
        .map_err(|e| OrderError::ConfigError(format!("invalid {key}: {e}")))
}
