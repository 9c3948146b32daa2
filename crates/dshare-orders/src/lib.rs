//! dShare order submission with EIP-2612 permits.
//!
//! Requests buy and sell orders on a dShare order processor in a single
//! transaction: the requester signs an EIP-712 `Permit` for the token the
//! processor will pull, and the processor's `multicall` runs
//! `selfPermit` followed by `requestOrder`. Tokens without permit support
//! go through [`OrderClient::request_order_with_approval`] instead, and
//! [`chain::order_fills`] reports `OrderFill` events for a requester.
//!
//! # Layers
//!
//! - [`typed_data`]: generic EIP-712 type strings, type hashes and struct encoding
//! - [`eip712`]: the `EIP712Domain` / `Permit` pair, digest, signing and recovery
//! - [`processor`]: contract bindings and call-data builders
//! - [`chain`]: provider reads and transaction submission
//! - [`client`]: [`OrderClient`], the end-to-end request flow
//!
//! # Quick example
//!
//! ```no_run
//! use alloy::network::EthereumWallet;
//! use alloy::providers::ProviderBuilder;
//! use alloy::signers::local::PrivateKeySigner;
//! use dshare::{OrderClient, OrderRequest, OrderType, TimeInForce};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), dshare::OrderError> {
//! let signer: PrivateKeySigner = "0xYOUR_KEY".parse().unwrap();
//! let provider = ProviderBuilder::new()
//!     .wallet(EthereumWallet::from(signer.clone()))
//!     .connect_http("https://rpc.example.com".parse().unwrap());
//!
//! let client = OrderClient::new(provider, signer, "0xPROCESSOR".parse().unwrap());
//! let submitted = client
//!     .request_order(&OrderRequest {
//!         asset_token: "0xASSET".parse().unwrap(),
//!         payment_token: "0xUSDC".parse().unwrap(),
//!         sell: false,
//!         order_type: OrderType::Market,
//!         amount: alloy::primitives::U256::from(10_000_000u64),
//!         price: alloy::primitives::U256::ZERO,
//!         tif: TimeInForce::Gtc,
//!     })
//!     .await?;
//! println!("order ids: {:?}", submitted.order_ids);
//! # Ok(())
//! # }
//! ```

pub mod constants;
pub mod error;
pub mod typed_data;

pub mod eip712;
pub mod processor;

pub mod chain;
pub mod client;
pub mod config;
pub mod deployment;
pub mod order;

// Re-exports
pub use constants::*;
pub use error::OrderError;
pub use typed_data::EncodeError;

pub use client::{OrderClient, PreparedOrder, SubmittedOrder};
pub use config::{Config, ListenConfig, OrderMode, SignerSource};
pub use deployment::Deployment;
pub use eip712::{
    encode_signature_hex, recover_permit_signer, sign_digest, sign_permit, signing_hash,
    typed_data_hash, Domain, PermitMessage, PermitSignature,
};
pub use order::{check_order_precision, OrderRequest, OrderStatus, OrderType, TimeInForce};
pub use processor::Order;
