use alloy::primitives::TxHash;
use thiserror::Error;

use crate::typed_data::EncodeError;

/// Errors returned by order submission operations.
#[derive(Debug, Error)]
pub enum OrderError {
    #[error("config error: {0}")]
    ConfigError(String),

    #[error("encoding error: {0}")]
    EncodingError(#[from] EncodeError),

    #[error("chain error: {0}")]
    ChainError(String),

    #[error("signature error: {0}")]
    SignatureError(String),

    #[error("invalid order: {0}")]
    InvalidOrder(String),

    #[error("transaction {0} failed")]
    TransactionFailed(TxHash),

    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}
