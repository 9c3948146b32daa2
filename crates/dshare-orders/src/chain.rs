use std::future::Future;
use std::time::Duration;

use alloy::eips::BlockNumberOrTag;
use alloy::network::Ethereum;
use alloy::primitives::{Address, Bytes, TxHash, B256, U256};
use alloy::providers::{PendingTransactionBuilder, Provider};
use alloy::rpc::types::{Filter, Log, TransactionReceipt};
use alloy::sol_types::SolEvent;
use alloy::transports::RpcError;

use crate::constants::{
    DEFAULT_TOKEN_VERSION, PERMIT_DEADLINE_SECS, RECEIPT_POLL_INTERVAL_SECS, RECEIPT_TIMEOUT_SECS,
    SEND_TIMEOUT_SECS,
};
use crate::processor::{IERC20Permit, IOrderProcessor, Order};
use crate::OrderError;

/// True when the node answered the call with an error response (a revert)
/// or the target returned no data. Transport failures are not reverts.
fn is_revert(err: &alloy::contract::Error) -> bool {
    matches!(
        err,
        alloy::contract::Error::TransportError(RpcError::ErrorResp(_))
            | alloy::contract::Error::ZeroData(..)
    )
}

/// Query the chain id the provider is connected to.
pub async fn chain_id<P: Provider>(provider: &P) -> Result<u64, OrderError> {
    provider
        .get_chain_id()
        .await
        .map_err(|e| OrderError::ChainError(format!("chain id failed: {e}")))
}

/// Timestamp of the latest block, in unix seconds.
pub async fn block_timestamp<P: Provider>(provider: &P) -> Result<u64, OrderError> {
    let block = provider
        .get_block_by_number(BlockNumberOrTag::Latest)
        .await
        .map_err(|e| OrderError::ChainError(format!("latest block failed: {e}")))?
        .ok_or_else(|| OrderError::ChainError("latest block not found".to_string()))?;
    Ok(block.header.timestamp)
}

/// Permit deadline: latest block time plus [`PERMIT_DEADLINE_SECS`].
pub async fn permit_deadline<P: Provider>(provider: &P) -> Result<U256, OrderError> {
    deadline_after(block_timestamp(provider).await?)
}

pub fn deadline_after(block_time: u64) -> Result<U256, OrderError> {
    block_time
        .checked_add(PERMIT_DEADLINE_SECS)
        .map(U256::from)
        .ok_or_else(|| {
            OrderError::ChainError(format!("block timestamp {block_time} out of range"))
        })
}

/// Query the token's EIP-712 domain name.
pub async fn token_name<P: Provider>(provider: &P, token: Address) -> Result<String, OrderError> {
    let contract = IERC20Permit::new(token, provider);
    contract
        .name()
        .call()
        .await
        .map_err(|e| OrderError::ChainError(format!("name failed: {e}")))
}

/// Query the token's EIP-712 domain version. A token without `version()`
/// (the call reverts) gets [`DEFAULT_TOKEN_VERSION`]; RPC failures are
/// errors.
pub async fn token_version<P: Provider>(
    provider: &P,
    token: Address,
) -> Result<String, OrderError> {
    let contract = IERC20Permit::new(token, provider);
    match contract.version().call().await {
        Ok(version) => Ok(version),
        Err(e) if is_revert(&e) => {
            tracing::debug!(%token, error = %e, "version() unavailable, using default");
            Ok(DEFAULT_TOKEN_VERSION.to_string())
        }
        Err(e) => Err(OrderError::ChainError(format!("version failed: {e}"))),
    }
}

pub async fn token_decimals<P: Provider>(provider: &P, token: Address) -> Result<u8, OrderError> {
    let contract = IERC20Permit::new(token, provider);
    contract
        .decimals()
        .call()
        .await
        .map_err(|e| OrderError::ChainError(format!("decimals failed: {e}")))
}

/// Query the owner's current permit nonce. Must be re-read for every permit.
pub async fn permit_nonce<P: Provider>(
    provider: &P,
    token: Address,
    owner: Address,
) -> Result<U256, OrderError> {
    let contract = IERC20Permit::new(token, provider);
    contract
        .nonces(owner)
        .call()
        .await
        .map_err(|e| OrderError::ChainError(format!("nonces failed: {e}")))
}

/// Query the token's `DOMAIN_SEPARATOR()`. `None` when the token doesn't
/// expose one (the call reverts).
pub async fn token_domain_separator<P: Provider>(
    provider: &P,
    token: Address,
) -> Result<Option<B256>, OrderError> {
    let contract = IERC20Permit::new(token, provider);
    match contract.DOMAIN_SEPARATOR().call().await {
        Ok(separator) => Ok(Some(separator)),
        Err(e) if is_revert(&e) => Ok(None),
        Err(e) => Err(OrderError::ChainError(format!("DOMAIN_SEPARATOR failed: {e}"))),
    }
}

pub async fn allowance<P: Provider>(
    provider: &P,
    token: Address,
    owner: Address,
    spender: Address,
) -> Result<U256, OrderError> {
    let contract = IERC20Permit::new(token, provider);
    contract
        .allowance(owner, spender)
        .call()
        .await
        .map_err(|e| OrderError::ChainError(format!("allowance failed: {e}")))
}

/// Total processor fees for an order of `value` payment tokens.
pub async fn estimate_total_fees<P: Provider>(
    provider: &P,
    processor: Address,
    requester: Address,
    sell: bool,
    payment_token: Address,
    value: U256,
) -> Result<U256, OrderError> {
    let contract = IOrderProcessor::new(processor, provider);
    contract
        .estimateTotalFeesForOrder(requester, sell, payment_token, value)
        .call()
        .await
        .map_err(|e| OrderError::ChainError(format!("estimateTotalFeesForOrder failed: {e}")))
}

pub async fn max_order_decimals<P: Provider>(
    provider: &P,
    processor: Address,
    asset_token: Address,
) -> Result<i8, OrderError> {
    let contract = IOrderProcessor::new(processor, provider);
    contract
        .maxOrderDecimals(asset_token)
        .call()
        .await
        .map_err(|e| OrderError::ChainError(format!("maxOrderDecimals failed: {e}")))
}

/// Raw order status, see [`crate::order::OrderStatus`].
pub async fn order_status<P: Provider>(
    provider: &P,
    processor: Address,
    order_id: U256,
) -> Result<u8, OrderError> {
    let contract = IOrderProcessor::new(processor, provider);
    contract
        .getOrderStatus(order_id)
        .call()
        .await
        .map_err(|e| OrderError::ChainError(format!("getOrderStatus failed: {e}")))
}

/// Execute `multicall(calls)` on the processor and wait for the receipt.
///
/// Includes a 30-second timeout on send and a 60-second timeout on receipt
/// confirmation. A reverted transaction is reported as
/// [`OrderError::TransactionFailed`]; nothing is resubmitted.
pub async fn submit_multicall<P: Provider>(
    provider: &P,
    processor: Address,
    calls: Vec<Bytes>,
    gas_limit: Option<u64>,
) -> Result<TransactionReceipt, OrderError> {
    let contract = IOrderProcessor::new(processor, provider);
    let mut call = contract.multicall(calls);
    if let Some(gas) = gas_limit {
        call = call.gas(gas);
    }
    let tx_hash = broadcast(call.send(), "multicall").await?;
    wait_for_receipt(provider, tx_hash, "multicall").await
}

/// Execute a bare `requestOrder(order)`. The processor must already hold
/// an allowance for the order's token.
pub async fn submit_request_order<P: Provider>(
    provider: &P,
    processor: Address,
    order: Order,
    gas_limit: Option<u64>,
) -> Result<TransactionReceipt, OrderError> {
    let contract = IOrderProcessor::new(processor, provider);
    let mut call = contract.requestOrder(order);
    if let Some(gas) = gas_limit {
        call = call.gas(gas);
    }
    let tx_hash = broadcast(call.send(), "requestOrder").await?;
    wait_for_receipt(provider, tx_hash, "requestOrder").await
}

/// Execute `approve(spender, amount)` on `token`.
/// Returns the transaction hash.
pub async fn approve<P: Provider>(
    provider: &P,
    token: Address,
    spender: Address,
    amount: U256,
) -> Result<TxHash, OrderError> {
    let contract = IERC20Permit::new(token, provider);
    let tx_hash = broadcast(contract.approve(spender, amount).send(), "approve").await?;
    let receipt = wait_for_receipt(provider, tx_hash, "approve").await?;
    Ok(receipt.transaction_hash)
}

/// Execute `requestCancel(order_id)` on the processor.
/// Returns the transaction hash.
pub async fn request_cancel<P: Provider>(
    provider: &P,
    processor: Address,
    order_id: U256,
) -> Result<TxHash, OrderError> {
    let contract = IOrderProcessor::new(processor, provider);
    let tx_hash = broadcast(contract.requestCancel(order_id).send(), "requestCancel").await?;
    let receipt = wait_for_receipt(provider, tx_hash, "requestCancel").await?;
    Ok(receipt.transaction_hash)
}

async fn broadcast<F>(send: F, what: &str) -> Result<TxHash, OrderError>
where
    F: Future<Output = Result<PendingTransactionBuilder<Ethereum>, alloy::contract::Error>>,
{
    let pending = tokio::time::timeout(Duration::from_secs(SEND_TIMEOUT_SECS), send)
        .await
        .map_err(|_| {
            OrderError::ChainError(format!("{what} send timed out after {SEND_TIMEOUT_SECS}s"))
        })?
        .map_err(|e| OrderError::ChainError(format!("{what} send failed: {e}")))?;

    let tx_hash = *pending.tx_hash();
    tracing::info!(tx = %tx_hash, "{what} sent");
    Ok(tx_hash)
}

/// Poll for the receipt of `tx_hash` for up to [`RECEIPT_TIMEOUT_SECS`].
/// A mined but reverted transaction is [`OrderError::TransactionFailed`].
pub async fn wait_for_receipt<P: Provider>(
    provider: &P,
    tx_hash: TxHash,
    what: &str,
) -> Result<TransactionReceipt, OrderError> {
    let poll = async {
        loop {
            let receipt = provider
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(|e| OrderError::ChainError(format!("{what} receipt failed: {e}")))?;
            if let Some(receipt) = receipt {
                return Ok::<_, OrderError>(receipt);
            }
            tokio::time::sleep(Duration::from_secs(RECEIPT_POLL_INTERVAL_SECS)).await;
        }
    };

    let receipt = tokio::time::timeout(Duration::from_secs(RECEIPT_TIMEOUT_SECS), poll)
        .await
        .map_err(|_| {
            OrderError::ChainError(format!(
                "{what} receipt timed out after {RECEIPT_TIMEOUT_SECS}s"
            ))
        })??;

    if !receipt.status() {
        tracing::error!(tx = %receipt.transaction_hash, "{what} reverted");
        return Err(OrderError::TransactionFailed(receipt.transaction_hash));
    }

    Ok(receipt)
}

/// Decode every `OrderRequested` event in a receipt.
pub fn order_requested_events(
    receipt: &TransactionReceipt,
) -> Vec<IOrderProcessor::OrderRequested> {
    decode_order_requested(receipt.inner.logs())
}

pub(crate) fn decode_order_requested(logs: &[Log]) -> Vec<IOrderProcessor::OrderRequested> {
    logs.iter()
        .filter_map(|log| log.log_decode::<IOrderProcessor::OrderRequested>().ok())
        .map(|log| log.inner.data)
        .collect()
}

/// Decode the `OrderFill` events in `logs`, keeping only fills for
/// `requester` when one is given.
pub fn order_fill_events(
    logs: &[Log],
    requester: Option<Address>,
) -> Vec<IOrderProcessor::OrderFill> {
    logs.iter()
        .filter_map(|log| log.log_decode::<IOrderProcessor::OrderFill>().ok())
        .map(|log| log.inner.data)
        .filter(|fill| requester.map_or(true, |r| fill.requester == r))
        .collect()
}

/// Query `OrderFill` logs emitted by `processor` in `[from_block, to_block]`.
pub async fn order_fills<P: Provider>(
    provider: &P,
    processor: Address,
    requester: Option<Address>,
    from_block: u64,
    to_block: u64,
) -> Result<Vec<IOrderProcessor::OrderFill>, OrderError> {
    let filter = Filter::new()
        .address(processor)
        .event_signature(IOrderProcessor::OrderFill::SIGNATURE_HASH)
        .from_block(from_block)
        .to_block(to_block);
    let logs = provider
        .get_logs(&filter)
        .await
        .map_err(|e| OrderError::ChainError(format!("OrderFill logs failed: {e}")))?;
    Ok(order_fill_events(&logs, requester))
}

pub async fn latest_block<P: Provider>(provider: &P) -> Result<u64, OrderError> {
    provider
        .get_block_number()
        .await
        .map_err(|e| OrderError::ChainError(format!("block number failed: {e}")))
}
