//! Order submission client.
//!
//! [`OrderClient`] runs the complete request flow against one order
//! processor:
//!
//! 1. resolve the permit token's EIP-712 domain and check it against the
//!    token's own `DOMAIN_SEPARATOR()`
//! 2. precision check, fee estimate, nonce and deadline reads
//! 3. sign the permit and encode `multicall([selfPermit, requestOrder])`
//! 4. submit and decode the `OrderRequested` id from the receipt
//!
//! [`OrderClient::request_order_with_approval`] is the two-transaction
//! alternative for tokens without permits: `approve` the processor, then
//! call `requestOrder` directly.
//!
//! The flow is single-shot. Any failure is returned to the caller and
//! nothing is retried.

use alloy::primitives::{Address, Bytes, TxHash, U256};
use alloy::providers::Provider;
use alloy::rpc::types::TransactionReceipt;
use alloy::signers::local::PrivateKeySigner;

use crate::chain;
use crate::eip712::{recover_permit_signer, sign_permit, Domain, PermitMessage, PermitSignature};
use crate::order::{check_order_precision, OrderRequest, OrderStatus};
use crate::processor::{multicall_calldata, request_order_calldata, self_permit_calldata, Order};
use crate::OrderError;

/// A signed order ready for submission.
#[derive(Debug, Clone)]
pub struct PreparedOrder {
    pub order: Order,
    pub domain: Domain,
    pub permit: PermitMessage,
    pub signature: PermitSignature,
    pub fees: U256,
    /// `[selfPermit, requestOrder]` call data for the processor's multicall.
    pub calls: Vec<Bytes>,
}

impl PreparedOrder {
    /// Sign a permit for `request` and build the call batch.
    ///
    /// The permit authorizes `processor` to pull the permit value from the
    /// signer, who is also the order recipient.
    pub fn sign(
        signer: &PrivateKeySigner,
        processor: Address,
        request: &OrderRequest,
        domain: Domain,
        fees: U256,
        nonce: U256,
        deadline: U256,
    ) -> Result<Self, OrderError> {
        let owner = signer.address();
        let permit = PermitMessage {
            owner,
            spender: processor,
            value: request.permit_value(fees)?,
            nonce,
            deadline,
        };

        let signature = sign_permit(signer, &domain, &permit)?;
        let recovered = recover_permit_signer(&domain, &permit, &signature)?;
        if recovered != owner {
            return Err(OrderError::SignatureError(format!(
                "permit recovers to {recovered}, expected {owner}"
            )));
        }

        let order = request.to_order(owner);
        let calls = vec![
            self_permit_calldata(
                domain.verifying_contract,
                owner,
                permit.value,
                permit.deadline,
                &signature,
            ),
            request_order_calldata(&order),
        ];

        Ok(Self {
            order,
            domain,
            permit,
            signature,
            fees,
            calls,
        })
    }

    /// Complete `multicall(calls)` transaction input, for inspection or
    /// submission by other tooling.
    pub fn multicall_data(&self) -> Bytes {
        multicall_calldata(self.calls.clone())
    }
}

/// Outcome of a mined order request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedOrder {
    pub tx_hash: TxHash,
    pub order_ids: Vec<U256>,
}

/// Client for one order processor.
///
/// `P` must be able to send transactions from `signer` (for example a
/// provider built with `.wallet(EthereumWallet::from(signer))`).
pub struct OrderClient<P> {
    provider: P,
    signer: PrivateKeySigner,
    processor: Address,
    gas_limit: Option<u64>,
}

impl<P: Provider> OrderClient<P> {
    pub fn new(provider: P, signer: PrivateKeySigner, processor: Address) -> Self {
        Self {
            provider,
            signer,
            processor,
            gas_limit: None,
        }
    }

    /// Use a fixed gas limit for the multicall instead of estimating it.
    pub fn with_gas_limit(mut self, gas_limit: Option<u64>) -> Self {
        self.gas_limit = gas_limit;
        self
    }

    /// The requester / permit owner address.
    pub fn address(&self) -> Address {
        self.signer.address()
    }

    pub fn processor(&self) -> Address {
        self.processor
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Resolve the EIP-712 domain `token` verifies permits against.
    pub async fn permit_domain(&self, token: Address) -> Result<Domain, OrderError> {
        let name = chain::token_name(&self.provider, token).await?;
        let version = chain::token_version(&self.provider, token).await?;
        let chain_id = chain::chain_id(&self.provider).await?;
        let domain = Domain::new(name, version, chain_id, token);

        match chain::token_domain_separator(&self.provider, token).await? {
            Some(onchain) => {
                let local = domain.separator()?;
                if local != onchain {
                    return Err(OrderError::SignatureError(format!(
                        "domain separator mismatch for {token}: computed {local}, token reports {onchain}"
                    )));
                }
            }
            None => {
                tracing::warn!(%token, "token has no DOMAIN_SEPARATOR(), domain not cross-checked");
            }
        }

        Ok(domain)
    }

    /// Precision check, then the processor fee for buys (sells pay fees out
    /// of proceeds).
    async fn check_and_estimate_fees(&self, request: &OrderRequest) -> Result<U256, OrderError> {
        if request.needs_precision_check() {
            let decimals = chain::token_decimals(&self.provider, request.asset_token).await?;
            let max_decimals =
                chain::max_order_decimals(&self.provider, self.processor, request.asset_token)
                    .await?;
            check_order_precision(request.amount, decimals, max_decimals)?;
        }

        if request.sell {
            return Ok(U256::ZERO);
        }
        chain::estimate_total_fees(
            &self.provider,
            self.processor,
            self.address(),
            false,
            request.payment_token,
            request.amount,
        )
        .await
    }

    /// Read everything the order needs from chain and sign its permit.
    pub async fn prepare(&self, request: &OrderRequest) -> Result<PreparedOrder, OrderError> {
        let owner = self.address();
        let fees = self.check_and_estimate_fees(request).await?;

        let token = request.permit_token();
        let domain = self.permit_domain(token).await?;
        let nonce = chain::permit_nonce(&self.provider, token, owner).await?;
        let deadline = chain::permit_deadline(&self.provider).await?;

        tracing::info!(
            %token,
            amount = %request.amount,
            %fees,
            %nonce,
            %deadline,
            sell = request.sell,
            "signing order permit"
        );

        PreparedOrder::sign(
            &self.signer,
            self.processor,
            request,
            domain,
            fees,
            nonce,
            deadline,
        )
    }

    /// Submit a prepared order and wait for it to be mined.
    pub async fn submit(&self, prepared: &PreparedOrder) -> Result<SubmittedOrder, OrderError> {
        let receipt = chain::submit_multicall(
            &self.provider,
            self.processor,
            prepared.calls.clone(),
            self.gas_limit,
        )
        .await?;
        Ok(submitted(&receipt))
    }

    /// `prepare` then `submit`.
    pub async fn request_order(
        &self,
        request: &OrderRequest,
    ) -> Result<SubmittedOrder, OrderError> {
        let prepared = self.prepare(request).await?;
        self.submit(&prepared).await
    }

    /// Request an order without a permit.
    ///
    /// Approves the processor for the permit token and value (payment
    /// token plus fees for buys, asset token for sells) when the current
    /// allowance is short, then sends `requestOrder` on its own.
    pub async fn request_order_with_approval(
        &self,
        request: &OrderRequest,
    ) -> Result<SubmittedOrder, OrderError> {
        let owner = self.address();
        let fees = self.check_and_estimate_fees(request).await?;
        let token = request.permit_token();
        let value = request.permit_value(fees)?;

        let allowance = chain::allowance(&self.provider, token, owner, self.processor).await?;
        if allowance < value {
            tracing::info!(%token, %value, %allowance, "approving processor");
            let tx = chain::approve(&self.provider, token, self.processor, value).await?;
            tracing::info!(%tx, "approve mined");
        } else {
            tracing::debug!(%token, %allowance, "existing allowance covers order");
        }

        let receipt = chain::submit_request_order(
            &self.provider,
            self.processor,
            request.to_order(owner),
            self.gas_limit,
        )
        .await?;
        Ok(submitted(&receipt))
    }

    pub async fn order_status(&self, order_id: U256) -> Result<OrderStatus, OrderError> {
        let raw = chain::order_status(&self.provider, self.processor, order_id).await?;
        OrderStatus::try_from(raw)
    }

    pub async fn request_cancel(&self, order_id: U256) -> Result<TxHash, OrderError> {
        tracing::info!(%order_id, processor = %self.processor, "requesting cancel");
        chain::request_cancel(&self.provider, self.processor, order_id).await
    }
}

fn submitted(receipt: &TransactionReceipt) -> SubmittedOrder {
    let order_ids: Vec<U256> = chain::order_requested_events(receipt)
        .into_iter()
        .map(|event| event.id)
        .collect();
    if order_ids.is_empty() {
        tracing::warn!(tx = %receipt.transaction_hash, "no OrderRequested event in receipt");
    }

    SubmittedOrder {
        tx_hash: receipt.transaction_hash,
        order_ids,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::order::{OrderType, TimeInForce};
    use crate::processor::IOrderProcessor;
    use alloy::primitives::{address, B256, U64};
    use alloy::providers::ProviderBuilder;
    use alloy::rpc::types::Log;
    use alloy::sol_types::{SolCall, SolEvent};
    use alloy::transports::mock::Asserter;

    const PROCESSOR: Address = address!("1754422ef9910572cCde378a9C07d717eC8D48A0");
    const USDC: Address = address!("A0b86991c6218b36c1d19D4a2e9Eb0cE3606eB48");

    fn signer() -> PrivateKeySigner {
        "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d"
            .parse()
            .unwrap()
    }

    fn buy_request() -> OrderRequest {
        OrderRequest {
            asset_token: address!("ed12e3394e78C2B0074aa4479b556043cC84503C"),
            payment_token: USDC,
            sell: false,
            order_type: OrderType::Market,
            amount: U256::from(10_000_000u64),
            price: U256::ZERO,
            tif: TimeInForce::Gtc,
        }
    }

    fn usdc_domain() -> Domain {
        Domain::new("USD Coin", "2", 1, USDC)
    }

    fn abi_string(s: &str) -> Bytes {
        let mut out = U256::from(32).to_be_bytes_vec();
        out.extend(U256::from(s.len()).to_be_bytes_vec());
        let mut tail = vec![0u8; s.len().div_ceil(32) * 32];
        tail[..s.len()].copy_from_slice(s.as_bytes());
        out.extend(tail);
        Bytes::from(out)
    }

    fn word(value: u64) -> Bytes {
        Bytes::from(U256::from(value).to_be_bytes_vec())
    }

    fn mined(tx_hash: B256, logs: Vec<Log>) -> serde_json::Value {
        serde_json::json!({
            "type": "0x2",
            "status": "0x1",
            "cumulativeGasUsed": "0x5208",
            "logs": logs,
            "logsBloom": format!("0x{}", "00".repeat(256)),
            "transactionHash": tx_hash,
            "transactionIndex": "0x0",
            "blockHash": B256::repeat_byte(0x0b),
            "blockNumber": "0x10",
            "gasUsed": "0x5208",
            "effectiveGasPrice": "0x3b9aca00",
            "from": signer().address(),
            "to": PROCESSOR,
            "contractAddress": null
        })
    }

    fn order_requested_log(id: u64) -> Log {
        let order = buy_request().to_order(signer().address());
        let event = IOrderProcessor::OrderRequested {
            id: U256::from(id),
            recipient: order.recipient,
            order,
        };
        Log {
            inner: alloy::primitives::Log {
                address: PROCESSOR,
                data: event.encode_log_data(),
            },
            ..Default::default()
        }
    }

    fn mocked() -> (OrderClient<impl Provider>, Asserter) {
        let asserter = Asserter::new();
        let provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .connect_mocked_client(asserter.clone());
        (OrderClient::new(provider, signer(), PROCESSOR), asserter)
    }

    #[test]
    fn test_sign_buy_order() {
        let signer = signer();
        let prepared = PreparedOrder::sign(
            &signer,
            PROCESSOR,
            &buy_request(),
            usdc_domain(),
            U256::from(500_000u64),
            U256::from(3),
            U256::from(1_700_000_300u64),
        )
        .unwrap();

        assert_eq!(prepared.permit.owner, signer.address());
        assert_eq!(prepared.permit.spender, PROCESSOR);
        assert_eq!(prepared.permit.value, U256::from(10_500_000u64));
        assert!(prepared.signature.v == 27 || prepared.signature.v == 28);
        assert_eq!(
            recover_permit_signer(&prepared.domain, &prepared.permit, &prepared.signature).unwrap(),
            signer.address()
        );

        assert_eq!(prepared.calls.len(), 2);
        let permit = IOrderProcessor::selfPermitCall::abi_decode(&prepared.calls[0]).unwrap();
        assert_eq!(permit.permitToken, USDC);
        assert_eq!(permit.owner, signer.address());
        assert_eq!(permit.value, U256::from(10_500_000u64));
        assert_eq!(permit.deadline, U256::from(1_700_000_300u64));
        assert_eq!(permit.v, prepared.signature.v);
        assert_eq!(permit.r, prepared.signature.r);
        assert_eq!(permit.s, prepared.signature.s);

        let request = IOrderProcessor::requestOrderCall::abi_decode(&prepared.calls[1]).unwrap();
        assert_eq!(request.order, prepared.order);
        assert_eq!(request.order.recipient, signer.address());
    }

    #[test]
    fn test_sign_sell_order_permits_asset_token() {
        let signer = signer();
        let mut request = buy_request();
        request.sell = true;
        let asset_domain = Domain::new("Tesla dShare", "1", 11155111, request.asset_token);

        let prepared = PreparedOrder::sign(
            &signer,
            PROCESSOR,
            &request,
            asset_domain,
            U256::from(500_000u64),
            U256::ZERO,
            U256::from(1_700_000_300u64),
        )
        .unwrap();

        assert_eq!(prepared.permit.value, request.amount);
        let permit = IOrderProcessor::selfPermitCall::abi_decode(&prepared.calls[0]).unwrap();
        assert_eq!(permit.permitToken, request.asset_token);
        assert_eq!(prepared.order.assetTokenQuantity, request.amount);
    }

    #[tokio::test]
    async fn test_permit_domain_matches_token() {
        let (client, asserter) = mocked();
        let separator = usdc_domain().separator().unwrap();

        asserter.push_success(&abi_string("USD Coin"));
        asserter.push_success(&abi_string("2"));
        asserter.push_success(&U64::from(1));
        asserter.push_success(&Bytes::from(separator.to_vec()));

        let domain = client.permit_domain(USDC).await.unwrap();
        assert_eq!(domain, usdc_domain());
    }

    #[tokio::test]
    async fn test_permit_domain_rejects_wrong_version() {
        let (client, asserter) = mocked();
        // Token reports the version "2" separator, but has no version() getter.
        let separator = usdc_domain().separator().unwrap();

        asserter.push_success(&abi_string("USD Coin"));
        asserter.push_failure_msg("execution reverted");
        asserter.push_success(&U64::from(1));
        asserter.push_success(&Bytes::from(separator.to_vec()));

        let err = client.permit_domain(USDC).await.unwrap_err();
        assert!(matches!(err, OrderError::SignatureError(_)));
    }

    #[tokio::test]
    async fn test_order_status() {
        let (client, asserter) = mocked();
        asserter.push_success(&Bytes::from(U256::from(1).to_be_bytes_vec()));
        assert_eq!(
            client.order_status(U256::from(42)).await.unwrap(),
            OrderStatus::Active
        );
    }

    #[tokio::test]
    async fn test_permit_domain_surfaces_rpc_failure() {
        let (client, asserter) = mocked();
        asserter.push_success(&abi_string("USD Coin"));
        // version() gets no response at all: not a revert, so no fallback.

        let err = client.permit_domain(USDC).await.unwrap_err();
        assert!(matches!(err, OrderError::ChainError(_)), "{err:?}");
    }

    #[test]
    fn test_multicall_data_wraps_calls() {
        let prepared = PreparedOrder::sign(
            &signer(),
            PROCESSOR,
            &buy_request(),
            usdc_domain(),
            U256::from(500_000u64),
            U256::ZERO,
            U256::from(1_700_000_300u64),
        )
        .unwrap();

        let call = IOrderProcessor::multicallCall::abi_decode(&prepared.multicall_data()).unwrap();
        assert_eq!(call.data, prepared.calls);
    }

    #[tokio::test]
    async fn test_request_order_with_approval() {
        let (client, asserter) = mocked();
        let approve_tx = B256::repeat_byte(0x01);
        let order_tx = B256::repeat_byte(0x02);

        asserter.push_success(&word(500_000)); // estimateTotalFeesForOrder
        asserter.push_success(&word(0)); // allowance
        asserter.push_success(&approve_tx);
        asserter.push_success(&mined(approve_tx, vec![]));
        asserter.push_success(&order_tx);
        asserter.push_success(&mined(order_tx, vec![order_requested_log(42)]));

        let submitted = client
            .request_order_with_approval(&buy_request())
            .await
            .unwrap();
        assert_eq!(submitted.tx_hash, order_tx);
        assert_eq!(submitted.order_ids, vec![U256::from(42)]);
    }

    #[tokio::test]
    async fn test_request_order_with_approval_reuses_allowance() {
        let (client, asserter) = mocked();
        let order_tx = B256::repeat_byte(0x03);

        asserter.push_success(&word(500_000));
        asserter.push_success(&word(10_500_000)); // already covers amount + fees
        asserter.push_success(&order_tx);
        asserter.push_success(&mined(order_tx, vec![order_requested_log(7)]));

        let submitted = client
            .request_order_with_approval(&buy_request())
            .await
            .unwrap();
        assert_eq!(submitted.tx_hash, order_tx);
        assert_eq!(submitted.order_ids, vec![U256::from(7)]);
    }
}
