use alloy::network::EthereumWallet;
use alloy::providers::ProviderBuilder;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dshare::config::{order_request_from_env, Config, OrderMode};
use dshare::{OrderClient, OrderError};

async fn run() -> Result<(), OrderError> {
    let config = Config::from_env()?;
    let request = order_request_from_env()?;
    let signer = config.signer.signer()?;
    let account = signer.address();

    let rpc_url = config
        .rpc_url
        .parse()
        .map_err(|e| OrderError::ConfigError(format!("invalid RPC_URL: {e}")))?;
    let provider = ProviderBuilder::new()
        .wallet(EthereumWallet::from(signer.clone()))
        .connect_http(rpc_url);

    let processor = config.processor_address(&provider).await?;

    tracing::info!(
        %account,
        %processor,
        asset = %request.asset_token,
        payment = %request.payment_token,
        amount = %request.amount,
        sell = request.sell,
        mode = ?config.mode,
        "requesting order"
    );

    let client = OrderClient::new(provider, signer, processor).with_gas_limit(config.gas_limit);

    if config.dry_run {
        let prepared = client.prepare(&request).await?;
        tracing::info!(
            permit_value = %prepared.permit.value,
            deadline = %prepared.permit.deadline,
            fees = %prepared.fees,
            "dry run, not sending"
        );
        println!("{}", prepared.multicall_data());
        return Ok(());
    }

    let submitted = match config.mode {
        OrderMode::Permit => client.request_order(&request).await?,
        OrderMode::Approve => client.request_order_with_approval(&request).await?,
    };
    tracing::info!(tx = %submitted.tx_hash, "order transaction mined");

    for id in submitted.order_ids {
        let status = client.order_status(id).await?;
        tracing::info!(order_id = %id, %status, "order requested");
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!(error = %e, "order request failed");
        std::process::exit(1);
    }
}
