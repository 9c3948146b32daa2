use alloy::network::EthereumWallet;
use alloy::providers::ProviderBuilder;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dshare::config::{order_id_from_env, Config};
use dshare::{OrderClient, OrderError};

async fn run() -> Result<(), OrderError> {
    let config = Config::from_env()?;
    let order_id = order_id_from_env()?;
    let signer = config.signer.signer()?;

    let rpc_url = config
        .rpc_url
        .parse()
        .map_err(|e| OrderError::ConfigError(format!("invalid RPC_URL: {e}")))?;
    let provider = ProviderBuilder::new()
        .wallet(EthereumWallet::from(signer.clone()))
        .connect_http(rpc_url);

    let processor = config.processor_address(&provider).await?;

    let client = OrderClient::new(provider, signer, processor);
    let status = client.order_status(order_id).await?;
    tracing::info!(%order_id, %status, "current order status");

    let tx_hash = client.request_cancel(order_id).await?;
    tracing::info!(%order_id, tx = %tx_hash, "cancel requested");
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
        tracing::error!(error = %e, "cancel request failed");
        std::process::exit(1);
    }
}
