use std::time::Duration;

use alloy::providers::ProviderBuilder;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dshare::config::ListenConfig;
use dshare::{chain, OrderError, FILL_POLL_INTERVAL_SECS};

async fn run() -> Result<(), OrderError> {
    let config = ListenConfig::from_env()?;
    let rpc_url = config
        .rpc_url
        .parse()
        .map_err(|e| OrderError::ConfigError(format!("invalid RPC_URL: {e}")))?;
    let provider = ProviderBuilder::new().connect_http(rpc_url);

    let processor = config.processor_address(&provider).await?;
    let mut next_block = chain::latest_block(&provider).await?;

    tracing::info!(
        %processor,
        user = ?config.user_account,
        from_block = next_block,
        "listening for OrderFill"
    );

    let mut interval = tokio::time::interval(Duration::from_secs(FILL_POLL_INTERVAL_SECS));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let latest = match chain::latest_block(&provider).await {
                    Ok(block) => block,
                    Err(e) => {
                        tracing::warn!(error = %e, "block number poll failed");
                        continue;
                    }
                };
                if latest < next_block {
                    continue;
                }

                let fills = match chain::order_fills(
                    &provider,
                    processor,
                    config.user_account,
                    next_block,
                    latest,
                )
                .await
                {
                    Ok(fills) => fills,
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            from = next_block,
                            to = latest,
                            "log poll failed"
                        );
                        continue;
                    }
                };

                for fill in fills {
                    tracing::info!(
                        order_id = %fill.id,
                        requester = %fill.requester,
                        asset = %fill.assetToken,
                        payment = %fill.paymentToken,
                        asset_amount = %fill.assetAmount,
                        payment_amount = %fill.paymentAmount,
                        fees = %fill.feesTaken,
                        sell = fill.sell,
                        "order filled"
                    );
                }
                next_block = latest + 1;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("stopping fill listener");
                return Ok(());
            }
        }
    }
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
        tracing::error!(error = %e, "fill listener failed");
        std::process::exit(1);
    }
}
