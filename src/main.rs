use alloy_network::AnyNetwork;
use alloy_provider::{Provider, ProviderBuilder};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{self, EnvFilter};
use url::Url;

use ethernal_sync::chain::{AlloyChainClient, ChainClient};
use ethernal_sync::indexer::Ethernal;
use ethernal_sync::metrics::Metrics;
use ethernal_sync::utils::{config_path_from_env, load_config};

#[tokio::main]
async fn main() -> Result<()> {
    // Load config
    let config_path = config_path_from_env();
    let config = load_config(&config_path)?;

    // Initialize tracing
    let level = if config.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    println!();
    info!("=========================== INITIALIZING ===========================");
    info!("Config path: {}", config_path.display());

    if config.disabled {
        info!("Ethernal is disabled, exiting");
        return Ok(());
    }

    // Initialize optional metrics
    let metrics = if config.metrics.enabled {
        let workspace = config.workspace.clone().unwrap_or_else(|| "default".to_string());
        let metrics = Metrics::new(workspace)?;
        metrics
            .start_metrics_server(&config.metrics.address, config.metrics.port)
            .await?;
        Some(metrics)
    } else {
        info!("Metrics are disabled");
        None
    };

    // Create RPC provider
    let rpc_url: Url = config.rpc_url.parse()?;
    info!("RPC URL: {}", rpc_url);
    let provider = ProviderBuilder::new()
        .network::<AnyNetwork>()
        .connect_http(rpc_url);
    let client = Arc::new(AlloyChainClient::new(provider, metrics.clone()));
    let chain: Arc<dyn ChainClient> = client.clone();

    let poll_interval = Duration::from_millis(config.poll_interval_ms);
    let disable_trace = config.disable_trace || config.server_sync;
    let contracts = config.contracts.clone();
    let ethernal = Ethernal::from_config(config, chain.clone(), metrics)?;

    let listening = ethernal.start_listening().await;

    for contract in &contracts {
        ethernal.push(contract).await;
    }

    if !listening {
        info!("Not listening for blocks, exiting");
        return Ok(());
    }

    let mut next_block = chain.get_block_number().await? + 1;

    println!();
    info!("========================= LISTENING FOR BLOCKS =========================");

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Received Ctrl+C signal, shutting down...");
                break Ok(());
            }
            _ = tokio::time::sleep(poll_interval) => {}
        }

        let latest_block = match chain.get_block_number().await {
            Ok(number) => number,
            Err(e) => {
                ethernal.on_error(e);
                continue;
            }
        };

        while next_block <= latest_block {
            if !disable_trace {
                trace_block(&client, &ethernal, next_block).await;
            }
            ethernal.on_block_notification(next_block).await;
            next_block += 1;
        }
    }
}

/// Trace every transaction of `number` and hand the trees to the trace hook.
async fn trace_block<P>(client: &AlloyChainClient<P>, ethernal: &Ethernal, number: u64)
where
    P: Provider<AnyNetwork> + Send + Sync,
{
    let block = match client.get_block_with_transactions(number).await {
        Ok(Some(block)) => block,
        Ok(None) => return,
        Err(e) => {
            error!("Couldn't fetch block {} for tracing: {}", number, e);
            return;
        }
    };

    for transaction in &block.transactions {
        match client.trace_transaction(transaction.hash).await {
            Ok(Some(trace)) => {
                ethernal
                    .trace_handler(&trace, false, Some(transaction.hash))
                    .await
            }
            Ok(None) => warn!("No call trace for {}", transaction.hash),
            Err(e) => warn!("Couldn't trace {}: {}", transaction.hash, e),
        }
    }
}
