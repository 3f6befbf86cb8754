//! Peggy Orchestrator
//!
//! Off-chain agent that keeps a Cosmos chain running the peggy module and
//! the `Peggy.sol` contract on Ethereum in agreement.
//!
//! # Loops
//!
//! - **Oracle**: claims Ethereum bridge events on Cosmos in nonce order
//! - **Signer**: confirms pending valsets and batches with the Ethereum key
//! - **Relayer**: submits confirmed valsets and batches to Ethereum
//! - **Batch requester**: asks Cosmos to batch withdrawals worth relaying
//!
//! Validators run all four. A node whose Ethereum key is not in the current
//! valset runs only the batch requester and the relayer.

use std::sync::Arc;
use std::time::Duration;

use eyre::WrapErr;
use orchestrator::config::Config;
use orchestrator::orchestrator::{OrchestratorSettings, PeggyOrchestrator};
use orchestrator::price_feed::CoinGeckoPriceFeed;
use orchestrator::server::{self, NodeInfo};
use orchestrator::shutdown::Shutdown;
use peggy_rs::cosmos::broadcast::{DEFAULT_CONFIRM_TIMEOUT, DEFAULT_SETTLE_DELAY};
use peggy_rs::cosmos::{BroadcasterConfig, LcdCosmosClient, PeggyQueryClient, TxBroadcaster};
use peggy_rs::evm::{EvmPeggyClient, EvmPeggyConfig, LocalEthSigner};
use peggy_rs::{CosmosNetwork, EthSigner};
use tracing::{error, info};

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> eyre::Result<()> {
    init_logging();

    info!("Starting Peggy Orchestrator");

    let config = Config::load()?;
    info!(
        cosmos_chain_id = %config.cosmos.chain_id,
        eth_chain_id = config.ethereum.chain_id,
        mode = %config.mode,
        "Configuration loaded"
    );

    let peggy_address = config.peggy_address()?;

    let eth_signer = LocalEthSigner::from_private_key(config.ethereum.private_key.expose())?;
    let ethereum = EvmPeggyClient::new(EvmPeggyConfig {
        rpc_url: config.ethereum.rpc_url.clone(),
        peggy_address,
        private_key: config.ethereum.private_key.expose().to_string(),
        max_block_range: config.ethereum.max_block_range,
        tx_timeout: config.ethereum.tx_timeout(),
        gas_policy: config.ethereum.gas_policy(),
        pending_tx_wait: config.ethereum.pending_tx_wait(),
    })?;

    let queries = PeggyQueryClient::new(
        &config.cosmos.lcd_url,
        &config.cosmos.tendermint_rpc_url,
        Duration::from_secs(config.cosmos.request_timeout_secs),
    )?;
    let broadcaster = TxBroadcaster::new(
        BroadcasterConfig {
            lcd_url: config.cosmos.lcd_url.clone(),
            chain_id: config.cosmos.chain_id.clone(),
            derivation_path: config.cosmos.derivation_path.clone(),
            account_prefix: config.cosmos.account_prefix.clone(),
            gas_limit: config.cosmos.gas_limit,
            gas_price: config.cosmos.gas_price,
            fee_denom: config.cosmos.fee_denom.clone(),
            request_timeout: Duration::from_secs(config.cosmos.request_timeout_secs),
            settle_delay: DEFAULT_SETTLE_DELAY,
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
        },
        config.cosmos.mnemonic.expose(),
    )?;
    let cosmos = LcdCosmosClient::new(queries, Box::new(broadcaster), &config.cosmos.account_prefix)
        .with_claims_per_tx(config.cosmos.claims_per_tx);

    let price_feed = CoinGeckoPriceFeed::new(&config.oracle.coingecko_api)
        .wrap_err("Failed to create price feed")?;

    let shutdown = Shutdown::new();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        signal_shutdown.trigger();
    });

    if config.metrics.enabled {
        let node = NodeInfo {
            mode: config.mode.to_string(),
            orchestrator_address: cosmos.orchestrator_address(),
            eth_address: eth_signer.address().to_string(),
        };
        let bind_address = config.metrics.bind_address.clone();
        let port = config.metrics.port;
        let server_shutdown = shutdown.clone();
        tokio::spawn(async move {
            if let Err(e) = server::start_server(&bind_address, port, node, server_shutdown).await {
                error!(error = %e, "Health server error");
            }
        });
    }

    let orchestrator = PeggyOrchestrator::new(
        Arc::new(cosmos),
        Arc::new(ethereum),
        Arc::new(eth_signer),
        Arc::new(price_feed),
        OrchestratorSettings::from_config(&config),
        shutdown.clone(),
    );

    let result = orchestrator.run().await;
    shutdown.trigger();

    match &result {
        Ok(()) => info!("Peggy Orchestrator stopped"),
        Err(e) => error!(error = ?e, "Peggy Orchestrator stopped with error"),
    }
    result
}

/// Initialize tracing/logging with structured output
fn init_logging() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,orchestrator=debug,peggy_rs=debug"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_target(true))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_target(true).with_thread_ids(true))
            .with(filter)
            .init();
    }
}

/// Wait for shutdown signals (SIGINT/SIGTERM)
async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}
