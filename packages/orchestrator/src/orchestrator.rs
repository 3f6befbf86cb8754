//! Wires the loops together and runs them until shutdown or the first failure

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use eyre::{eyre, Result};
use peggy_rs::{CosmosNetwork, EthSigner, EthereumNetwork};
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::batch_requester::BatchRequester;
use crate::config::{Config, Mode};
use crate::oracle::{EthOracle, OracleSettings};
use crate::price_feed::PriceFeed;
use crate::relayer::{EthRelayer, RelayerSettings};
use crate::retry::{is_cancelled, retry_logged, RetryConfig};
use crate::shutdown::Shutdown;
use crate::signer::EthSignerLoop;

/// The loops this process ended up running
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Oracle, batch requester, signer and relayer
    Validator,
    /// Batch requester and relayer
    Relayer,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Validator => "validator",
            RunMode::Relayer => "relayer",
        }
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub mode: Mode,
    pub retry: RetryConfig,
    pub oracle: OracleSettings,
    pub relayer: RelayerSettings,
    pub min_batch_fee_usd: f64,
    pub erc20_denoms: HashMap<Address, String>,
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            mode: config.mode,
            retry: RetryConfig::with_max_attempts(config.max_attempts),
            oracle: OracleSettings::from(&config.oracle),
            relayer: RelayerSettings::from(&config.relayer),
            min_batch_fee_usd: config.oracle.min_batch_fee_usd,
            erc20_denoms: config.oracle.erc20_denoms.clone(),
        }
    }

    /// Shared cadence of the oracle, signer and batch requester
    fn loop_interval(&self) -> Duration {
        self.oracle.loop_interval
    }
}

pub struct PeggyOrchestrator {
    cosmos: Arc<dyn CosmosNetwork>,
    ethereum: Arc<dyn EthereumNetwork>,
    signer: Arc<dyn EthSigner>,
    price_feed: Arc<dyn PriceFeed>,
    settings: OrchestratorSettings,
    shutdown: Shutdown,
}

impl PeggyOrchestrator {
    pub fn new(
        cosmos: Arc<dyn CosmosNetwork>,
        ethereum: Arc<dyn EthereumNetwork>,
        signer: Arc<dyn EthSigner>,
        price_feed: Arc<dyn PriceFeed>,
        settings: OrchestratorSettings,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            cosmos,
            ethereum,
            signer,
            price_feed,
            settings,
            shutdown,
        }
    }

    /// Validator mode when forced, or when our Ethereum key is in the
    /// current valset.
    pub async fn resolve_mode(&self) -> Result<RunMode> {
        match self.settings.mode {
            Mode::Validator => Ok(RunMode::Validator),
            Mode::Relayer => Ok(RunMode::Relayer),
            Mode::Auto => {
                let valset = retry_logged(
                    &self.settings.retry,
                    &self.shutdown,
                    "orchestrator",
                    "current_valset",
                    || self.cosmos.current_valset(),
                )
                .await?;
                if valset.contains(&self.signer.address()) {
                    Ok(RunMode::Validator)
                } else {
                    info!(
                        eth_address = %self.signer.address(),
                        valset_nonce = valset.nonce,
                        "Ethereum address not in the current valset, running as relayer"
                    );
                    Ok(RunMode::Relayer)
                }
            }
        }
    }

    /// Run every loop for the resolved mode.
    ///
    /// The first loop to fail or panic stops the others and its error is
    /// returned. Loops that end because of shutdown make this return `Ok`.
    pub async fn run(self) -> Result<()> {
        let mode = match self.resolve_mode().await {
            Ok(mode) => mode,
            Err(e) if is_cancelled(&e) => return Ok(()),
            Err(e) => return Err(e.wrap_err("Failed to determine orchestrator mode")),
        };
        info!(mode = mode.as_str(), "Starting orchestrator loops");

        let mut tasks: JoinSet<(&'static str, Result<()>)> = JoinSet::new();

        if mode == RunMode::Validator {
            let bridge_id = match retry_logged(
                &self.settings.retry,
                &self.shutdown,
                "orchestrator",
                "get_bridge_id",
                || self.ethereum.get_bridge_id(),
            )
            .await
            {
                Ok(id) => id,
                Err(e) if is_cancelled(&e) => return Ok(()),
                Err(e) => return Err(e.wrap_err("Failed to fetch bridge ID")),
            };
            info!(bridge_id = %bridge_id, "Fetched bridge ID");

            let oracle = EthOracle::new(
                self.cosmos.clone(),
                self.ethereum.clone(),
                self.settings.oracle.clone(),
                self.settings.retry.clone(),
                self.shutdown.clone(),
            );
            tasks.spawn(async move { ("oracle", oracle.run().await) });

            let signer = EthSignerLoop::new(
                self.cosmos.clone(),
                self.signer.clone(),
                bridge_id,
                self.settings.loop_interval(),
                self.settings.retry.clone(),
                self.shutdown.clone(),
            );
            tasks.spawn(async move { ("signer", signer.run().await) });
        }

        let batch_requester = BatchRequester::new(
            self.cosmos.clone(),
            self.price_feed.clone(),
            self.settings.erc20_denoms.clone(),
            self.settings.min_batch_fee_usd,
            self.settings.loop_interval(),
            self.settings.retry.clone(),
            self.shutdown.clone(),
        );
        tasks.spawn(async move { ("batch_requester", batch_requester.run().await) });

        let relayer = EthRelayer::new(
            self.cosmos.clone(),
            self.ethereum.clone(),
            self.settings.relayer.clone(),
            self.settings.retry.clone(),
            self.shutdown.clone(),
        );
        tasks.spawn(async move { ("relayer", relayer.run().await) });

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, Ok(()))) => info!(task = name, "Task finished"),
                Ok((name, Err(e))) => {
                    error!(task = name, error = ?e, "Task failed, stopping orchestrator");
                    self.shutdown.trigger();
                    tasks.abort_all();
                    return Err(e.wrap_err(format!("{} task failed", name)));
                }
                Err(e) => {
                    error!(error = %e, "Task panicked, stopping orchestrator");
                    self.shutdown.trigger();
                    tasks.abort_all();
                    return Err(eyre!("orchestrator task panicked: {}", e));
                }
            }
        }

        info!("All orchestrator tasks finished");
        Ok(())
    }
}
