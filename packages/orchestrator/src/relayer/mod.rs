//! Ethereum relayer
//!
//! Pushes the newest confirmed valset and the oldest confirmed batch to the
//! Peggy contract. Valset and batch relaying share the Ethereum valset found
//! at the start of each iteration and then run concurrently.

mod batch;
mod find_valset;
mod valset;

pub use find_valset::{check_if_valsets_differ, DescendingWindows, ValsetMismatch};
pub use valset::relay_due;

use std::sync::Arc;
use std::time::Duration;

use eyre::Result;
use peggy_rs::{CosmosNetwork, EthereumNetwork};
use thiserror::Error;
use tracing::info;

use crate::config::RelayerConfig;
use crate::loops::run_loop;
use crate::retry::RetryConfig;
use crate::shutdown::Shutdown;

pub const RELAYER_LOOP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Blocks per window when scanning back for `ValsetUpdatedEvent`
pub const DEFAULT_VALSET_SEARCH_WINDOW: u64 = 2000;

const LOOP_NAME: &str = "relayer";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayerError {
    #[error("No ValsetUpdatedEvent found on Ethereum at or below block {searched_from}")]
    NotFound { searched_from: u64 },
}

#[derive(Debug, Clone)]
pub struct RelayerSettings {
    pub relay_valsets: bool,
    pub relay_valset_offset: Duration,
    pub relay_batches: bool,
    pub relay_batch_offset: Duration,
    pub loop_interval: Duration,
    pub valset_search_window: u64,
}

impl Default for RelayerSettings {
    fn default() -> Self {
        Self {
            relay_valsets: true,
            relay_valset_offset: Duration::from_secs(5 * 60),
            relay_batches: true,
            relay_batch_offset: Duration::from_secs(5 * 60),
            loop_interval: RELAYER_LOOP_INTERVAL,
            valset_search_window: DEFAULT_VALSET_SEARCH_WINDOW,
        }
    }
}

impl From<&RelayerConfig> for RelayerSettings {
    fn from(config: &RelayerConfig) -> Self {
        Self {
            relay_valsets: config.relay_valsets,
            relay_valset_offset: config.relay_valset_offset(),
            relay_batches: config.relay_batches,
            relay_batch_offset: config.relay_batch_offset(),
            loop_interval: config.loop_interval(),
            valset_search_window: config.valset_search_window,
        }
    }
}

pub struct EthRelayer {
    cosmos: Arc<dyn CosmosNetwork>,
    ethereum: Arc<dyn EthereumNetwork>,
    settings: RelayerSettings,
    retry: RetryConfig,
    shutdown: Shutdown,
}

impl EthRelayer {
    pub fn new(
        cosmos: Arc<dyn CosmosNetwork>,
        ethereum: Arc<dyn EthereumNetwork>,
        settings: RelayerSettings,
        retry: RetryConfig,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            cosmos,
            ethereum,
            settings,
            retry,
            shutdown,
        }
    }

    pub async fn run(&self) -> Result<()> {
        if !self.settings.relay_valsets && !self.settings.relay_batches {
            info!("Valset and batch relaying both disabled, relayer not started");
            return Ok(());
        }

        run_loop(LOOP_NAME, self.settings.loop_interval, &self.shutdown, || {
            self.relay()
        })
        .await
    }

    /// One relayer iteration.
    ///
    /// A failure in valset relaying does not cancel batch relaying or the
    /// other way around; both errors are reported.
    pub async fn relay(&self) -> Result<()> {
        let eth_valset = self.find_latest_valset_on_eth().await?;

        let valsets = async {
            if self.settings.relay_valsets {
                self.relay_valset(&eth_valset).await
            } else {
                Ok(())
            }
        };
        let batches = async {
            if self.settings.relay_batches {
                self.relay_batch(&eth_valset).await
            } else {
                Ok(())
            }
        };

        match tokio::join!(valsets, batches) {
            (Ok(()), Ok(())) => Ok(()),
            (Err(e), Ok(())) => Err(e.wrap_err("Valset relay failed")),
            (Ok(()), Err(e)) => Err(e.wrap_err("Batch relay failed")),
            (Err(valset_err), Err(batch_err)) => Err(valset_err.wrap_err(format!(
                "Valset relay failed; batch relay also failed: {:#}",
                batch_err
            ))),
        }
    }
}
