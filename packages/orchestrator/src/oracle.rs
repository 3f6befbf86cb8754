//! Ethereum event oracle
//!
//! Scans the Peggy contract for bridge events and submits them to Cosmos as
//! claims in strict nonce order. The only state kept between iterations is
//! `last_observed_eth_height`; everything else is re-derived from the claim
//! watermark on Cosmos, which makes a crashed or partially failed iteration
//! safe to repeat.

use std::sync::Arc;
use std::time::Duration;

use eyre::Result;
use peggy_rs::events::filter_events_after;
use peggy_rs::{BridgeEvent, CosmosNetwork, EthereumNetwork};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::OracleConfig;
use crate::loops::run_loop;
use crate::metrics;
use crate::retry::{is_cancelled, retry_logged, RetryConfig};
use crate::shutdown::Shutdown;

/// Blocks to stay behind the Ethereum head
pub const ETH_BLOCK_CONFIRMATION_DELAY: u64 = 12;

/// Maximum blocks scanned in one iteration
pub const DEFAULT_BLOCKS_TO_SEARCH: u64 = 2000;

/// How often the oracle rewinds to the last accepted claim
pub const RESYNC_INTERVAL: Duration = Duration::from_secs(24 * 60 * 60);

pub const ORACLE_LOOP_INTERVAL: Duration = Duration::from_secs(60);

const LOOP_NAME: &str = "oracle";

#[derive(Debug, Clone)]
pub struct OracleSettings {
    pub confirmation_delay: u64,
    pub max_block_span: u64,
    pub resync_interval: Duration,
    pub loop_interval: Duration,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            confirmation_delay: ETH_BLOCK_CONFIRMATION_DELAY,
            max_block_span: DEFAULT_BLOCKS_TO_SEARCH,
            resync_interval: RESYNC_INTERVAL,
            loop_interval: ORACLE_LOOP_INTERVAL,
        }
    }
}

impl From<&OracleConfig> for OracleSettings {
    fn from(config: &OracleConfig) -> Self {
        Self {
            confirmation_delay: config.confirmation_delay,
            max_block_span: config.max_block_span,
            resync_interval: config.resync_interval(),
            loop_interval: config.loop_interval(),
        }
    }
}

struct OracleState {
    last_observed_eth_height: u64,
    last_resync: Instant,
}

pub struct EthOracle {
    cosmos: Arc<dyn CosmosNetwork>,
    ethereum: Arc<dyn EthereumNetwork>,
    settings: OracleSettings,
    retry: RetryConfig,
    shutdown: Shutdown,
    state: Mutex<OracleState>,
}

impl EthOracle {
    pub fn new(
        cosmos: Arc<dyn CosmosNetwork>,
        ethereum: Arc<dyn EthereumNetwork>,
        settings: OracleSettings,
        retry: RetryConfig,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            cosmos,
            ethereum,
            settings,
            retry,
            shutdown,
            state: Mutex::new(OracleState {
                last_observed_eth_height: 0,
                last_resync: Instant::now(),
            }),
        }
    }

    pub async fn last_observed_eth_height(&self) -> u64 {
        self.state.lock().await.last_observed_eth_height
    }

    /// Start from the height of our last accepted claim, or from the
    /// contract deployment height if we have never claimed anything.
    pub async fn bootstrap(&self) -> Result<u64> {
        let orchestrator = self.cosmos.orchestrator_address();
        let last_claim = retry_logged(
            &self.retry,
            &self.shutdown,
            LOOP_NAME,
            "last_claim_event_by_addr",
            || self.cosmos.last_claim_event_by_addr(&orchestrator),
        )
        .await?;

        let height = if last_claim.ethereum_event_height != 0 {
            last_claim.ethereum_event_height
        } else {
            let params = retry_logged(
                &self.retry,
                &self.shutdown,
                LOOP_NAME,
                "bridge_params",
                || self.cosmos.bridge_params(),
            )
            .await?;
            params.bridge_contract_start_height
        };

        let mut state = self.state.lock().await;
        state.last_observed_eth_height = height;
        state.last_resync = Instant::now();
        metrics::set_last_observed_eth_height(height);

        info!(
            last_observed_eth_height = height,
            last_claim_nonce = last_claim.ethereum_event_nonce,
            "Oracle bootstrapped"
        );
        Ok(height)
    }

    /// Bootstrap, then observe on the loop interval until shutdown
    pub async fn run(&self) -> Result<()> {
        match self.bootstrap().await {
            Err(e) if is_cancelled(&e) => return Ok(()),
            Err(e) => return Err(e.wrap_err("Oracle bootstrap failed")),
            Ok(_) => {}
        }

        run_loop(LOOP_NAME, self.settings.loop_interval, &self.shutdown, || {
            self.observe_eth_events()
        })
        .await
    }

    /// One oracle iteration: observe new events, then resync if the interval elapsed.
    ///
    /// The state lock is only taken to read and store; no RPC runs under it.
    pub async fn observe_eth_events(&self) -> Result<()> {
        let (last_observed, last_resync) = {
            let state = self.state.lock().await;
            (state.last_observed_eth_height, state.last_resync)
        };

        if let Some(height) = self.observe(last_observed).await? {
            self.advance(height).await;
        }

        if last_resync.elapsed() >= self.settings.resync_interval {
            let height = self.resync_height().await?;
            self.state.lock().await.last_resync = Instant::now();
            self.advance(height).await;
        }
        Ok(())
    }

    /// Returns the height to continue from, or `None` to stay put
    async fn observe(&self, last_observed: u64) -> Result<Option<u64>> {
        let eth_address = self.ethereum.from_address();
        let orchestrator = self.cosmos.orchestrator_address();

        let valset = retry_logged(
            &self.retry,
            &self.shutdown,
            LOOP_NAME,
            "current_valset",
            || self.cosmos.current_valset(),
        )
        .await?;
        if !valset.contains(&eth_address) {
            debug!(
                eth_address = %eth_address,
                valset_nonce = valset.nonce,
                "Not in the current valset, skipping event observation"
            );
            return Ok(None);
        }

        let latest = retry_logged(
            &self.retry,
            &self.shutdown,
            LOOP_NAME,
            "header_by_number",
            || self.ethereum.header_by_number(None),
        )
        .await?
        .number;

        if latest <= self.settings.confirmation_delay {
            debug!(latest_height = latest, "Ethereum chain too short to observe");
            return Ok(None);
        }

        let mut safe_height = latest - self.settings.confirmation_delay;
        if safe_height <= last_observed {
            debug!(
                safe_height,
                last_observed_eth_height = last_observed,
                "No new finalized blocks"
            );
            return Ok(None);
        }
        safe_height = safe_height.min(last_observed.saturating_add(self.settings.max_block_span));

        // The start bound overlaps the last scanned block on purpose. A crash
        // may have claimed only part of it; nonce filtering drops the rest.
        let events = retry_logged(
            &self.retry,
            &self.shutdown,
            LOOP_NAME,
            "fetch_events",
            || self.fetch_events(last_observed, safe_height),
        )
        .await?;

        let last_claim = retry_logged(
            &self.retry,
            &self.shutdown,
            LOOP_NAME,
            "last_claim_event_by_addr",
            || self.cosmos.last_claim_event_by_addr(&orchestrator),
        )
        .await?;

        let new_events = filter_events_after(events.clone(), last_claim.ethereum_event_nonce);
        let Some(first) = new_events.first() else {
            debug!(
                from_block = last_observed,
                to_block = safe_height,
                "No new bridge events"
            );
            return Ok(Some(safe_height));
        };

        let expected = last_claim.ethereum_event_nonce + 1;
        if first.nonce() != expected {
            warn!(
                expected_nonce = expected,
                found_nonce = first.nonce(),
                resync_height = last_claim.ethereum_event_height,
                "Event nonce gap, resyncing to the last claimed event"
            );
            metrics::record_oracle_resync("nonce_gap");
            return Ok(Some(last_claim.ethereum_event_height));
        }

        info!(
            from_block = last_observed,
            to_block = safe_height,
            count = new_events.len(),
            first_nonce = first.nonce(),
            "Sending Ethereum claims"
        );

        retry_logged(
            &self.retry,
            &self.shutdown,
            LOOP_NAME,
            "send_ethereum_claims",
            || self.send_claims(&orchestrator, &events),
        )
        .await?;

        Ok(Some(safe_height))
    }

    async fn resync_height(&self) -> Result<u64> {
        let orchestrator = self.cosmos.orchestrator_address();
        let last_claim = retry_logged(
            &self.retry,
            &self.shutdown,
            LOOP_NAME,
            "last_claim_event_by_addr",
            || self.cosmos.last_claim_event_by_addr(&orchestrator),
        )
        .await?;
        info!(
            resync_height = last_claim.ethereum_event_height,
            "Periodic resync to the last claimed event"
        );
        metrics::record_oracle_resync("periodic");
        Ok(last_claim.ethereum_event_height)
    }

    async fn advance(&self, height: u64) {
        self.state.lock().await.last_observed_eth_height = height;
        metrics::set_last_observed_eth_height(height);
    }

    /// All five event kinds over `[start, end]`, unsorted
    async fn fetch_events(&self, start: u64, end: u64) -> Result<Vec<BridgeEvent>> {
        let (legacy, deposits, withdrawals, deployed, valsets) = tokio::try_join!(
            self.ethereum.get_legacy_deposit_events(start, end),
            self.ethereum.get_deposit_events(start, end),
            self.ethereum.get_withdrawal_batch_executed_events(start, end),
            self.ethereum.get_erc20_deployed_events(start, end),
            self.ethereum.get_valset_updated_events(start, end),
        )?;

        let mut events = Vec::with_capacity(
            legacy.len() + deposits.len() + withdrawals.len() + deployed.len() + valsets.len(),
        );
        events.extend(legacy.into_iter().map(BridgeEvent::LegacyDeposit));
        events.extend(deposits.into_iter().map(BridgeEvent::Deposit));
        events.extend(withdrawals.into_iter().map(BridgeEvent::WithdrawalBatchExecuted));
        events.extend(deployed.into_iter().map(BridgeEvent::Erc20Deployed));
        events.extend(valsets.into_iter().map(BridgeEvent::ValsetUpdated));
        Ok(events)
    }

    /// Re-read the watermark and submit whatever is still unclaimed.
    ///
    /// A previous attempt may have landed some claims before failing, so the
    /// events are filtered again against the fresh watermark every time.
    async fn send_claims(&self, orchestrator: &str, events: &[BridgeEvent]) -> Result<()> {
        let last_claim = self.cosmos.last_claim_event_by_addr(orchestrator).await?;
        let pending = filter_events_after(events.to_vec(), last_claim.ethereum_event_nonce);
        if pending.is_empty() {
            debug!(
                last_claim_nonce = last_claim.ethereum_event_nonce,
                "All events already claimed"
            );
            return Ok(());
        }

        let kinds: Vec<&'static str> = pending.iter().map(BridgeEvent::kind).collect();
        let last_nonce = self
            .cosmos
            .send_ethereum_claims(last_claim.ethereum_event_nonce, pending)
            .await?;
        for kind in kinds {
            metrics::record_claim_sent(kind);
        }

        info!(
            last_claim_nonce = last_claim.ethereum_event_nonce,
            last_sent_nonce = last_nonce,
            "Ethereum claims sent"
        );
        Ok(())
    }
}
