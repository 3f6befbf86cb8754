use std::time::Duration;

use chrono::{DateTime, Utc};
use eyre::Result;
use peggy_rs::{check_and_repack_signatures, Valset, ValsetConfirm};
use tracing::{debug, info, warn};

use super::{EthRelayer, LOOP_NAME};
use crate::metrics;
use crate::retry::retry_logged;

/// True when `nonce` is newer than what Ethereum has and the item was
/// created at least `offset` ago.
pub fn relay_due(
    nonce: u64,
    eth_nonce: u64,
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
    offset: Duration,
) -> bool {
    if nonce <= eth_nonce {
        return false;
    }
    match (now - created_at).to_std() {
        Ok(elapsed) => elapsed >= offset,
        // Block time ahead of our clock
        Err(_) => offset.is_zero(),
    }
}

impl EthRelayer {
    /// Relay the newest Cosmos valset that has collected any confirmations
    pub(super) async fn relay_valset(&self, eth_valset: &Valset) -> Result<()> {
        let latest = retry_logged(
            &self.retry,
            &self.shutdown,
            LOOP_NAME,
            "latest_valsets",
            || self.cosmos.latest_valsets(),
        )
        .await?;

        let mut candidate: Option<(Valset, Vec<ValsetConfirm>)> = None;
        for valset in latest {
            let confirms = retry_logged(
                &self.retry,
                &self.shutdown,
                LOOP_NAME,
                "all_valset_confirms",
                || self.cosmos.all_valset_confirms(valset.nonce),
            )
            .await?;
            if !confirms.is_empty() {
                candidate = Some((valset, confirms));
                break;
            }
        }

        let Some((new_valset, confirms)) = candidate else {
            debug!("No confirmed valset to relay");
            return Ok(());
        };

        if !self.should_relay_valset(&new_valset, eth_valset.nonce).await {
            return Ok(());
        }

        // Signatures are checked against the valset the contract holds now
        if let Err(e) = check_and_repack_signatures(eth_valset, &confirms) {
            warn!(
                valset_nonce = new_valset.nonce,
                confirmations = confirms.len(),
                error = %e,
                "Valset confirmations not relayable yet"
            );
            return Ok(());
        }

        // A failed attempt may still have landed, so each one re-reads the
        // contract nonce first
        let sent = retry_logged(
            &self.retry,
            &self.shutdown,
            LOOP_NAME,
            "send_eth_valset_update",
            || async {
                if self.ethereum.get_valset_nonce().await? >= new_valset.nonce {
                    return Ok(None);
                }
                self.ethereum
                    .send_eth_valset_update(eth_valset, &new_valset, &confirms)
                    .await
                    .map(Some)
            },
        )
        .await?;

        let Some(tx_hash) = sent else {
            info!(
                valset_nonce = new_valset.nonce,
                "Valset update already landed on Ethereum, not resending"
            );
            return Ok(());
        };

        metrics::record_valset_relayed();
        info!(
            from_nonce = eth_valset.nonce,
            to_nonce = new_valset.nonce,
            tx_hash = %tx_hash,
            "Relayed valset update to Ethereum"
        );
        Ok(())
    }

    pub(super) async fn should_relay_valset(&self, valset: &Valset, eth_nonce: u64) -> bool {
        if valset.nonce <= eth_nonce {
            debug!(
                valset_nonce = valset.nonce,
                eth_nonce, "Valset already applied on Ethereum"
            );
            return false;
        }

        let created_at = match self.cosmos.get_block_time(valset.height).await {
            Ok(t) => t,
            Err(e) => {
                warn!(
                    valset_nonce = valset.nonce,
                    height = valset.height,
                    error = %e,
                    "Unable to get block time for valset"
                );
                return false;
            }
        };

        let due = relay_due(
            valset.nonce,
            eth_nonce,
            created_at,
            Utc::now(),
            self.settings.relay_valset_offset,
        );
        if !due {
            debug!(
                valset_nonce = valset.nonce,
                created_at = %created_at,
                offset_secs = self.settings.relay_valset_offset.as_secs(),
                "Valset relay offset not yet elapsed"
            );
        }
        due
    }
}
