use eyre::Result;
use peggy_rs::Valset;
use tracing::{debug, error, warn};

use super::{EthRelayer, RelayerError, LOOP_NAME};
use crate::retry::retry_logged;

/// Block ranges `[start, end]` walking back from a head height to block 0.
///
/// Windows do not overlap and the last one always starts at 0, so the
/// iterator is finite for any head and any non-zero window size.
#[derive(Debug, Clone)]
pub struct DescendingWindows {
    next_end: Option<u64>,
    window: u64,
}

impl DescendingWindows {
    pub fn new(head: u64, window: u64) -> Self {
        Self {
            next_end: Some(head),
            window: window.max(1),
        }
    }
}

impl Iterator for DescendingWindows {
    type Item = (u64, u64);

    fn next(&mut self) -> Option<Self::Item> {
        let end = self.next_end?;
        let start = end.saturating_sub(self.window - 1);
        self.next_end = start.checked_sub(1);
        Some((start, end))
    }
}

/// How the Ethereum valset disagrees with Cosmos at the same nonce
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValsetMismatch {
    MissingOnCosmos { nonce: u64 },
    Nonce { cosmos: u64, ethereum: u64 },
    MemberCount { cosmos: usize, ethereum: usize },
    Members,
}

/// Compare the valset applied on Ethereum with the Cosmos record for the
/// same nonce. `None` means they agree.
pub fn check_if_valsets_differ(cosmos: Option<&Valset>, ethereum: &Valset) -> Option<ValsetMismatch> {
    let Some(cosmos) = cosmos else {
        // The contract's constructor valset has nonce 0 and no Cosmos record
        if ethereum.nonce == 0 {
            return None;
        }
        return Some(ValsetMismatch::MissingOnCosmos {
            nonce: ethereum.nonce,
        });
    };

    if cosmos.nonce != ethereum.nonce {
        return Some(ValsetMismatch::Nonce {
            cosmos: cosmos.nonce,
            ethereum: ethereum.nonce,
        });
    }
    if cosmos.members.len() != ethereum.members.len() {
        return Some(ValsetMismatch::MemberCount {
            cosmos: cosmos.members.len(),
            ethereum: ethereum.members.len(),
        });
    }
    if cosmos.sorted_members() != ethereum.sorted_members() {
        return Some(ValsetMismatch::Members);
    }
    None
}

impl EthRelayer {
    /// Rebuild the valset currently applied on Ethereum from the most recent
    /// `ValsetUpdatedEvent`, scanning back one window at a time.
    pub async fn find_latest_valset_on_eth(&self) -> Result<Valset> {
        let eth_nonce = retry_logged(
            &self.retry,
            &self.shutdown,
            LOOP_NAME,
            "get_valset_nonce",
            || self.ethereum.get_valset_nonce(),
        )
        .await?;
        let head = retry_logged(
            &self.retry,
            &self.shutdown,
            LOOP_NAME,
            "header_by_number",
            || self.ethereum.header_by_number(None),
        )
        .await?
        .number;

        for (start, end) in DescendingWindows::new(head, self.settings.valset_search_window) {
            let events = retry_logged(
                &self.retry,
                &self.shutdown,
                LOOP_NAME,
                "get_valset_updated_events",
                || self.ethereum.get_valset_updated_events(start, end),
            )
            .await?;

            let Some(latest) = events.iter().max_by_key(|e| e.new_valset_nonce) else {
                continue;
            };

            let valset = latest.to_valset();
            debug!(
                valset_nonce = valset.nonce,
                contract_nonce = eth_nonce,
                block = latest.block_height,
                "Found latest valset on Ethereum"
            );
            self.cross_check_with_cosmos(eth_nonce, &valset).await;
            return Ok(valset);
        }

        Err(RelayerError::NotFound {
            searched_from: head,
        }
        .into())
    }

    /// Detection only. A disagreement is logged and relaying carries on.
    async fn cross_check_with_cosmos(&self, eth_nonce: u64, eth_valset: &Valset) {
        if eth_nonce != eth_valset.nonce {
            warn!(
                contract_nonce = eth_nonce,
                event_nonce = eth_valset.nonce,
                "Contract valset nonce differs from the latest ValsetUpdatedEvent"
            );
        }

        let cosmos_valset = match self.cosmos.valset_at(eth_valset.nonce).await {
            Ok(valset) => valset,
            Err(e) => {
                warn!(
                    valset_nonce = eth_valset.nonce,
                    error = %e,
                    "Could not fetch Cosmos valset for comparison"
                );
                return;
            }
        };

        if let Some(mismatch) = check_if_valsets_differ(cosmos_valset.as_ref(), eth_valset) {
            error!(
                valset_nonce = eth_valset.nonce,
                mismatch = ?mismatch,
                "Ethereum valset does not match Cosmos, possible bridge hijack"
            );
        }
    }
}
