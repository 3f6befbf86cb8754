use chrono::Utc;
use eyre::Result;
use peggy_rs::{check_and_repack_signatures, BatchConfirm, OutgoingTxBatch, Valset};
use tracing::{debug, info, warn};

use super::valset::relay_due;
use super::{EthRelayer, LOOP_NAME};
use crate::metrics;
use crate::retry::retry_logged;

impl EthRelayer {
    /// Relay the oldest confirmed batch that has not timed out
    pub(super) async fn relay_batch(&self, eth_valset: &Valset) -> Result<()> {
        let head = retry_logged(
            &self.retry,
            &self.shutdown,
            LOOP_NAME,
            "header_by_number",
            || self.ethereum.header_by_number(None),
        )
        .await?
        .number;

        let batches = retry_logged(
            &self.retry,
            &self.shutdown,
            LOOP_NAME,
            "latest_transaction_batches",
            || self.cosmos.latest_transaction_batches(),
        )
        .await?;

        // Batches arrive newest first; the last confirmed one wins
        let mut oldest: Option<(OutgoingTxBatch, Vec<BatchConfirm>)> = None;
        for batch in batches {
            if batch.is_timed_out(head) {
                debug!(
                    batch_nonce = batch.batch_nonce,
                    batch_timeout = batch.batch_timeout,
                    eth_height = head,
                    "Skipping timed out batch"
                );
                continue;
            }

            let confirms = retry_logged(
                &self.retry,
                &self.shutdown,
                LOOP_NAME,
                "transaction_batch_signatures",
                || {
                    self.cosmos
                        .transaction_batch_signatures(batch.batch_nonce, batch.token_contract)
                },
            )
            .await?;
            if confirms.is_empty() {
                continue;
            }
            oldest = Some((batch, confirms));
        }

        let Some((batch, confirms)) = oldest else {
            debug!("No confirmed batch to relay");
            return Ok(());
        };

        if !self.should_relay_batch(&batch).await? {
            return Ok(());
        }

        if let Err(e) = check_and_repack_signatures(eth_valset, &confirms) {
            warn!(
                batch_nonce = batch.batch_nonce,
                token_contract = %batch.token_contract,
                confirmations = confirms.len(),
                error = %e,
                "Batch confirmations not relayable yet"
            );
            return Ok(());
        }

        let sent = retry_logged(
            &self.retry,
            &self.shutdown,
            LOOP_NAME,
            "send_transaction_batch",
            || async {
                if self.ethereum.get_tx_batch_nonce(batch.token_contract).await? >= batch.batch_nonce {
                    return Ok(None);
                }
                self.ethereum
                    .send_transaction_batch(eth_valset, &batch, &confirms)
                    .await
                    .map(Some)
            },
        )
        .await?;

        let Some(tx_hash) = sent else {
            info!(
                batch_nonce = batch.batch_nonce,
                token_contract = %batch.token_contract,
                "Batch already executed on Ethereum, not resending"
            );
            return Ok(());
        };

        metrics::record_batch_relayed(&batch.token_contract.to_string());
        info!(
            batch_nonce = batch.batch_nonce,
            token_contract = %batch.token_contract,
            txs = batch.transactions.len(),
            tx_hash = %tx_hash,
            "Relayed transaction batch to Ethereum"
        );
        Ok(())
    }

    pub(super) async fn should_relay_batch(&self, batch: &OutgoingTxBatch) -> Result<bool> {
        let eth_nonce = retry_logged(
            &self.retry,
            &self.shutdown,
            LOOP_NAME,
            "get_tx_batch_nonce",
            || self.ethereum.get_tx_batch_nonce(batch.token_contract),
        )
        .await?;

        if batch.batch_nonce <= eth_nonce {
            debug!(
                batch_nonce = batch.batch_nonce,
                eth_nonce,
                token_contract = %batch.token_contract,
                "Batch already executed on Ethereum"
            );
            return Ok(false);
        }

        let created_at = match self.cosmos.get_block_time(batch.block).await {
            Ok(t) => t,
            Err(e) => {
                warn!(
                    batch_nonce = batch.batch_nonce,
                    height = batch.block,
                    error = %e,
                    "Unable to get block time for batch"
                );
                return Ok(false);
            }
        };

        let due = relay_due(
            batch.batch_nonce,
            eth_nonce,
            created_at,
            Utc::now(),
            self.settings.relay_batch_offset,
        );
        if !due {
            debug!(
                batch_nonce = batch.batch_nonce,
                created_at = %created_at,
                offset_secs = self.settings.relay_batch_offset.as_secs(),
                "Batch relay offset not yet elapsed"
            );
        }
        Ok(due)
    }
}
