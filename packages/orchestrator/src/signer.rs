//! Confirmation signer
//!
//! Signs every valset and batch checkpoint this validator has not confirmed
//! yet and submits the signatures to Cosmos, where the relayer collects them.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::B256;
use eyre::{Result, WrapErr};
use peggy_rs::{encode_batch_checkpoint, encode_valset_checkpoint, CosmosNetwork, EthSigner};
use tracing::{debug, info};

use crate::loops::run_loop;
use crate::metrics;
use crate::retry::{retry_logged, RetryConfig};
use crate::shutdown::Shutdown;

const LOOP_NAME: &str = "signer";

pub struct EthSignerLoop {
    cosmos: Arc<dyn CosmosNetwork>,
    signer: Arc<dyn EthSigner>,
    bridge_id: B256,
    loop_interval: Duration,
    retry: RetryConfig,
    shutdown: Shutdown,
}

impl EthSignerLoop {
    pub fn new(
        cosmos: Arc<dyn CosmosNetwork>,
        signer: Arc<dyn EthSigner>,
        bridge_id: B256,
        loop_interval: Duration,
        retry: RetryConfig,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            cosmos,
            signer,
            bridge_id,
            loop_interval,
            retry,
            shutdown,
        }
    }

    pub async fn run(&self) -> Result<()> {
        run_loop(LOOP_NAME, self.loop_interval, &self.shutdown, || {
            self.sign_pending()
        })
        .await
    }

    /// One signer iteration: valsets first, then the pending batch
    pub async fn sign_pending(&self) -> Result<()> {
        self.sign_valsets().await?;
        self.sign_batch().await?;
        Ok(())
    }

    async fn sign_valsets(&self) -> Result<()> {
        let orchestrator = self.cosmos.orchestrator_address();
        let valsets = retry_logged(
            &self.retry,
            &self.shutdown,
            LOOP_NAME,
            "oldest_unsigned_valsets",
            || self.cosmos.oldest_unsigned_valsets(&orchestrator),
        )
        .await?;

        if valsets.is_empty() {
            debug!("No valset updates to confirm");
            return Ok(());
        }

        let eth_address = self.signer.address();
        for valset in &valsets {
            let checkpoint = encode_valset_checkpoint(self.bridge_id, valset);
            let signature = self
                .signer
                .sign(eth_address, checkpoint)
                .await
                .wrap_err_with(|| format!("Failed to sign valset {}", valset.nonce))?;

            retry_logged(
                &self.retry,
                &self.shutdown,
                LOOP_NAME,
                "send_valset_confirm",
                || {
                    self.cosmos.send_valset_confirm(
                        eth_address,
                        self.bridge_id,
                        valset,
                        signature.clone(),
                    )
                },
            )
            .await?;

            metrics::record_confirmation_sent("valset");
            info!(
                valset_nonce = valset.nonce,
                validators = valset.members.len(),
                checkpoint = %checkpoint,
                "Confirmed valset update"
            );
        }

        Ok(())
    }

    async fn sign_batch(&self) -> Result<()> {
        let orchestrator = self.cosmos.orchestrator_address();
        let batch = retry_logged(
            &self.retry,
            &self.shutdown,
            LOOP_NAME,
            "oldest_unsigned_transaction_batch",
            || self.cosmos.oldest_unsigned_transaction_batch(&orchestrator),
        )
        .await?;

        let Some(batch) = batch else {
            debug!("No transaction batch to confirm");
            return Ok(());
        };

        let eth_address = self.signer.address();
        let checkpoint = encode_batch_checkpoint(self.bridge_id, &batch);
        let signature = self
            .signer
            .sign(eth_address, checkpoint)
            .await
            .wrap_err_with(|| format!("Failed to sign batch {}", batch.batch_nonce))?;

        retry_logged(
            &self.retry,
            &self.shutdown,
            LOOP_NAME,
            "send_batch_confirm",
            || {
                self.cosmos
                    .send_batch_confirm(eth_address, self.bridge_id, &batch, signature.clone())
            },
        )
        .await?;

        metrics::record_confirmation_sent("batch");
        info!(
            batch_nonce = batch.batch_nonce,
            token_contract = %batch.token_contract,
            txs = batch.transactions.len(),
            "Confirmed transaction batch"
        );
        Ok(())
    }
}
