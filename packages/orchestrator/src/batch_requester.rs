//! Batch requester
//!
//! Asks Cosmos to cut a withdrawal batch for every token whose pending fees
//! are worth at least the configured USD minimum.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use bigdecimal::BigDecimal;
use eyre::{eyre, Result};
use peggy_rs::{BatchFees, CosmosNetwork};
use tracing::{debug, info, warn};

use crate::loops::run_loop;
use crate::metrics;
use crate::price_feed::PriceFeed;
use crate::retry::{retry_logged, RetryConfig};
use crate::shutdown::Shutdown;

const LOOP_NAME: &str = "batch_requester";

/// Fee amounts are assumed to use 18 decimals
const FEE_DECIMALS: i64 = 18;

/// Cosmos denom for `token`: the configured mapping, else the peggy voucher denom
pub fn token_denom(erc20_denoms: &HashMap<Address, String>, token: Address) -> String {
    match erc20_denoms.get(&token) {
        Some(denom) => denom.clone(),
        None => format!("peggy{}", token.to_checksum(None)),
    }
}

/// USD value of `total_fees` at `price_usd` per whole token
pub fn fee_value_usd(total_fees: U256, price_usd: f64) -> Result<BigDecimal> {
    let fees = BigDecimal::from_str(&total_fees.to_string())
        .map_err(|e| eyre!("Invalid fee amount {}: {}", total_fees, e))?;
    let price = BigDecimal::from_str(&price_usd.to_string())
        .map_err(|e| eyre!("Invalid token price {}: {}", price_usd, e))?;
    let scale = BigDecimal::new(1.into(), -FEE_DECIMALS);
    Ok(fees * price / scale)
}

pub struct BatchRequester {
    cosmos: Arc<dyn CosmosNetwork>,
    price_feed: Arc<dyn PriceFeed>,
    erc20_denoms: HashMap<Address, String>,
    min_batch_fee_usd: f64,
    loop_interval: Duration,
    retry: RetryConfig,
    shutdown: Shutdown,
}

impl BatchRequester {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cosmos: Arc<dyn CosmosNetwork>,
        price_feed: Arc<dyn PriceFeed>,
        erc20_denoms: HashMap<Address, String>,
        min_batch_fee_usd: f64,
        loop_interval: Duration,
        retry: RetryConfig,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            cosmos,
            price_feed,
            erc20_denoms,
            min_batch_fee_usd,
            loop_interval,
            retry,
            shutdown,
        }
    }

    pub async fn run(&self) -> Result<()> {
        run_loop(LOOP_NAME, self.loop_interval, &self.shutdown, || {
            self.request_batches()
        })
        .await
    }

    /// One iteration. Never fails: every problem is logged and skipped.
    pub async fn request_batches(&self) -> Result<()> {
        let fees = match retry_logged(
            &self.retry,
            &self.shutdown,
            LOOP_NAME,
            "unbatched_token_fees",
            || self.cosmos.unbatched_token_fees(),
        )
        .await
        {
            Ok(fees) => fees,
            Err(e) => {
                warn!(error = %e, "Unable to get unbatched token fees");
                return Ok(());
            }
        };

        if fees.is_empty() {
            debug!("No withdrawals to batch");
            return Ok(());
        }

        for fee in &fees {
            self.request_token_batch(fee).await;
        }
        Ok(())
    }

    async fn request_token_batch(&self, fee: &BatchFees) {
        if !self.meets_min_fee(fee).await {
            return;
        }

        let denom = token_denom(&self.erc20_denoms, fee.token);
        info!(
            denom = %denom,
            token_contract = %fee.token,
            total_fees = %fee.total_fees,
            "Requesting token batch"
        );

        match self.cosmos.send_request_batch(&denom).await {
            Ok(()) => metrics::record_batch_request(&denom, true),
            Err(e) => {
                metrics::record_batch_request(&denom, false);
                warn!(denom = %denom, error = %e, "Batch request failed");
            }
        }
    }

    async fn meets_min_fee(&self, fee: &BatchFees) -> bool {
        if self.min_batch_fee_usd == 0.0 {
            return true;
        }

        let price = match self.price_feed.query_usd_price(fee.token).await {
            Ok(price) => price,
            Err(e) => {
                warn!(token_contract = %fee.token, error = %e, "Failed to query token price");
                return false;
            }
        };

        let (value, min) = match (
            fee_value_usd(fee.total_fees, price),
            BigDecimal::from_str(&self.min_batch_fee_usd.to_string()),
        ) {
            (Ok(value), Ok(min)) => (value, min),
            (Err(e), _) => {
                warn!(token_contract = %fee.token, error = %e, "Failed to value batch fees");
                return false;
            }
            (_, Err(e)) => {
                warn!(error = %e, "Invalid minimum batch fee");
                return false;
            }
        };

        if value < min {
            debug!(
                token_contract = %fee.token,
                total_fee_usd = %value,
                min_fee_usd = %min,
                "Insufficient fees for batch request"
            );
            return false;
        }
        true
    }
}
