//! USD price lookups for the batch requester

use alloy::primitives::Address;
use async_trait::async_trait;
use eyre::{eyre, Result, WrapErr};
use reqwest::Client;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// USD price of one whole unit of `token`
    async fn query_usd_price(&self, token: Address) -> Result<f64>;
}

/// CoinGecko `simple/token_price` endpoint for Ethereum mainnet tokens
pub struct CoinGeckoPriceFeed {
    base_url: String,
    client: Client,
}

impl CoinGeckoPriceFeed {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .wrap_err("Failed to build HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn price_url(&self, token: Address) -> String {
        format!(
            "{}/simple/token_price/ethereum?contract_addresses={}&vs_currencies=usd",
            self.base_url,
            to_lower_hex(token)
        )
    }
}

fn to_lower_hex(token: Address) -> String {
    format!("0x{}", hex::encode(token.as_slice()))
}

/// Pull the USD price for `token` out of a `simple/token_price` response
fn extract_usd_price(body: &HashMap<String, HashMap<String, f64>>, token: Address) -> Result<f64> {
    let key = to_lower_hex(token);
    let price = body
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(&key))
        .and_then(|(_, quotes)| quotes.get("usd"))
        .copied()
        .ok_or_else(|| eyre!("No USD price for token {}", token))?;

    if !price.is_finite() || price < 0.0 {
        return Err(eyre!("Invalid USD price {} for token {}", price, token));
    }
    Ok(price)
}

#[async_trait]
impl PriceFeed for CoinGeckoPriceFeed {
    async fn query_usd_price(&self, token: Address) -> Result<f64> {
        let url = self.price_url(token);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .wrap_err_with(|| format!("Failed to fetch token price from {}", url))?;

        if !response.status().is_success() {
            return Err(eyre!(
                "Price request for {} failed with status {}",
                token,
                response.status()
            ));
        }

        let body: HashMap<String, HashMap<String, f64>> = response
            .json()
            .await
            .wrap_err("Failed to parse token price response")?;

        let price = extract_usd_price(&body, token)?;
        debug!(token = %token, price_usd = price, "Fetched token price");
        Ok(price)
    }
}
