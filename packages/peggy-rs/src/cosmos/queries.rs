//! Peggy module queries
//!
//! Reads go through the chain's LCD (REST gateway) for module state and
//! through Tendermint RPC for block headers. The gateway renders `uint64`
//! fields as decimal strings, so the wire structs below accept both.

use crate::hash::bytes32_tag;
use crate::types::{
    BatchConfirm, BatchFees, BridgeParams, BridgeValidator, Erc20Token, LastClaimEvent,
    OutgoingTransferTx, OutgoingTxBatch, Valset, ValsetConfirm,
};
use alloy::primitives::{Address, B256, U256};
use chrono::{DateTime, Utc};
use eyre::{eyre, Result, WrapErr};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use std::str::FromStr;
use std::time::Duration;
use tendermint_rpc::{Client as _, HttpClient, Url};
use tracing::debug;

// ============================================================================
// Wire helpers
// ============================================================================

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    String(String),
    Number(u64),
}

fn de_u64<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u64, D::Error> {
    match Option::<StringOrNumber>::deserialize(deserializer)? {
        None => Ok(0),
        Some(StringOrNumber::Number(n)) => Ok(n),
        Some(StringOrNumber::String(s)) if s.is_empty() => Ok(0),
        Some(StringOrNumber::String(s)) => s.parse().map_err(serde::de::Error::custom),
    }
}

fn parse_address(value: &str, field: &str) -> Result<Address> {
    if value.is_empty() {
        return Ok(Address::ZERO);
    }
    Address::from_str(value).map_err(|e| eyre!("Invalid {} '{}': {}", field, value, e))
}

fn parse_amount(value: &str, field: &str) -> Result<U256> {
    if value.is_empty() {
        return Ok(U256::ZERO);
    }
    U256::from_str_radix(value, 10).map_err(|e| eyre!("Invalid {} '{}': {}", field, value, e))
}

/// Signatures are stored hex-encoded, with or without a `0x` prefix
pub fn parse_signature(value: &str) -> Result<Vec<u8>> {
    hex::decode(value.trim_start_matches("0x"))
        .map_err(|e| eyre!("Invalid signature hex '{}': {}", value, e))
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Debug, Deserialize)]
struct BridgeValidatorJson {
    #[serde(default, deserialize_with = "de_u64")]
    power: u64,
    #[serde(default)]
    ethereum_address: String,
}

#[derive(Debug, Deserialize)]
struct ValsetJson {
    #[serde(default, deserialize_with = "de_u64")]
    nonce: u64,
    #[serde(default)]
    members: Vec<BridgeValidatorJson>,
    #[serde(default, deserialize_with = "de_u64")]
    height: u64,
    #[serde(default)]
    reward_amount: String,
    #[serde(default)]
    reward_token: String,
}

impl TryFrom<ValsetJson> for Valset {
    type Error = eyre::Report;

    fn try_from(json: ValsetJson) -> Result<Self> {
        let members = json
            .members
            .into_iter()
            .map(|m| {
                Ok(BridgeValidator::new(
                    parse_address(&m.ethereum_address, "ethereum_address")?,
                    m.power,
                ))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Valset {
            nonce: json.nonce,
            members,
            height: json.height,
            reward_amount: parse_amount(&json.reward_amount, "reward_amount")?,
            reward_token: parse_address(&json.reward_token, "reward_token")?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct Erc20TokenJson {
    #[serde(default)]
    contract: String,
    #[serde(default)]
    amount: String,
}

impl TryFrom<Erc20TokenJson> for Erc20Token {
    type Error = eyre::Report;

    fn try_from(json: Erc20TokenJson) -> Result<Self> {
        Ok(Erc20Token {
            contract: parse_address(&json.contract, "contract")?,
            amount: parse_amount(&json.amount, "amount")?,
        })
    }
}

#[derive(Debug, Deserialize)]
struct OutgoingTransferTxJson {
    #[serde(default, deserialize_with = "de_u64")]
    id: u64,
    #[serde(default)]
    sender: String,
    #[serde(default)]
    dest_address: String,
    erc20_token: Option<Erc20TokenJson>,
    erc20_fee: Option<Erc20TokenJson>,
}

#[derive(Debug, Deserialize)]
struct OutgoingTxBatchJson {
    #[serde(default, deserialize_with = "de_u64")]
    batch_nonce: u64,
    #[serde(default, deserialize_with = "de_u64")]
    batch_timeout: u64,
    #[serde(default)]
    transactions: Vec<OutgoingTransferTxJson>,
    #[serde(default)]
    token_contract: String,
    #[serde(default, deserialize_with = "de_u64")]
    block: u64,
}

impl TryFrom<OutgoingTxBatchJson> for OutgoingTxBatch {
    type Error = eyre::Report;

    fn try_from(json: OutgoingTxBatchJson) -> Result<Self> {
        let transactions = json
            .transactions
            .into_iter()
            .map(|tx| {
                Ok(OutgoingTransferTx {
                    id: tx.id,
                    sender: tx.sender,
                    dest_address: parse_address(&tx.dest_address, "dest_address")?,
                    erc20_token: tx
                        .erc20_token
                        .map(Erc20Token::try_from)
                        .transpose()?
                        .unwrap_or_default(),
                    erc20_fee: tx
                        .erc20_fee
                        .map(Erc20Token::try_from)
                        .transpose()?
                        .unwrap_or_default(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(OutgoingTxBatch {
            batch_nonce: json.batch_nonce,
            batch_timeout: json.batch_timeout,
            transactions,
            token_contract: parse_address(&json.token_contract, "token_contract")?,
            block: json.block,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ValsetConfirmJson {
    #[serde(default, deserialize_with = "de_u64")]
    nonce: u64,
    #[serde(default)]
    orchestrator: String,
    #[serde(default)]
    eth_address: String,
    #[serde(default)]
    signature: String,
}

#[derive(Debug, Deserialize)]
struct BatchConfirmJson {
    #[serde(default, deserialize_with = "de_u64")]
    nonce: u64,
    #[serde(default)]
    token_contract: String,
    #[serde(default)]
    eth_signer: String,
    #[serde(default)]
    orchestrator: String,
    #[serde(default)]
    signature: String,
}

#[derive(Debug, Deserialize)]
struct ParamsJson {
    #[serde(default)]
    peggy_id: String,
    #[serde(default)]
    bridge_ethereum_address: String,
    #[serde(default, deserialize_with = "de_u64")]
    bridge_chain_id: u64,
    #[serde(default, deserialize_with = "de_u64")]
    bridge_contract_start_height: u64,
}

#[derive(Debug, Deserialize)]
struct ParamsResponse {
    params: ParamsJson,
}

#[derive(Debug, Deserialize)]
struct ValsetResponse {
    valset: Option<ValsetJson>,
}

#[derive(Debug, Deserialize)]
struct ValsetsResponse {
    #[serde(default)]
    valsets: Vec<ValsetJson>,
}

#[derive(Debug, Deserialize)]
struct ValsetConfirmsResponse {
    #[serde(default)]
    confirms: Vec<ValsetConfirmJson>,
}

#[derive(Debug, Deserialize)]
struct BatchConfirmsResponse {
    #[serde(default)]
    confirms: Vec<BatchConfirmJson>,
}

#[derive(Debug, Deserialize)]
struct BatchResponse {
    batch: Option<OutgoingTxBatchJson>,
}

#[derive(Debug, Deserialize)]
struct BatchesResponse {
    #[serde(default)]
    batches: Vec<OutgoingTxBatchJson>,
}

#[derive(Debug, Deserialize)]
struct BatchFeeJson {
    #[serde(default)]
    token: String,
    #[serde(default)]
    total_fees: String,
}

#[derive(Debug, Deserialize)]
struct BatchFeesResponse {
    #[serde(default)]
    batch_fees: Vec<BatchFeeJson>,
}

#[derive(Debug, Deserialize)]
struct LastClaimEventJson {
    #[serde(default, deserialize_with = "de_u64")]
    ethereum_event_nonce: u64,
    #[serde(default, deserialize_with = "de_u64")]
    ethereum_event_height: u64,
}

#[derive(Debug, Deserialize)]
struct LastClaimEventResponse {
    last_claim_event: Option<LastClaimEventJson>,
}

// ============================================================================
// Query client
// ============================================================================

/// Read-only access to peggy module state and Tendermint headers
pub struct PeggyQueryClient {
    lcd_url: String,
    client: Client,
    tendermint: HttpClient,
}

impl PeggyQueryClient {
    pub fn new(lcd_url: &str, tendermint_rpc_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .wrap_err("Failed to create HTTP client")?;

        let url: Url = tendermint_rpc_url
            .parse()
            .wrap_err("Failed to parse Tendermint RPC URL")?;
        let tendermint = HttpClient::new(url).wrap_err("Failed to create Tendermint RPC client")?;

        Ok(Self {
            lcd_url: lcd_url.trim_end_matches('/').to_string(),
            client,
            tendermint,
        })
    }

    /// GET a JSON document; `Ok(None)` when the gateway answers 404
    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let url = format!("{}{}", self.lcd_url, path);
        debug!(url = %url, "Querying LCD");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .wrap_err_with(|| format!("Failed to query {}", path))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(eyre!(
                "Query {} failed: {} - {}",
                path,
                status,
                response.text().await.unwrap_or_default()
            ));
        }

        let body = response
            .json::<T>()
            .await
            .wrap_err_with(|| format!("Failed to parse response from {}", path))?;
        Ok(Some(body))
    }

    pub async fn params(&self) -> Result<BridgeParams> {
        let response: ParamsResponse = self
            .get_json("/peggy/v1/params")
            .await?
            .ok_or_else(|| eyre!("Peggy params not found"))?;
        let params = response.params;

        Ok(BridgeParams {
            bridge_id: B256::from(bytes32_tag(&params.peggy_id)),
            bridge_contract_address: parse_address(
                &params.bridge_ethereum_address,
                "bridge_ethereum_address",
            )?,
            bridge_chain_id: params.bridge_chain_id,
            bridge_contract_start_height: params.bridge_contract_start_height,
        })
    }

    pub async fn current_valset(&self) -> Result<Valset> {
        let response: ValsetResponse = self
            .get_json("/peggy/v1/valset/current")
            .await?
            .ok_or_else(|| eyre!("Current valset not found"))?;
        response
            .valset
            .ok_or_else(|| eyre!("Current valset not found"))?
            .try_into()
    }

    pub async fn valset_at(&self, nonce: u64) -> Result<Option<Valset>> {
        let response: Option<ValsetResponse> = self
            .get_json(&format!("/peggy/v1/valset?nonce={}", nonce))
            .await?;
        match response.and_then(|r| r.valset) {
            // An unknown nonce can come back as an empty valset instead of null
            Some(json) if json.nonce == 0 && json.members.is_empty() => Ok(None),
            Some(json) => Ok(Some(json.try_into()?)),
            None => Ok(None),
        }
    }

    /// Recent valset requests, newest first
    pub async fn latest_valsets(&self) -> Result<Vec<Valset>> {
        let response: Option<ValsetsResponse> =
            self.get_json("/peggy/v1/valset/requests").await?;
        let mut valsets = response
            .map(|r| r.valsets)
            .unwrap_or_default()
            .into_iter()
            .map(Valset::try_from)
            .collect::<Result<Vec<_>>>()?;
        valsets.sort_by(|a, b| b.nonce.cmp(&a.nonce));
        Ok(valsets)
    }

    pub async fn all_valset_confirms(&self, nonce: u64) -> Result<Vec<ValsetConfirm>> {
        let response: Option<ValsetConfirmsResponse> = self
            .get_json(&format!("/peggy/v1/confirms/{}", nonce))
            .await?;
        response
            .map(|r| r.confirms)
            .unwrap_or_default()
            .into_iter()
            .map(|c| {
                Ok(ValsetConfirm {
                    nonce: c.nonce,
                    orchestrator: c.orchestrator,
                    eth_address: parse_address(&c.eth_address, "eth_address")?,
                    signature: parse_signature(&c.signature)?,
                })
            })
            .collect()
    }

    /// Valsets `address` still has to confirm, oldest first
    pub async fn oldest_unsigned_valsets(&self, address: &str) -> Result<Vec<Valset>> {
        let response: Option<ValsetsResponse> = self
            .get_json(&format!("/peggy/v1/valset/last?address={}", address))
            .await?;
        let mut valsets = response
            .map(|r| r.valsets)
            .unwrap_or_default()
            .into_iter()
            .map(Valset::try_from)
            .collect::<Result<Vec<_>>>()?;
        valsets.sort_by_key(|v| v.nonce);
        Ok(valsets)
    }

    /// Pending batches, newest first
    pub async fn latest_transaction_batches(&self) -> Result<Vec<OutgoingTxBatch>> {
        let response: Option<BatchesResponse> =
            self.get_json("/peggy/v1/batch/outgoingtx").await?;
        let mut batches = response
            .map(|r| r.batches)
            .unwrap_or_default()
            .into_iter()
            .map(OutgoingTxBatch::try_from)
            .collect::<Result<Vec<_>>>()?;
        batches.sort_by(|a, b| b.batch_nonce.cmp(&a.batch_nonce));
        Ok(batches)
    }

    pub async fn transaction_batch_signatures(
        &self,
        nonce: u64,
        token_contract: Address,
    ) -> Result<Vec<BatchConfirm>> {
        let response: Option<BatchConfirmsResponse> = self
            .get_json(&format!(
                "/peggy/v1/batch/confirms?nonce={}&contract_address={}",
                nonce, token_contract
            ))
            .await?;
        response
            .map(|r| r.confirms)
            .unwrap_or_default()
            .into_iter()
            .map(|c| {
                Ok(BatchConfirm {
                    nonce: c.nonce,
                    token_contract: parse_address(&c.token_contract, "token_contract")?,
                    eth_signer: parse_address(&c.eth_signer, "eth_signer")?,
                    orchestrator: c.orchestrator,
                    signature: parse_signature(&c.signature)?,
                })
            })
            .collect()
    }

    pub async fn oldest_unsigned_transaction_batch(
        &self,
        address: &str,
    ) -> Result<Option<OutgoingTxBatch>> {
        let response: Option<BatchResponse> = self
            .get_json(&format!("/peggy/v1/batch/last?address={}", address))
            .await?;
        match response.and_then(|r| r.batch) {
            Some(json) if json.batch_nonce == 0 => Ok(None),
            Some(json) => Ok(Some(json.try_into()?)),
            None => Ok(None),
        }
    }

    pub async fn unbatched_token_fees(&self) -> Result<Vec<BatchFees>> {
        let response: Option<BatchFeesResponse> = self.get_json("/peggy/v1/batchfees").await?;
        response
            .map(|r| r.batch_fees)
            .unwrap_or_default()
            .into_iter()
            .map(|f| {
                Ok(BatchFees {
                    token: parse_address(&f.token, "token")?,
                    total_fees: parse_amount(&f.total_fees, "total_fees")?,
                })
            })
            .collect()
    }

    pub async fn last_claim_event_by_addr(&self, address: &str) -> Result<LastClaimEvent> {
        let response: Option<LastClaimEventResponse> = self
            .get_json(&format!("/peggy/v1/oracle/event/{}", address))
            .await?;
        Ok(response
            .and_then(|r| r.last_claim_event)
            .map(|e| LastClaimEvent {
                ethereum_event_nonce: e.ethereum_event_nonce,
                ethereum_event_height: e.ethereum_event_height,
            })
            .unwrap_or_default())
    }

    pub async fn block_time(&self, height: u64) -> Result<DateTime<Utc>> {
        let height = tendermint::block::Height::try_from(height)
            .map_err(|e| eyre!("Invalid block height {}: {}", height, e))?;

        let response = self
            .tendermint
            .block(height)
            .await
            .wrap_err_with(|| format!("Failed to get block {}", height))?;

        let nanos = response.block.header.time.unix_timestamp_nanos();
        let secs = nanos.div_euclid(1_000_000_000) as i64;
        let subsec = nanos.rem_euclid(1_000_000_000) as u32;
        DateTime::from_timestamp(secs, subsec)
            .ok_or_else(|| eyre!("Block {} time out of range", height))
    }
}
