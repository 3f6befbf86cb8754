//! Cosmos transaction broadcasting
//!
//! One [`TxBroadcaster`] owns the orchestrator's Cosmos key. Every broadcast
//! holds a single mutex from account lookup through inclusion and a short
//! settle delay, so two transactions never race for the same sequence.

use async_trait::async_trait;
use bip39::Mnemonic;
use cosmrs::{
    bip32::DerivationPath,
    crypto::secp256k1::SigningKey,
    tendermint::chain,
    tx::{self, Fee, SignDoc, SignerInfo},
    AccountId, Any, Coin, Denom,
};
use eyre::{eyre, Result, WrapErr};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

/// Cosmos SDK derivation path (BIP44 coin type 118)
pub const DEFAULT_DERIVATION_PATH: &str = "m/44'/118'/0'/0/0";

/// Default gas limit per peggy message in a transaction
pub const DEFAULT_GAS_LIMIT: u64 = 400_000;

/// Default gas price in the fee denom
pub const DEFAULT_GAS_PRICE: f64 = 0.025;

/// Pause after each included transaction before the sequence is reused
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_millis(1200);

/// How long to wait for inclusion after a sync broadcast
pub const DEFAULT_CONFIRM_TIMEOUT: Duration = Duration::from_secs(30);

const INCLUSION_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct BroadcasterConfig {
    pub lcd_url: String,
    pub chain_id: String,
    pub derivation_path: Option<String>,
    pub account_prefix: String,
    /// Gas per message; a transaction gets this times its message count
    pub gas_limit: u64,
    pub gas_price: f64,
    pub fee_denom: String,
    pub request_timeout: Duration,
    pub settle_delay: Duration,
    pub confirm_timeout: Duration,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TxError {
    #[error("Transaction rejected by CheckTx ({codespace} code {code}): {log}")]
    Rejected {
        code: u32,
        codespace: String,
        log: String,
    },

    #[error("Transaction {tx_hash} failed in block ({codespace} code {code}): {log}")]
    Failed {
        tx_hash: String,
        code: u32,
        codespace: String,
        log: String,
    },

    #[error("Transaction {tx_hash} not included within {waited_secs}s")]
    NotIncluded { tx_hash: String, waited_secs: u64 },
}

/// Sequence and account number of the signing account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountInfo {
    pub account_number: u64,
    pub sequence: u64,
}

/// Transaction included in a block with code 0
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxResult {
    pub tx_hash: String,
    pub height: u64,
}

/// Signs and delivers peggy messages for one Cosmos account
#[async_trait]
pub trait MsgBroadcaster: Send + Sync {
    fn address(&self) -> &AccountId;

    /// Deliver `msgs` as one transaction, returning once it is in a block
    async fn broadcast(&self, msgs: Vec<Any>, memo: &str) -> Result<TxResult>;
}

// ----------------------------------------------------------------------------
// LCD wire types
// ----------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct BaseAccountJson {
    #[serde(default)]
    account_number: String,
    #[serde(default)]
    sequence: String,
}

/// `BaseAccount`, or a chain-specific account wrapping one in `base_account`
#[derive(Debug, Deserialize)]
struct AccountJson {
    #[serde(default)]
    base_account: Option<BaseAccountJson>,
    #[serde(flatten)]
    fields: BaseAccountJson,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    account: AccountJson,
}

#[derive(Debug, Serialize)]
struct BroadcastRequest<'a> {
    tx_bytes: String,
    mode: &'a str,
}

#[derive(Debug, Deserialize)]
struct TxResponseJson {
    txhash: String,
    #[serde(default)]
    code: u32,
    #[serde(default)]
    codespace: String,
    #[serde(default)]
    raw_log: String,
    #[serde(default)]
    height: String,
}

#[derive(Debug, Deserialize)]
struct TxEnvelope {
    tx_response: TxResponseJson,
}

fn parse_account_field(raw: &str, name: &str) -> Result<u64> {
    if raw.is_empty() {
        return Ok(0);
    }
    raw.parse()
        .map_err(|e| eyre!("Invalid {} {:?} in account response: {}", name, raw, e))
}

impl AccountJson {
    fn into_info(self) -> Result<AccountInfo> {
        let base = self.base_account.unwrap_or(self.fields);
        Ok(AccountInfo {
            account_number: parse_account_field(&base.account_number, "account_number")?,
            sequence: parse_account_field(&base.sequence, "sequence")?,
        })
    }
}

impl TxResponseJson {
    fn check_accepted(&self) -> Result<(), TxError> {
        if self.code == 0 {
            return Ok(());
        }
        Err(TxError::Rejected {
            code: self.code,
            codespace: self.codespace.clone(),
            log: self.raw_log.clone(),
        })
    }

    fn into_result(self) -> Result<TxResult, TxError> {
        if self.code != 0 {
            return Err(TxError::Failed {
                tx_hash: self.txhash,
                code: self.code,
                codespace: self.codespace,
                log: self.raw_log,
            });
        }
        Ok(TxResult {
            height: self.height.parse().unwrap_or_default(),
            tx_hash: self.txhash,
        })
    }
}

/// Secp256k1 key at `derivation_path` of a BIP39 mnemonic
pub fn derive_signing_key(mnemonic: &str, derivation_path: &str) -> Result<SigningKey> {
    let seed = Mnemonic::parse_normalized(mnemonic)
        .map_err(|e| eyre!("Invalid mnemonic: {}", e))?
        .to_seed("");
    let path: DerivationPath = derivation_path
        .parse()
        .map_err(|e| eyre!("Invalid derivation path {}: {:?}", derivation_path, e))?;
    SigningKey::derive_from_path(seed, &path)
        .map_err(|e| eyre!("Failed to derive signing key: {}", e))
}

pub struct TxBroadcaster {
    signing_key: SigningKey,
    address: AccountId,
    chain_id: chain::Id,
    fee_denom: Denom,
    lcd_url: String,
    client: Client,
    gas_limit: u64,
    gas_price: f64,
    settle_delay: Duration,
    confirm_timeout: Duration,
    lock: Mutex<()>,
}

impl TxBroadcaster {
    pub fn new(config: BroadcasterConfig, mnemonic: &str) -> Result<Self> {
        let signing_key = derive_signing_key(
            mnemonic,
            config
                .derivation_path
                .as_deref()
                .unwrap_or(DEFAULT_DERIVATION_PATH),
        )?;
        let address = signing_key
            .public_key()
            .account_id(&config.account_prefix)
            .map_err(|e| eyre!("Invalid account prefix {}: {}", config.account_prefix, e))?;
        let chain_id: chain::Id = config
            .chain_id
            .parse()
            .map_err(|e| eyre!("Invalid chain ID {}: {}", config.chain_id, e))?;
        let fee_denom: Denom = config
            .fee_denom
            .parse()
            .map_err(|e| eyre!("Invalid fee denom {}: {}", config.fee_denom, e))?;
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .wrap_err("Failed to build LCD HTTP client")?;

        info!(
            orchestrator = %address,
            chain_id = %config.chain_id,
            gas_per_msg = config.gas_limit,
            "Cosmos broadcaster ready"
        );

        Ok(Self {
            signing_key,
            address,
            chain_id,
            fee_denom,
            lcd_url: config.lcd_url.trim_end_matches('/').to_string(),
            client,
            gas_limit: config.gas_limit,
            gas_price: config.gas_price,
            settle_delay: config.settle_delay,
            confirm_timeout: config.confirm_timeout,
            lock: Mutex::new(()),
        })
    }

    fn fee(&self, msg_count: usize) -> Fee {
        let gas = self.gas_limit.saturating_mul(msg_count.max(1) as u64);
        let amount = (gas as f64 * self.gas_price).ceil() as u128;
        Fee::from_amount_and_gas(
            Coin {
                denom: self.fee_denom.clone(),
                amount,
            },
            gas,
        )
    }

    fn sign(&self, msgs: Vec<Any>, memo: &str, account: AccountInfo) -> Result<Vec<u8>> {
        let fee = self.fee(msgs.len());
        let auth_info = SignerInfo::single_direct(Some(self.signing_key.public_key()), account.sequence)
            .auth_info(fee);
        let body = tx::Body::new(msgs, memo, 0u32);

        SignDoc::new(&body, &auth_info, &self.chain_id, account.account_number)
            .and_then(|doc| doc.sign(&self.signing_key))
            .and_then(|raw| raw.to_bytes())
            .map_err(|e| eyre!("Failed to sign transaction: {}", e))
    }

    async fn account(&self) -> Result<AccountInfo> {
        let url = format!("{}/cosmos/auth/v1beta1/accounts/{}", self.lcd_url, self.address);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .wrap_err("Failed to query orchestrator account")?
            .error_for_status()
            .wrap_err_with(|| format!("Account {} not available", self.address))?;
        let body: AccountResponse = response
            .json()
            .await
            .wrap_err("Failed to decode account response")?;
        body.account.into_info()
    }

    async fn submit(&self, tx_bytes: Vec<u8>) -> Result<String> {
        let request = BroadcastRequest {
            tx_bytes: base64::Engine::encode(&base64::engine::general_purpose::STANDARD, tx_bytes),
            mode: "BROADCAST_MODE_SYNC",
        };
        let response = self
            .client
            .post(format!("{}/cosmos/tx/v1beta1/txs", self.lcd_url))
            .json(&request)
            .send()
            .await
            .wrap_err("Failed to broadcast transaction")?
            .error_for_status()
            .wrap_err("Broadcast endpoint returned an error")?;
        let envelope: TxEnvelope = response
            .json()
            .await
            .wrap_err("Failed to decode broadcast response")?;

        envelope.tx_response.check_accepted()?;
        Ok(envelope.tx_response.txhash)
    }

    /// `None` until the node has indexed the transaction
    async fn lookup(&self, tx_hash: &str) -> Result<Option<TxResponseJson>> {
        let response = self
            .client
            .get(format!("{}/cosmos/tx/v1beta1/txs/{}", self.lcd_url, tx_hash))
            .send()
            .await?;
        if matches!(response.status(), StatusCode::NOT_FOUND | StatusCode::BAD_REQUEST) {
            return Ok(None);
        }
        let envelope: TxEnvelope = response.error_for_status()?.json().await?;
        Ok(Some(envelope.tx_response))
    }

    async fn await_inclusion(&self, tx_hash: String) -> Result<TxResult> {
        let mut ticker = tokio::time::interval(INCLUSION_POLL_INTERVAL);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let included = async {
            loop {
                ticker.tick().await;
                match self.lookup(&tx_hash).await {
                    Ok(Some(response)) => return response.into_result(),
                    Ok(None) => {}
                    Err(e) => debug!(tx_hash = %tx_hash, error = %e, "Transaction lookup failed"),
                }
            }
        };

        let outcome = tokio::time::timeout(self.confirm_timeout, included).await;
        match outcome {
            Ok(result) => Ok(result?),
            Err(_) => Err(TxError::NotIncluded {
                tx_hash,
                waited_secs: self.confirm_timeout.as_secs(),
            }
            .into()),
        }
    }
}

#[async_trait]
impl MsgBroadcaster for TxBroadcaster {
    fn address(&self) -> &AccountId {
        &self.address
    }

    async fn broadcast(&self, msgs: Vec<Any>, memo: &str) -> Result<TxResult> {
        let _sequence = self.lock.lock().await;

        let msg_count = msgs.len();
        let account = self.account().await?;
        let tx_bytes = self.sign(msgs, memo, account)?;
        let tx_hash = self.submit(tx_bytes).await?;
        debug!(tx_hash = %tx_hash, sequence = account.sequence, msg_count, "Transaction in mempool");

        let result = self.await_inclusion(tx_hash).await?;
        tokio::time::sleep(self.settle_delay).await;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_MNEMONIC: &str = "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    fn config() -> BroadcasterConfig {
        BroadcasterConfig {
            lcd_url: "http://localhost:1317/".to_string(),
            chain_id: "peggy-devnet-1".to_string(),
            derivation_path: None,
            account_prefix: "inj".to_string(),
            gas_limit: DEFAULT_GAS_LIMIT,
            gas_price: DEFAULT_GAS_PRICE,
            fee_denom: "inj".to_string(),
            request_timeout: Duration::from_secs(5),
            settle_delay: DEFAULT_SETTLE_DELAY,
            confirm_timeout: DEFAULT_CONFIRM_TIMEOUT,
        }
    }

    #[test]
    fn test_address_uses_account_prefix() {
        let broadcaster = TxBroadcaster::new(config(), TEST_MNEMONIC).unwrap();
        assert!(broadcaster.address().to_string().starts_with("inj1"));
        assert_eq!(broadcaster.lcd_url, "http://localhost:1317");
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let a = TxBroadcaster::new(config(), TEST_MNEMONIC).unwrap();
        let b = TxBroadcaster::new(config(), TEST_MNEMONIC).unwrap();
        assert_eq!(a.address(), b.address());
    }

    #[test]
    fn test_invalid_mnemonic_rejected() {
        assert!(TxBroadcaster::new(config(), "not a mnemonic").is_err());
    }

    #[test]
    fn test_fee_scales_with_message_count() {
        let broadcaster = TxBroadcaster::new(config(), TEST_MNEMONIC).unwrap();

        let single = broadcaster.fee(1);
        assert_eq!(single.gas_limit, DEFAULT_GAS_LIMIT);
        assert_eq!(single.amount[0].amount, 10_000);

        let batch = broadcaster.fee(5);
        assert_eq!(batch.gas_limit, 5 * DEFAULT_GAS_LIMIT);
        assert_eq!(batch.amount[0].amount, 50_000);
    }

    #[test]
    fn test_base_account_response() {
        let body: AccountResponse = serde_json::from_str(
            r#"{"account":{"@type":"/cosmos.auth.v1beta1.BaseAccount","address":"inj1x","account_number":"12","sequence":"7"}}"#,
        )
        .unwrap();
        assert_eq!(
            body.account.into_info().unwrap(),
            AccountInfo {
                account_number: 12,
                sequence: 7
            }
        );
    }

    #[test]
    fn test_wrapped_account_response() {
        let body: AccountResponse = serde_json::from_str(
            r#"{"account":{"@type":"/injective.types.v1beta1.EthAccount","base_account":{"address":"inj1x","account_number":"3","sequence":"41"},"code_hash":"xJ"}}"#,
        )
        .unwrap();
        assert_eq!(
            body.account.into_info().unwrap(),
            AccountInfo {
                account_number: 3,
                sequence: 41
            }
        );
    }

    #[test]
    fn test_fresh_account_defaults_to_zero_sequence() {
        let body: AccountResponse =
            serde_json::from_str(r#"{"account":{"account_number":"9"}}"#).unwrap();
        assert_eq!(body.account.into_info().unwrap().sequence, 0);
    }

    #[test]
    fn test_tx_response_codes() {
        let envelope: TxEnvelope = serde_json::from_str(
            r#"{"tx_response":{"txhash":"AB12","code":0,"height":"88","raw_log":""}}"#,
        )
        .unwrap();
        assert!(envelope.tx_response.check_accepted().is_ok());
        assert_eq!(
            envelope.tx_response.into_result().unwrap(),
            TxResult {
                tx_hash: "AB12".to_string(),
                height: 88
            }
        );

        let envelope: TxEnvelope = serde_json::from_str(
            r#"{"tx_response":{"txhash":"CD34","code":32,"codespace":"sdk","raw_log":"account sequence mismatch"}}"#,
        )
        .unwrap();
        assert_eq!(
            envelope.tx_response.check_accepted(),
            Err(TxError::Rejected {
                code: 32,
                codespace: "sdk".to_string(),
                log: "account sequence mismatch".to_string(),
            })
        );
        assert!(matches!(
            envelope.tx_response.into_result(),
            Err(TxError::Failed { code: 32, .. })
        ));
    }
}
