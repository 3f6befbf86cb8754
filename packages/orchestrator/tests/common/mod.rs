//! In-memory chain mocks shared by the integration tests

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eyre::{eyre, Result};
use orchestrator::price_feed::PriceFeed;
use orchestrator::retry::RetryConfig;
use peggy_rs::{
    BatchConfirm, BatchFees, BridgeEvent, BridgeParams, BridgeValidator, CosmosNetwork,
    DepositEvent, Erc20DeployedEvent, EthHeader, EthereumNetwork, LastClaimEvent,
    OutgoingTxBatch, RelayTxError, Valset, ValsetConfirm, ValsetUpdatedEvent,
    WithdrawalBatchExecutedEvent,
};

pub const ORCHESTRATOR: &str = "inj1orchestrator";

/// Anvil account #0
pub const ETH_PRIVATE_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

pub fn eth_address() -> Address {
    "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        .parse()
        .unwrap()
}

pub fn fast_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(5),
        backoff_multiplier: 2.0,
    }
}

pub fn valset(nonce: u64, members: &[(Address, u64)]) -> Valset {
    Valset {
        nonce,
        members: members
            .iter()
            .map(|(addr, power)| BridgeValidator::new(*addr, *power))
            .collect(),
        height: nonce * 10,
        ..Default::default()
    }
}

/// A valset where `eth_address()` holds all the power
pub fn solo_valset(nonce: u64) -> Valset {
    valset(nonce, &[(eth_address(), 1 << 32)])
}

/// 65 bytes that decode cleanly; the relayer never recovers them
pub fn fake_signature() -> Vec<u8> {
    let mut sig = vec![0x11u8; 64];
    sig.push(27);
    sig
}

pub fn valset_confirm(nonce: u64, signer: Address) -> ValsetConfirm {
    ValsetConfirm {
        nonce,
        orchestrator: ORCHESTRATOR.to_string(),
        eth_address: signer,
        signature: fake_signature(),
    }
}

pub fn batch(nonce: u64, token: Address, timeout: u64) -> OutgoingTxBatch {
    OutgoingTxBatch {
        batch_nonce: nonce,
        batch_timeout: timeout,
        transactions: vec![],
        token_contract: token,
        block: nonce * 10,
    }
}

pub fn batch_confirm(batch: &OutgoingTxBatch, signer: Address) -> BatchConfirm {
    BatchConfirm {
        nonce: batch.batch_nonce,
        token_contract: batch.token_contract,
        eth_signer: signer,
        orchestrator: ORCHESTRATOR.to_string(),
        signature: fake_signature(),
    }
}

pub fn deposit(nonce: u64, height: u64) -> DepositEvent {
    DepositEvent {
        event_nonce: nonce,
        block_height: height,
        token_contract: Address::repeat_byte(0xaa),
        sender: Address::repeat_byte(0xbb),
        destination: B256::repeat_byte(0xcc),
        amount: U256::from(1_000u64),
        data: String::new(),
    }
}

pub fn valset_updated(event_nonce: u64, height: u64, valset: &Valset) -> ValsetUpdatedEvent {
    ValsetUpdatedEvent {
        event_nonce,
        block_height: height,
        new_valset_nonce: valset.nonce,
        reward_amount: U256::ZERO,
        reward_token: Address::ZERO,
        validators: valset.addresses(),
        powers: valset.powers(),
    }
}

// ============================================================================
// Cosmos
// ============================================================================

#[derive(Default)]
pub struct CosmosState {
    pub params: BridgeParams,
    pub current_valset: Valset,
    /// Newest first
    pub latest_valsets: Vec<Valset>,
    pub valsets_by_nonce: HashMap<u64, Valset>,
    pub valset_confirms: HashMap<u64, Vec<ValsetConfirm>>,
    pub unsigned_valsets: Vec<Valset>,
    /// Newest first
    pub batches: Vec<OutgoingTxBatch>,
    pub batch_confirms: HashMap<(u64, Address), Vec<BatchConfirm>>,
    pub unsigned_batch: Option<OutgoingTxBatch>,
    pub unbatched_fees: Vec<BatchFees>,
    pub last_claim: LastClaimEvent,
    /// `None` makes `get_block_time` fail
    pub block_time: Option<DateTime<Utc>>,

    pub fail_last_claim: bool,
    pub fail_unbatched_fees: bool,
    pub fail_send_confirm: bool,
    /// Accept this many claims, then fail the call once
    pub fail_claims_after: Option<usize>,

    pub claim_calls: Vec<(u64, Vec<u64>)>,
    pub accepted_nonces: Vec<u64>,
    pub sent_valset_confirms: Vec<(Address, B256, u64, Vec<u8>)>,
    pub sent_batch_confirms: Vec<(Address, B256, u64, Vec<u8>)>,
    pub batch_requests: Vec<String>,
    pub last_claim_reads: usize,
}

pub struct MockCosmos {
    pub state: Mutex<CosmosState>,
}

impl MockCosmos {
    pub fn new(state: CosmosState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut CosmosState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }
}

#[async_trait]
impl CosmosNetwork for MockCosmos {
    fn orchestrator_address(&self) -> String {
        ORCHESTRATOR.to_string()
    }

    async fn bridge_params(&self) -> Result<BridgeParams> {
        Ok(self.with(|s| s.params.clone()))
    }

    async fn current_valset(&self) -> Result<Valset> {
        Ok(self.with(|s| s.current_valset.clone()))
    }

    async fn latest_valsets(&self) -> Result<Vec<Valset>> {
        Ok(self.with(|s| s.latest_valsets.clone()))
    }

    async fn valset_at(&self, nonce: u64) -> Result<Option<Valset>> {
        Ok(self.with(|s| s.valsets_by_nonce.get(&nonce).cloned()))
    }

    async fn all_valset_confirms(&self, nonce: u64) -> Result<Vec<ValsetConfirm>> {
        Ok(self.with(|s| s.valset_confirms.get(&nonce).cloned().unwrap_or_default()))
    }

    async fn oldest_unsigned_valsets(&self, _addr: &str) -> Result<Vec<Valset>> {
        Ok(self.with(|s| s.unsigned_valsets.clone()))
    }

    async fn send_valset_confirm(
        &self,
        eth_address: Address,
        bridge_id: B256,
        valset: &Valset,
        signature: Vec<u8>,
    ) -> Result<()> {
        self.with(|s| {
            if s.fail_send_confirm {
                return Err(eyre!("broadcast failed"));
            }
            s.sent_valset_confirms
                .push((eth_address, bridge_id, valset.nonce, signature));
            Ok(())
        })
    }

    async fn latest_transaction_batches(&self) -> Result<Vec<OutgoingTxBatch>> {
        Ok(self.with(|s| s.batches.clone()))
    }

    async fn transaction_batch_signatures(
        &self,
        nonce: u64,
        token_contract: Address,
    ) -> Result<Vec<BatchConfirm>> {
        Ok(self.with(|s| {
            s.batch_confirms
                .get(&(nonce, token_contract))
                .cloned()
                .unwrap_or_default()
        }))
    }

    async fn oldest_unsigned_transaction_batch(
        &self,
        _addr: &str,
    ) -> Result<Option<OutgoingTxBatch>> {
        Ok(self.with(|s| s.unsigned_batch.clone()))
    }

    async fn send_batch_confirm(
        &self,
        eth_address: Address,
        bridge_id: B256,
        batch: &OutgoingTxBatch,
        signature: Vec<u8>,
    ) -> Result<()> {
        self.with(|s| {
            if s.fail_send_confirm {
                return Err(eyre!("broadcast failed"));
            }
            s.sent_batch_confirms
                .push((eth_address, bridge_id, batch.batch_nonce, signature));
            Ok(())
        })
    }

    async fn unbatched_token_fees(&self) -> Result<Vec<BatchFees>> {
        self.with(|s| {
            if s.fail_unbatched_fees {
                Err(eyre!("lcd unavailable"))
            } else {
                Ok(s.unbatched_fees.clone())
            }
        })
    }

    async fn send_request_batch(&self, denom: &str) -> Result<()> {
        self.with(|s| s.batch_requests.push(denom.to_string()));
        Ok(())
    }

    async fn last_claim_event_by_addr(&self, _addr: &str) -> Result<LastClaimEvent> {
        self.with(|s| {
            s.last_claim_reads += 1;
            if s.fail_last_claim {
                Err(eyre!("lcd unavailable"))
            } else {
                Ok(s.last_claim)
            }
        })
    }

    async fn send_ethereum_claims(
        &self,
        last_claim_event: u64,
        events: Vec<BridgeEvent>,
    ) -> Result<u64> {
        self.with(|s| {
            s.claim_calls
                .push((last_claim_event, events.iter().map(BridgeEvent::nonce).collect()));

            if events.first().map(BridgeEvent::nonce) != Some(s.last_claim.ethereum_event_nonce + 1)
            {
                return Err(eyre!("claim rejected: non contiguous nonce"));
            }

            for (i, event) in events.iter().enumerate() {
                if s.fail_claims_after == Some(i) {
                    s.fail_claims_after = None;
                    return Err(eyre!("broadcast timed out"));
                }
                s.accepted_nonces.push(event.nonce());
                s.last_claim = LastClaimEvent {
                    ethereum_event_nonce: event.nonce(),
                    ethereum_event_height: event.block_height(),
                };
            }
            Ok(s.last_claim.ethereum_event_nonce)
        })
    }

    async fn get_block_time(&self, _height: u64) -> Result<DateTime<Utc>> {
        self.with(|s| s.block_time.ok_or_else(|| eyre!("block not found")))
    }
}

// ============================================================================
// Ethereum
// ============================================================================

#[derive(Default)]
pub struct EthereumState {
    pub from: Address,
    pub head: u64,
    pub bridge_id: B256,
    pub legacy_deposits: Vec<DepositEvent>,
    pub deposits: Vec<DepositEvent>,
    pub withdrawals: Vec<WithdrawalBatchExecutedEvent>,
    pub erc20_deployed: Vec<Erc20DeployedEvent>,
    pub valset_updates: Vec<ValsetUpdatedEvent>,
    pub valset_nonce: u64,
    pub batch_nonces: HashMap<Address, u64>,

    /// Every valset update reverts
    pub fail_valset_update: bool,
    /// Errors returned by the next sends, one per call
    pub valset_send_errors: VecDeque<eyre::Report>,
    pub batch_send_errors: VecDeque<eyre::Report>,
    /// A send that returns an error still lands on chain
    pub land_failed_sends: bool,
    pub valset_send_attempts: usize,
    pub batch_send_attempts: usize,

    pub header_calls: usize,
    pub bridge_id_calls: usize,
    pub deposit_queries: Vec<(u64, u64)>,
    pub valset_event_queries: Vec<(u64, u64)>,
    pub sent_valset_updates: Vec<(u64, u64, usize)>,
    pub sent_batches: Vec<(u64, Address, usize)>,
}

pub struct MockEthereum {
    pub state: Mutex<EthereumState>,
    /// When set, header requests wait for a notification
    header_gate: Option<std::sync::Arc<tokio::sync::Notify>>,
}

impl MockEthereum {
    pub fn new(state: EthereumState) -> Self {
        Self {
            state: Mutex::new(state),
            header_gate: None,
        }
    }

    pub fn gated(state: EthereumState, gate: std::sync::Arc<tokio::sync::Notify>) -> Self {
        Self {
            state: Mutex::new(state),
            header_gate: Some(gate),
        }
    }

    pub fn with<R>(&self, f: impl FnOnce(&mut EthereumState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }
}

fn in_range<T: Clone>(events: &[T], height: impl Fn(&T) -> u64, start: u64, end: u64) -> Vec<T> {
    events
        .iter()
        .filter(|e| (start..=end).contains(&height(e)))
        .cloned()
        .collect()
}

#[async_trait]
impl EthereumNetwork for MockEthereum {
    fn from_address(&self) -> Address {
        self.with(|s| s.from)
    }

    async fn header_by_number(&self, number: Option<u64>) -> Result<EthHeader> {
        if let Some(gate) = &self.header_gate {
            gate.notified().await;
        }
        self.with(|s| {
            s.header_calls += 1;
            let number = number.unwrap_or(s.head);
            Ok(EthHeader {
                number,
                timestamp: 1_700_000_000 + number * 12,
            })
        })
    }

    async fn get_bridge_id(&self) -> Result<B256> {
        self.with(|s| {
            s.bridge_id_calls += 1;
            Ok(s.bridge_id)
        })
    }

    async fn get_legacy_deposit_events(&self, start: u64, end: u64) -> Result<Vec<DepositEvent>> {
        Ok(self.with(|s| in_range(&s.legacy_deposits, |e| e.block_height, start, end)))
    }

    async fn get_deposit_events(&self, start: u64, end: u64) -> Result<Vec<DepositEvent>> {
        Ok(self.with(|s| {
            s.deposit_queries.push((start, end));
            in_range(&s.deposits, |e| e.block_height, start, end)
        }))
    }

    async fn get_withdrawal_batch_executed_events(
        &self,
        start: u64,
        end: u64,
    ) -> Result<Vec<WithdrawalBatchExecutedEvent>> {
        Ok(self.with(|s| in_range(&s.withdrawals, |e| e.block_height, start, end)))
    }

    async fn get_erc20_deployed_events(
        &self,
        start: u64,
        end: u64,
    ) -> Result<Vec<Erc20DeployedEvent>> {
        Ok(self.with(|s| in_range(&s.erc20_deployed, |e| e.block_height, start, end)))
    }

    async fn get_valset_updated_events(
        &self,
        start: u64,
        end: u64,
    ) -> Result<Vec<ValsetUpdatedEvent>> {
        Ok(self.with(|s| {
            s.valset_event_queries.push((start, end));
            in_range(&s.valset_updates, |e| e.block_height, start, end)
        }))
    }

    async fn get_valset_nonce(&self) -> Result<u64> {
        Ok(self.with(|s| s.valset_nonce))
    }

    async fn get_tx_batch_nonce(&self, token_contract: Address) -> Result<u64> {
        Ok(self.with(|s| s.batch_nonces.get(&token_contract).copied().unwrap_or(0)))
    }

    async fn send_eth_valset_update(
        &self,
        current: &Valset,
        new: &Valset,
        confirms: &[ValsetConfirm],
    ) -> Result<B256> {
        self.with(|s| {
            s.valset_send_attempts += 1;
            if s.fail_valset_update {
                return Err(RelayTxError::Reverted {
                    tx_hash: B256::repeat_byte(0xee),
                }
                .into());
            }
            if let Some(error) = s.valset_send_errors.pop_front() {
                if s.land_failed_sends {
                    s.valset_nonce = new.nonce;
                }
                return Err(error);
            }
            s.sent_valset_updates
                .push((current.nonce, new.nonce, confirms.len()));
            Ok(B256::repeat_byte(0x01))
        })
    }

    async fn send_transaction_batch(
        &self,
        _current: &Valset,
        batch: &OutgoingTxBatch,
        confirms: &[BatchConfirm],
    ) -> Result<B256> {
        self.with(|s| {
            s.batch_send_attempts += 1;
            if let Some(error) = s.batch_send_errors.pop_front() {
                if s.land_failed_sends {
                    s.batch_nonces.insert(batch.token_contract, batch.batch_nonce);
                }
                return Err(error);
            }
            s.sent_batches
                .push((batch.batch_nonce, batch.token_contract, confirms.len()));
            Ok(B256::repeat_byte(0x02))
        })
    }
}

// ============================================================================
// Price feed
// ============================================================================

#[derive(Default)]
pub struct MockPriceFeed {
    pub prices: HashMap<Address, f64>,
}

#[async_trait]
impl PriceFeed for MockPriceFeed {
    async fn query_usd_price(&self, token: Address) -> Result<f64> {
        self.prices
            .get(&token)
            .copied()
            .ok_or_else(|| eyre!("unknown token {}", token))
    }
}
