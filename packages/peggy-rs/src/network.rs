//! Chain network interfaces
//!
//! The orchestrator loops only talk to the chains through these traits.
//! Concrete implementations live in [`crate::evm`] and [`crate::cosmos`];
//! tests substitute in-memory mocks.

use crate::events::{
    BridgeEvent, DepositEvent, Erc20DeployedEvent, ValsetUpdatedEvent,
    WithdrawalBatchExecutedEvent,
};
use crate::types::{
    BatchConfirm, BatchFees, BridgeParams, LastClaimEvent, OutgoingTxBatch, Valset, ValsetConfirm,
};
use alloy::primitives::{Address, B256};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use eyre::Result;

/// The parts of an Ethereum block header the orchestrator reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthHeader {
    pub number: u64,
    pub timestamp: u64,
}

/// Peggy module queries and transactions on the Cosmos side
#[async_trait]
pub trait CosmosNetwork: Send + Sync {
    /// Bech32 account address this network signs transactions with
    fn orchestrator_address(&self) -> String;

    async fn bridge_params(&self) -> Result<BridgeParams>;

    async fn current_valset(&self) -> Result<Valset>;

    /// Most recent valsets, newest first
    async fn latest_valsets(&self) -> Result<Vec<Valset>>;

    async fn valset_at(&self, nonce: u64) -> Result<Option<Valset>>;

    async fn all_valset_confirms(&self, nonce: u64) -> Result<Vec<ValsetConfirm>>;

    /// Valsets `addr` has not confirmed yet, oldest first. Empty when none.
    async fn oldest_unsigned_valsets(&self, addr: &str) -> Result<Vec<Valset>>;

    async fn send_valset_confirm(
        &self,
        eth_address: Address,
        bridge_id: B256,
        valset: &Valset,
        signature: Vec<u8>,
    ) -> Result<()>;

    /// Pending batches, newest first
    async fn latest_transaction_batches(&self) -> Result<Vec<OutgoingTxBatch>>;

    async fn transaction_batch_signatures(
        &self,
        nonce: u64,
        token_contract: Address,
    ) -> Result<Vec<BatchConfirm>>;

    async fn oldest_unsigned_transaction_batch(&self, addr: &str)
        -> Result<Option<OutgoingTxBatch>>;

    async fn send_batch_confirm(
        &self,
        eth_address: Address,
        bridge_id: B256,
        batch: &OutgoingTxBatch,
        signature: Vec<u8>,
    ) -> Result<()>;

    async fn unbatched_token_fees(&self) -> Result<Vec<BatchFees>>;

    async fn send_request_batch(&self, denom: &str) -> Result<()>;

    async fn last_claim_event_by_addr(&self, addr: &str) -> Result<LastClaimEvent>;

    /// Submit one claim per event in ascending nonce order.
    ///
    /// The first event must carry nonce `last_claim_event + 1`. Returns the
    /// nonce of the last claim sent.
    async fn send_ethereum_claims(
        &self,
        last_claim_event: u64,
        events: Vec<BridgeEvent>,
    ) -> Result<u64>;

    /// Timestamp of the Cosmos block at `height`
    async fn get_block_time(&self, height: u64) -> Result<DateTime<Utc>>;
}

/// Peggy contract queries and transactions on the Ethereum side
#[async_trait]
pub trait EthereumNetwork: Send + Sync {
    /// Address transactions are sent from
    fn from_address(&self) -> Address;

    /// Header at `number`, or the latest header when `None`
    async fn header_by_number(&self, number: Option<u64>) -> Result<EthHeader>;

    async fn get_bridge_id(&self) -> Result<B256>;

    async fn get_legacy_deposit_events(&self, start: u64, end: u64) -> Result<Vec<DepositEvent>>;

    async fn get_deposit_events(&self, start: u64, end: u64) -> Result<Vec<DepositEvent>>;

    async fn get_withdrawal_batch_executed_events(
        &self,
        start: u64,
        end: u64,
    ) -> Result<Vec<WithdrawalBatchExecutedEvent>>;

    async fn get_erc20_deployed_events(
        &self,
        start: u64,
        end: u64,
    ) -> Result<Vec<Erc20DeployedEvent>>;

    async fn get_valset_updated_events(
        &self,
        start: u64,
        end: u64,
    ) -> Result<Vec<ValsetUpdatedEvent>>;

    async fn get_valset_nonce(&self) -> Result<u64>;

    async fn get_tx_batch_nonce(&self, token_contract: Address) -> Result<u64>;

    async fn send_eth_valset_update(
        &self,
        current: &Valset,
        new: &Valset,
        confirms: &[ValsetConfirm],
    ) -> Result<B256>;

    async fn send_transaction_batch(
        &self,
        current: &Valset,
        batch: &OutgoingTxBatch,
        confirms: &[BatchConfirm],
    ) -> Result<B256>;
}

/// Produces Ethereum signatures over checkpoint hashes.
///
/// Custody of the key is left to the implementation.
#[async_trait]
pub trait EthSigner: Send + Sync {
    fn address(&self) -> Address;

    /// 65-byte `r || s || v` personal-sign signature of `message_hash`
    async fn sign(&self, eth_address: Address, message_hash: B256) -> Result<Vec<u8>>;
}
