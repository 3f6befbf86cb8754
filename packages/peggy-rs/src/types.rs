//! Bridge domain types
//!
//! Validator sets and outgoing batches are born on the Cosmos side, signed by
//! validators and applied on Ethereum once enough power has confirmed them.

use alloy::primitives::{Address, B256, U256};
use std::cmp::Ordering;

// ============================================================================
// Validator Sets
// ============================================================================

/// One validator's Ethereum key and normalized voting power
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BridgeValidator {
    pub ethereum_address: Address,
    pub power: u64,
}

impl BridgeValidator {
    pub fn new(ethereum_address: Address, power: u64) -> Self {
        Self {
            ethereum_address,
            power,
        }
    }
}

/// Snapshot of who can sign for the bridge at a given nonce
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Valset {
    pub nonce: u64,
    pub members: Vec<BridgeValidator>,
    /// Cosmos block height the valset was created at
    pub height: u64,
    pub reward_amount: U256,
    pub reward_token: Address,
}

impl Valset {
    /// Sum of member powers, saturating at `u64::MAX`
    pub fn total_power(&self) -> u64 {
        self.members
            .iter()
            .fold(0u64, |acc, m| acc.saturating_add(m.power))
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.members.iter().any(|m| &m.ethereum_address == address)
    }

    /// Members sorted by power descending, then address ascending.
    ///
    /// Two valsets with the same membership compare equal in this order
    /// regardless of how either side listed them.
    pub fn sorted_members(&self) -> Vec<BridgeValidator> {
        let mut members = self.members.clone();
        members.sort_by(|a, b| match b.power.cmp(&a.power) {
            Ordering::Equal => a.ethereum_address.cmp(&b.ethereum_address),
            other => other,
        });
        members
    }

    pub fn addresses(&self) -> Vec<Address> {
        self.members.iter().map(|m| m.ethereum_address).collect()
    }

    pub fn powers(&self) -> Vec<U256> {
        self.members.iter().map(|m| U256::from(m.power)).collect()
    }
}

// ============================================================================
// Outgoing Batches
// ============================================================================

/// An ERC20 amount
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Erc20Token {
    pub contract: Address,
    pub amount: U256,
}

/// A single withdrawal waiting in an outgoing batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingTransferTx {
    pub id: u64,
    pub sender: String,
    pub dest_address: Address,
    pub erc20_token: Erc20Token,
    pub erc20_fee: Erc20Token,
}

/// Batch of withdrawals for one ERC20 contract
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutgoingTxBatch {
    pub batch_nonce: u64,
    /// Ethereum block height after which the batch can no longer execute
    pub batch_timeout: u64,
    pub transactions: Vec<OutgoingTransferTx>,
    pub token_contract: Address,
    /// Cosmos block height the batch was created at
    pub block: u64,
}

impl OutgoingTxBatch {
    /// A batch whose timeout is at or below the Ethereum height can never be relayed
    pub fn is_timed_out(&self, eth_height: u64) -> bool {
        self.batch_timeout <= eth_height
    }

    pub fn total_fees(&self) -> U256 {
        self.transactions
            .iter()
            .fold(U256::ZERO, |acc, tx| acc.saturating_add(tx.erc20_fee.amount))
    }
}

/// Fees accumulated for a token that has not been batched yet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFees {
    pub token: Address,
    pub total_fees: U256,
}

// ============================================================================
// Claims and Confirmations
// ============================================================================

/// Highest Ethereum event this orchestrator has had accepted on Cosmos
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LastClaimEvent {
    pub ethereum_event_nonce: u64,
    pub ethereum_event_height: u64,
}

/// A validator signature over a checkpoint hash
pub trait Confirmation {
    fn eth_signer(&self) -> Address;
    fn signature(&self) -> &[u8];
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValsetConfirm {
    pub nonce: u64,
    pub orchestrator: String,
    pub eth_address: Address,
    pub signature: Vec<u8>,
}

impl Confirmation for ValsetConfirm {
    fn eth_signer(&self) -> Address {
        self.eth_address
    }

    fn signature(&self) -> &[u8] {
        &self.signature
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfirm {
    pub nonce: u64,
    pub token_contract: Address,
    pub eth_signer: Address,
    pub orchestrator: String,
    pub signature: Vec<u8>,
}

impl Confirmation for BatchConfirm {
    fn eth_signer(&self) -> Address {
        self.eth_signer
    }

    fn signature(&self) -> &[u8] {
        &self.signature
    }
}

// ============================================================================
// Module Parameters
// ============================================================================

/// Peggy module parameters relevant to the orchestrator
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BridgeParams {
    pub bridge_id: B256,
    pub bridge_contract_address: Address,
    pub bridge_chain_id: u64,
    /// First Ethereum block worth scanning when no claim has been made yet
    pub bridge_contract_start_height: u64,
}
