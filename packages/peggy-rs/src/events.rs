//! Bridge events observed on the Ethereum contract
//!
//! Every event the contract emits carries a nonce from one global,
//! strictly increasing sequence. Claims must reach Cosmos in that order no
//! matter which event kind produced them.

use crate::types::{BridgeValidator, Valset};
use alloy::primitives::{Address, B256, U256};
use tracing::warn;

/// Deposit into the bridge (`SendToCosmosEvent` or `SendToInjectiveEvent`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositEvent {
    pub event_nonce: u64,
    pub block_height: u64,
    pub token_contract: Address,
    pub sender: Address,
    /// Cosmos receiver, left-padded to 32 bytes
    pub destination: B256,
    pub amount: U256,
    /// Free-form payload; always empty for legacy deposits
    pub data: String,
}

/// `TransactionBatchExecutedEvent`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalBatchExecutedEvent {
    pub event_nonce: u64,
    pub block_height: u64,
    pub batch_nonce: u64,
    pub token_contract: Address,
}

/// `ValsetUpdatedEvent`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValsetUpdatedEvent {
    pub event_nonce: u64,
    pub block_height: u64,
    pub new_valset_nonce: u64,
    pub reward_amount: U256,
    pub reward_token: Address,
    pub validators: Vec<Address>,
    pub powers: Vec<U256>,
}

impl ValsetUpdatedEvent {
    /// Rebuild the validator set the contract stored with this update
    pub fn to_valset(&self) -> Valset {
        let members = self
            .validators
            .iter()
            .zip(self.powers.iter())
            .map(|(addr, power)| {
                let power = u64::try_from(*power).unwrap_or_else(|_| {
                    warn!(validator = %addr, power = %power, "Validator power exceeds u64, clamping");
                    u64::MAX
                });
                BridgeValidator::new(*addr, power)
            })
            .collect();

        Valset {
            nonce: self.new_valset_nonce,
            members,
            height: self.block_height,
            reward_amount: self.reward_amount,
            reward_token: self.reward_token,
        }
    }
}

/// `ERC20DeployedEvent`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Erc20DeployedEvent {
    pub event_nonce: u64,
    pub block_height: u64,
    pub cosmos_denom: String,
    pub token_contract: Address,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

/// Any event the Oracle turns into a Cosmos claim
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeEvent {
    LegacyDeposit(DepositEvent),
    Deposit(DepositEvent),
    WithdrawalBatchExecuted(WithdrawalBatchExecutedEvent),
    ValsetUpdated(ValsetUpdatedEvent),
    Erc20Deployed(Erc20DeployedEvent),
}

impl BridgeEvent {
    pub fn nonce(&self) -> u64 {
        match self {
            BridgeEvent::LegacyDeposit(e) | BridgeEvent::Deposit(e) => e.event_nonce,
            BridgeEvent::WithdrawalBatchExecuted(e) => e.event_nonce,
            BridgeEvent::ValsetUpdated(e) => e.event_nonce,
            BridgeEvent::Erc20Deployed(e) => e.event_nonce,
        }
    }

    pub fn block_height(&self) -> u64 {
        match self {
            BridgeEvent::LegacyDeposit(e) | BridgeEvent::Deposit(e) => e.block_height,
            BridgeEvent::WithdrawalBatchExecuted(e) => e.block_height,
            BridgeEvent::ValsetUpdated(e) => e.block_height,
            BridgeEvent::Erc20Deployed(e) => e.block_height,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            BridgeEvent::LegacyDeposit(_) => "legacy_deposit",
            BridgeEvent::Deposit(_) => "deposit",
            BridgeEvent::WithdrawalBatchExecuted(_) => "withdrawal_batch_executed",
            BridgeEvent::ValsetUpdated(_) => "valset_updated",
            BridgeEvent::Erc20Deployed(_) => "erc20_deployed",
        }
    }
}

/// Keep events newer than `watermark`, ascending by nonce, one per nonce
pub fn filter_events_after(mut events: Vec<BridgeEvent>, watermark: u64) -> Vec<BridgeEvent> {
    events.retain(|e| e.nonce() > watermark);
    events.sort_by_key(BridgeEvent::nonce);
    events.dedup_by_key(|e| e.nonce());
    events
}
