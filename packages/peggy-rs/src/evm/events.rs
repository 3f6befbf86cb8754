//! Peggy log decoding
//!
//! Turns raw `eth_getLogs` results into the chain-agnostic event types the
//! Oracle works with. Logs that fail to decode are skipped with a warning;
//! a missing nonce would otherwise stall the claim pipeline silently.

use super::contracts::Peggy;
use crate::events::{
    DepositEvent, Erc20DeployedEvent, ValsetUpdatedEvent, WithdrawalBatchExecutedEvent,
};
use alloy::primitives::U256;
use alloy::rpc::types::Log;
use alloy::sol_types::SolEvent;
use tracing::warn;

fn nonce_from(value: U256, field: &'static str) -> Option<u64> {
    match u64::try_from(value) {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(field, value = %value, "Event field exceeds u64, skipping log");
            None
        }
    }
}

fn decode<E: SolEvent>(log: &Log) -> Option<(E, u64)> {
    let Some(block_height) = log.block_number else {
        warn!(event = E::SIGNATURE, "Log without block number, skipping");
        return None;
    };

    match log.log_decode::<E>() {
        Ok(decoded) => Some((decoded.inner.data, block_height)),
        Err(e) => {
            warn!(
                event = E::SIGNATURE,
                block = block_height,
                error = %e,
                "Failed to decode log"
            );
            None
        }
    }
}

/// Parse a `SendToCosmosEvent` log
pub fn parse_legacy_deposit_log(log: &Log) -> Option<DepositEvent> {
    let (event, block_height) = decode::<Peggy::SendToCosmosEvent>(log)?;
    Some(DepositEvent {
        event_nonce: nonce_from(event._eventNonce, "_eventNonce")?,
        block_height,
        token_contract: event._tokenContract,
        sender: event._sender,
        destination: event._destination,
        amount: event._amount,
        data: String::new(),
    })
}

/// Parse a `SendToInjectiveEvent` log
pub fn parse_deposit_log(log: &Log) -> Option<DepositEvent> {
    let (event, block_height) = decode::<Peggy::SendToInjectiveEvent>(log)?;
    Some(DepositEvent {
        event_nonce: nonce_from(event._eventNonce, "_eventNonce")?,
        block_height,
        token_contract: event._tokenContract,
        sender: event._sender,
        destination: event._destination,
        amount: event._amount,
        data: event._data,
    })
}

/// Parse a `TransactionBatchExecutedEvent` log
pub fn parse_withdrawal_log(log: &Log) -> Option<WithdrawalBatchExecutedEvent> {
    let (event, block_height) = decode::<Peggy::TransactionBatchExecutedEvent>(log)?;
    Some(WithdrawalBatchExecutedEvent {
        event_nonce: nonce_from(event._eventNonce, "_eventNonce")?,
        block_height,
        batch_nonce: nonce_from(event._batchNonce, "_batchNonce")?,
        token_contract: event._token,
    })
}

/// Parse an `ERC20DeployedEvent` log
pub fn parse_erc20_deployed_log(log: &Log) -> Option<Erc20DeployedEvent> {
    let (event, block_height) = decode::<Peggy::ERC20DeployedEvent>(log)?;
    Some(Erc20DeployedEvent {
        event_nonce: nonce_from(event._eventNonce, "_eventNonce")?,
        block_height,
        cosmos_denom: event._cosmosDenom,
        token_contract: event._tokenContract,
        name: event._name,
        symbol: event._symbol,
        decimals: event._decimals,
    })
}

/// Parse a `ValsetUpdatedEvent` log
pub fn parse_valset_updated_log(log: &Log) -> Option<ValsetUpdatedEvent> {
    let (event, block_height) = decode::<Peggy::ValsetUpdatedEvent>(log)?;
    if event._validators.len() != event._powers.len() {
        warn!(
            validators = event._validators.len(),
            powers = event._powers.len(),
            "ValsetUpdatedEvent with mismatched arrays, skipping"
        );
        return None;
    }
    Some(ValsetUpdatedEvent {
        event_nonce: nonce_from(event._eventNonce, "_eventNonce")?,
        block_height,
        new_valset_nonce: nonce_from(event._newValsetNonce, "_newValsetNonce")?,
        reward_amount: event._rewardAmount,
        reward_token: event._rewardToken,
        validators: event._validators,
        powers: event._powers,
    })
}
