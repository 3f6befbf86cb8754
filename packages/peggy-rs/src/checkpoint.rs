//! Checkpoint Codec
//!
//! Produces exactly the hashes `Peggy.sol` reconstructs when it verifies
//! signatures. The contract ABI-encodes the arguments of a phantom method
//! call (without the 4-byte selector) and hashes the result with keccak256.
//!
//! ```solidity
//! keccak256(abi.encode(peggyId, bytes32("checkpoint"), valsetNonce,
//!     validators, powers, rewardAmount, rewardToken))
//! keccak256(abi.encode(peggyId, bytes32("transactionBatch"), amounts,
//!     destinations, fees, batchNonce, tokenContract, batchTimeout))
//! ```
//!
//! Members and transactions are encoded in the order given; callers pass the
//! Cosmos-side ordering, which is also what the contract stores.

use crate::hash::{bytes32_tag, keccak256};
use crate::types::{OutgoingTxBatch, Valset};
use alloy::primitives::{Address, B256, U256};
use alloy::sol_types::SolValue;

/// Method tag mixed into valset checkpoints
pub const VALSET_CHECKPOINT_TAG: &str = "checkpoint";

/// Method tag mixed into batch checkpoints
pub const BATCH_CHECKPOINT_TAG: &str = "transactionBatch";

/// Hash a validator set the way `updateValset` and `submitBatch` verify it
pub fn encode_valset_checkpoint(bridge_id: B256, valset: &Valset) -> B256 {
    let validators: Vec<Address> = valset.addresses();
    let powers: Vec<U256> = valset.powers();

    let encoded = (
        bridge_id,
        B256::from(bytes32_tag(VALSET_CHECKPOINT_TAG)),
        U256::from(valset.nonce),
        validators,
        powers,
        valset.reward_amount,
        valset.reward_token,
    )
        .abi_encode_params();

    B256::from(keccak256(&encoded))
}

/// Hash an outgoing batch the way `submitBatch` verifies it
pub fn encode_batch_checkpoint(bridge_id: B256, batch: &OutgoingTxBatch) -> B256 {
    let mut amounts = Vec::with_capacity(batch.transactions.len());
    let mut destinations = Vec::with_capacity(batch.transactions.len());
    let mut fees = Vec::with_capacity(batch.transactions.len());

    for tx in &batch.transactions {
        amounts.push(tx.erc20_token.amount);
        destinations.push(tx.dest_address);
        fees.push(tx.erc20_fee.amount);
    }

    let encoded = (
        bridge_id,
        B256::from(bytes32_tag(BATCH_CHECKPOINT_TAG)),
        amounts,
        destinations,
        fees,
        U256::from(batch.batch_nonce),
        batch.token_contract,
        U256::from(batch.batch_timeout),
    )
        .abi_encode_params();

    B256::from(keccak256(&encoded))
}
