//! Peggy-RS: Shared Bridge Library for the Peggy Orchestrator
//!
//! This crate provides the pieces the orchestrator loops are built on:
//!
//! - **Types** - Validator sets, outgoing batches, confirmations, claim watermarks
//! - **Events** - The `BridgeEvent` sum type observed on the Ethereum contract
//! - **Checkpoint Codec** - Valset and batch checkpoint hashes matching `Peggy.sol`
//! - **Signatures** - Repacking validator confirmations into contract arrays
//! - **Network** - `CosmosNetwork`, `EthereumNetwork` and `EthSigner` traits
//! - **EVM Module** - alloy bindings and an `EthereumNetwork` implementation
//! - **Cosmos Module** - LCD/Tendermint queries, claim messages, serialized broadcasting
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! peggy-rs = { path = "../peggy-rs" }
//! ```

pub mod checkpoint;
pub mod cosmos;
pub mod events;
pub mod evm;
pub mod hash;
pub mod network;
pub mod signatures;
pub mod types;

pub use checkpoint::{encode_batch_checkpoint, encode_valset_checkpoint};
pub use events::{
    BridgeEvent, DepositEvent, Erc20DeployedEvent, ValsetUpdatedEvent,
    WithdrawalBatchExecutedEvent,
};
pub use evm::RelayTxError;
pub use hash::keccak256;
pub use network::{CosmosNetwork, EthHeader, EthSigner, EthereumNetwork};
pub use signatures::{
    check_and_repack_signatures, RepackedSignatures, SignatureError, POWER_PASS_THRESHOLD,
    TOTAL_POWER,
};
pub use types::{
    BatchConfirm, BatchFees, BridgeParams, BridgeValidator, Confirmation, Erc20Token,
    LastClaimEvent, OutgoingTransferTx, OutgoingTxBatch, Valset, ValsetConfirm,
};
