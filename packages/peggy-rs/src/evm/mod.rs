//! EVM side of the bridge
//!
//! - `contracts` - alloy `sol!` bindings for `Peggy.sol`
//! - `events` - log decoding into [`crate::events`] types
//! - `client` - [`crate::network::EthereumNetwork`] over JSON-RPC
//! - `signer` - in-memory key implementing [`crate::network::EthSigner`]
//! - `tx` - gas policy, in-flight inputs and relay send errors

pub mod client;
pub mod contracts;
pub mod events;
pub mod signer;
pub mod tx;

pub use client::{EvmPeggyClient, EvmPeggyConfig};
pub use contracts::Peggy;
pub use signer::LocalEthSigner;
pub use tx::{parse_gas_price, GasPolicy, PendingTxInputs, RelayTxError};
