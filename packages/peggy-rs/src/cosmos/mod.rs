//! Cosmos side of the bridge
//!
//! - `proto` - peggy module transaction messages
//! - `queries` - LCD and Tendermint reads
//! - `broadcast` - key derivation, signing and serialized broadcasting
//! - `client` - [`crate::network::CosmosNetwork`] built from the above

pub mod broadcast;
pub mod client;
pub mod proto;
pub mod queries;

pub use broadcast::{BroadcasterConfig, MsgBroadcaster, TxBroadcaster};
pub use client::{LcdCosmosClient, DEFAULT_CLAIMS_PER_TX};
pub use queries::PeggyQueryClient;
