//! Peggy module transaction messages
//!
//! Protobuf definitions for the `injective.peggy.v1` messages the
//! orchestrator broadcasts. Only the messages this crate sends are defined.

use cosmrs::Any;
use prost::Message;

/// Protobuf package the peggy module registers its messages under
pub const PEGGY_PROTO_PACKAGE: &str = "injective.peggy.v1";

/// A peggy message that can be packed into a transaction body
pub trait PeggyMsg: Message + Sized {
    const NAME: &'static str;

    fn type_url() -> String {
        format!("/{}.{}", PEGGY_PROTO_PACKAGE, Self::NAME)
    }

    fn to_any(&self) -> Any {
        Any {
            type_url: Self::type_url(),
            value: self.encode_to_vec(),
        }
    }
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct BridgeValidator {
    #[prost(uint64, tag = "1")]
    pub power: u64,
    #[prost(string, tag = "2")]
    pub ethereum_address: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgValsetConfirm {
    #[prost(uint64, tag = "1")]
    pub nonce: u64,
    #[prost(string, tag = "2")]
    pub orchestrator: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub eth_address: ::prost::alloc::string::String,
    /// Hex-encoded signature
    #[prost(string, tag = "4")]
    pub signature: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgRequestBatch {
    #[prost(string, tag = "1")]
    pub orchestrator: ::prost::alloc::string::String,
    #[prost(string, tag = "2")]
    pub denom: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgConfirmBatch {
    #[prost(uint64, tag = "1")]
    pub nonce: u64,
    #[prost(string, tag = "2")]
    pub token_contract: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub eth_signer: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub orchestrator: ::prost::alloc::string::String,
    /// Hex-encoded signature
    #[prost(string, tag = "5")]
    pub signature: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgDepositClaim {
    #[prost(uint64, tag = "1")]
    pub event_nonce: u64,
    #[prost(uint64, tag = "2")]
    pub block_height: u64,
    #[prost(string, tag = "3")]
    pub token_contract: ::prost::alloc::string::String,
    /// Decimal integer string
    #[prost(string, tag = "4")]
    pub amount: ::prost::alloc::string::String,
    #[prost(string, tag = "5")]
    pub ethereum_sender: ::prost::alloc::string::String,
    #[prost(string, tag = "6")]
    pub cosmos_receiver: ::prost::alloc::string::String,
    #[prost(string, tag = "7")]
    pub orchestrator: ::prost::alloc::string::String,
    #[prost(string, tag = "8")]
    pub data: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgWithdrawClaim {
    #[prost(uint64, tag = "1")]
    pub event_nonce: u64,
    #[prost(uint64, tag = "2")]
    pub block_height: u64,
    #[prost(uint64, tag = "3")]
    pub batch_nonce: u64,
    #[prost(string, tag = "4")]
    pub token_contract: ::prost::alloc::string::String,
    #[prost(string, tag = "5")]
    pub orchestrator: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgErc20DeployedClaim {
    #[prost(uint64, tag = "1")]
    pub event_nonce: u64,
    #[prost(uint64, tag = "2")]
    pub block_height: u64,
    #[prost(string, tag = "3")]
    pub cosmos_denom: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub token_contract: ::prost::alloc::string::String,
    #[prost(string, tag = "5")]
    pub name: ::prost::alloc::string::String,
    #[prost(string, tag = "6")]
    pub symbol: ::prost::alloc::string::String,
    #[prost(uint64, tag = "7")]
    pub decimals: u64,
    #[prost(string, tag = "8")]
    pub orchestrator: ::prost::alloc::string::String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct MsgValsetUpdatedClaim {
    #[prost(uint64, tag = "1")]
    pub event_nonce: u64,
    #[prost(uint64, tag = "2")]
    pub valset_nonce: u64,
    #[prost(uint64, tag = "3")]
    pub block_height: u64,
    #[prost(message, repeated, tag = "4")]
    pub members: ::prost::alloc::vec::Vec<BridgeValidator>,
    /// Decimal integer string
    #[prost(string, tag = "5")]
    pub reward_amount: ::prost::alloc::string::String,
    #[prost(string, tag = "6")]
    pub reward_token: ::prost::alloc::string::String,
    #[prost(string, tag = "7")]
    pub orchestrator: ::prost::alloc::string::String,
}

impl PeggyMsg for MsgValsetConfirm {
    const NAME: &'static str = "MsgValsetConfirm";
}

impl PeggyMsg for MsgRequestBatch {
    const NAME: &'static str = "MsgRequestBatch";
}

impl PeggyMsg for MsgConfirmBatch {
    const NAME: &'static str = "MsgConfirmBatch";
}

impl PeggyMsg for MsgDepositClaim {
    const NAME: &'static str = "MsgDepositClaim";
}

impl PeggyMsg for MsgWithdrawClaim {
    const NAME: &'static str = "MsgWithdrawClaim";
}

impl PeggyMsg for MsgErc20DeployedClaim {
    const NAME: &'static str = "MsgERC20DeployedClaim";
}

impl PeggyMsg for MsgValsetUpdatedClaim {
    const NAME: &'static str = "MsgValsetUpdatedClaim";
}
