//! Peggy Orchestrator - Library interface
//!
//! Re-exports internal modules for use in integration tests.

pub mod batch_requester;
pub mod config;
pub mod loops;
pub mod metrics;
pub mod oracle;
pub mod orchestrator;
pub mod price_feed;
pub mod relayer;
pub mod retry;
pub mod server;
pub mod shutdown;
pub mod signer;
