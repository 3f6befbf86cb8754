//! Relay transaction policy
//!
//! Gas pricing for `updateValset` / `submitBatch`, the record of inputs
//! already in flight, and the errors a relay send can end with.

use alloy::primitives::{utils::parse_units, Bytes, B256};
use eyre::{eyre, Result};
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Default multiplier applied to the node's suggested gas price
pub const DEFAULT_GAS_PRICE_ADJUSTMENT: f64 = 1.3;

/// Default ceiling for the adjusted gas price (500 gwei)
pub const DEFAULT_MAX_GAS_PRICE: u128 = 500_000_000_000;

/// Default time an identical input is treated as still in flight
pub const DEFAULT_PENDING_TX_WAIT: Duration = Duration::from_secs(20 * 60);

/// Inputs kept in the pending record
pub const MAX_PENDING_INPUTS: usize = 100;

/// Ways a relay send fails that resending the same call cannot fix
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RelayTxError {
    #[error("Transaction {tx_hash} reverted")]
    Reverted { tx_hash: B256 },

    #[error("Call reverted before submission: {reason}")]
    CallReverted { reason: String },

    #[error("No receipt for {tx_hash} after {timeout_secs}s, leaving it pending")]
    ReceiptTimeout { tx_hash: B256, timeout_secs: u64 },

    #[error("An identical transaction is already pending")]
    AlreadyPending,

    #[error("Gas price {price} wei is above the maximum of {max} wei")]
    GasPriceTooHigh { price: u128, max: u128 },
}

/// Gas price adjustment and cap
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GasPolicy {
    pub price_adjustment: f64,
    pub max_gas_price: u128,
}

impl Default for GasPolicy {
    fn default() -> Self {
        Self {
            price_adjustment: DEFAULT_GAS_PRICE_ADJUSTMENT,
            max_gas_price: DEFAULT_MAX_GAS_PRICE,
        }
    }
}

impl GasPolicy {
    /// Scale the suggested price, refusing anything above the cap
    pub fn gas_price(&self, suggested: u128) -> Result<u128, RelayTxError> {
        let price = (suggested as f64 * self.price_adjustment) as u128;
        if price > self.max_gas_price {
            return Err(RelayTxError::GasPriceTooHigh {
                price,
                max: self.max_gas_price,
            });
        }
        Ok(price)
    }
}

/// Turn a failed `eth_sendTransaction` (including its gas estimate) into a
/// report, keeping contract reverts distinguishable from transport errors
pub fn send_error(action: &str, message: String) -> eyre::Report {
    if message.to_ascii_lowercase().contains("revert") {
        eyre::Report::new(RelayTxError::CallReverted { reason: message })
            .wrap_err(format!("Failed to send {}", action))
    } else {
        eyre!("Failed to send {}: {}", action, message)
    }
}

/// Parse a gas price such as `500gwei`, `1.5gwei` or `20000000000` (wei)
pub fn parse_gas_price(value: &str) -> Result<u128> {
    let value = value.trim().to_ascii_lowercase();
    let (amount, unit) = if let Some(amount) = value.strip_suffix("gwei") {
        (amount, "gwei")
    } else if let Some(amount) = value.strip_suffix("wei") {
        (amount, "wei")
    } else {
        (value.as_str(), "wei")
    };

    let wei = parse_units(amount.trim(), unit)
        .map_err(|e| eyre!("Invalid gas price '{}': {}", value, e))?
        .get_absolute();
    u128::try_from(wei).map_err(|_| eyre!("Gas price '{}' does not fit in u128", value))
}

/// Calldata of relay transactions sent recently and not yet confirmed
#[derive(Debug, Default)]
pub struct PendingTxInputs {
    inputs: VecDeque<(Bytes, Instant)>,
}

impl PendingTxInputs {
    pub fn record(&mut self, input: Bytes) {
        self.inputs.retain(|(existing, _)| *existing != input);
        self.inputs.push_back((input, Instant::now()));
        while self.inputs.len() > MAX_PENDING_INPUTS {
            self.inputs.pop_front();
        }
    }

    /// True when `input` was recorded less than `wait` ago
    pub fn is_pending(&self, input: &Bytes, wait: Duration) -> bool {
        self.inputs
            .iter()
            .find(|(existing, _)| existing == input)
            .is_some_and(|(_, seen)| seen.elapsed() < wait)
    }

    pub fn remove(&mut self, input: &Bytes) {
        self.inputs.retain(|(existing, _)| existing != input);
    }

    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const GWEI: u128 = 1_000_000_000;

    #[test]
    fn test_gas_price_is_adjusted() {
        let policy = GasPolicy {
            price_adjustment: 1.5,
            max_gas_price: 100 * GWEI,
        };
        assert_eq!(policy.gas_price(20 * GWEI).unwrap(), 30 * GWEI);
    }

    #[test]
    fn test_gas_price_above_cap_is_refused() {
        let policy = GasPolicy {
            price_adjustment: 2.0,
            max_gas_price: 100 * GWEI,
        };

        assert_eq!(policy.gas_price(50 * GWEI).unwrap(), 100 * GWEI);
        assert_eq!(
            policy.gas_price(51 * GWEI),
            Err(RelayTxError::GasPriceTooHigh {
                price: 102 * GWEI,
                max: 100 * GWEI,
            })
        );
    }

    #[test]
    fn test_send_error_classifies_reverts() {
        let reverted = send_error(
            "updateValset",
            "server returned an error response: execution reverted: InvalidValsetNonce".into(),
        );
        assert!(reverted
            .chain()
            .any(|cause| matches!(cause.downcast_ref::<RelayTxError>(), Some(RelayTxError::CallReverted { .. }))));

        let transport = send_error("submitBatch", "connection refused".into());
        assert!(transport.downcast_ref::<RelayTxError>().is_none());
        assert!(transport.to_string().contains("connection refused"));
    }

    #[test]
    fn test_parse_gas_price_units() {
        assert_eq!(parse_gas_price("500gwei").unwrap(), 500 * GWEI);
        assert_eq!(parse_gas_price("1.5 GWEI").unwrap(), 1_500_000_000);
        assert_eq!(parse_gas_price("21000wei").unwrap(), 21_000);
        assert_eq!(parse_gas_price("20000000000").unwrap(), 20 * GWEI);
        assert!(parse_gas_price("fast").is_err());
    }

    #[test]
    fn test_identical_input_is_pending() {
        let mut pending = PendingTxInputs::default();
        let input = Bytes::from(vec![0xa5, 0x35, 0x2f, 0x5b, 0x01]);
        let other = Bytes::from(vec![0x81, 0x74, 0x74, 0x18, 0x01]);

        pending.record(input.clone());

        assert!(pending.is_pending(&input, Duration::from_secs(60)));
        assert!(!pending.is_pending(&other, Duration::from_secs(60)));
        // Older than the wait window counts as stale
        assert!(!pending.is_pending(&input, Duration::ZERO));

        pending.remove(&input);
        assert!(!pending.is_pending(&input, Duration::from_secs(60)));
    }

    #[test]
    fn test_pending_record_is_bounded() {
        let mut pending = PendingTxInputs::default();
        for i in 0..110u32 {
            pending.record(Bytes::from(i.to_be_bytes().to_vec()));
        }
        assert_eq!(pending.len(), MAX_PENDING_INPUTS);
        // Oldest entries were dropped first
        assert!(!pending.is_pending(&Bytes::from(0u32.to_be_bytes().to_vec()), Duration::from_secs(60)));
        assert!(pending.is_pending(&Bytes::from(109u32.to_be_bytes().to_vec()), Duration::from_secs(60)));
    }

    #[test]
    fn test_recording_twice_keeps_one_entry() {
        let mut pending = PendingTxInputs::default();
        let input = Bytes::from_static(&[0x81, 0x74, 0x74, 0x18]);
        pending.record(input.clone());
        pending.record(input);
        assert_eq!(pending.len(), 1);
    }
}
