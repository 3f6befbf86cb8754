//! Validator signature repacking
//!
//! `updateValset` and `submitBatch` take the current validator set plus three
//! parallel arrays `(v, r, s)` aligned with the member list. A member that did
//! not sign is represented by an all-zero signature, which the contract skips
//! without counting its power.

use crate::types::{Confirmation, Valset};
use alloy::primitives::{Address, B256, U256};
use std::collections::HashMap;
use thiserror::Error;

/// Normalized total voting power of a validator set (2^32)
pub const TOTAL_POWER: u64 = 1 << 32;

/// Signed power must be strictly greater than this (66% of `TOTAL_POWER`)
pub const POWER_PASS_THRESHOLD: u64 = ((TOTAL_POWER as u128) * 66 / 100) as u64;

/// Length of an `r || s || v` signature
pub const SIGNATURE_LEN: usize = 65;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignatureError {
    #[error("No confirmations provided")]
    NoConfirmations,

    #[error("Invalid signature length from {signer}: expected 65 bytes, got {len}")]
    InvalidLength { signer: Address, len: usize },

    #[error("Invalid recovery id {v} in signature from {signer}")]
    InvalidRecoveryId { signer: Address, v: u8 },

    #[error("Insufficient voting power: {power} does not exceed threshold {threshold}")]
    InsufficientVotingPower { power: u64, threshold: u64 },
}

/// Arrays in the layout the contract expects, one entry per valset member
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepackedSignatures {
    pub validators: Vec<Address>,
    pub powers: Vec<U256>,
    pub v: Vec<u8>,
    pub r: Vec<B256>,
    pub s: Vec<B256>,
    /// Power of the members that actually signed
    pub signed_power: u64,
}

/// Split a 65-byte signature into the contract's `(v, r, s)`.
///
/// Accepts a recovery id as parity (`0`/`1`) or in the legacy `27`/`28`
/// form and always returns `v` as `27 + parity`.
pub fn decode_vrs(signer: Address, signature: &[u8]) -> Result<(u8, B256, B256), SignatureError> {
    if signature.len() != SIGNATURE_LEN {
        return Err(SignatureError::InvalidLength {
            signer,
            len: signature.len(),
        });
    }

    let parity = match signature[64] {
        v @ (0 | 1) => v,
        v @ (27 | 28) => v - 27,
        v => return Err(SignatureError::InvalidRecoveryId { signer, v }),
    };

    let r = B256::from_slice(&signature[0..32]);
    let s = B256::from_slice(&signature[32..64]);

    Ok((parity + 27, r, s))
}

/// Align confirmations with the valset's member order and check the threshold
pub fn check_and_repack_signatures<C: Confirmation>(
    valset: &Valset,
    confirms: &[C],
) -> Result<RepackedSignatures, SignatureError> {
    if confirms.is_empty() {
        return Err(SignatureError::NoConfirmations);
    }

    let by_signer: HashMap<Address, &C> = confirms.iter().map(|c| (c.eth_signer(), c)).collect();

    let member_count = valset.members.len();
    let mut repacked = RepackedSignatures {
        validators: Vec::with_capacity(member_count),
        powers: Vec::with_capacity(member_count),
        v: Vec::with_capacity(member_count),
        r: Vec::with_capacity(member_count),
        s: Vec::with_capacity(member_count),
        signed_power: 0,
    };
    let mut signed_power: u128 = 0;

    for member in &valset.members {
        repacked.validators.push(member.ethereum_address);
        repacked.powers.push(U256::from(member.power));

        match by_signer.get(&member.ethereum_address) {
            Some(confirm) => {
                let (v, r, s) = decode_vrs(member.ethereum_address, confirm.signature())?;
                repacked.v.push(v);
                repacked.r.push(r);
                repacked.s.push(s);
                signed_power += u128::from(member.power);
            }
            None => {
                repacked.v.push(0);
                repacked.r.push(B256::ZERO);
                repacked.s.push(B256::ZERO);
            }
        }
    }

    repacked.signed_power = u64::try_from(signed_power).unwrap_or(u64::MAX);

    if signed_power <= u128::from(POWER_PASS_THRESHOLD) {
        return Err(SignatureError::InsufficientVotingPower {
            power: repacked.signed_power,
            threshold: POWER_PASS_THRESHOLD,
        });
    }

    Ok(repacked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BridgeValidator, ValsetConfirm};

    fn member(byte: u8, power: u64) -> BridgeValidator {
        BridgeValidator::new(Address::repeat_byte(byte), power)
    }

    fn confirm(byte: u8, v: u8) -> ValsetConfirm {
        let mut signature = vec![byte; 64];
        signature.push(v);
        ValsetConfirm {
            nonce: 1,
            orchestrator: format!("cosmos1orch{}", byte),
            eth_address: Address::repeat_byte(byte),
            signature,
        }
    }

    /// Four members; the first three together exceed the threshold
    fn valset() -> Valset {
        Valset {
            nonce: 1,
            members: vec![
                member(1, 1_500_000_000),
                member(2, 1_000_000_000),
                member(3, 1_000_000_000),
                member(4, TOTAL_POWER - 3_500_000_000),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn test_threshold_constant() {
        assert_eq!(POWER_PASS_THRESHOLD, 2_834_678_415);
    }

    #[test]
    fn test_repack_aligns_with_member_order() {
        // Confirmations arrive in a different order than the members
        let confirms = vec![confirm(3, 28), confirm(1, 27), confirm(2, 0)];
        let repacked = check_and_repack_signatures(&valset(), &confirms).unwrap();

        assert_eq!(repacked.validators.len(), 4);
        assert_eq!(repacked.v, vec![27, 27, 28, 0]);
        assert_eq!(repacked.r[0], B256::repeat_byte(1));
        assert_eq!(repacked.s[2], B256::repeat_byte(3));
        assert_eq!(repacked.r[3], B256::ZERO);
        assert_eq!(repacked.s[3], B256::ZERO);
        assert_eq!(repacked.powers[3], U256::from(TOTAL_POWER - 3_500_000_000));
        assert_eq!(repacked.signed_power, 3_500_000_000);
    }

    #[test]
    fn test_insufficient_power() {
        // 2_500_000_000 <= threshold
        let confirms = vec![confirm(1, 27), confirm(2, 27)];
        let err = check_and_repack_signatures(&valset(), &confirms).unwrap_err();
        assert_eq!(
            err,
            SignatureError::InsufficientVotingPower {
                power: 2_500_000_000,
                threshold: POWER_PASS_THRESHOLD
            }
        );
    }

    #[test]
    fn test_threshold_is_strict() {
        let exact = Valset {
            members: vec![
                member(1, POWER_PASS_THRESHOLD),
                member(2, TOTAL_POWER - POWER_PASS_THRESHOLD),
            ],
            ..Default::default()
        };
        let err = check_and_repack_signatures(&exact, &[confirm(1, 27)]).unwrap_err();
        assert!(matches!(err, SignatureError::InsufficientVotingPower { .. }));

        let above = Valset {
            members: vec![
                member(1, POWER_PASS_THRESHOLD + 1),
                member(2, TOTAL_POWER - POWER_PASS_THRESHOLD - 1),
            ],
            ..Default::default()
        };
        assert!(check_and_repack_signatures(&above, &[confirm(1, 27)]).is_ok());
    }

    #[test]
    fn test_any_passing_subset_is_accepted() {
        let members = valset();
        // Members 1, 2 and 4 instead of 1, 2 and 3
        let confirms = vec![confirm(1, 1), confirm(2, 1), confirm(4, 1)];
        let repacked = check_and_repack_signatures(&members, &confirms).unwrap();
        assert_eq!(repacked.v, vec![28, 28, 0, 28]);
    }

    #[test]
    fn test_confirms_from_non_members_are_ignored() {
        let confirms = vec![confirm(9, 27), confirm(1, 27)];
        let err = check_and_repack_signatures(&valset(), &confirms).unwrap_err();
        assert!(matches!(
            err,
            SignatureError::InsufficientVotingPower { power: 1_500_000_000, .. }
        ));
    }

    #[test]
    fn test_empty_confirms_rejected() {
        let confirms: Vec<ValsetConfirm> = vec![];
        assert_eq!(
            check_and_repack_signatures(&valset(), &confirms).unwrap_err(),
            SignatureError::NoConfirmations
        );
    }

    #[test]
    fn test_decode_vrs_rejects_malformed() {
        let signer = Address::repeat_byte(1);
        assert_eq!(
            decode_vrs(signer, &[0u8; 64]).unwrap_err(),
            SignatureError::InvalidLength { signer, len: 64 }
        );

        let mut bad_v = vec![0u8; 64];
        bad_v.push(5);
        assert_eq!(
            decode_vrs(signer, &bad_v).unwrap_err(),
            SignatureError::InvalidRecoveryId { signer, v: 5 }
        );
    }
}
