//! Hashing helpers shared by the checkpoint codec and event decoding
//!
//! The Peggy contract hashes ABI-encoded checkpoints with keccak256 and mixes
//! in short ASCII method tags stored as right-padded `bytes32` values.

use tiny_keccak::{Hasher, Keccak};

/// Compute keccak256 hash of data
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    output
}

/// Encode a short ASCII tag as a right-padded `bytes32`
///
/// Tags longer than 32 bytes are truncated, matching a Solidity
/// `bytes32("...")` literal conversion.
pub fn bytes32_tag(tag: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    let bytes = tag.as_bytes();
    let len = bytes.len().min(32);
    out[..len].copy_from_slice(&bytes[..len]);
    out
}

/// Left-pad a 20-byte address into a 32-byte word
pub fn address_to_bytes32(addr: &[u8; 20]) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[12..].copy_from_slice(addr);
    out
}

/// Take the low 20 bytes of a 32-byte word
pub fn bytes32_to_address(word: &[u8; 32]) -> [u8; 20] {
    let mut out = [0u8; 20];
    out.copy_from_slice(&word[12..]);
    out
}

/// Format a 32-byte value as 0x-prefixed hex
pub fn bytes32_to_hex(bytes: &[u8; 32]) -> String {
    format!("0x{}", hex::encode(bytes))
}
