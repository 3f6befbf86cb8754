//! In-memory Ethereum signer
//!
//! Signs checkpoint hashes with the EIP-191 personal-sign prefix
//! (`"\x19Ethereum Signed Message:\n32"`), which is what `Peggy.sol` recovers
//! against when it verifies validator signatures.

use crate::network::EthSigner;
use alloy::primitives::{Address, B256};
use alloy::signers::{local::PrivateKeySigner, Signer};
use async_trait::async_trait;
use eyre::{eyre, Result};
use std::fmt;

pub struct LocalEthSigner {
    signer: PrivateKeySigner,
}

impl fmt::Debug for LocalEthSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalEthSigner")
            .field("address", &self.signer.address())
            .field("key", &"<redacted>")
            .finish()
    }
}

impl LocalEthSigner {
    /// Create from a 0x-prefixed hex private key
    pub fn from_private_key(private_key: &str) -> Result<Self> {
        let signer: PrivateKeySigner = private_key
            .parse()
            .map_err(|e| eyre!("Invalid private key: {}", e))?;
        Ok(Self { signer })
    }

    pub fn inner(&self) -> &PrivateKeySigner {
        &self.signer
    }
}

#[async_trait]
impl EthSigner for LocalEthSigner {
    fn address(&self) -> Address {
        self.signer.address()
    }

    async fn sign(&self, eth_address: Address, message_hash: B256) -> Result<Vec<u8>> {
        if eth_address != self.signer.address() {
            return Err(eyre!(
                "Signer holds key for {}, cannot sign for {}",
                self.signer.address(),
                eth_address
            ));
        }

        let signature = self
            .signer
            .sign_message(message_hash.as_slice())
            .await
            .map_err(|e| eyre!("Failed to sign message: {}", e))?;

        Ok(signature.as_bytes().to_vec())
    }
}
