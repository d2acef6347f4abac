//! Wallet management module

use std::sync::Arc;

use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use zeroize::Zeroizing;

use crate::reclaim::ReclaimError;

/// Expected length of an ed25519 keypair (secret || public)
const KEYPAIR_LEN: usize = 64;

/// Signing identity for the run
///
/// Held for the whole run and only used to sign; decoded key bytes are
/// wiped as soon as the `Keypair` is built.
pub struct WalletManager {
    keypair: Arc<Keypair>,
}

impl WalletManager {
    /// Create a wallet from a base58-encoded 64-byte keypair
    pub fn from_base58(encoded: &str) -> Result<Self, ReclaimError> {
        let bytes = Zeroizing::new(
            bs58::decode(encoded.trim())
                .into_vec()
                .map_err(|e| ReclaimError::config(format!("Failed to decode base58 private key: {}", e)))?,
        );
        Self::from_bytes(&bytes)
    }

    /// Create a wallet from a keypair file (JSON byte array or raw 64 bytes)
    pub fn from_file(path: &str) -> Result<Self, ReclaimError> {
        let contents = Zeroizing::new(std::fs::read(path).map_err(|e| {
            ReclaimError::config(format!("Failed to read keypair file {}: {}", path, e))
        })?);

        if contents.len() == KEYPAIR_LEN {
            return Self::from_bytes(&contents);
        }

        let json: Zeroizing<Vec<u8>> = Zeroizing::new(
            serde_json::from_slice(&contents)
                .map_err(|e| ReclaimError::config(format!("Failed to parse keypair JSON: {}", e)))?,
        );
        Self::from_bytes(&json)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self, ReclaimError> {
        if bytes.len() != KEYPAIR_LEN {
            return Err(ReclaimError::config(format!(
                "Invalid keypair length: expected {} bytes, got {}",
                KEYPAIR_LEN,
                bytes.len()
            )));
        }
        if bytes.iter().all(|&b| b == 0) {
            return Err(ReclaimError::config("Invalid keypair: all-zero key rejected"));
        }
        let keypair = Keypair::try_from(bytes)
            .map_err(|e| ReclaimError::config(format!("Invalid keypair bytes: {}", e)))?;

        Ok(Self {
            keypair: Arc::new(keypair),
        })
    }

    /// Create a new wallet manager from a keypair
    pub fn from_keypair(keypair: Keypair) -> Self {
        Self {
            keypair: Arc::new(keypair),
        }
    }

    /// Get the public key
    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }

    /// Get a reference to the keypair
    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}

impl Clone for WalletManager {
    fn clone(&self) -> Self {
        Self {
            keypair: Arc::clone(&self.keypair),
        }
    }
}

impl std::fmt::Debug for WalletManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletManager")
            .field("pubkey", &self.pubkey())
            .finish()
    }
}
