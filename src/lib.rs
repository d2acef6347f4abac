//! token-reclaim library
//!
//! Exposes the reclaim pipeline, the ledger abstraction and configuration
//! for the binary and for integration tests.

pub mod config;
pub mod ledger;
pub mod reclaim;
pub mod structured_logging;
pub mod test_utils;
pub mod wallet;

// Re-export commonly used types
pub use solana_sdk::{pubkey::Pubkey, signature::Signature};

#[cfg(test)]
mod tests;
