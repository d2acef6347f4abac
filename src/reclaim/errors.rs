//! Error types for the reclaim pipeline
//!
//! Fatal errors stop the run before any transaction is sent. Everything
//! else is caught at the boundary of the stage that produced it, logged
//! with the offending account or batch, and folded into the run report.

use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

use crate::ledger::LedgerError;

/// Error taxonomy for the reclaim pipeline
#[derive(Error, Debug)]
pub enum ReclaimError {
    /// Missing or malformed configuration (endpoint, key, limits)
    ///
    /// Fatal: the run does not start.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Token account enumeration failed
    ///
    /// Fatal: there are no accounts to process.
    #[error("Token account discovery failed: {0}")]
    Discovery(#[source] LedgerError),

    /// Balance query for a single account failed
    ///
    /// Non-fatal: the account is still closed but never burned.
    #[error("Balance query failed for {account}: {source}")]
    BalanceQuery {
        account: Pubkey,
        #[source]
        source: LedgerError,
    },

    /// The token program adapter could not build an instruction
    #[error("Instruction build error (account={account}): {reason}")]
    InstructionBuild { account: Pubkey, reason: String },

    /// Burn/close pairing or ordering violated
    ///
    /// Indicates a bug in planning or packing; checked in debug builds.
    #[error("Invalid instruction order: {0}")]
    InvalidInstructionOrder(String),

    /// Pre-flight simulation reported an error for a batch
    ///
    /// Non-fatal: the batch is not submitted, the next batch proceeds.
    #[error("Simulation failed for batch {batch}: {diagnostic}")]
    Simulation { batch: usize, diagnostic: String },

    /// Blockhash, signing, submission or confirmation failed for a batch
    ///
    /// Non-fatal: the next batch proceeds.
    #[error("Submission failed for batch {batch}: {diagnostic}")]
    Submission { batch: usize, diagnostic: String },
}

impl ReclaimError {
    /// Whether this error aborts the whole run
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Config(_) => true,
            Self::Discovery(_) => true,
            Self::InstructionBuild { .. } => true,
            Self::InvalidInstructionOrder(_) => true,

            Self::BalanceQuery { .. } => false,
            Self::Simulation { .. } => false,
            Self::Submission { .. } => false,
        }
    }

    /// Get the error category for logs
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Discovery(_) => "discovery",
            Self::BalanceQuery { .. } => "balance",
            Self::InstructionBuild { .. } => "instruction",
            Self::InvalidInstructionOrder(_) => "validation",
            Self::Simulation { .. } => "simulation",
            Self::Submission { .. } => "submission",
        }
    }
}

// Convenience constructors
impl ReclaimError {
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config(reason.into())
    }

    pub fn instruction_failed(account: Pubkey, reason: impl Into<String>) -> Self {
        Self::InstructionBuild {
            account,
            reason: reason.into(),
        }
    }

    pub fn invalid_order(reason: impl Into<String>) -> Self {
        Self::InvalidInstructionOrder(reason.into())
    }
}
