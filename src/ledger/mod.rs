//! Ledger client capability
//!
//! The reclaim pipeline never talks to the cluster directly. Everything it
//! needs from the ledger goes through [`LedgerClient`], which keeps the core
//! testable against an in-memory ledger and lets the production adapter
//! ([`RpcLedger`]) own connection details and timeouts.

use async_trait::async_trait;
use solana_sdk::{hash::Hash, pubkey::Pubkey, signature::Signature, transaction::Transaction};

// Submodules
pub mod ledger_errors;
pub mod rpc_ledger;

// Re-exports for convenience
pub use ledger_errors::LedgerError;
pub use rpc_ledger::{RpcLedger, RpcLedgerConfig};

/// A token account as returned by enumeration, before decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawTokenAccount {
    /// Address of the token account
    pub address: Pubkey,
    /// Lamports held by the account (rent refunded on close)
    pub lamports: u64,
    /// Raw account data in the token program layout
    pub data: Vec<u8>,
}

/// Current balance of a token account as reported by the cluster
#[derive(Debug, Clone, PartialEq)]
pub struct TokenBalance {
    /// Raw token amount in base units
    pub amount: u64,
    /// Decimal precision of the mint
    pub decimals: u8,
    /// Amount scaled by decimals; `None` when the cluster cannot express it
    pub ui_amount: Option<f64>,
}

/// Result of a pre-flight simulation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SimulationReport {
    /// Program or transaction error, if the simulated transaction failed
    pub err: Option<String>,
    /// Program logs emitted during simulation
    pub logs: Vec<String>,
    /// Compute units consumed by the simulation
    pub units_consumed: Option<u64>,
}

impl SimulationReport {
    pub fn is_success(&self) -> bool {
        self.err.is_none()
    }
}

/// Capability surface the reclaim pipeline consumes from the ledger.
///
/// Implementations must be usable from a single task at a time per call;
/// the pipeline only issues concurrent calls for balance queries.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Enumerate every token account owned by `owner` under `program_id`.
    async fn token_accounts_by_owner(
        &self,
        owner: &Pubkey,
        program_id: &Pubkey,
    ) -> Result<Vec<RawTokenAccount>, LedgerError>;

    /// Fetch the current balance of a single token account.
    async fn token_account_balance(&self, account: &Pubkey) -> Result<TokenBalance, LedgerError>;

    /// Fetch the latest blockhash.
    async fn latest_blockhash(&self) -> Result<Hash, LedgerError>;

    /// Simulate a signed transaction without submitting it.
    async fn simulate_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<SimulationReport, LedgerError>;

    /// Submit a signed transaction and wait for `confirmed` commitment.
    async fn send_and_confirm_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<Signature, LedgerError>;
}
