//! Token account reclaim pipeline
//!
//! Recovers rent from a wallet's token accounts in four stages:
//! - **classifier**: enumerate and decode accounts, query balances
//! - **instructions**: plan burn (when needed) + close per account
//! - **batch**: pack instruction groups into bounded transactions
//! - **executor**: sign, simulate, submit and confirm each batch
//!
//! Supporting modules:
//! - **errors**: error taxonomy (fatal vs. per-account / per-batch)
//! - **outcome**: batch lifecycle states and the run report
//! - **token_program**: SPL Token layout and instruction adapter
//!
//! The stages form a single linear pass. Failed batches are reported, not
//! retried; rerunning is safe because closed accounts disappear from
//! discovery and emptied accounts need no further burn.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use token_reclaim::ledger::{RpcLedger, RpcLedgerConfig};
//! use token_reclaim::reclaim::{run_reclaim, ReclaimSettings};
//! use token_reclaim::structured_logging::StructuredLogger;
//! use token_reclaim::wallet::WalletManager;
//! use std::time::Duration;
//!
//! # async fn example(wallet: WalletManager) -> Result<(), token_reclaim::reclaim::ReclaimError> {
//! let ledger = RpcLedger::new(RpcLedgerConfig {
//!     endpoint: "https://api.mainnet-beta.solana.com".to_string(),
//!     request_timeout: Duration::from_secs(30),
//!     confirm_timeout: Duration::from_secs(60),
//! });
//! let report = run_reclaim(
//!     &ledger,
//!     &wallet,
//!     &ReclaimSettings::default(),
//!     StructuredLogger::for_new_run(),
//! )
//! .await?;
//! println!("{} of {} batches succeeded", report.succeeded(), report.batches.len());
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod classifier;
pub mod errors;
pub mod executor;
pub mod instructions;
pub mod outcome;
pub mod token_program;

pub use batch::{pack_batches, Batch, BatchLimits, BatchPacker};
pub use classifier::{classify_accounts, ProtectedMintSet, TokenAccountRecord};
pub use errors::ReclaimError;
pub use executor::{ExecutionMode, TransactionExecutor};
pub use instructions::{plan_instructions, AccountInstructions, InstructionKind, InstructionRecord};
pub use outcome::{BatchReport, BatchState, ExecutionOutcome, RunReport};

use tracing::{info, warn};

use crate::ledger::LedgerClient;
use crate::structured_logging::StructuredLogger;
use crate::wallet::WalletManager;

/// Default number of balance queries in flight
pub const DEFAULT_BALANCE_CONCURRENCY: usize = 8;

/// Run-wide pipeline settings
#[derive(Debug, Clone)]
pub struct ReclaimSettings {
    pub protected: ProtectedMintSet,
    pub limits: BatchLimits,
    pub mode: ExecutionMode,
    pub balance_concurrency: usize,
}

impl Default for ReclaimSettings {
    fn default() -> Self {
        Self {
            protected: ProtectedMintSet::from_config(true, Vec::new()),
            limits: BatchLimits::default(),
            mode: ExecutionMode::Live,
            balance_concurrency: DEFAULT_BALANCE_CONCURRENCY,
        }
    }
}

/// Discover, plan, pack and execute in one pass.
///
/// Returns `Err` only for fatal errors (discovery, planning). Batch
/// failures are recorded in the report and never abort the run.
pub async fn run_reclaim<L>(
    ledger: &L,
    wallet: &WalletManager,
    settings: &ReclaimSettings,
    logger: StructuredLogger,
) -> Result<RunReport, ReclaimError>
where
    L: LedgerClient + ?Sized,
{
    let owner = wallet.pubkey();
    logger.log_run_started(
        &owner,
        settings.mode == ExecutionMode::DryRun,
        settings.protected.len(),
    );
    if settings.protected.is_empty() {
        warn!("No protected mints, every positive balance will be burned");
    }

    let classification = classify_accounts(
        ledger,
        &owner,
        &settings.protected,
        settings.balance_concurrency,
    )
    .await?;

    let groups = plan_instructions(&classification.records, &owner)?;
    instructions::sanity_check_pairing(&instructions::flatten(&groups))?;

    let burns = groups.iter().filter(|g| g.burn.is_some()).count();
    let closes = groups.len();
    let reclaimable_lamports = classification.records.iter().map(|r| r.lamports).sum();
    logger.log_plan(classification.records.len(), burns, closes);

    let mut report = RunReport {
        run_id: logger.run_id().to_string(),
        accounts_discovered: classification.discovered,
        accounts_skipped: classification.skipped.len(),
        burns,
        closes,
        reclaimable_lamports,
        batches: Vec::new(),
    };

    if groups.is_empty() {
        info!("No token accounts to process");
        return Ok(report);
    }

    let executor = TransactionExecutor::new(ledger, wallet.keypair(), settings.mode, logger.clone());
    report.batches = executor
        .execute_all(pack_batches(groups, settings.limits))
        .await;

    logger.log_run_finished(
        report.succeeded(),
        report.failed(),
        report.confirmed_accounts().count(),
        report.reclaimable_lamports,
    );
    Ok(report)
}
