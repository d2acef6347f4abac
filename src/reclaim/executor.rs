//! Batch execution
//!
//! Each batch is handled on its own: fetch a blockhash, sign, simulate, and
//! only if simulation is clean submit and wait for `confirmed`. A failure at
//! any step ends that batch with a failed outcome; the next batch starts
//! fresh. Batches run strictly one after another so no two in-flight
//! transactions compete for the same blockhash or accounts.

use std::time::Instant;

use solana_sdk::{
    signature::{Keypair, Signer},
    transaction::Transaction,
};

use super::batch::Batch;
use super::outcome::{BatchReport, BatchState, ExecutionOutcome};
use crate::ledger::{LedgerClient, LedgerError, SimulationReport};
use crate::structured_logging::StructuredLogger;

/// Number of trailing program log lines kept in a simulation diagnostic
const SIMULATION_LOG_TAIL: usize = 5;

/// Whether successful simulations are followed by submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    #[default]
    Live,
    /// Simulate every batch, never submit
    DryRun,
}

/// Executes packed batches against a ledger
pub struct TransactionExecutor<'a, L: LedgerClient + ?Sized> {
    ledger: &'a L,
    signer: &'a Keypair,
    mode: ExecutionMode,
    logger: StructuredLogger,
}

impl<'a, L: LedgerClient + ?Sized> TransactionExecutor<'a, L> {
    pub fn new(
        ledger: &'a L,
        signer: &'a Keypair,
        mode: ExecutionMode,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            ledger,
            signer,
            mode,
            logger,
        }
    }

    fn transition(&self, batch: &Batch, state: BatchState) {
        self.logger.log_batch_state(batch.index, state.as_str());
    }

    /// Execute a single batch to a terminal outcome
    pub async fn execute_batch(&self, batch: &Batch) -> ExecutionOutcome {
        let started = Instant::now();
        self.transition(batch, BatchState::Built);

        let outcome = self.run_batch(batch).await;

        let latency_ms = started.elapsed().as_millis() as u64;
        match &outcome {
            ExecutionOutcome::Confirmed { signature } => {
                self.logger
                    .log_batch_confirmed(batch.index, &signature.to_string(), latency_ms);
            }
            ExecutionOutcome::Simulated { units_consumed } => {
                self.logger.log_batch_simulated(batch.index, *units_consumed);
            }
            failed => {
                if let Some(err) = failed.to_error(batch.index) {
                    self.logger.log_batch_failure(
                        batch.index,
                        err.category(),
                        &err.to_string(),
                        latency_ms,
                    );
                }
            }
        }
        self.transition(batch, outcome.state());
        outcome
    }

    async fn run_batch(&self, batch: &Batch) -> ExecutionOutcome {
        let blockhash = match self.ledger.latest_blockhash().await {
            Ok(hash) => hash,
            Err(e) => {
                return ExecutionOutcome::SubmissionFailed {
                    diagnostic: ledger_diagnostic("blockhash unavailable", &e),
                }
            }
        };

        let payer = self.signer.pubkey();
        let mut transaction = Transaction::new_with_payer(&batch.instructions(), Some(&payer));
        if let Err(e) = transaction.try_sign(&[self.signer], blockhash) {
            return ExecutionOutcome::SubmissionFailed {
                diagnostic: format!("signing failed: {}", e),
            };
        }

        self.transition(batch, BatchState::Simulating);
        let report = match self.ledger.simulate_transaction(&transaction).await {
            Ok(report) => report,
            Err(e) => {
                return ExecutionOutcome::SubmissionFailed {
                    diagnostic: ledger_diagnostic("simulation unavailable", &e),
                }
            }
        };
        if !report.is_success() {
            return ExecutionOutcome::SimulationFailed {
                diagnostic: simulation_diagnostic(&report),
            };
        }
        self.transition(batch, BatchState::Simulated);

        if self.mode == ExecutionMode::DryRun {
            return ExecutionOutcome::Simulated {
                units_consumed: report.units_consumed,
            };
        }

        self.transition(batch, BatchState::Submitting);
        match self.ledger.send_and_confirm_transaction(&transaction).await {
            Ok(signature) => ExecutionOutcome::Confirmed { signature },
            Err(e) => ExecutionOutcome::SubmissionFailed {
                diagnostic: ledger_diagnostic("send and confirm", &e),
            },
        }
    }

    /// Execute every batch in order, one at a time
    pub async fn execute_all<B>(&self, batches: B) -> Vec<BatchReport>
    where
        B: IntoIterator<Item = Batch>,
    {
        let mut reports = Vec::new();
        for batch in batches {
            let outcome = self.execute_batch(&batch).await;
            reports.push(BatchReport {
                index: batch.index,
                instruction_count: batch.instruction_count(),
                accounts: batch.accounts(),
                outcome,
            });
        }
        reports
    }
}

/// Diagnostic for a failed ledger call, flagging errors a rerun may clear
fn ledger_diagnostic(step: &str, err: &LedgerError) -> String {
    if err.is_transient() {
        format!("{}: {} (transient, rerun may help)", step, err)
    } else {
        format!("{}: {}", step, err)
    }
}

/// Build a diagnostic from a failed simulation: error plus log tail
fn simulation_diagnostic(report: &SimulationReport) -> String {
    let err = report.err.as_deref().unwrap_or("simulation failed");
    let tail: Vec<&str> = report
        .logs
        .iter()
        .rev()
        .take(SIMULATION_LOG_TAIL)
        .rev()
        .map(String::as_str)
        .collect();

    if tail.is_empty() {
        err.to_string()
    } else {
        format!("{} [logs: {}]", err, tail.join(" | "))
    }
}
