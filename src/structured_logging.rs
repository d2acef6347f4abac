//! Structured logging for reclaim runs

use solana_sdk::pubkey::Pubkey;
use uuid::Uuid;

/// Run-scoped structured logger
///
/// Every event carries the run id so interleaved logs from several runs
/// (or a rerun after partial failure) can be told apart.
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    run_id: String,
}

impl StructuredLogger {
    pub fn new(run_id: String) -> Self {
        Self { run_id }
    }

    /// Logger with a fresh random run id
    pub fn for_new_run() -> Self {
        Self::new(Uuid::new_v4().to_string())
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn log_run_started(&self, wallet: &Pubkey, dry_run: bool, protected_mints: usize) {
        tracing::info!(
            run_id = %self.run_id,
            wallet = %wallet,
            dry_run = %dry_run,
            protected_mints = %protected_mints,
            "Reclaim run started"
        );
    }

    pub fn log_plan(&self, accounts: usize, burns: usize, closes: usize) {
        tracing::info!(
            run_id = %self.run_id,
            accounts = %accounts,
            burns = %burns,
            closes = %closes,
            "Instructions planned"
        );
    }

    pub fn log_batch_state(&self, batch: usize, state: &str) {
        tracing::debug!(
            run_id = %self.run_id,
            batch = %batch,
            state = %state,
            "Batch state"
        );
    }

    pub fn log_batch_confirmed(&self, batch: usize, sig: &str, latency_ms: u64) {
        tracing::info!(
            run_id = %self.run_id,
            batch = %batch,
            signature = %sig,
            latency_ms = %latency_ms,
            "Batch confirmed"
        );
    }

    pub fn log_batch_simulated(&self, batch: usize, units_consumed: Option<u64>) {
        tracing::info!(
            run_id = %self.run_id,
            batch = %batch,
            units_consumed = ?units_consumed,
            "Batch simulated (dry run, not submitted)"
        );
    }

    pub fn log_batch_failure(&self, batch: usize, category: &str, error: &str, latency_ms: u64) {
        tracing::warn!(
            run_id = %self.run_id,
            batch = %batch,
            category = %category,
            error = %error,
            latency_ms = %latency_ms,
            "Batch failed"
        );
    }

    pub fn log_run_finished(
        &self,
        confirmed: usize,
        failed: usize,
        closed_accounts: usize,
        reclaimable_lamports: u64,
    ) {
        tracing::info!(
            run_id = %self.run_id,
            confirmed = %confirmed,
            failed = %failed,
            closed_accounts = %closed_accounts,
            reclaimable_lamports = %reclaimable_lamports,
            "Reclaim run finished"
        );
    }
}

impl Default for StructuredLogger {
    fn default() -> Self {
        Self::for_new_run()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_ids_are_unique() {
        let a = StructuredLogger::for_new_run();
        let b = StructuredLogger::for_new_run();
        assert_ne!(a.run_id(), b.run_id());
        assert!(Uuid::parse_str(a.run_id()).is_ok());
    }
}
