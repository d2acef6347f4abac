//! Per-batch outcomes and the run report

use std::fmt;

use solana_sdk::{pubkey::Pubkey, signature::Signature};

use super::errors::ReclaimError;

/// Lifecycle of a single batch
///
/// `Built -> Simulating -> {SimulationFailed | Simulated} -> Submitting
/// -> {SubmissionFailed | Confirmed}`. A blockhash or signing failure moves
/// straight from `Built` to `SubmissionFailed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    Built,
    Simulating,
    Simulated,
    Submitting,
    SimulationFailed,
    SubmissionFailed,
    Confirmed,
}

impl BatchState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Built => "built",
            Self::Simulating => "simulating",
            Self::Simulated => "simulated",
            Self::Submitting => "submitting",
            Self::SimulationFailed => "simulation_failed",
            Self::SubmissionFailed => "submission_failed",
            Self::Confirmed => "confirmed",
        }
    }
}

/// Terminal result of executing one batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Simulated, submitted and confirmed
    Confirmed { signature: Signature },
    /// Simulated successfully in dry-run mode; nothing was submitted
    Simulated { units_consumed: Option<u64> },
    /// Simulation reported an error; the batch was not submitted
    SimulationFailed { diagnostic: String },
    /// Blockhash, signing, simulation call, submission or confirmation failed
    SubmissionFailed { diagnostic: String },
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Confirmed { .. } | Self::Simulated { .. })
    }

    pub fn signature(&self) -> Option<&Signature> {
        match self {
            Self::Confirmed { signature } => Some(signature),
            _ => None,
        }
    }

    pub fn state(&self) -> BatchState {
        match self {
            Self::Confirmed { .. } => BatchState::Confirmed,
            Self::Simulated { .. } => BatchState::Simulated,
            Self::SimulationFailed { .. } => BatchState::SimulationFailed,
            Self::SubmissionFailed { .. } => BatchState::SubmissionFailed,
        }
    }

    /// Error form of a failed outcome, for logging
    pub fn to_error(&self, batch: usize) -> Option<ReclaimError> {
        match self {
            Self::SimulationFailed { diagnostic } => Some(ReclaimError::Simulation {
                batch,
                diagnostic: diagnostic.clone(),
            }),
            Self::SubmissionFailed { diagnostic } => Some(ReclaimError::Submission {
                batch,
                diagnostic: diagnostic.clone(),
            }),
            _ => None,
        }
    }
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Confirmed { signature } => write!(f, "confirmed {}", signature),
            Self::Simulated { units_consumed } => match units_consumed {
                Some(units) => write!(f, "simulated ok ({} CU), not submitted", units),
                None => write!(f, "simulated ok, not submitted"),
            },
            Self::SimulationFailed { diagnostic } => write!(f, "simulation failed: {}", diagnostic),
            Self::SubmissionFailed { diagnostic } => write!(f, "submission failed: {}", diagnostic),
        }
    }
}

/// Outcome of one batch plus what it contained
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub index: usize,
    pub instruction_count: usize,
    pub accounts: Vec<Pubkey>,
    pub outcome: ExecutionOutcome,
}

/// Summary of a full run
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub run_id: String,
    /// Accounts returned by enumeration
    pub accounts_discovered: usize,
    /// Accounts left out (foreign owner, frozen, undecodable)
    pub accounts_skipped: usize,
    pub burns: usize,
    pub closes: usize,
    /// Rent held by the accounts scheduled for closing
    pub reclaimable_lamports: u64,
    pub batches: Vec<BatchReport>,
}

impl RunReport {
    pub fn instruction_count(&self) -> usize {
        self.burns + self.closes
    }

    pub fn succeeded(&self) -> usize {
        self.batches.iter().filter(|b| b.outcome.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.batches.len() - self.succeeded()
    }

    /// Accounts touched by confirmed batches
    pub fn confirmed_accounts(&self) -> impl Iterator<Item = &Pubkey> {
        self.batches
            .iter()
            .filter(|b| matches!(b.outcome, ExecutionOutcome::Confirmed { .. }))
            .flat_map(|b| b.accounts.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_states() {
        let confirmed = ExecutionOutcome::Confirmed {
            signature: Signature::from([7u8; 64]),
        };
        assert!(confirmed.is_success());
        assert_eq!(confirmed.state(), BatchState::Confirmed);
        assert!(confirmed.to_error(1).is_none());

        let failed = ExecutionOutcome::SimulationFailed {
            diagnostic: "custom program error: 0x11".to_string(),
        };
        assert!(!failed.is_success());
        assert!(matches!(
            failed.to_error(2),
            Some(ReclaimError::Simulation { batch: 2, .. })
        ));

        assert_eq!(BatchState::SimulationFailed.as_str(), "simulation_failed");
    }

    #[test]
    fn test_report_counts() {
        let report = RunReport {
            batches: vec![
                BatchReport {
                    index: 1,
                    instruction_count: 2,
                    accounts: vec![Pubkey::new_unique()],
                    outcome: ExecutionOutcome::Confirmed {
                        signature: Signature::default(),
                    },
                },
                BatchReport {
                    index: 2,
                    instruction_count: 1,
                    accounts: vec![Pubkey::new_unique()],
                    outcome: ExecutionOutcome::SubmissionFailed {
                        diagnostic: "timeout".to_string(),
                    },
                },
            ],
            burns: 1,
            closes: 2,
            ..RunReport::default()
        };

        assert_eq!(report.succeeded(), 1);
        assert_eq!(report.failed(), 1);
        assert_eq!(report.instruction_count(), 3);
        assert_eq!(report.confirmed_accounts().count(), 1);
    }
}
