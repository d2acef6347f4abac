//! Batch packing
//!
//! Splits the ordered instruction groups into transaction-sized batches.
//! Packing is greedy and order preserving: a group (burn+close or a lone
//! close) goes into the current batch if it fits under
//! `max_instructions`, otherwise it opens the next batch. Groups are never
//! split. Each batch carries its two compute budget directives
//! (unit price first, then unit limit) ahead of the token instructions.

use std::iter::Peekable;

use solana_sdk::{compute_budget::ComputeBudgetInstruction, instruction::Instruction, pubkey::Pubkey};
use tracing::warn;

use super::errors::ReclaimError;
use super::instructions::{AccountInstructions, InstructionRecord};

/// Default cap on non-budget instructions per transaction
pub const DEFAULT_MAX_INSTRUCTIONS: usize = 22;
/// Default priority fee in micro-lamports per compute unit
pub const DEFAULT_COMPUTE_UNIT_PRICE: u64 = 220_000;
/// Default compute unit ceiling per transaction
pub const DEFAULT_COMPUTE_UNIT_LIMIT: u32 = 350_000;
/// Runtime ceiling for a single transaction
pub const MAX_COMPUTE_UNIT_LIMIT: u32 = 1_400_000;

/// Size and budget parameters for packing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchLimits {
    max_instructions: usize,
    compute_unit_price: u64,
    compute_unit_limit: u32,
}

impl BatchLimits {
    /// Validate and create limits.
    ///
    /// `max_instructions` must hold a full burn+close pair.
    pub fn new(
        max_instructions: usize,
        compute_unit_price: u64,
        compute_unit_limit: u32,
    ) -> Result<Self, ReclaimError> {
        if max_instructions < 2 {
            return Err(ReclaimError::config(format!(
                "max_instructions must be at least 2 to fit a burn+close pair, got {}",
                max_instructions
            )));
        }
        if compute_unit_limit == 0 || compute_unit_limit > MAX_COMPUTE_UNIT_LIMIT {
            return Err(ReclaimError::config(format!(
                "compute_unit_limit must be in 1..={}, got {}",
                MAX_COMPUTE_UNIT_LIMIT, compute_unit_limit
            )));
        }
        Ok(Self {
            max_instructions,
            compute_unit_price,
            compute_unit_limit,
        })
    }

    pub fn max_instructions(&self) -> usize {
        self.max_instructions
    }

    pub fn compute_unit_price(&self) -> u64 {
        self.compute_unit_price
    }

    pub fn compute_unit_limit(&self) -> u32 {
        self.compute_unit_limit
    }

    /// The two compute budget directives every batch starts with
    pub fn budget_instructions(&self) -> [Instruction; 2] {
        [
            ComputeBudgetInstruction::set_compute_unit_price(self.compute_unit_price),
            ComputeBudgetInstruction::set_compute_unit_limit(self.compute_unit_limit),
        ]
    }
}

impl Default for BatchLimits {
    fn default() -> Self {
        Self {
            max_instructions: DEFAULT_MAX_INSTRUCTIONS,
            compute_unit_price: DEFAULT_COMPUTE_UNIT_PRICE,
            compute_unit_limit: DEFAULT_COMPUTE_UNIT_LIMIT,
        }
    }
}

/// One transaction's worth of instructions
#[derive(Debug, Clone, PartialEq)]
pub struct Batch {
    /// 1-based position in the run
    pub index: usize,
    /// Compute budget directives (unit price, unit limit)
    pub budget: [Instruction; 2],
    /// Token instructions in original order
    pub records: Vec<InstructionRecord>,
}

impl Batch {
    /// Number of token (non-budget) instructions
    pub fn instruction_count(&self) -> usize {
        self.records.len()
    }

    /// Distinct token accounts touched, in order
    pub fn accounts(&self) -> Vec<Pubkey> {
        let mut accounts: Vec<Pubkey> = Vec::new();
        for record in &self.records {
            if accounts.last() != Some(&record.account) {
                accounts.push(record.account);
            }
        }
        accounts
    }

    /// Full instruction list for the transaction: budget first
    pub fn instructions(&self) -> Vec<Instruction> {
        let mut instructions = Vec::with_capacity(self.budget.len() + self.records.len());
        instructions.extend(self.budget.iter().cloned());
        instructions.extend(self.records.iter().map(|r| r.instruction.clone()));
        instructions
    }
}

/// Lazy single-pass packer over instruction groups
///
/// Consuming it yields each batch once; packing again requires building a
/// new packer from the same groups.
pub struct BatchPacker<I: Iterator<Item = AccountInstructions>> {
    groups: Peekable<I>,
    limits: BatchLimits,
    next_index: usize,
}

impl<I: Iterator<Item = AccountInstructions>> BatchPacker<I> {
    pub fn new(groups: I, limits: BatchLimits) -> Self {
        Self {
            groups: groups.peekable(),
            limits,
            next_index: 1,
        }
    }
}

impl<I: Iterator<Item = AccountInstructions>> Iterator for BatchPacker<I> {
    type Item = Batch;

    fn next(&mut self) -> Option<Batch> {
        let max = self.limits.max_instructions;
        let mut records: Vec<InstructionRecord> = Vec::with_capacity(max);

        while let Some(group) = self.groups.peek() {
            let fits = records.len() + group.instruction_count() <= max;
            if !fits && !records.is_empty() {
                break;
            }
            if !fits {
                // Only reachable with limits that bypassed validation
                warn!(
                    account = %group.account,
                    group_len = group.instruction_count(),
                    max_instructions = max,
                    "Instruction group exceeds batch limit, packing it alone"
                );
            }
            if let Some(group) = self.groups.next() {
                records.extend(group.into_records());
            }
            if !fits {
                break;
            }
        }

        if records.is_empty() {
            return None;
        }

        let batch = Batch {
            index: self.next_index,
            budget: self.limits.budget_instructions(),
            records,
        };
        self.next_index += 1;
        Some(batch)
    }
}

/// Pack `groups` into batches under `limits`
pub fn pack_batches<G>(groups: G, limits: BatchLimits) -> BatchPacker<G::IntoIter>
where
    G: IntoIterator<Item = AccountInstructions>,
{
    BatchPacker::new(groups.into_iter(), limits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reclaim::instructions::plan_account_instructions;
    use crate::reclaim::classifier::TokenAccountRecord;
    use crate::ledger::TokenBalance;

    fn group(burn: bool) -> AccountInstructions {
        let owner = Pubkey::new_unique();
        let ui = if burn { 1.0 } else { 0.0 };
        let record = TokenAccountRecord {
            address: Pubkey::new_unique(),
            mint: Pubkey::new_unique(),
            lamports: 2_039_280,
            balance: Some(TokenBalance {
                amount: ui as u64,
                decimals: 0,
                ui_amount: Some(ui),
            }),
            protected: false,
            is_native: false,
        };
        plan_account_instructions(&record, &owner).unwrap()
    }

    fn sizes(batches: &[Batch]) -> Vec<usize> {
        batches.iter().map(Batch::instruction_count).collect()
    }

    #[test]
    fn test_limits_validation() {
        assert!(BatchLimits::new(1, 1, 1).is_err());
        assert!(BatchLimits::new(2, 0, 0).is_err());
        assert!(BatchLimits::new(2, 0, MAX_COMPUTE_UNIT_LIMIT + 1).is_err());
        assert!(BatchLimits::new(2, 0, 1).is_ok());
        assert_eq!(BatchLimits::default().max_instructions(), 22);
        assert_eq!(BatchLimits::default().compute_unit_price(), 220_000);
        assert_eq!(BatchLimits::default().compute_unit_limit(), 350_000);
    }

    #[test]
    fn test_empty_input_yields_no_batches() {
        let batches: Vec<Batch> = pack_batches(Vec::new(), BatchLimits::default()).collect();
        assert!(batches.is_empty());
    }

    #[test]
    fn test_thirty_pairs_pack_22_22_16() {
        let groups: Vec<_> = (0..30).map(|_| group(true)).collect();
        let batches: Vec<Batch> = pack_batches(groups, BatchLimits::default()).collect();
        assert_eq!(sizes(&batches), vec![22, 22, 16]);
        assert_eq!(
            batches.iter().map(|b| b.index).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_pair_never_split_at_boundary() {
        // 21 lone closes leave one free slot; the next pair must move on
        let mut groups: Vec<_> = (0..21).map(|_| group(false)).collect();
        groups.push(group(true));
        let batches: Vec<Batch> = pack_batches(groups, BatchLimits::default()).collect();

        assert_eq!(sizes(&batches), vec![21, 2]);
        assert!(batches[1].records[0].is_burn());
        assert!(batches[1].records[1].is_close());
    }

    #[test]
    fn test_lone_close_fills_last_slot() {
        let mut groups: Vec<_> = (0..10).map(|_| group(true)).collect();
        groups.push(group(false));
        groups.push(group(false));
        groups.push(group(true));
        let batches: Vec<Batch> = pack_batches(groups, BatchLimits::default()).collect();

        assert_eq!(sizes(&batches), vec![22, 2]);
    }

    #[test]
    fn test_budget_directives_lead_every_batch() {
        let limits = BatchLimits::new(4, 1_000, 200_000).unwrap();
        let groups: Vec<_> = (0..3).map(|_| group(true)).collect();

        for batch in pack_batches(groups, limits) {
            let instructions = batch.instructions();
            assert_eq!(instructions.len(), batch.instruction_count() + 2);
            assert_eq!(
                instructions[0],
                ComputeBudgetInstruction::set_compute_unit_price(1_000)
            );
            assert_eq!(
                instructions[1],
                ComputeBudgetInstruction::set_compute_unit_limit(200_000)
            );
            assert!(instructions[2..]
                .iter()
                .all(|ix| ix.program_id == spl_token::id()));
        }
    }

    #[test]
    fn test_batch_accounts_dedup_pairs() {
        let groups = vec![group(true), group(false)];
        let expected: Vec<Pubkey> = groups.iter().map(|g| g.account).collect();
        let batch = pack_batches(groups, BatchLimits::default()).next().unwrap();
        assert_eq!(batch.accounts(), expected);
    }

    #[test]
    fn test_oversized_group_packed_alone() {
        // BatchLimits::new rejects this; build it directly
        let limits = BatchLimits {
            max_instructions: 1,
            compute_unit_price: 0,
            compute_unit_limit: 1,
        };
        let groups = vec![group(false), group(true), group(false)];
        let batches: Vec<Batch> = pack_batches(groups, limits).collect();
        assert_eq!(sizes(&batches), vec![1, 2, 1]);
    }
}
