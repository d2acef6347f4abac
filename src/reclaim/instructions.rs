//! Instruction planning and pairing validation
//!
//! Every classified account yields at most one burn followed by exactly one
//! close, always in that order:
//! 1. `BurnChecked` (only when the balance is known, positive and not protected)
//! 2. `CloseAccount` (always; rent goes back to the wallet)
//!
//! The per-account grouping is kept so the batch packer can see pair
//! boundaries; [`flatten`] gives the plain ordered sequence.

use solana_sdk::{instruction::Instruction, pubkey::Pubkey};
use tracing::debug;

use super::classifier::TokenAccountRecord;
use super::errors::ReclaimError;
use super::token_program;

/// What an instruction does, for logging and assertions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstructionKind {
    Burn { mint: Pubkey, amount: u64, decimals: u8 },
    Close,
}

/// One unit of on-chain work against a single token account
#[derive(Debug, Clone, PartialEq)]
pub struct InstructionRecord {
    pub account: Pubkey,
    pub kind: InstructionKind,
    pub instruction: Instruction,
}

impl InstructionRecord {
    pub fn is_burn(&self) -> bool {
        matches!(self.kind, InstructionKind::Burn { .. })
    }

    pub fn is_close(&self) -> bool {
        matches!(self.kind, InstructionKind::Close)
    }
}

/// Instructions for one account: optional burn, then close
#[derive(Debug, Clone, PartialEq)]
pub struct AccountInstructions {
    pub account: Pubkey,
    pub burn: Option<InstructionRecord>,
    pub close: InstructionRecord,
}

impl AccountInstructions {
    /// Number of instructions in the group (1 or 2)
    pub fn instruction_count(&self) -> usize {
        1 + usize::from(self.burn.is_some())
    }

    pub fn iter(&self) -> impl Iterator<Item = &InstructionRecord> {
        self.burn.iter().chain(std::iter::once(&self.close))
    }

    pub fn into_records(self) -> Vec<InstructionRecord> {
        let mut records = Vec::with_capacity(self.instruction_count());
        records.extend(self.burn);
        records.push(self.close);
        records
    }
}

/// Why an account is closed without burning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurnSkip {
    BalanceUnknown,
    ZeroBalance,
    ProtectedMint,
    NativeAccount,
}

/// Decide whether `record` gets a burn, returning `(amount, decimals)` if so
pub fn burn_plan(record: &TokenAccountRecord) -> Result<(u64, u8), BurnSkip> {
    let balance = record.balance.as_ref().ok_or(BurnSkip::BalanceUnknown)?;
    match balance.ui_amount {
        Some(ui) if ui > 0.0 => {}
        None => return Err(BurnSkip::BalanceUnknown),
        Some(_) => return Err(BurnSkip::ZeroBalance),
    }
    if record.protected {
        return Err(BurnSkip::ProtectedMint);
    }
    if record.is_native {
        return Err(BurnSkip::NativeAccount);
    }
    Ok((balance.amount, balance.decimals))
}

/// Plan the burn/close group for a single account
pub fn plan_account_instructions(
    record: &TokenAccountRecord,
    owner: &Pubkey,
) -> Result<AccountInstructions, ReclaimError> {
    let burn = match burn_plan(record) {
        Ok((amount, decimals)) => {
            let instruction = token_program::burn_checked_instruction(
                &record.address,
                &record.mint,
                owner,
                amount,
                decimals,
            )?;
            Some(InstructionRecord {
                account: record.address,
                kind: InstructionKind::Burn {
                    mint: record.mint,
                    amount,
                    decimals,
                },
                instruction,
            })
        }
        Err(skip) => {
            debug!(account = %record.address, mint = %record.mint, reason = ?skip, "No burn");
            None
        }
    };

    let close = InstructionRecord {
        account: record.address,
        kind: InstructionKind::Close,
        instruction: token_program::close_account_instruction(&record.address, owner)?,
    };

    Ok(AccountInstructions {
        account: record.address,
        burn,
        close,
    })
}

/// Plan instruction groups for every record, preserving record order
pub fn plan_instructions(
    records: &[TokenAccountRecord],
    owner: &Pubkey,
) -> Result<Vec<AccountInstructions>, ReclaimError> {
    records
        .iter()
        .map(|record| plan_account_instructions(record, owner))
        .collect()
}

/// Flatten groups into the ordered instruction sequence
pub fn flatten(groups: &[AccountInstructions]) -> Vec<InstructionRecord> {
    groups.iter().flat_map(|g| g.iter().cloned()).collect()
}

/// Validate burn/close pairing in a flat sequence (debug/test only)
///
/// Every burn must be immediately followed by the close of the same account,
/// and no account may be closed twice.
#[cfg(debug_assertions)]
pub fn sanity_check_pairing(records: &[InstructionRecord]) -> Result<(), ReclaimError> {
    let mut closed = std::collections::HashSet::new();

    for (idx, record) in records.iter().enumerate() {
        match record.kind {
            InstructionKind::Burn { .. } => {
                let next = records.get(idx + 1);
                if !matches!(next, Some(n) if n.is_close() && n.account == record.account) {
                    return Err(ReclaimError::invalid_order(format!(
                        "burn for {} at position {} is not followed by its close",
                        record.account, idx
                    )));
                }
                if closed.contains(&record.account) {
                    return Err(ReclaimError::invalid_order(format!(
                        "burn for {} at position {} comes after its close",
                        record.account, idx
                    )));
                }
            }
            InstructionKind::Close => {
                if !closed.insert(record.account) {
                    return Err(ReclaimError::invalid_order(format!(
                        "account {} closed more than once (position {})",
                        record.account, idx
                    )));
                }
            }
        }
    }

    Ok(())
}

/// No-op version of sanity_check_pairing for release builds
#[cfg(not(debug_assertions))]
#[inline]
pub fn sanity_check_pairing(_records: &[InstructionRecord]) -> Result<(), ReclaimError> {
    Ok(())
}
