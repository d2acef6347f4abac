//! SPL Token program adapter
//!
//! The only place that knows the token account layout and the token
//! instruction encodings. Everything above it works with decoded fields
//! and opaque `Instruction`s.

use solana_sdk::{instruction::Instruction, pubkey::Pubkey};
use spl_token::{
    instruction::{burn_checked, close_account},
    solana_program::program_pack::Pack,
    state::Account as TokenAccount,
};

use super::errors::ReclaimError;

/// Program id of the standard SPL Token program
pub fn program_id() -> Pubkey {
    spl_token::id()
}

/// Fields of a token account the pipeline cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodedTokenAccount {
    pub mint: Pubkey,
    pub owner: Pubkey,
    pub amount: u64,
    /// Wrapped SOL account; closing returns its lamports, burning is unsupported
    pub is_native: bool,
    /// Frozen accounts can be neither burned nor closed
    pub is_frozen: bool,
}

/// Decode raw account bytes in the SPL Token account layout
pub fn decode_token_account(data: &[u8]) -> Result<DecodedTokenAccount, String> {
    let account = TokenAccount::unpack(data).map_err(|e| e.to_string())?;
    Ok(DecodedTokenAccount {
        mint: account.mint,
        owner: account.owner,
        amount: account.amount,
        is_native: account.is_native(),
        is_frozen: account.is_frozen(),
    })
}

/// `BurnChecked` of `amount` base units, signed by `owner`
pub fn burn_checked_instruction(
    account: &Pubkey,
    mint: &Pubkey,
    owner: &Pubkey,
    amount: u64,
    decimals: u8,
) -> Result<Instruction, ReclaimError> {
    burn_checked(&program_id(), account, mint, owner, &[], amount, decimals)
        .map_err(|e| ReclaimError::instruction_failed(*account, format!("burn_checked: {}", e)))
}

/// `CloseAccount` refunding rent to `owner`
pub fn close_account_instruction(
    account: &Pubkey,
    owner: &Pubkey,
) -> Result<Instruction, ReclaimError> {
    close_account(&program_id(), account, owner, owner, &[])
        .map_err(|e| ReclaimError::instruction_failed(*account, format!("close_account: {}", e)))
}

/// Instruction tag of `CloseAccount` in the token program encoding
pub const CLOSE_ACCOUNT_TAG: u8 = 9;
/// Instruction tag of `BurnChecked` in the token program encoding
pub const BURN_CHECKED_TAG: u8 = 15;

/// Serialize a token account in the SPL layout (test fixtures)
#[cfg(any(test, feature = "test_utils"))]
pub fn pack_token_account(mint: &Pubkey, owner: &Pubkey, amount: u64, native: bool) -> Vec<u8> {
    use spl_token::solana_program::program_option::COption;
    use spl_token::state::AccountState;

    let account = TokenAccount {
        mint: *mint,
        owner: *owner,
        amount,
        delegate: COption::None,
        state: AccountState::Initialized,
        is_native: if native {
            COption::Some(2_039_280)
        } else {
            COption::None
        },
        delegated_amount: 0,
        close_authority: COption::None,
    };
    let mut data = vec![0u8; TokenAccount::LEN];
    TokenAccount::pack(account, &mut data).unwrap();
    data
}
