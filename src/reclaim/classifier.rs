//! Account classification
//!
//! Turns the raw token accounts owned by the wallet into decision-ready
//! [`TokenAccountRecord`]s. Enumeration failure is fatal; a failed balance
//! query only degrades that one record to "balance unknown".

use std::collections::HashSet;

use futures::stream::{self, StreamExt};
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, info, warn};

use super::errors::ReclaimError;
use super::token_program;
use crate::ledger::{LedgerClient, RawTokenAccount, TokenBalance};

/// Canonical USDC mint on mainnet-beta
pub const USDC_MINT: &str = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v";

const USDC_MINT_PUBKEY: Pubkey = solana_sdk::pubkey!("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v");

/// Mints that are closed but never burned
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtectedMintSet {
    mints: HashSet<Pubkey>,
}

impl ProtectedMintSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the set from the skip-USDC flag plus any extra mints
    pub fn from_config(skip_usdc: bool, extra: impl IntoIterator<Item = Pubkey>) -> Self {
        let mut set = Self::new();
        if skip_usdc {
            set.insert(usdc_mint());
        }
        for mint in extra {
            set.insert(mint);
        }
        set
    }

    pub fn insert(&mut self, mint: Pubkey) -> bool {
        self.mints.insert(mint)
    }

    pub fn contains(&self, mint: &Pubkey) -> bool {
        self.mints.contains(mint)
    }

    pub fn len(&self) -> usize {
        self.mints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mints.is_empty()
    }
}

/// USDC mint as a `Pubkey`
pub fn usdc_mint() -> Pubkey {
    USDC_MINT_PUBKEY
}

/// A token account ready for the instruction builder
#[derive(Debug, Clone, PartialEq)]
pub struct TokenAccountRecord {
    /// Token account address
    pub address: Pubkey,
    /// Mint of the tokens held
    pub mint: Pubkey,
    /// Lamports refunded when the account is closed
    pub lamports: u64,
    /// Current balance; `None` when the balance query failed
    pub balance: Option<TokenBalance>,
    /// Mint is in the protected set
    pub protected: bool,
    /// Wrapped SOL account
    pub is_native: bool,
}

impl TokenAccountRecord {
    /// UI amount, if the balance is known and expressible
    pub fn ui_amount(&self) -> Option<f64> {
        self.balance.as_ref().and_then(|b| b.ui_amount)
    }
}

/// An account discovered but left out of the pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedAccount {
    pub address: Pubkey,
    pub reason: String,
}

/// Output of [`classify_accounts`]
#[derive(Debug, Clone, Default)]
pub struct Classification {
    /// Records in discovery order
    pub records: Vec<TokenAccountRecord>,
    /// Accounts that cannot be processed at all
    pub skipped: Vec<SkippedAccount>,
    /// Number of accounts returned by enumeration
    pub discovered: usize,
}

/// Discover and classify every SPL Token account owned by `owner`.
///
/// Balance queries run concurrently with at most `concurrency` in flight;
/// results are collected in discovery order.
pub async fn classify_accounts<L>(
    ledger: &L,
    owner: &Pubkey,
    protected: &ProtectedMintSet,
    concurrency: usize,
) -> Result<Classification, ReclaimError>
where
    L: LedgerClient + ?Sized,
{
    let raw_accounts = ledger
        .token_accounts_by_owner(owner, &token_program::program_id())
        .await
        .map_err(ReclaimError::Discovery)?;

    let discovered = raw_accounts.len();
    info!(count = discovered, owner = %owner, "Token accounts discovered");

    let mut skipped = Vec::new();
    let mut candidates = Vec::with_capacity(discovered);

    for raw in raw_accounts {
        match token_program::decode_token_account(&raw.data) {
            Ok(decoded) if decoded.owner != *owner => {
                warn!(account = %raw.address, owner = %decoded.owner, "Skipping account not owned by wallet");
                skipped.push(SkippedAccount {
                    address: raw.address,
                    reason: format!("owned by {}", decoded.owner),
                });
            }
            Ok(decoded) if decoded.is_frozen => {
                warn!(account = %raw.address, mint = %decoded.mint, "Skipping frozen account");
                skipped.push(SkippedAccount {
                    address: raw.address,
                    reason: "account is frozen".to_string(),
                });
            }
            Ok(decoded) => candidates.push((raw, decoded)),
            Err(e) => {
                warn!(account = %raw.address, error = %e, "Skipping undecodable token account");
                skipped.push(SkippedAccount {
                    address: raw.address,
                    reason: format!("decode failed: {}", e),
                });
            }
        }
    }

    let records: Vec<TokenAccountRecord> = stream::iter(candidates)
        .map(|(raw, decoded)| async move {
            let balance = ledger.token_account_balance(&raw.address).await;
            (raw, decoded, balance)
        })
        .buffered(concurrency.max(1))
        .map(|(raw, decoded, balance)| {
            let RawTokenAccount {
                address, lamports, ..
            } = raw;

            let balance = match balance {
                Ok(balance) => Some(balance),
                Err(source) => {
                    let err = ReclaimError::BalanceQuery {
                        account: address,
                        source,
                    };
                    warn!(
                        account = %address,
                        mint = %decoded.mint,
                        category = err.category(),
                        error = %err,
                        "Balance unknown, account will be closed without burn"
                    );
                    None
                }
            };

            let record = TokenAccountRecord {
                address,
                mint: decoded.mint,
                lamports,
                balance,
                protected: protected.contains(&decoded.mint),
                is_native: decoded.is_native,
            };
            debug!(
                account = %record.address,
                mint = %record.mint,
                ui_amount = ?record.ui_amount(),
                protected = record.protected,
                "Account classified"
            );
            record
        })
        .collect()
        .await;

    Ok(Classification {
        records,
        skipped,
        discovered,
    })
}
