//! Test Utilities Module
//!
//! In-memory [`LedgerClient`] for deterministic pipeline tests. It keeps a
//! small model of the wallet's token accounts and applies `BurnChecked` and
//! `CloseAccount` the way the token program does, so a close on an account
//! that still holds tokens fails simulation just as it would on chain.
//!
//! Only compiled for tests or with the `test_utils` feature.

#![cfg(any(test, feature = "test_utils"))]

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use solana_sdk::{
    hash::Hash, pubkey::Pubkey, signature::Signature, transaction::Transaction,
};

use crate::ledger::{LedgerClient, LedgerError, RawTokenAccount, SimulationReport, TokenBalance};
use crate::reclaim::token_program::{self, BURN_CHECKED_TAG, CLOSE_ACCOUNT_TAG};

/// Rent-exempt minimum for a 165-byte token account
pub const TOKEN_ACCOUNT_RENT: u64 = 2_039_280;

#[derive(Debug, Clone)]
struct MockAccount {
    address: Pubkey,
    mint: Pubkey,
    owner: Pubkey,
    amount: u64,
    decimals: u8,
    native: bool,
    /// Replaces the packed layout when set (undecodable fixtures)
    raw: Option<Vec<u8>>,
}

impl MockAccount {
    fn data(&self) -> Vec<u8> {
        match &self.raw {
            Some(raw) => raw.clone(),
            None => token_program::pack_token_account(&self.mint, &self.owner, self.amount, self.native),
        }
    }

    fn balance(&self) -> TokenBalance {
        TokenBalance {
            amount: self.amount,
            decimals: self.decimals,
            ui_amount: Some(self.amount as f64 / 10f64.powi(i32::from(self.decimals))),
        }
    }
}

#[derive(Default)]
struct MockState {
    accounts: Vec<MockAccount>,
    discovery_error: Option<LedgerError>,
    failing_balances: HashSet<Pubkey>,
    balance_delays: HashMap<Pubkey, Duration>,
    blockhash_failures: HashSet<usize>,
    simulation_failures: HashSet<usize>,
    simulation_call_failures: HashMap<usize, LedgerError>,
    send_failures: HashSet<usize>,
    blockhash_calls: usize,
    simulation_calls: usize,
    send_calls: usize,
    submitted: Vec<Transaction>,
}

/// Deterministic in-memory ledger
///
/// Failure hooks are keyed by 1-based call number of the respective
/// operation, so "fail the second simulation" is `fail_simulation_on(2)`.
#[derive(Clone)]
pub struct MockLedger {
    wallet: Pubkey,
    state: Arc<Mutex<MockState>>,
}

impl MockLedger {
    pub fn new(wallet: Pubkey) -> Self {
        Self {
            wallet,
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut MockState) -> R) -> R {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    fn push(&self, account: MockAccount) -> Pubkey {
        let address = account.address;
        self.with_state(|s| s.accounts.push(account));
        address
    }

    /// Add a wallet-owned token account holding `amount` base units
    pub fn add_account(&self, mint: Pubkey, amount: u64, decimals: u8) -> Pubkey {
        self.push(MockAccount {
            address: Pubkey::new_unique(),
            mint,
            owner: self.wallet,
            amount,
            decimals,
            native: false,
            raw: None,
        })
    }

    /// Add a wrapped SOL account
    pub fn add_native_account(&self, amount: u64) -> Pubkey {
        self.push(MockAccount {
            address: Pubkey::new_unique(),
            mint: spl_token::native_mint::id(),
            owner: self.wallet,
            amount,
            decimals: 9,
            native: true,
            raw: None,
        })
    }

    /// Add an account whose layout names a different owner
    pub fn add_foreign_account(&self, mint: Pubkey, owner: Pubkey) -> Pubkey {
        self.push(MockAccount {
            address: Pubkey::new_unique(),
            mint,
            owner,
            amount: 0,
            decimals: 0,
            native: false,
            raw: None,
        })
    }

    /// Add an account with arbitrary raw data
    pub fn add_raw_account(&self, data: Vec<u8>) -> Pubkey {
        self.push(MockAccount {
            address: Pubkey::new_unique(),
            mint: Pubkey::default(),
            owner: self.wallet,
            amount: 0,
            decimals: 0,
            native: false,
            raw: Some(data),
        })
    }

    pub fn fail_discovery(&self, err: LedgerError) {
        self.with_state(|s| s.discovery_error = Some(err));
    }

    pub fn fail_balance(&self, account: Pubkey) {
        self.with_state(|s| {
            s.failing_balances.insert(account);
        });
    }

    /// Hold back the balance reply for `account` by `delay`
    pub fn delay_balance(&self, account: Pubkey, delay: Duration) {
        self.with_state(|s| {
            s.balance_delays.insert(account, delay);
        });
    }

    pub fn fail_blockhash_on(&self, call: usize) {
        self.with_state(|s| {
            s.blockhash_failures.insert(call);
        });
    }

    /// Make the nth simulation report a program error
    pub fn fail_simulation_on(&self, call: usize) {
        self.with_state(|s| {
            s.simulation_failures.insert(call);
        });
    }

    /// Make the nth simulation call itself fail
    pub fn fail_simulation_call_on(&self, call: usize, err: LedgerError) {
        self.with_state(|s| {
            s.simulation_call_failures.insert(call, err);
        });
    }

    pub fn fail_send_on(&self, call: usize) {
        self.with_state(|s| {
            s.send_failures.insert(call);
        });
    }

    pub fn simulation_count(&self) -> usize {
        self.with_state(|s| s.simulation_calls)
    }

    pub fn submitted_count(&self) -> usize {
        self.with_state(|s| s.submitted.len())
    }

    pub fn submitted_transactions(&self) -> Vec<Transaction> {
        self.with_state(|s| s.submitted.clone())
    }

    pub fn remaining_accounts(&self) -> usize {
        self.with_state(|s| s.accounts.len())
    }

    pub fn amount_of(&self, account: &Pubkey) -> Option<u64> {
        self.with_state(|s| {
            s.accounts
                .iter()
                .find(|a| a.address == *account)
                .map(|a| a.amount)
        })
    }
}

/// Apply the token instructions of `tx` to `accounts`
fn apply_token_instructions(
    accounts: &mut Vec<MockAccount>,
    tx: &Transaction,
) -> Result<(), String> {
    let keys = &tx.message.account_keys;
    for (idx, ix) in tx.message.instructions.iter().enumerate() {
        let program = keys[usize::from(ix.program_id_index)];
        if program != token_program::program_id() {
            continue;
        }
        let target = keys[usize::from(ix.accounts[0])];
        let position = accounts
            .iter()
            .position(|a| a.address == target)
            .ok_or_else(|| format!("InstructionError({}, InvalidAccountData)", idx))?;

        match ix.data.first().copied() {
            Some(BURN_CHECKED_TAG) => {
                let mut amount_bytes = [0u8; 8];
                amount_bytes.copy_from_slice(&ix.data[1..9]);
                let amount = u64::from_le_bytes(amount_bytes);
                let account = &mut accounts[position];
                if account.native {
                    return Err(format!("InstructionError({}, Custom(10))", idx));
                }
                if account.amount < amount {
                    return Err(format!("InstructionError({}, Custom(1))", idx));
                }
                account.amount -= amount;
            }
            Some(CLOSE_ACCOUNT_TAG) => {
                let account = &accounts[position];
                if !account.native && account.amount != 0 {
                    // NonNativeHasBalance
                    return Err(format!("InstructionError({}, Custom(11))", idx));
                }
                accounts.remove(position);
            }
            other => return Err(format!("unexpected token instruction tag {:?}", other)),
        }
    }
    Ok(())
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn token_accounts_by_owner(
        &self,
        _owner: &Pubkey,
        program_id: &Pubkey,
    ) -> Result<Vec<RawTokenAccount>, LedgerError> {
        assert_eq!(*program_id, token_program::program_id());
        self.with_state(|s| {
            if let Some(err) = &s.discovery_error {
                return Err(err.clone());
            }
            Ok(s.accounts
                .iter()
                .map(|a| RawTokenAccount {
                    address: a.address,
                    lamports: TOKEN_ACCOUNT_RENT,
                    data: a.data(),
                })
                .collect())
        })
    }

    async fn token_account_balance(&self, account: &Pubkey) -> Result<TokenBalance, LedgerError> {
        let delay = self.with_state(|s| s.balance_delays.get(account).copied());
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.with_state(|s| {
            if s.failing_balances.contains(account) {
                return Err(LedgerError::RpcResponse {
                    message: "could not find account".to_string(),
                    code: Some(-32602),
                });
            }
            s.accounts
                .iter()
                .find(|a| a.address == *account)
                .map(MockAccount::balance)
                .ok_or_else(|| LedgerError::InvalidResponse(format!("unknown account {}", account)))
        })
    }

    async fn latest_blockhash(&self) -> Result<Hash, LedgerError> {
        self.with_state(|s| {
            s.blockhash_calls += 1;
            if s.blockhash_failures.contains(&s.blockhash_calls) {
                return Err(LedgerError::Transport {
                    endpoint: "mock".to_string(),
                    message: "connection reset by peer".to_string(),
                });
            }
            Ok(Hash::new_unique())
        })
    }

    async fn simulate_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<SimulationReport, LedgerError> {
        self.with_state(|s| {
            s.simulation_calls += 1;
            let call = s.simulation_calls;
            if let Some(err) = s.simulation_call_failures.get(&call) {
                return Err(err.clone());
            }
            if s.simulation_failures.contains(&call) {
                return Ok(SimulationReport {
                    err: Some("InstructionError(2, Custom(4))".to_string()),
                    logs: vec!["Program log: Error: owner does not match".to_string()],
                    units_consumed: Some(1_200),
                });
            }

            let mut scratch = s.accounts.clone();
            let err = apply_token_instructions(&mut scratch, transaction).err();
            Ok(SimulationReport {
                err,
                logs: Vec::new(),
                units_consumed: Some(3_000 * transaction.message.instructions.len() as u64),
            })
        })
    }

    async fn send_and_confirm_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<Signature, LedgerError> {
        self.with_state(|s| {
            s.send_calls += 1;
            if s.send_failures.contains(&s.send_calls) {
                return Err(LedgerError::Timeout {
                    operation: "sendAndConfirmTransaction",
                    timeout_ms: 60_000,
                });
            }

            let mut next = s.accounts.clone();
            apply_token_instructions(&mut next, transaction).map_err(LedgerError::Rejected)?;
            s.accounts = next;
            s.submitted.push(transaction.clone());
            Ok(transaction.signatures[0])
        })
    }
}
