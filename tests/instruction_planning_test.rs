//! Property tests for per-account instruction planning
//!
//! Whatever the balance, protection and native flags:
//! - every account gets exactly one close, and it comes last
//! - a burn is planned only for a known positive balance of an
//!   unprotected, non-native mint, and burns the full amount

use proptest::prelude::*;
use solana_sdk::pubkey::Pubkey;

use token_reclaim::ledger::TokenBalance;
use token_reclaim::reclaim::instructions::plan_account_instructions;
use token_reclaim::reclaim::{InstructionKind, TokenAccountRecord};

fn ui_amounts() -> impl Strategy<Value = Option<f64>> {
    prop::option::of(prop_oneof![
        Just(0.0),
        Just(f64::MIN_POSITIVE),
        0.0f64..1e12,
    ])
}

fn base_units(ui_amount: Option<f64>) -> u64 {
    match ui_amount {
        Some(ui) if ui > 0.0 => ((ui * 1e6) as u64).max(1),
        _ => 0,
    }
}

proptest! {
    #[test]
    fn one_close_last_and_burn_only_when_eligible(
        balance_known in any::<bool>(),
        ui_amount in ui_amounts(),
        protected in any::<bool>(),
        is_native in any::<bool>(),
    ) {
        let owner = Pubkey::new_unique();
        let amount = base_units(ui_amount);
        let record = TokenAccountRecord {
            address: Pubkey::new_unique(),
            mint: Pubkey::new_unique(),
            lamports: 2_039_280,
            balance: balance_known.then(|| TokenBalance {
                amount,
                decimals: 6,
                ui_amount,
            }),
            protected,
            is_native,
        };

        let group = plan_account_instructions(&record, &owner).unwrap();
        let kinds: Vec<&InstructionKind> = group.iter().map(|r| &r.kind).collect();

        let closes = kinds.iter().filter(|k| matches!(k, InstructionKind::Close)).count();
        prop_assert_eq!(closes, 1);
        prop_assert!(matches!(kinds.last(), Some(InstructionKind::Close)));
        prop_assert!(group.iter().all(|r| r.account == record.address));

        let eligible = balance_known
            && matches!(ui_amount, Some(ui) if ui > 0.0)
            && !protected
            && !is_native;
        prop_assert_eq!(group.burn.is_some(), eligible);
        prop_assert_eq!(group.instruction_count(), if eligible { 2 } else { 1 });

        if let Some(burn) = &group.burn {
            match &burn.kind {
                InstructionKind::Burn { mint, amount: burned, decimals } => {
                    prop_assert_eq!(*mint, record.mint);
                    prop_assert_eq!(*burned, amount);
                    prop_assert_eq!(*decimals, 6);
                }
                InstructionKind::Close => prop_assert!(false, "burn slot holds a close"),
            }
        }
    }

    #[test]
    fn protected_mint_never_burned(ui in 0.0f64..1e12, is_native in any::<bool>()) {
        let owner = Pubkey::new_unique();
        let record = TokenAccountRecord {
            address: Pubkey::new_unique(),
            mint: Pubkey::new_unique(),
            lamports: 2_039_280,
            balance: Some(TokenBalance {
                amount: base_units(Some(ui)),
                decimals: 6,
                ui_amount: Some(ui),
            }),
            protected: true,
            is_native,
        };

        let group = plan_account_instructions(&record, &owner).unwrap();
        prop_assert!(group.burn.is_none());
        prop_assert!(group.close.is_close());
    }
}
