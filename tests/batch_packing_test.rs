//! Property tests for batch packing
//!
//! For arbitrary wallets and instruction limits:
//! - no batch exceeds the limit
//! - concatenating batches reproduces the planned sequence
//! - a burn and the close of the same account always share a batch

use proptest::prelude::*;
use solana_sdk::pubkey::Pubkey;

use token_reclaim::ledger::TokenBalance;
use token_reclaim::reclaim::instructions::{flatten, plan_instructions};
use token_reclaim::reclaim::{pack_batches, BatchLimits, TokenAccountRecord};

fn record(amount: Option<u64>) -> TokenAccountRecord {
    TokenAccountRecord {
        address: Pubkey::new_unique(),
        mint: Pubkey::new_unique(),
        lamports: 2_039_280,
        balance: amount.map(|amount| TokenBalance {
            amount,
            decimals: 0,
            ui_amount: Some(amount as f64),
        }),
        protected: false,
        is_native: false,
    }
}

proptest! {
    #[test]
    fn packing_respects_limit_and_pairs(
        balances in prop::collection::vec(prop::option::weighted(0.9, 0u64..3), 0..80),
        max in 2usize..40,
    ) {
        let owner = Pubkey::new_unique();
        let records: Vec<TokenAccountRecord> = balances.into_iter().map(record).collect();
        let groups = plan_instructions(&records, &owner).unwrap();
        let expected: Vec<_> = flatten(&groups)
            .into_iter()
            .map(|r| (r.account, r.is_burn()))
            .collect();

        let limits = BatchLimits::new(max, 1, 200_000).unwrap();
        let batches: Vec<_> = pack_batches(groups, limits).collect();

        let mut packed = Vec::new();
        for (i, batch) in batches.iter().enumerate() {
            prop_assert_eq!(batch.index, i + 1);
            prop_assert!(batch.instruction_count() >= 1);
            prop_assert!(batch.instruction_count() <= max);

            // Burn never ends a batch: its close must follow in the same one
            let last = batch.records.last().unwrap();
            prop_assert!(last.is_close());
            for pair in batch.records.windows(2) {
                if pair[0].is_burn() {
                    prop_assert!(pair[1].is_close());
                    prop_assert_eq!(pair[0].account, pair[1].account);
                }
            }
            packed.extend(batch.records.iter().map(|r| (r.account, r.is_burn())));
        }
        prop_assert_eq!(packed, expected);
    }

    #[test]
    fn packing_is_greedy(pairs in 0usize..60, max in 2usize..30) {
        let owner = Pubkey::new_unique();
        let records: Vec<_> = (0..pairs).map(|_| record(Some(1))).collect();
        let groups = plan_instructions(&records, &owner).unwrap();

        let limits = BatchLimits::new(max, 1, 200_000).unwrap();
        let batches: Vec<_> = pack_batches(groups, limits).collect();

        let per_batch = max / 2;
        let expected_batches = pairs.div_ceil(per_batch);
        prop_assert_eq!(batches.len(), expected_batches);
        for batch in batches.iter().take(batches.len().saturating_sub(1)) {
            prop_assert_eq!(batch.instruction_count(), per_batch * 2);
        }
    }
}

#[test]
fn empty_sequence_yields_no_batches() {
    let batches: Vec<_> = pack_batches(Vec::new(), BatchLimits::default()).collect();
    assert!(batches.is_empty());
}
