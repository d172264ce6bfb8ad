//! Property-based checks on the engine's money and depth invariants.

use proptest::prelude::*;

use reftree::commission::{CommissionEngine, CommissionPlan};
use reftree::config::TierDepths;
use reftree::graph::{ReferralStore, TreeWalker, MAX_REFERRAL_DEPTH};
use reftree::types::{KycStatus, Member, Package, PackageTier};
use reftree::wallet::Wallet;

fn store_with_chain(len: usize, price_cents: i64) -> ReferralStore {
    let store = ReferralStore::in_memory().unwrap();
    store
        .upsert_package(&Package {
            id: "super".to_string(),
            name: "super pack".to_string(),
            tier: PackageTier::Super,
            price_cents,
            active: true,
        })
        .unwrap();
    let ids: Vec<String> = (0..len).map(|i| format!("m{i:03}")).collect();
    for id in &ids {
        store
            .upsert_member(&Member {
                id: id.clone(),
                name: id.clone(),
                email: None,
                joined_at: 1,
                kyc_status: KycStatus::Approved,
            })
            .unwrap();
        store.record_purchase(id, "super", 1).unwrap();
    }
    for i in 1..len {
        store.set_sponsor(&ids[i], &ids[i - 1]).unwrap();
    }
    store
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// The sum distributed for a purchase never exceeds its price, for
    /// any schedule totaling at most 100%.
    #[test]
    fn distribution_never_exceeds_price(
        price in 1i64..1_000_000,
        rates in proptest::collection::vec(0u32..500, 1..30),
    ) {
        prop_assume!(rates.iter().map(|&r| r as u64).sum::<u64>() <= 10_000);
        let chain_len = rates.len() + 1;
        let store = store_with_chain(chain_len, price);
        let buyer = format!("m{:03}", chain_len - 1);

        let plan = CommissionPlan::new(rates);
        let engine = CommissionEngine::new(&store, plan, TierDepths::default()).unwrap();
        let purchase = store.record_purchase(&buyer, "super", 2).unwrap();
        let outcome = engine.distribute(&purchase, 2).unwrap();

        prop_assert!(outcome.total_cents <= purchase.price_cents);
        prop_assert_eq!(
            outcome.total_cents,
            outcome.commissions.iter().map(|c| c.amount_cents).sum::<i64>()
        );
        for commission in &outcome.commissions {
            prop_assert!(commission.amount_cents >= 0);
        }
    }

    /// Each per-level amount is the floor share of the price.
    #[test]
    fn per_level_amounts_are_floor_shares(
        price in 1i64..1_000_000,
        rate in 1u32..2_000,
    ) {
        let store = store_with_chain(2, price);
        let plan = CommissionPlan::new(vec![rate]);
        let engine = CommissionEngine::new(&store, plan, TierDepths::default()).unwrap();
        let purchase = store.record_purchase("m001", "super", 2).unwrap();
        let outcome = engine.distribute(&purchase, 2).unwrap();

        let expected = price * rate as i64 / 10_000;
        if expected > 0 {
            prop_assert_eq!(outcome.commissions[0].amount_cents, expected);
        } else {
            prop_assert!(outcome.commissions.is_empty());
        }
    }

    /// Traversal depth never exceeds the requested bound or the hard cap.
    #[test]
    fn traversal_respects_depth_bound(
        chain_len in 1usize..140,
        max_depth in 0u32..200,
    ) {
        let store = store_with_chain(chain_len, 1_000);
        let walker = TreeWalker::new(&store);

        let downline = walker.find_downline("m000", max_depth).unwrap();
        let bound = max_depth.min(MAX_REFERRAL_DEPTH);
        prop_assert!(downline.len() <= bound as usize);
        for entry in &downline {
            prop_assert!(entry.depth <= bound);
        }

        let buyer = format!("m{:03}", chain_len - 1);
        let upline = walker.find_upline(&buyer, max_depth).unwrap();
        prop_assert!(upline.len() <= bound as usize);
    }

    /// Wallet balance equals credits minus approved-payout debits and
    /// never goes negative through the payout path.
    #[test]
    fn payout_path_keeps_balance_non_negative(
        credit in 1i64..1_000_000,
        gross in 1i64..2_000_000,
        tds_bps in 0u32..10_000,
    ) {
        let store = store_with_chain(1, 1_000);
        store
            .conn
            .execute(
                "INSERT INTO wallet_ledger (member_id, kind, amount_cents, created_at)
                 VALUES ('m000', 'commission_credit', ?1, 1)",
                rusqlite::params![credit],
            )
            .unwrap();

        let wallet = Wallet::new(&store, tds_bps);
        match wallet.request_payout("m000", gross, 2) {
            Ok(request) => {
                prop_assert!(gross <= credit);
                prop_assert_eq!(request.tds_cents + request.net_cents, request.gross_cents);
                wallet.settle_payout(request.id, true, 3).unwrap();
                prop_assert!(wallet.balance("m000").unwrap() >= 0);
                prop_assert_eq!(wallet.balance("m000").unwrap(), credit - gross);
            }
            Err(_) => prop_assert!(gross > credit),
        }
    }
}
