//! Property-based tests over random operation sequences.
//!
//! Whatever mix of operations runs - and whether each succeeds or is
//! rejected - every wallet must keep `balance >= frozen >= 0`, and its
//! balance must equal lifetime income minus lifetime expense.

use std::sync::Arc;

use proptest::prelude::*;
use rust_decimal::Decimal;

use crate::core::{LedgerEngine, LedgerPolicy, MemoryLedgerStore};
use crate::types::{Currency, Money, UserId};

/// One randomly chosen operation, amount in minor units.
#[derive(Debug, Clone)]
enum Op {
    Deposit(i64),
    Withdraw(i64),
    Freeze(i64),
    Unfreeze(i64),
    Transfer(i64),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    // Up to 200.00 CNY keeps everything below the password threshold.
    let minor = 1i64..20_000;
    prop_oneof![
        minor.clone().prop_map(Op::Deposit),
        minor.clone().prop_map(Op::Withdraw),
        minor.clone().prop_map(Op::Freeze),
        minor.clone().prop_map(Op::Unfreeze),
        minor.prop_map(Op::Transfer),
    ]
}

fn cny(minor: i64) -> Money {
    Money::from_minor_units(minor, Currency::Cny)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_wallet_invariants_hold(
        ops in proptest::collection::vec(op_strategy(), 1..60),
    ) {
        let store = Arc::new(MemoryLedgerStore::new());
        let engine = LedgerEngine::new(store, LedgerPolicy::default());
        let alice = UserId::new();
        let bob = UserId::new();

        for op in &ops {
            // Rejections (insufficient funds, frozen shortfall, ...) are
            // legitimate outcomes; the invariants must hold either way.
            let _ = match *op {
                Op::Deposit(minor) => {
                    engine.deposit(alice, Currency::Cny, cny(minor), None)
                }
                Op::Withdraw(minor) => {
                    engine.withdraw(alice, Currency::Cny, cny(minor), None, None)
                }
                Op::Freeze(minor) => {
                    engine.freeze(alice, Currency::Cny, cny(minor), None)
                }
                Op::Unfreeze(minor) => {
                    engine.unfreeze(alice, Currency::Cny, cny(minor), None)
                }
                Op::Transfer(minor) => engine.transfer(
                    alice,
                    Currency::Cny,
                    bob,
                    Currency::Cny,
                    cny(minor),
                    None,
                    None,
                ),
            };

            for user in [alice, bob] {
                let wallet = engine.get_wallet(user, Currency::Cny);
                prop_assert!(wallet.frozen().amount() >= Decimal::ZERO);
                prop_assert!(wallet.balance().amount() >= wallet.frozen().amount());
                prop_assert!(wallet.available().amount() >= Decimal::ZERO);
                prop_assert_eq!(
                    wallet.balance().amount(),
                    wallet.total_income().amount() - wallet.total_expense().amount(),
                );
            }
        }
    }

    #[test]
    fn prop_transfers_conserve_total_balance(
        seed_minor in 1_000i64..100_000,
        transfers in proptest::collection::vec(1i64..2_000, 1..20),
    ) {
        let store = Arc::new(MemoryLedgerStore::new());
        let engine = LedgerEngine::new(store, LedgerPolicy::default());
        let alice = UserId::new();
        let bob = UserId::new();

        engine
            .deposit(alice, Currency::Cny, cny(seed_minor), None)
            .unwrap();

        for (index, minor) in transfers.iter().enumerate() {
            // Alternate directions to exercise both lock orders.
            let (from, to) = if index % 2 == 0 { (alice, bob) } else { (bob, alice) };
            let _ = engine.transfer(
                from,
                Currency::Cny,
                to,
                Currency::Cny,
                cny(*minor),
                None,
                None,
            );

            let total = engine.get_wallet(alice, Currency::Cny).balance().amount()
                + engine.get_wallet(bob, Currency::Cny).balance().amount();
            prop_assert_eq!(total, Decimal::new(seed_minor, 2));
        }
    }
}
