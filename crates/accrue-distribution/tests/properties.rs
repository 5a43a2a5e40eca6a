// crates/accrue-distribution/tests/properties.rs
//
// Randomized operation sequences against the mock staking and bank
// collaborators. After every step all ledger invariants must hold, and
// the allocated total must be fully accounted for by paid balances,
// outstanding rewards, and the community pool.

mod common;

use accrue_core::{AccountAddress, Dec, StakingSource, ValidatorAddress};
use accrue_distribution::mock;
use proptest::prelude::*;

use common::{acc, val, Harness, DENOM};

#[derive(Debug, Clone)]
enum Op {
    Allocate { validator: usize, amount: u128 },
    Delegate { delegator: usize, validator: usize, amount: u128 },
    Undelegate { delegator: usize, validator: usize, percent: u32 },
    Slash { validator: usize, percent: u32 },
    Withdraw { delegator: usize, validator: usize },
    WithdrawCommission { validator: usize },
    NextBlock,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0usize..2, 1u128..5_000).prop_map(|(validator, amount)| Op::Allocate { validator, amount }),
        2 => (0usize..4, 0usize..2, 1u128..2_000)
            .prop_map(|(delegator, validator, amount)| Op::Delegate { delegator, validator, amount }),
        1 => (0usize..4, 0usize..2, 10u32..=100)
            .prop_map(|(delegator, validator, percent)| Op::Undelegate { delegator, validator, percent }),
        1 => (0usize..2, 1u32..=50).prop_map(|(validator, percent)| Op::Slash { validator, percent }),
        2 => (0usize..4, 0usize..2).prop_map(|(delegator, validator)| Op::Withdraw { delegator, validator }),
        1 => (0usize..2).prop_map(|validator| Op::WithdrawCommission { validator }),
        3 => Just(Op::NextBlock),
    ]
}

struct World {
    h: Harness,
    validators: Vec<ValidatorAddress>,
    /// Operators of both validators followed by two plain delegators.
    delegators: Vec<AccountAddress>,
}

impl World {
    fn new() -> Self {
        let validators = vec![val("val-a"), val("val-b")];
        let mut delegators: Vec<AccountAddress> =
            validators.iter().map(ValidatorAddress::operator_account).collect();
        delegators.push(acc("del-x"));
        delegators.push(acc("del-y"));

        let mut h = Harness::new();
        h.create_validator(&validators[0], Dec::percent(10), 1_000);
        h.create_validator(&validators[1], Dec::percent(50), 1_000);
        h.next_block();
        Self { h, validators, delegators }
    }

    fn apply(&mut self, op: &Op) {
        let result = match *op {
            Op::Allocate { validator, amount } => {
                self.h.allocate(&self.validators[validator], amount);
                Ok(())
            }
            Op::Delegate { delegator, validator, amount } => {
                let (keeper, mut ctx) = self.h.split();
                mock::delegate(
                    keeper,
                    &mut ctx,
                    &self.delegators[delegator],
                    &self.validators[validator],
                    amount,
                )
                .map(|_| ())
            }
            Op::Undelegate { delegator, validator, percent } => {
                let del = &self.delegators[delegator];
                let v = &self.validators[validator];
                let (keeper, mut ctx) = self.h.split();
                match keeper.staking().delegation(del, v).unwrap() {
                    Some(d) => {
                        let shares = d.shares.mul_truncate(Dec::percent(percent)).unwrap();
                        mock::undelegate(keeper, &mut ctx, del, v, shares).map(|_| ())
                    }
                    None => Ok(()),
                }
            }
            Op::Slash { validator, percent } => {
                let (keeper, mut ctx) = self.h.split();
                mock::slash_validator(keeper, &mut ctx, &self.validators[validator], Dec::percent(percent))
                    .map(|_| ())
            }
            Op::Withdraw { delegator, validator } => {
                let (keeper, mut ctx) = self.h.split();
                keeper
                    .withdraw_delegation_rewards(
                        &mut ctx,
                        &self.delegators[delegator],
                        &self.validators[validator],
                    )
                    .map(|_| ())
            }
            Op::WithdrawCommission { validator } => {
                let (keeper, mut ctx) = self.h.split();
                keeper
                    .withdraw_validator_commission(&mut ctx, &self.validators[validator])
                    .map(|_| ())
            }
            Op::NextBlock => {
                self.h.next_block();
                Ok(())
            }
        };
        if let Err(e) = result {
            assert!(!e.is_fatal(), "{:?} failed fatally: {}", op, e);
        }
    }

    /// Paid balances + outstanding rewards + community pool.
    fn accounted(&mut self) -> Dec {
        let mut total = self.h.community_pool().amount_of(DENOM);
        for del in &self.delegators {
            let paid = self.h.keeper.bank().balance(del).amount_of(DENOM);
            total = total.checked_add(Dec::from_int(paid).unwrap()).unwrap();
        }
        let (keeper, ctx) = self.h.split();
        for v in &self.validators {
            let outstanding = keeper.validator_outstanding_rewards(&ctx, v).unwrap();
            total = total.checked_add(outstanding.amount_of(DENOM)).unwrap();
        }
        total
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Ledger invariants survive any interleaving of operations.
    #[test]
    fn prop_invariants_hold(ops in prop::collection::vec(arb_op(), 1..40)) {
        let mut world = World::new();
        for op in &ops {
            world.apply(op);
            world.h.assert_invariants();
        }
    }

    /// Nothing allocated is created or destroyed.
    #[test]
    fn prop_allocated_tokens_are_conserved(ops in prop::collection::vec(arb_op(), 1..40)) {
        let mut world = World::new();
        for op in &ops {
            world.apply(op);
        }
        let allocated = Dec::from_int(world.h.allocated).unwrap();
        prop_assert_eq!(world.accounted(), allocated);
    }
}
