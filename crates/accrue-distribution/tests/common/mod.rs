// Shared harness for the distribution integration tests.

#![allow(dead_code)]

use accrue_core::{
    AccountAddress, Coins, Dec, DecCoins, DistributionParams, KvStore, ValidatorAddress,
};
use accrue_distribution::mock::{self, MockBank, MockKeeper, MockStaking};
use accrue_distribution::{Context, InvariantReport, MODULE_NAME};
use accrue_store::MemoryStore;

pub const DENOM: &str = "stake";

/// A keeper plus the store and block height it runs against.
pub struct Harness<S: KvStore = MemoryStore> {
    pub keeper: MockKeeper,
    pub store: S,
    pub height: u64,
    pub allocated: u128,
}

impl Harness<MemoryStore> {
    pub fn new() -> Self {
        Self::with_store(MemoryStore::new(), DistributionParams::default())
    }

    pub fn with_params(params: DistributionParams) -> Self {
        Self::with_store(MemoryStore::new(), params)
    }
}

impl<S: KvStore> Harness<S> {
    pub fn with_store(store: S, params: DistributionParams) -> Self {
        let keeper = MockKeeper::new(MockStaking::new(), MockBank::new(), params).unwrap();
        Self {
            keeper,
            store,
            height: 1,
            allocated: 0,
        }
    }

    /// The keeper and a context at the current height.
    pub fn split(&mut self) -> (&mut MockKeeper, Context<'_, S>) {
        (&mut self.keeper, Context::new(&mut self.store, self.height))
    }

    pub fn next_block(&mut self) {
        self.height += 1;
    }

    pub fn create_validator(&mut self, val: &ValidatorAddress, rate: Dec, self_bond: u128) {
        let (keeper, mut ctx) = self.split();
        mock::create_validator(keeper, &mut ctx, val, rate, self_bond).unwrap();
    }

    pub fn delegate(&mut self, del: &AccountAddress, val: &ValidatorAddress, amount: u128) -> Dec {
        let (keeper, mut ctx) = self.split();
        mock::delegate(keeper, &mut ctx, del, val, amount).unwrap()
    }

    pub fn slash(&mut self, val: &ValidatorAddress, fraction: Dec) -> u128 {
        let (keeper, mut ctx) = self.split();
        mock::slash_validator(keeper, &mut ctx, val, fraction).unwrap()
    }

    /// Fund the module account with `amount` and allocate it to `val`.
    pub fn allocate(&mut self, val: &ValidatorAddress, amount: u128) {
        self.keeper
            .bank_mut()
            .fund_module(MODULE_NAME, &Coins::single(DENOM, amount))
            .unwrap();
        self.allocated += amount;
        let tokens = coins(amount);
        let (keeper, mut ctx) = self.split();
        keeper.allocate_tokens_to_validator(&mut ctx, val, &tokens).unwrap();
    }

    pub fn rewards(&mut self, del: &AccountAddress, val: &ValidatorAddress) -> DecCoins {
        let (keeper, ctx) = self.split();
        keeper.delegation_rewards(&ctx, del, val).unwrap()
    }

    pub fn withdraw(&mut self, del: &AccountAddress, val: &ValidatorAddress) -> Coins {
        let (keeper, mut ctx) = self.split();
        keeper.withdraw_delegation_rewards(&mut ctx, del, val).unwrap()
    }

    pub fn commission(&mut self, val: &ValidatorAddress) -> DecCoins {
        let (keeper, ctx) = self.split();
        keeper.validator_commission(&ctx, val).unwrap()
    }

    pub fn community_pool(&mut self) -> DecCoins {
        let (keeper, ctx) = self.split();
        keeper.fee_pool(&ctx).unwrap().community_pool
    }

    /// Reference counts of one validator's ledger entries, by period.
    pub fn refcounts(&mut self, val: &ValidatorAddress) -> Vec<(u64, u16)> {
        let (keeper, ctx) = self.split();
        keeper
            .validator_historical_rewards(&ctx, val)
            .unwrap()
            .into_iter()
            .map(|(period, entry)| (period, entry.reference_count))
            .collect()
    }

    pub fn invariants(&mut self) -> Vec<InvariantReport> {
        let (keeper, ctx) = self.split();
        keeper.all_invariants(&ctx).unwrap()
    }

    pub fn assert_invariants(&mut self) {
        for report in self.invariants() {
            assert!(!report.broken, "{} invariant broken: {}", report.name, report.message);
        }
    }

    pub fn export_json(&mut self) -> String {
        let (keeper, ctx) = self.split();
        serde_json::to_string(&keeper.export_genesis(&ctx).unwrap()).unwrap()
    }
}

pub fn val(name: &str) -> ValidatorAddress {
    ValidatorAddress::from(name)
}

pub fn acc(name: &str) -> AccountAddress {
    AccountAddress::from(name)
}

pub fn coins(amount: u128) -> DecCoins {
    DecCoins::single(DENOM, Dec::from_int(amount).unwrap()).unwrap()
}

pub fn dec(s: &str) -> Dec {
    s.parse().unwrap()
}
