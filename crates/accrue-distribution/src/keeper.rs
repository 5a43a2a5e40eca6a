// crates/accrue-distribution/src/keeper.rs
//
// The distribution keeper: owns the collaborators and parameters, and
// provides the transaction plumbing every mutating operation runs through.
//
// Each public mutating operation executes against a `CacheStore` layered
// over the caller's store. The buffered writes are committed as one batch
// only after every step, the bank transfer included, has succeeded; on any
// error the cache is dropped and the caller's store is left untouched.

use accrue_core::{
    AccountAddress, AccrueError, Coins, DecCoins, DelegationInfo, DistributionParams, FeePool,
    KvStore, StakingSource, TransferSink, ValidatorAddress, ValidatorInfo,
};
use accrue_store::CacheStore;

use crate::state::{FEE_POOL, WITHDRAW_ADDRS};

/// Module account holding every undistributed reward and the community pool.
pub const MODULE_NAME: &str = "distribution";

/// Per-operation execution context: the store to act on and the current
/// block height.
pub struct Context<'a, S: KvStore> {
    pub store: &'a mut S,
    pub height: u64,
}

impl<'a, S: KvStore> Context<'a, S> {
    pub fn new(store: &'a mut S, height: u64) -> Self {
        Self { store, height }
    }
}

/// Coins owed to an account, produced by ledger-only withdrawal steps and
/// paid out by the enclosing operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payout {
    pub recipient: AccountAddress,
    pub coins: Coins,
}

pub struct Keeper<K, B> {
    staking: K,
    bank: B,
    params: DistributionParams,
}

impl<K: StakingSource, B: TransferSink> Keeper<K, B> {
    /// Build a keeper over the given staking view and transfer sink.
    ///
    /// Fails with `InvalidAmount` if `params` carries a community tax
    /// outside [0, 1].
    pub fn new(staking: K, bank: B, params: DistributionParams) -> Result<Self, AccrueError> {
        params.validate()?;
        Ok(Self {
            staking,
            bank,
            params,
        })
    }

    /// Parameters in force, as validated at construction or genesis import.
    pub fn params(&self) -> &DistributionParams {
        &self.params
    }

    pub(crate) fn set_params(&mut self, params: DistributionParams) -> Result<(), AccrueError> {
        params.validate()?;
        self.params = params;
        Ok(())
    }

    /// The read-only stake source the keeper resolves validators and
    /// delegations through.
    pub fn staking(&self) -> &K {
        &self.staking
    }

    /// Mutable access for the host that owns staking state.
    pub fn staking_mut(&mut self) -> &mut K {
        &mut self.staking
    }

    /// The transfer sink payouts are sent through.
    pub fn bank(&self) -> &B {
        &self.bank
    }

    pub fn bank_mut(&mut self) -> &mut B {
        &mut self.bank
    }

    /// Run `f` against a write-buffering cache and commit its writes only if
    /// it succeeds.
    pub(crate) fn atomically<S, T, F>(&mut self, ctx: &mut Context<'_, S>, f: F) -> Result<T, AccrueError>
    where
        S: KvStore,
        F: FnOnce(&mut Self, &mut Context<'_, CacheStore<'_, S>>) -> Result<T, AccrueError>,
    {
        let height = ctx.height;
        let (out, batch) = {
            let mut cache = CacheStore::new(&*ctx.store);
            let out = {
                let mut inner = Context::new(&mut cache, height);
                f(self, &mut inner)?
            };
            (out, cache.into_batch())
        };
        ctx.store.write_batch(batch)?;
        Ok(out)
    }

    /// Run `f` against a cache that is always discarded.
    pub(crate) fn discarded<S, T, F>(&self, ctx: &Context<'_, S>, f: F) -> Result<T, AccrueError>
    where
        S: KvStore,
        F: FnOnce(&Self, &mut Context<'_, CacheStore<'_, S>>) -> Result<T, AccrueError>,
    {
        let mut cache = CacheStore::new(&*ctx.store);
        let mut inner = Context::new(&mut cache, ctx.height);
        f(self, &mut inner)
    }

    pub(crate) fn validator_info(&self, addr: &ValidatorAddress) -> Result<ValidatorInfo, AccrueError> {
        self.staking
            .validator(addr)?
            .ok_or_else(|| AccrueError::NoValidatorExists(addr.to_string()))
    }

    pub(crate) fn delegation_info(
        &self,
        delegator: &AccountAddress,
        validator: &ValidatorAddress,
    ) -> Result<DelegationInfo, AccrueError> {
        self.staking.delegation(delegator, validator)?.ok_or_else(|| {
            AccrueError::NoDelegationExists(format!("{} -> {}", delegator, validator))
        })
    }

    /// Hand a payout to the bank. Empty payouts never reach it.
    pub(crate) fn pay(&mut self, payout: &Payout) -> Result<(), AccrueError> {
        if payout.coins.is_zero() {
            return Ok(());
        }
        self.bank
            .send_coins_from_module_to_account(MODULE_NAME, &payout.recipient, &payout.coins)
    }

    pub(crate) fn load_fee_pool<S: KvStore>(&self, store: &S) -> Result<FeePool, AccrueError> {
        Ok(FEE_POOL.get(store)?.unwrap_or_default())
    }

    pub(crate) fn fund_community_pool<S: KvStore>(
        &self,
        store: &mut S,
        amount: &DecCoins,
    ) -> Result<(), AccrueError> {
        if amount.is_zero() {
            return Ok(());
        }
        let mut pool = self.load_fee_pool(store)?;
        pool.community_pool = pool.community_pool.checked_add(amount)?;
        FEE_POOL.save(store, &pool)
    }

    /// The account that receives `account`'s rewards; the account itself
    /// unless overridden.
    pub(crate) fn withdraw_address_of<S: KvStore>(
        &self,
        store: &S,
        account: &AccountAddress,
    ) -> Result<AccountAddress, AccrueError> {
        Ok(WITHDRAW_ADDRS.get(store, account)?.unwrap_or_else(|| account.clone()))
    }
}
