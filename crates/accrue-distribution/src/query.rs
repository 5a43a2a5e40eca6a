// crates/accrue-distribution/src/query.rs
//
// Read-only queries. Anything that needs a fresh period boundary runs in a
// cache that is thrown away afterwards.

use serde::{Deserialize, Serialize};

use accrue_core::{
    AccountAddress, AccrueError, DecCoins, DelegatorStartingInfo, FeePool, KvStore,
    StakingSource, TransferSink, ValidatorAddress, ValidatorHistoricalRewards, ValidatorSlashEvent,
};

use crate::keeper::{Context, Keeper};
use crate::state::{
    ACCUMULATED_COMMISSION, HISTORICAL_REWARDS, OUTSTANDING_REWARDS, STARTING_INFOS,
};

/// Pending rewards of one delegator with one validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationDelegatorReward {
    pub validator: ValidatorAddress,
    pub reward: DecCoins,
}

/// Pending rewards of one delegator across every validator it delegates to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationTotalRewards {
    pub rewards: Vec<DelegationDelegatorReward>,
    pub total: DecCoins,
}

impl<K: StakingSource, B: TransferSink> Keeper<K, B> {
    /// The community pool. Defaults to empty before genesis.
    pub fn fee_pool<S: KvStore>(&self, ctx: &Context<'_, S>) -> Result<FeePool, AccrueError> {
        self.load_fee_pool(&*ctx.store)
    }

    /// Commission accumulated and not yet withdrawn, including sub-unit dust.
    pub fn validator_commission<S: KvStore>(
        &self,
        ctx: &Context<'_, S>,
        val: &ValidatorAddress,
    ) -> Result<DecCoins, AccrueError> {
        Ok(ACCUMULATED_COMMISSION
            .get(&*ctx.store, val)?
            .unwrap_or_default()
            .commission)
    }

    /// Everything allocated to `val` and not yet paid out or swept.
    pub fn validator_outstanding_rewards<S: KvStore>(
        &self,
        ctx: &Context<'_, S>,
        val: &ValidatorAddress,
    ) -> Result<DecCoins, AccrueError> {
        Ok(OUTSTANDING_REWARDS
            .get(&*ctx.store, val)?
            .unwrap_or_default()
            .rewards)
    }

    /// Slash events recorded between two heights, inclusive.
    pub fn validator_slashes<S: KvStore>(
        &self,
        ctx: &Context<'_, S>,
        val: &ValidatorAddress,
        start_height: u64,
        end_height: u64,
    ) -> Result<Vec<ValidatorSlashEvent>, AccrueError> {
        if start_height > end_height {
            return Err(AccrueError::InvalidAmount(format!(
                "start height {} exceeds end height {}",
                start_height, end_height
            )));
        }
        Ok(self
            .slash_events_between(&*ctx.store, val, start_height, end_height)?
            .into_iter()
            .map(|slash| slash.event)
            .collect())
    }

    /// Where `del`'s current accrual span on `val` began, if it has one.
    pub fn delegator_starting_info<S: KvStore>(
        &self,
        ctx: &Context<'_, S>,
        val: &ValidatorAddress,
        del: &AccountAddress,
    ) -> Result<Option<DelegatorStartingInfo>, AccrueError> {
        STARTING_INFOS.get(&*ctx.store, &(val.clone(), del.clone()))
    }

    /// Ledger entries of one validator, ordered by period.
    pub fn validator_historical_rewards<S: KvStore>(
        &self,
        ctx: &Context<'_, S>,
        val: &ValidatorAddress,
    ) -> Result<Vec<(u64, ValidatorHistoricalRewards)>, AccrueError> {
        Ok(HISTORICAL_REWARDS
            .prefix(&*ctx.store, val)?
            .into_iter()
            .map(|((_, period), entry)| (period, entry))
            .collect())
    }

    /// Sum of every ledger entry's reference count, across all validators.
    pub fn historical_reference_count<S: KvStore>(
        &self,
        ctx: &Context<'_, S>,
    ) -> Result<u64, AccrueError> {
        Ok(HISTORICAL_REWARDS
            .all(&*ctx.store)?
            .iter()
            .map(|(_, entry)| u64::from(entry.reference_count))
            .sum())
    }

    /// Rewards `del` would receive if it withdrew from `val` now.
    pub fn delegation_rewards<S: KvStore>(
        &self,
        ctx: &Context<'_, S>,
        del: &AccountAddress,
        val: &ValidatorAddress,
    ) -> Result<DecCoins, AccrueError> {
        let info = self.validator_info(val)?;
        let delegation = self.delegation_info(del, val)?;
        self.discarded(ctx, |k, c| {
            let ending_period = k.increment_period(c, &info)?;
            k.calculate_rewards(&*c, &info, &delegation, ending_period)
        })
    }

    pub fn delegation_total_rewards<S: KvStore>(
        &self,
        ctx: &Context<'_, S>,
        del: &AccountAddress,
    ) -> Result<DelegationTotalRewards, AccrueError> {
        let mut total = DelegationTotalRewards::default();
        for delegation in self.staking().delegator_delegations(del)? {
            let reward = self.delegation_rewards(ctx, del, &delegation.validator)?;
            total.total = total.total.checked_add(&reward)?;
            total.rewards.push(DelegationDelegatorReward {
                validator: delegation.validator,
                reward,
            });
        }
        Ok(total)
    }

    pub fn delegator_validators(
        &self,
        del: &AccountAddress,
    ) -> Result<Vec<ValidatorAddress>, AccrueError> {
        Ok(self
            .staking()
            .delegator_delegations(del)?
            .into_iter()
            .map(|d| d.validator)
            .collect())
    }

    pub fn delegator_withdraw_address<S: KvStore>(
        &self,
        ctx: &Context<'_, S>,
        del: &AccountAddress,
    ) -> Result<AccountAddress, AccrueError> {
        self.withdraw_address_of(&*ctx.store, del)
    }
}
