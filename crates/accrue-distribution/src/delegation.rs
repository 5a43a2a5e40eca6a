// crates/accrue-distribution/src/delegation.rs
//
// Delegator starting infos and the reward calculator.
//
// A delegation's un-withdrawn accrual runs from its starting period to an
// ending period. Rewards for a span are
//   (ratio[end] - ratio[start]) * stake        (truncated)
// and slash events inside the span cut it into sub-spans, each applying
// the stake left after the previous slash. Truncation keeps the sum of
// every delegator's rewards at or below what the validator accrued.

use tracing::warn;

use accrue_core::{
    AccountAddress, AccrueError, Dec, DecCoins, DelegationInfo, DelegatorStartingInfo, KvStore,
    StakingSource, TransferSink, ValidatorAddress, ValidatorInfo,
};

use crate::keeper::{Context, Keeper};
use crate::state::{CURRENT_REWARDS, STARTING_INFOS};

impl<K: StakingSource, B: TransferSink> Keeper<K, B> {
    /// (Re)start a delegation's accrual at the last closed period.
    pub(crate) fn initialize_delegation<S: KvStore>(
        &self,
        ctx: &mut Context<'_, S>,
        val: &ValidatorInfo,
        del: &DelegationInfo,
    ) -> Result<(), AccrueError> {
        let key = (val.operator.clone(), del.delegator.clone());
        if let Some(existing) = STARTING_INFOS.get(ctx.store, &key)? {
            self.decrement_reference_count(ctx.store, &val.operator, existing.previous_period)?;
        }

        let current = CURRENT_REWARDS.load(ctx.store, &val.operator)?;
        let previous_period = current.period.checked_sub(1).ok_or_else(|| {
            AccrueError::InternalConsistency(format!("validator {} has current period 0", val.operator))
        })?;
        self.increment_reference_count(ctx.store, &val.operator, previous_period)?;

        let stake = val.tokens_from_shares_truncated(del.shares)?;
        STARTING_INFOS.save(
            ctx.store,
            &key,
            &DelegatorStartingInfo {
                previous_period,
                stake,
                height: ctx.height,
            },
        )
    }

    pub(crate) fn starting_info<S: KvStore>(
        &self,
        store: &S,
        val: &ValidatorAddress,
        del: &AccountAddress,
    ) -> Result<DelegatorStartingInfo, AccrueError> {
        STARTING_INFOS
            .get(store, &(val.clone(), del.clone()))?
            .ok_or_else(|| AccrueError::NoDelegationExists(format!("{} -> {}", del, val)))
    }

    fn rewards_between<S: KvStore>(
        &self,
        store: &S,
        val: &ValidatorAddress,
        starting_period: u64,
        ending_period: u64,
        stake: Dec,
    ) -> Result<DecCoins, AccrueError> {
        if starting_period > ending_period {
            return Err(AccrueError::InternalConsistency(format!(
                "starting period {} is after ending period {}",
                starting_period, ending_period
            )));
        }
        if stake.is_negative() {
            return Err(AccrueError::InternalConsistency(format!(
                "negative stake {} for {}",
                stake, val
            )));
        }

        let starting = self.historical_ratio(store, val, starting_period)?;
        let ending = self.historical_ratio(store, val, ending_period)?;
        // checked_sub refuses a decreasing ratio
        let difference = ending.checked_sub(&starting)?;
        difference.mul_dec_truncate(stake)
    }

    /// Rewards owed to `del` for the span ending at `ending_period`.
    pub(crate) fn calculate_rewards<S: KvStore>(
        &self,
        ctx: &Context<'_, S>,
        val: &ValidatorInfo,
        del: &DelegationInfo,
        ending_period: u64,
    ) -> Result<DecCoins, AccrueError> {
        let addr = &val.operator;
        let info = self.starting_info(&*ctx.store, addr, &del.delegator)?;

        // Created in this block: nothing accrued yet.
        if info.height == ctx.height {
            return Ok(DecCoins::new());
        }

        let mut rewards = DecCoins::new();
        let mut starting_period = info.previous_period;
        let mut stake = info.stake;

        if ctx.height > info.height {
            for slash in self.slash_events_between(&*ctx.store, addr, info.height, ctx.height)? {
                let period = slash.event.validator_period;
                if period > starting_period && period <= ending_period {
                    let span = self.rewards_between(&*ctx.store, addr, starting_period, period, stake)?;
                    rewards = rewards.checked_add(&span)?;
                    stake = stake.mul_truncate(Dec::one().checked_sub(slash.event.fraction)?)?;
                    starting_period = period;
                }
            }
        }

        // Rounding during slashing can leave the computed stake a few units
        // above the live stake.
        let current_stake = val.tokens_from_shares(del.shares)?;
        if stake > current_stake {
            let margin = Dec::smallest().checked_mul(Dec::from(3u64))?;
            if stake <= current_stake.checked_add(margin)? {
                warn!(
                    validator = %addr,
                    delegator = %del.delegator,
                    computed = %stake,
                    current = %current_stake,
                    "stake exceeds current stake within margin of error"
                );
                stake = current_stake;
            } else {
                return Err(AccrueError::InternalConsistency(format!(
                    "calculated final stake for delegator {} ({}) exceeds current stake ({})",
                    del.delegator, stake, current_stake
                )));
            }
        }

        let tail = self.rewards_between(&*ctx.store, addr, starting_period, ending_period, stake)?;
        rewards.checked_add(&tail)
    }

    /// Rewards `delegator` has accrued with `validator` up to `ending_period`,
    /// which must be a closed period.
    pub fn calculate_delegation_rewards<S: KvStore>(
        &self,
        ctx: &Context<'_, S>,
        delegator: &AccountAddress,
        validator: &ValidatorAddress,
        ending_period: u64,
    ) -> Result<DecCoins, AccrueError> {
        let val = self.validator_info(validator)?;
        let del = self.delegation_info(delegator, validator)?;
        self.calculate_rewards(ctx, &val, &del, ending_period)
    }
}
