// crates/accrue-distribution/src/period.rs
//
// Period ledger and current accumulator.
//
// A validator's history is a chain of immutable `ValidatorHistoricalRewards`
// snapshots, one per closed period, each holding the cumulative
// reward-per-token ratio. Entries are reference counted and deleted the
// moment their count reaches zero. Holders of a reference on period p:
//   - each delegator starting info with previous_period == p,
//   - the validator's current pointer, when p == current.period - 1 >= 1,
//   - each slash event recorded at p,
//   - for p == 0 only, the validator itself, for its whole lifetime.

use tracing::debug;

use accrue_core::{
    AccrueError, Dec, DecCoins, KvStore, StakingSource, TransferSink, ValidatorAccumulatedCommission,
    ValidatorAddress, ValidatorCurrentRewards, ValidatorHistoricalRewards, ValidatorInfo,
    ValidatorOutstandingRewards,
};

use crate::keeper::{Context, Keeper};
use crate::state::{
    ACCUMULATED_COMMISSION, CURRENT_REWARDS, HISTORICAL_REWARDS, OUTSTANDING_REWARDS,
};

impl<K: StakingSource, B: TransferSink> Keeper<K, B> {
    /// Create the zero-ratio period 0 entry and open period 1.
    pub(crate) fn initialize_validator<S: KvStore>(
        &self,
        ctx: &mut Context<'_, S>,
        val: &ValidatorAddress,
    ) -> Result<(), AccrueError> {
        if CURRENT_REWARDS.has(ctx.store, val)? {
            return Err(AccrueError::InternalConsistency(format!(
                "validator {} is already initialized",
                val
            )));
        }

        HISTORICAL_REWARDS.save(
            ctx.store,
            &(val.clone(), 0),
            &ValidatorHistoricalRewards {
                cumulative_reward_ratio: DecCoins::new(),
                reference_count: 1,
            },
        )?;
        CURRENT_REWARDS.save(
            ctx.store,
            val,
            &ValidatorCurrentRewards {
                period: 1,
                rewards: DecCoins::new(),
            },
        )?;
        ACCUMULATED_COMMISSION.save(ctx.store, val, &ValidatorAccumulatedCommission::default())?;
        OUTSTANDING_REWARDS.save(ctx.store, val, &ValidatorOutstandingRewards::default())?;

        debug!(validator = %val, "initialized validator");
        Ok(())
    }

    pub(crate) fn increment_reference_count<S: KvStore>(
        &self,
        store: &mut S,
        val: &ValidatorAddress,
        period: u64,
    ) -> Result<(), AccrueError> {
        let key = (val.clone(), period);
        let mut historical = HISTORICAL_REWARDS.load(store, &key)?;
        historical.reference_count = historical.reference_count.checked_add(1).ok_or_else(|| {
            AccrueError::InternalConsistency(format!(
                "reference count overflow at {} period {}",
                val, period
            ))
        })?;
        HISTORICAL_REWARDS.save(store, &key, &historical)
    }

    /// Release one reference; the entry is deleted when none remain.
    pub(crate) fn decrement_reference_count<S: KvStore>(
        &self,
        store: &mut S,
        val: &ValidatorAddress,
        period: u64,
    ) -> Result<(), AccrueError> {
        let key = (val.clone(), period);
        let mut historical = HISTORICAL_REWARDS.load(store, &key)?;
        if historical.reference_count == 0 {
            return Err(AccrueError::InternalConsistency(format!(
                "reference count underflow at {} period {}",
                val, period
            )));
        }
        historical.reference_count -= 1;
        if historical.reference_count == 0 {
            HISTORICAL_REWARDS.remove(store, &key)
        } else {
            HISTORICAL_REWARDS.save(store, &key, &historical)
        }
    }

    /// Cumulative ratio recorded for `period`.
    pub(crate) fn historical_ratio<S: KvStore>(
        &self,
        store: &S,
        val: &ValidatorAddress,
        period: u64,
    ) -> Result<DecCoins, AccrueError> {
        HISTORICAL_REWARDS
            .get(store, &(val.clone(), period))?
            .map(|h| h.cumulative_reward_ratio)
            .ok_or_else(|| {
                AccrueError::InternalConsistency(format!(
                    "missing historical rewards for {} period {}",
                    val, period
                ))
            })
    }

    /// Snapshot the accumulator into a new, unreferenced ledger entry and
    /// open the next period. Returns the period just closed.
    fn end_period<S: KvStore>(
        &self,
        ctx: &mut Context<'_, S>,
        val: &ValidatorInfo,
    ) -> Result<u64, AccrueError> {
        let addr = &val.operator;
        let current = CURRENT_REWARDS.load(ctx.store, addr)?;
        let period = current.period;

        let increment = if val.tokens == 0 {
            // No stake to attribute the accrual to: move it to the community pool.
            if !current.rewards.is_zero() {
                let mut outstanding = OUTSTANDING_REWARDS.load(ctx.store, addr)?;
                outstanding.rewards = outstanding.rewards.checked_sub(&current.rewards)?;
                OUTSTANDING_REWARDS.save(ctx.store, addr, &outstanding)?;
                self.fund_community_pool(ctx.store, &current.rewards)?;
            }
            DecCoins::new()
        } else {
            let tokens = Dec::from_int(val.tokens)?;
            current.rewards.quo_dec_truncate(tokens)?
        };

        let previous = period.checked_sub(1).ok_or_else(|| {
            AccrueError::InternalConsistency(format!("validator {} has current period 0", addr))
        })?;
        let ratio = self
            .historical_ratio(ctx.store, addr, previous)?
            .checked_add(&increment)?;
        HISTORICAL_REWARDS.save(
            ctx.store,
            &(addr.clone(), period),
            &ValidatorHistoricalRewards {
                cumulative_reward_ratio: ratio,
                reference_count: 0,
            },
        )?;

        // Period 0 keeps its lifetime reference.
        if previous > 0 {
            self.decrement_reference_count(ctx.store, addr, previous)?;
        }

        CURRENT_REWARDS.save(
            ctx.store,
            addr,
            &ValidatorCurrentRewards {
                period: period + 1,
                rewards: DecCoins::new(),
            },
        )?;

        Ok(period)
    }

    /// Close the current period and take the current pointer's reference on it.
    pub(crate) fn increment_period<S: KvStore>(
        &self,
        ctx: &mut Context<'_, S>,
        val: &ValidatorInfo,
    ) -> Result<u64, AccrueError> {
        let period = self.end_period(ctx, val)?;
        self.increment_reference_count(ctx.store, &val.operator, period)?;
        debug!(validator = %val.operator, period, "incremented validator period");
        Ok(period)
    }

    /// Close the validator's current period, returning its number.
    pub fn increment_validator_period<S: KvStore>(
        &mut self,
        ctx: &mut Context<'_, S>,
        val: &ValidatorAddress,
    ) -> Result<u64, AccrueError> {
        let info = self.validator_info(val)?;
        self.atomically(ctx, |k, c| k.increment_period(c, &info))
    }
}

#[cfg(test)]
mod tests {
    use accrue_core::DistributionParams;
    use accrue_store::MemoryStore;

    use super::*;
    use crate::mock::{MockBank, MockStaking};

    fn setup() -> (Keeper<MockStaking, MockBank>, MemoryStore, ValidatorInfo) {
        let info = ValidatorInfo {
            operator: ValidatorAddress::from("val"),
            tokens: 100,
            delegator_shares: Dec::from(100u64),
            commission_rate: Dec::zero(),
        };
        let mut staking = MockStaking::new();
        staking.insert_validator(info.clone());
        let keeper = Keeper::new(staking, MockBank::new(), DistributionParams::default()).unwrap();
        (keeper, MemoryStore::new(), info)
    }

    fn refcount(store: &MemoryStore, val: &ValidatorAddress, period: u64) -> Option<u16> {
        HISTORICAL_REWARDS
            .get(store, &(val.clone(), period))
            .unwrap()
            .map(|h| h.reference_count)
    }

    #[test]
    fn test_period_zero_is_pinned() {
        let (mut keeper, mut store, info) = setup();
        let mut ctx = Context::new(&mut store, 1);
        keeper
            .atomically(&mut ctx, |k, c| k.initialize_validator(c, &info.operator))
            .unwrap();

        assert_eq!(keeper.increment_validator_period(&mut ctx, &info.operator).unwrap(), 1);
        assert_eq!(keeper.increment_validator_period(&mut ctx, &info.operator).unwrap(), 2);

        assert_eq!(refcount(&store, &info.operator, 0), Some(1));
        // period 1 lost its current-pointer reference to period 2
        assert_eq!(refcount(&store, &info.operator, 1), None);
        assert_eq!(refcount(&store, &info.operator, 2), Some(1));
    }

    #[test]
    fn test_ratio_accumulates_truncated() {
        let (mut keeper, mut store, info) = setup();
        let mut ctx = Context::new(&mut store, 1);
        keeper
            .atomically(&mut ctx, |k, c| {
                k.initialize_validator(c, &info.operator)?;
                let mut current = CURRENT_REWARDS.load(c.store, &info.operator)?;
                current.rewards = DecCoins::single("stake", Dec::from(10u64))?;
                CURRENT_REWARDS.save(c.store, &info.operator, &current)?;
                let mut outstanding = OUTSTANDING_REWARDS.load(c.store, &info.operator)?;
                outstanding.rewards = current.rewards.clone();
                OUTSTANDING_REWARDS.save(c.store, &info.operator, &outstanding)
            })
            .unwrap();

        let period = keeper.increment_validator_period(&mut ctx, &info.operator).unwrap();
        let ratio = keeper.historical_ratio(&store, &info.operator, period).unwrap();
        assert_eq!(ratio.amount_of("stake"), Dec::percent(10));
    }

    #[test]
    fn test_zero_token_period_sends_accrual_to_community_pool() {
        let (mut keeper, mut store, mut info) = setup();
        info.tokens = 0;
        keeper.staking_mut().insert_validator(info.clone());
        let mut ctx = Context::new(&mut store, 1);
        let ten = DecCoins::single("stake", Dec::from(10u64)).unwrap();
        keeper
            .atomically(&mut ctx, |k, c| {
                k.initialize_validator(c, &info.operator)?;
                CURRENT_REWARDS.save(
                    c.store,
                    &info.operator,
                    &ValidatorCurrentRewards { period: 1, rewards: ten.clone() },
                )?;
                OUTSTANDING_REWARDS.save(
                    c.store,
                    &info.operator,
                    &ValidatorOutstandingRewards { rewards: ten.clone() },
                )
            })
            .unwrap();

        keeper.increment_validator_period(&mut ctx, &info.operator).unwrap();
        assert_eq!(keeper.load_fee_pool(&store).unwrap().community_pool, ten);
        assert!(OUTSTANDING_REWARDS.load(&store, &info.operator).unwrap().rewards.is_zero());
        assert!(keeper.historical_ratio(&store, &info.operator, 1).unwrap().is_zero());
    }

    #[test]
    fn test_decrement_below_zero_is_rejected() {
        let (keeper, mut store, info) = setup();
        HISTORICAL_REWARDS
            .save(&mut store, &(info.operator.clone(), 3), &ValidatorHistoricalRewards::default())
            .unwrap();
        let err = keeper.decrement_reference_count(&mut store, &info.operator, 3).unwrap_err();
        assert!(matches!(err, AccrueError::InternalConsistency(_)));
    }

    #[test]
    fn test_failed_increment_leaves_store_untouched() {
        let (mut keeper, mut store, info) = setup();
        // never initialized: the current rewards record is missing
        let mut ctx = Context::new(&mut store, 1);
        assert!(keeper.increment_validator_period(&mut ctx, &info.operator).is_err());
        assert!(store.is_empty());
    }
}
