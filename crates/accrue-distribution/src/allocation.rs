// crates/accrue-distribution/src/allocation.rs
//
// Reward allocation into the current accumulator.
//
// Per validator, an allocation of `tokens` splits into
//   commission = tokens * rate          (half-to-even)
//   shared     = tokens - commission    (into the open period)
// and the validator's outstanding rewards grow by the full `tokens`.
// Block-level allocation first diverts the community tax, then hands each
// voting validator its power-weighted share; truncation dust and the tax go
// to the community pool.

use serde::{Deserialize, Serialize};
use tracing::debug;

use accrue_core::{
    AccrueError, Coins, Dec, DecCoins, KvStore, StakingSource, TransferSink, ValidatorAddress,
    ValidatorInfo,
};

use crate::keeper::{Context, Keeper};
use crate::state::{ACCUMULATED_COMMISSION, CURRENT_REWARDS, OUTSTANDING_REWARDS};

/// A validator's voting power in the block being rewarded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteInfo {
    pub validator: ValidatorAddress,
    pub power: u64,
}

fn check_commission_rate(val: &ValidatorInfo) -> Result<(), AccrueError> {
    let rate = val.commission_rate;
    if rate.is_negative() || rate > Dec::one() {
        return Err(AccrueError::InvalidAmount(format!(
            "commission rate {} of {} must lie in [0, 1]",
            rate, val.operator
        )));
    }
    Ok(())
}

impl<K: StakingSource, B: TransferSink> Keeper<K, B> {
    pub(crate) fn allocate_to_validator<S: KvStore>(
        &self,
        ctx: &mut Context<'_, S>,
        val: &ValidatorInfo,
        tokens: &DecCoins,
    ) -> Result<(), AccrueError> {
        if tokens.is_zero() {
            return Ok(());
        }
        let addr = &val.operator;

        if val.tokens == 0 {
            debug!(validator = %addr, amount = %tokens, "validator has no stake; allocation sent to community pool");
            return self.fund_community_pool(ctx.store, tokens);
        }

        let commission = tokens.mul_dec(val.commission_rate)?;
        let shared = tokens.checked_sub(&commission)?;

        let mut accumulated = ACCUMULATED_COMMISSION.load(ctx.store, addr)?;
        accumulated.commission = accumulated.commission.checked_add(&commission)?;
        ACCUMULATED_COMMISSION.save(ctx.store, addr, &accumulated)?;

        let mut current = CURRENT_REWARDS.load(ctx.store, addr)?;
        current.rewards = current.rewards.checked_add(&shared)?;
        CURRENT_REWARDS.save(ctx.store, addr, &current)?;

        let mut outstanding = OUTSTANDING_REWARDS.load(ctx.store, addr)?;
        outstanding.rewards = outstanding.rewards.checked_add(tokens)?;
        OUTSTANDING_REWARDS.save(ctx.store, addr, &outstanding)?;

        debug!(
            validator = %addr,
            period = current.period,
            amount = %tokens,
            commission = %commission,
            "allocated tokens to validator"
        );
        Ok(())
    }

    /// Credit `tokens` to a validator's current period and commission.
    pub fn allocate_tokens_to_validator<S: KvStore>(
        &mut self,
        ctx: &mut Context<'_, S>,
        val: &ValidatorAddress,
        tokens: &DecCoins,
    ) -> Result<(), AccrueError> {
        let info = self.validator_info(val)?;
        check_commission_rate(&info)?;
        self.atomically(ctx, |k, c| k.allocate_to_validator(c, &info, tokens))
    }

    /// Distribute a block's collected `fees` across the validators that voted
    /// on it, in vote order. The fees must already sit in the module account.
    pub fn allocate_tokens<S: KvStore>(
        &mut self,
        ctx: &mut Context<'_, S>,
        total_power: u64,
        votes: &[VoteInfo],
        fees: &Coins,
    ) -> Result<(), AccrueError> {
        let collected = fees.to_dec_coins()?;

        if total_power == 0 {
            return self.atomically(ctx, |k, c| k.fund_community_pool(c.store, &collected));
        }

        let mut infos = Vec::with_capacity(votes.len());
        let mut voted: u64 = 0;
        for vote in votes {
            voted = voted
                .checked_add(vote.power)
                .filter(|sum| *sum <= total_power)
                .ok_or_else(|| {
                    AccrueError::InvalidAmount(format!(
                        "vote powers exceed total power {}",
                        total_power
                    ))
                })?;
            let info = self.validator_info(&vote.validator)?;
            check_commission_rate(&info)?;
            infos.push((info, vote.power));
        }

        let total = Dec::from(total_power);
        let vote_multiplier = Dec::one().checked_sub(self.params().community_tax)?;
        let fee_multiplier = collected.mul_dec_truncate(vote_multiplier)?;

        self.atomically(ctx, |k, c| {
            let mut remaining = collected.clone();
            for (info, power) in &infos {
                let fraction = Dec::from(*power).quo_truncate(total)?;
                let reward = fee_multiplier.mul_dec_truncate(fraction)?;
                k.allocate_to_validator(c, info, &reward)?;
                remaining = remaining.checked_sub(&reward)?;
            }
            debug!(total_power, votes = infos.len(), community = %remaining, "allocated block fees");
            k.fund_community_pool(c.store, &remaining)
        })
    }
}

#[cfg(test)]
mod tests {
    use accrue_core::DistributionParams;
    use accrue_store::MemoryStore;

    use super::*;
    use crate::mock::{self, MockKeeper};

    fn keeper(tax: Dec) -> MockKeeper {
        let params = DistributionParams {
            community_tax: tax,
            ..Default::default()
        };
        MockKeeper::new(Default::default(), Default::default(), params).unwrap()
    }

    fn stake(amount: u64) -> DecCoins {
        DecCoins::single("stake", Dec::from(amount)).unwrap()
    }

    #[test]
    fn test_commission_split() {
        let mut keeper = keeper(Dec::zero());
        let mut store = MemoryStore::new();
        let val = ValidatorAddress::from("val");
        let mut ctx = Context::new(&mut store, 1);
        mock::create_validator(&mut keeper, &mut ctx, &val, Dec::percent(50), 1000).unwrap();

        keeper.allocate_tokens_to_validator(&mut ctx, &val, &stake(10)).unwrap();

        assert_eq!(keeper.validator_commission(&ctx, &val).unwrap(), stake(5));
        assert_eq!(keeper.validator_outstanding_rewards(&ctx, &val).unwrap(), stake(10));
        assert_eq!(CURRENT_REWARDS.load(ctx.store, &val).unwrap().rewards, stake(5));
    }

    #[test]
    fn test_unknown_validator_is_rejected() {
        let mut keeper = keeper(Dec::zero());
        let mut store = MemoryStore::new();
        let mut ctx = Context::new(&mut store, 1);
        let err = keeper
            .allocate_tokens_to_validator(&mut ctx, &ValidatorAddress::from("nobody"), &stake(1))
            .unwrap_err();
        assert!(matches!(err, AccrueError::NoValidatorExists(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_zero_power_block_funds_community_pool() {
        let mut keeper = keeper(Dec::percent(2));
        let mut store = MemoryStore::new();
        let mut ctx = Context::new(&mut store, 1);
        keeper
            .allocate_tokens(&mut ctx, 0, &[], &Coins::single("stake", 100))
            .unwrap();
        assert_eq!(keeper.fee_pool(&ctx).unwrap().community_pool, stake(100));
    }

    #[test]
    fn test_block_allocation_by_power() {
        let mut keeper = keeper(Dec::percent(2));
        let mut store = MemoryStore::new();
        let v1 = ValidatorAddress::from("val1");
        let v2 = ValidatorAddress::from("val2");
        let mut ctx = Context::new(&mut store, 1);
        mock::create_validator(&mut keeper, &mut ctx, &v1, Dec::percent(50), 100).unwrap();
        mock::create_validator(&mut keeper, &mut ctx, &v2, Dec::zero(), 100).unwrap();

        let votes = vec![
            VoteInfo { validator: v1.clone(), power: 100 },
            VoteInfo { validator: v2.clone(), power: 100 },
        ];
        keeper.allocate_tokens(&mut ctx, 200, &votes, &Coins::single("stake", 100)).unwrap();

        // 98 after tax, 49 each
        assert_eq!(keeper.validator_outstanding_rewards(&ctx, &v1).unwrap(), stake(49));
        assert_eq!(keeper.validator_outstanding_rewards(&ctx, &v2).unwrap(), stake(49));
        assert_eq!(
            keeper.validator_commission(&ctx, &v1).unwrap(),
            DecCoins::single("stake", "24.5".parse().unwrap()).unwrap()
        );
        assert!(keeper.validator_commission(&ctx, &v2).unwrap().is_zero());
        assert_eq!(keeper.fee_pool(&ctx).unwrap().community_pool, stake(2));
    }

    #[test]
    fn test_block_allocation_rejects_unknown_voter_before_mutation() {
        let mut keeper = keeper(Dec::zero());
        let mut store = MemoryStore::new();
        let mut ctx = Context::new(&mut store, 1);
        let votes = vec![VoteInfo { validator: ValidatorAddress::from("ghost"), power: 1 }];
        let err = keeper.allocate_tokens(&mut ctx, 1, &votes, &Coins::single("stake", 5)).unwrap_err();
        assert!(matches!(err, AccrueError::NoValidatorExists(_)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_block_allocation_rejects_overcommitted_power() {
        let mut keeper = keeper(Dec::zero());
        let mut store = MemoryStore::new();
        let v1 = ValidatorAddress::from("val1");
        let v2 = ValidatorAddress::from("val2");
        let mut ctx = Context::new(&mut store, 1);
        mock::create_validator(&mut keeper, &mut ctx, &v1, Dec::zero(), 100).unwrap();
        mock::create_validator(&mut keeper, &mut ctx, &v2, Dec::zero(), 100).unwrap();
        let before = ctx.store.clone();

        // each vote alone fits, together they claim 150% of the block
        let votes = vec![
            VoteInfo { validator: v1.clone(), power: 75 },
            VoteInfo { validator: v2.clone(), power: 75 },
        ];
        let err = keeper
            .allocate_tokens(&mut ctx, 100, &votes, &Coins::single("stake", 100))
            .unwrap_err();
        assert!(matches!(err, AccrueError::InvalidAmount(_)));
        assert_eq!(*ctx.store, before);

        let votes = vec![
            VoteInfo { validator: v1.clone(), power: u64::MAX },
            VoteInfo { validator: v2.clone(), power: 1 },
        ];
        let err = keeper
            .allocate_tokens(&mut ctx, u64::MAX, &votes, &Coins::single("stake", 100))
            .unwrap_err();
        assert!(matches!(err, AccrueError::InvalidAmount(_)));
        assert_eq!(*ctx.store, before);
    }
}
