// crates/accrue-distribution/src/withdraw.rs
//
// Delegator reward and validator commission withdrawals, and withdraw
// address overrides.
//
// The ledger half of each withdrawal produces a `Payout`; the public entry
// points apply it through the bank as the last step of the same atomic
// unit, so a failed transfer discards every ledger change.

use tracing::{info, warn};

use accrue_core::{
    AccountAddress, AccrueError, Coins, DelegationInfo, KvStore, StakingSource, TransferSink,
    ValidatorAddress, ValidatorInfo,
};

use crate::keeper::{Context, Keeper, Payout};
use crate::state::{ACCUMULATED_COMMISSION, OUTSTANDING_REWARDS, STARTING_INFOS, WITHDRAW_ADDRS};

impl<K: StakingSource, B: TransferSink> Keeper<K, B> {
    /// Settle a delegation's rewards and drop its starting info.
    pub(crate) fn withdraw_rewards<S: KvStore>(
        &self,
        ctx: &mut Context<'_, S>,
        val: &ValidatorInfo,
        del: &DelegationInfo,
    ) -> Result<Payout, AccrueError> {
        let addr = &val.operator;
        let starting = self.starting_info(&*ctx.store, addr, &del.delegator)?;

        let ending_period = self.increment_period(ctx, val)?;
        let raw = self.calculate_rewards(&*ctx, val, del, ending_period)?;

        let mut outstanding = OUTSTANDING_REWARDS.load(ctx.store, addr)?;
        let rewards = raw.intersect(&outstanding.rewards);
        if rewards != raw {
            warn!(
                validator = %addr,
                delegator = %del.delegator,
                calculated = %raw,
                outstanding = %outstanding.rewards,
                "rounding error withdrawing rewards from validator"
            );
        }

        let (coins, remainder) = rewards.truncate_decimal()?;
        outstanding.rewards = outstanding.rewards.checked_sub(&rewards)?;
        OUTSTANDING_REWARDS.save(ctx.store, addr, &outstanding)?;
        self.fund_community_pool(ctx.store, &remainder)?;

        self.decrement_reference_count(ctx.store, addr, starting.previous_period)?;
        STARTING_INFOS.remove(ctx.store, &(addr.clone(), del.delegator.clone()))?;

        let recipient = self.withdraw_address_of(&*ctx.store, &del.delegator)?;
        Ok(Payout { recipient, coins })
    }

    /// Pay out everything `delegator` has accrued with `validator` and restart
    /// its accrual at the current period.
    pub fn withdraw_delegation_rewards<S: KvStore>(
        &mut self,
        ctx: &mut Context<'_, S>,
        delegator: &AccountAddress,
        validator: &ValidatorAddress,
    ) -> Result<Coins, AccrueError> {
        let val = self.validator_info(validator)?;
        let del = self.delegation_info(delegator, validator)?;
        let starting = self.starting_info(&*ctx.store, validator, delegator)?;
        if starting.height == ctx.height {
            return Ok(Coins::new());
        }

        let coins = self.atomically(ctx, |k, c| {
            let payout = k.withdraw_rewards(c, &val, &del)?;
            k.initialize_delegation(c, &val, &del)?;
            k.pay(&payout)?;
            Ok(payout.coins)
        })?;

        info!(%delegator, %validator, amount = %coins, "withdrew delegation rewards");
        Ok(coins)
    }

    /// Settle the integral part of a validator's commission; dust stays.
    pub(crate) fn withdraw_commission<S: KvStore>(
        &self,
        ctx: &mut Context<'_, S>,
        val: &ValidatorAddress,
    ) -> Result<Payout, AccrueError> {
        let mut accumulated = ACCUMULATED_COMMISSION.get(ctx.store, val)?.unwrap_or_default();
        if accumulated.commission.is_zero() {
            return Err(AccrueError::NoValidatorCommission(val.to_string()));
        }

        let (coins, remainder) = accumulated.commission.truncate_decimal()?;
        accumulated.commission = remainder;
        ACCUMULATED_COMMISSION.save(ctx.store, val, &accumulated)?;

        let mut outstanding = OUTSTANDING_REWARDS.load(ctx.store, val)?;
        outstanding.rewards = outstanding.rewards.checked_sub(&coins.to_dec_coins()?)?;
        OUTSTANDING_REWARDS.save(ctx.store, val, &outstanding)?;

        let recipient = self.withdraw_address_of(&*ctx.store, &val.operator_account())?;
        Ok(Payout { recipient, coins })
    }

    /// Pay a validator's accumulated commission to its operator.
    pub fn withdraw_validator_commission<S: KvStore>(
        &mut self,
        ctx: &mut Context<'_, S>,
        validator: &ValidatorAddress,
    ) -> Result<Coins, AccrueError> {
        let coins = self.atomically(ctx, |k, c| {
            let payout = k.withdraw_commission(c, validator)?;
            k.pay(&payout)?;
            Ok(payout.coins)
        })?;

        info!(%validator, amount = %coins, "withdrew validator commission");
        Ok(coins)
    }

    /// Redirect `delegator`'s future rewards to `withdraw_addr`.
    pub fn set_withdraw_address<S: KvStore>(
        &mut self,
        ctx: &mut Context<'_, S>,
        delegator: &AccountAddress,
        withdraw_addr: &AccountAddress,
    ) -> Result<(), AccrueError> {
        if !self.params().withdraw_addr_enabled {
            return Err(AccrueError::WithdrawAddrDisabled);
        }
        self.atomically(ctx, |_, c| {
            if withdraw_addr == delegator {
                WITHDRAW_ADDRS.remove(c.store, delegator)
            } else {
                WITHDRAW_ADDRS.save(c.store, delegator, withdraw_addr)
            }
        })
    }
}
