// crates/accrue-distribution/src/hooks.rs
//
// Staking hooks: the calls through which staking keeps the engine in step
// with validator and delegation changes. Each hook is one atomic unit.
//
// A stake change on an existing delegation runs
//   before_delegation_shares_modified -> (staking updates shares/tokens)
//   -> after_delegation_modified
// and a new delegation runs before_delegation_created in place of the
// first hook.

use tracing::info;

use accrue_core::{
    AccountAddress, AccrueError, Dec, KvStore, StakingSource, TransferSink, ValidatorAddress,
};

use crate::keeper::{Context, Keeper, Payout};
use crate::state::{
    ACCUMULATED_COMMISSION, CURRENT_REWARDS, HISTORICAL_REWARDS, OUTSTANDING_REWARDS,
    SLASH_EVENTS, STARTING_INFOS,
};

impl<K: StakingSource, B: TransferSink> Keeper<K, B> {
    /// Open the ledger for a new validator: period 0 pinned, period 1 current,
    /// empty commission and outstanding rewards.
    pub fn after_validator_created<S: KvStore>(
        &mut self,
        ctx: &mut Context<'_, S>,
        val: &ValidatorAddress,
    ) -> Result<(), AccrueError> {
        self.atomically(ctx, |k, c| k.initialize_validator(c, val))
    }

    /// Close the validator's current period so the new delegation starts on
    /// a fresh ledger entry.
    pub fn before_delegation_created<S: KvStore>(
        &mut self,
        ctx: &mut Context<'_, S>,
        _delegator: &AccountAddress,
        val: &ValidatorAddress,
    ) -> Result<(), AccrueError> {
        let info = self.validator_info(val)?;
        self.atomically(ctx, |k, c| k.increment_period(c, &info).map(|_| ()))
    }

    /// Withdraw everything accrued under the old stake.
    pub fn before_delegation_shares_modified<S: KvStore>(
        &mut self,
        ctx: &mut Context<'_, S>,
        delegator: &AccountAddress,
        val: &ValidatorAddress,
    ) -> Result<(), AccrueError> {
        let info = self.validator_info(val)?;
        let del = self.delegation_info(delegator, val)?;
        self.atomically(ctx, |k, c| {
            let payout = k.withdraw_rewards(c, &info, &del)?;
            k.pay(&payout)
        })
    }

    /// Start accrual under the new stake.
    pub fn after_delegation_modified<S: KvStore>(
        &mut self,
        ctx: &mut Context<'_, S>,
        delegator: &AccountAddress,
        val: &ValidatorAddress,
    ) -> Result<(), AccrueError> {
        let info = self.validator_info(val)?;
        let del = self.delegation_info(delegator, val)?;
        self.atomically(ctx, |k, c| k.initialize_delegation(c, &info, &del))
    }

    /// Called before staking reduces the validator's tokens by `fraction`.
    pub fn before_validator_slashed<S: KvStore>(
        &mut self,
        ctx: &mut Context<'_, S>,
        val: &ValidatorAddress,
        fraction: Dec,
    ) -> Result<(), AccrueError> {
        self.record_slash_event(ctx, val, fraction)
    }

    /// Pay out the commission, sweep the rest to the community pool, and
    /// delete every record of the validator.
    pub fn after_validator_removed<S: KvStore>(
        &mut self,
        ctx: &mut Context<'_, S>,
        val: &ValidatorAddress,
    ) -> Result<(), AccrueError> {
        let payout = self.atomically(ctx, |k, c| {
            let payout = k.remove_validator_records(c, val)?;
            if let Some(payout) = &payout {
                k.pay(payout)?;
            }
            Ok(payout)
        })?;

        let commission = payout.map(|p| p.coins).unwrap_or_default();
        info!(validator = %val, commission = %commission, "removed validator");
        Ok(())
    }

    fn remove_validator_records<S: KvStore>(
        &self,
        ctx: &mut Context<'_, S>,
        val: &ValidatorAddress,
    ) -> Result<Option<Payout>, AccrueError> {
        if !STARTING_INFOS.prefix(&*ctx.store, val)?.is_empty() {
            return Err(AccrueError::InternalConsistency(format!(
                "validator {} removed while delegations still accrue",
                val
            )));
        }

        let mut remaining = OUTSTANDING_REWARDS.load(ctx.store, val)?.rewards;
        let commission = ACCUMULATED_COMMISSION
            .get(ctx.store, val)?
            .unwrap_or_default()
            .commission;

        let payout = if commission.is_zero() {
            None
        } else {
            remaining = remaining.checked_sub(&commission)?;
            let (coins, dust) = commission.truncate_decimal()?;
            remaining = remaining.checked_add(&dust)?;
            let recipient = self.withdraw_address_of(&*ctx.store, &val.operator_account())?;
            Some(Payout { recipient, coins })
        };
        self.fund_community_pool(ctx.store, &remaining)?;

        OUTSTANDING_REWARDS.remove(ctx.store, val)?;
        ACCUMULATED_COMMISSION.remove(ctx.store, val)?;
        SLASH_EVENTS.clear_prefix(ctx.store, val)?;
        HISTORICAL_REWARDS.clear_prefix(ctx.store, val)?;
        CURRENT_REWARDS.remove(ctx.store, val)?;

        Ok(payout)
    }
}
