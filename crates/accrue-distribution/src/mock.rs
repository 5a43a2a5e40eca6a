// crates/accrue-distribution/src/mock.rs
//
// In-memory staking and bank collaborators, plus scenario helpers that
// drive the keeper's hooks in the order a staking module would. Used by the
// tests and by the replay tool.

use std::collections::BTreeMap;

use accrue_core::{
    AccountAddress, AccrueError, Coins, Dec, DelegationInfo, KvStore, StakingSource, TransferSink,
    ValidatorAddress, ValidatorInfo,
};

use crate::keeper::{Context, Keeper};

/// Validators and delegations held in ordered maps.
#[derive(Debug, Clone, Default)]
pub struct MockStaking {
    validators: BTreeMap<ValidatorAddress, ValidatorInfo>,
    delegations: BTreeMap<(ValidatorAddress, AccountAddress), Dec>,
}

impl MockStaking {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_validator(&mut self, info: ValidatorInfo) {
        self.validators.insert(info.operator.clone(), info);
    }

    pub fn remove_validator(&mut self, addr: &ValidatorAddress) -> Option<ValidatorInfo> {
        self.validators.remove(addr)
    }

    pub fn set_delegation(&mut self, delegator: &AccountAddress, validator: &ValidatorAddress, shares: Dec) {
        let key = (validator.clone(), delegator.clone());
        if shares.is_zero() {
            self.delegations.remove(&key);
        } else {
            self.delegations.insert(key, shares);
        }
    }

    fn lookup(&self, addr: &ValidatorAddress) -> Result<ValidatorInfo, AccrueError> {
        self.validators
            .get(addr)
            .cloned()
            .ok_or_else(|| AccrueError::NoValidatorExists(addr.to_string()))
    }
}

impl StakingSource for MockStaking {
    fn validator(&self, addr: &ValidatorAddress) -> Result<Option<ValidatorInfo>, AccrueError> {
        Ok(self.validators.get(addr).cloned())
    }

    fn delegation(
        &self,
        delegator: &AccountAddress,
        validator: &ValidatorAddress,
    ) -> Result<Option<DelegationInfo>, AccrueError> {
        Ok(self
            .delegations
            .get(&(validator.clone(), delegator.clone()))
            .map(|shares| DelegationInfo {
                delegator: delegator.clone(),
                validator: validator.clone(),
                shares: *shares,
            }))
    }

    fn validator_delegations(
        &self,
        validator: &ValidatorAddress,
    ) -> Result<Vec<DelegationInfo>, AccrueError> {
        Ok(self
            .delegations
            .iter()
            .filter(|((val, _), _)| val == validator)
            .map(|((val, del), shares)| DelegationInfo {
                delegator: del.clone(),
                validator: val.clone(),
                shares: *shares,
            })
            .collect())
    }

    fn delegator_delegations(
        &self,
        delegator: &AccountAddress,
    ) -> Result<Vec<DelegationInfo>, AccrueError> {
        Ok(self
            .delegations
            .iter()
            .filter(|((_, del), _)| del == delegator)
            .map(|((val, del), shares)| DelegationInfo {
                delegator: del.clone(),
                validator: val.clone(),
                shares: *shares,
            })
            .collect())
    }
}

/// Module and account balances.
#[derive(Debug, Clone, Default)]
pub struct MockBank {
    modules: BTreeMap<String, Coins>,
    accounts: BTreeMap<AccountAddress, Coins>,
    fail_transfers: bool,
}

impl MockBank {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credit a module account, as fee collection would.
    pub fn fund_module(&mut self, module: &str, coins: &Coins) -> Result<(), AccrueError> {
        let balance = self.modules.get(module).cloned().unwrap_or_default();
        self.modules.insert(module.to_string(), balance.checked_add(coins)?);
        Ok(())
    }

    pub fn balance(&self, account: &AccountAddress) -> Coins {
        self.accounts.get(account).cloned().unwrap_or_default()
    }

    /// Every credited account, in address order.
    pub fn accounts(&self) -> impl Iterator<Item = (&AccountAddress, &Coins)> {
        self.accounts.iter()
    }

    /// Make every subsequent transfer fail with `InsufficientFunds`.
    pub fn set_fail_transfers(&mut self, fail: bool) {
        self.fail_transfers = fail;
    }
}

impl TransferSink for MockBank {
    fn send_coins_from_module_to_account(
        &mut self,
        module: &str,
        to: &AccountAddress,
        coins: &Coins,
    ) -> Result<(), AccrueError> {
        let balance = self.modules.get(module).cloned().unwrap_or_default();
        let rest = match balance.checked_sub(coins) {
            Some(rest) if !self.fail_transfers => rest,
            _ => {
                return Err(AccrueError::InsufficientFunds(format!(
                    "module {} holds {}, cannot send {}",
                    module, balance, coins
                )))
            }
        };
        let credited = self.balance(to).checked_add(coins)?;
        self.modules.insert(module.to_string(), rest);
        self.accounts.insert(to.clone(), credited);
        Ok(())
    }

    fn module_balance(&self, module: &str) -> Result<Coins, AccrueError> {
        Ok(self.modules.get(module).cloned().unwrap_or_default())
    }
}

pub type MockKeeper = Keeper<MockStaking, MockBank>;

/// Register a validator with no stake, then self-delegate `self_bond` tokens.
pub fn create_validator<S: KvStore>(
    keeper: &mut MockKeeper,
    ctx: &mut Context<'_, S>,
    val: &ValidatorAddress,
    commission_rate: Dec,
    self_bond: u128,
) -> Result<(), AccrueError> {
    if commission_rate.is_negative() || commission_rate > Dec::one() {
        return Err(AccrueError::InvalidAmount(format!(
            "commission rate {} must lie in [0, 1]",
            commission_rate
        )));
    }
    keeper.staking_mut().insert_validator(ValidatorInfo {
        operator: val.clone(),
        tokens: 0,
        delegator_shares: Dec::zero(),
        commission_rate,
    });
    keeper.after_validator_created(ctx, val)?;
    if self_bond > 0 {
        delegate(keeper, ctx, &val.operator_account(), val, self_bond)?;
    }
    Ok(())
}

/// Bond `amount` tokens from `delegator`, returning the shares issued.
pub fn delegate<S: KvStore>(
    keeper: &mut MockKeeper,
    ctx: &mut Context<'_, S>,
    delegator: &AccountAddress,
    val: &ValidatorAddress,
    amount: u128,
) -> Result<Dec, AccrueError> {
    let mut info = keeper.staking().lookup(val)?;
    let existing = keeper.staking().delegation(delegator, val)?;

    match &existing {
        Some(_) => keeper.before_delegation_shares_modified(ctx, delegator, val)?,
        None => keeper.before_delegation_created(ctx, delegator, val)?,
    }

    let shares = info.shares_from_tokens(amount)?;
    info.tokens = info.tokens.checked_add(amount).ok_or_else(|| {
        AccrueError::InvalidAmount(format!("bonding {} overflows {}", amount, val))
    })?;
    info.delegator_shares = info.delegator_shares.checked_add(shares)?;
    let total_shares = existing
        .map(|d| d.shares)
        .unwrap_or_else(Dec::zero)
        .checked_add(shares)?;

    let staking = keeper.staking_mut();
    staking.insert_validator(info);
    staking.set_delegation(delegator, val, total_shares);

    keeper.after_delegation_modified(ctx, delegator, val)?;
    Ok(shares)
}

/// Unbond `shares` from a delegation, returning the tokens released.
pub fn undelegate<S: KvStore>(
    keeper: &mut MockKeeper,
    ctx: &mut Context<'_, S>,
    delegator: &AccountAddress,
    val: &ValidatorAddress,
    shares: Dec,
) -> Result<u128, AccrueError> {
    let mut info = keeper.staking().lookup(val)?;
    let held = keeper
        .staking()
        .delegation(delegator, val)?
        .ok_or_else(|| AccrueError::NoDelegationExists(format!("{} -> {}", delegator, val)))?
        .shares;
    if !shares.is_positive() || shares > held {
        return Err(AccrueError::InvalidAmount(format!(
            "cannot unbond {} of {} shares",
            shares, held
        )));
    }

    keeper.before_delegation_shares_modified(ctx, delegator, val)?;

    let remaining_shares = info.delegator_shares.checked_sub(shares)?;
    let released = if remaining_shares.is_zero() {
        info.tokens
    } else {
        info.tokens_from_shares(shares)?.truncate_int()?
    };
    info.tokens -= released.min(info.tokens);
    info.delegator_shares = remaining_shares;
    let left = held.checked_sub(shares)?;

    let staking = keeper.staking_mut();
    staking.insert_validator(info);
    staking.set_delegation(delegator, val, left);

    if !left.is_zero() {
        keeper.after_delegation_modified(ctx, delegator, val)?;
    }
    Ok(released)
}

/// Burn `fraction` of the validator's tokens, returning the amount burned.
pub fn slash_validator<S: KvStore>(
    keeper: &mut MockKeeper,
    ctx: &mut Context<'_, S>,
    val: &ValidatorAddress,
    fraction: Dec,
) -> Result<u128, AccrueError> {
    let mut info = keeper.staking().lookup(val)?;
    let tokens = Dec::from_int(info.tokens)?;
    let burned = tokens.mul_truncate(fraction)?.truncate_int()?.min(info.tokens);

    // The hook sees the fraction actually burned, rounded up and capped at
    // one, so frozen stakes never end up above the live stake.
    let effective = if info.tokens == 0 {
        Dec::zero()
    } else {
        Dec::from_int(burned)?.quo_round_up(tokens)?.min(Dec::one())
    };
    keeper.before_validator_slashed(ctx, val, effective)?;

    info.tokens -= burned;
    keeper.staking_mut().insert_validator(info);
    Ok(burned)
}

/// Unbond every delegation, then drop the validator.
pub fn remove_validator<S: KvStore>(
    keeper: &mut MockKeeper,
    ctx: &mut Context<'_, S>,
    val: &ValidatorAddress,
) -> Result<(), AccrueError> {
    for del in keeper.staking().validator_delegations(val)? {
        undelegate(keeper, ctx, &del.delegator, val, del.shares)?;
    }
    keeper.staking_mut().remove_validator(val);
    keeper.after_validator_removed(ctx, val)
}
