// crates/accrue-distribution/src/invariants.rs
//
// Ledger invariants. Each check returns a report instead of failing so a
// caller can run all of them and see every broken one. An `Err` from a
// check means the ledger could not be read at all.

use std::collections::BTreeMap;

use accrue_core::{
    AccrueError, KvStore, StakingSource, TransferSink, ValidatorAddress,
};

use crate::keeper::{Context, Keeper, MODULE_NAME};
use crate::state::{
    CURRENT_REWARDS, HISTORICAL_REWARDS, OUTSTANDING_REWARDS, SLASH_EVENTS, STARTING_INFOS,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvariantReport {
    pub name: &'static str,
    pub broken: bool,
    pub message: String,
}

impl InvariantReport {
    fn new(name: &'static str, problems: Vec<String>) -> Self {
        let broken = !problems.is_empty();
        let message = if broken {
            problems.join("; ")
        } else {
            "ok".to_string()
        };
        Self {
            name,
            broken,
            message,
        }
    }
}

impl<K: StakingSource, B: TransferSink> Keeper<K, B> {
    /// No validator's outstanding rewards hold a negative amount.
    pub fn nonnegative_outstanding_invariant<S: KvStore>(
        &self,
        ctx: &Context<'_, S>,
    ) -> Result<InvariantReport, AccrueError> {
        let mut problems = Vec::new();
        for (val, outstanding) in OUTSTANDING_REWARDS.all(&*ctx.store)? {
            for (denom, amount) in outstanding.rewards.iter() {
                if amount.is_negative() {
                    problems.push(format!("{} has negative outstanding {}{}", val, amount, denom));
                }
            }
        }
        Ok(InvariantReport::new("nonnegative-outstanding", problems))
    }

    /// Every commission and delegation could be withdrawn right now without
    /// driving outstanding rewards negative. Runs in a discarded cache.
    pub fn can_withdraw_invariant<S: KvStore>(
        &self,
        ctx: &Context<'_, S>,
    ) -> Result<InvariantReport, AccrueError> {
        let validators: Vec<ValidatorAddress> = OUTSTANDING_REWARDS
            .all(&*ctx.store)?
            .into_iter()
            .map(|(val, _)| val)
            .collect();

        let problems = self.discarded(ctx, |k, c| {
            let mut problems = Vec::new();
            for val in &validators {
                match k.withdraw_commission(c, val) {
                    Ok(_) | Err(AccrueError::NoValidatorCommission(_)) => {}
                    Err(e) => problems.push(format!("commission of {}: {}", val, e)),
                }
                if let Some(info) = k.staking().validator(val)? {
                    for del in k.staking().validator_delegations(val)? {
                        if let Err(e) = k.withdraw_rewards(c, &info, &del) {
                            problems.push(format!("rewards of {} from {}: {}", del.delegator, val, e));
                        }
                    }
                }
            }
            Ok(problems)
        })?;

        Ok(InvariantReport::new("can-withdraw", problems))
    }

    /// Every ledger entry's count equals the references actually held on it.
    pub fn reference_count_invariant<S: KvStore>(
        &self,
        ctx: &Context<'_, S>,
    ) -> Result<InvariantReport, AccrueError> {
        let store = &*ctx.store;
        let mut expected: BTreeMap<(ValidatorAddress, u64), u64> = BTreeMap::new();

        for (val, current) in CURRENT_REWARDS.all(store)? {
            *expected.entry((val.clone(), 0)).or_default() += 1;
            if current.period >= 2 {
                *expected.entry((val, current.period - 1)).or_default() += 1;
            }
        }
        for ((val, _), info) in STARTING_INFOS.all(store)? {
            *expected.entry((val, info.previous_period)).or_default() += 1;
        }
        for ((val, _, period), _) in SLASH_EVENTS.all(store)? {
            *expected.entry((val, period)).or_default() += 1;
        }

        let mut problems = Vec::new();
        for ((val, period), entry) in HISTORICAL_REWARDS.all(store)? {
            let want = expected.remove(&(val.clone(), period)).unwrap_or(0);
            if u64::from(entry.reference_count) != want {
                problems.push(format!(
                    "{} period {} has reference count {}, expected {}",
                    val, period, entry.reference_count, want
                ));
            }
        }
        for ((val, period), want) in expected {
            problems.push(format!(
                "{} period {} is missing but holds {} references",
                val, period, want
            ));
        }

        Ok(InvariantReport::new("reference-count", problems))
    }

    /// The module account covers all outstanding rewards plus the community
    /// pool, truncated to whole coins.
    pub fn module_account_invariant<S: KvStore>(
        &self,
        ctx: &Context<'_, S>,
    ) -> Result<InvariantReport, AccrueError> {
        let mut expected = self.load_fee_pool(&*ctx.store)?.community_pool;
        for (_, outstanding) in OUTSTANDING_REWARDS.all(&*ctx.store)? {
            expected = expected.checked_add(&outstanding.rewards)?;
        }
        let (expected, _) = expected.truncate_decimal()?;
        let balance = self.bank().module_balance(MODULE_NAME)?;

        let mut problems = Vec::new();
        if !balance.is_all_gte(&expected) {
            problems.push(format!(
                "module balance {} does not cover expected {}",
                balance, expected
            ));
        }
        Ok(InvariantReport::new("module-account", problems))
    }

    pub fn all_invariants<S: KvStore>(
        &self,
        ctx: &Context<'_, S>,
    ) -> Result<Vec<InvariantReport>, AccrueError> {
        Ok(vec![
            self.nonnegative_outstanding_invariant(ctx)?,
            self.can_withdraw_invariant(ctx)?,
            self.reference_count_invariant(ctx)?,
            self.module_account_invariant(ctx)?,
        ])
    }
}
