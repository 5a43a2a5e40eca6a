// crates/accrue-replay/src/runner.rs
//
// Executes a scenario step by step against the distribution keeper and the
// mock staking and bank collaborators, checking every invariant after each
// step. The final ledger is exported as genesis JSON and hashed, so two runs
// of the same scenario can be compared by digest alone.

use accrue_core::{AccountAddress, AccrueError, Coins, DecCoins, KvStore, ValidatorAddress};
use accrue_distribution::mock::{self, MockBank, MockKeeper, MockStaking};
use accrue_distribution::{Context, VoteInfo, MODULE_NAME};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::config::{ScenarioConfig, Step};

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("Scenario error: {0}")]
    Config(String),

    #[error("Step {step} failed: {source}")]
    Step {
        step: usize,
        #[source]
        source: AccrueError,
    },

    #[error("Step {step} broke the {name} invariant: {message}")]
    InvariantBroken {
        step: usize,
        name: String,
        message: String,
    },

    #[error(transparent)]
    Engine(#[from] AccrueError),
}

/// Per-validator balances at the end of a replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatorSummary {
    pub validator: ValidatorAddress,
    pub outstanding: DecCoins,
    pub commission: DecCoins,
}

/// Outcome of a completed replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplaySummary {
    pub steps: usize,
    pub height: u64,
    pub allocated: Coins,
    pub paid: Coins,
    pub community_pool: DecCoins,
    pub validators: Vec<ValidatorSummary>,
    /// Hex SHA-256 of the exported genesis JSON.
    pub digest: String,
}

pub struct Replay<S: KvStore> {
    keeper: MockKeeper,
    store: S,
    height: u64,
    denom: String,
    allocated: Coins,
}

impl<S: KvStore> Replay<S> {
    /// Set up a replay over an empty store.
    pub fn new(config: &ScenarioConfig, store: S) -> Result<Self, ReplayError> {
        if !store.scan_prefix(&[])?.is_empty() {
            return Err(ReplayError::Config(
                "replay requires an empty store".to_string(),
            ));
        }
        let keeper = MockKeeper::new(MockStaking::new(), MockBank::new(), config.params.clone())?;
        Ok(Self {
            keeper,
            store,
            height: 1,
            denom: config.denom.clone(),
            allocated: Coins::new(),
        })
    }

    /// Run every step, stopping at the first failure.
    pub fn run(mut self, steps: &[Step]) -> Result<ReplaySummary, ReplayError> {
        for (i, step) in steps.iter().enumerate() {
            let index = i + 1;
            tracing::debug!(step = index, height = self.height, ?step, "applying step");
            self.apply(step)
                .map_err(|source| ReplayError::Step { step: index, source })?;
            self.check_invariants(index)?;
        }
        self.summary(steps.len())
    }

    fn coins(&self, amount: u128) -> Coins {
        Coins::single(&self.denom, amount)
    }

    fn fund(&mut self, coins: &Coins) -> Result<(), AccrueError> {
        self.keeper.bank_mut().fund_module(MODULE_NAME, coins)?;
        self.allocated = self.allocated.checked_add(coins)?;
        Ok(())
    }

    fn apply(&mut self, step: &Step) -> Result<(), AccrueError> {
        let amount = |a: &crate::config::Amount| {
            a.value().map_err(|e| AccrueError::InvalidAmount(e.to_string()))
        };

        match step {
            Step::NextBlock { count } => {
                self.height += *count;
                return Ok(());
            }
            Step::Allocate { validator, amount: a } => {
                let coins = self.coins(amount(a)?);
                self.fund(&coins)?;
                let tokens = coins.to_dec_coins()?;
                let mut ctx = Context::new(&mut self.store, self.height);
                return self.keeper.allocate_tokens_to_validator(
                    &mut ctx,
                    &ValidatorAddress::from(validator.as_str()),
                    &tokens,
                );
            }
            Step::AllocateBlock { total_power, votes, fees } => {
                let fees = self.coins(amount(fees)?);
                self.fund(&fees)?;
                let votes: Vec<VoteInfo> = votes
                    .iter()
                    .map(|v| VoteInfo {
                        validator: ValidatorAddress::from(v.validator.as_str()),
                        power: v.power,
                    })
                    .collect();
                let mut ctx = Context::new(&mut self.store, self.height);
                return self.keeper.allocate_tokens(&mut ctx, *total_power, &votes, &fees);
            }
            _ => {}
        }

        let keeper = &mut self.keeper;
        let mut ctx = Context::new(&mut self.store, self.height);
        match step {
            Step::CreateValidator { validator, commission_rate, self_bond } => mock::create_validator(
                keeper,
                &mut ctx,
                &ValidatorAddress::from(validator.as_str()),
                *commission_rate,
                amount(self_bond)?,
            ),
            Step::Delegate { delegator, validator, amount: a } => mock::delegate(
                keeper,
                &mut ctx,
                &AccountAddress::from(delegator.as_str()),
                &ValidatorAddress::from(validator.as_str()),
                amount(a)?,
            )
            .map(|_| ()),
            Step::Undelegate { delegator, validator, shares } => mock::undelegate(
                keeper,
                &mut ctx,
                &AccountAddress::from(delegator.as_str()),
                &ValidatorAddress::from(validator.as_str()),
                *shares,
            )
            .map(|_| ()),
            Step::Slash { validator, fraction } => mock::slash_validator(
                keeper,
                &mut ctx,
                &ValidatorAddress::from(validator.as_str()),
                *fraction,
            )
            .map(|_| ()),
            Step::Withdraw { delegator, validator } => keeper
                .withdraw_delegation_rewards(
                    &mut ctx,
                    &AccountAddress::from(delegator.as_str()),
                    &ValidatorAddress::from(validator.as_str()),
                )
                .map(|_| ()),
            Step::WithdrawCommission { validator } => keeper
                .withdraw_validator_commission(&mut ctx, &ValidatorAddress::from(validator.as_str()))
                .map(|_| ()),
            Step::SetWithdrawAddress { delegator, address } => keeper.set_withdraw_address(
                &mut ctx,
                &AccountAddress::from(delegator.as_str()),
                &AccountAddress::from(address.as_str()),
            ),
            Step::RemoveValidator { validator } => {
                mock::remove_validator(keeper, &mut ctx, &ValidatorAddress::from(validator.as_str()))
            }
            Step::NextBlock { .. } | Step::Allocate { .. } | Step::AllocateBlock { .. } => Ok(()),
        }
    }

    fn check_invariants(&mut self, step: usize) -> Result<(), ReplayError> {
        let ctx = Context::new(&mut self.store, self.height);
        for report in self.keeper.all_invariants(&ctx)? {
            if report.broken {
                tracing::error!(step, invariant = %report.name, "{}", report.message);
                return Err(ReplayError::InvariantBroken {
                    step,
                    name: report.name.to_string(),
                    message: report.message,
                });
            }
        }
        Ok(())
    }

    fn summary(mut self, steps: usize) -> Result<ReplaySummary, ReplayError> {
        let ctx = Context::new(&mut self.store, self.height);
        let genesis = self.keeper.export_genesis(&ctx)?;
        let json = serde_json::to_vec(&genesis).map_err(AccrueError::from)?;
        let digest = hex::encode(Sha256::digest(&json));

        let mut paid = Coins::new();
        for (_, balance) in self.keeper.bank().accounts() {
            paid = paid.checked_add(balance)?;
        }

        let validators = genesis
            .outstanding_rewards
            .iter()
            .map(|record| {
                let commission = genesis
                    .validator_accumulated_commissions
                    .iter()
                    .find(|c| c.validator == record.validator)
                    .map(|c| c.accumulated.commission.clone())
                    .unwrap_or_default();
                ValidatorSummary {
                    validator: record.validator.clone(),
                    outstanding: record.outstanding_rewards.clone(),
                    commission,
                }
            })
            .collect();

        Ok(ReplaySummary {
            steps,
            height: self.height,
            allocated: self.allocated,
            paid,
            community_pool: genesis.fee_pool.community_pool,
            validators,
            digest,
        })
    }
}

/// Replay `config` against `store`.
pub fn replay<S: KvStore>(config: &ScenarioConfig, store: S) -> Result<ReplaySummary, ReplayError> {
    Replay::new(config, store)?.run(&config.steps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use accrue_core::Dec;
    use accrue_store::{MemoryStore, RocksStore};

    const BASIC: &str = include_str!("../scenarios/basic.toml");

    #[test]
    fn test_basic_scenario_runs_clean() {
        let config = ScenarioConfig::parse(BASIC).unwrap();
        let summary = replay(&config, MemoryStore::new()).unwrap();
        assert_eq!(summary.steps, config.steps.len());
        assert_eq!(summary.digest.len(), 64);
        assert!(!summary.paid.is_zero());
    }

    #[test]
    fn test_same_scenario_same_digest() {
        let config = ScenarioConfig::parse(BASIC).unwrap();
        let first = replay(&config, MemoryStore::new()).unwrap();
        let second = replay(&config, MemoryStore::new()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_rocks_backend_matches_memory() {
        let config = ScenarioConfig::parse(BASIC).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let rocks = RocksStore::open(dir.path().to_str().unwrap()).unwrap();
        let on_disk = replay(&config, rocks).unwrap();
        let in_memory = replay(&config, MemoryStore::new()).unwrap();
        assert_eq!(on_disk.digest, in_memory.digest);
    }

    #[test]
    fn test_split_allocation() {
        let config = ScenarioConfig::parse(
            r#"
            [params]
            community_tax = "0"

            [[step]]
            action = "create_validator"
            validator = "val1"
            commission_rate = "0.5"
            self_bond = 100

            [[step]]
            action = "next_block"

            [[step]]
            action = "allocate"
            validator = "val1"
            amount = 10

            [[step]]
            action = "withdraw"
            delegator = "val1"
            validator = "val1"
            "#,
        )
        .unwrap();
        let summary = replay(&config, MemoryStore::new()).unwrap();
        assert_eq!(summary.paid, Coins::single("stake", 5));
        assert_eq!(summary.validators.len(), 1);
        assert_eq!(
            summary.validators[0].commission.amount_of("stake"),
            Dec::from(5u64)
        );
    }

    #[test]
    fn test_failed_step_is_reported() {
        let config = ScenarioConfig::parse(
            r#"
            [[step]]
            action = "withdraw_commission"
            validator = "ghost"
            "#,
        )
        .unwrap();
        let err = replay(&config, MemoryStore::new()).unwrap_err();
        assert!(matches!(err, ReplayError::Step { step: 1, .. }));
    }

    #[test]
    fn test_rejects_non_empty_store() {
        let mut store = MemoryStore::new();
        store.set(b"leftover", b"1").unwrap();
        let config = ScenarioConfig::parse("").unwrap();
        assert!(matches!(replay(&config, store), Err(ReplayError::Config(_))));
    }
}
