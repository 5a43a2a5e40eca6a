// crates/accrue-distribution/src/genesis.rs
//
// Full-state export and import. Export walks every collection in key
// order, so two ledgers with identical contents always export identical
// JSON.

use serde::{Deserialize, Serialize};
use tracing::info;

use accrue_core::{
    AccountAddress, AccrueError, DecCoins, DelegatorStartingInfo, DistributionParams, FeePool,
    KvStore, StakingSource, TransferSink, ValidatorAccumulatedCommission, ValidatorAddress,
    ValidatorCurrentRewards, ValidatorHistoricalRewards, ValidatorOutstandingRewards,
    ValidatorSlashEvent,
};

use crate::keeper::{Context, Keeper};
use crate::state::{
    ACCUMULATED_COMMISSION, CURRENT_REWARDS, FEE_POOL, HISTORICAL_REWARDS, OUTSTANDING_REWARDS,
    SLASH_EVENTS, STARTING_INFOS, WITHDRAW_ADDRS,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatorWithdrawInfo {
    pub delegator: AccountAddress,
    pub withdraw_address: AccountAddress,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorOutstandingRewardsRecord {
    pub validator: ValidatorAddress,
    pub outstanding_rewards: DecCoins,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorAccumulatedCommissionRecord {
    pub validator: ValidatorAddress,
    pub accumulated: ValidatorAccumulatedCommission,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorHistoricalRewardsRecord {
    pub validator: ValidatorAddress,
    pub period: u64,
    pub rewards: ValidatorHistoricalRewards,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorCurrentRewardsRecord {
    pub validator: ValidatorAddress,
    pub rewards: ValidatorCurrentRewards,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatorStartingInfoRecord {
    pub delegator: AccountAddress,
    pub validator: ValidatorAddress,
    pub starting_info: DelegatorStartingInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSlashEventRecord {
    pub validator: ValidatorAddress,
    pub height: u64,
    pub period: u64,
    pub event: ValidatorSlashEvent,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisState {
    pub params: DistributionParams,
    pub fee_pool: FeePool,
    pub delegator_withdraw_infos: Vec<DelegatorWithdrawInfo>,
    pub outstanding_rewards: Vec<ValidatorOutstandingRewardsRecord>,
    pub validator_accumulated_commissions: Vec<ValidatorAccumulatedCommissionRecord>,
    pub validator_historical_rewards: Vec<ValidatorHistoricalRewardsRecord>,
    pub validator_current_rewards: Vec<ValidatorCurrentRewardsRecord>,
    pub delegator_starting_infos: Vec<DelegatorStartingInfoRecord>,
    pub validator_slash_events: Vec<ValidatorSlashEventRecord>,
}

impl GenesisState {
    pub fn validate(&self) -> Result<(), AccrueError> {
        self.params.validate()?;
        for record in &self.validator_historical_rewards {
            if record.rewards.reference_count == 0 {
                return Err(AccrueError::InternalConsistency(format!(
                    "historical rewards of {} period {} have no references",
                    record.validator, record.period
                )));
            }
        }
        for record in &self.validator_slash_events {
            if record.period != record.event.validator_period {
                return Err(AccrueError::InternalConsistency(format!(
                    "slash event of {} at height {} is keyed under period {} but records period {}",
                    record.validator, record.height, record.period, record.event.validator_period
                )));
            }
        }
        Ok(())
    }
}

impl<K: StakingSource, B: TransferSink> Keeper<K, B> {
    /// Replace the parameters and write every record of `genesis`.
    pub fn init_genesis<S: KvStore>(
        &mut self,
        ctx: &mut Context<'_, S>,
        genesis: &GenesisState,
    ) -> Result<(), AccrueError> {
        genesis.validate()?;

        self.atomically(ctx, |_, c| {
            FEE_POOL.save(c.store, &genesis.fee_pool)?;
            for w in &genesis.delegator_withdraw_infos {
                WITHDRAW_ADDRS.save(c.store, &w.delegator, &w.withdraw_address)?;
            }
            for r in &genesis.outstanding_rewards {
                OUTSTANDING_REWARDS.save(
                    c.store,
                    &r.validator,
                    &ValidatorOutstandingRewards {
                        rewards: r.outstanding_rewards.clone(),
                    },
                )?;
            }
            for r in &genesis.validator_accumulated_commissions {
                ACCUMULATED_COMMISSION.save(c.store, &r.validator, &r.accumulated)?;
            }
            for r in &genesis.validator_historical_rewards {
                HISTORICAL_REWARDS.save(c.store, &(r.validator.clone(), r.period), &r.rewards)?;
            }
            for r in &genesis.validator_current_rewards {
                CURRENT_REWARDS.save(c.store, &r.validator, &r.rewards)?;
            }
            for r in &genesis.delegator_starting_infos {
                STARTING_INFOS.save(
                    c.store,
                    &(r.validator.clone(), r.delegator.clone()),
                    &r.starting_info,
                )?;
            }
            for r in &genesis.validator_slash_events {
                SLASH_EVENTS.save(c.store, &(r.validator.clone(), r.height, r.period), &r.event)?;
            }
            Ok(())
        })?;
        self.set_params(genesis.params.clone())?;

        info!(
            validators = genesis.validator_current_rewards.len(),
            delegations = genesis.delegator_starting_infos.len(),
            "initialized distribution genesis"
        );
        Ok(())
    }

    pub fn export_genesis<S: KvStore>(&self, ctx: &Context<'_, S>) -> Result<GenesisState, AccrueError> {
        let store = &*ctx.store;
        Ok(GenesisState {
            params: self.params().clone(),
            fee_pool: self.load_fee_pool(store)?,
            delegator_withdraw_infos: WITHDRAW_ADDRS
                .all(store)?
                .into_iter()
                .map(|(delegator, withdraw_address)| DelegatorWithdrawInfo {
                    delegator,
                    withdraw_address,
                })
                .collect(),
            outstanding_rewards: OUTSTANDING_REWARDS
                .all(store)?
                .into_iter()
                .map(|(validator, o)| ValidatorOutstandingRewardsRecord {
                    validator,
                    outstanding_rewards: o.rewards,
                })
                .collect(),
            validator_accumulated_commissions: ACCUMULATED_COMMISSION
                .all(store)?
                .into_iter()
                .map(|(validator, accumulated)| ValidatorAccumulatedCommissionRecord {
                    validator,
                    accumulated,
                })
                .collect(),
            validator_historical_rewards: HISTORICAL_REWARDS
                .all(store)?
                .into_iter()
                .map(|((validator, period), rewards)| ValidatorHistoricalRewardsRecord {
                    validator,
                    period,
                    rewards,
                })
                .collect(),
            validator_current_rewards: CURRENT_REWARDS
                .all(store)?
                .into_iter()
                .map(|(validator, rewards)| ValidatorCurrentRewardsRecord { validator, rewards })
                .collect(),
            delegator_starting_infos: STARTING_INFOS
                .all(store)?
                .into_iter()
                .map(|((validator, delegator), starting_info)| DelegatorStartingInfoRecord {
                    delegator,
                    validator,
                    starting_info,
                })
                .collect(),
            validator_slash_events: SLASH_EVENTS
                .all(store)?
                .into_iter()
                .map(|((validator, height, period), event)| ValidatorSlashEventRecord {
                    validator,
                    height,
                    period,
                    event,
                })
                .collect(),
        })
    }
}
