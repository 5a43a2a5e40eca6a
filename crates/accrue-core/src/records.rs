// crates/accrue-core/src/records.rs
//
// Ledger records persisted by the distribution engine. Each record is stored
// as JSON under a typed key (see accrue-distribution's `keys` module).

use serde::{Deserialize, Serialize};

use crate::coins::DecCoins;
use crate::dec::Dec;

/// Process-wide accounting: funds not owed to any validator or delegator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeePool {
    pub community_pool: DecCoins,
}

/// Total rewards a validator still owes, commission included.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorOutstandingRewards {
    pub rewards: DecCoins,
}

/// Commission accumulated by a validator and not yet withdrawn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorAccumulatedCommission {
    pub commission: DecCoins,
}

/// Rewards accrued in the open period, excluding commission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorCurrentRewards {
    pub period: u64,
    pub rewards: DecCoins,
}

/// Immutable snapshot of the cumulative reward-per-token ratio at the end
/// of one period, kept alive by its reference count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorHistoricalRewards {
    pub cumulative_reward_ratio: DecCoins,
    pub reference_count: u16,
}

/// A stake reduction that happened at the end of `validator_period`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorSlashEvent {
    pub validator_period: u64,
    pub fraction: Dec,
}

/// Where a delegator's un-withdrawn accrual begins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegatorStartingInfo {
    /// Period whose historical entry this info holds a reference on.
    pub previous_period: u64,
    /// Delegated tokens at `previous_period`, frozen.
    pub stake: Dec,
    pub height: u64,
}
