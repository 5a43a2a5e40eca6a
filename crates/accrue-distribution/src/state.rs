// crates/accrue-distribution/src/state.rs
//
// The engine's persisted collections and their prefix bytes.

use accrue_core::{
    AccountAddress, DelegatorStartingInfo, FeePool, ValidatorAccumulatedCommission,
    ValidatorAddress, ValidatorCurrentRewards, ValidatorHistoricalRewards,
    ValidatorOutstandingRewards, ValidatorSlashEvent,
};

use crate::keys::{Item, Map};

pub const FEE_POOL: Item<FeePool> = Item::new(0x00);

pub const OUTSTANDING_REWARDS: Map<ValidatorAddress, ValidatorOutstandingRewards> =
    Map::new(0x02, "outstanding rewards");

/// delegator -> withdraw address
pub const WITHDRAW_ADDRS: Map<AccountAddress, AccountAddress> = Map::new(0x03, "withdraw address");

pub const STARTING_INFOS: Map<(ValidatorAddress, AccountAddress), DelegatorStartingInfo> =
    Map::new(0x04, "delegator starting info");

pub const HISTORICAL_REWARDS: Map<(ValidatorAddress, u64), ValidatorHistoricalRewards> =
    Map::new(0x05, "historical rewards");

pub const CURRENT_REWARDS: Map<ValidatorAddress, ValidatorCurrentRewards> =
    Map::new(0x06, "current rewards");

pub const ACCUMULATED_COMMISSION: Map<ValidatorAddress, ValidatorAccumulatedCommission> =
    Map::new(0x07, "accumulated commission");

/// (validator, height, period) -> slash event
pub const SLASH_EVENTS: Map<(ValidatorAddress, u64, u64), ValidatorSlashEvent> =
    Map::new(0x08, "slash event");
