// crates/accrue-distribution/src/lib.rs
//
// accrue-distribution: Proportional reward distribution for the Accrue
// engine.
//
// Rewards are tracked per validator rather than per delegator. Allocation
// only touches the validator's current accumulator; a delegator's share is
// computed lazily from the difference between two cumulative
// reward-per-token snapshots (the period ledger), adjusted for any slashes
// in between. All state lives in a `KvStore` supplied by the caller, and
// every mutating operation commits atomically.

pub mod allocation;
pub mod delegation;
pub mod genesis;
pub mod hooks;
pub mod invariants;
pub mod keeper;
pub mod keys;
pub mod mock;
pub mod period;
pub mod query;
pub mod slash;
pub mod state;
pub mod withdraw;

// Re-export key types for ergonomic access from downstream crates.
pub use allocation::VoteInfo;
pub use genesis::GenesisState;
pub use invariants::InvariantReport;
pub use keeper::{Context, Keeper, Payout, MODULE_NAME};
pub use mock::{MockBank, MockKeeper, MockStaking};
pub use query::{DelegationDelegatorReward, DelegationTotalRewards};
pub use slash::RecordedSlash;
