// crates/accrue-core/src/lib.rs
//
// accrue-core: Core types, traits, and error definitions for the Accrue
// reward-distribution engine.
//
// This is the leaf crate that all other crates in the workspace depend on.
// It defines the fixed-point amount types, the ledger records persisted by
// the engine, the distribution parameters, and the trait interfaces through
// which the engine reaches its external collaborators (storage, staking,
// bank).

pub mod address;
pub mod coins;
pub mod dec;
pub mod error;
pub mod params;
pub mod records;
pub mod traits;

// Re-export key types for ergonomic access from downstream crates.
// Usage: `use accrue_core::DecCoins;`

// Amount types
pub use coins::{Coins, DecCoins};
pub use dec::{Dec, PRECISION};

// Identity types
pub use address::{AccountAddress, ValidatorAddress};

// Ledger records
pub use records::{
    DelegatorStartingInfo, FeePool, ValidatorAccumulatedCommission, ValidatorCurrentRewards,
    ValidatorHistoricalRewards, ValidatorOutstandingRewards, ValidatorSlashEvent,
};

// Parameters
pub use params::DistributionParams;

// Error type
pub use error::AccrueError;

// Traits
pub use traits::{BatchOp, DelegationInfo, KvStore, StakingSource, TransferSink, ValidatorInfo};
