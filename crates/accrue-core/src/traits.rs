// crates/accrue-core/src/traits.rs
//
// Interfaces to the engine's external collaborators: the key-value store,
// the stake source, and the transfer sink.

use serde::{Deserialize, Serialize};

use crate::address::{AccountAddress, ValidatorAddress};
use crate::coins::Coins;
use crate::dec::Dec;
use crate::error::AccrueError;

/// One mutation in an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOp {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

/// Byte-keyed, ordered key-value storage.
///
/// Implemented by accrue-store (in-memory map, write-buffering cache, RocksDB).
pub trait KvStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, AccrueError>;

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), AccrueError>;

    fn delete(&mut self, key: &[u8]) -> Result<(), AccrueError>;

    /// All entries whose key starts with `prefix`, in ascending byte order.
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, AccrueError>;

    /// Entries with `start <= key < end`, in ascending byte order.
    fn scan_range(&self, start: &[u8], end: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>, AccrueError>;

    /// Apply every op or none of them.
    fn write_batch(&mut self, ops: Vec<BatchOp>) -> Result<(), AccrueError>;

    fn has(&self, key: &[u8]) -> Result<bool, AccrueError> {
        Ok(self.get(key)?.is_some())
    }
}

/// Read-only view of a validator, as owned by staking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidatorInfo {
    pub operator: ValidatorAddress,
    /// Bonded tokens.
    pub tokens: u128,
    /// Total shares issued to delegators.
    pub delegator_shares: Dec,
    pub commission_rate: Dec,
}

impl ValidatorInfo {
    /// Tokens represented by `shares`, rounded half-to-even.
    pub fn tokens_from_shares(&self, shares: Dec) -> Result<Dec, AccrueError> {
        if self.delegator_shares.is_zero() {
            return Ok(Dec::zero());
        }
        shares
            .checked_mul(Dec::from_int(self.tokens)?)?
            .checked_quo(self.delegator_shares)
    }

    /// Tokens represented by `shares`, truncated.
    pub fn tokens_from_shares_truncated(&self, shares: Dec) -> Result<Dec, AccrueError> {
        if self.delegator_shares.is_zero() {
            return Ok(Dec::zero());
        }
        shares
            .checked_mul(Dec::from_int(self.tokens)?)?
            .quo_truncate(self.delegator_shares)
    }

    /// Shares issued for `amount` tokens at the current exchange rate.
    /// A validator without tokens issues shares one-to-one.
    pub fn shares_from_tokens(&self, amount: u128) -> Result<Dec, AccrueError> {
        let amount = Dec::from_int(amount)?;
        if self.tokens == 0 {
            return Ok(amount);
        }
        self.delegator_shares
            .checked_mul(amount)?
            .quo_truncate(Dec::from_int(self.tokens)?)
    }
}

/// Read-only view of one delegation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationInfo {
    pub delegator: AccountAddress,
    pub validator: ValidatorAddress,
    pub shares: Dec,
}

/// Validator and delegation bookkeeping owned by staking.
pub trait StakingSource: Send + Sync {
    fn validator(&self, addr: &ValidatorAddress) -> Result<Option<ValidatorInfo>, AccrueError>;

    fn delegation(
        &self,
        delegator: &AccountAddress,
        validator: &ValidatorAddress,
    ) -> Result<Option<DelegationInfo>, AccrueError>;

    /// Every delegation to `validator`, ordered by delegator.
    fn validator_delegations(
        &self,
        validator: &ValidatorAddress,
    ) -> Result<Vec<DelegationInfo>, AccrueError>;

    /// Every delegation made by `delegator`, ordered by validator.
    fn delegator_delegations(
        &self,
        delegator: &AccountAddress,
    ) -> Result<Vec<DelegationInfo>, AccrueError>;
}

/// Token movement owned by the bank.
pub trait TransferSink: Send + Sync {
    /// Move `coins` out of a module account. Fails with
    /// `AccrueError::InsufficientFunds` and changes nothing if the module
    /// cannot cover them.
    fn send_coins_from_module_to_account(
        &mut self,
        module: &str,
        to: &AccountAddress,
        coins: &Coins,
    ) -> Result<(), AccrueError>;

    fn module_balance(&self, module: &str) -> Result<Coins, AccrueError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator(tokens: u128, shares: u64) -> ValidatorInfo {
        ValidatorInfo {
            operator: ValidatorAddress::from("val"),
            tokens,
            delegator_shares: Dec::from(shares),
            commission_rate: Dec::zero(),
        }
    }

    #[test]
    fn test_share_conversion_after_slash() {
        // 100 shares backed by 50 tokens
        let v = validator(50, 100);
        assert_eq!(v.tokens_from_shares(Dec::from(10u64)).unwrap(), Dec::from(5u64));
        assert_eq!(v.shares_from_tokens(5).unwrap(), Dec::from(10u64));
    }

    #[test]
    fn test_truncated_conversion_rounds_down() {
        let v = validator(2, 3);
        let shares = Dec::one();
        assert_eq!(
            v.tokens_from_shares_truncated(shares).unwrap().to_string(),
            "0.666666666666666666"
        );
        assert_eq!(v.tokens_from_shares(shares).unwrap().to_string(), "0.666666666666666667");
    }

    #[test]
    fn test_empty_validator_conversions() {
        let v = validator(0, 0);
        assert_eq!(v.tokens_from_shares(Dec::one()).unwrap(), Dec::zero());
        assert_eq!(v.shares_from_tokens(7).unwrap(), Dec::from(7u64));
    }
}
