// crates/accrue-core/src/coins.rs
//
// Multi-denomination amounts.
//
// `DecCoins` holds fixed-point amounts and is what the ledger stores;
// `Coins` holds integral amounts and is only used at the transfer boundary.
// Both are BTreeMap-backed so that iteration and serialization are ordered
// by denom, and neither ever stores a zero entry. `DecCoins` additionally
// never stores a negative entry: any operation that would produce one
// returns an error instead.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::dec::Dec;
use crate::error::AccrueError;

/// Non-negative fixed-point amounts keyed by denom.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, Dec>", into = "BTreeMap<String, Dec>")]
pub struct DecCoins(BTreeMap<String, Dec>);

impl DecCoins {
    /// The empty (zero) amount.
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Build from (denom, amount) pairs. Zero entries are dropped and
    /// duplicate denoms are summed.
    ///
    /// # Errors
    /// Returns `AccrueError::InvalidAmount` for a negative amount or an empty denom.
    pub fn from_pairs<S, I>(pairs: I) -> Result<Self, AccrueError>
    where
        S: Into<String>,
        I: IntoIterator<Item = (S, Dec)>,
    {
        let mut coins = DecCoins::new();
        for (denom, amount) in pairs {
            let denom = denom.into();
            if denom.is_empty() {
                return Err(AccrueError::InvalidAmount("empty denom".to_string()));
            }
            if amount.is_negative() {
                return Err(AccrueError::InvalidAmount(format!(
                    "negative amount {}{}",
                    amount, denom
                )));
            }
            let total = coins.amount_of(&denom).checked_add(amount)?;
            coins.put(denom, total);
        }
        Ok(coins)
    }

    /// A single-denom amount.
    pub fn single(denom: &str, amount: Dec) -> Result<Self, AccrueError> {
        Self::from_pairs([(denom, amount)])
    }

    fn put(&mut self, denom: String, amount: Dec) {
        if amount.is_zero() {
            self.0.remove(&denom);
        } else {
            self.0.insert(denom, amount);
        }
    }

    pub fn amount_of(&self, denom: &str) -> Dec {
        self.0.get(denom).copied().unwrap_or_else(Dec::zero)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Dec)> {
        self.0.iter().map(|(denom, amount)| (denom.as_str(), *amount))
    }

    pub fn checked_add(&self, other: &DecCoins) -> Result<DecCoins, AccrueError> {
        let mut out = self.clone();
        for (denom, amount) in other.iter() {
            let total = out.amount_of(denom).checked_add(amount)?;
            out.put(denom.to_string(), total);
        }
        Ok(out)
    }

    /// Subtract `other`, failing if any denom would go negative.
    ///
    /// # Errors
    /// Returns `AccrueError::InternalConsistency` on a negative result; the
    /// ledger never holds negative balances.
    pub fn checked_sub(&self, other: &DecCoins) -> Result<DecCoins, AccrueError> {
        let mut out = self.clone();
        for (denom, amount) in other.iter() {
            let rest = out.amount_of(denom).checked_sub(amount)?;
            if rest.is_negative() {
                return Err(AccrueError::InternalConsistency(format!(
                    "subtracting {} from {} yields a negative {} balance",
                    other, self, denom
                )));
            }
            out.put(denom.to_string(), rest);
        }
        Ok(out)
    }

    /// Whether every denom of `other` is covered by `self`.
    pub fn is_all_gte(&self, other: &DecCoins) -> bool {
        other.iter().all(|(denom, amount)| self.amount_of(denom) >= amount)
    }

    fn map_amounts<F>(&self, mut f: F) -> Result<DecCoins, AccrueError>
    where
        F: FnMut(Dec) -> Result<Dec, AccrueError>,
    {
        let mut out = DecCoins::new();
        for (denom, amount) in self.iter() {
            let value = f(amount)?;
            if value.is_negative() {
                return Err(AccrueError::InternalConsistency(format!(
                    "scaling {}{} produced negative {}",
                    amount, denom, value
                )));
            }
            out.put(denom.to_string(), value);
        }
        Ok(out)
    }

    /// Multiply every amount by `d`, rounding half-to-even.
    pub fn mul_dec(&self, d: Dec) -> Result<DecCoins, AccrueError> {
        self.map_amounts(|a| a.checked_mul(d))
    }

    /// Multiply every amount by `d`, truncating.
    pub fn mul_dec_truncate(&self, d: Dec) -> Result<DecCoins, AccrueError> {
        self.map_amounts(|a| a.mul_truncate(d))
    }

    /// Divide every amount by `d`, truncating.
    pub fn quo_dec_truncate(&self, d: Dec) -> Result<DecCoins, AccrueError> {
        self.map_amounts(|a| a.quo_truncate(d))
    }

    /// Per-denom minimum of `self` and `other`; denoms missing from either side drop out.
    pub fn intersect(&self, other: &DecCoins) -> DecCoins {
        let mut out = DecCoins::new();
        for (denom, amount) in self.iter() {
            let min = amount.min(other.amount_of(denom));
            out.put(denom.to_string(), min);
        }
        out
    }

    /// Split into the integral coins and the fractional remainder.
    pub fn truncate_decimal(&self) -> Result<(Coins, DecCoins), AccrueError> {
        let mut whole = Coins::new();
        let mut remainder = DecCoins::new();
        for (denom, amount) in self.iter() {
            let integral = amount.truncate();
            whole.put(denom.to_string(), integral.truncate_int()?);
            remainder.put(denom.to_string(), amount.checked_sub(integral)?);
        }
        Ok((whole, remainder))
    }
}

impl TryFrom<BTreeMap<String, Dec>> for DecCoins {
    type Error = AccrueError;

    fn try_from(map: BTreeMap<String, Dec>) -> Result<Self, Self::Error> {
        DecCoins::from_pairs(map)
    }
}

impl From<DecCoins> for BTreeMap<String, Dec> {
    fn from(coins: DecCoins) -> Self {
        coins.0
    }
}

impl fmt::Display for DecCoins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .iter()
            .map(|(denom, amount)| format!("{}{}", amount, denom))
            .collect();
        write!(f, "{}", parts.join(","))
    }
}

/// Integral amounts keyed by denom, as moved by the transfer collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, u128>", into = "BTreeMap<String, u128>")]
pub struct Coins(BTreeMap<String, u128>);

impl Coins {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn single(denom: &str, amount: u128) -> Self {
        let mut coins = Coins::new();
        coins.put(denom.to_string(), amount);
        coins
    }

    fn put(&mut self, denom: String, amount: u128) {
        if amount == 0 {
            self.0.remove(&denom);
        } else {
            self.0.insert(denom, amount);
        }
    }

    pub fn amount_of(&self, denom: &str) -> u128 {
        self.0.get(denom).copied().unwrap_or(0)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u128)> {
        self.0.iter().map(|(denom, amount)| (denom.as_str(), *amount))
    }

    pub fn checked_add(&self, other: &Coins) -> Result<Coins, AccrueError> {
        let mut out = self.clone();
        for (denom, amount) in other.iter() {
            let total = out.amount_of(denom).checked_add(amount).ok_or_else(|| {
                AccrueError::InternalConsistency(format!("coin overflow adding {}", other))
            })?;
            out.put(denom.to_string(), total);
        }
        Ok(out)
    }

    /// Subtract `other`; `None` if any denom is insufficient.
    pub fn checked_sub(&self, other: &Coins) -> Option<Coins> {
        let mut out = self.clone();
        for (denom, amount) in other.iter() {
            let rest = out.amount_of(denom).checked_sub(amount)?;
            out.put(denom.to_string(), rest);
        }
        Some(out)
    }

    pub fn is_all_gte(&self, other: &Coins) -> bool {
        other.iter().all(|(denom, amount)| self.amount_of(denom) >= amount)
    }

    pub fn to_dec_coins(&self) -> Result<DecCoins, AccrueError> {
        let mut pairs = Vec::with_capacity(self.0.len());
        for (denom, amount) in self.iter() {
            pairs.push((denom.to_string(), Dec::from_int(amount)?));
        }
        DecCoins::from_pairs(pairs)
    }
}

impl From<BTreeMap<String, u128>> for Coins {
    fn from(map: BTreeMap<String, u128>) -> Self {
        let mut coins = Coins::new();
        for (denom, amount) in map {
            coins.put(denom, amount);
        }
        coins
    }
}

impl From<Coins> for BTreeMap<String, u128> {
    fn from(coins: Coins) -> Self {
        coins.0
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .iter()
            .map(|(denom, amount)| format!("{}{}", amount, denom))
            .collect();
        write!(f, "{}", parts.join(","))
    }
}
