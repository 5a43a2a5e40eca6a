// crates/accrue-core/src/dec.rs
//
// Deterministic fixed-point decimal used for every amount, rate, and ratio.
//
// A `Dec` is a sign and a 256-bit magnitude scaled by 10^18, so it carries
// exactly PRECISION (18) fractional digits. Products and quotients are
// computed in 512 bits and only then cut back to 18 digits, either toward
// zero (the `*_truncate` operations), away from zero (`quo_round_up`), or
// with banker's rounding (`checked_mul`, `checked_quo`). Nothing is rounded
// before that final step, and no floating point is involved anywhere.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use primitive_types::{U256, U512};
use serde::{Deserialize, Serialize};

use crate::error::AccrueError;

/// Number of fractional decimal digits carried by every `Dec`.
pub const PRECISION: u32 = 18;

/// 10^PRECISION, the raw value of one.
const ONE_RAW: u64 = 1_000_000_000_000_000_000;

/// Signed fixed-point decimal with 18 fractional digits.
///
/// A zero magnitude is never negative, so derived equality and hashing are
/// value equality.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Dec {
    negative: bool,
    raw: U256,
}

#[derive(Debug, Clone, Copy)]
enum Rounding {
    Truncate,
    HalfEven,
    Up,
}

fn scale() -> U256 {
    U256::from(ONE_RAW)
}

/// `n / d` on magnitudes, rounded per `mode`. `d` must be non-zero.
fn round_div(n: U512, d: U512, mode: Rounding) -> U512 {
    let (q, r) = n.div_mod(d);
    if r.is_zero() {
        return q;
    }
    let bump = match mode {
        Rounding::Truncate => false,
        Rounding::Up => true,
        // r < d <= 2^256, so doubling r cannot overflow
        Rounding::HalfEven => match (r + r).cmp(&d) {
            Ordering::Less => false,
            Ordering::Greater => true,
            Ordering::Equal => q.bit(0),
        },
    };
    if bump {
        q + U512::one()
    } else {
        q
    }
}

fn overflow(op: &str, a: Dec, b: Dec) -> AccrueError {
    AccrueError::InternalConsistency(format!("decimal overflow in {}({}, {})", op, a, b))
}

fn invalid(s: &str) -> AccrueError {
    AccrueError::InvalidAmount(format!("invalid decimal {:?}", s))
}

impl Dec {
    const fn from_parts(negative: bool, raw: U256) -> Self {
        Dec { negative, raw }
    }

    fn signed(negative: bool, raw: U256) -> Self {
        Dec {
            negative: negative && !raw.is_zero(),
            raw,
        }
    }

    pub const fn zero() -> Self {
        Dec::from_parts(false, U256([0, 0, 0, 0]))
    }

    pub const fn one() -> Self {
        Dec::from_parts(false, U256([ONE_RAW, 0, 0, 0]))
    }

    /// The smallest positive representable value, 10^-18.
    pub const fn smallest() -> Self {
        Dec::from_parts(false, U256([1, 0, 0, 0]))
    }

    /// `pct / 100`, e.g. `percent(2)` is 0.02.
    pub fn percent(pct: u32) -> Self {
        Dec::from_parts(false, U256::from(pct) * U256::exp10(16))
    }

    /// Build a decimal from an integer token amount.
    pub fn from_int(value: u128) -> Result<Self, AccrueError> {
        U256::from(value)
            .checked_mul(scale())
            .map(|raw| Dec::from_parts(false, raw))
            .ok_or_else(|| AccrueError::InvalidAmount(format!("integer {} out of range", value)))
    }

    /// `value * 10^-prec`, e.g. `new_with_prec(5, 1)` is 0.5.
    pub fn new_with_prec(value: i64, prec: u32) -> Result<Self, AccrueError> {
        if prec > PRECISION {
            return Err(AccrueError::InvalidAmount(format!(
                "precision {} exceeds the maximum of {}",
                prec, PRECISION
            )));
        }
        let raw = U256::from(value.unsigned_abs()) * U256::exp10((PRECISION - prec) as usize);
        Ok(Dec::signed(value < 0, raw))
    }

    pub fn is_zero(&self) -> bool {
        self.raw.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    pub fn is_positive(&self) -> bool {
        !self.negative && !self.raw.is_zero()
    }

    fn neg(self) -> Dec {
        Dec::signed(!self.negative, self.raw)
    }

    pub fn checked_add(self, rhs: Dec) -> Result<Dec, AccrueError> {
        if self.negative == rhs.negative {
            return self
                .raw
                .checked_add(rhs.raw)
                .map(|raw| Dec::signed(self.negative, raw))
                .ok_or_else(|| overflow("add", self, rhs));
        }
        Ok(if self.raw >= rhs.raw {
            Dec::signed(self.negative, self.raw - rhs.raw)
        } else {
            Dec::signed(rhs.negative, rhs.raw - self.raw)
        })
    }

    pub fn checked_sub(self, rhs: Dec) -> Result<Dec, AccrueError> {
        self.checked_add(rhs.neg())
            .map_err(|_| overflow("sub", self, rhs))
    }

    fn mul_with(self, rhs: Dec, mode: Rounding, op: &str) -> Result<Dec, AccrueError> {
        let product = self.raw.full_mul(rhs.raw);
        let raw = round_div(product, U512::from(scale()), mode);
        U256::try_from(raw)
            .map(|raw| Dec::signed(self.negative != rhs.negative, raw))
            .map_err(|_| overflow(op, self, rhs))
    }

    fn quo_with(self, rhs: Dec, mode: Rounding, op: &str) -> Result<Dec, AccrueError> {
        if rhs.is_zero() {
            return Err(AccrueError::InternalConsistency(format!(
                "division of {} by zero",
                self
            )));
        }
        let numerator = self.raw.full_mul(scale());
        let raw = round_div(numerator, U512::from(rhs.raw), mode);
        U256::try_from(raw)
            .map(|raw| Dec::signed(self.negative != rhs.negative, raw))
            .map_err(|_| overflow(op, self, rhs))
    }

    /// Multiply, rounding half-to-even at the 18th digit.
    pub fn checked_mul(self, rhs: Dec) -> Result<Dec, AccrueError> {
        self.mul_with(rhs, Rounding::HalfEven, "mul")
    }

    /// Multiply, truncating toward zero at the 18th digit.
    pub fn mul_truncate(self, rhs: Dec) -> Result<Dec, AccrueError> {
        self.mul_with(rhs, Rounding::Truncate, "mul_truncate")
    }

    /// Divide, rounding half-to-even at the 18th digit.
    pub fn checked_quo(self, rhs: Dec) -> Result<Dec, AccrueError> {
        self.quo_with(rhs, Rounding::HalfEven, "quo")
    }

    /// Divide, truncating toward zero at the 18th digit.
    pub fn quo_truncate(self, rhs: Dec) -> Result<Dec, AccrueError> {
        self.quo_with(rhs, Rounding::Truncate, "quo_truncate")
    }

    /// Divide, rounding away from zero at the 18th digit.
    pub fn quo_round_up(self, rhs: Dec) -> Result<Dec, AccrueError> {
        self.quo_with(rhs, Rounding::Up, "quo_round_up")
    }

    /// Integral part of a non-negative decimal.
    pub fn truncate_int(self) -> Result<u128, AccrueError> {
        if self.is_negative() {
            return Err(AccrueError::InternalConsistency(format!(
                "cannot truncate negative amount {} to an integer",
                self
            )));
        }
        let int = self.raw / scale();
        if int.bits() > 128 {
            return Err(AccrueError::InternalConsistency(format!(
                "amount {} does not fit in u128",
                self
            )));
        }
        Ok(int.low_u128())
    }

    /// Integral part as a decimal (toward zero).
    pub fn truncate(self) -> Dec {
        Dec::signed(self.negative, (self.raw / scale()) * scale())
    }
}

impl Ord for Dec {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.negative, other.negative) {
            (false, false) => self.raw.cmp(&other.raw),
            (true, true) => other.raw.cmp(&self.raw),
            (false, true) => Ordering::Greater,
            (true, false) => Ordering::Less,
        }
    }
}

impl PartialOrd for Dec {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl From<u64> for Dec {
    fn from(value: u64) -> Self {
        Dec::from_parts(false, U256::from(value) * scale())
    }
}

impl FromStr for Dec {
    type Err = AccrueError;

    /// Parses `[-]digits[.digits]` with at most 18 significant fractional
    /// digits; trailing fractional zeros are ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim();
        let (negative, body) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let (int_part, frac_part) = match body.split_once('.') {
            Some((i, f)) => (i, f.trim_end_matches('0')),
            None => (body, ""),
        };
        let is_digits = |p: &str| p.bytes().all(|b| b.is_ascii_digit());
        if int_part.is_empty() || !is_digits(int_part) || !is_digits(frac_part) {
            return Err(invalid(s));
        }
        if frac_part.len() > PRECISION as usize {
            return Err(AccrueError::InvalidAmount(format!(
                "{} has more than {} fractional digits",
                s, PRECISION
            )));
        }

        let int = U256::from_dec_str(int_part).map_err(|_| invalid(s))?;
        let frac = if frac_part.is_empty() {
            U256::zero()
        } else {
            U256::from_dec_str(frac_part).map_err(|_| invalid(s))?
                * U256::exp10(PRECISION as usize - frac_part.len())
        };
        let raw = int
            .checked_mul(scale())
            .and_then(|v| v.checked_add(frac))
            .ok_or_else(|| invalid(s))?;
        Ok(Dec::signed(negative, raw))
    }
}

impl TryFrom<String> for Dec {
    type Error = AccrueError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Dec> for String {
    fn from(value: Dec) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Dec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (int, frac) = self.raw.div_mod(scale());
        if self.negative {
            write!(f, "-")?;
        }
        if frac.is_zero() {
            write!(f, "{}", int)
        } else {
            let digits = format!("{:018}", frac.low_u64());
            write!(f, "{}.{}", int, digits.trim_end_matches('0'))
        }
    }
}

impl fmt::Debug for Dec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dec({})", self)
    }
}
