// Copyright (c) 2024 Gridstake Developers

//! Monetary units and exact fractional arithmetic.
//!
//! Every value that ends up serialized in a block is an [`Amount`] in the
//! smallest unit ("halfords"). Fractions of a reward are expressed as an
//! [`Allocation`] in basis points so that splitting a reward never goes
//! through floating point.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Value in the smallest monetary unit.
pub type Amount = i64;

/// One whole coin.
pub const COIN: Amount = 100_000_000;

/// One hundredth of a coin. Outputs below this are dust.
pub const CENT: Amount = 1_000_000;

/// Upper bound on any single amount.
pub const MAX_MONEY: Amount = 2_000_000_000 * COIN;

/// Fee per started kilobyte charged to transactions entering a block.
pub const MIN_TX_FEE: Amount = 100_000;

/// Basis points representing a whole (100%).
pub const BASIS_POINTS: u32 = 10_000;

pub fn money_range(value: Amount) -> bool {
    (0..=MAX_MONEY).contains(&value)
}

/// Render an amount as a decimal coin value with eight places.
pub fn format_money(value: Amount) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.unsigned_abs();
    let coin = COIN as u64;
    format!("{}{}.{:08}", sign, abs / coin, abs % coin)
}

/// A fraction of a reward in basis points (10 000 = 100%).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Allocation(u32);

impl Allocation {
    pub const ZERO: Allocation = Allocation(0);
    pub const WHOLE: Allocation = Allocation(BASIS_POINTS);

    pub fn from_basis_points(bps: u32) -> Self {
        Allocation(bps)
    }

    pub fn basis_points(self) -> u32 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_add(self, other: Allocation) -> Option<Allocation> {
        self.0.checked_add(other.0).map(Allocation)
    }

    /// `value * fraction`, rounded toward zero.
    pub fn apply(self, value: Amount) -> Amount {
        ((value as i128 * self.0 as i128) / BASIS_POINTS as i128) as Amount
    }

    /// Parse a percentage such as `"33"`, `"12.5"` or `"0.25"`.
    ///
    /// At most two decimal places are accepted, which is the resolution of a
    /// basis point. Returns `None` for anything that is not a plain
    /// non-negative decimal.
    pub fn parse_percent(s: &str) -> Option<Self> {
        let s = s.trim();
        let (whole, frac) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if whole.is_empty() && frac.is_empty() {
            return None;
        }
        if frac.len() > 2
            || !whole.chars().all(|c| c.is_ascii_digit())
            || !frac.chars().all(|c| c.is_ascii_digit())
        {
            return None;
        }
        let whole: u32 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
        let mut frac_bps: u32 = if frac.is_empty() { 0 } else { frac.parse().ok()? };
        if frac.len() == 1 {
            frac_bps *= 10;
        }
        whole.checked_mul(100)?.checked_add(frac_bps).map(Allocation)
    }
}

impl fmt::Display for Allocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}%", self.0 / 100, self.0 % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(COIN), "1.00000000");
        assert_eq!(format_money(CENT + 5), "0.01000005");
        assert_eq!(format_money(-COIN / 2), "-0.50000000");
    }

    #[test]
    fn test_money_range() {
        assert!(money_range(0));
        assert!(money_range(MAX_MONEY));
        assert!(!money_range(-1));
        assert!(!money_range(MAX_MONEY + 1));
    }

    #[test]
    fn test_parse_percent() {
        assert_eq!(Allocation::parse_percent("50"), Some(Allocation(5_000)));
        assert_eq!(Allocation::parse_percent("12.5"), Some(Allocation(1_250)));
        assert_eq!(Allocation::parse_percent("0.25"), Some(Allocation(25)));
        assert_eq!(Allocation::parse_percent(" 100 "), Some(Allocation::WHOLE));
        assert_eq!(Allocation::parse_percent("1.234"), None);
        assert_eq!(Allocation::parse_percent("-5"), None);
        assert_eq!(Allocation::parse_percent("abc"), None);
        assert_eq!(Allocation::parse_percent(""), None);
    }

    #[test]
    fn test_apply_rounds_down() {
        let third = Allocation::from_basis_points(3_333);
        assert_eq!(third.apply(100), 33);
        assert_eq!(Allocation::WHOLE.apply(12_345), 12_345);
        assert_eq!(Allocation::ZERO.apply(12_345), 0);
    }

    #[test]
    fn test_display() {
        assert_eq!(Allocation::from_basis_points(3_350).to_string(), "33.50%");
    }
}
