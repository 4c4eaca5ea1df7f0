//! Bandwidth: a non-negative rate in bits per second.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// A non-negative bandwidth, stored as whole bits per second.
///
/// Parses from strings of the form `<number><unit>` where `unit` is one of
/// `bps`, `kbps`, `mbps`, `gbps` (case-insensitive, decimal multipliers of
/// 10^3). Formats back using the largest unit that keeps the value >= 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Bandwidth(u64);

const UNITS: [(&str, u64); 4] = [
    ("bps", 1),
    ("kbps", 1_000),
    ("mbps", 1_000_000),
    ("gbps", 1_000_000_000),
];

impl Bandwidth {
    /// The zero bandwidth.
    pub const ZERO: Bandwidth = Bandwidth(0);

    /// Construct a bandwidth from a raw bits-per-second value.
    pub const fn from_bps(bps: u64) -> Self {
        Bandwidth(bps)
    }

    /// The underlying bits-per-second value.
    pub const fn as_bps(self) -> u64 {
        self.0
    }

    /// Parse a bandwidth string such as `"100mbps"` or `"1.5 gbps"`.
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidFormat("empty bandwidth".into()));
        }

        let split = s
            .find(|c: char| !c.is_ascii_digit() && c != '.')
            .ok_or_else(|| Error::InvalidFormat(s.to_string()))?;
        let (num_part, unit_part) = s.split_at(split);
        let unit_part = unit_part.trim().to_ascii_lowercase();

        if num_part.is_empty() {
            return Err(Error::InvalidFormat(s.to_string()));
        }
        let num: f64 = num_part
            .parse()
            .map_err(|_| Error::InvalidFormat(s.to_string()))?;
        if num < 0.0 {
            return Err(Error::OutOfRange(s.to_string()));
        }

        let multiplier = UNITS
            .iter()
            .find(|(name, _)| *name == unit_part)
            .map(|(_, m)| *m)
            .ok_or_else(|| Error::InvalidUnit(unit_part.clone()))?;

        Ok(Bandwidth((num * multiplier as f64).round() as u64))
    }

    /// Parse a bandwidth string, panicking on failure.
    ///
    /// Builder chains (external to this crate) call this so they can stay
    /// infallible at the call site; loaders that must surface parse errors
    /// use [`Bandwidth::parse`] instead.
    pub fn must_parse(s: &str) -> Self {
        Self::parse(s).unwrap_or_else(|e| panic!("invalid bandwidth {s:?}: {e}"))
    }

    /// Saturating subtraction.
    pub const fn saturating_sub(self, other: Bandwidth) -> Bandwidth {
        Bandwidth(self.0.saturating_sub(other.0))
    }

    /// Saturating addition.
    pub const fn saturating_add(self, other: Bandwidth) -> Bandwidth {
        Bandwidth(self.0.saturating_add(other.0))
    }

    /// Multiply by a scalar, rounding to the nearest bit per second.
    pub fn scale(self, factor: f64) -> Bandwidth {
        Bandwidth((self.0 as f64 * factor).round().max(0.0) as u64)
    }

    /// `self` as a percentage of `whole`, or `0.0` if `whole` is zero.
    pub fn percent_of(self, whole: Bandwidth) -> f64 {
        if whole.0 == 0 {
            0.0
        } else {
            self.0 as f64 / whole.0 as f64 * 100.0
        }
    }
}

impl fmt::Display for Bandwidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut chosen = UNITS[0];
        for unit in UNITS {
            if self.0 as f64 / unit.1 as f64 >= 1.0 {
                chosen = unit;
            }
        }
        let (name, mult) = chosen;
        let value = self.0 as f64 / mult as f64;
        if value.fract() == 0.0 {
            write!(f, "{}{}", value as u64, name)
        } else {
            write!(f, "{value}{name}")
        }
    }
}

impl FromStr for Bandwidth {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Bandwidth::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_each_unit() {
        assert_eq!(Bandwidth::parse("1000bps").unwrap().as_bps(), 1000);
        assert_eq!(Bandwidth::parse("1kbps").unwrap().as_bps(), 1_000);
        assert_eq!(Bandwidth::parse("100mbps").unwrap().as_bps(), 100_000_000);
        assert_eq!(Bandwidth::parse("1gbps").unwrap().as_bps(), 1_000_000_000);
        assert_eq!(Bandwidth::parse("1.5MBPS").unwrap().as_bps(), 1_500_000);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(Bandwidth::parse("").is_err());
        assert!(Bandwidth::parse("100").is_err());
        assert!(Bandwidth::parse("100xyz").is_err());
    }

    #[test]
    fn zero_is_representable_and_least() {
        let zero = Bandwidth::parse("0bps").unwrap();
        assert_eq!(zero, Bandwidth::ZERO);
        assert!(zero < Bandwidth::parse("1bps").unwrap());
    }

    #[test]
    fn subtraction_saturates() {
        let a = Bandwidth::from_bps(10);
        let b = Bandwidth::from_bps(20);
        assert_eq!(a.saturating_sub(b), Bandwidth::ZERO);
    }

    #[test]
    fn display_picks_largest_unit() {
        assert_eq!(Bandwidth::from_bps(100_000_000).to_string(), "100mbps");
        assert_eq!(Bandwidth::from_bps(1_500_000).to_string(), "1.5mbps");
        assert_eq!(Bandwidth::from_bps(500).to_string(), "500bps");
    }

    #[test]
    fn round_trips_through_format() {
        for s in ["0bps", "100mbps", "1gbps", "1500bps"] {
            let b = Bandwidth::parse(s).unwrap();
            let formatted = b.to_string();
            assert_eq!(Bandwidth::parse(&formatted).unwrap(), b);
        }
    }
}
