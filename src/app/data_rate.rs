//! Bit rates and their conversion into inter-packet gaps.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::GeneratorError;
use crate::sim::SimTime;

const NANOS_PER_SEC: u128 = 1_000_000_000;

/// A data rate in bits per second.
///
/// Parses the usual unit spellings: `"500kbps"`, `"2Mbps"`, `"10Mb/s"`,
/// `"1Gbps"`, `"1.5Mbps"`, byte units (`"125kBps"`, `"1MB/s"`) and bare
/// numbers, which are bits per second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DataRate(u64);

impl DataRate {
    pub const fn from_bps(bps: u64) -> Self {
        Self(bps)
    }

    pub const fn from_kbps(kbps: u64) -> Self {
        Self(kbps.saturating_mul(1_000))
    }

    pub const fn from_mbps(mbps: u64) -> Self {
        Self(mbps.saturating_mul(1_000_000))
    }

    /// Fails on negative, NaN or infinite input; rounds to the nearest bit per second.
    pub fn from_bps_f64(bps: f64) -> Result<Self, GeneratorError> {
        if !bps.is_finite() {
            return Err(GeneratorError::InvalidConfig(format!("rate {} is not finite", bps)));
        }
        if bps < 0.0 {
            return Err(GeneratorError::InvalidConfig(format!("rate {} bps is negative", bps)));
        }
        let rounded = bps.round();
        if rounded >= u64::MAX as f64 {
            return Err(GeneratorError::InvalidConfig(format!("rate {} bps is out of range", bps)));
        }
        Ok(Self(rounded as u64))
    }

    pub const fn bps(self) -> u64 {
        self.0
    }

    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Time needed to put `bytes` on the wire at this rate, rounded up to
    /// the next nanosecond.
    ///
    /// Returns `None` for a zero rate. For non-zero rates and a non-zero
    /// size the result is at least one nanosecond.
    pub fn transmit_time(self, bytes: u32) -> Option<SimTime> {
        if self.0 == 0 {
            return None;
        }
        let bits = u128::from(bytes) * 8;
        let rate = u128::from(self.0);
        let nanos = (bits * NANOS_PER_SEC).div_ceil(rate);
        Some(SimTime::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX)))
    }
}

fn unit_multiplier(unit: &str) -> Option<f64> {
    let multiplier = match unit {
        "" | "bps" | "b/s" => 1.0,
        "kbps" | "Kbps" | "kb/s" | "Kb/s" => 1e3,
        "Mbps" | "Mb/s" => 1e6,
        "Gbps" | "Gb/s" => 1e9,
        "Bps" | "B/s" => 8.0,
        "kBps" | "KBps" | "kB/s" | "KB/s" => 8e3,
        "MBps" | "MB/s" => 8e6,
        "GBps" | "GB/s" => 8e9,
        _ => return None,
    };
    Some(multiplier)
}

impl FromStr for DataRate {
    type Err = GeneratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let split = s
            .find(|c: char| !(c.is_ascii_digit() || matches!(c, '.' | '-' | '+')))
            .unwrap_or(s.len());
        let (number, unit) = s.split_at(split);

        if number.is_empty() {
            return Err(GeneratorError::InvalidConfig(format!("rate '{}' has no numeric value", s)));
        }
        let value: f64 = number
            .parse()
            .map_err(|_| GeneratorError::InvalidConfig(format!("rate '{}' has an invalid number", s)))?;
        let multiplier = unit_multiplier(unit.trim())
            .ok_or_else(|| GeneratorError::InvalidConfig(format!("rate '{}' has an unknown unit", s)))?;

        Self::from_bps_f64(value * multiplier)
    }
}

impl TryFrom<String> for DataRate {
    type Error = GeneratorError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DataRate> for String {
    fn from(rate: DataRate) -> Self {
        rate.to_string()
    }
}

impl fmt::Display for DataRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bps = self.0;
        if bps != 0 && bps % 1_000_000_000 == 0 {
            write!(f, "{}Gbps", bps / 1_000_000_000)
        } else if bps != 0 && bps % 1_000_000 == 0 {
            write!(f, "{}Mbps", bps / 1_000_000)
        } else if bps != 0 && bps % 1_000 == 0 {
            write!(f, "{}kbps", bps / 1_000)
        } else {
            write!(f, "{}bps", bps)
        }
    }
}
