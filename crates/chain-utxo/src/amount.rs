//! Decimal amounts and fee rates in integer base units.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::UtxoError;

/// Direction to round when a decimal amount has more fractional digits than
/// the chain's base unit can represent. Amounts round down, fees round up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rounding {
    Down,
    Up,
}

/// Convert a decimal string such as `"0.0015"` into base units.
pub fn to_base_units(text: &str, decimals: u32, rounding: Rounding) -> Result<u64, UtxoError> {
    let invalid = || UtxoError::TransactionBuildError(format!("invalid amount {text:?}"));
    let overflow = || UtxoError::TransactionBuildError(format!("amount {text:?} overflows"));

    let text = text.trim();
    let (whole, fraction) = match text.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (text, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }
    if !whole.bytes().all(|b| b.is_ascii_digit()) || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(invalid());
    }

    let scale = 10u64.checked_pow(decimals).ok_or_else(overflow)?;
    let whole_units = if whole.is_empty() {
        0
    } else {
        whole
            .parse::<u64>()
            .map_err(|_| overflow())?
            .checked_mul(scale)
            .ok_or_else(overflow)?
    };

    let kept = fraction.len().min(decimals as usize);
    let (kept_digits, dropped_digits) = fraction.split_at(kept);
    let mut fraction_units: u64 = 0;
    for b in kept_digits.bytes() {
        fraction_units = fraction_units * 10 + u64::from(b - b'0');
    }
    for _ in kept..decimals as usize {
        fraction_units *= 10;
    }
    if rounding == Rounding::Up && dropped_digits.bytes().any(|b| b != b'0') {
        fraction_units += 1;
    }

    whole_units.checked_add(fraction_units).ok_or_else(overflow)
}

/// Render base units as a decimal string without trailing zeros.
pub fn from_base_units(units: u64, decimals: u32) -> String {
    if decimals == 0 {
        return units.to_string();
    }
    let scale = 10u128.pow(decimals);
    let whole = u128::from(units) / scale;
    let fraction = u128::from(units) % scale;
    if fraction == 0 {
        return whole.to_string();
    }
    let digits = format!("{fraction:0width$}", width = decimals as usize);
    format!("{whole}.{}", digits.trim_end_matches('0'))
}

/// Fee rate in base units per 1000 bytes.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FeeRate(u64);

impl FeeRate {
    pub const ZERO: FeeRate = FeeRate(0);

    pub const fn from_per_kvb(units: u64) -> Self {
        Self(units)
    }

    pub const fn from_per_byte(units: u64) -> Self {
        Self(units.saturating_mul(1000))
    }

    /// Parse a decimal per-kilobyte rate (e.g. `"0.0001"` coins/kB), rounding up.
    pub fn from_decimal_per_kvb(text: &str, decimals: u32) -> Result<Self, UtxoError> {
        to_base_units(text, decimals, Rounding::Up).map(Self)
    }

    pub const fn per_kvb(self) -> u64 {
        self.0
    }

    /// Fee for `bytes` at this rate, rounded up to the next base unit.
    pub fn fee_for_size(self, bytes: u64) -> u64 {
        let fee = (u128::from(bytes) * u128::from(self.0)).div_ceil(1000);
        u64::try_from(fee).unwrap_or(u64::MAX)
    }
}

impl fmt::Display for FeeRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/kvB", self.0)
    }
}
