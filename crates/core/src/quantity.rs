//! Fractional ingredient quantities with fixed precision.

use core::ops::Neg;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{DomainError, DomainResult};
use crate::value_object::ValueObject;

const SCALE: i64 = 1000;

/// Quantity of an ingredient, kept as thousandths of its unit.
///
/// On the wire a quantity is a decimal number (`1.25` kg); it is rounded to
/// three decimals when parsed so ledger arithmetic stays exact.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quantity(i64);

impl ValueObject for Quantity {}

impl Quantity {
    pub const ZERO: Quantity = Quantity(0);

    pub const fn from_milli(milli: i64) -> Self {
        Self(milli)
    }

    pub const fn from_units(units: i64) -> Self {
        Self(units * SCALE)
    }

    /// Parse a decimal amount, rounding to three decimals.
    pub fn from_decimal(value: f64) -> DomainResult<Self> {
        if !value.is_finite() {
            return Err(DomainError::validation("quantity must be a finite number"));
        }
        let scaled = (value * SCALE as f64).round();
        if scaled.abs() > i64::MAX as f64 / 2.0 {
            return Err(DomainError::validation("quantity out of range"));
        }
        Ok(Self(scaled as i64))
    }

    pub const fn milli(self) -> i64 {
        self.0
    }

    pub fn as_decimal(self) -> f64 {
        self.0 as f64 / SCALE as f64
    }

    pub fn is_positive(self) -> bool {
        self.0 > 0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    pub fn checked_add(self, other: Quantity) -> DomainResult<Quantity> {
        self.0
            .checked_add(other.0)
            .map(Quantity)
            .ok_or_else(|| DomainError::invariant("quantity overflow"))
    }

    pub fn checked_sub(self, other: Quantity) -> DomainResult<Quantity> {
        self.0
            .checked_sub(other.0)
            .map(Quantity)
            .ok_or_else(|| DomainError::invariant("quantity overflow"))
    }

    /// Quantity needed for `count` batches of this amount.
    pub fn times(self, count: i64) -> DomainResult<Quantity> {
        self.0
            .checked_mul(count)
            .map(Quantity)
            .ok_or_else(|| DomainError::invariant("quantity overflow"))
    }
}

impl Neg for Quantity {
    type Output = Quantity;

    fn neg(self) -> Quantity {
        Quantity(-self.0)
    }
}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let scale = SCALE as u64;
        write!(f, "{sign}{}.{:03}", abs / scale, abs % scale)
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_decimal())
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        Quantity::from_decimal(value).map_err(serde::de::Error::custom)
    }
}
