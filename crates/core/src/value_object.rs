//! Value object trait: equality by value, not identity.

use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde::{Deserialize, Serialize};

use crate::error::{DomainError, DomainResult};

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. To "modify" one,
/// build a new one.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}

/// Decimal places kept for quantities; finer fractions are rounded away.
pub const QUANTITY_SCALE: u32 = 6;

/// A strictly positive, finite amount of an item.
///
/// Quantities are real numbers (items can be measured in kg, metres, ...).
/// They are held as a `Decimal` rounded to [`QUANTITY_SCALE`] places, so
/// balance arithmetic is exact: `0.1 + 0.2 - 0.3` is zero, not `5.5e-17`.
/// Construction is the only validation point: once a `Quantity` exists it is
/// guaranteed `> 0`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quantity(Decimal);

impl Quantity {
    pub fn new(value: f64) -> DomainResult<Self> {
        if !value.is_finite() {
            return Err(DomainError::validation("quantity must be a finite number"));
        }
        let amount = Decimal::from_f64(value)
            .ok_or_else(|| DomainError::validation(format!("quantity {value} is out of range")))?;
        Self::from_decimal(amount)
    }

    pub fn from_decimal(amount: Decimal) -> DomainResult<Self> {
        let amount = amount.round_dp(QUANTITY_SCALE).normalize();
        if amount <= Decimal::ZERO {
            return Err(DomainError::validation(format!(
                "quantity must be greater than zero (got {amount})"
            )));
        }
        Ok(Self(amount))
    }

    pub fn amount(self) -> Decimal {
        self.0
    }

    /// Lossy view for logs and numeric APIs.
    pub fn value(self) -> f64 {
        self.0.to_f64().unwrap_or(f64::MAX)
    }

    /// `self + other`; fails when the sum leaves the representable range.
    pub fn checked_add(self, other: Quantity) -> DomainResult<Self> {
        let sum = self
            .0
            .checked_add(other.0)
            .ok_or_else(|| DomainError::validation(format!("quantity overflow adding {} to {}", other, self)))?;
        Self::from_decimal(sum)
    }

    /// `self - other`, or `None` when nothing (or less than nothing) is left.
    pub fn checked_sub(self, other: Quantity) -> Option<Self> {
        let left = self.0.checked_sub(other.0)?;
        (left > Decimal::ZERO).then_some(Self(left))
    }
}

impl ValueObject for Quantity {}

impl core::fmt::Display for Quantity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl TryFrom<f64> for Quantity {
    type Error = DomainError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl Serialize for Quantity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_f64(self.value())
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = f64::deserialize(deserializer)?;
        Quantity::new(raw).map_err(serde::de::Error::custom)
    }
}
