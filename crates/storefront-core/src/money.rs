//! # Money Module
//!
//! Integer minor units. Percentages floor:
//!
//! ```text
//! price 100000, 10% off  → 100000 * 90 / 100 = 90000
//! price    999, 15% off  →    999 * 85 / 100 = 849   (849.15 floored)
//! ```
//!
//! No floating point anywhere, so a price snapshot recomputed later is
//! identical to the one stored. Multiplication and addition are checked:
//! an amount that does not fit in `i64` is an error, never a wrapped value.
//!
//! ## Usage
//! ```rust
//! use storefront_core::{Money, Percent};
//!
//! let price = Money::from_minor(1099);
//! let doubled = price.checked_mul(2).unwrap();
//! assert_eq!(doubled.minor(), 2198);
//! assert!(Money::from_minor(i64::MAX).checked_mul(2).is_none());
//!
//! let ten_percent = price.percent(Percent::new(10).unwrap());
//! assert_eq!(ten_percent.minor(), 109);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Sub;

use crate::types::Percent;

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit.
///
/// ## Design Decisions
/// - **i64 (signed)**: subtraction results can be checked instead of wrapping
/// - **Serialized transparently**: JSON carries a plain integer
///
/// ## Where Money Flows
/// ```text
/// Variant.base_price ──► effective_price ──► OrderLine.unit_price_at_purchase
///                                                   │
///                                                   ▼ × quantity
///                                             OrderLine.line_total
///                                                   │ Σ
///                                                   ▼
///                       subtotal ─► − discount ─► + tax ─► total_price
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units.
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Only a bad subtraction produces one.
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Line total: unit price × quantity, `None` on overflow.
    #[inline]
    pub fn checked_mul(&self, qty: i64) -> Option<Money> {
        self.0.checked_mul(qty).map(Money)
    }

    #[inline]
    pub fn checked_add(&self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    /// Sums amounts, `None` if any partial sum overflows.
    pub fn checked_sum(amounts: impl IntoIterator<Item = Money>) -> Option<Money> {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, m| acc.checked_add(m))
    }

    /// Display-only variant of [`Money::checked_mul`] that clamps at the bounds.
    #[inline]
    pub fn saturating_mul(&self, qty: i64) -> Money {
        Money(self.0.saturating_mul(qty))
    }

    #[inline]
    pub fn saturating_add(&self, other: Money) -> Money {
        Money(self.0.saturating_add(other.0))
    }

    /// Returns `floor(self * percent / 100)`.
    ///
    /// ## Implementation
    /// Widened to i128 so large subtotals cannot overflow, and divided with
    /// `div_euclid` so the result floors even for negative amounts.
    ///
    /// ## Example
    /// ```rust
    /// use storefront_core::{Money, Percent};
    ///
    /// let subtotal = Money::from_minor(180_000);
    /// assert_eq!(subtotal.percent(Percent::new(20).unwrap()).minor(), 36_000);
    ///
    /// // 999 * 15 / 100 = 149.85 → 149
    /// assert_eq!(Money::from_minor(999).percent(Percent::new(15).unwrap()).minor(), 149);
    /// ```
    pub fn percent(&self, percent: Percent) -> Money {
        let scaled = (self.0 as i128 * percent.value() as i128).div_euclid(100);
        Money(scaled as i64)
    }

    /// Converts to a gateway amount with a fixed multiplier (e.g. toman → rial).
    #[inline]
    pub fn checked_scale(&self, multiplier: i64) -> Option<Money> {
        self.0.checked_mul(multiplier).map(Money)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display shows the raw minor-unit amount. Formatting for humans is a
/// frontend concern (currency symbol, grouping, locale).
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

/// Only used for `subtotal - discount`, where the discount never exceeds
/// the subtotal.
impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0 - other.0)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
