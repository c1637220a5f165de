//! # Pricing Engine
//!
//! `effective = floor(base * (100 - discount) / 100)`
//!
//! The result is frozen onto every order line at purchase time. After that the
//! snapshot is authoritative and this function must never be used to re-derive
//! the price of a historical order.

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::Percent;

/// Effective unit price of a variant after its own discount.
///
/// Note this is not `base - floor(base * discount / 100)`: the two differ by
/// one unit whenever the discount does not divide evenly.
///
/// ## Example
/// ```rust
/// use storefront_core::{Money, Percent};
/// use storefront_core::pricing::effective_price;
///
/// assert_eq!(effective_price(Money::from_minor(999), Percent::new(15).unwrap()).minor(), 849);
/// ```
pub fn effective_price(base: Money, discount: Percent) -> Money {
    base.percent(discount.complement())
}

/// `unit * quantity` for one order line.
#[inline]
pub fn line_total(unit: Money, quantity: i64) -> CoreResult<Money> {
    unit.checked_mul(quantity)
        .ok_or(CoreError::AmountOverflow("line total"))
}
