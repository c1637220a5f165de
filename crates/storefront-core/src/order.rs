//! # Orders
//!
//! Order lines, totals and the order status machine.
//!
//! ## Status Machine
//! ```text
//!                 ┌──────────► PAID    (verified payment)
//!   PENDING ──────┤
//!                 └──────────► FAILED  (cancelled / unverified / expired)
//!
//!   Both targets are terminal. Nothing moves backwards.
//! ```
//!
//! ## Totals
//! ```text
//!   line_total = unit_price_at_purchase × quantity
//!   subtotal   = Σ line_total
//!   discount   = floor(subtotal × coupon% / 100)
//!   tax        = floor((subtotal − discount) × tax% / 100)
//!   total      = subtotal − discount + tax
//! ```
//! Computed once when the order is assembled and never recomputed.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::pricing;
use crate::types::{Percent, ShippingMethod, Variant};
use crate::validation::validate_quantity;
use crate::MAX_CART_ITEMS;

// =============================================================================
// Order Status
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created, stock reserved, awaiting payment.
    #[default]
    Pending,
    /// Payment verified.
    Paid,
    /// Payment cancelled, rejected or expired. Stock released.
    Failed,
}

impl OrderStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Failed => "failed",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        !matches!(self, OrderStatus::Pending)
    }

    /// Only `PENDING → PAID` and `PENDING → FAILED` are legal.
    pub const fn can_transition_to(&self, to: OrderStatus) -> bool {
        matches!(
            (self, to),
            (OrderStatus::Pending, OrderStatus::Paid) | (OrderStatus::Pending, OrderStatus::Failed)
        )
    }

    pub fn transition(self, to: OrderStatus) -> CoreResult<OrderStatus> {
        if self.can_transition_to(to) {
            Ok(to)
        } else {
            Err(CoreError::InvalidTransition {
                entity: "order",
                from: self.to_string(),
                to: to.to_string(),
            })
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "paid" => Ok(OrderStatus::Paid),
            "failed" => Ok(OrderStatus::Failed),
            _ => Err(ValidationError::NotAllowed {
                field: "status".to_string(),
                allowed: vec!["pending".into(), "paid".into(), "failed".into()],
            }),
        }
    }
}

// =============================================================================
// Requested Items
// =============================================================================

/// One `(variant, quantity)` pair requested by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub variant_id: String,
    pub quantity: i64,
}

impl OrderItem {
    pub fn new(variant_id: impl Into<String>, quantity: i64) -> Self {
        OrderItem {
            variant_id: variant_id.into(),
            quantity,
        }
    }
}

/// Validates, merges duplicates and sorts by variant id.
///
/// The ascending order is the lock order used by the order assembler, so two
/// checkouts touching overlapping variants always reserve in the same order.
///
/// ## Example
/// ```rust
/// use storefront_core::order::{normalize_items, OrderItem};
///
/// let items = normalize_items(&[
///     OrderItem::new("b", 1),
///     OrderItem::new("a", 2),
///     OrderItem::new("b", 3),
/// ]).unwrap();
/// assert_eq!(items, vec![OrderItem::new("a", 2), OrderItem::new("b", 4)]);
/// ```
pub fn normalize_items(items: &[OrderItem]) -> CoreResult<Vec<OrderItem>> {
    if items.is_empty() {
        return Err(CoreError::EmptyOrder);
    }

    let mut merged: BTreeMap<&str, i64> = BTreeMap::new();
    for item in items {
        if item.variant_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "variant_id".to_string(),
            }
            .into());
        }
        validate_quantity(item.quantity)?;
        *merged.entry(item.variant_id.as_str()).or_insert(0) += item.quantity;
    }

    if merged.len() > MAX_CART_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_CART_ITEMS as i64,
        }
        .into());
    }

    merged
        .into_iter()
        .map(|(variant_id, quantity)| -> CoreResult<OrderItem> {
            validate_quantity(quantity)?;
            Ok(OrderItem::new(variant_id, quantity))
        })
        .collect()
}

// =============================================================================
// Order Line
// =============================================================================

/// A line item in an order.
/// Uses snapshot pattern to freeze variant data at time of purchase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct OrderLine {
    pub id: String,
    pub order_id: String,
    /// Position within the order, starting at 0.
    pub position: i64,
    pub variant_id: String,
    /// SKU at time of purchase (frozen).
    pub sku_snapshot: String,
    /// Variant name at time of purchase (frozen).
    pub name_snapshot: String,
    pub quantity: i64,
    /// Effective unit price at time of purchase (frozen, authoritative).
    pub unit_price_at_purchase: i64,
    pub line_total: i64,
}

impl OrderLine {
    /// Freezes the variant's current effective price into a new line.
    pub fn snapshot(
        order_id: &str,
        position: i64,
        variant: &Variant,
        quantity: i64,
    ) -> CoreResult<Self> {
        let unit = variant.effective_price();
        let line_total = pricing::line_total(unit, quantity)?;
        Ok(OrderLine {
            id: uuid::Uuid::new_v4().to_string(),
            order_id: order_id.to_string(),
            position,
            variant_id: variant.id.clone(),
            sku_snapshot: variant.sku.clone(),
            name_snapshot: variant.name.clone(),
            quantity,
            unit_price_at_purchase: unit.minor(),
            line_total: line_total.minor(),
        })
    }

    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_minor(self.unit_price_at_purchase)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_minor(self.line_total)
    }
}

// =============================================================================
// Totals
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub tax: Money,
    pub total: Money,
}

impl OrderTotals {
    /// `total = (subtotal - discount) + tax`, failing with
    /// [`CoreError::AmountOverflow`] rather than wrapping.
    pub fn compute(
        line_totals: impl IntoIterator<Item = Money>,
        coupon: Option<Percent>,
        tax_percent: Percent,
    ) -> CoreResult<Self> {
        let subtotal =
            Money::checked_sum(line_totals).ok_or(CoreError::AmountOverflow("order subtotal"))?;
        let discount = coupon.map_or(Money::zero(), |p| subtotal.percent(p));
        let taxable = subtotal - discount;
        let tax = taxable.percent(tax_percent);
        let total = taxable
            .checked_add(tax)
            .ok_or(CoreError::AmountOverflow("order total"))?;
        Ok(OrderTotals {
            subtotal,
            discount,
            tax,
            total,
        })
    }
}

// =============================================================================
// Order
// =============================================================================

/// A placed order. `status` is the only field that changes after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Order {
    pub id: String,
    pub user_id: String,
    pub address_id: String,
    pub shipping_method: ShippingMethod,
    pub coupon_id: Option<String>,
    pub tax_percent: i64,
    pub subtotal: i64,
    pub discount: i64,
    pub tax: i64,
    pub total_price: i64,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub lines: Vec<OrderLine>,
}

impl Order {
    #[inline]
    pub fn total_price(&self) -> Money {
        Money::from_minor(self.total_price)
    }

    /// Errors unless the order can still be paid for.
    pub fn ensure_payable(&self) -> CoreResult<()> {
        match self.status {
            OrderStatus::Pending => Ok(()),
            OrderStatus::Paid => Err(CoreError::AlreadyPaid {
                order_id: self.id.clone(),
            }),
            OrderStatus::Failed => Err(CoreError::OrderNotPending {
                order_id: self.id.clone(),
                status: self.status,
            }),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn pct(v: u8) -> Percent {
        Percent::new(v).unwrap()
    }

    fn variant(id: &str, base_price: i64, discount_percent: i64) -> Variant {
        Variant {
            id: id.to_string(),
            sku: format!("SKU-{id}"),
            name: format!("Variant {id}"),
            base_price,
            discount_percent,
            stock: 10,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_worked_total_example() {
        let v = variant("v-1", 100_000, 10);
        let line = OrderLine::snapshot("o-1", 0, &v, 2).unwrap();
        assert_eq!(line.unit_price_at_purchase, 90_000);
        assert_eq!(line.line_total, 180_000);

        let totals = OrderTotals::compute([line.line_total()], Some(pct(20)), pct(10)).unwrap();
        assert_eq!(totals.subtotal.minor(), 180_000);
        assert_eq!(totals.discount.minor(), 36_000);
        assert_eq!(totals.tax.minor(), 14_400);
        assert_eq!(totals.total.minor(), 158_400);
    }

    #[test]
    fn test_totals_without_coupon() {
        let totals = OrderTotals::compute(
            [Money::from_minor(1_005), Money::from_minor(2_000)],
            None,
            pct(10),
        )
        .unwrap();
        assert_eq!(totals.discount, Money::zero());
        assert_eq!(totals.tax.minor(), 300); // 300.5 floored
        assert_eq!(totals.total.minor(), 3_305);
    }

    #[test]
    fn test_snapshot_does_not_follow_later_price_change() {
        let mut v = variant("v-1", 100_000, 10);
        let line = OrderLine::snapshot("o-1", 0, &v, 1).unwrap();
        v.base_price = 1;
        v.discount_percent = 0;
        assert_eq!(line.unit_price().minor(), 90_000);
    }

    #[test]
    fn test_oversized_amounts_are_rejected() {
        let v = variant("v-1", i64::MAX / 2, 0);
        assert!(matches!(
            OrderLine::snapshot("o-1", 0, &v, 3),
            Err(CoreError::AmountOverflow(_))
        ));

        let half = Money::from_minor(i64::MAX / 2);
        assert!(matches!(
            OrderTotals::compute([half, half, half], None, pct(0)),
            Err(CoreError::AmountOverflow("order subtotal"))
        ));
        // Subtotal fits, adding tax does not
        assert!(matches!(
            OrderTotals::compute([Money::from_minor(i64::MAX - 10)], None, pct(10)),
            Err(CoreError::AmountOverflow("order total"))
        ));
    }

    #[test]
    fn test_default_status_is_pending() {
        assert_eq!(OrderStatus::default(), OrderStatus::Pending);
    }

    #[test]
    fn test_status_transitions() {
        assert!(OrderStatus::Pending.transition(OrderStatus::Paid).is_ok());
        assert!(OrderStatus::Pending.transition(OrderStatus::Failed).is_ok());
        assert!(OrderStatus::Paid.transition(OrderStatus::Pending).is_err());
        assert!(OrderStatus::Paid.transition(OrderStatus::Failed).is_err());
        assert!(OrderStatus::Failed.transition(OrderStatus::Paid).is_err());
        assert!(OrderStatus::Pending.transition(OrderStatus::Pending).is_err());
    }

    #[test]
    fn test_normalize_items() {
        assert!(matches!(normalize_items(&[]), Err(CoreError::EmptyOrder)));
        assert!(normalize_items(&[OrderItem::new("a", 0)]).is_err());
        assert!(normalize_items(&[OrderItem::new("", 1)]).is_err());

        let merged = normalize_items(&[
            OrderItem::new("c", 1),
            OrderItem::new("a", 1),
            OrderItem::new("c", 2),
        ])
        .unwrap();
        assert_eq!(merged, vec![OrderItem::new("a", 1), OrderItem::new("c", 3)]);

        // Merged quantity still bounded
        assert!(normalize_items(&[OrderItem::new("a", 600), OrderItem::new("a", 600)]).is_err());
    }

    #[test]
    fn test_ensure_payable() {
        let mut order = Order {
            id: "o-1".into(),
            user_id: "alice".into(),
            address_id: "a-1".into(),
            shipping_method: ShippingMethod::Courier,
            coupon_id: None,
            tax_percent: 10,
            subtotal: 100,
            discount: 0,
            tax: 10,
            total_price: 110,
            status: OrderStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
            lines: Vec::new(),
        };
        assert!(order.ensure_payable().is_ok());
        order.status = OrderStatus::Paid;
        assert!(matches!(
            order.ensure_payable(),
            Err(CoreError::AlreadyPaid { .. })
        ));
        order.status = OrderStatus::Failed;
        assert!(matches!(
            order.ensure_payable(),
            Err(CoreError::OrderNotPending { .. })
        ));
    }
}
