//! # Cart
//!
//! A priced, read-only view of a user's cart plus the rule every cart
//! mutation has to pass.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  HTTP                    storefront-db            Rule (this module)    │
//! │  ────                    ─────────────            ──────────────────    │
//! │  POST   /cart/items ───► add_item ──────────────► check_line_quantity   │
//! │  PATCH  /cart/items/x ─► update_quantity ───────► check_line_quantity   │
//! │  DELETE /cart/items/x ─► remove_item                                    │
//! │  GET    /cart ─────────► get ───────────────────► Cart::from lines      │
//! │  POST   /orders ───────► create_order_from_cart ► Cart::to_order_items  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Cart prices are whatever the variant costs right now. They are advisory:
//! the order assembler snapshots its own prices inside the checkout
//! transaction.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::order::OrderItem;
use crate::types::Variant;
use crate::validation::validate_quantity;

/// Checks that `quantity` of `variant` may sit in a cart line.
pub fn check_line_quantity(variant: &Variant, quantity: i64) -> CoreResult<()> {
    if !variant.active {
        return Err(CoreError::VariantUnavailable {
            variant_id: variant.id.clone(),
        });
    }
    validate_quantity(quantity)?;
    if quantity > variant.stock {
        return Err(CoreError::InsufficientStock {
            variant_id: variant.id.clone(),
            available: variant.stock,
            requested: quantity,
        });
    }
    Ok(())
}

/// One cart line, priced at the variant's current effective price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub variant_id: String,
    pub sku: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price: Money,
    /// Stock at the time the cart was read.
    pub available: i64,
    pub active: bool,
}

impl CartLine {
    pub fn from_variant(variant: &Variant, quantity: i64) -> Self {
        CartLine {
            variant_id: variant.id.clone(),
            sku: variant.sku.clone(),
            name: variant.name.clone(),
            quantity,
            unit_price: variant.effective_price(),
            available: variant.stock,
            active: variant.active,
        }
    }

    /// For display. Checkout recomputes totals with overflow checks.
    pub fn line_total(&self) -> Money {
        self.unit_price.saturating_mul(self.quantity)
    }
}

/// The user's cart.
///
/// ## Invariants
/// - Lines are unique by `variant_id`
/// - Every quantity is >= 1
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cart {
    pub user_id: String,
    pub lines: Vec<CartLine>,
}

impl Cart {
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn item_count(&self) -> usize {
        self.lines.len()
    }

    pub fn total_quantity(&self) -> i64 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    pub fn subtotal(&self) -> Money {
        self.lines
            .iter()
            .map(CartLine::line_total)
            .fold(Money::zero(), |acc, m| acc.saturating_add(m))
    }

    /// The `(variant, quantity)` list handed to the order assembler.
    pub fn to_order_items(&self) -> Vec<OrderItem> {
        self.lines
            .iter()
            .map(|l| OrderItem::new(l.variant_id.clone(), l.quantity))
            .collect()
    }

    pub fn totals(&self) -> CartTotals {
        CartTotals::from(self)
    }
}

/// Cart totals summary for API responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartTotals {
    pub item_count: usize,
    pub total_quantity: i64,
    pub subtotal: Money,
}

impl From<&Cart> for CartTotals {
    fn from(cart: &Cart) -> Self {
        CartTotals {
            item_count: cart.item_count(),
            total_quantity: cart.total_quantity(),
            subtotal: cart.subtotal(),
        }
    }
}
