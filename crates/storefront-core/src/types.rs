//! # Domain Types
//!
//! Catalog and customer types shared by every layer.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Variant      │   │    Address      │   │ ShippingMethod  │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  ExpressPost    │       │
//! │  │  sku (business) │   │  user_id        │   │  Courier        │       │
//! │  │  base_price     │   │  recipient      │   │  LocalDelivery  │       │
//! │  │  discount_%     │   │  line1, city    │   └─────────────────┘       │
//! │  │  stock          │   └─────────────────┘                              │
//! │  └─────────────────┘                                                    │
//! │                                                                         │
//! │  ┌─────────────────┐                                                    │
//! │  │    Percent      │  0..=100, used for discounts, coupons and tax      │
//! │  └─────────────────┘                                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID: (sku, coupon code) - human-readable

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::money::Money;
use crate::pricing;

// =============================================================================
// Percent
// =============================================================================

/// A whole percentage between 0 and 100 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Percent(u8);

impl Percent {
    pub const ZERO: Percent = Percent(0);
    pub const HUNDRED: Percent = Percent(100);

    /// Returns `None` above 100.
    #[inline]
    pub const fn new(value: u8) -> Option<Self> {
        if value <= 100 {
            Some(Percent(value))
        } else {
            None
        }
    }

    /// Builds a percent from a stored integer, clamping into range.
    ///
    /// Storage carries CHECK constraints, so clamping only matters for rows
    /// written by something other than this crate.
    pub fn clamped(value: i64) -> Self {
        Percent(value.clamp(0, 100) as u8)
    }

    #[inline]
    pub const fn value(&self) -> u8 {
        self.0
    }

    /// `100 - self`.
    #[inline]
    pub const fn complement(&self) -> Self {
        Percent(100 - self.0)
    }
}

impl TryFrom<u8> for Percent {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Percent::new(value).ok_or(ValidationError::OutOfRange {
            field: "percent".to_string(),
            min: 0,
            max: 100,
        })
    }
}

impl From<Percent> for u8 {
    fn from(p: Percent) -> u8 {
        p.0
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

// =============================================================================
// Variant
// =============================================================================

/// A purchasable SKU with its own price and stock counter.
///
/// `stock` is only ever mutated by the inventory ledger in storefront-db.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Variant {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Stock Keeping Unit - business identifier.
    pub sku: String,

    /// Display name, frozen onto order lines.
    pub name: String,

    /// Price before discount, in minor units.
    pub base_price: i64,

    /// Variant-level discount, 0..=100.
    pub discount_percent: i64,

    /// Units available to reserve. Never negative.
    pub stock: i64,

    /// Inactive variants cannot be carted or ordered.
    pub active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Variant {
    #[inline]
    pub fn base_price(&self) -> Money {
        Money::from_minor(self.base_price)
    }

    #[inline]
    pub fn discount(&self) -> Percent {
        Percent::clamped(self.discount_percent)
    }

    /// Current effective unit price. See [`pricing::effective_price`].
    pub fn effective_price(&self) -> Money {
        pricing::effective_price(self.base_price(), self.discount())
    }
}

// =============================================================================
// Address
// =============================================================================

/// A shipping address owned by a single user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Address {
    pub id: String,
    pub user_id: String,
    pub recipient: String,
    pub line1: String,
    pub city: String,
    pub postal_code: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Shipping Method
// =============================================================================

/// How an order leaves the warehouse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum ShippingMethod {
    /// National express post.
    ExpressPost,
    /// Private courier.
    Courier,
    /// Same-city delivery.
    LocalDelivery,
}

impl ShippingMethod {
    pub const ALL: [ShippingMethod; 3] = [
        ShippingMethod::ExpressPost,
        ShippingMethod::Courier,
        ShippingMethod::LocalDelivery,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            ShippingMethod::ExpressPost => "express_post",
            ShippingMethod::Courier => "courier",
            ShippingMethod::LocalDelivery => "local_delivery",
        }
    }
}

impl Default for ShippingMethod {
    fn default() -> Self {
        ShippingMethod::ExpressPost
    }
}

impl FromStr for ShippingMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ShippingMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "shipping_method".to_string(),
                allowed: ShippingMethod::ALL
                    .iter()
                    .map(|m| m.as_str().to_string())
                    .collect(),
            })
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
