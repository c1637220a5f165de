//! # storefront-core: Pure Business Logic for the Storefront Checkout
//!
//! This crate holds every rule of the checkout that can be expressed without
//! touching a database or the network: price snapshots, coupon usability,
//! order totals and the order / payment state machines.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Storefront Architecture                             │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 apps/storefront-api (axum)                      │   │
//! │  │    /cart ──► /orders ──► /payments/request ──► /payments/verify │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │       storefront-payment (gateway + reconciliation)             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │      storefront-db (ledger, order assembler, repositories)      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │            ★ storefront-core (THIS CRATE) ★                     │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐  │   │
//! │  │   │ pricing │ │ coupon  │ │  order  │ │ payment │ │  cart   │  │   │
//! │  │   └─────────┘ └─────────┘ └─────────┘ └─────────┘ └─────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Variants, addresses, shipping methods, [`Percent`]
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`pricing`] - Effective unit price of a variant
//! - [`coupon`] - Coupon usability rules
//! - [`order`] - Order status machine, line snapshots, totals
//! - [`payment`] - Payment attempt status machine, reconcile planning
//! - [`cart`] - Priced cart view
//! - [`error`] - Domain error types
//! - [`validation`] - Input validation
//!
//! ## Example Usage
//!
//! ```rust
//! use storefront_core::{Money, OrderTotals, Percent};
//! use storefront_core::pricing::effective_price;
//!
//! let unit = effective_price(Money::from_minor(100_000), Percent::new(10).unwrap());
//! assert_eq!(unit.minor(), 90_000);
//!
//! let totals = OrderTotals::compute(
//!     [unit.checked_mul(2).unwrap()],
//!     Some(Percent::new(20).unwrap()),
//!     Percent::new(10).unwrap(),
//! )
//! .unwrap();
//! assert_eq!(totals.total.minor(), 158_400);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod coupon;
pub mod error;
pub mod money;
pub mod order;
pub mod payment;
pub mod pricing;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartLine, CartTotals};
pub use coupon::Coupon;
pub use error::{CoreError, CoreResult, CouponError, ErrorKind, ValidationError};
pub use money::Money;
pub use order::{Order, OrderItem, OrderLine, OrderStatus, OrderTotals};
pub use payment::{GatewayStatusHint, PaymentAttempt, PaymentStatus, ReconcileStep};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum distinct variants in a single cart or order.
pub const MAX_CART_ITEMS: usize = 100;

/// Maximum quantity of a single variant in a cart line or order line.
///
/// ## Business Reason
/// Prevents accidental over-ordering (e.g., typing 1000 instead of 10).
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Highest accepted variant base price, in minor units.
///
/// `MAX_UNIT_PRICE × MAX_ITEM_QUANTITY × MAX_CART_ITEMS` times the gateway
/// multiplier still fits in `i64`.
pub const MAX_UNIT_PRICE: i64 = 1_000_000_000_000;

/// Maximum length of a coupon code.
pub const MAX_COUPON_CODE_LEN: usize = 10;

/// Highest discount a coupon may carry, in percent.
pub const MAX_COUPON_DISCOUNT_PERCENT: u8 = 70;

/// Flat tax applied to orders unless configured otherwise.
pub const DEFAULT_TAX_PERCENT: u8 = 10;
