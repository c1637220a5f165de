//! # Error Types
//!
//! What can go wrong in the checkout, independent of storage and transport.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  storefront-core errors (this file)                                    │
//! │  ├── CoreError        - Business rules and state machine violations    │
//! │  ├── CouponError      - Why a coupon cannot be used                    │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  storefront-db         DbError / StoreError                            │
//! │  storefront-payment    GatewayError / PaymentError                     │
//! │  storefront-api        ApiError (what clients see)                     │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → StoreError → PaymentError         │
//! │                                          → ApiError → HTTP response    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Classification
//! Every error maps to one [`ErrorKind`]. The kind decides what the caller may
//! do next: fix the input, accept the business outcome, retry, or give up and
//! page someone.

use thiserror::Error;

use crate::order::OrderStatus;

// =============================================================================
// Error Kind
// =============================================================================

/// Coarse classification shared by every layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad input shape. Nothing was written.
    Validation,
    /// The referenced entity does not exist (or is not visible to the caller).
    NotFound,
    /// A business rule refused the operation. The transaction was rolled back.
    BusinessRule,
    /// The payment gateway failed or timed out. Retryable.
    Gateway,
    /// An invariant was about to be violated. Logged, never shown verbatim.
    Consistency,
    /// Storage or other infrastructure failure.
    Internal,
}

// =============================================================================
// Coupon Error
// =============================================================================

/// Reasons a coupon cannot be applied.
///
/// Checks run in declaration order and the first failure wins:
/// existence → active → expiry → allowed users → prior use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CouponError {
    #[error("coupon not found")]
    NotFound,

    #[error("coupon is not active")]
    Inactive,

    #[error("coupon has expired")]
    Expired,

    #[error("coupon is not available for this user")]
    NotAllowedForUser,

    #[error("coupon has already been used by this user")]
    AlreadyUsed,
}

// =============================================================================
// Core Error
// =============================================================================

/// A business rule or state machine refused the operation.
#[derive(Debug, Error)]
pub enum CoreError {
    /// The shipping address does not exist or belongs to someone else.
    #[error("Address {address_id} is not a valid shipping address for this user")]
    InvalidAddress { address_id: String },

    /// Variant is missing or deactivated.
    ///
    /// ## When This Occurs
    /// - Variant ID doesn't exist
    /// - Variant was deactivated after being added to a cart
    #[error("Variant {variant_id} is not available")]
    VariantUnavailable { variant_id: String },

    /// Not enough stock to reserve the requested quantity.
    ///
    /// ## User Workflow
    /// ```text
    /// Checkout (qty: 5)
    ///      │
    ///      ▼
    /// reserve(variant, 5): stock=3
    ///      │
    ///      ▼
    /// InsufficientStock { variant_id, available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// Whole order rolled back, client shows "Only 3 left"
    /// ```
    #[error("Insufficient stock for {variant_id}: available {available}, requested {requested}")]
    InsufficientStock {
        variant_id: String,
        available: i64,
        requested: i64,
    },

    /// Coupon validation failed.
    #[error("Invalid coupon: {0}")]
    InvalidCoupon(#[from] CouponError),

    /// Order request has no items.
    #[error("Order must contain at least one item")]
    EmptyOrder,

    /// A line total, order total or gateway amount does not fit in `i64`.
    #[error("Amount too large: {0} overflows")]
    AmountOverflow(&'static str),

    /// Cart line for the variant does not exist.
    #[error("Variant {variant_id} is not in the cart")]
    CartItemNotFound { variant_id: String },

    /// Order not found (or not owned by the caller).
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Operation requires a PENDING order.
    #[error("Order {order_id} is {status}, expected pending")]
    OrderNotPending { order_id: String, status: OrderStatus },

    /// Order has already been paid.
    #[error("Order {order_id} has already been paid")]
    AlreadyPaid { order_id: String },

    /// No payment attempt carries this authority token.
    #[error("Payment attempt not found for authority {0}")]
    PaymentAttemptNotFound(String),

    /// A state machine was asked to move backwards or sideways.
    ///
    /// ## When This Occurs
    /// - `PAID → PENDING`, `FAILED → PAID`, `SUCCESS → FAILED`
    /// - A conditional status update matched zero rows
    #[error("Invalid {entity} transition: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    /// Stored state contradicts an invariant.
    #[error("Consistency violation: {0}")]
    Consistency(String),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Classifies the error for the API layer.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_) | CoreError::EmptyOrder => ErrorKind::Validation,
            CoreError::OrderNotFound(_)
            | CoreError::PaymentAttemptNotFound(_)
            | CoreError::CartItemNotFound { .. } => ErrorKind::NotFound,
            CoreError::InvalidAddress { .. }
            | CoreError::VariantUnavailable { .. }
            | CoreError::InsufficientStock { .. }
            | CoreError::InvalidCoupon(_)
            | CoreError::OrderNotPending { .. }
            | CoreError::AlreadyPaid { .. }
            | CoreError::AmountOverflow(_) => ErrorKind::BusinessRule,
            CoreError::InvalidTransition { .. } | CoreError::Consistency(_) => {
                ErrorKind::Consistency
            }
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// A field failed a shape check. Raised before any lookup or write.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Missing, empty or whitespace only.
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Wrong characters or unparseable.
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Not one of a closed set, e.g. shipping methods.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },
}

// =============================================================================
// Result Type Alias
// =============================================================================

pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
