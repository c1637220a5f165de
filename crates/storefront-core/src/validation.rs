//! # Validation Module
//!
//! Input validation for the checkout.
//!
//! ## Where Each Rule Lives
//! ```text
//! request body ──serde──► typed fields          (shape)
//!       │
//!       ▼
//! validate_*  (this module)                     (ranges, lengths, formats)
//!       │
//!       ▼
//! repositories: business rules under BEGIN IMMEDIATE
//!       │
//!       ▼
//! schema: CHECK (stock >= 0), CHECK (quantity >= 1), UNIQUE, FOREIGN KEY
//! ```
//!
//! A validation failure means nothing was written.

use crate::error::ValidationError;
use crate::{MAX_COUPON_CODE_LEN, MAX_COUPON_DISCOUNT_PERCENT, MAX_ITEM_QUANTITY, MAX_UNIT_PRICE};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a SKU.
///
/// ## Rules
/// - Must not be empty
/// - At most 50 characters
/// - Only alphanumeric characters, hyphens, underscores
///
/// ## Example
/// ```rust
/// use storefront_core::validation::validate_sku;
///
/// assert!(validate_sku("TSHIRT-M").is_ok());
/// assert!(validate_sku("").is_err());
/// ```
pub fn validate_sku(sku: &str) -> ValidationResult<()> {
    let sku = sku.trim();

    if sku.is_empty() {
        return Err(ValidationError::Required {
            field: "sku".to_string(),
        });
    }

    if sku.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "sku".to_string(),
            max: 50,
        });
    }

    if !sku
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_')
    {
        return Err(ValidationError::InvalidFormat {
            field: "sku".to_string(),
            reason: "must contain only letters, numbers, hyphens, and underscores".to_string(),
        });
    }

    Ok(())
}

/// Validates a required free-text field with a maximum length.
pub fn validate_text(field: &str, value: &str, max: usize) -> ValidationResult<()> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    if value.chars().count() > max {
        return Err(ValidationError::TooLong {
            field: field.to_string(),
            max,
        });
    }

    Ok(())
}

/// Validates a coupon code: 1..=10 alphanumeric characters.
pub fn validate_coupon_code(code: &str) -> ValidationResult<()> {
    validate_text("coupon_code", code, MAX_COUPON_CODE_LEN)?;

    if !code.trim().chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ValidationError::InvalidFormat {
            field: "coupon_code".to_string(),
            reason: "must contain only letters and digits".to_string(),
        });
    }

    Ok(())
}

/// Validates an opaque user identifier handed over by the auth layer.
pub fn validate_user_id(user_id: &str) -> ValidationResult<()> {
    validate_text("user_id", user_id, 64)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity value.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed MAX_ITEM_QUANTITY (999)
///
/// Runs before any stock lookup, for cart lines and order items alike.
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a price in minor units: `0..=MAX_UNIT_PRICE`. Zero is allowed
/// (free items).
///
/// ## Example
/// ```rust
/// use storefront_core::validation::validate_price;
///
/// assert!(validate_price(1099).is_ok());
/// assert!(validate_price(0).is_ok());
/// assert!(validate_price(-100).is_err());
/// assert!(validate_price(i64::MAX / 2).is_err());
/// ```
pub fn validate_price(minor: i64) -> ValidationResult<()> {
    if !(0..=MAX_UNIT_PRICE).contains(&minor) {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: MAX_UNIT_PRICE,
        });
    }

    Ok(())
}

/// Validates a stock level.
pub fn validate_stock(stock: i64) -> ValidationResult<()> {
    if stock < 0 {
        return Err(ValidationError::OutOfRange {
            field: "stock".to_string(),
            min: 0,
            max: i64::MAX,
        });
    }

    Ok(())
}

/// Validates a percentage field against `0..=max`.
pub fn validate_percent(field: &str, value: i64, max: u8) -> ValidationResult<()> {
    if !(0..=max as i64).contains(&value) {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: max as i64,
        });
    }

    Ok(())
}

/// Coupon discounts are capped at 70%.
pub fn validate_coupon_discount(value: i64) -> ValidationResult<()> {
    validate_percent("discount_percent", value, MAX_COUPON_DISCOUNT_PERCENT)
}

/// Validates an optional coupon usage limit (must be positive when set).
pub fn validate_usage_limit(limit: Option<i64>) -> ValidationResult<()> {
    match limit {
        Some(n) if n <= 0 => Err(ValidationError::MustBePositive {
            field: "usage_limit".to_string(),
        }),
        _ => Ok(()),
    }
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string format.
///
/// ## Example
/// ```rust
/// use storefront_core::validation::validate_uuid;
///
/// assert!(validate_uuid("order_id", "550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("order_id", "not-a-uuid").is_err());
/// ```
pub fn validate_uuid(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: field.to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================
