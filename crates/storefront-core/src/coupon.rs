//! # Coupon Validator
//!
//! Decides whether a coupon may be applied by a given user at a given time.
//!
//! ## Validation Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  validate(code, user, now)                                              │
//! │                                                                         │
//! │   exists? ──no──► NotFound                                              │
//! │     │                                                                   │
//! │   active? ──no──► Inactive                                              │
//! │     │                                                                   │
//! │   now < expires_at? ──no──► Expired                                     │
//! │     │                                                                   │
//! │   allowed_users empty or contains user? ──no──► NotAllowedForUser       │
//! │     │                                                                   │
//! │   user not in used_by? ──no──► AlreadyUsed                              │
//! │     │                                                                   │
//! │     ▼                                                                   │
//! │   usable                                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//! First failing check wins. The check itself is pure; storefront-db runs it
//! inside the order transaction together with the redemption insert so two
//! concurrent checkouts cannot both pass.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CouponError;
use crate::types::Percent;

/// A discount code.
///
/// `allowed_users` and `used_by` live in their own tables and are loaded
/// alongside the row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Coupon {
    pub id: String,

    /// Unique, at most 10 characters.
    pub code: String,

    /// 0..=70.
    pub discount_percent: i64,

    pub expires_at: DateTime<Utc>,

    pub active: bool,

    /// Total redemptions across all users before the coupon deactivates
    /// itself. `None` is unlimited.
    pub usage_limit: Option<i64>,

    pub created_at: DateTime<Utc>,

    /// Empty means every user may redeem it.
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub allowed_users: BTreeSet<String>,

    /// Users that already redeemed it. Append-only.
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub used_by: BTreeSet<String>,
}

impl Coupon {
    #[inline]
    pub fn discount(&self) -> Percent {
        Percent::clamped(self.discount_percent)
    }

    /// Runs every check after existence.
    pub fn check_usable(&self, user_id: &str, now: DateTime<Utc>) -> Result<(), CouponError> {
        if !self.active {
            return Err(CouponError::Inactive);
        }
        if now >= self.expires_at {
            return Err(CouponError::Expired);
        }
        if !self.allowed_users.is_empty() && !self.allowed_users.contains(user_id) {
            return Err(CouponError::NotAllowedForUser);
        }
        if self.used_by.contains(user_id) {
            return Err(CouponError::AlreadyUsed);
        }
        Ok(())
    }

    /// True once `redemptions` reaches the optional usage limit.
    pub fn limit_reached(&self, redemptions: i64) -> bool {
        self.usage_limit.is_some_and(|limit| redemptions >= limit)
    }
}

/// Full validation including the existence check.
pub fn validate<'a>(
    coupon: Option<&'a Coupon>,
    user_id: &str,
    now: DateTime<Utc>,
) -> Result<&'a Coupon, CouponError> {
    let coupon = coupon.ok_or(CouponError::NotFound)?;
    coupon.check_usable(user_id, now)?;
    Ok(coupon)
}

// =============================================================================
// Unit Tests
// =============================================================================
