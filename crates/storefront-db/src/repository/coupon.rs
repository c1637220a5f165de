//! # Coupon Repository
//!
//! Coupons, their allow-lists and redemptions.
//!
//! ## Single Use
//! ```text
//! redeem_in(coupon, user, order)
//!      │
//!      ▼
//! INSERT INTO coupon_redemptions (coupon_id, user_id, ...)
//!      │
//!      ├── ok                          → recorded
//!      └── PRIMARY KEY (coupon, user)  → CouponError::AlreadyUsed
//! ```
//!
//! The in-memory `used_by` check in `Coupon::check_usable` gives the early,
//! friendly error. The primary key is what makes a concurrent double
//! redemption impossible.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult, StoreError, StoreResult};
use crate::pool::begin_immediate;
use storefront_core::validation::{
    validate_coupon_code, validate_coupon_discount, validate_usage_limit, validate_user_id,
};
use storefront_core::{Coupon, CouponError};

/// Input for [`CouponRepository::insert`].
#[derive(Debug, Clone)]
pub struct NewCoupon {
    pub code: String,
    pub discount_percent: i64,
    pub expires_at: DateTime<Utc>,
    pub active: bool,
    pub usage_limit: Option<i64>,
    /// Empty = open to every user.
    pub allowed_users: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct CouponRepository {
    pool: SqlitePool,
}

impl CouponRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CouponRepository { pool }
    }

    /// Creates a coupon together with its allow-list.
    pub async fn insert(&self, new: NewCoupon) -> StoreResult<Coupon> {
        validate_coupon_code(&new.code)?;
        validate_coupon_discount(new.discount_percent)?;
        validate_usage_limit(new.usage_limit)?;
        for user in &new.allowed_users {
            validate_user_id(user)?;
        }

        let coupon = Coupon {
            id: Uuid::new_v4().to_string(),
            code: new.code.trim().to_string(),
            discount_percent: new.discount_percent,
            expires_at: new.expires_at,
            active: new.active,
            usage_limit: new.usage_limit,
            created_at: Utc::now(),
            allowed_users: new.allowed_users.into_iter().collect(),
            used_by: BTreeSet::new(),
        };

        let mut tx = begin_immediate(&self.pool).await?;

        sqlx::query(
            r#"
            INSERT INTO coupons (
                id, code, discount_percent, expires_at, active, usage_limit, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&coupon.id)
        .bind(&coupon.code)
        .bind(coupon.discount_percent)
        .bind(coupon.expires_at)
        .bind(coupon.active)
        .bind(coupon.usage_limit)
        .bind(coupon.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, &coupon.code),
            other => other,
        })?;

        for user in &coupon.allowed_users {
            sqlx::query("INSERT INTO coupon_allowed_users (coupon_id, user_id) VALUES (?1, ?2)")
                .bind(&coupon.id)
                .bind(user)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        info!(code = %coupon.code, discount = coupon.discount_percent, "Coupon created");
        Ok(coupon)
    }

    /// Loads a coupon with its allow-list and redeemers.
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<Coupon>> {
        let mut conn = self.pool.acquire().await?;
        load_by_code_in(&mut conn, code).await
    }

    /// Adds a user to the allow-list.
    pub async fn allow_user(&self, code: &str, user_id: &str) -> StoreResult<()> {
        validate_user_id(user_id)?;

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO coupon_allowed_users (coupon_id, user_id)
            SELECT id, ?2 FROM coupons WHERE code = ?1
            "#,
        )
        .bind(code)
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 && self.get_by_code(code).await?.is_none() {
            return Err(DbError::not_found("Coupon", code).into());
        }

        Ok(())
    }

    pub async fn set_active(&self, code: &str, active: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE coupons SET active = ?2 WHERE code = ?1")
            .bind(code)
            .bind(active)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Coupon", code));
        }

        Ok(())
    }

    pub async fn redemption_count(&self, coupon_id: &str) -> DbResult<i64> {
        let mut conn = self.pool.acquire().await?;
        redemption_count_in(&mut conn, coupon_id).await
    }
}

/// Loads a coupon by code on the caller's connection.
pub(crate) async fn load_by_code_in(
    conn: &mut SqliteConnection,
    code: &str,
) -> DbResult<Option<Coupon>> {
    let coupon = sqlx::query_as::<_, Coupon>(
        r#"
        SELECT id, code, discount_percent, expires_at, active, usage_limit, created_at
        FROM coupons
        WHERE code = ?1
        "#,
    )
    .bind(code.trim())
    .fetch_optional(&mut *conn)
    .await?;

    let Some(mut coupon) = coupon else {
        return Ok(None);
    };

    let allowed: Vec<String> =
        sqlx::query_scalar("SELECT user_id FROM coupon_allowed_users WHERE coupon_id = ?1")
            .bind(&coupon.id)
            .fetch_all(&mut *conn)
            .await?;

    let used: Vec<String> =
        sqlx::query_scalar("SELECT user_id FROM coupon_redemptions WHERE coupon_id = ?1")
            .bind(&coupon.id)
            .fetch_all(&mut *conn)
            .await?;

    coupon.allowed_users = allowed.into_iter().collect();
    coupon.used_by = used.into_iter().collect();

    Ok(Some(coupon))
}

async fn redemption_count_in(conn: &mut SqliteConnection, coupon_id: &str) -> DbResult<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM coupon_redemptions WHERE coupon_id = ?1")
            .bind(coupon_id)
            .fetch_one(&mut *conn)
            .await?;
    Ok(count)
}

/// Records that `user_id` redeemed `coupon` on `order_id`.
///
/// Deactivates the coupon once its usage limit is reached.
pub(crate) async fn redeem_in(
    conn: &mut SqliteConnection,
    coupon: &Coupon,
    user_id: &str,
    order_id: &str,
) -> StoreResult<()> {
    sqlx::query(
        r#"
        INSERT INTO coupon_redemptions (coupon_id, user_id, order_id, redeemed_at)
        VALUES (?1, ?2, ?3, ?4)
        "#,
    )
    .bind(&coupon.id)
    .bind(user_id)
    .bind(order_id)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await
    .map_err(|e| match DbError::from(e) {
        e if e.is_unique_violation() => StoreError::from(CouponError::AlreadyUsed),
        other => StoreError::from(other),
    })?;

    debug!(code = %coupon.code, user_id = %user_id, "Coupon redeemed");

    if coupon.usage_limit.is_some() {
        let redemptions = redemption_count_in(conn, &coupon.id).await?;
        if coupon.limit_reached(redemptions) {
            sqlx::query("UPDATE coupons SET active = 0 WHERE id = ?1")
                .bind(&coupon.id)
                .execute(&mut *conn)
                .await?;
            info!(code = %coupon.code, redemptions, "Coupon usage limit reached, deactivated");
        }
    }

    Ok(())
}
