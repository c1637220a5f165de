//! # Inventory Ledger
//!
//! Atomic stock reservation and release.
//!
//! ## Reserve
//! ```text
//! UPDATE variants
//! SET stock = stock - :qty
//! WHERE id = :id AND active = 1 AND stock >= :qty
//!      │
//!      ├── 1 row  → reserved
//!      └── 0 rows → re-read the row to say why
//!                   (missing / inactive → VariantUnavailable,
//!                    otherwise        → InsufficientStock)
//! ```
//!
//! The check and the decrement are one statement, so two checkouts racing
//! for the last unit cannot both win. Stock never goes below zero.
//!
//! Releases happen only through the order FAILED transition, which is itself
//! a conditional update. A given reservation is therefore returned at most once.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, warn};

use crate::error::{DbError, DbResult, StoreResult};
use crate::pool::begin_immediate;
use storefront_core::validation::validate_quantity;
use storefront_core::CoreError;

/// Reserve / release entry points that run in their own transaction.
#[derive(Debug, Clone)]
pub struct InventoryLedger {
    pool: SqlitePool,
}

impl InventoryLedger {
    pub fn new(pool: SqlitePool) -> Self {
        InventoryLedger { pool }
    }

    /// Reserves `quantity` units of one variant.
    pub async fn reserve(&self, variant_id: &str, quantity: i64) -> StoreResult<()> {
        let mut tx = begin_immediate(&self.pool).await?;
        reserve_in(&mut tx, variant_id, quantity).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Returns `quantity` units of one variant.
    pub async fn release(&self, variant_id: &str, quantity: i64) -> StoreResult<()> {
        let mut tx = begin_immediate(&self.pool).await?;
        release_in(&mut tx, variant_id, quantity).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Current stock of a variant.
    pub async fn available(&self, variant_id: &str) -> DbResult<i64> {
        let stock: Option<i64> = sqlx::query_scalar("SELECT stock FROM variants WHERE id = ?1")
            .bind(variant_id)
            .fetch_optional(&self.pool)
            .await?;

        stock.ok_or_else(|| DbError::not_found("Variant", variant_id))
    }
}

/// Decrements stock inside the caller's transaction.
pub(crate) async fn reserve_in(
    conn: &mut SqliteConnection,
    variant_id: &str,
    quantity: i64,
) -> StoreResult<()> {
    validate_quantity(quantity)?;

    let result = sqlx::query(
        r#"
        UPDATE variants
        SET stock = stock - ?2, updated_at = ?3
        WHERE id = ?1 AND active = 1 AND stock >= ?2
        "#,
    )
    .bind(variant_id)
    .bind(quantity)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 1 {
        debug!(variant_id = %variant_id, quantity, "Stock reserved");
        return Ok(());
    }

    let row: Option<(i64, bool)> =
        sqlx::query_as("SELECT stock, active FROM variants WHERE id = ?1")
            .bind(variant_id)
            .fetch_optional(&mut *conn)
            .await?;

    let err = match row {
        Some((available, true)) => CoreError::InsufficientStock {
            variant_id: variant_id.to_string(),
            available,
            requested: quantity,
        },
        _ => CoreError::VariantUnavailable {
            variant_id: variant_id.to_string(),
        },
    };

    debug!(variant_id = %variant_id, quantity, error = %err, "Reservation refused");
    Err(err.into())
}

/// Increments stock inside the caller's transaction.
///
/// The variant may have been deactivated since the reservation; stock is
/// returned regardless.
pub(crate) async fn release_in(
    conn: &mut SqliteConnection,
    variant_id: &str,
    quantity: i64,
) -> StoreResult<()> {
    validate_quantity(quantity)?;

    let result = sqlx::query(
        "UPDATE variants SET stock = stock + ?2, updated_at = ?3 WHERE id = ?1",
    )
    .bind(variant_id)
    .bind(quantity)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        warn!(variant_id = %variant_id, quantity, "Release for unknown variant");
        return Err(CoreError::Consistency(format!(
            "cannot release stock for missing variant {variant_id}"
        ))
        .into());
    }

    debug!(variant_id = %variant_id, quantity, "Stock released");
    Ok(())
}
