//! # Cart Repository
//!
//! One persistent cart per user, created on first use.
//!
//! Cart lines are priced at read time from the variant's current effective
//! price. That price is advisory: the order assembler snapshots its own.
//!
//! ```text
//! add_item(user, variant, qty)
//!      │
//!      ▼
//! ensure_cart_in ── INSERT OR IGNORE carts (user_id UNIQUE)
//!      │
//!      ▼
//! merged = existing + qty
//!      │
//!      ▼
//! check_line_quantity(variant, merged)   active? ≤ 999? ≤ stock?
//!      │
//!      ▼
//! UPSERT cart_items
//! ```
//!
//! Stock is only checked, never reserved, by the cart.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbResult, StoreResult};
use crate::pool::begin_immediate;
use crate::repository::variant::fetch_variant_in;
use storefront_core::cart::check_line_quantity;
use storefront_core::validation::{validate_quantity, validate_user_id};
use storefront_core::{Cart, CartLine, CoreError, OrderItem, Variant};

/// A cart item joined with its variant.
#[derive(Debug, sqlx::FromRow)]
struct CartItemRow {
    #[sqlx(flatten)]
    variant: Variant,
    quantity: i64,
}

#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// Adds `quantity` of a variant, merging with an existing line.
    pub async fn add_item(&self, user_id: &str, variant_id: &str, quantity: i64) -> StoreResult<Cart> {
        validate_user_id(user_id)?;
        validate_quantity(quantity)?;

        let mut tx = begin_immediate(&self.pool).await?;
        let cart_id = ensure_cart_in(&mut tx, user_id).await?;

        let variant = fetch_variant_in(&mut tx, variant_id)
            .await?
            .ok_or_else(|| CoreError::VariantUnavailable {
                variant_id: variant_id.to_string(),
            })?;

        let existing = line_quantity_in(&mut tx, &cart_id, variant_id)
            .await?
            .unwrap_or(0);
        let merged = existing + quantity;

        check_line_quantity(&variant, merged)?;

        sqlx::query(
            r#"
            INSERT INTO cart_items (cart_id, variant_id, quantity, added_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT (cart_id, variant_id) DO UPDATE SET quantity = excluded.quantity
            "#,
        )
        .bind(&cart_id)
        .bind(variant_id)
        .bind(merged)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        touch_in(&mut tx, &cart_id).await?;
        let cart = load_in(&mut tx, user_id).await?;
        tx.commit().await?;

        debug!(user_id = %user_id, variant_id = %variant_id, quantity = merged, "Cart line set");
        Ok(cart)
    }

    /// Sets a line's quantity. Anything below 1 removes the line.
    pub async fn update_quantity(
        &self,
        user_id: &str,
        variant_id: &str,
        quantity: i64,
    ) -> StoreResult<Cart> {
        if quantity < 1 {
            return self.remove_item(user_id, variant_id).await;
        }

        let mut tx = begin_immediate(&self.pool).await?;
        let cart_id = ensure_cart_in(&mut tx, user_id).await?;

        if line_quantity_in(&mut tx, &cart_id, variant_id).await?.is_none() {
            return Err(CoreError::CartItemNotFound {
                variant_id: variant_id.to_string(),
            }
            .into());
        }

        let variant = fetch_variant_in(&mut tx, variant_id)
            .await?
            .ok_or_else(|| CoreError::VariantUnavailable {
                variant_id: variant_id.to_string(),
            })?;
        check_line_quantity(&variant, quantity)?;

        sqlx::query("UPDATE cart_items SET quantity = ?3 WHERE cart_id = ?1 AND variant_id = ?2")
            .bind(&cart_id)
            .bind(variant_id)
            .bind(quantity)
            .execute(&mut *tx)
            .await?;

        touch_in(&mut tx, &cart_id).await?;
        let cart = load_in(&mut tx, user_id).await?;
        tx.commit().await?;

        Ok(cart)
    }

    pub async fn remove_item(&self, user_id: &str, variant_id: &str) -> StoreResult<Cart> {
        let mut tx = begin_immediate(&self.pool).await?;
        let cart_id = ensure_cart_in(&mut tx, user_id).await?;

        let result = sqlx::query("DELETE FROM cart_items WHERE cart_id = ?1 AND variant_id = ?2")
            .bind(&cart_id)
            .bind(variant_id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(CoreError::CartItemNotFound {
                variant_id: variant_id.to_string(),
            }
            .into());
        }

        touch_in(&mut tx, &cart_id).await?;
        let cart = load_in(&mut tx, user_id).await?;
        tx.commit().await?;

        debug!(user_id = %user_id, variant_id = %variant_id, "Cart line removed");
        Ok(cart)
    }

    pub async fn clear(&self, user_id: &str) -> DbResult<()> {
        let mut tx = begin_immediate(&self.pool).await?;
        clear_in(&mut tx, user_id).await?;
        tx.commit().await?;
        Ok(())
    }

    /// The user's cart priced at current effective prices. Empty if none yet.
    pub async fn get(&self, user_id: &str) -> DbResult<Cart> {
        let mut conn = self.pool.acquire().await?;
        load_in(&mut conn, user_id).await
    }
}

/// Returns the user's cart id, creating the cart if needed.
pub(crate) async fn ensure_cart_in(conn: &mut SqliteConnection, user_id: &str) -> DbResult<String> {
    let now = Utc::now();
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO carts (id, user_id, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?3)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    let id: String = sqlx::query_scalar("SELECT id FROM carts WHERE user_id = ?1")
        .bind(user_id)
        .fetch_one(&mut *conn)
        .await?;

    Ok(id)
}

async fn line_quantity_in(
    conn: &mut SqliteConnection,
    cart_id: &str,
    variant_id: &str,
) -> DbResult<Option<i64>> {
    let qty: Option<i64> =
        sqlx::query_scalar("SELECT quantity FROM cart_items WHERE cart_id = ?1 AND variant_id = ?2")
            .bind(cart_id)
            .bind(variant_id)
            .fetch_optional(&mut *conn)
            .await?;
    Ok(qty)
}

async fn touch_in(conn: &mut SqliteConnection, cart_id: &str) -> DbResult<()> {
    sqlx::query("UPDATE carts SET updated_at = ?2 WHERE id = ?1")
        .bind(cart_id)
        .bind(Utc::now())
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn load_in(conn: &mut SqliteConnection, user_id: &str) -> DbResult<Cart> {
    let rows = sqlx::query_as::<_, CartItemRow>(
        r#"
        SELECT v.id, v.sku, v.name, v.base_price, v.discount_percent,
               v.stock, v.active, v.created_at, v.updated_at,
               ci.quantity
        FROM carts c
        JOIN cart_items ci ON ci.cart_id = c.id
        JOIN variants v ON v.id = ci.variant_id
        WHERE c.user_id = ?1
        ORDER BY ci.added_at, v.id
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(Cart {
        user_id: user_id.to_string(),
        lines: rows
            .iter()
            .map(|row| CartLine::from_variant(&row.variant, row.quantity))
            .collect(),
    })
}

/// The cart's lines as order items, inside the caller's transaction.
pub(crate) async fn read_items_in(
    conn: &mut SqliteConnection,
    user_id: &str,
) -> DbResult<Vec<OrderItem>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        r#"
        SELECT ci.variant_id, ci.quantity
        FROM carts c
        JOIN cart_items ci ON ci.cart_id = c.id
        WHERE c.user_id = ?1
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(variant_id, quantity)| OrderItem::new(variant_id, quantity))
        .collect())
}

pub(crate) async fn clear_in(conn: &mut SqliteConnection, user_id: &str) -> DbResult<()> {
    sqlx::query(
        "DELETE FROM cart_items WHERE cart_id IN (SELECT id FROM carts WHERE user_id = ?1)",
    )
    .bind(user_id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support;
    use crate::StoreError;

    #[tokio::test]
    async fn test_empty_cart_for_new_user() {
        let db = test_support::db().await;
        let cart = db.carts().get("user-1").await.unwrap();
        assert!(cart.is_empty());
        assert_eq!(cart.subtotal().minor(), 0);
    }

    #[tokio::test]
    async fn test_add_merges_lines() {
        let db = test_support::db().await;
        let v = test_support::variant(&db, "HAT", 1_000, 20, 10).await;

        db.carts().add_item("user-1", &v.id, 2).await.unwrap();
        let cart = db.carts().add_item("user-1", &v.id, 3).await.unwrap();

        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.total_quantity(), 5);
        assert_eq!(cart.lines[0].unit_price.minor(), 800);
        assert_eq!(cart.subtotal().minor(), 4_000);
    }

    #[tokio::test]
    async fn test_add_beyond_stock_rejected() {
        let db = test_support::db().await;
        let v = test_support::variant(&db, "HAT", 1_000, 0, 4).await;

        db.carts().add_item("user-1", &v.id, 3).await.unwrap();
        let err = db.carts().add_item("user-1", &v.id, 2).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::Core(CoreError::InsufficientStock { available: 4, requested: 5, .. })
        ));

        // Unchanged
        assert_eq!(db.carts().get("user-1").await.unwrap().total_quantity(), 3);
        // Cart checks never touch stock
        assert_eq!(db.inventory().available(&v.id).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_add_inactive_or_missing_rejected() {
        let db = test_support::db().await;
        let v = test_support::variant(&db, "HAT", 1_000, 0, 4).await;
        db.variants().set_active(&v.id, false).await.unwrap();

        let err = db.carts().add_item("user-1", &v.id, 1).await.unwrap_err();
        assert!(matches!(err, StoreError::Core(CoreError::VariantUnavailable { .. })));

        let err = db.carts().add_item("user-1", "missing", 1).await.unwrap_err();
        assert!(matches!(err, StoreError::Core(CoreError::VariantUnavailable { .. })));
    }

    #[tokio::test]
    async fn test_update_quantity_and_remove() {
        let db = test_support::db().await;
        let a = test_support::variant(&db, "A", 100, 0, 10).await;
        let b = test_support::variant(&db, "B", 200, 0, 10).await;

        db.carts().add_item("user-1", &a.id, 1).await.unwrap();
        db.carts().add_item("user-1", &b.id, 1).await.unwrap();

        let cart = db.carts().update_quantity("user-1", &a.id, 7).await.unwrap();
        assert_eq!(cart.total_quantity(), 8);

        let cart = db.carts().update_quantity("user-1", &a.id, 0).await.unwrap();
        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.lines[0].variant_id, b.id);

        let err = db.carts().update_quantity("user-1", &a.id, 2).await.unwrap_err();
        assert!(matches!(err, StoreError::Core(CoreError::CartItemNotFound { .. })));

        let err = db.carts().remove_item("user-1", &a.id).await.unwrap_err();
        assert!(matches!(err, StoreError::Core(CoreError::CartItemNotFound { .. })));
    }

    #[tokio::test]
    async fn test_clear_and_isolation() {
        let db = test_support::db().await;
        let v = test_support::variant(&db, "A", 100, 0, 10).await;

        db.carts().add_item("user-1", &v.id, 1).await.unwrap();
        db.carts().add_item("user-2", &v.id, 2).await.unwrap();
        db.carts().clear("user-1").await.unwrap();

        assert!(db.carts().get("user-1").await.unwrap().is_empty());
        assert_eq!(db.carts().get("user-2").await.unwrap().total_quantity(), 2);
    }

    #[tokio::test]
    async fn test_price_change_reflected_in_cart() {
        let db = test_support::db().await;
        let v = test_support::variant(&db, "A", 1_000, 0, 10).await;

        db.carts().add_item("user-1", &v.id, 1).await.unwrap();
        db.variants().update_pricing(&v.id, 2_000, 50).await.unwrap();

        let cart = db.carts().get("user-1").await.unwrap();
        assert_eq!(cart.lines[0].unit_price.minor(), 1_000);
    }
}
