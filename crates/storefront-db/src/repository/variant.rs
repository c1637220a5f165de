//! # Variant Repository
//!
//! Catalog maintenance for purchasable variants.
//!
//! Stock is set here only by an explicit restock (`set_stock`). Checkout never
//! goes through this repository to change stock: it uses the inventory ledger.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult, StoreResult};
use storefront_core::validation::{
    validate_percent, validate_price, validate_sku, validate_stock, validate_text,
};
use storefront_core::Variant;

/// Input for [`VariantRepository::insert`].
#[derive(Debug, Clone)]
pub struct NewVariant {
    pub sku: String,
    pub name: String,
    pub base_price: i64,
    pub discount_percent: i64,
    pub stock: i64,
}

/// Repository for variant database operations.
#[derive(Debug, Clone)]
pub struct VariantRepository {
    pool: SqlitePool,
}

impl VariantRepository {
    /// Creates a new VariantRepository.
    pub fn new(pool: SqlitePool) -> Self {
        VariantRepository { pool }
    }

    /// Inserts a new variant.
    pub async fn insert(&self, new: NewVariant) -> StoreResult<Variant> {
        validate_sku(&new.sku)?;
        validate_text("name", &new.name, 200)?;
        validate_price(new.base_price)?;
        validate_percent("discount_percent", new.discount_percent, 100)?;
        validate_stock(new.stock)?;

        let now = Utc::now();
        let variant = Variant {
            id: Uuid::new_v4().to_string(),
            sku: new.sku.trim().to_string(),
            name: new.name.trim().to_string(),
            base_price: new.base_price,
            discount_percent: new.discount_percent,
            stock: new.stock,
            active: true,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %variant.id, sku = %variant.sku, "Inserting variant");

        sqlx::query(
            r#"
            INSERT INTO variants (
                id, sku, name, base_price, discount_percent,
                stock, active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&variant.id)
        .bind(&variant.sku)
        .bind(&variant.name)
        .bind(variant.base_price)
        .bind(variant.discount_percent)
        .bind(variant.stock)
        .bind(variant.active)
        .bind(variant.created_at)
        .bind(variant.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, &variant.sku),
            other => other,
        })?;

        Ok(variant)
    }

    /// Gets a variant by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Variant>> {
        let mut conn = self.pool.acquire().await?;
        fetch_variant_in(&mut conn, id).await
    }

    /// Gets a variant by SKU.
    pub async fn get_by_sku(&self, sku: &str) -> DbResult<Option<Variant>> {
        let variant = sqlx::query_as::<_, Variant>(
            r#"
            SELECT id, sku, name, base_price, discount_percent,
                   stock, active, created_at, updated_at
            FROM variants
            WHERE sku = ?1
            "#,
        )
        .bind(sku)
        .fetch_optional(&self.pool)
        .await?;

        Ok(variant)
    }

    /// Lists active variants ordered by SKU.
    pub async fn list_active(&self, limit: u32) -> DbResult<Vec<Variant>> {
        let variants = sqlx::query_as::<_, Variant>(
            r#"
            SELECT id, sku, name, base_price, discount_percent,
                   stock, active, created_at, updated_at
            FROM variants
            WHERE active = 1
            ORDER BY sku
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(variants)
    }

    /// Changes price and discount.
    ///
    /// Existing orders are unaffected: their lines carry frozen snapshots.
    pub async fn update_pricing(
        &self,
        id: &str,
        base_price: i64,
        discount_percent: i64,
    ) -> StoreResult<()> {
        validate_price(base_price)?;
        validate_percent("discount_percent", discount_percent, 100)?;

        let result = sqlx::query(
            r#"
            UPDATE variants
            SET base_price = ?2, discount_percent = ?3, updated_at = ?4
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(base_price)
        .bind(discount_percent)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Variant", id).into());
        }

        info!(id = %id, base_price, discount_percent, "Variant pricing updated");
        Ok(())
    }

    /// Activates or deactivates a variant.
    pub async fn set_active(&self, id: &str, active: bool) -> DbResult<()> {
        let result = sqlx::query("UPDATE variants SET active = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(active)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Variant", id));
        }

        Ok(())
    }

    /// Overwrites the stock level (restock / stock take).
    pub async fn set_stock(&self, id: &str, stock: i64) -> StoreResult<()> {
        validate_stock(stock)?;

        let result = sqlx::query("UPDATE variants SET stock = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(stock)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Variant", id).into());
        }

        info!(id = %id, stock, "Variant restocked");
        Ok(())
    }

    /// Counts all variants.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM variants")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

/// Loads a variant on an existing connection or transaction.
pub(crate) async fn fetch_variant_in(
    conn: &mut SqliteConnection,
    id: &str,
) -> DbResult<Option<Variant>> {
    let variant = sqlx::query_as::<_, Variant>(
        r#"
        SELECT id, sku, name, base_price, discount_percent,
               stock, active, created_at, updated_at
        FROM variants
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(variant)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support;
    use crate::StoreError;

    #[tokio::test]
    async fn test_insert_and_get() {
        let db = test_support::db().await;
        let v = test_support::variant(&db, "TSHIRT-M", 100_000, 10, 5).await;

        let loaded = db.variants().get_by_id(&v.id).await.unwrap().unwrap();
        assert_eq!(loaded.sku, "TSHIRT-M");
        assert_eq!(loaded.effective_price().minor(), 90_000);
        assert!(loaded.active);

        let by_sku = db.variants().get_by_sku("TSHIRT-M").await.unwrap().unwrap();
        assert_eq!(by_sku.id, v.id);
    }

    #[tokio::test]
    async fn test_duplicate_sku_rejected() {
        let db = test_support::db().await;
        test_support::variant(&db, "DUP", 100, 0, 1).await;

        let err = db
            .variants()
            .insert(NewVariant {
                sku: "DUP".into(),
                name: "Again".into(),
                base_price: 100,
                discount_percent: 0,
                stock: 1,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Db(DbError::UniqueViolation { .. })));
    }

    #[tokio::test]
    async fn test_invalid_input_rejected() {
        let db = test_support::db().await;
        let err = db
            .variants()
            .insert(NewVariant {
                sku: "BAD".into(),
                name: "Bad".into(),
                base_price: 100,
                discount_percent: 101,
                stock: 1,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Core(_)));
        assert_eq!(db.variants().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_update_pricing_and_deactivate() {
        let db = test_support::db().await;
        let v = test_support::variant(&db, "CAP", 5_000, 0, 3).await;

        db.variants().update_pricing(&v.id, 4_000, 50).await.unwrap();
        db.variants().set_active(&v.id, false).await.unwrap();

        let loaded = db.variants().get_by_id(&v.id).await.unwrap().unwrap();
        assert_eq!(loaded.effective_price().minor(), 2_000);
        assert!(!loaded.active);
        assert!(db.variants().list_active(10).await.unwrap().is_empty());

        assert!(db.variants().update_pricing("missing", 1, 0).await.is_err());
    }

    #[tokio::test]
    async fn test_set_stock() {
        let db = test_support::db().await;
        let v = test_support::variant(&db, "SOCK", 500, 0, 0).await;

        db.variants().set_stock(&v.id, 12).await.unwrap();
        assert_eq!(db.variants().get_by_id(&v.id).await.unwrap().unwrap().stock, 12);
        assert!(db.variants().set_stock(&v.id, -1).await.is_err());
    }
}
