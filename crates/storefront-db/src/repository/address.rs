//! # Address Repository
//!
//! Per-user shipping addresses. The order assembler only needs to know that
//! an address exists and belongs to the ordering user.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbResult, StoreResult};
use storefront_core::validation::{validate_text, validate_user_id};
use storefront_core::Address;

/// Input for [`AddressRepository::insert`].
#[derive(Debug, Clone)]
pub struct NewAddress {
    pub user_id: String,
    pub recipient: String,
    pub line1: String,
    pub city: String,
    pub postal_code: String,
    pub phone: String,
}

#[derive(Debug, Clone)]
pub struct AddressRepository {
    pool: SqlitePool,
}

impl AddressRepository {
    pub fn new(pool: SqlitePool) -> Self {
        AddressRepository { pool }
    }

    pub async fn insert(&self, new: NewAddress) -> StoreResult<Address> {
        validate_user_id(&new.user_id)?;
        validate_text("recipient", &new.recipient, 100)?;
        validate_text("line1", &new.line1, 255)?;
        validate_text("city", &new.city, 100)?;
        validate_text("postal_code", &new.postal_code, 20)?;
        validate_text("phone", &new.phone, 20)?;

        let address = Address {
            id: Uuid::new_v4().to_string(),
            user_id: new.user_id,
            recipient: new.recipient.trim().to_string(),
            line1: new.line1.trim().to_string(),
            city: new.city.trim().to_string(),
            postal_code: new.postal_code.trim().to_string(),
            phone: new.phone.trim().to_string(),
            created_at: Utc::now(),
        };

        debug!(id = %address.id, user_id = %address.user_id, "Inserting address");

        sqlx::query(
            r#"
            INSERT INTO user_addresses (
                id, user_id, recipient, line1, city, postal_code, phone, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&address.id)
        .bind(&address.user_id)
        .bind(&address.recipient)
        .bind(&address.line1)
        .bind(&address.city)
        .bind(&address.postal_code)
        .bind(&address.phone)
        .bind(address.created_at)
        .execute(&self.pool)
        .await?;

        Ok(address)
    }

    /// Gets an address only if `user_id` owns it.
    pub async fn get_for_user(&self, user_id: &str, id: &str) -> DbResult<Option<Address>> {
        let address = sqlx::query_as::<_, Address>(
            r#"
            SELECT id, user_id, recipient, line1, city, postal_code, phone, created_at
            FROM user_addresses
            WHERE id = ?1 AND user_id = ?2
            "#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(address)
    }

    pub async fn list_for_user(&self, user_id: &str) -> DbResult<Vec<Address>> {
        let addresses = sqlx::query_as::<_, Address>(
            r#"
            SELECT id, user_id, recipient, line1, city, postal_code, phone, created_at
            FROM user_addresses
            WHERE user_id = ?1
            ORDER BY created_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(addresses)
    }
}

/// True if the address exists and belongs to `user_id`.
pub(crate) async fn owned_by_in(
    conn: &mut SqliteConnection,
    user_id: &str,
    address_id: &str,
) -> DbResult<bool> {
    let found: Option<i64> =
        sqlx::query_scalar("SELECT 1 FROM user_addresses WHERE id = ?1 AND user_id = ?2")
            .bind(address_id)
            .bind(user_id)
            .fetch_optional(&mut *conn)
            .await?;

    Ok(found.is_some())
}
