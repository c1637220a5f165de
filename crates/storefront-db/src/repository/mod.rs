//! # Repository Module
//!
//! Database repository implementations.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Caller                                                                 │
//! │       │  db.orders().create_order(&checkout, &items)                   │
//! │       ▼                                                                 │
//! │  OrderRepository                                                        │
//! │       │  BEGIN IMMEDIATE                                               │
//! │       │  ├── address::owned_by_in(&mut tx, ..)                         │
//! │       │  ├── inventory::reserve_in(&mut tx, ..)   (sorted by variant)  │
//! │       │  ├── coupon::redeem_in(&mut tx, ..)                            │
//! │       │  └── INSERT orders / order_lines                               │
//! │       │  COMMIT                                                        │
//! │       ▼                                                                 │
//! │  SQLite                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Each repository is a struct holding the pool for standalone operations.
//! Steps that must share a transaction are free `*_in` functions taking a
//! `&mut SqliteConnection`; they never touch the pool.
//!
//! ## Available Repositories
//!
//! - [`variant::VariantRepository`] - Variant catalog maintenance
//! - [`inventory::InventoryLedger`] - Atomic reserve / release
//! - [`coupon::CouponRepository`] - Coupons and redemptions
//! - [`address::AddressRepository`] - Shipping addresses
//! - [`cart::CartRepository`] - Per-user carts
//! - [`order::OrderRepository`] - Order assembler and order queries
//! - [`payment::PaymentRepository`] - Payment attempts and settlement

pub mod address;
pub mod cart;
pub mod coupon;
pub mod inventory;
pub mod order;
pub mod payment;
pub mod variant;

/// Shared fixtures for repository tests.
#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{Duration, Utc};
    use storefront_core::{Address, Variant};

    use crate::{Database, DbConfig, NewAddress, NewCoupon, NewVariant};

    pub async fn db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    pub async fn variant(db: &Database, sku: &str, base_price: i64, discount: i64, stock: i64) -> Variant {
        db.variants()
            .insert(NewVariant {
                sku: sku.to_string(),
                name: format!("Variant {sku}"),
                base_price,
                discount_percent: discount,
                stock,
            })
            .await
            .unwrap()
    }

    pub async fn address(db: &Database, user_id: &str) -> Address {
        db.addresses()
            .insert(NewAddress {
                user_id: user_id.to_string(),
                recipient: "Sara Ahmadi".to_string(),
                line1: "12 Valiasr St".to_string(),
                city: "Tehran".to_string(),
                postal_code: "1234567890".to_string(),
                phone: "09120000000".to_string(),
            })
            .await
            .unwrap()
    }

    pub fn coupon(code: &str, discount_percent: i64) -> NewCoupon {
        NewCoupon {
            code: code.to_string(),
            discount_percent,
            expires_at: Utc::now() + Duration::days(7),
            active: true,
            usage_limit: None,
            allowed_users: Vec::new(),
        }
    }
}
