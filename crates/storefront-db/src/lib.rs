//! # storefront-db: Database Layer for the Storefront
//!
//! SQLite persistence for the checkout, plus the two components whose
//! correctness depends on transactions: the inventory ledger and the order
//! assembler.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Storefront Data Flow                             │
//! │                                                                         │
//! │  storefront-api / storefront-payment                                   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  storefront-db (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐   ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories  │   │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │                │   │  (embedded)  │  │   │
//! │  │   │               │    │ VariantRepo    │   │              │  │   │
//! │  │   │ SqlitePool    │◄───│ InventoryLedger│   │ 001_init.sql │  │   │
//! │  │   │ BEGIN         │    │ CouponRepo     │   │              │  │   │
//! │  │   │  IMMEDIATE    │    │ CartRepo       │   │              │  │   │
//! │  │   │               │    │ OrderRepo      │   │              │  │   │
//! │  │   │               │    │ PaymentRepo    │   │              │  │   │
//! │  │   └───────────────┘    └────────────────┘   └──────────────┘  │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite (WAL)                                                          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and write transactions
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repositories, ledger and order assembler
//!
//! ## Usage
//!
//! ```rust,ignore
//! use storefront_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("storefront.db")).await?;
//! let order = db.orders().create_order_from_cart(&checkout).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult, StoreError, StoreResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::address::{AddressRepository, NewAddress};
pub use repository::cart::CartRepository;
pub use repository::coupon::{CouponRepository, NewCoupon};
pub use repository::inventory::InventoryLedger;
pub use repository::order::{Checkout, OrderRepository};
pub use repository::payment::{PaymentRepository, Settlement};
pub use repository::variant::{NewVariant, VariantRepository};
