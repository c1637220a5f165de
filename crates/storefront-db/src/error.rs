//! # Database Error Types
//!
//! Error types for database operations.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  SQLite Error (sqlx::Error)                                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  DbError ← Adds context and categorization                             │
//! │       │                                                                 │
//! │       │            CoreError (business rule refused)                   │
//! │       │                 │                                               │
//! │       ▼                 ▼                                               │
//! │  StoreError ← what transactional operations return                     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  PaymentError / ApiError                                               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Returning an error from inside a transaction drops the `Transaction`
//! without committing, which rolls back every write made so far.

use storefront_core::{CoreError, ErrorKind};
use thiserror::Error;

/// Storage failure, classified by what the caller can do about it.
#[derive(Debug, Error)]
pub enum DbError {
    /// A lookup that must succeed found nothing.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// UNIQUE / PRIMARY KEY conflict: a duplicate SKU, coupon code,
    /// authority or redemption.
    #[error("Duplicate {field}: '{value}' already exists")]
    UniqueViolation { field: String, value: String },

    #[error("Foreign key violation: {0}")]
    ForeignKeyViolation(String),

    /// A CHECK constraint fired, e.g. `stock >= 0`. The guarded UPDATEs
    /// should make this unreachable.
    #[error("Check constraint violation: {0}")]
    CheckViolation(String),

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("Query failed: {0}")]
    QueryFailed(String),

    #[error("Transaction failed: {0}")]
    TransactionFailed(String),

    /// Every pooled connection stayed busy past `acquire_timeout`.
    #[error("Connection pool exhausted")]
    PoolExhausted,

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn duplicate(field: impl Into<String>, value: impl Into<String>) -> Self {
        DbError::UniqueViolation {
            field: field.into(),
            value: value.into(),
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DbError::UniqueViolation { .. })
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            DbError::NotFound { .. } => ErrorKind::NotFound,
            DbError::UniqueViolation { .. } | DbError::ForeignKeyViolation(_) => {
                ErrorKind::Validation
            }
            DbError::CheckViolation(_) => ErrorKind::Consistency,
            DbError::ConnectionFailed(_)
            | DbError::MigrationFailed(_)
            | DbError::QueryFailed(_)
            | DbError::TransactionFailed(_)
            | DbError::PoolExhausted
            | DbError::Internal(_) => ErrorKind::Internal,
        }
    }
}

/// `"UNIQUE constraint failed: coupons.code"` → `"coupons.code"`.
fn constraint_target(message: &str) -> String {
    message
        .split_once(": ")
        .map(|(_, target)| target.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        use sqlx::error::ErrorKind as SqlxKind;

        match err {
            sqlx::Error::RowNotFound => DbError::not_found("Record", "unknown"),
            sqlx::Error::Database(db_err) => {
                let message = db_err.message().to_string();
                match db_err.kind() {
                    SqlxKind::UniqueViolation => {
                        DbError::duplicate(constraint_target(&message), "unknown")
                    }
                    SqlxKind::ForeignKeyViolation => DbError::ForeignKeyViolation(message),
                    SqlxKind::CheckViolation => DbError::CheckViolation(message),
                    _ => DbError::QueryFailed(message),
                }
            }
            sqlx::Error::PoolTimedOut => DbError::PoolExhausted,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool is closed".to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

/// Result type for database operations.
pub type DbResult<T> = Result<T, DbError>;

// =============================================================================
// Store Error
// =============================================================================

/// Error from an operation that enforces business rules inside a transaction.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Db(#[from] DbError),
}

impl StoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StoreError::Core(e) => e.kind(),
            StoreError::Db(e) => e.kind(),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Db(err.into())
    }
}

impl From<storefront_core::ValidationError> for StoreError {
    fn from(err: storefront_core::ValidationError) -> Self {
        StoreError::Core(err.into())
    }
}

impl From<storefront_core::CouponError> for StoreError {
    fn from(err: storefront_core::CouponError) -> Self {
        StoreError::Core(err.into())
    }
}

/// Result type for transactional store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_target() {
        assert_eq!(
            constraint_target("UNIQUE constraint failed: variants.sku"),
            "variants.sku"
        );
        assert_eq!(constraint_target("garbled"), "unknown");
    }

    #[test]
    fn test_store_error_kind_passthrough() {
        let err: StoreError = CoreError::EmptyOrder.into();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err: StoreError = DbError::PoolExhausted.into();
        assert_eq!(err.kind(), ErrorKind::Internal);

        let err: StoreError = DbError::not_found("Order", "o-1").into();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "Order not found: o-1");
    }
}
