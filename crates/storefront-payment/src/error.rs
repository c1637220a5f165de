//! # Payment Error Types
//!
//! ```text
//! reqwest::Error / bad JSON / gateway refusal
//!      │
//!      ▼
//! GatewayError  ── retryable by the caller, nothing committed locally
//!      │
//!      ▼
//! PaymentError ◄── StoreError (business rule or database)
//! ```

use storefront_core::{CoreError, ErrorKind};
use storefront_db::{DbError, StoreError};
use thiserror::Error;

/// Failure talking to the payment gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The call did not complete within the configured timeout.
    #[error("Gateway timed out")]
    Timeout,

    /// Connection refused, DNS failure, TLS failure, ...
    #[error("Gateway transport error: {0}")]
    Transport(String),

    /// Non-200 HTTP status.
    #[error("Gateway returned HTTP {0}")]
    Status(u16),

    /// The gateway answered and refused the request.
    #[error("Gateway rejected request (code {code}): {message}")]
    Rejected { code: i64, message: String },

    /// The body did not have the expected shape.
    #[error("Malformed gateway response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GatewayError::Timeout
        } else if err.is_decode() {
            GatewayError::MalformedResponse(err.to_string())
        } else if let Some(status) = err.status() {
            GatewayError::Status(status.as_u16())
        } else {
            GatewayError::Transport(err.to_string())
        }
    }
}

/// Error from `PaymentService`.
#[derive(Debug, Error)]
pub enum PaymentError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PaymentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PaymentError::Gateway(_) => ErrorKind::Gateway,
            PaymentError::Store(e) => e.kind(),
        }
    }
}

impl From<CoreError> for PaymentError {
    fn from(err: CoreError) -> Self {
        PaymentError::Store(err.into())
    }
}

impl From<DbError> for PaymentError {
    fn from(err: DbError) -> Self {
        PaymentError::Store(err.into())
    }
}

pub type PaymentResult<T> = Result<T, PaymentError>;
