//! Error types for the HTTP API.
//!
//! Every lower-layer error converts into [`ApiError`], which renders as
//! `{ "code": "...", "message": "..." }` with a matching status.
//!
//! ```text
//! ValidationError ─┐
//! CoreError ───────┤
//! DbError ─────────┼──► ApiError ──► (StatusCode, Json)
//! StoreError ──────┤
//! PaymentError ────┘
//! ```
//!
//! Consistency and internal failures are logged in full and answered with a
//! generic message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use storefront_core::{CoreError, ErrorKind, ValidationError};
use storefront_db::{DbError, StoreError};
use storefront_payment::PaymentError;
use tracing::error;

/// Machine-readable error code sent to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    ValidationError,
    Unauthorized,
    NotFound,
    Conflict,
    BusinessRule,
    GatewayError,
    InternalError,
}

impl ErrorCode {
    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::ValidationError => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::BusinessRule => StatusCode::UNPROCESSABLE_ENTITY,
            ErrorCode::GatewayError => StatusCode::BAD_GATEWAY,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// API error response body.
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Unauthorized, message)
    }

    pub fn internal() -> Self {
        ApiError::new(ErrorCode::InternalError, "Internal server error")
    }

    fn from_kind(kind: ErrorKind, detail: &dyn std::fmt::Display) -> Self {
        match kind {
            ErrorKind::Validation => ApiError::new(ErrorCode::ValidationError, detail.to_string()),
            ErrorKind::NotFound => ApiError::new(ErrorCode::NotFound, detail.to_string()),
            ErrorKind::BusinessRule => ApiError::new(ErrorCode::BusinessRule, detail.to_string()),
            ErrorKind::Gateway => ApiError::new(ErrorCode::GatewayError, detail.to_string()),
            ErrorKind::Consistency => {
                error!(error = %detail, "Consistency violation");
                ApiError::internal()
            }
            ErrorKind::Internal => {
                error!(error = %detail, "Internal error");
                ApiError::internal()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.code.status(), Json(self)).into_response()
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match &err {
            // Stock, payment state: the request may succeed later
            CoreError::InsufficientStock { .. }
            | CoreError::AlreadyPaid { .. }
            | CoreError::OrderNotPending { .. } => ApiError::new(ErrorCode::Conflict, err.to_string()),
            _ => ApiError::from_kind(err.kind(), &err),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::new(ErrorCode::ValidationError, err.to_string())
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        ApiError::from_kind(err.kind(), &err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Core(e) => e.into(),
            StoreError::Db(e) => e.into(),
        }
    }
}

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::Store(e) => e.into(),
            PaymentError::Gateway(e) => ApiError::new(ErrorCode::GatewayError, e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storefront_core::{CouponError, OrderStatus};
    use storefront_payment::GatewayError;

    #[test]
    fn test_status_mapping() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (CoreError::EmptyOrder.into(), StatusCode::BAD_REQUEST),
            (CoreError::OrderNotFound("o".into()).into(), StatusCode::NOT_FOUND),
            (
                CoreError::InsufficientStock {
                    variant_id: "v".into(),
                    available: 1,
                    requested: 2,
                }
                .into(),
                StatusCode::CONFLICT,
            ),
            (
                CoreError::OrderNotPending {
                    order_id: "o".into(),
                    status: OrderStatus::Failed,
                }
                .into(),
                StatusCode::CONFLICT,
            ),
            (
                CoreError::InvalidCoupon(CouponError::Expired).into(),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                PaymentError::Gateway(GatewayError::Timeout).into(),
                StatusCode::BAD_GATEWAY,
            ),
            (
                DbError::QueryFailed("disk I/O error".into()).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            assert_eq!(err.code.status(), status, "{err:?}");
        }
    }

    #[test]
    fn test_internal_detail_is_hidden() {
        let err: ApiError = CoreError::Consistency("stock went negative on v-1".into()).into();
        assert_eq!(err.code, ErrorCode::InternalError);
        assert!(!err.message.contains("v-1"));
    }
}
