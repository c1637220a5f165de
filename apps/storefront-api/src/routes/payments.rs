//! Payment endpoints.
//!
//! ```text
//! POST /payments/{order_id}/request ──► { authority, redirect_url }
//!                                             │
//!                       browser ──► gateway ◄─┘
//!                                     │
//! GET /payments/verify?Authority=..&Status=OK|NOK
//!      │
//!      ▼
//! PaymentService::reconcile ──► 303 to success_url / failure_url
//! ```
//!
//! Once the authority resolves to an order, every outcome of the callback is
//! a redirect: reconcile errors are logged and sent to `failure_url`. Only a
//! missing or unknown authority is answered with a JSON error.

use axum::extract::{Path, Query, State};
use axum::response::Redirect;
use axum::Json;
use serde::{Deserialize, Serialize};
use storefront_core::{GatewayStatusHint, OrderStatus, ValidationError};
use tracing::{info, warn};

use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult, ErrorCode};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct PaymentRequestResponse {
    pub order_id: String,
    pub authority: String,
    pub redirect_url: String,
    /// In gateway units.
    pub amount: i64,
}

/// Query string the gateway appends to the callback URL.
#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "Authority")]
    pub authority: Option<String>,
    #[serde(rename = "Status")]
    pub status: Option<String>,
}

pub async fn request_payment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(order_id): Path<String>,
) -> ApiResult<Json<PaymentRequestResponse>> {
    let redirect = state.payments.request_payment(user.id(), &order_id).await?;

    Ok(Json(PaymentRequestResponse {
        order_id: redirect.order_id,
        authority: redirect.authority,
        redirect_url: redirect.redirect_url,
        amount: redirect.amount.minor(),
    }))
}

/// Gateway callback. Not authenticated: the authority token identifies the
/// attempt, and success is only trusted after server-side verification.
pub async fn verify(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> ApiResult<Redirect> {
    let authority = query
        .authority
        .as_deref()
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .ok_or_else(|| {
            ApiError::from(ValidationError::Required {
                field: "Authority".to_string(),
            })
        })?;
    let hint = GatewayStatusHint::from_query(query.status.as_deref().unwrap_or_default());

    let attempt = state
        .db
        .payments()
        .get_by_authority(authority)
        .await?
        .ok_or_else(|| ApiError::new(ErrorCode::NotFound, "Unknown payment authority"))?;

    let target = match state.payments.reconcile(authority, hint).await {
        Ok(order) if order.status == OrderStatus::Paid => {
            info!(order_id = %order.id, "Payment callback handled, order paid");
            state.redirects.success_for(&order.id)
        }
        Ok(order) => {
            info!(order_id = %order.id, status = %order.status, "Payment callback handled");
            state.redirects.failure_for(&order.id)
        }
        Err(e) => {
            let err = ApiError::from(e);
            warn!(
                order_id = %attempt.order_id,
                authority = %authority,
                code = ?err.code,
                message = %err.message,
                "Payment callback failed"
            );
            state.redirects.failure_for(&attempt.order_id)
        }
    };

    Ok(Redirect::to(&target))
}
