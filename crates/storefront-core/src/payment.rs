//! # Payment Attempts
//!
//! The payment attempt status machine and the pure half of reconciliation.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  request_payment ──► gateway issues authority ──► attempt PENDING       │
//! │                                                        │                │
//! │                      browser returns to callback       │                │
//! │                      with (Authority, Status)          ▼                │
//! │                                                  plan_reconcile         │
//! │                                                        │                │
//! │          ┌───────────────────────┬─────────────────────┤                │
//! │          ▼                       ▼                     ▼                │
//! │   AlreadySettled          FailWithoutVerify         Verify              │
//! │   (replay: no-op)         (user cancelled)      (ask the gateway)       │
//! │                                  │               │            │         │
//! │                                  ▼          verified     rejected       │
//! │                           attempt FAILED        │            │          │
//! │                           order   FAILED        ▼            ▼          │
//! │                           stock released  SUCCESS/PAID  FAILED/FAILED   │
//! │                                                         stock released  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::order::OrderStatus;

// =============================================================================
// Payment Status
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Authority issued, waiting for the callback.
    Pending,
    /// Verified by the gateway. Terminal.
    Success,
    /// Cancelled, rejected or superseded. Terminal.
    Failed,
}

impl PaymentStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Success => "success",
            PaymentStatus::Failed => "failed",
        }
    }

    pub const fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }

    pub fn transition(self, to: PaymentStatus) -> CoreResult<PaymentStatus> {
        match (self, to) {
            (PaymentStatus::Pending, PaymentStatus::Success)
            | (PaymentStatus::Pending, PaymentStatus::Failed) => Ok(to),
            _ => Err(CoreError::InvalidTransition {
                entity: "payment attempt",
                from: self.to_string(),
                to: to.to_string(),
            }),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Payment Attempt
// =============================================================================

/// One round trip through the gateway for an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct PaymentAttempt {
    pub id: String,
    pub order_id: String,
    /// Opaque token issued by the gateway. Unique.
    pub authority: String,
    /// Amount sent to the gateway, already in gateway units.
    pub amount: i64,
    pub status: PaymentStatus,
    /// Gateway reference, set on success.
    pub ref_id: Option<String>,
    /// Gateway result code from verification, if any.
    pub gateway_code: Option<i64>,
    /// Raw verification payload kept for audit.
    pub raw_response: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentAttempt {
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_minor(self.amount)
    }
}

// =============================================================================
// Gateway Status Hint
// =============================================================================

/// What the gateway's redirect claims happened. Only a hint: success still
/// has to be verified server-to-server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GatewayStatusHint {
    Ok,
    Cancelled,
}

impl GatewayStatusHint {
    /// The gateway sends `Status=OK` on success and anything else otherwise.
    pub fn from_query(status: &str) -> Self {
        if status == "OK" {
            GatewayStatusHint::Ok
        } else {
            GatewayStatusHint::Cancelled
        }
    }
}

// =============================================================================
// Reconcile Planning
// =============================================================================

/// What `reconcile` has to do for a given pair of stored states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileStep {
    /// Attempt is terminal. Return the order as it is.
    AlreadySettled,
    /// User cancelled at the gateway. Fail without asking it.
    FailWithoutVerify,
    /// Ask the gateway to verify, then settle.
    Verify,
}

/// Decides the next reconcile step.
///
/// ## Consistency checks
/// - a SUCCESS attempt must belong to a PAID order
/// - a PENDING attempt must belong to a PENDING order
///
/// Anything else means two writers disagreed about the order, which is
/// reported rather than papered over.
pub fn plan_reconcile(
    attempt: PaymentStatus,
    order: OrderStatus,
    hint: GatewayStatusHint,
) -> CoreResult<ReconcileStep> {
    match (attempt, order) {
        (PaymentStatus::Success, OrderStatus::Paid) => Ok(ReconcileStep::AlreadySettled),
        (PaymentStatus::Success, other) => Err(CoreError::Consistency(format!(
            "successful payment attempt on a {other} order"
        ))),
        // A superseded attempt may be FAILED while a later one paid the order.
        (PaymentStatus::Failed, _) => Ok(ReconcileStep::AlreadySettled),
        (PaymentStatus::Pending, OrderStatus::Pending) => Ok(match hint {
            GatewayStatusHint::Ok => ReconcileStep::Verify,
            GatewayStatusHint::Cancelled => ReconcileStep::FailWithoutVerify,
        }),
        (PaymentStatus::Pending, other) => Err(CoreError::Consistency(format!(
            "pending payment attempt on a {other} order"
        ))),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
