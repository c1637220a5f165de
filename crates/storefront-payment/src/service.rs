//! # Payment Service
//!
//! Drives a payment through the gateway and into the database.
//!
//! ## Request
//! ```text
//! request_payment(user, order)
//!      │
//!      ├── order owned by user, still PENDING?      (read, no lock)
//!      ├── gateway.request_payment(total × multiplier)   ◄── no transaction open
//!      │        └── GatewayError → nothing persisted
//!      └── payments().open_attempt(..)              (BEGIN IMMEDIATE, re-checks order)
//! ```
//!
//! ## Reconcile
//! ```text
//! reconcile(authority, hint)
//!      │
//!      ▼
//! plan_reconcile(attempt.status, order.status, hint)
//!      ├── AlreadySettled     → return order as stored
//!      ├── FailWithoutVerify  → settle_failure
//!      └── Verify             → gateway.verify_payment   ◄── no transaction open
//!                                  ├── verified   → settle_success
//!                                  ├── unverified → settle_failure
//!                                  └── GatewayError → attempt stays PENDING, caller may retry
//! ```
//!
//! The settle methods re-check state inside their transaction, so a callback
//! that loses a race with another callback becomes a no-op there. A verified
//! payment whose order was failed meanwhile is recorded on the attempt and
//! reported as a consistency error.

use std::sync::Arc;

use storefront_core::payment::plan_reconcile;
use storefront_core::{CoreError, GatewayStatusHint, Money, Order, ReconcileStep, ValidationError};
use storefront_db::{Database, Settlement};
use tracing::{info, warn};

use crate::error::PaymentResult;
use crate::gateway::PaymentGateway;

/// What the caller needs to send the user to the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRedirect {
    pub order_id: String,
    pub authority: String,
    pub redirect_url: String,
    /// Amount sent to the gateway, in gateway units.
    pub amount: Money,
}

#[derive(Clone)]
pub struct PaymentService {
    db: Database,
    gateway: Arc<dyn PaymentGateway>,
    amount_multiplier: i64,
}

impl PaymentService {
    pub fn new(db: Database, gateway: Arc<dyn PaymentGateway>, amount_multiplier: i64) -> Self {
        PaymentService {
            db,
            gateway,
            amount_multiplier,
        }
    }

    /// Obtains an authority for the order and records a PENDING attempt.
    pub async fn request_payment(&self, user_id: &str, order_id: &str) -> PaymentResult<PaymentRedirect> {
        let order = self
            .db
            .orders()
            .get_for_user(user_id, order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;
        order.ensure_payable()?;

        let amount = order
            .total_price()
            .checked_scale(self.amount_multiplier)
            .ok_or(CoreError::AmountOverflow("gateway amount"))?;
        if amount.minor() <= 0 {
            return Err(CoreError::from(ValidationError::MustBePositive {
                field: "amount".to_string(),
            })
            .into());
        }

        let description = format!("Payment for order {}", order.id);
        let authority = match self.gateway.request_payment(amount, &description).await {
            Ok(authority) => authority,
            Err(e) => {
                warn!(order_id = %order.id, error = %e, "Gateway payment request failed");
                return Err(e.into());
            }
        };

        let attempt = self
            .db
            .payments()
            .open_attempt(&order.id, &authority, amount)
            .await?;

        info!(
            order_id = %order.id,
            authority = %attempt.authority,
            amount = attempt.amount,
            "Payment requested"
        );

        Ok(PaymentRedirect {
            order_id: order.id,
            redirect_url: self.gateway.redirect_url(&attempt.authority),
            authority: attempt.authority,
            amount,
        })
    }

    /// Settles the attempt behind `authority` and returns the order.
    ///
    /// Safe to call any number of times for the same authority.
    pub async fn reconcile(&self, authority: &str, hint: GatewayStatusHint) -> PaymentResult<Order> {
        let attempt = self
            .db
            .payments()
            .get_by_authority(authority)
            .await?
            .ok_or_else(|| CoreError::PaymentAttemptNotFound(authority.to_string()))?;

        let order = self.db.orders().get(&attempt.order_id).await?.ok_or_else(|| {
            CoreError::Consistency(format!(
                "payment attempt {} references missing order {}",
                attempt.id, attempt.order_id
            ))
        })?;

        match plan_reconcile(attempt.status, order.status, hint)? {
            ReconcileStep::AlreadySettled => Ok(order),

            ReconcileStep::FailWithoutVerify => {
                info!(authority = %authority, order_id = %order.id, "Payment cancelled by user");
                Ok(self
                    .db
                    .payments()
                    .settle_failure(authority, Settlement::default())
                    .await?)
            }

            ReconcileStep::Verify => {
                let verification = match self.gateway.verify_payment(attempt.amount(), authority).await {
                    Ok(v) => v,
                    Err(e) => {
                        warn!(authority = %authority, error = %e, "Gateway verify failed, attempt left pending");
                        return Err(e.into());
                    }
                };

                let settlement = Settlement {
                    ref_id: verification.ref_id.clone(),
                    gateway_code: verification.code,
                    raw_response: Some(verification.raw_string()),
                };

                let payments = self.db.payments();
                let order = if verification.verified {
                    payments.settle_success(authority, settlement).await?
                } else {
                    payments.settle_failure(authority, settlement).await?
                };
                Ok(order)
            }
        }
    }
}
