//! # Payment Repository
//!
//! Persistence side of payment reconciliation. Gateway calls never happen
//! here: callers talk to the gateway first, then hand the outcome to one of
//! the settle methods, which apply it in a single write transaction.
//!
//! ## Attempt Lifecycle
//! ```text
//!            open_attempt
//!                 │
//!                 ▼
//!             PENDING ──── superseded by a newer attempt ───► FAILED
//!              │    │
//!  settle_success   settle_failure
//!              │    │
//!              ▼    ▼
//!        SUCCESS    FAILED
//!   (order → PAID)  (order → FAILED, stock released)
//! ```
//!
//! Settling an attempt that is already terminal is a no-op returning the
//! order as stored. Replayed callbacks therefore never release stock twice.
//!
//! The one exception is a verified payment for an attempt or order that is no
//! longer PENDING (e.g. the expiry sweep failed it while the gateway call was
//! in flight). The gateway has captured the funds, so the outcome is written
//! onto the attempt for a manual refund and the call fails with
//! [`CoreError::Consistency`].

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult, StoreResult};
use crate::pool::begin_immediate;
use crate::repository::order::{fail_order_in, fetch_order_in, mark_paid_in};
use storefront_core::payment::plan_reconcile;
use storefront_core::{
    CoreError, GatewayStatusHint, Money, Order, OrderStatus, PaymentAttempt, PaymentStatus,
    ReconcileStep, ValidationError,
};

/// What the gateway reported for an attempt.
#[derive(Debug, Clone, Default)]
pub struct Settlement {
    pub ref_id: Option<String>,
    pub gateway_code: Option<i64>,
    /// Raw gateway payload, stored for audit.
    pub raw_response: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PaymentRepository {
    pool: SqlitePool,
}

impl PaymentRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PaymentRepository { pool }
    }

    pub async fn get_by_authority(&self, authority: &str) -> DbResult<Option<PaymentAttempt>> {
        let mut conn = self.pool.acquire().await?;
        fetch_attempt_in(&mut conn, authority).await
    }

    /// All attempts for an order, oldest first.
    pub async fn list_for_order(&self, order_id: &str) -> DbResult<Vec<PaymentAttempt>> {
        let attempts = sqlx::query_as::<_, PaymentAttempt>(
            r#"
            SELECT id, order_id, authority, amount, status, ref_id,
                   gateway_code, raw_response, created_at, updated_at
            FROM payment_attempts
            WHERE order_id = ?1
            ORDER BY created_at
            "#,
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(attempts)
    }

    /// Records a PENDING attempt for an authority the gateway just issued.
    ///
    /// The order must still be payable. A previous PENDING attempt is marked
    /// FAILED first; the order itself stays PENDING and keeps its stock.
    pub async fn open_attempt(
        &self,
        order_id: &str,
        authority: &str,
        amount: Money,
    ) -> StoreResult<PaymentAttempt> {
        if amount.minor() <= 0 {
            return Err(ValidationError::MustBePositive {
                field: "amount".to_string(),
            }
            .into());
        }

        let mut tx = begin_immediate(&self.pool).await?;

        let order = fetch_order_in(&mut tx, order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;
        order.ensure_payable()?;

        let now = Utc::now();

        let superseded = sqlx::query(
            r#"
            UPDATE payment_attempts
            SET status = 'failed', updated_at = ?2
            WHERE order_id = ?1 AND status = 'pending'
            "#,
        )
        .bind(order_id)
        .bind(now)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if superseded > 0 {
            info!(order_id = %order_id, superseded, "Superseded pending payment attempt");
        }

        let attempt = PaymentAttempt {
            id: Uuid::new_v4().to_string(),
            order_id: order_id.to_string(),
            authority: authority.to_string(),
            amount: amount.minor(),
            status: PaymentStatus::Pending,
            ref_id: None,
            gateway_code: None,
            raw_response: None,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO payment_attempts (
                id, order_id, authority, amount, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&attempt.id)
        .bind(&attempt.order_id)
        .bind(&attempt.authority)
        .bind(attempt.amount)
        .bind(attempt.status)
        .bind(attempt.created_at)
        .bind(attempt.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match DbError::from(e) {
            DbError::UniqueViolation { field, .. } => DbError::duplicate(field, authority),
            other => other,
        })?;

        tx.commit().await?;

        info!(
            order_id = %order_id,
            authority = %authority,
            amount = attempt.amount,
            "Payment attempt opened"
        );
        Ok(attempt)
    }

    /// Applies a verified payment: attempt → SUCCESS, order → PAID.
    ///
    /// A replay after the order was paid returns it unchanged. If the attempt
    /// or order was failed in the meantime, the gateway outcome is recorded on
    /// the attempt and `CoreError::Consistency` is returned.
    pub async fn settle_success(&self, authority: &str, settlement: Settlement) -> StoreResult<Order> {
        let mut tx = begin_immediate(&self.pool).await?;
        let (attempt, order) = load_pair_in(&mut tx, authority).await?;

        match (attempt.status, order.status) {
            (PaymentStatus::Success, OrderStatus::Paid) => {
                debug!(authority = %authority, "Attempt already settled");
                return Ok(order);
            }
            (PaymentStatus::Pending, OrderStatus::Pending) => {}
            (attempt_status, order_status) => {
                record_outcome_in(&mut tx, authority, &settlement).await?;
                tx.commit().await?;

                error!(
                    order_id = %order.id,
                    authority = %authority,
                    attempt_status = %attempt_status,
                    order_status = %order_status,
                    ref_id = settlement.ref_id.as_deref().unwrap_or(""),
                    "Verified payment arrived for a settled attempt, refund required"
                );
                return Err(CoreError::Consistency(format!(
                    "verified payment {authority} for a {attempt_status} attempt on a {order_status} order"
                ))
                .into());
            }
        }

        close_attempt_in(&mut tx, authority, PaymentStatus::Success, &settlement).await?;
        let order = mark_paid_in(&mut tx, order).await?;
        tx.commit().await?;

        info!(
            order_id = %order.id,
            authority = %authority,
            ref_id = settlement.ref_id.as_deref().unwrap_or(""),
            "Payment verified, order paid"
        );
        Ok(order)
    }

    /// Applies a cancelled or unverified payment: attempt → FAILED,
    /// order → FAILED, stock released.
    pub async fn settle_failure(&self, authority: &str, settlement: Settlement) -> StoreResult<Order> {
        let mut tx = begin_immediate(&self.pool).await?;
        let (attempt, order) = load_pair_in(&mut tx, authority).await?;

        match plan_reconcile(attempt.status, order.status, GatewayStatusHint::Cancelled)? {
            ReconcileStep::AlreadySettled => {
                debug!(authority = %authority, status = %attempt.status, "Attempt already settled");
                return Ok(order);
            }
            ReconcileStep::Verify | ReconcileStep::FailWithoutVerify => {}
        }

        close_attempt_in(&mut tx, authority, PaymentStatus::Failed, &settlement).await?;
        let order = fail_order_in(&mut tx, order).await?;
        tx.commit().await?;

        info!(
            order_id = %order.id,
            authority = %authority,
            gateway_code = ?settlement.gateway_code,
            "Payment failed, order failed"
        );
        Ok(order)
    }
}

async fn fetch_attempt_in(
    conn: &mut SqliteConnection,
    authority: &str,
) -> DbResult<Option<PaymentAttempt>> {
    let attempt = sqlx::query_as::<_, PaymentAttempt>(
        r#"
        SELECT id, order_id, authority, amount, status, ref_id,
               gateway_code, raw_response, created_at, updated_at
        FROM payment_attempts
        WHERE authority = ?1
        "#,
    )
    .bind(authority)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(attempt)
}

/// The attempt for `authority` and the order it pays for.
async fn load_pair_in(
    conn: &mut SqliteConnection,
    authority: &str,
) -> StoreResult<(PaymentAttempt, Order)> {
    let attempt = fetch_attempt_in(conn, authority)
        .await?
        .ok_or_else(|| CoreError::PaymentAttemptNotFound(authority.to_string()))?;

    let order = fetch_order_in(conn, &attempt.order_id)
        .await?
        .ok_or_else(|| {
            CoreError::Consistency(format!(
                "payment attempt {} references missing order {}",
                attempt.id, attempt.order_id
            ))
        })?;

    Ok((attempt, order))
}

/// PENDING → `to` for one attempt, recording the gateway outcome.
async fn close_attempt_in(
    conn: &mut SqliteConnection,
    authority: &str,
    to: PaymentStatus,
    settlement: &Settlement,
) -> StoreResult<()> {
    PaymentStatus::Pending.transition(to)?;

    let result = sqlx::query(
        r#"
        UPDATE payment_attempts
        SET status = ?2, ref_id = ?3, gateway_code = ?4, raw_response = ?5, updated_at = ?6
        WHERE authority = ?1 AND status = 'pending'
        "#,
    )
    .bind(authority)
    .bind(to)
    .bind(&settlement.ref_id)
    .bind(settlement.gateway_code)
    .bind(&settlement.raw_response)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(CoreError::InvalidTransition {
            entity: "payment attempt",
            from: PaymentStatus::Pending.to_string(),
            to: to.to_string(),
        }
        .into());
    }

    Ok(())
}

/// Stores the gateway outcome without touching the attempt's status.
///
/// Only fills columns still empty, so an earlier SUCCESS record is kept.
async fn record_outcome_in(
    conn: &mut SqliteConnection,
    authority: &str,
    settlement: &Settlement,
) -> DbResult<()> {
    sqlx::query(
        r#"
        UPDATE payment_attempts
        SET ref_id = COALESCE(ref_id, ?2),
            gateway_code = COALESCE(gateway_code, ?3),
            raw_response = COALESCE(raw_response, ?4),
            updated_at = ?5
        WHERE authority = ?1
        "#,
    )
    .bind(authority)
    .bind(&settlement.ref_id)
    .bind(settlement.gateway_code)
    .bind(&settlement.raw_response)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(())
}
