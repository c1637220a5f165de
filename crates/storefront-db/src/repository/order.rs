//! # Order Repository
//!
//! Order assembly, status transitions and order queries.
//!
//! ## Order Assembly (one `BEGIN IMMEDIATE` transaction)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  create_order(checkout, items)                                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  normalize_items ── merge duplicates, sort by variant id               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  address owned by user?  ──no──► InvalidAddress                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  for item in sorted items:                                              │
//! │      reserve_in(variant, qty) ──fail──► VariantUnavailable /            │
//! │      snapshot effective price          InsufficientStock                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  coupon? validate ──fail──► InvalidCoupon(reason)                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  totals: subtotal, discount, tax, total                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  INSERT orders (PENDING) + order_lines                                  │
//! │  redeem coupon (PRIMARY KEY guards single use)                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  COMMIT  (any error above: rollback, every reservation undone)         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Status Transitions
//! `PENDING → PAID` and `PENDING → FAILED` only. Each is a conditional
//! `UPDATE ... WHERE status = 'pending'`, and the FAILED transition is the
//! only place stock is released. An order therefore releases its stock at
//! most once however many callers race to fail it.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{DbResult, StoreResult};
use crate::pool::begin_immediate;
use crate::repository::address::owned_by_in;
use crate::repository::cart::{clear_in, read_items_in};
use crate::repository::coupon::{load_by_code_in, redeem_in};
use crate::repository::inventory::{release_in, reserve_in};
use crate::repository::variant::fetch_variant_in;
use storefront_core::order::normalize_items;
use storefront_core::validation::validate_user_id;
use storefront_core::{
    coupon, CoreError, Order, OrderItem, OrderLine, OrderStatus, OrderTotals, Percent,
    ShippingMethod,
};

/// Everything about a checkout except the items.
#[derive(Debug, Clone)]
pub struct Checkout {
    pub user_id: String,
    pub address_id: String,
    pub shipping_method: ShippingMethod,
    /// Blank is treated as no coupon.
    pub coupon_code: Option<String>,
    pub tax_percent: Percent,
}

impl Checkout {
    fn coupon_code(&self) -> Option<&str> {
        self.coupon_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }
}

#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Creates a PENDING order from an explicit item list.
    pub async fn create_order(&self, checkout: &Checkout, items: &[OrderItem]) -> StoreResult<Order> {
        validate_user_id(&checkout.user_id)?;
        let items = normalize_items(items)?;

        let mut tx = begin_immediate(&self.pool).await?;
        let order = assemble_in(&mut tx, checkout, &items).await?;
        tx.commit().await?;

        info!(
            order_id = %order.id,
            user_id = %order.user_id,
            lines = order.lines.len(),
            total = order.total_price,
            "Order created"
        );
        Ok(order)
    }

    /// Creates a PENDING order from the user's cart and empties the cart.
    ///
    /// The cart is read and cleared in the same transaction as the order.
    pub async fn create_order_from_cart(&self, checkout: &Checkout) -> StoreResult<Order> {
        validate_user_id(&checkout.user_id)?;

        let mut tx = begin_immediate(&self.pool).await?;
        let items = read_items_in(&mut tx, &checkout.user_id).await?;
        let items = normalize_items(&items)?;

        let order = assemble_in(&mut tx, checkout, &items).await?;
        clear_in(&mut tx, &checkout.user_id).await?;
        tx.commit().await?;

        info!(
            order_id = %order.id,
            user_id = %order.user_id,
            lines = order.lines.len(),
            total = order.total_price,
            "Order created from cart"
        );
        Ok(order)
    }

    /// Gets an order with its lines.
    pub async fn get(&self, id: &str) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        fetch_order_in(&mut conn, id).await
    }

    /// Gets an order with its lines only if `user_id` placed it.
    pub async fn get_for_user(&self, user_id: &str, id: &str) -> DbResult<Option<Order>> {
        Ok(self.get(id).await?.filter(|order| order.user_id == user_id))
    }

    /// Lists a user's orders, newest first, with lines.
    pub async fn list_for_user(&self, user_id: &str) -> DbResult<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;

        let mut orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, user_id, address_id, shipping_method, coupon_id, tax_percent,
                   subtotal, discount, tax, total_price, status, created_at, updated_at
            FROM orders
            WHERE user_id = ?1
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;

        for order in &mut orders {
            order.lines = fetch_lines_in(&mut conn, &order.id).await?;
        }

        Ok(orders)
    }

    /// PENDING orders created before `cutoff`, oldest first. Lines not loaded.
    ///
    /// Input for an external expiry sweep, which calls `release_pending`.
    pub async fn pending_older_than(&self, cutoff: DateTime<Utc>) -> DbResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(
            r#"
            SELECT id, user_id, address_id, shipping_method, coupon_id, tax_percent,
                   subtotal, discount, tax, total_price, status, created_at, updated_at
            FROM orders
            WHERE status = 'pending' AND created_at < ?1
            ORDER BY created_at
            "#,
        )
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        Ok(orders)
    }

    /// Fails a stale PENDING order and returns its stock.
    ///
    /// Any PENDING payment attempt for the order is failed as well, so a late
    /// gateway callback finds a terminal attempt and does nothing.
    pub async fn release_pending(&self, order_id: &str) -> StoreResult<Order> {
        let mut tx = begin_immediate(&self.pool).await?;

        let order = fetch_order_in(&mut tx, order_id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(order_id.to_string()))?;

        if order.status != OrderStatus::Pending {
            return Err(CoreError::OrderNotPending {
                order_id: order.id,
                status: order.status,
            }
            .into());
        }

        sqlx::query(
            r#"
            UPDATE payment_attempts
            SET status = 'failed', updated_at = ?2
            WHERE order_id = ?1 AND status = 'pending'
            "#,
        )
        .bind(order_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        let order = fail_order_in(&mut tx, order).await?;
        tx.commit().await?;

        info!(order_id = %order_id, "Stale pending order released");
        Ok(order)
    }
}

// =============================================================================
// Transaction Steps
// =============================================================================

/// Builds and persists an order inside the caller's write transaction.
///
/// `items` must already be normalized (merged and sorted by variant id).
async fn assemble_in(
    conn: &mut SqliteConnection,
    checkout: &Checkout,
    items: &[OrderItem],
) -> StoreResult<Order> {
    if !owned_by_in(conn, &checkout.user_id, &checkout.address_id).await? {
        return Err(CoreError::InvalidAddress {
            address_id: checkout.address_id.clone(),
        }
        .into());
    }

    let order_id = Uuid::new_v4().to_string();
    let mut lines = Vec::with_capacity(items.len());

    for (position, item) in items.iter().enumerate() {
        reserve_in(conn, &item.variant_id, item.quantity).await?;

        // Reserve succeeded, so the variant exists and is active
        let variant = fetch_variant_in(conn, &item.variant_id)
            .await?
            .ok_or_else(|| {
                CoreError::Consistency(format!("variant {} vanished after reserve", item.variant_id))
            })?;

        lines.push(OrderLine::snapshot(
            &order_id,
            position as i64,
            &variant,
            item.quantity,
        )?);
    }

    let now = Utc::now();

    let coupon = match checkout.coupon_code() {
        Some(code) => {
            let loaded = load_by_code_in(conn, code).await?;
            coupon::validate(loaded.as_ref(), &checkout.user_id, now)?;
            loaded
        }
        None => None,
    };

    let totals = OrderTotals::compute(
        lines.iter().map(OrderLine::line_total),
        coupon.as_ref().map(|c| c.discount()),
        checkout.tax_percent,
    )?;

    let order = Order {
        id: order_id,
        user_id: checkout.user_id.clone(),
        address_id: checkout.address_id.clone(),
        shipping_method: checkout.shipping_method,
        coupon_id: coupon.as_ref().map(|c| c.id.clone()),
        tax_percent: i64::from(checkout.tax_percent.value()),
        subtotal: totals.subtotal.minor(),
        discount: totals.discount.minor(),
        tax: totals.tax.minor(),
        total_price: totals.total.minor(),
        status: OrderStatus::Pending,
        created_at: now,
        updated_at: now,
        lines,
    };

    sqlx::query(
        r#"
        INSERT INTO orders (
            id, user_id, address_id, shipping_method, coupon_id, tax_percent,
            subtotal, discount, tax, total_price, status, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
        "#,
    )
    .bind(&order.id)
    .bind(&order.user_id)
    .bind(&order.address_id)
    .bind(order.shipping_method)
    .bind(&order.coupon_id)
    .bind(order.tax_percent)
    .bind(order.subtotal)
    .bind(order.discount)
    .bind(order.tax)
    .bind(order.total_price)
    .bind(order.status)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await?;

    for line in &order.lines {
        sqlx::query(
            r#"
            INSERT INTO order_lines (
                id, order_id, position, variant_id, sku_snapshot, name_snapshot,
                quantity, unit_price_at_purchase, line_total
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&line.id)
        .bind(&line.order_id)
        .bind(line.position)
        .bind(&line.variant_id)
        .bind(&line.sku_snapshot)
        .bind(&line.name_snapshot)
        .bind(line.quantity)
        .bind(line.unit_price_at_purchase)
        .bind(line.line_total)
        .execute(&mut *conn)
        .await?;
    }

    if let Some(coupon) = &coupon {
        redeem_in(conn, coupon, &order.user_id, &order.id).await?;
    }

    debug!(
        order_id = %order.id,
        subtotal = order.subtotal,
        discount = order.discount,
        tax = order.tax,
        total = order.total_price,
        "Order assembled"
    );

    Ok(order)
}

/// Loads an order and its lines on the caller's connection.
pub(crate) async fn fetch_order_in(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Order>> {
    let order = sqlx::query_as::<_, Order>(
        r#"
        SELECT id, user_id, address_id, shipping_method, coupon_id, tax_percent,
               subtotal, discount, tax, total_price, status, created_at, updated_at
        FROM orders
        WHERE id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    let Some(mut order) = order else {
        return Ok(None);
    };

    order.lines = fetch_lines_in(conn, &order.id).await?;
    Ok(Some(order))
}

async fn fetch_lines_in(conn: &mut SqliteConnection, order_id: &str) -> DbResult<Vec<OrderLine>> {
    let lines = sqlx::query_as::<_, OrderLine>(
        r#"
        SELECT id, order_id, position, variant_id, sku_snapshot, name_snapshot,
               quantity, unit_price_at_purchase, line_total
        FROM order_lines
        WHERE order_id = ?1
        ORDER BY position
        "#,
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(lines)
}

/// Moves an order from `from` to `to` if it is still in `from`.
///
/// Zero rows matched means another writer got there first.
pub(crate) async fn set_status_in(
    conn: &mut SqliteConnection,
    order_id: &str,
    from: OrderStatus,
    to: OrderStatus,
) -> StoreResult<()> {
    from.transition(to)?;

    let result = sqlx::query(
        "UPDATE orders SET status = ?3, updated_at = ?4 WHERE id = ?1 AND status = ?2",
    )
    .bind(order_id)
    .bind(from)
    .bind(to)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        warn!(order_id = %order_id, %from, %to, "Order status changed concurrently");
        return Err(CoreError::InvalidTransition {
            entity: "order",
            from: from.to_string(),
            to: to.to_string(),
        }
        .into());
    }

    Ok(())
}

/// Returns every line's quantity to stock.
async fn release_lines_in(conn: &mut SqliteConnection, order: &Order) -> StoreResult<()> {
    for line in &order.lines {
        release_in(conn, &line.variant_id, line.quantity).await?;
    }
    Ok(())
}

/// PENDING → FAILED plus stock release, on the caller's transaction.
pub(crate) async fn fail_order_in(conn: &mut SqliteConnection, mut order: Order) -> StoreResult<Order> {
    set_status_in(conn, &order.id, OrderStatus::Pending, OrderStatus::Failed).await?;
    release_lines_in(conn, &order).await?;

    order.status = OrderStatus::Failed;
    info!(order_id = %order.id, lines = order.lines.len(), "Order failed, stock released");
    Ok(order)
}

/// PENDING → PAID on the caller's transaction.
pub(crate) async fn mark_paid_in(conn: &mut SqliteConnection, mut order: Order) -> StoreResult<Order> {
    set_status_in(conn, &order.id, OrderStatus::Pending, OrderStatus::Paid).await?;
    order.status = OrderStatus::Paid;
    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support;
    use crate::{Database, NewVariant, StoreError};
    use storefront_core::{CouponError, DEFAULT_TAX_PERCENT};

    async fn checkout(db: &Database, user: &str, coupon_code: Option<&str>) -> Checkout {
        let address = test_support::address(db, user).await;
        Checkout {
            user_id: user.to_string(),
            address_id: address.id,
            shipping_method: ShippingMethod::Courier,
            coupon_code: coupon_code.map(str::to_string),
            tax_percent: Percent::new(DEFAULT_TAX_PERCENT).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_total_computation_example() {
        let db = test_support::db().await;
        let v = test_support::variant(&db, "JACKET", 100_000, 10, 5).await;
        db.coupons()
            .insert(test_support::coupon("SAVE20", 20))
            .await
            .unwrap();

        let checkout = checkout(&db, "user-1", Some("SAVE20")).await;
        let order = db
            .orders()
            .create_order(&checkout, &[OrderItem::new(&v.id, 2)])
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.lines[0].unit_price_at_purchase, 90_000);
        assert_eq!(order.subtotal, 180_000);
        assert_eq!(order.discount, 36_000);
        assert_eq!(order.tax, 14_400);
        assert_eq!(order.total_price, 158_400);
        assert_eq!(db.inventory().available(&v.id).await.unwrap(), 3);

        let stored = db.orders().get(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.total_price, 158_400);
        assert_eq!(stored.coupon_id, order.coupon_id);
        assert_eq!(stored.lines.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_items_merged_and_sorted() {
        let db = test_support::db().await;
        let a = test_support::variant(&db, "A", 100, 0, 10).await;
        let b = test_support::variant(&db, "B", 100, 0, 10).await;

        let checkout = checkout(&db, "user-1", None).await;
        let order = db
            .orders()
            .create_order(
                &checkout,
                &[
                    OrderItem::new(&b.id, 1),
                    OrderItem::new(&a.id, 2),
                    OrderItem::new(&b.id, 3),
                ],
            )
            .await
            .unwrap();

        assert_eq!(order.lines.len(), 2);
        let ids: Vec<_> = order.lines.iter().map(|l| l.variant_id.clone()).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        assert_eq!(db.inventory().available(&b.id).await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_empty_order_rejected() {
        let db = test_support::db().await;
        let checkout = checkout(&db, "user-1", None).await;

        let err = db.orders().create_order(&checkout, &[]).await.unwrap_err();
        assert!(matches!(err, StoreError::Core(CoreError::EmptyOrder)));
    }

    #[tokio::test]
    async fn test_foreign_address_rejected() {
        let db = test_support::db().await;
        let v = test_support::variant(&db, "A", 100, 0, 10).await;
        let mut checkout = checkout(&db, "user-1", None).await;
        checkout.user_id = "user-2".to_string();

        let err = db
            .orders()
            .create_order(&checkout, &[OrderItem::new(&v.id, 1)])
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Core(CoreError::InvalidAddress { .. })));
        assert_eq!(db.inventory().available(&v.id).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_second_item_short_rolls_back_first() {
        let db = test_support::db().await;
        let a = test_support::variant(&db, "A", 100, 0, 10).await;
        let b = test_support::variant(&db, "B", 100, 0, 1).await;

        let checkout = checkout(&db, "user-1", None).await;
        let err = db
            .orders()
            .create_order(
                &checkout,
                &[OrderItem::new(&a.id, 4), OrderItem::new(&b.id, 2)],
            )
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Core(CoreError::InsufficientStock { .. })));
        assert_eq!(db.inventory().available(&a.id).await.unwrap(), 10);
        assert_eq!(db.inventory().available(&b.id).await.unwrap(), 1);
        assert!(db.orders().list_for_user("user-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_price_over_cap_is_rejected() {
        let db = test_support::db().await;
        let err = db
            .variants()
            .insert(NewVariant {
                sku: "HUGE".into(),
                name: "Huge".into(),
                base_price: i64::MAX / 2,
                discount_percent: 0,
                stock: 10,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Core(CoreError::Validation(_))));
    }

    #[tokio::test]
    async fn test_overflowing_total_rolls_back() {
        let db = test_support::db().await;
        let v = test_support::variant(&db, "A", 100, 0, 10).await;
        // A row written before the price cap existed
        sqlx::query("UPDATE variants SET base_price = ?1 WHERE id = ?2")
            .bind(i64::MAX / 2)
            .bind(&v.id)
            .execute(db.pool())
            .await
            .unwrap();

        let checkout = checkout(&db, "user-1", None).await;
        let err = db
            .orders()
            .create_order(&checkout, &[OrderItem::new(&v.id, 3)])
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Core(CoreError::AmountOverflow(_))));
        assert_eq!(db.inventory().available(&v.id).await.unwrap(), 10);
        assert!(db.orders().list_for_user("user-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_coupon_rolls_back_reservations() {
        let db = test_support::db().await;
        let v = test_support::variant(&db, "A", 100, 0, 10).await;

        let checkout = checkout(&db, "user-1", Some("NOPE")).await;
        let err = db
            .orders()
            .create_order(&checkout, &[OrderItem::new(&v.id, 3)])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            StoreError::Core(CoreError::InvalidCoupon(CouponError::NotFound))
        ));
        assert_eq!(db.inventory().available(&v.id).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn test_coupon_single_use_per_user() {
        let db = test_support::db().await;
        let v = test_support::variant(&db, "A", 1_000, 0, 10).await;
        db.coupons().insert(test_support::coupon("ONCE", 10)).await.unwrap();

        let checkout = checkout(&db, "user-1", Some("ONCE")).await;
        db.orders()
            .create_order(&checkout, &[OrderItem::new(&v.id, 1)])
            .await
            .unwrap();

        let err = db
            .orders()
            .create_order(&checkout, &[OrderItem::new(&v.id, 1)])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Core(CoreError::InvalidCoupon(CouponError::AlreadyUsed))
        ));

        let coupon = db.coupons().get_by_code("ONCE").await.unwrap().unwrap();
        assert_eq!(coupon.used_by.len(), 1);
        assert_eq!(db.inventory().available(&v.id).await.unwrap(), 9);
    }

    #[tokio::test]
    async fn test_coupon_usage_limit_deactivates() {
        let db = test_support::db().await;
        let v = test_support::variant(&db, "A", 1_000, 0, 10).await;
        let mut new = test_support::coupon("LIMIT1", 10);
        new.usage_limit = Some(1);
        db.coupons().insert(new).await.unwrap();

        let first = checkout(&db, "user-1", Some("LIMIT1")).await;
        db.orders()
            .create_order(&first, &[OrderItem::new(&v.id, 1)])
            .await
            .unwrap();

        let coupon = db.coupons().get_by_code("LIMIT1").await.unwrap().unwrap();
        assert!(!coupon.active);

        let second = checkout(&db, "user-2", Some("LIMIT1")).await;
        let err = db
            .orders()
            .create_order(&second, &[OrderItem::new(&v.id, 1)])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Core(CoreError::InvalidCoupon(CouponError::Inactive))
        ));
    }

    #[tokio::test]
    async fn test_blank_coupon_code_ignored() {
        let db = test_support::db().await;
        let v = test_support::variant(&db, "A", 1_000, 0, 10).await;

        let checkout = checkout(&db, "user-1", Some("  ")).await;
        let order = db
            .orders()
            .create_order(&checkout, &[OrderItem::new(&v.id, 1)])
            .await
            .unwrap();
        assert!(order.coupon_id.is_none());
        assert_eq!(order.discount, 0);
    }

    #[tokio::test]
    async fn test_price_snapshot_survives_repricing() {
        let db = test_support::db().await;
        let v = test_support::variant(&db, "A", 1_000, 0, 10).await;

        let checkout = checkout(&db, "user-1", None).await;
        let order = db
            .orders()
            .create_order(&checkout, &[OrderItem::new(&v.id, 2)])
            .await
            .unwrap();

        db.variants().update_pricing(&v.id, 5_000, 50).await.unwrap();

        let stored = db.orders().get(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.total_price, order.total_price);
        assert_eq!(stored.lines[0].unit_price_at_purchase, 1_000);
    }

    #[tokio::test]
    async fn test_create_from_cart_clears_cart() {
        let db = test_support::db().await;
        let v = test_support::variant(&db, "A", 1_000, 0, 10).await;
        db.carts().add_item("user-1", &v.id, 3).await.unwrap();

        let checkout = checkout(&db, "user-1", None).await;
        let order = db.orders().create_order_from_cart(&checkout).await.unwrap();

        assert_eq!(order.lines[0].quantity, 3);
        assert!(db.carts().get("user-1").await.unwrap().is_empty());
        assert_eq!(db.inventory().available(&v.id).await.unwrap(), 7);

        let err = db.orders().create_order_from_cart(&checkout).await.unwrap_err();
        assert!(matches!(err, StoreError::Core(CoreError::EmptyOrder)));
    }

    #[tokio::test]
    async fn test_failed_cart_checkout_keeps_cart() {
        let db = test_support::db().await;
        let v = test_support::variant(&db, "A", 1_000, 0, 10).await;
        db.carts().add_item("user-1", &v.id, 3).await.unwrap();
        db.variants().set_active(&v.id, false).await.unwrap();

        let checkout = checkout(&db, "user-1", None).await;
        assert!(db.orders().create_order_from_cart(&checkout).await.is_err());
        assert_eq!(db.carts().get("user-1").await.unwrap().total_quantity(), 3);
    }

    #[tokio::test]
    async fn test_get_for_user_and_list() {
        let db = test_support::db().await;
        let v = test_support::variant(&db, "A", 1_000, 0, 10).await;

        let checkout = checkout(&db, "user-1", None).await;
        let order = db
            .orders()
            .create_order(&checkout, &[OrderItem::new(&v.id, 1)])
            .await
            .unwrap();

        assert!(db.orders().get_for_user("user-1", &order.id).await.unwrap().is_some());
        assert!(db.orders().get_for_user("user-2", &order.id).await.unwrap().is_none());

        let listed = db.orders().list_for_user("user-1").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].lines.len(), 1);
    }

    #[tokio::test]
    async fn test_release_pending_returns_stock_once() {
        let db = test_support::db().await;
        let v = test_support::variant(&db, "A", 1_000, 0, 10).await;

        let checkout = checkout(&db, "user-1", None).await;
        let order = db
            .orders()
            .create_order(&checkout, &[OrderItem::new(&v.id, 4)])
            .await
            .unwrap();

        let stale = db.orders().pending_older_than(Utc::now()).await.unwrap();
        assert_eq!(stale.len(), 1);

        let released = db.orders().release_pending(&order.id).await.unwrap();
        assert_eq!(released.status, OrderStatus::Failed);
        assert_eq!(db.inventory().available(&v.id).await.unwrap(), 10);

        let err = db.orders().release_pending(&order.id).await.unwrap_err();
        assert!(matches!(err, StoreError::Core(CoreError::OrderNotPending { .. })));
        assert_eq!(db.inventory().available(&v.id).await.unwrap(), 10);

        assert!(db.orders().pending_older_than(Utc::now()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_status_rejects_backward_moves() {
        let db = test_support::db().await;
        let v = test_support::variant(&db, "A", 1_000, 0, 10).await;

        let checkout = checkout(&db, "user-1", None).await;
        let order = db
            .orders()
            .create_order(&checkout, &[OrderItem::new(&v.id, 1)])
            .await
            .unwrap();

        let mut tx = db.begin_immediate().await.unwrap();
        let order = mark_paid_in(&mut tx, order).await.unwrap();
        assert!(set_status_in(&mut tx, &order.id, OrderStatus::Paid, OrderStatus::Pending)
            .await
            .is_err());
        // Stale `from`
        assert!(set_status_in(&mut tx, &order.id, OrderStatus::Pending, OrderStatus::Failed)
            .await
            .is_err());
        tx.commit().await.unwrap();

        let stored = db.orders().get(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Paid);
    }
}
