//! Duplicate gateway callbacks racing each other on a file-backed database
//! with a multi-connection pool.

use std::sync::Arc;

use storefront_core::{GatewayStatusHint, OrderItem, OrderStatus, PaymentStatus, Percent, ShippingMethod};
use storefront_db::{Checkout, Database, DbConfig, NewAddress, NewVariant};
use storefront_payment::{MockGateway, PaymentService};
use tempfile::TempDir;

struct Shop {
    _dir: TempDir,
    db: Database,
    gateway: Arc<MockGateway>,
    service: PaymentService,
    variant_id: String,
    order_id: String,
}

/// One PENDING order holding 3 of 10 units.
async fn shop() -> Shop {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::new(
        DbConfig::new(dir.path().join("storefront.db"))
            .max_connections(8)
            .busy_timeout(std::time::Duration::from_secs(30)),
    )
    .await
    .unwrap();

    let variant_id = db
        .variants()
        .insert(NewVariant {
            sku: "BOOTS".into(),
            name: "Boots".into(),
            base_price: 50_000,
            discount_percent: 0,
            stock: 10,
        })
        .await
        .unwrap()
        .id;
    let address = db
        .addresses()
        .insert(NewAddress {
            user_id: "user-1".into(),
            recipient: "Reza".into(),
            line1: "4 Hafez St".into(),
            city: "Isfahan".into(),
            postal_code: "8100000000".into(),
            phone: "09130000000".into(),
        })
        .await
        .unwrap();
    let checkout = Checkout {
        user_id: "user-1".into(),
        address_id: address.id,
        shipping_method: ShippingMethod::Courier,
        coupon_code: None,
        tax_percent: Percent::new(10).unwrap(),
    };
    let order_id = db
        .orders()
        .create_order(&checkout, &[OrderItem::new(&variant_id, 3)])
        .await
        .unwrap()
        .id;

    let gateway = Arc::new(MockGateway::new());
    let service = PaymentService::new(db.clone(), gateway.clone(), 10);

    Shop {
        _dir: dir,
        db,
        gateway,
        service,
        variant_id,
        order_id,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_success_callbacks_settle_once() {
    let shop = shop().await;
    let redirect = shop
        .service
        .request_payment("user-1", &shop.order_id)
        .await
        .unwrap();
    let authority = Arc::new(redirect.authority);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let service = shop.service.clone();
        let authority = Arc::clone(&authority);
        handles.push(tokio::spawn(async move {
            service.reconcile(&authority, GatewayStatusHint::Ok).await
        }));
    }

    for handle in handles {
        let order = handle.await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Paid);
    }

    // Callbacks that saw a PENDING attempt each verified; only one settled
    let verify_calls = shop.gateway.verify_calls();
    assert!((1..=8).contains(&verify_calls));

    let attempts = shop.db.payments().list_for_order(&shop.order_id).await.unwrap();
    assert_eq!(attempts.len(), 1);
    assert_eq!(attempts[0].status, PaymentStatus::Success);
    assert!(attempts[0]
        .ref_id
        .as_deref()
        .is_some_and(|r| r.starts_with("MOCK-REF-")));

    assert_eq!(
        shop.db.inventory().available(&shop.variant_id).await.unwrap(),
        7
    );

    // Replays after the race never reach the gateway again
    shop.service
        .reconcile(&authority, GatewayStatusHint::Ok)
        .await
        .unwrap();
    assert_eq!(shop.gateway.verify_calls(), verify_calls);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn mixed_success_and_cancel_callbacks_settle_once() {
    let shop = shop().await;
    let redirect = shop
        .service
        .request_payment("user-1", &shop.order_id)
        .await
        .unwrap();
    let authority = Arc::new(redirect.authority);

    let mut handles = Vec::new();
    for n in 0..8 {
        let service = shop.service.clone();
        let authority = Arc::clone(&authority);
        let hint = if n % 2 == 0 {
            GatewayStatusHint::Ok
        } else {
            GatewayStatusHint::Cancelled
        };
        handles.push(tokio::spawn(async move {
            service.reconcile(&authority, hint).await
        }));
    }

    // A success that loses to a cancel is reported, never applied
    for handle in handles {
        let _ = handle.await.unwrap();
    }

    let order = shop.db.orders().get(&shop.order_id).await.unwrap().unwrap();
    let attempt = shop
        .db
        .payments()
        .get_by_authority(&authority)
        .await
        .unwrap()
        .unwrap();
    let stock = shop.db.inventory().available(&shop.variant_id).await.unwrap();

    match order.status {
        OrderStatus::Paid => {
            assert_eq!(attempt.status, PaymentStatus::Success);
            assert_eq!(stock, 7);
        }
        OrderStatus::Failed => {
            assert_eq!(attempt.status, PaymentStatus::Failed);
            assert_eq!(stock, 10);
        }
        OrderStatus::Pending => panic!("order left pending"),
    }
}
