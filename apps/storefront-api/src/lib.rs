//! # Storefront API
//!
//! HTTP surface of the storefront checkout.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Storefront API Server                            │
//! │                                                                         │
//! │  client ──► axum Router ──► CurrentUser (x-user-id)                    │
//! │                   │                                                     │
//! │                   ├── /cart ........ CartRepository                    │
//! │                   ├── /orders ...... OrderRepository (assembler)       │
//! │                   └── /payments .... PaymentService ──► gateway        │
//! │                                           │                             │
//! │                                           ▼                             │
//! │                                        SQLite                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::routing::{get, patch, post};
use axum::Router;
use storefront_core::Percent;
use storefront_db::Database;
use storefront_payment::{PaymentGateway, PaymentService};
use tower_http::trace::TraceLayer;

use crate::config::{AppConfig, RedirectConfig};
use crate::routes::{cart, health, orders, payments};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub payments: PaymentService,
    pub tax_percent: Percent,
    pub redirects: Arc<RedirectConfig>,
}

impl AppState {
    pub fn new(db: Database, gateway: Arc<dyn PaymentGateway>, config: &AppConfig) -> Self {
        AppState {
            payments: PaymentService::new(db.clone(), gateway, config.gateway.amount_multiplier),
            db,
            tax_percent: config.tax_percent(),
            redirects: Arc::new(config.redirects.clone()),
        }
    }
}

/// Builds the router with every route and request tracing.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/cart", get(cart::get_cart).delete(cart::clear_cart))
        .route("/cart/items", post(cart::add_item))
        .route(
            "/cart/items/{variant_id}",
            patch(cart::update_item).delete(cart::remove_item),
        )
        .route("/orders", post(orders::create_order).get(orders::list_orders))
        .route("/orders/{id}", get(orders::get_order))
        .route("/payments/{order_id}/request", post(payments::request_payment))
        .route("/payments/verify", get(payments::verify))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// Tests
// =============================================================================
