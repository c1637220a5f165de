//! Order endpoints.
//!
//! `POST /orders` with `items` orders exactly those items; without `items`
//! it checks out the caller's cart and empties it in the same transaction.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use storefront_core::{CoreError, Order, OrderItem, ShippingMethod};
use storefront_db::Checkout;

use crate::auth::CurrentUser;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub address_id: String,
    /// `express_post`, `courier` or `local_delivery`.
    pub shipping_method: String,
    #[serde(default)]
    pub items: Option<Vec<OrderItem>>,
    #[serde(default)]
    pub coupon_code: Option<String>,
}

pub async fn create_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<CreateOrderRequest>,
) -> ApiResult<(StatusCode, Json<Order>)> {
    let shipping_method: ShippingMethod = req.shipping_method.parse().map_err(ApiError::from)?;

    let checkout = Checkout {
        user_id: user.0,
        address_id: req.address_id,
        shipping_method,
        coupon_code: req.coupon_code,
        tax_percent: state.tax_percent,
    };

    let orders = state.db.orders();
    let order = match req.items {
        Some(items) => orders.create_order(&checkout, &items).await?,
        None => orders.create_order_from_cart(&checkout).await?,
    };

    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn list_orders(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<Vec<Order>>> {
    Ok(Json(state.db.orders().list_for_user(user.id()).await?))
}

pub async fn get_order(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(order_id): Path<String>,
) -> ApiResult<Json<Order>> {
    let order = state
        .db
        .orders()
        .get_for_user(user.id(), &order_id)
        .await?
        .ok_or(CoreError::OrderNotFound(order_id))?;
    Ok(Json(order))
}
