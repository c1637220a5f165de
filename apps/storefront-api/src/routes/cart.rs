//! Cart endpoints. Prices shown here are current prices, not a quote.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use storefront_core::{Cart, CartTotals};

use crate::auth::CurrentUser;
use crate::error::ApiResult;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct CartResponse {
    #[serde(flatten)]
    pub cart: Cart,
    pub totals: CartTotals,
}

impl From<Cart> for CartResponse {
    fn from(cart: Cart) -> Self {
        let totals = cart.totals();
        CartResponse { cart, totals }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub variant_id: String,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i64,
}

pub async fn get_cart(
    State(state): State<AppState>,
    user: CurrentUser,
) -> ApiResult<Json<CartResponse>> {
    let cart = state.db.carts().get(user.id()).await?;
    Ok(Json(cart.into()))
}

pub async fn add_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(req): Json<AddItemRequest>,
) -> ApiResult<Json<CartResponse>> {
    let cart = state
        .db
        .carts()
        .add_item(user.id(), &req.variant_id, req.quantity)
        .await?;
    Ok(Json(cart.into()))
}

pub async fn update_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(variant_id): Path<String>,
    Json(req): Json<UpdateItemRequest>,
) -> ApiResult<Json<CartResponse>> {
    let cart = state
        .db
        .carts()
        .update_quantity(user.id(), &variant_id, req.quantity)
        .await?;
    Ok(Json(cart.into()))
}

pub async fn remove_item(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(variant_id): Path<String>,
) -> ApiResult<Json<CartResponse>> {
    let cart = state.db.carts().remove_item(user.id(), &variant_id).await?;
    Ok(Json(cart.into()))
}

pub async fn clear_cart(State(state): State<AppState>, user: CurrentUser) -> ApiResult<StatusCode> {
    state.db.carts().clear(user.id()).await?;
    Ok(StatusCode::NO_CONTENT)
}
