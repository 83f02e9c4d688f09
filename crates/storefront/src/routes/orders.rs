//! Order route handlers.

use axum::{
    Json,
    extract::State,
};
use serde::Deserialize;
use tracing::instrument;

use partshop_core::CartId;

use super::{JsonBody, PathParams, parse_user_id};
use crate::error::Result;
use crate::models::OrderWithItems;
use crate::state::AppState;

/// Checkout request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    pub cart_id: CartId,
    /// When present, must name the cart's owner.
    #[serde(default)]
    pub user_id: Option<String>,
}

/// A user's orders with their lines, newest first.
///
/// GET /api/orders/{userId}
pub async fn list(
    State(state): State<AppState>,
    PathParams(user_id): PathParams<String>,
) -> Result<Json<Vec<OrderWithItems>>> {
    let user_id = parse_user_id(&user_id)?;
    Ok(Json(state.store().list_orders(&user_id).await?))
}

/// Place an order from a cart and empty the cart.
///
/// POST /api/orders
///
/// # Errors
///
/// 400 for an empty cart or an owner mismatch, 404 for an unknown cart,
/// 409 when the cart changed during checkout.
#[instrument(skip(state), fields(cart_id = %req.cart_id))]
pub async fn create(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<CheckoutRequest>,
) -> Result<Json<OrderWithItems>> {
    let owner = req.user_id.as_deref().map(parse_user_id).transpose()?;
    let order = state.actions().checkout(req.cart_id, owner.as_ref()).await?;
    Ok(Json(order))
}
