//! Cart route handlers.
//!
//! User ids come from the path and are not authenticated; the identity
//! provider in front of this API is expected to enforce who may act for whom.

use axum::{
    Json,
    extract::State,
    response::{IntoResponse, Response},
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

use partshop_core::{ProductId, UserId};

use super::{JsonBody, PathParams, parse_user_id};
use crate::error::Result;
use crate::models::CartLine;
use crate::services::MergeOutcome;
use crate::state::AppState;

/// Add-to-cart request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddItemRequest {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// Cart transfer request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub from_user_id: String,
    pub to_user_id: String,
}

/// Cart transfer response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub outcome: MergeOutcome,
}

impl From<MergeOutcome> for TransferResponse {
    fn from(outcome: MergeOutcome) -> Self {
        match outcome {
            MergeOutcome::Transferred { .. } => Self {
                success: true,
                message: None,
                outcome,
            },
            MergeOutcome::NothingToTransfer => Self {
                success: false,
                message: Some("Source cart is empty".to_string()),
                outcome,
            },
        }
    }
}

/// Cart total response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartTotalResponse {
    pub user_id: UserId,
    pub total: Decimal,
}

/// The user's cart with resolved lines, or an empty item list.
///
/// GET /api/cart/{userId}
pub async fn show(State(state): State<AppState>, PathParams(user_id): PathParams<String>) -> Result<Response> {
    let user_id = parse_user_id(&user_id)?;
    let response = match state.actions().get_cart_with_items(&user_id).await? {
        Some(cart) => Json(cart).into_response(),
        None => Json(json!({ "items": [] })).into_response(),
    };
    Ok(response)
}

/// Add a product to the cart, creating user and cart on first use.
///
/// POST /api/cart/{userId}/items
#[instrument(skip(state), fields(user_id = %user_id, product_id = %req.product_id))]
pub async fn add_item(
    State(state): State<AppState>,
    PathParams(user_id): PathParams<String>,
    JsonBody(req): JsonBody<AddItemRequest>,
) -> Result<Json<CartLine>> {
    let user_id = parse_user_id(&user_id)?;
    let line = state
        .actions()
        .add_item(&user_id, req.product_id, req.quantity)
        .await?;
    Ok(Json(line))
}

/// Remove a product's line from the cart.
///
/// DELETE /api/cart/{userId}/items/{productId}
#[instrument(skip(state))]
pub async fn remove_item(
    State(state): State<AppState>,
    PathParams((user_id, product_id)): PathParams<(String, i32)>,
) -> Result<Json<serde_json::Value>> {
    let user_id = parse_user_id(&user_id)?;
    state
        .actions()
        .remove_item(&user_id, ProductId::new(product_id))
        .await?;
    Ok(Json(json!({ "success": true })))
}

/// GET /api/cart/{userId}/total
pub async fn total(
    State(state): State<AppState>,
    PathParams(user_id): PathParams<String>,
) -> Result<Json<CartTotalResponse>> {
    let user_id = parse_user_id(&user_id)?;
    let total = state.actions().get_cart_total(&user_id).await?;
    Ok(Json(CartTotalResponse { user_id, total }))
}

/// Merge one user's cart into another's.
///
/// POST /api/cart/transfer
#[instrument(skip(state), fields(from = %req.from_user_id, to = %req.to_user_id))]
pub async fn transfer(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<TransferRequest>,
) -> Result<Json<TransferResponse>> {
    let from = parse_user_id(&req.from_user_id)?;
    let to = parse_user_id(&req.to_user_id)?;
    let outcome = state.actions().transfer_cart(&from, &to).await?;
    Ok(Json(outcome.into()))
}
