//! User overview handler.

use axum::{Json, extract::State};

use crate::error::Result;
use crate::models::UserCartSummary;
use crate::state::AppState;

/// Every user with their cart's id and line count.
///
/// GET /api/users/carts
pub async fn with_carts(State(state): State<AppState>) -> Result<Json<Vec<UserCartSummary>>> {
    Ok(Json(state.actions().get_all_users_with_carts().await?))
}
