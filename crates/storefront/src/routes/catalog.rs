//! Catalog route handlers.

use axum::{
    Json,
    extract::State,
};

use partshop_core::{CategoryId, ProductId};

use super::PathParams;
use crate::error::{AppError, Result};
use crate::models::{CategoryWithCount, ProductWithCategory};
use crate::state::AppState;

/// GET /api/products
pub async fn list_products(State(state): State<AppState>) -> Result<Json<Vec<ProductWithCategory>>> {
    Ok(Json(state.store().list_products(None).await?))
}

/// GET /api/products/{id}
pub async fn show_product(
    State(state): State<AppState>,
    PathParams(id): PathParams<i32>,
) -> Result<Json<ProductWithCategory>> {
    state
        .store()
        .find_product(ProductId::new(id))
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("product {id}")))
}

/// GET /api/products/category/{categoryId}
///
/// An unknown category yields an empty list.
pub async fn products_by_category(
    State(state): State<AppState>,
    PathParams(category_id): PathParams<i32>,
) -> Result<Json<Vec<ProductWithCategory>>> {
    let products = state
        .store()
        .list_products(Some(CategoryId::new(category_id)))
        .await?;
    Ok(Json(products))
}

/// GET /api/categories
pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<CategoryWithCount>>> {
    Ok(Json(state.store().list_categories().await?))
}
