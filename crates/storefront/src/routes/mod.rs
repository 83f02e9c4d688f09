//! HTTP route handlers for the shop API.
//!
//! # Route Structure
//!
//! ```text
//! GET    /api/health                          - Liveness and database probe
//!
//! # Catalog
//! GET    /api/products                        - All products with category
//! GET    /api/products/{id}                   - Product detail
//! GET    /api/products/category/{categoryId}  - Products in a category
//! GET    /api/categories                      - Categories with product counts
//!
//! # Cart
//! GET    /api/cart/{userId}                   - Cart with items (`{"items":[]}` when none)
//! POST   /api/cart/{userId}/items             - Add item {productId, quantity}
//! DELETE /api/cart/{userId}/items/{productId} - Remove item
//! GET    /api/cart/{userId}/total             - Undiscounted cart total
//! POST   /api/cart/transfer                   - Merge carts {fromUserId, toUserId}
//! GET    /api/users/carts                     - Users with cart summaries
//!
//! # Orders
//! GET    /api/orders/{userId}                 - Orders, newest first
//! POST   /api/orders                          - Checkout {cartId, userId?}
//! ```

pub mod cart;
pub mod catalog;
pub mod health;
pub mod orders;
pub mod users;

use axum::{
    Router,
    extract::{FromRequest, FromRequestParts},
    routing::{delete, get, post},
};

use partshop_core::UserId;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// JSON request body whose rejections render as [`AppError::BadRequest`].
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct JsonBody<T>(pub T);

/// Path parameters whose rejections render as [`AppError::BadRequest`].
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct PathParams<T>(pub T);

/// Parse a user id taken from the path.
///
/// # Errors
///
/// Returns `AppError::BadRequest` for blank or oversized ids.
pub fn parse_user_id(raw: &str) -> Result<UserId> {
    UserId::parse(raw).map_err(|e| AppError::BadRequest(e.to_string()))
}

/// Create the catalog routes.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(catalog::list_products))
        .route("/products/{id}", get(catalog::show_product))
        .route(
            "/products/category/{category_id}",
            get(catalog::products_by_category),
        )
        .route("/categories", get(catalog::list_categories))
}

/// Create the cart routes.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/cart/transfer", post(cart::transfer))
        .route("/cart/{user_id}", get(cart::show))
        .route("/cart/{user_id}/items", post(cart::add_item))
        .route(
            "/cart/{user_id}/items/{product_id}",
            delete(cart::remove_item),
        )
        .route("/cart/{user_id}/total", get(cart::total))
        .route("/users/carts", get(users::with_carts))
}

/// Create the order routes.
pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/orders", post(orders::create))
        .route("/orders/{user_id}", get(orders::list))
}

/// Create all routes for the shop API.
pub fn routes() -> Router<AppState> {
    let api = Router::new()
        .route("/health", get(health::health))
        .merge(catalog_routes())
        .merge(cart_routes())
        .merge(order_routes());

    Router::new().nest("/api", api)
}
