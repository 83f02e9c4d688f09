//! Integration tests for Partshop.
//!
//! # Running Tests
//!
//! ```bash
//! # HTTP tests run the full router against the in-memory store
//! cargo test -p partshop-integration-tests
//!
//! # PostgreSQL tests are ignored by default
//! SHOP_DATABASE_URL=postgres://localhost/partshop_test \
//!     cargo test -p partshop-integration-tests -- --ignored
//! ```
//!
//! # Test Categories
//!
//! - `cart_api` - Cart reads, item changes and cart transfer over HTTP
//! - `checkout_api` - Order placement and order history over HTTP
//! - `postgres_store` - The `PostgreSQL` store against a live database

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use rust_decimal::Decimal;
use serde_json::Value;
use tower::ServiceExt;

use partshop_core::{CategoryId, UserId};
use partshop_storefront::{
    config::CartCacheConfig,
    db::{MemoryShopStore, ShopStore},
    models::{NewProduct, NewUser, Product},
    state::AppState,
};

/// The full application router over a seeded in-memory store.
pub struct TestApp {
    pub store: Arc<MemoryShopStore>,
    /// Catalog products in insertion order: CPU 1299.99, GPU 2899, SSD 19.99.
    pub products: Vec<Product>,
    router: Router,
}

impl TestApp {
    /// Build an app with two categories and three products.
    pub async fn new() -> Self {
        let store = Arc::new(MemoryShopStore::new());
        let cpu = store.insert_category("procesor").await;
        let gpu = store.insert_category("karta graficzna").await;
        let disk = store.insert_category("dysk").await;

        let products = vec![
            add_product(&store, cpu.id, "CPU-R77800X3D", "Ryzen 7 7800X3D", "1299.99").await,
            add_product(&store, gpu.id, "GPU-NV4070SUPR", "GeForce RTX 4070 Super", "2899").await,
            add_product(&store, disk.id, "SSD-SAM990P1T", "Samsung 990 PRO 1TB", "19.99").await,
        ];

        let state = AppState::new(
            Arc::clone(&store) as Arc<dyn ShopStore>,
            CartCacheConfig::default(),
        );
        Self {
            store,
            products,
            router: partshop_storefront::app(state),
        }
    }

    /// Register a user directly in the store.
    pub async fn user(&self, id: &str) -> UserId {
        let id = UserId::parse(id).unwrap();
        self.store.insert_user(NewUser::generated(id.clone())).await;
        id
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None).await
    }

    pub async fn post(&self, uri: &str, body: &Value) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(body.to_string())).await
    }

    pub async fn delete(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Method::DELETE, uri, None).await
    }

    /// POST a raw, possibly malformed, JSON body.
    pub async fn post_raw(&self, uri: &str, body: &str) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(body.to_owned())).await
    }

    /// Add a product to a user's cart and assert success.
    pub async fn add_to_cart(&self, user: &str, product: &Product, quantity: i32) {
        let (status, body) = self
            .post(
                &format!("/api/cart/{user}/items"),
                &serde_json::json!({ "productId": product.id, "quantity": quantity }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "add to cart failed: {body}");
    }

    async fn send(&self, method: Method, uri: &str, body: Option<String>) -> (StatusCode, Value) {
        let mut request = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                request = request.header(header::CONTENT_TYPE, "application/json");
                Body::from(json)
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, json)
    }
}

/// Read a money field serialized as a decimal string.
pub fn money(value: &Value) -> Decimal {
    value.as_str().unwrap().parse().unwrap()
}

/// Parse a decimal literal.
pub fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

/// `(productCode, quantity)` pairs of a cart response, sorted by code.
pub fn cart_quantities(cart: &Value) -> Vec<(String, i64)> {
    let mut lines: Vec<_> = cart["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|line| {
            (
                line["product"]["code"].as_str().unwrap().to_owned(),
                line["quantity"].as_i64().unwrap(),
            )
        })
        .collect();
    lines.sort();
    lines
}

async fn add_product(
    store: &MemoryShopStore,
    category_id: CategoryId,
    code: &str,
    name: &str,
    price: &str,
) -> Product {
    store
        .insert_product(NewProduct {
            code: code.to_owned(),
            name: name.to_owned(),
            product_type: "part".to_owned(),
            description: String::new(),
            price: dec(price),
            amount: 5,
            image: None,
            category_id,
        })
        .await
        .unwrap()
}
