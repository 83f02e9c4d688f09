//! Catalog domain types: categories and products.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use partshop_core::{CategoryId, ProductId};

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
}

/// A category with the number of products it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryWithCount {
    #[serde(flatten)]
    pub category: Category,
    pub product_count: i64,
}

/// A product as currently listed.
///
/// `price` and `amount` change over time; orders keep their own snapshot of
/// price, name and code instead of referring back to this record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    /// Unique human-readable SKU (e.g. `GPU-NV4070SUPR`).
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub product_type: String,
    pub description: String,
    /// Current unit price.
    pub price: Decimal,
    /// Units in stock.
    pub amount: i32,
    /// Image URL or path.
    pub image: Option<String>,
    pub category_id: CategoryId,
}

/// A product resolved together with its category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProductWithCategory {
    #[serde(flatten)]
    pub product: Product,
    pub category: Category,
}

/// Input for creating a product.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub code: String,
    pub name: String,
    #[serde(rename = "type")]
    pub product_type: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub amount: i32,
    #[serde(default)]
    pub image: Option<String>,
    pub category_id: CategoryId,
}
