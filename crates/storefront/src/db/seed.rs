//! Demo data for local development.
//!
//! Seeding wipes every shop table, loads the catalog from a JSON file and adds
//! a demo user with a filled cart and a short order history. Everything runs
//! in one transaction.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use tracing::{info, instrument};

use partshop_core::{Email, OrderStatus, ProductId, UserId, round_money, sum_money};

use super::RepositoryError;
use super::postgres::apply_intent;
use super::unit_of_work::{CartRef, WriteIntent};
use crate::models::{NewOrder, NewOrderItem, NewUser};

/// Categories that always exist after seeding, in id order.
pub const DEFAULT_CATEGORIES: [&str; 4] = ["procesor", "karta graficzna", "pamięć ram", "dysk"];

pub const DEMO_USER_ID: &str = "demo-user";
pub const DEMO_USER_EMAIL: &str = "user@pk.edu.pl";
pub const DEMO_USER_NAME: &str = "Jan Kowalski (Testowy)";

/// Demo cart contents as `(code, quantity)`. The first line is backdated by an hour.
const DEMO_CART: [(&str, i32); 2] = [("GPU-NV4070SUPR", 1), ("RAM-D5600032GC", 2)];

struct HistoricalOrder {
    status: OrderStatus,
    placed_at: &'static str,
    codes: &'static [&'static str],
}

const HISTORICAL_ORDERS: [HistoricalOrder; 4] = [
    HistoricalOrder {
        status: OrderStatus::Delivered,
        placed_at: "2025-01-10T12:00:00Z",
        codes: &["CPU-I714700K", "SSD-SAMSUNG990P"],
    },
    HistoricalOrder {
        status: OrderStatus::Cancelled,
        placed_at: "2025-03-20T10:00:00Z",
        codes: &["GPU-NV4090FE", "RAM-D5800032G"],
    },
    HistoricalOrder {
        status: OrderStatus::Shipped,
        placed_at: "2025-11-25T15:00:00Z",
        codes: &["CPU-I914900K", "GPU-AMDRX7800XT"],
    },
    HistoricalOrder {
        status: OrderStatus::Pending,
        placed_at: "2025-12-01T08:00:00Z",
        codes: &["SSD-CRUCIALT7002TB", "RAM-D5760032G", "HDD-WDBLUE6TB"],
    },
];

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read {path}: {message}")]
    Io { path: String, message: String },

    #[error("invalid product file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid seed data: {0}")]
    InvalidData(String),

    #[error("seed data references unknown product code {0}")]
    MissingProduct(String),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl From<sqlx::Error> for SeedError {
    fn from(err: sqlx::Error) -> Self {
        Self::Repository(RepositoryError::from_sqlx(err))
    }
}

/// One product entry of the seed file. Unknown keys are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SeedProduct {
    pub code: String,
    pub name: String,
    /// Category name; also stored as the product type.
    #[serde(rename = "type")]
    pub product_type: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub amount: i32,
    #[serde(default)]
    pub image: Option<String>,
}

/// What a seeding run inserted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub categories: usize,
    pub products: usize,
    pub cart_lines: usize,
    pub orders: usize,
}

/// Catalog facts needed to build order snapshots.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    pub id: ProductId,
    pub name: String,
    pub price: Decimal,
}

/// Parse a seed file's contents.
///
/// # Errors
///
/// Returns `SeedError::Parse` for malformed JSON and `SeedError::InvalidData`
/// for duplicate codes or negative prices.
pub fn parse_products(json: &str) -> Result<Vec<SeedProduct>, SeedError> {
    let products: Vec<SeedProduct> = serde_json::from_str(json)?;

    let mut seen = HashSet::new();
    for product in &products {
        if product.price.is_sign_negative() {
            return Err(SeedError::InvalidData(format!(
                "product {} has a negative price",
                product.code
            )));
        }
        if !seen.insert(product.code.as_str()) {
            return Err(SeedError::InvalidData(format!(
                "duplicate product code {}",
                product.code
            )));
        }
    }

    Ok(products)
}

/// Category names to create: the defaults, then any extra product types in
/// first-seen order.
#[must_use]
pub fn category_names(products: &[SeedProduct]) -> Vec<String> {
    let mut names: Vec<String> = DEFAULT_CATEGORIES.iter().map(|&n| n.to_owned()).collect();
    for product in products {
        if !names.contains(&product.product_type) {
            names.push(product.product_type.clone());
        }
    }
    names
}

/// Build the demo user's order history at undiscounted catalog prices.
///
/// # Errors
///
/// Returns `SeedError::MissingProduct` if a referenced code is not in
/// `catalog`.
pub fn historical_orders(
    user_id: &UserId,
    catalog: &HashMap<String, CatalogEntry>,
) -> Result<Vec<NewOrder>, SeedError> {
    HISTORICAL_ORDERS
        .iter()
        .map(|history| {
            let items = history
                .codes
                .iter()
                .map(|&code| {
                    let entry = catalog
                        .get(code)
                        .ok_or_else(|| SeedError::MissingProduct(code.to_owned()))?;
                    Ok(NewOrderItem {
                        product_id: entry.id,
                        quantity: 1,
                        price_at_order: entry.price,
                        product_name: entry.name.clone(),
                        product_code: code.to_owned(),
                    })
                })
                .collect::<Result<Vec<_>, SeedError>>()?;

            let placed_at = DateTime::parse_from_rfc3339(history.placed_at)
                .map_err(|e| SeedError::InvalidData(format!("{}: {e}", history.placed_at)))?
                .with_timezone(&Utc);

            Ok(NewOrder {
                user_id: user_id.clone(),
                status: history.status,
                total_amount: sum_money(items.iter().map(|i| (i.price_at_order, i.quantity))),
                items,
                placed_at: Some(placed_at),
            })
        })
        .collect()
}

/// Seed from a JSON file on disk.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed, or if any database
/// statement fails. Nothing is written in that case.
pub async fn seed_from_file<P: AsRef<Path>>(pool: &PgPool, path: P) -> Result<SeedReport, SeedError> {
    let path = path.as_ref();
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SeedError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

    let products = parse_products(&content)?;
    seed(pool, &products).await
}

/// Replace all shop data with `products` plus the demo user, cart and orders.
///
/// # Errors
///
/// Returns an error if any statement fails; the transaction is rolled back.
#[instrument(skip(pool, products), fields(products = products.len()))]
pub async fn seed(pool: &PgPool, products: &[SeedProduct]) -> Result<SeedReport, SeedError> {
    let mut tx = pool.begin().await?;
    let mut report = SeedReport::default();

    clear_tables(&mut tx).await?;
    info!("Cleared existing shop data");

    let mut category_ids = HashMap::new();
    for name in category_names(products) {
        let (id,): (i32,) =
            sqlx::query_as("INSERT INTO shop.categories (name) VALUES ($1) RETURNING id")
                .bind(&name)
                .fetch_one(&mut *tx)
                .await?;
        category_ids.insert(name, id);
    }
    report.categories = category_ids.len();

    let mut catalog = HashMap::new();
    for product in products {
        let category_id = category_ids.get(&product.product_type).copied().ok_or_else(|| {
            SeedError::InvalidData(format!("no category for type {}", product.product_type))
        })?;
        let price = round_money(product.price);
        let (id,): (ProductId,) = sqlx::query_as(
            r"
            INSERT INTO shop.products
                (code, name, product_type, description, price, amount, image, category_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id
            ",
        )
        .bind(&product.code)
        .bind(&product.name)
        .bind(&product.product_type)
        .bind(&product.description)
        .bind(price)
        .bind(product.amount)
        .bind(&product.image)
        .bind(category_id)
        .fetch_one(&mut *tx)
        .await?;

        catalog.insert(
            product.code.clone(),
            CatalogEntry {
                id,
                name: product.name.clone(),
                price,
            },
        );
    }
    report.products = catalog.len();
    info!(categories = report.categories, products = report.products, "Catalog loaded");

    let user_id = UserId::parse(DEMO_USER_ID).map_err(|e| SeedError::InvalidData(e.to_string()))?;
    let email = Email::parse(DEMO_USER_EMAIL).map_err(|e| SeedError::InvalidData(e.to_string()))?;
    apply_intent(
        &mut tx,
        WriteIntent::EnsureUser(NewUser {
            id: user_id.clone(),
            email,
            name: Some(DEMO_USER_NAME.to_owned()),
        }),
    )
    .await?;
    apply_intent(
        &mut tx,
        WriteIntent::EnsureCart {
            user_id: user_id.clone(),
        },
    )
    .await?;

    for (code, quantity) in DEMO_CART {
        let entry = catalog
            .get(code)
            .ok_or_else(|| SeedError::MissingProduct(code.to_owned()))?;
        apply_intent(
            &mut tx,
            WriteIntent::UpsertCartItem {
                cart: CartRef::OwnedBy(user_id.clone()),
                product_id: entry.id,
                quantity,
            },
        )
        .await?;
        report.cart_lines += 1;
    }
    backdate_first_cart_line(&mut tx, &catalog).await?;

    for order in historical_orders(&user_id, &catalog)? {
        apply_intent(&mut tx, WriteIntent::CreateOrder(order)).await?;
        report.orders += 1;
    }

    tx.commit().await?;
    info!(
        cart_lines = report.cart_lines,
        orders = report.orders,
        user = DEMO_USER_ID,
        "Demo data created"
    );
    Ok(report)
}

/// Delete all shop data and restart id sequences.
///
/// # Errors
///
/// Returns an error if the statement fails.
pub async fn reset(pool: &PgPool) -> Result<(), SeedError> {
    let mut conn = pool.acquire().await?;
    clear_tables(&mut conn).await?;
    info!("Cleared all shop tables");
    Ok(())
}

async fn clear_tables(conn: &mut PgConnection) -> Result<(), SeedError> {
    sqlx::query(
        r"
        TRUNCATE shop.order_items, shop.orders, shop.cart_items, shop.carts,
                 shop.users, shop.products, shop.categories
        RESTART IDENTITY
        ",
    )
    .execute(&mut *conn)
    .await?;
    Ok(())
}

async fn backdate_first_cart_line(
    conn: &mut PgConnection,
    catalog: &HashMap<String, CatalogEntry>,
) -> Result<(), SeedError> {
    let (code, _) = DEMO_CART[0];
    let entry = catalog
        .get(code)
        .ok_or_else(|| SeedError::MissingProduct(code.to_owned()))?;
    let earlier = Utc::now() - Duration::hours(1);

    sqlx::query(
        r"
        UPDATE shop.cart_items ci
        SET created_at = $1, updated_at = $1
        FROM shop.carts c
        WHERE c.id = ci.cart_id AND c.user_id = $2 AND ci.product_id = $3
        ",
    )
    .bind(earlier)
    .bind(DEMO_USER_ID)
    .bind(entry.id)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SEED_FILE: &str = include_str!("../../../../data/products.json");

    fn catalog_from(products: &[SeedProduct]) -> HashMap<String, CatalogEntry> {
        products
            .iter()
            .enumerate()
            .map(|(i, p)| {
                (
                    p.code.clone(),
                    CatalogEntry {
                        id: ProductId::new(i32::try_from(i).unwrap() + 1),
                        name: p.name.clone(),
                        price: round_money(p.price),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_seed_file_parses() {
        let products = parse_products(SEED_FILE).unwrap();
        assert!(!products.is_empty());
        assert!(products.iter().all(|p| DEFAULT_CATEGORIES.contains(&p.product_type.as_str())));
    }

    #[test]
    fn test_seed_file_covers_demo_data() {
        let products = parse_products(SEED_FILE).unwrap();
        let catalog = catalog_from(&products);
        for (code, _) in DEMO_CART {
            assert!(catalog.contains_key(code), "missing {code}");
        }
        let orders = historical_orders(&UserId::parse(DEMO_USER_ID).unwrap(), &catalog).unwrap();
        assert_eq!(orders.len(), 4);
    }

    #[test]
    fn test_historical_orders_use_catalog_prices() {
        let products = parse_products(SEED_FILE).unwrap();
        let catalog = catalog_from(&products);
        let orders = historical_orders(&UserId::parse(DEMO_USER_ID).unwrap(), &catalog).unwrap();

        let delivered = &orders[0];
        assert_eq!(delivered.status, OrderStatus::Delivered);
        let expected = catalog["CPU-I714700K"].price + catalog["SSD-SAMSUNG990P"].price;
        assert_eq!(delivered.total_amount, expected);
        assert_eq!(
            delivered.placed_at.unwrap().to_rfc3339(),
            "2025-01-10T12:00:00+00:00"
        );
        assert_eq!(orders[3].items.len(), 3);
    }

    #[test]
    fn test_missing_product_is_reported() {
        let result = historical_orders(&UserId::parse(DEMO_USER_ID).unwrap(), &HashMap::new());
        assert!(matches!(result, Err(SeedError::MissingProduct(_))));
    }

    #[test]
    fn test_extra_types_become_categories() {
        let products = parse_products(
            r#"[{"code":"PSU-1","name":"PSU","type":"zasilacz","price":299.5,"id":7,"date":"x"}]"#,
        )
        .unwrap();
        let names = category_names(&products);
        assert_eq!(names.len(), 5);
        assert_eq!(names[4], "zasilacz");
    }

    #[test]
    fn test_duplicate_codes_are_rejected() {
        let json = r#"[
            {"code":"A","name":"a","type":"dysk","price":1},
            {"code":"A","name":"b","type":"dysk","price":2}
        ]"#;
        assert!(matches!(parse_products(json), Err(SeedError::InvalidData(_))));
    }
}
