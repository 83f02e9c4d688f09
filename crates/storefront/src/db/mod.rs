//! Persistence gateway for the shop.
//!
//! # Schema: `shop`
//!
//! - `users` - Shop users (opaque string ids)
//! - `categories`, `products` - Catalog
//! - `carts` - One per user, created lazily
//! - `cart_items` - Unique on `(cart_id, product_id)`
//! - `orders`, `order_items` - Immutable checkout snapshots
//!
//! # Access
//!
//! Handlers and services talk to the [`ShopStore`] trait. Reads are plain
//! point lookups and listings; every write goes through
//! [`ShopStore::commit`], which applies a [`UnitOfWork`] as one transaction.
//!
//! - [`postgres::PgShopStore`] - `PostgreSQL` via sqlx
//! - [`memory::MemoryShopStore`] - In-process tables for tests and demos
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p partshop-cli -- migrate
//! ```

pub mod memory;
pub mod postgres;
pub mod seed;
pub mod store;
pub mod unit_of_work;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use memory::MemoryShopStore;
pub use postgres::PgShopStore;
pub use store::ShopStore;
pub use unit_of_work::{
    CartRef, CommitReceipt, ExpectedLine, IntentOutcome, UnitOfWork, WriteIntent,
};

/// Errors raised by the persistence gateway.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// A row addressed by a write intent does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Constraint violation, lock conflict, or a precondition that no longer holds.
    #[error("conflict: {0}")]
    Conflict(String),

    /// A written value breaks a table constraint, e.g. a cart line quantity
    /// outside `1..=MAX_LINE_QUANTITY`.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// The store refused the operation (used by the in-memory store's fault injection).
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl RepositoryError {
    /// Classify a sqlx error by its `PostgreSQL` SQLSTATE.
    #[must_use]
    pub fn from_sqlx(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err {
            if db_err.is_unique_violation() {
                return Self::Conflict(db_err.message().to_owned());
            }
            if db_err.is_foreign_key_violation() {
                return Self::NotFound(db_err.message().to_owned());
            }
            // check_violation, numeric_value_out_of_range
            if db_err.is_check_violation() || db_err.code().as_deref() == Some("22003") {
                return Self::InvalidValue(db_err.message().to_owned());
            }
            // serialization_failure, deadlock_detected, lock_not_available
            if matches!(db_err.code().as_deref(), Some("40001" | "40P01" | "55P03")) {
                return Self::Conflict(db_err.message().to_owned());
            }
        }
        Self::Database(err)
    }

    /// Whether the failure is a concurrency or constraint conflict.
    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}

/// Result type for gateway operations.
pub type Result<T> = std::result::Result<T, RepositoryError>;

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
/// * `max_connections` - Upper bound on pooled connections
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(
    database_url: &secrecy::SecretString,
    max_connections: u32,
) -> std::result::Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .min_connections(2.min(max_connections))
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
