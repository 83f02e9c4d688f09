//! Seed and reset commands.
//!
//! Seeding replaces everything in the `shop` schema: categories, the product
//! catalog from a JSON file, the demo user with a two-line cart, and four
//! historical orders.

use std::path::Path;

use tracing::info;

use partshop_storefront::db::seed;

use super::{CommandError, connect};

/// Seed the shop database from a product catalog file.
///
/// # Errors
///
/// Returns an error if the file is unreadable or invalid, or if any write
/// fails. A failed seed leaves the previous data in place.
pub async fn run(file: &Path) -> Result<(), CommandError> {
    info!(path = %file.display(), "Loading product catalog");
    let pool = connect().await?;

    let report = seed::seed_from_file(&pool, file).await?;

    info!("Seeding complete!");
    info!("  Categories: {}", report.categories);
    info!("  Products: {}", report.products);
    info!("  Demo cart lines: {}", report.cart_lines);
    info!("  Orders: {}", report.orders);
    Ok(())
}

/// Remove all shop data.
///
/// # Errors
///
/// Returns an error if the database is unreachable or the truncate fails.
pub async fn reset() -> Result<(), CommandError> {
    let pool = connect().await?;
    seed::reset(&pool).await?;
    info!("Shop data cleared");
    Ok(())
}
