//! Business logic services for the shop.
//!
//! # Services
//!
//! - [`CartReader`] - Cart aggregates, totals and the users overview
//! - [`CartService`] - Adding and removing lines, merging one user's cart into another's
//! - [`CheckoutService`] - Turning a cart into an order
//! - [`CartCache`] - Cached cart views and their invalidation
//!
//! Services borrow a [`ShopStore`](crate::db::ShopStore) and are cheap to
//! construct per request. Every write is a single
//! [`UnitOfWork`](crate::db::UnitOfWork), so a failed operation leaves no
//! partial state behind.

pub mod cart;
pub mod cart_cache;
pub mod cart_reader;
pub mod checkout;
mod error;

pub use cart::{CartService, MergeOutcome};
pub use cart_cache::{CartCache, CartViewInvalidator, NoopInvalidator};
pub use cart_reader::CartReader;
pub use checkout::{CheckoutService, snapshot_order};
pub use error::ShopError;

/// Result type for service operations.
pub type Result<T> = std::result::Result<T, ShopError>;
