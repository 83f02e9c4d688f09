//! Domain models for the shop.
//!
//! These are validated domain objects, separate from the database row types in
//! [`crate::db`]. All of them serialize with camelCase keys, which is the shape
//! the shop's web client consumes.

pub mod cart;
pub mod catalog;
pub mod order;
pub mod user;

pub use cart::{Cart, CartItem, CartLine, CartWithItems, MAX_LINE_QUANTITY, cart_total};
pub use catalog::{Category, CategoryWithCount, NewProduct, Product, ProductWithCategory};
pub use order::{NewOrder, NewOrderItem, Order, OrderItem, OrderWithItems};
pub use user::{CartSummary, NewUser, User, UserCartSummary};
