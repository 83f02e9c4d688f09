//! The `ShopStore` trait.

use async_trait::async_trait;

use partshop_core::{CartId, CategoryId, ProductId, UserId};

use super::Result;
use super::unit_of_work::{CommitReceipt, UnitOfWork};
use crate::models::{
    Cart, CartLine, CategoryWithCount, OrderWithItems, ProductWithCategory, User, UserCartSummary,
};

/// Typed access to the shop's persistent state.
///
/// Implementations:
/// - `PgShopStore`: `PostgreSQL` storage
/// - `MemoryShopStore`: in-process tables for tests
#[async_trait]
pub trait ShopStore: Send + Sync {
    /// Check that the backing store answers.
    async fn ping(&self) -> Result<()>;

    async fn find_user(&self, id: &UserId) -> Result<Option<User>>;

    /// Every user with a summary of their cart, ordered by user id.
    async fn list_users_with_carts(&self) -> Result<Vec<UserCartSummary>>;

    async fn find_cart(&self, id: CartId) -> Result<Option<Cart>>;

    async fn find_cart_by_user(&self, user_id: &UserId) -> Result<Option<Cart>>;

    /// Lines of a cart resolved to product and category, newest line first.
    async fn cart_lines(&self, cart_id: CartId) -> Result<Vec<CartLine>>;

    async fn find_product(&self, id: ProductId) -> Result<Option<ProductWithCategory>>;

    /// Products ordered by id, optionally restricted to one category.
    async fn list_products(&self, category: Option<CategoryId>) -> Result<Vec<ProductWithCategory>>;

    /// Categories ordered by id, with their product counts.
    async fn list_categories(&self) -> Result<Vec<CategoryWithCount>>;

    /// A user's orders with their lines, newest first.
    async fn list_orders(&self, user_id: &UserId) -> Result<Vec<OrderWithItems>>;

    /// Apply every intent of `work` in order as one transaction.
    ///
    /// Either all intents take effect or none does. An empty unit is a no-op.
    async fn commit(&self, work: UnitOfWork) -> Result<CommitReceipt>;
}
