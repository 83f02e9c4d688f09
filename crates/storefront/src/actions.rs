//! Server-side cart procedures.
//!
//! [`ShopActions`] is the in-process entry point for cart reads and writes.
//! Reads of a user's cart go through the cart view cache; every successful
//! write invalidates the views it may have changed before returning.

use std::sync::Arc;

use rust_decimal::Decimal;

use partshop_core::{CartId, ProductId, UserId};

use crate::db::ShopStore;
use crate::models::{CartItem, CartLine, CartWithItems, OrderWithItems, UserCartSummary, cart_total};
use crate::services::{
    CartCache, CartReader, CartService, CheckoutService, MergeOutcome, Result,
};

/// Cart procedures over a shared store and cart view cache.
#[derive(Clone)]
pub struct ShopActions {
    store: Arc<dyn ShopStore>,
    views: CartCache,
}

impl ShopActions {
    #[must_use]
    pub fn new(store: Arc<dyn ShopStore>, views: CartCache) -> Self {
        Self { store, views }
    }

    /// The user's cart with resolved lines, newest first; `None` without a cart.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::StorageFailure` if the store cannot be read.
    pub async fn get_cart_with_items(&self, user_id: &UserId) -> Result<Option<CartWithItems>> {
        let reader = CartReader::new(self.store.as_ref());
        self.views
            .get_or_load(user_id, reader.get_cart_with_items(user_id))
            .await
    }

    /// Undiscounted total of the user's cart; zero without a cart.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::StorageFailure` if the store cannot be read.
    pub async fn get_cart_total(&self, user_id: &UserId) -> Result<Decimal> {
        let cart = self.get_cart_with_items(user_id).await?;
        Ok(cart_total(cart.as_ref()))
    }

    /// Every user with their cart summary.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::StorageFailure` if the store cannot be read.
    pub async fn get_all_users_with_carts(&self) -> Result<Vec<UserCartSummary>> {
        CartReader::new(self.store.as_ref()).users_with_carts().await
    }

    /// Merge `from`'s cart into `to`'s cart.
    ///
    /// # Errors
    ///
    /// See [`CartService::merge_cart`].
    pub async fn transfer_cart(&self, from: &UserId, to: &UserId) -> Result<MergeOutcome> {
        self.cart_service().merge_cart(from, to).await
    }

    /// Add a product to the user's cart.
    ///
    /// # Errors
    ///
    /// See [`CartService::add_item`].
    pub async fn add_item(
        &self,
        user_id: &UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartLine> {
        self.cart_service().add_item(user_id, product_id, quantity).await
    }

    /// Remove a product's line from the user's cart.
    ///
    /// # Errors
    ///
    /// See [`CartService::remove_item`].
    pub async fn remove_item(&self, user_id: &UserId, product_id: ProductId) -> Result<CartItem> {
        self.cart_service().remove_item(user_id, product_id).await
    }

    /// Place an order from a cart.
    ///
    /// # Errors
    ///
    /// See [`CheckoutService::checkout_for`].
    pub async fn checkout(&self, cart_id: CartId, owner: Option<&UserId>) -> Result<OrderWithItems> {
        CheckoutService::new(self.store.as_ref(), &self.views)
            .checkout_for(cart_id, owner)
            .await
    }

    fn cart_service(&self) -> CartService<'_> {
        CartService::new(self.store.as_ref(), &self.views)
    }
}

impl std::fmt::Debug for ShopActions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopActions")
            .field("views", &self.views)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::db::MemoryShopStore;
    use crate::services::testing::{catalog, fill_cart, price, uid};

    async fn actions() -> (ShopActions, Arc<MemoryShopStore>, Vec<crate::models::Product>) {
        let (store, products) = catalog().await;
        let store = Arc::new(store);
        let actions = ShopActions::new(
            Arc::clone(&store) as Arc<dyn ShopStore>,
            CartCache::new(100, Duration::from_secs(600)),
        );
        (actions, store, products)
    }

    #[tokio::test]
    async fn test_read_after_transfer_reflects_merge() {
        let (actions, store, products) = actions().await;
        let (a, b) = (uid("a"), uid("b"));
        fill_cart(&store, &a, &[(&products[0], 2)]).await;
        fill_cart(&store, &b, &[(&products[0], 3)]).await;

        // Warm the cache with the pre-merge views.
        assert_eq!(actions.get_cart_total(&a).await.unwrap(), price("200.00"));
        assert_eq!(actions.get_cart_total(&b).await.unwrap(), price("300.00"));

        actions.transfer_cart(&a, &b).await.unwrap();

        assert_eq!(actions.get_cart_total(&a).await.unwrap(), Decimal::ZERO);
        assert_eq!(actions.get_cart_total(&b).await.unwrap(), price("500.00"));
    }

    #[tokio::test]
    async fn test_read_after_checkout_reflects_empty_cart() {
        let (actions, _store, products) = actions().await;
        let user = uid("u1");
        let line = actions.add_item(&user, products[1].id, 2).await.unwrap();
        assert_eq!(actions.get_cart_total(&user).await.unwrap(), price("100.00"));

        let order = actions.checkout(line.item.cart_id, Some(&user)).await.unwrap();

        assert_eq!(order.order.total_amount, price("90.00"));
        let cart = actions.get_cart_with_items(&user).await.unwrap().unwrap();
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn test_add_and_remove_invalidate_the_users_view() {
        let (actions, _store, products) = actions().await;
        let user = uid("u1");

        assert!(actions.get_cart_with_items(&user).await.unwrap().is_none());
        actions.add_item(&user, products[0].id, 1).await.unwrap();
        let cart = actions.get_cart_with_items(&user).await.unwrap().unwrap();
        assert_eq!(cart.items.len(), 1);

        actions.remove_item(&user, products[0].id).await.unwrap();
        let cart = actions.get_cart_with_items(&user).await.unwrap().unwrap();
        assert!(cart.is_empty());
    }

    #[tokio::test]
    async fn test_users_overview() {
        let (actions, _store, products) = actions().await;
        actions.add_item(&uid("u1"), products[0].id, 1).await.unwrap();

        let users = actions.get_all_users_with_carts().await.unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users[0].cart.unwrap().item_count, 1);
    }
}
