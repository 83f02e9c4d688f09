//! Read-side cart assembly.

use rust_decimal::Decimal;
use tracing::instrument;

use partshop_core::{CartId, UserId};

use super::Result;
use crate::db::ShopStore;
use crate::models::{Cart, CartWithItems, UserCartSummary, cart_total};

/// Assembles carts with their resolved lines.
pub struct CartReader<'a> {
    store: &'a dyn ShopStore,
}

impl<'a> CartReader<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn ShopStore) -> Self {
        Self { store }
    }

    /// The user's cart with every line resolved to product and category,
    /// most recently added line first.
    ///
    /// Returns `Ok(None)` when the user has no cart.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::StorageFailure` if a query fails.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub async fn get_cart_with_items(&self, user_id: &UserId) -> Result<Option<CartWithItems>> {
        match self.store.find_cart_by_user(user_id).await? {
            Some(cart) => self.resolve(cart).await.map(Some),
            None => Ok(None),
        }
    }

    /// Same as [`Self::get_cart_with_items`], addressed by cart id.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::StorageFailure` if a query fails.
    pub async fn get_cart_by_id(&self, cart_id: CartId) -> Result<Option<CartWithItems>> {
        match self.store.find_cart(cart_id).await? {
            Some(cart) => self.resolve(cart).await.map(Some),
            None => Ok(None),
        }
    }

    /// Undiscounted value of the user's cart; zero when there is no cart.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::StorageFailure` if a query fails.
    pub async fn cart_total(&self, user_id: &UserId) -> Result<Decimal> {
        let cart = self.get_cart_with_items(user_id).await?;
        Ok(cart_total(cart.as_ref()))
    }

    /// Every user with their cart's id and line count.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::StorageFailure` if the query fails.
    pub async fn users_with_carts(&self) -> Result<Vec<UserCartSummary>> {
        Ok(self.store.list_users_with_carts().await?)
    }

    async fn resolve(&self, cart: Cart) -> Result<CartWithItems> {
        let items = self.store.cart_lines(cart.id).await?;
        Ok(CartWithItems { cart, items })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::services::testing::{catalog, fill_cart, price, uid};

    #[tokio::test]
    async fn test_missing_cart_is_none_with_zero_total() {
        let (store, _) = catalog().await;
        let reader = CartReader::new(&store);

        assert!(reader.get_cart_with_items(&uid("nobody")).await.unwrap().is_none());
        assert_eq!(reader.cart_total(&uid("nobody")).await.unwrap(), Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_total_is_undiscounted_and_rounded() {
        let (store, products) = catalog().await;
        let user = uid("u1");
        fill_cart(&store, &user, &[(&products[0], 1), (&products[1], 2), (&products[2], 3)]).await;

        let total = CartReader::new(&store).cart_total(&user).await.unwrap();
        assert_eq!(total, price("259.97"));
    }

    #[tokio::test]
    async fn test_lines_are_newest_first_and_resolved() {
        let (store, products) = catalog().await;
        let user = uid("u1");
        fill_cart(&store, &user, &[(&products[0], 1)]).await;
        fill_cart(&store, &user, &[(&products[1], 1)]).await;

        let cart = CartReader::new(&store)
            .get_cart_with_items(&user)
            .await
            .unwrap()
            .unwrap();
        let codes: Vec<_> = cart.items.iter().map(|l| l.product.product.code.as_str()).collect();
        assert_eq!(codes, ["P2", "P1"]);
        assert_eq!(cart.items[0].product.category.name, "dysk");
    }

    #[tokio::test]
    async fn test_users_overview_counts_lines() {
        let (store, products) = catalog().await;
        fill_cart(&store, &uid("a"), &[(&products[0], 4), (&products[1], 1)]).await;
        store
            .insert_user(crate::models::NewUser::generated(uid("b")))
            .await;

        let users = CartReader::new(&store).users_with_carts().await.unwrap();
        assert_eq!(users.len(), 2);
        assert_eq!(users[0].cart.unwrap().item_count, 2);
        assert!(users[1].cart.is_none());
    }
}
