//! Checkout: turning a cart into an order.
//!
//! The order copies each line's quantity, the product's name and code, and
//! the unit price after the checkout discount. Those copies are what the
//! order shows from then on; later catalog changes do not reach it.

use tracing::{info, instrument};

use partshop_core::{CartId, UserId, discounted_price};

use super::{CartReader, CartViewInvalidator, Result, ShopError};
use crate::db::{ExpectedLine, RepositoryError, ShopStore, UnitOfWork};
use crate::models::{CartWithItems, NewOrder, NewOrderItem, OrderWithItems};

/// Build the pending order for a cart's current contents.
///
/// Unit prices are discounted and rounded per line; the total is the rounded
/// sum of those snapshot prices times quantity.
#[must_use]
pub fn snapshot_order(user_id: UserId, cart: &CartWithItems) -> NewOrder {
    let items = cart
        .items
        .iter()
        .map(|line| NewOrderItem {
            product_id: line.item.product_id,
            quantity: line.item.quantity,
            price_at_order: discounted_price(line.product.product.price),
            product_name: line.product.product.name.clone(),
            product_code: line.product.product.code.clone(),
        })
        .collect();
    NewOrder::pending(user_id, items)
}

/// Places orders.
pub struct CheckoutService<'a> {
    store: &'a dyn ShopStore,
    views: &'a dyn CartViewInvalidator,
}

impl<'a> CheckoutService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn ShopStore, views: &'a dyn CartViewInvalidator) -> Self {
        Self { store, views }
    }

    /// Convert a cart into an order for the cart's owner and empty the cart.
    ///
    /// # Errors
    ///
    /// See [`Self::checkout_for`].
    pub async fn checkout(&self, cart_id: CartId) -> Result<OrderWithItems> {
        self.checkout_for(cart_id, None).await
    }

    /// Convert a cart into an order, optionally asserting who owns the cart.
    ///
    /// Order creation and emptying the cart commit together, guarded by a
    /// re-check of the cart lines that were priced. The cart itself stays.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::NotFound` if the cart does not exist,
    /// `ShopError::InvalidOperation` if `owner` is given and does not own the
    /// cart, `ShopError::EmptyCart` if the cart has no lines, and
    /// `ShopError::StorageFailure` if the commit fails. No order exists after
    /// any error.
    #[instrument(skip(self, owner), fields(cart_id = %cart_id))]
    pub async fn checkout_for(
        &self,
        cart_id: CartId,
        owner: Option<&UserId>,
    ) -> Result<OrderWithItems> {
        let cart = CartReader::new(self.store)
            .get_cart_by_id(cart_id)
            .await?
            .ok_or_else(|| ShopError::NotFound(format!("cart {cart_id}")))?;

        if let Some(owner) = owner.filter(|o| *o != &cart.cart.user_id) {
            return Err(ShopError::InvalidOperation(format!(
                "cart {cart_id} does not belong to user {owner}"
            )));
        }
        if cart.is_empty() {
            return Err(ShopError::EmptyCart(cart_id));
        }

        let order = snapshot_order(cart.cart.user_id.clone(), &cart);
        let expected = cart.items.iter().map(|line| ExpectedLine {
            product_id: line.item.product_id,
            quantity: line.item.quantity,
        });
        let work = UnitOfWork::new()
            .expect_cart_items(cart_id, expected)
            .create_order(order)
            .clear_cart(cart_id);

        let receipt = self.store.commit(work).await?;
        self.views.invalidate_all().await;

        let order = receipt.into_order().ok_or_else(|| {
            ShopError::StorageFailure(RepositoryError::DataCorruption(
                "checkout produced no order".to_owned(),
            ))
        })?;
        info!(
            order_id = %order.order.id,
            total = %order.order.total_amount,
            lines = order.items.len(),
            "Order placed"
        );
        Ok(order)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use partshop_core::OrderStatus;

    use super::*;
    use crate::db::MemoryShopStore;
    use crate::services::NoopInvalidator;
    use crate::services::testing::{catalog, fill_cart, price, quantities, uid};

    fn service(store: &MemoryShopStore) -> CheckoutService<'_> {
        CheckoutService::new(store, &NoopInvalidator)
    }

    async fn cart_id(store: &MemoryShopStore, user: &UserId) -> CartId {
        store.find_cart_by_user(user).await.unwrap().unwrap().id
    }

    #[tokio::test]
    async fn test_checkout_discounts_and_empties_cart() {
        let (store, products) = catalog().await;
        let user = uid("u1");
        fill_cart(&store, &user, &[(&products[0], 1), (&products[1], 2)]).await;
        let cart = cart_id(&store, &user).await;

        let order = service(&store).checkout(cart).await.unwrap();

        assert_eq!(order.order.total_amount, price("180.00"));
        assert_eq!(order.order.status, OrderStatus::Pending);
        assert_eq!(order.order.user_id, user);
        assert_eq!(order.items.len(), 2);
        assert!(quantities(&store, &user).await.is_empty());
        assert!(store.find_cart(cart).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_snapshot_prices_are_rounded_per_line() {
        let (store, products) = catalog().await;
        let user = uid("u1");
        fill_cart(&store, &user, &[(&products[2], 3)]).await;
        let cart = cart_id(&store, &user).await;

        let order = service(&store).checkout(cart).await.unwrap();

        // 19.99 * 0.9 = 17.991 -> 17.99; 3 * 17.99 = 53.97
        assert_eq!(order.items[0].price_at_order, price("17.99"));
        assert_eq!(order.order.total_amount, price("53.97"));
    }

    #[tokio::test]
    async fn test_order_survives_repricing() {
        let (store, products) = catalog().await;
        let user = uid("u1");
        fill_cart(&store, &user, &[(&products[0], 1)]).await;
        let cart = cart_id(&store, &user).await;
        service(&store).checkout(cart).await.unwrap();

        store
            .update_product_price(products[0].id, price("500"))
            .await
            .unwrap();

        let orders = store.list_orders(&user).await.unwrap();
        assert_eq!(orders[0].items[0].price_at_order, price("90.00"));
        assert_eq!(orders[0].order.total_amount, price("90.00"));
        assert_eq!(orders[0].items[0].product_code, "P1");
    }

    #[tokio::test]
    async fn test_empty_cart_creates_no_order() {
        let (store, _) = catalog().await;
        let user = uid("u1");
        fill_cart(&store, &user, &[]).await;
        let cart = cart_id(&store, &user).await;
        let commits = store.commit_count();

        let result = service(&store).checkout(cart).await;

        assert!(matches!(result, Err(ShopError::EmptyCart(id)) if id == cart));
        assert_eq!(store.commit_count(), commits);
        assert!(store.list_orders(&user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_cart_is_not_found() {
        let (store, _) = catalog().await;
        let result = service(&store).checkout(CartId::new(42)).await;
        assert!(matches!(result, Err(ShopError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_wrong_owner_is_rejected() {
        let (store, products) = catalog().await;
        let user = uid("u1");
        fill_cart(&store, &user, &[(&products[0], 1)]).await;
        let cart = cart_id(&store, &user).await;

        let result = service(&store).checkout_for(cart, Some(&uid("other"))).await;

        assert!(matches!(result, Err(ShopError::InvalidOperation(_))));
        assert_eq!(quantities(&store, &user).await, [("P1".to_owned(), 1)]);
    }

    #[tokio::test]
    async fn test_failed_commit_creates_no_order_and_keeps_cart() {
        let (store, products) = catalog().await;
        let user = uid("u1");
        fill_cart(&store, &user, &[(&products[0], 1)]).await;
        let cart = cart_id(&store, &user).await;
        // expect, create order, clear: fail on the clear.
        store.fail_on_intent(Some(2)).await;

        let result = service(&store).checkout(cart).await;

        assert!(matches!(result, Err(ShopError::StorageFailure(_))));
        store.fail_on_intent(None).await;
        assert!(store.list_orders(&user).await.unwrap().is_empty());
        assert_eq!(quantities(&store, &user).await, [("P1".to_owned(), 1)]);
    }
}
