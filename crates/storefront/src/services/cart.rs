//! Cart mutations: adding and removing lines, and merging carts.

use std::collections::HashMap;

use serde::Serialize;
use tracing::{info, instrument};

use partshop_core::{ProductId, UserId};

use super::{Result, ShopError};
use crate::db::{CartRef, ExpectedLine, RepositoryError, ShopStore, UnitOfWork};
use crate::models::{Cart, CartItem, CartLine, MAX_LINE_QUANTITY, NewUser};

/// Result of [`CartService::merge_cart`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum MergeOutcome {
    /// Every source line now lives in the destination cart.
    #[serde(rename_all = "camelCase")]
    Transferred { destination: Cart, lines_moved: usize },
    /// The source user had no cart or an empty one. Nothing was written.
    NothingToTransfer,
}

/// Cart write operations.
///
/// Each operation commits one unit of work and, once it has committed,
/// invalidates the affected cart views.
pub struct CartService<'a> {
    store: &'a dyn ShopStore,
    views: &'a dyn super::CartViewInvalidator,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(store: &'a dyn ShopStore, views: &'a dyn super::CartViewInvalidator) -> Self {
        Self { store, views }
    }

    /// Add `quantity` units of a product to the user's cart.
    ///
    /// Unknown users get a generated profile and the cart is created on first
    /// use. Adding a product already in the cart increases its quantity, up to
    /// [`MAX_LINE_QUANTITY`] per line.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::InvalidOperation` if `quantity` is below 1 or the
    /// line would exceed [`MAX_LINE_QUANTITY`],
    /// `ShopError::NotFound` if the product does not exist, and
    /// `ShopError::StorageFailure` if the commit fails.
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn add_item(
        &self,
        user_id: &UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<CartLine> {
        if !(1..=MAX_LINE_QUANTITY).contains(&quantity) {
            return Err(ShopError::InvalidOperation(format!(
                "quantity must be between 1 and {MAX_LINE_QUANTITY}, got {quantity}"
            )));
        }
        let product = self
            .store
            .find_product(product_id)
            .await?
            .ok_or_else(|| ShopError::NotFound(format!("product {product_id}")))?;

        let in_cart = self
            .cart_quantities(user_id)
            .await?
            .get(&product_id)
            .copied()
            .unwrap_or(0);
        if in_cart + quantity > MAX_LINE_QUANTITY {
            return Err(ShopError::InvalidOperation(format!(
                "cart already holds {in_cart} of product {product_id}, \
                 at most {MAX_LINE_QUANTITY} fit on one line"
            )));
        }

        let work = UnitOfWork::new()
            .ensure_user(NewUser::generated(user_id.clone()))
            .ensure_cart(user_id.clone())
            .upsert_cart_item(CartRef::OwnedBy(user_id.clone()), product_id, quantity);
        let receipt = self.store.commit(work).await?;
        self.views.invalidate_user(user_id).await;

        let item = receipt.upserted_items().next().cloned().ok_or_else(|| {
            ShopError::StorageFailure(RepositoryError::DataCorruption(
                "upsert produced no cart item".to_owned(),
            ))
        })?;
        Ok(CartLine { item, product })
    }

    /// Remove a product's line from the user's cart.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::NotFound` if the user has no cart or the cart has no
    /// line for the product, and `ShopError::StorageFailure` if the commit fails.
    #[instrument(skip(self), fields(user_id = %user_id, product_id = %product_id))]
    pub async fn remove_item(&self, user_id: &UserId, product_id: ProductId) -> Result<CartItem> {
        let cart = self
            .store
            .find_cart_by_user(user_id)
            .await?
            .ok_or_else(|| ShopError::NotFound(format!("cart for user {user_id}")))?;

        let receipt = self
            .store
            .commit(UnitOfWork::new().delete_cart_item(cart.id, product_id))
            .await
            .map_err(|e| match e {
                RepositoryError::NotFound(what) => ShopError::NotFound(what),
                other => other.into(),
            })?;
        self.views.invalidate_user(user_id).await;

        receipt
            .outcomes()
            .iter()
            .find_map(|outcome| match outcome {
                crate::db::IntentOutcome::CartItemDeleted(item) => Some(item.clone()),
                _ => None,
            })
            .ok_or_else(|| {
                ShopError::StorageFailure(RepositoryError::DataCorruption(
                    "delete produced no cart item".to_owned(),
                ))
            })
    }

    /// Move every line of `source`'s cart into `destination`'s cart.
    ///
    /// Quantities of products present in both carts are added together. The
    /// source cart is emptied but kept. The destination cart is created if
    /// needed. All writes happen in one unit of work that also re-checks the
    /// source lines, so a concurrent edit of the source cart makes the merge
    /// fail without side effects instead of losing that edit.
    ///
    /// # Errors
    ///
    /// Returns `ShopError::InvalidOperation` if both users are the same or a
    /// merged line would exceed [`MAX_LINE_QUANTITY`],
    /// `ShopError::NotFound` if the destination user does not exist, and
    /// `ShopError::StorageFailure` if the commit fails (including conflicts).
    #[instrument(skip(self), fields(source = %source, destination = %destination))]
    pub async fn merge_cart(&self, source: &UserId, destination: &UserId) -> Result<MergeOutcome> {
        if source == destination {
            return Err(ShopError::InvalidOperation(
                "cannot transfer a cart to the same user".to_owned(),
            ));
        }

        let Some(source_cart) = self.store.find_cart_by_user(source).await? else {
            return Ok(MergeOutcome::NothingToTransfer);
        };
        let lines = self.store.cart_lines(source_cart.id).await?;
        if lines.is_empty() {
            return Ok(MergeOutcome::NothingToTransfer);
        }

        if self.store.find_user(destination).await?.is_none() {
            return Err(ShopError::NotFound(format!("user {destination}")));
        }

        let held = self.cart_quantities(destination).await?;
        if let Some(line) = lines.iter().find(|line| {
            held.get(&line.item.product_id).copied().unwrap_or(0) + line.item.quantity
                > MAX_LINE_QUANTITY
        }) {
            return Err(ShopError::InvalidOperation(format!(
                "merging product {} would exceed {MAX_LINE_QUANTITY} units on one line",
                line.item.product_id
            )));
        }

        let expected: Vec<ExpectedLine> = lines
            .iter()
            .map(|line| ExpectedLine {
                product_id: line.item.product_id,
                quantity: line.item.quantity,
            })
            .collect();

        let mut work = UnitOfWork::new()
            .expect_cart_items(source_cart.id, expected.iter().copied())
            .ensure_cart(destination.clone());
        for line in &expected {
            work = work.upsert_cart_item(
                CartRef::OwnedBy(destination.clone()),
                line.product_id,
                line.quantity,
            );
        }
        work = work.clear_cart(source_cart.id);

        let receipt = self.store.commit(work).await?;
        self.views.invalidate_all().await;

        let destination_cart = receipt.ensured_cart().cloned().ok_or_else(|| {
            ShopError::StorageFailure(RepositoryError::DataCorruption(
                "merge produced no destination cart".to_owned(),
            ))
        })?;
        info!(
            lines_moved = expected.len(),
            source_lines_cleared = receipt.cleared_lines(),
            destination_cart = %destination_cart.id,
            "Cart transferred"
        );

        Ok(MergeOutcome::Transferred {
            destination: destination_cart,
            lines_moved: expected.len(),
        })
    }

    /// Quantity per product currently in the user's cart; empty without a cart.
    async fn cart_quantities(&self, user_id: &UserId) -> Result<HashMap<ProductId, i32>> {
        let Some(cart) = self.store.find_cart_by_user(user_id).await? else {
            return Ok(HashMap::new());
        };
        Ok(self
            .store
            .cart_lines(cart.id)
            .await?
            .into_iter()
            .map(|line| (line.item.product_id, line.item.quantity))
            .collect())
    }
}
