//! Typed write intents committed as one atomic batch.
//!
//! A [`UnitOfWork`] is built up front from already-read state and handed to
//! [`ShopStore::commit`](super::ShopStore::commit). The store applies the
//! intents in order inside a single transaction; if any intent fails, none of
//! them is applied.
//!
//! Every intent that touches a cart takes that cart's row lock first, so two
//! units writing the same cart run one after the other.

use partshop_core::{CartId, ProductId, UserId};

use crate::models::{Cart, CartItem, NewOrder, NewUser, OrderWithItems, User};

/// How an intent addresses a cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CartRef {
    /// A cart whose id is already known.
    Id(CartId),
    /// The cart owned by a user, resolved inside the transaction. Pair with a
    /// preceding [`WriteIntent::EnsureCart`] when the cart may not exist yet.
    OwnedBy(UserId),
}

/// One `(product, quantity)` pair a cart is expected to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ExpectedLine {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// A single write applied by [`ShopStore::commit`](super::ShopStore::commit).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteIntent {
    /// Insert the user unless a user with that id exists.
    EnsureUser(NewUser),
    /// Insert a cart for the user unless one exists; locks it.
    EnsureCart { user_id: UserId },
    /// Lock the cart and fail with a conflict unless it holds exactly `lines`.
    ExpectCartItems {
        cart_id: CartId,
        lines: Vec<ExpectedLine>,
    },
    /// Add `quantity` to the product's line, creating the line if absent.
    UpsertCartItem {
        cart: CartRef,
        product_id: ProductId,
        quantity: i32,
    },
    /// Delete one line; fails with not-found if the line does not exist.
    DeleteCartItem {
        cart_id: CartId,
        product_id: ProductId,
    },
    /// Delete every line of the cart. The cart itself stays.
    ClearCart { cart_id: CartId },
    /// Insert an order and all of its lines.
    CreateOrder(NewOrder),
}

impl WriteIntent {
    /// Short name for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::EnsureUser(_) => "ensure_user",
            Self::EnsureCart { .. } => "ensure_cart",
            Self::ExpectCartItems { .. } => "expect_cart_items",
            Self::UpsertCartItem { .. } => "upsert_cart_item",
            Self::DeleteCartItem { .. } => "delete_cart_item",
            Self::ClearCart { .. } => "clear_cart",
            Self::CreateOrder(_) => "create_order",
        }
    }
}

/// What an applied intent produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntentOutcome {
    UserEnsured(User),
    CartEnsured(Cart),
    CartVerified(CartId),
    CartItemUpserted(CartItem),
    CartItemDeleted(CartItem),
    CartCleared { cart_id: CartId, removed: u64 },
    OrderCreated(OrderWithItems),
}

/// Ordered batch of write intents.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnitOfWork {
    intents: Vec<WriteIntent>,
}

impl UnitOfWork {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            intents: Vec::new(),
        }
    }

    /// Append an intent.
    pub fn push(&mut self, intent: WriteIntent) {
        self.intents.push(intent);
    }

    #[must_use]
    pub fn ensure_user(mut self, user: NewUser) -> Self {
        self.push(WriteIntent::EnsureUser(user));
        self
    }

    #[must_use]
    pub fn ensure_cart(mut self, user_id: UserId) -> Self {
        self.push(WriteIntent::EnsureCart { user_id });
        self
    }

    /// Guard the rest of the unit against concurrent edits of `cart_id`.
    #[must_use]
    pub fn expect_cart_items<I>(mut self, cart_id: CartId, lines: I) -> Self
    where
        I: IntoIterator<Item = ExpectedLine>,
    {
        self.push(WriteIntent::ExpectCartItems {
            cart_id,
            lines: lines.into_iter().collect(),
        });
        self
    }

    #[must_use]
    pub fn upsert_cart_item(mut self, cart: CartRef, product_id: ProductId, quantity: i32) -> Self {
        self.push(WriteIntent::UpsertCartItem {
            cart,
            product_id,
            quantity,
        });
        self
    }

    #[must_use]
    pub fn delete_cart_item(mut self, cart_id: CartId, product_id: ProductId) -> Self {
        self.push(WriteIntent::DeleteCartItem {
            cart_id,
            product_id,
        });
        self
    }

    #[must_use]
    pub fn clear_cart(mut self, cart_id: CartId) -> Self {
        self.push(WriteIntent::ClearCart { cart_id });
        self
    }

    #[must_use]
    pub fn create_order(mut self, order: NewOrder) -> Self {
        self.push(WriteIntent::CreateOrder(order));
        self
    }

    #[must_use]
    pub fn intents(&self) -> &[WriteIntent] {
        &self.intents
    }

    #[must_use]
    pub fn into_intents(self) -> Vec<WriteIntent> {
        self.intents
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.intents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.intents.is_empty()
    }
}

/// Outcomes of a committed unit, in intent order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReceipt {
    outcomes: Vec<IntentOutcome>,
}

impl CommitReceipt {
    #[must_use]
    pub const fn new(outcomes: Vec<IntentOutcome>) -> Self {
        Self { outcomes }
    }

    #[must_use]
    pub fn outcomes(&self) -> &[IntentOutcome] {
        &self.outcomes
    }

    /// The first cart produced by an `EnsureCart` intent.
    #[must_use]
    pub fn ensured_cart(&self) -> Option<&Cart> {
        self.outcomes.iter().find_map(|outcome| match outcome {
            IntentOutcome::CartEnsured(cart) => Some(cart),
            _ => None,
        })
    }

    /// Lines written by `UpsertCartItem` intents.
    pub fn upserted_items(&self) -> impl Iterator<Item = &CartItem> {
        self.outcomes.iter().filter_map(|outcome| match outcome {
            IntentOutcome::CartItemUpserted(item) => Some(item),
            _ => None,
        })
    }

    /// Total number of lines removed by `ClearCart` intents.
    #[must_use]
    pub fn cleared_lines(&self) -> u64 {
        self.outcomes
            .iter()
            .map(|outcome| match outcome {
                IntentOutcome::CartCleared { removed, .. } => *removed,
                _ => 0,
            })
            .sum()
    }

    /// The order produced by a `CreateOrder` intent.
    #[must_use]
    pub fn into_order(self) -> Option<OrderWithItems> {
        self.outcomes.into_iter().find_map(|outcome| match outcome {
            IntentOutcome::OrderCreated(order) => Some(order),
            _ => None,
        })
    }
}

/// Whether a cart's current `(product, quantity)` lines are exactly `expected`.
#[must_use]
pub fn lines_match(actual: &[(ProductId, i32)], expected: &[ExpectedLine]) -> bool {
    if actual.len() != expected.len() {
        return false;
    }
    let mut actual: Vec<ExpectedLine> = actual
        .iter()
        .map(|&(product_id, quantity)| ExpectedLine {
            product_id,
            quantity,
        })
        .collect();
    let mut expected = expected.to_vec();
    actual.sort_unstable();
    expected.sort_unstable();
    actual == expected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(product: i32, quantity: i32) -> ExpectedLine {
        ExpectedLine {
            product_id: ProductId::new(product),
            quantity,
        }
    }

    #[test]
    fn test_builder_keeps_order() {
        let work = UnitOfWork::new()
            .clear_cart(CartId::new(1))
            .delete_cart_item(CartId::new(2), ProductId::new(3));

        let kinds: Vec<_> = work.intents().iter().map(WriteIntent::kind).collect();
        assert_eq!(kinds, ["clear_cart", "delete_cart_item"]);
        assert_eq!(work.len(), 2);
    }

    #[test]
    fn test_lines_match_ignores_order() {
        let actual = [(ProductId::new(2), 1), (ProductId::new(1), 4)];
        assert!(lines_match(&actual, &[line(1, 4), line(2, 1)]));
    }

    #[test]
    fn test_lines_match_detects_quantity_change() {
        let actual = [(ProductId::new(1), 5)];
        assert!(!lines_match(&actual, &[line(1, 4)]));
    }

    #[test]
    fn test_lines_match_detects_added_line() {
        let actual = [(ProductId::new(1), 4), (ProductId::new(9), 1)];
        assert!(!lines_match(&actual, &[line(1, 4)]));
    }

    #[test]
    fn test_receipt_accessors() {
        let receipt = CommitReceipt::new(vec![
            IntentOutcome::CartCleared {
                cart_id: CartId::new(1),
                removed: 2,
            },
            IntentOutcome::CartVerified(CartId::new(1)),
            IntentOutcome::CartCleared {
                cart_id: CartId::new(2),
                removed: 1,
            },
        ]);
        assert_eq!(receipt.cleared_lines(), 3);
        assert!(receipt.ensured_cart().is_none());
        assert!(receipt.into_order().is_none());
    }
}
