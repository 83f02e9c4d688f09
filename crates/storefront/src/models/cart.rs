//! Cart domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use partshop_core::{CartId, CartItemId, ProductId, UserId, sum_money};

use super::catalog::ProductWithCategory;

/// A user's cart. At most one exists per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Largest quantity a single cart line may hold.
pub const MAX_LINE_QUANTITY: i32 = 9_999;

/// One product line in a cart. `(cart_id, product_id)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: CartItemId,
    pub cart_id: CartId,
    pub product_id: ProductId,
    /// Between 1 and [`MAX_LINE_QUANTITY`].
    pub quantity: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A cart item resolved to its product and the product's category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLine {
    #[serde(flatten)]
    pub item: CartItem,
    pub product: ProductWithCategory,
}

/// A cart with its lines, most recently added first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartWithItems {
    #[serde(flatten)]
    pub cart: Cart,
    pub items: Vec<CartLine>,
}

impl CartWithItems {
    /// Current value of the cart, undiscounted, rounded to two places.
    #[must_use]
    pub fn total(&self) -> Decimal {
        sum_money(
            self.items
                .iter()
                .map(|line| (line.product.product.price, line.item.quantity)),
        )
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Total of an optional cart; a user without a cart has a total of zero.
#[must_use]
pub fn cart_total(cart: Option<&CartWithItems>) -> Decimal {
    cart.map_or(Decimal::ZERO, CartWithItems::total)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use partshop_core::CategoryId;

    use super::*;
    use crate::models::catalog::{Category, Product};

    fn line(id: i32, price: &str, quantity: i32) -> CartLine {
        let now = Utc::now();
        CartLine {
            item: CartItem {
                id: CartItemId::new(id),
                cart_id: CartId::new(1),
                product_id: ProductId::new(id),
                quantity,
                created_at: now,
                updated_at: now,
            },
            product: ProductWithCategory {
                product: Product {
                    id: ProductId::new(id),
                    code: format!("SKU-{id}"),
                    name: format!("Product {id}"),
                    product_type: "dysk".to_owned(),
                    description: String::new(),
                    price: price.parse().unwrap(),
                    amount: 10,
                    image: None,
                    category_id: CategoryId::new(1),
                },
                category: Category {
                    id: CategoryId::new(1),
                    name: "dysk".to_owned(),
                },
            },
        }
    }

    fn cart(items: Vec<CartLine>) -> CartWithItems {
        let now = Utc::now();
        CartWithItems {
            cart: Cart {
                id: CartId::new(1),
                user_id: UserId::parse("u1").unwrap(),
                created_at: now,
                updated_at: now,
            },
            items,
        }
    }

    #[test]
    fn test_total_sums_price_times_quantity() {
        let c = cart(vec![line(1, "100", 1), line(2, "50", 2)]);
        assert_eq!(c.total(), "200.00".parse::<Decimal>().unwrap());
    }

    #[test]
    fn test_total_rounds_to_cents() {
        let c = cart(vec![line(1, "19.999", 1)]);
        assert_eq!(c.total(), "20.00".parse::<Decimal>().unwrap());
    }

    #[test]
    fn test_missing_cart_total_is_zero() {
        assert_eq!(cart_total(None), Decimal::ZERO);
    }

    #[test]
    fn test_empty_cart_total_is_zero() {
        let c = cart(Vec::new());
        assert!(c.is_empty());
        assert_eq!(cart_total(Some(&c)), Decimal::ZERO);
    }
}
