//! Order domain types.
//!
//! Orders are written once at checkout. Each [`OrderItem`] carries its own
//! copy of the unit price, product name and product code, so an order keeps
//! reading the same after the product is repriced, renamed or deleted.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use partshop_core::{OrderId, OrderItemId, OrderStatus, ProductId, UserId, sum_money};

/// An order header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    /// Sum of the item snapshots at checkout time.
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A line of an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    /// `None` once the product has been removed from the catalog.
    pub product_id: Option<ProductId>,
    pub quantity: i32,
    pub price_at_order: Decimal,
    pub product_name: String,
    pub product_code: String,
}

/// An order together with its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderWithItems {
    #[serde(flatten)]
    pub order: Order,
    pub items: Vec<OrderItem>,
}

/// Input for one order line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrderItem {
    pub product_id: ProductId,
    pub quantity: i32,
    pub price_at_order: Decimal,
    pub product_name: String,
    pub product_code: String,
}

/// Input for creating an order with its lines in one step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: UserId,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub items: Vec<NewOrderItem>,
    /// Backdated creation time, used when importing historical orders.
    pub placed_at: Option<DateTime<Utc>>,
}

impl NewOrder {
    /// A pending order whose total is derived from the given lines.
    #[must_use]
    pub fn pending(user_id: UserId, items: Vec<NewOrderItem>) -> Self {
        Self {
            total_amount: sum_money(
                items
                    .iter()
                    .map(|item| (item.price_at_order, item.quantity)),
            ),
            user_id,
            status: OrderStatus::Pending,
            items,
            placed_at: None,
        }
    }
}
