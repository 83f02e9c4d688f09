//! In-memory [`ShopStore`] for tests and local demos.
//!
//! All tables live behind one `RwLock`. A commit takes the write lock, applies
//! its intents to a copy of the tables and swaps the copy in only when every
//! intent succeeded, so a failing unit leaves no trace. Holding the write lock
//! for the whole commit gives the same one-at-a-time ordering the `PostgreSQL`
//! store gets from its cart row locks.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::RwLock;

use partshop_core::{CartId, CartItemId, CategoryId, OrderId, OrderItemId, ProductId, UserId};

use super::store::ShopStore;
use super::unit_of_work::{
    CartRef, CommitReceipt, ExpectedLine, IntentOutcome, UnitOfWork, WriteIntent, lines_match,
};
use super::{RepositoryError, Result};
use crate::models::{
    Cart, CartItem, CartLine, CartSummary, Category, CategoryWithCount, MAX_LINE_QUANTITY,
    NewOrder, NewProduct, NewUser, Order, OrderItem, OrderWithItems, Product,
    ProductWithCategory, User, UserCartSummary,
};

#[derive(Debug, Clone, Default)]
struct Sequences {
    category: i32,
    product: i32,
    cart: i32,
    cart_item: i32,
    order: i32,
    order_item: i32,
}

fn next(counter: &mut i32) -> i32 {
    *counter += 1;
    *counter
}

#[derive(Debug, Clone, Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    categories: BTreeMap<CategoryId, Category>,
    products: BTreeMap<ProductId, Product>,
    carts: BTreeMap<CartId, Cart>,
    cart_items: BTreeMap<CartItemId, CartItem>,
    orders: BTreeMap<OrderId, Order>,
    order_items: BTreeMap<OrderItemId, OrderItem>,
    seq: Sequences,
}

impl Tables {
    fn cart_of(&self, user_id: &UserId) -> Option<&Cart> {
        self.carts.values().find(|cart| &cart.user_id == user_id)
    }

    fn item_in(&self, cart_id: CartId, product_id: ProductId) -> Option<CartItemId> {
        self.cart_items
            .values()
            .find(|item| item.cart_id == cart_id && item.product_id == product_id)
            .map(|item| item.id)
    }

    fn product_with_category(&self, product: &Product) -> Result<ProductWithCategory> {
        let category = self
            .categories
            .get(&product.category_id)
            .cloned()
            .ok_or_else(|| {
                RepositoryError::DataCorruption(format!(
                    "product {} references missing category {}",
                    product.id, product.category_id
                ))
            })?;
        Ok(ProductWithCategory {
            product: product.clone(),
            category,
        })
    }

    fn resolve_cart(&self, cart: &CartRef) -> Result<CartId> {
        let found = match cart {
            CartRef::Id(id) => self.carts.get(id),
            CartRef::OwnedBy(user_id) => self.cart_of(user_id),
        };
        found
            .map(|cart| cart.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("cart {cart:?}")))
    }

    fn touch_cart(&mut self, cart_id: CartId, now: DateTime<Utc>) -> Result<()> {
        let cart = self
            .carts
            .get_mut(&cart_id)
            .ok_or_else(|| RepositoryError::NotFound(format!("cart {cart_id}")))?;
        cart.updated_at = now;
        Ok(())
    }

    fn apply(&mut self, intent: WriteIntent, now: DateTime<Utc>) -> Result<IntentOutcome> {
        match intent {
            WriteIntent::EnsureUser(user) => {
                let stored = self.users.entry(user.id.clone()).or_insert_with(|| User {
                    id: user.id,
                    email: user.email,
                    name: user.name,
                    created_at: now,
                    updated_at: now,
                });
                Ok(IntentOutcome::UserEnsured(stored.clone()))
            }
            WriteIntent::EnsureCart { user_id } => {
                if let Some(cart) = self.cart_of(&user_id) {
                    return Ok(IntentOutcome::CartEnsured(cart.clone()));
                }
                if !self.users.contains_key(&user_id) {
                    return Err(RepositoryError::NotFound(format!("user {user_id}")));
                }
                let cart = Cart {
                    id: CartId::new(next(&mut self.seq.cart)),
                    user_id,
                    created_at: now,
                    updated_at: now,
                };
                self.carts.insert(cart.id, cart.clone());
                Ok(IntentOutcome::CartEnsured(cart))
            }
            WriteIntent::ExpectCartItems { cart_id, lines } => {
                self.verify_cart(cart_id, &lines)?;
                Ok(IntentOutcome::CartVerified(cart_id))
            }
            WriteIntent::UpsertCartItem {
                cart,
                product_id,
                quantity,
            } => {
                let cart_id = self.resolve_cart(&cart)?;
                if !self.products.contains_key(&product_id) {
                    return Err(RepositoryError::NotFound(format!("product {product_id}")));
                }
                self.touch_cart(cart_id, now)?;
                let item = self.upsert_item(cart_id, product_id, quantity, now)?;
                Ok(IntentOutcome::CartItemUpserted(item))
            }
            WriteIntent::DeleteCartItem {
                cart_id,
                product_id,
            } => {
                self.touch_cart(cart_id, now)?;
                let item = self
                    .item_in(cart_id, product_id)
                    .and_then(|id| self.cart_items.remove(&id))
                    .ok_or_else(|| {
                        RepositoryError::NotFound(format!(
                            "product {product_id} in cart {cart_id}"
                        ))
                    })?;
                Ok(IntentOutcome::CartItemDeleted(item))
            }
            WriteIntent::ClearCart { cart_id } => {
                self.touch_cart(cart_id, now)?;
                let before = self.cart_items.len();
                self.cart_items.retain(|_, item| item.cart_id != cart_id);
                let removed = (before - self.cart_items.len()) as u64;
                Ok(IntentOutcome::CartCleared { cart_id, removed })
            }
            WriteIntent::CreateOrder(order) => self
                .insert_order(order, now)
                .map(IntentOutcome::OrderCreated),
        }
    }

    fn verify_cart(&self, cart_id: CartId, expected: &[ExpectedLine]) -> Result<()> {
        if !self.carts.contains_key(&cart_id) {
            return Err(RepositoryError::NotFound(format!("cart {cart_id}")));
        }
        let actual: Vec<(ProductId, i32)> = self
            .cart_items
            .values()
            .filter(|item| item.cart_id == cart_id)
            .map(|item| (item.product_id, item.quantity))
            .collect();
        if lines_match(&actual, expected) {
            Ok(())
        } else {
            Err(RepositoryError::Conflict(format!(
                "cart {cart_id} changed since it was read"
            )))
        }
    }

    fn upsert_item(
        &mut self,
        cart_id: CartId,
        product_id: ProductId,
        quantity: i32,
        now: DateTime<Utc>,
    ) -> Result<CartItem> {
        if let Some(id) = self.item_in(cart_id, product_id) {
            let item = self
                .cart_items
                .get_mut(&id)
                .ok_or_else(|| RepositoryError::NotFound(format!("cart item {id}")))?;
            let merged = item
                .quantity
                .checked_add(quantity)
                .filter(|q| (1..=MAX_LINE_QUANTITY).contains(q))
                .ok_or_else(|| {
                    RepositoryError::InvalidValue(format!(
                        "quantity of cart item {id} must stay within 1..={MAX_LINE_QUANTITY}"
                    ))
                })?;
            item.quantity = merged;
            item.updated_at = now;
            return Ok(item.clone());
        }

        if !(1..=MAX_LINE_QUANTITY).contains(&quantity) {
            return Err(RepositoryError::InvalidValue(format!(
                "invalid quantity {quantity} for product {product_id}"
            )));
        }
        let item = CartItem {
            id: CartItemId::new(next(&mut self.seq.cart_item)),
            cart_id,
            product_id,
            quantity,
            created_at: now,
            updated_at: now,
        };
        self.cart_items.insert(item.id, item.clone());
        Ok(item)
    }

    fn insert_order(&mut self, order: NewOrder, now: DateTime<Utc>) -> Result<OrderWithItems> {
        if !self.users.contains_key(&order.user_id) {
            return Err(RepositoryError::NotFound(format!("user {}", order.user_id)));
        }
        if let Some(missing) = order
            .items
            .iter()
            .find(|item| !self.products.contains_key(&item.product_id))
        {
            return Err(RepositoryError::NotFound(format!(
                "product {}",
                missing.product_id
            )));
        }

        let placed_at = order.placed_at.unwrap_or(now);
        let header = Order {
            id: OrderId::new(next(&mut self.seq.order)),
            user_id: order.user_id,
            status: order.status,
            total_amount: order.total_amount,
            created_at: placed_at,
            updated_at: placed_at,
        };
        self.orders.insert(header.id, header.clone());

        let mut items = Vec::with_capacity(order.items.len());
        for item in order.items {
            let row = OrderItem {
                id: OrderItemId::new(next(&mut self.seq.order_item)),
                order_id: header.id,
                product_id: Some(item.product_id),
                quantity: item.quantity,
                price_at_order: item.price_at_order,
                product_name: item.product_name,
                product_code: item.product_code,
            };
            self.order_items.insert(row.id, row.clone());
            items.push(row);
        }

        Ok(OrderWithItems {
            order: header,
            items,
        })
    }
}

/// Shop store backed by in-process tables.
#[derive(Debug, Default)]
pub struct MemoryShopStore {
    tables: RwLock<Tables>,
    fail_on_intent: RwLock<Option<usize>>,
    commits: AtomicUsize,
}

impl MemoryShopStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every following commit fail when it reaches the intent at `index`.
    ///
    /// Intents before `index` are applied to the working copy first, so the
    /// failure exercises rollback of partial work. `None` disables injection.
    pub async fn fail_on_intent(&self, index: Option<usize>) {
        *self.fail_on_intent.write().await = index;
    }

    /// Number of units that committed at least one intent.
    #[must_use]
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    // ===== Seeding =====

    /// Insert a user directly, bypassing units of work.
    pub async fn insert_user(&self, user: NewUser) -> User {
        let now = Utc::now();
        let row = User {
            id: user.id,
            email: user.email,
            name: user.name,
            created_at: now,
            updated_at: now,
        };
        self.tables
            .write()
            .await
            .users
            .insert(row.id.clone(), row.clone());
        row
    }

    pub async fn insert_category(&self, name: &str) -> Category {
        let mut tables = self.tables.write().await;
        let category = Category {
            id: CategoryId::new(next(&mut tables.seq.category)),
            name: name.to_owned(),
        };
        tables.categories.insert(category.id, category.clone());
        category
    }

    /// Insert a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the category does not exist and
    /// `RepositoryError::Conflict` if the code is taken.
    pub async fn insert_product(&self, product: NewProduct) -> Result<Product> {
        let mut tables = self.tables.write().await;
        if !tables.categories.contains_key(&product.category_id) {
            return Err(RepositoryError::NotFound(format!(
                "category {}",
                product.category_id
            )));
        }
        if tables.products.values().any(|p| p.code == product.code) {
            return Err(RepositoryError::Conflict(format!(
                "product code {} already exists",
                product.code
            )));
        }
        let row = Product {
            id: ProductId::new(next(&mut tables.seq.product)),
            code: product.code,
            name: product.name,
            product_type: product.product_type,
            description: product.description,
            price: product.price,
            amount: product.amount,
            image: product.image,
            category_id: product.category_id,
        };
        tables.products.insert(row.id, row.clone());
        Ok(row)
    }

    /// Reprice a product.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn update_product_price(&self, id: ProductId, price: Decimal) -> Result<()> {
        let mut tables = self.tables.write().await;
        let product = tables
            .products
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(format!("product {id}")))?;
        product.price = price;
        Ok(())
    }

    /// Delete a product, dropping its cart lines and detaching order lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the product does not exist.
    pub async fn delete_product(&self, id: ProductId) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.products.remove(&id).is_none() {
            return Err(RepositoryError::NotFound(format!("product {id}")));
        }
        tables.cart_items.retain(|_, item| item.product_id != id);
        for item in tables.order_items.values_mut() {
            if item.product_id == Some(id) {
                item.product_id = None;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl ShopStore for MemoryShopStore {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn find_user(&self, id: &UserId) -> Result<Option<User>> {
        Ok(self.tables.read().await.users.get(id).cloned())
    }

    async fn list_users_with_carts(&self) -> Result<Vec<UserCartSummary>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .map(|user| UserCartSummary {
                user: user.clone(),
                cart: tables.cart_of(&user.id).map(|cart| CartSummary {
                    id: cart.id,
                    item_count: tables
                        .cart_items
                        .values()
                        .filter(|item| item.cart_id == cart.id)
                        .count()
                        .try_into()
                        .unwrap_or(i64::MAX),
                }),
            })
            .collect())
    }

    async fn find_cart(&self, id: CartId) -> Result<Option<Cart>> {
        Ok(self.tables.read().await.carts.get(&id).cloned())
    }

    async fn find_cart_by_user(&self, user_id: &UserId) -> Result<Option<Cart>> {
        Ok(self.tables.read().await.cart_of(user_id).cloned())
    }

    async fn cart_lines(&self, cart_id: CartId) -> Result<Vec<CartLine>> {
        let tables = self.tables.read().await;
        let mut lines = tables
            .cart_items
            .values()
            .filter(|item| item.cart_id == cart_id)
            .map(|item| {
                let product = tables.products.get(&item.product_id).ok_or_else(|| {
                    RepositoryError::DataCorruption(format!(
                        "cart item {} references missing product {}",
                        item.id, item.product_id
                    ))
                })?;
                Ok(CartLine {
                    item: item.clone(),
                    product: tables.product_with_category(product)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        lines.sort_by(|a, b| {
            b.item
                .created_at
                .cmp(&a.item.created_at)
                .then(b.item.id.cmp(&a.item.id))
        });
        Ok(lines)
    }

    async fn find_product(&self, id: ProductId) -> Result<Option<ProductWithCategory>> {
        let tables = self.tables.read().await;
        tables
            .products
            .get(&id)
            .map(|product| tables.product_with_category(product))
            .transpose()
    }

    async fn list_products(&self, category: Option<CategoryId>) -> Result<Vec<ProductWithCategory>> {
        let tables = self.tables.read().await;
        tables
            .products
            .values()
            .filter(|product| category.is_none_or(|id| product.category_id == id))
            .map(|product| tables.product_with_category(product))
            .collect()
    }

    async fn list_categories(&self) -> Result<Vec<CategoryWithCount>> {
        let tables = self.tables.read().await;
        Ok(tables
            .categories
            .values()
            .map(|category| CategoryWithCount {
                category: category.clone(),
                product_count: tables
                    .products
                    .values()
                    .filter(|product| product.category_id == category.id)
                    .count()
                    .try_into()
                    .unwrap_or(i64::MAX),
            })
            .collect())
    }

    async fn list_orders(&self, user_id: &UserId) -> Result<Vec<OrderWithItems>> {
        let tables = self.tables.read().await;
        let mut orders: Vec<OrderWithItems> = tables
            .orders
            .values()
            .filter(|order| &order.user_id == user_id)
            .map(|order| OrderWithItems {
                order: order.clone(),
                items: tables
                    .order_items
                    .values()
                    .filter(|item| item.order_id == order.id)
                    .cloned()
                    .collect(),
            })
            .collect();
        orders.sort_by(|a, b| {
            b.order
                .created_at
                .cmp(&a.order.created_at)
                .then(b.order.id.cmp(&a.order.id))
        });
        Ok(orders)
    }

    async fn commit(&self, work: UnitOfWork) -> Result<CommitReceipt> {
        if work.is_empty() {
            return Ok(CommitReceipt::default());
        }

        let fail_on = *self.fail_on_intent.read().await;
        let mut tables = self.tables.write().await;
        let mut working = tables.clone();
        let now = Utc::now();
        let mut outcomes = Vec::with_capacity(work.len());

        for (index, intent) in work.into_intents().into_iter().enumerate() {
            if fail_on == Some(index) {
                return Err(RepositoryError::Unavailable(format!(
                    "injected failure at {} (intent {index})",
                    intent.kind()
                )));
            }
            outcomes.push(working.apply(intent, now)?);
        }

        *tables = working;
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(CommitReceipt::new(outcomes))
    }
}
