//! `PostgreSQL` implementation of [`ShopStore`].
//!
//! Queries are checked at runtime and mapped through internal row types.
//! [`PgShopStore::commit`] runs a unit of work inside one transaction; the
//! transaction is rolled back when it is dropped without being committed,
//! which covers early returns and cancelled requests alike.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, instrument, warn};

use partshop_core::{
    CartId, CartItemId, CategoryId, Email, OrderId, OrderItemId, OrderStatus, ProductId, UserId,
};

use super::store::ShopStore;
use super::unit_of_work::{
    CartRef, CommitReceipt, ExpectedLine, IntentOutcome, UnitOfWork, WriteIntent, lines_match,
};
use super::{RepositoryError, Result};
use crate::models::{
    Cart, CartItem, CartLine, CartSummary, Category, CategoryWithCount, NewOrder, NewUser, Order,
    OrderItem, OrderWithItems, Product, ProductWithCategory, User, UserCartSummary,
};

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: UserId,
    email: Email,
    name: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            name: row.name,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserCartRow {
    id: UserId,
    email: Email,
    name: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    cart_id: Option<CartId>,
    item_count: Option<i64>,
}

impl From<UserCartRow> for UserCartSummary {
    fn from(row: UserCartRow) -> Self {
        Self {
            cart: row.cart_id.map(|id| CartSummary {
                id,
                item_count: row.item_count.unwrap_or(0),
            }),
            user: User {
                id: row.id,
                email: row.email,
                name: row.name,
                created_at: row.created_at,
                updated_at: row.updated_at,
            },
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    id: CartId,
    user_id: UserId,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CartRow> for Cart {
    fn from(row: CartRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CartItemRow {
    id: CartItemId,
    cart_id: CartId,
    product_id: ProductId,
    quantity: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<CartItemRow> for CartItem {
    fn from(row: CartItemRow) -> Self {
        Self {
            id: row.id,
            cart_id: row.cart_id,
            product_id: row.product_id,
            quantity: row.quantity,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: ProductId,
    code: String,
    name: String,
    product_type: String,
    description: String,
    price: Decimal,
    amount: i32,
    image: Option<String>,
    category_id: CategoryId,
    category_name: String,
}

impl From<ProductRow> for ProductWithCategory {
    fn from(row: ProductRow) -> Self {
        Self {
            category: Category {
                id: row.category_id,
                name: row.category_name,
            },
            product: Product {
                id: row.id,
                code: row.code,
                name: row.name,
                product_type: row.product_type,
                description: row.description,
                price: row.price,
                amount: row.amount,
                image: row.image,
                category_id: row.category_id,
            },
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    #[sqlx(flatten)]
    item: CartItemRow,
    code: String,
    name: String,
    product_type: String,
    description: String,
    price: Decimal,
    amount: i32,
    image: Option<String>,
    category_id: CategoryId,
    category_name: String,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        let product = ProductRow {
            id: row.item.product_id,
            code: row.code,
            name: row.name,
            product_type: row.product_type,
            description: row.description,
            price: row.price,
            amount: row.amount,
            image: row.image,
            category_id: row.category_id,
            category_name: row.category_name,
        };
        Self {
            item: row.item.into(),
            product: product.into(),
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CategoryCountRow {
    id: CategoryId,
    name: String,
    product_count: i64,
}

impl From<CategoryCountRow> for CategoryWithCount {
    fn from(row: CategoryCountRow) -> Self {
        Self {
            category: Category {
                id: row.id,
                name: row.name,
            },
            product_count: row.product_count,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    status: OrderStatus,
    total_amount: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            status: row.status,
            total_amount: row.total_amount,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: OrderItemId,
    order_id: OrderId,
    product_id: Option<ProductId>,
    quantity: i32,
    price_at_order: Decimal,
    product_name: String,
    product_code: String,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            quantity: row.quantity,
            price_at_order: row.price_at_order,
            product_name: row.product_name,
            product_code: row.product_code,
        }
    }
}

const USER_COLUMNS: &str = "id, email, name, created_at, updated_at";
const CART_COLUMNS: &str = "id, user_id, created_at, updated_at";
const CART_ITEM_COLUMNS: &str = "id, cart_id, product_id, quantity, created_at, updated_at";
const ORDER_COLUMNS: &str = "id, user_id, status, total_amount, created_at, updated_at";
const ORDER_ITEM_COLUMNS: &str =
    "id, order_id, product_id, quantity, price_at_order, product_name, product_code";

// =============================================================================
// Store
// =============================================================================

/// `PostgreSQL`-backed shop store.
#[derive(Debug, Clone)]
pub struct PgShopStore {
    pool: PgPool,
}

impl PgShopStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ShopStore for PgShopStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn find_user(&self, id: &UserId) -> Result<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM shop.users WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn list_users_with_carts(&self) -> Result<Vec<UserCartSummary>> {
        let rows = sqlx::query_as::<_, UserCartRow>(
            r"
            SELECT u.id, u.email, u.name, u.created_at, u.updated_at,
                   c.id AS cart_id,
                   (SELECT COUNT(*) FROM shop.cart_items ci WHERE ci.cart_id = c.id) AS item_count
            FROM shop.users u
            LEFT JOIN shop.carts c ON c.user_id = u.id
            ORDER BY u.id
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_cart(&self, id: CartId) -> Result<Option<Cart>> {
        let row = sqlx::query_as::<_, CartRow>(&format!(
            "SELECT {CART_COLUMNS} FROM shop.carts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn find_cart_by_user(&self, user_id: &UserId) -> Result<Option<Cart>> {
        let row = sqlx::query_as::<_, CartRow>(&format!(
            "SELECT {CART_COLUMNS} FROM shop.carts WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn cart_lines(&self, cart_id: CartId) -> Result<Vec<CartLine>> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            r"
            SELECT ci.id, ci.cart_id, ci.product_id, ci.quantity, ci.created_at, ci.updated_at,
                   p.code, p.name, p.product_type, p.description, p.price, p.amount, p.image,
                   p.category_id, c.name AS category_name
            FROM shop.cart_items ci
            JOIN shop.products p ON p.id = ci.product_id
            JOIN shop.categories c ON c.id = p.category_id
            WHERE ci.cart_id = $1
            ORDER BY ci.created_at DESC, ci.id DESC
            ",
        )
        .bind(cart_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn find_product(&self, id: ProductId) -> Result<Option<ProductWithCategory>> {
        let row = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT p.id, p.code, p.name, p.product_type, p.description, p.price, p.amount,
                   p.image, p.category_id, c.name AS category_name
            FROM shop.products p
            JOIN shop.categories c ON c.id = p.category_id
            WHERE p.id = $1
            ",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    async fn list_products(&self, category: Option<CategoryId>) -> Result<Vec<ProductWithCategory>> {
        let rows = sqlx::query_as::<_, ProductRow>(
            r"
            SELECT p.id, p.code, p.name, p.product_type, p.description, p.price, p.amount,
                   p.image, p.category_id, c.name AS category_name
            FROM shop.products p
            JOIN shop.categories c ON c.id = p.category_id
            WHERE ($1::int IS NULL OR p.category_id = $1)
            ORDER BY p.id
            ",
        )
        .bind(category)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_categories(&self) -> Result<Vec<CategoryWithCount>> {
        let rows = sqlx::query_as::<_, CategoryCountRow>(
            r"
            SELECT c.id, c.name, COUNT(p.id) AS product_count
            FROM shop.categories c
            LEFT JOIN shop.products p ON p.category_id = c.id
            GROUP BY c.id, c.name
            ORDER BY c.id
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn list_orders(&self, user_id: &UserId) -> Result<Vec<OrderWithItems>> {
        let orders = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shop.orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let order_ids: Vec<i32> = orders.iter().map(|o| o.id.as_i32()).collect();
        let items = sqlx::query_as::<_, OrderItemRow>(&format!(
            "SELECT {ORDER_ITEM_COLUMNS} FROM shop.order_items WHERE order_id = ANY($1) ORDER BY id"
        ))
        .bind(&order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut items_by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for item in items {
            items_by_order
                .entry(item.order_id)
                .or_default()
                .push(item.into());
        }

        Ok(orders
            .into_iter()
            .map(|order| OrderWithItems {
                items: items_by_order.remove(&order.id).unwrap_or_default(),
                order: order.into(),
            })
            .collect())
    }

    #[instrument(skip(self, work), fields(intents = work.len()))]
    async fn commit(&self, work: UnitOfWork) -> Result<CommitReceipt> {
        if work.is_empty() {
            return Ok(CommitReceipt::default());
        }

        let mut tx = self.pool.begin().await.map_err(RepositoryError::from_sqlx)?;
        let mut outcomes = Vec::with_capacity(work.len());

        for (index, intent) in work.into_intents().into_iter().enumerate() {
            let kind = intent.kind();
            match apply_intent(&mut tx, intent).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    // Dropping `tx` rolls the whole unit back.
                    warn!(index, intent = kind, error = %e, "Unit of work rolled back");
                    return Err(e);
                }
            }
        }

        tx.commit().await.map_err(RepositoryError::from_sqlx)?;
        debug!(outcomes = outcomes.len(), "Unit of work committed");
        Ok(CommitReceipt::new(outcomes))
    }
}

// =============================================================================
// Intent Application
// =============================================================================

/// Apply one intent on an open transaction.
pub(super) async fn apply_intent(conn: &mut PgConnection, intent: WriteIntent) -> Result<IntentOutcome> {
    match intent {
        WriteIntent::EnsureUser(user) => ensure_user(conn, &user)
            .await
            .map(IntentOutcome::UserEnsured),
        WriteIntent::EnsureCart { user_id } => ensure_cart(conn, &user_id)
            .await
            .map(IntentOutcome::CartEnsured),
        WriteIntent::ExpectCartItems { cart_id, lines } => {
            expect_cart_items(conn, cart_id, &lines).await?;
            Ok(IntentOutcome::CartVerified(cart_id))
        }
        WriteIntent::UpsertCartItem {
            cart,
            product_id,
            quantity,
        } => upsert_cart_item(conn, &cart, product_id, quantity)
            .await
            .map(IntentOutcome::CartItemUpserted),
        WriteIntent::DeleteCartItem {
            cart_id,
            product_id,
        } => delete_cart_item(conn, cart_id, product_id)
            .await
            .map(IntentOutcome::CartItemDeleted),
        WriteIntent::ClearCart { cart_id } => {
            let removed = clear_cart(conn, cart_id).await?;
            Ok(IntentOutcome::CartCleared { cart_id, removed })
        }
        WriteIntent::CreateOrder(order) => create_order(conn, &order)
            .await
            .map(IntentOutcome::OrderCreated),
    }
}

async fn ensure_user(conn: &mut PgConnection, user: &NewUser) -> Result<User> {
    sqlx::query(
        r"
        INSERT INTO shop.users (id, email, name)
        VALUES ($1, $2, $3)
        ON CONFLICT (id) DO NOTHING
        ",
    )
    .bind(&user.id)
    .bind(&user.email)
    .bind(&user.name)
    .execute(&mut *conn)
    .await
    .map_err(RepositoryError::from_sqlx)?;

    let row = sqlx::query_as::<_, UserRow>(&format!(
        "SELECT {USER_COLUMNS} FROM shop.users WHERE id = $1"
    ))
    .bind(&user.id)
    .fetch_one(&mut *conn)
    .await
    .map_err(RepositoryError::from_sqlx)?;

    Ok(row.into())
}

async fn ensure_cart(conn: &mut PgConnection, user_id: &UserId) -> Result<Cart> {
    sqlx::query("INSERT INTO shop.carts (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(&mut *conn)
        .await
        .map_err(RepositoryError::from_sqlx)?;

    let row = sqlx::query_as::<_, CartRow>(&format!(
        "SELECT {CART_COLUMNS} FROM shop.carts WHERE user_id = $1 FOR UPDATE"
    ))
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await
    .map_err(RepositoryError::from_sqlx)?;

    Ok(row.into())
}

/// Take the cart's row lock and bump `updated_at`.
async fn lock_cart(conn: &mut PgConnection, cart: &CartRef) -> Result<CartId> {
    let query = match cart {
        CartRef::Id(id) => sqlx::query_as::<_, (CartId,)>(
            "UPDATE shop.carts SET updated_at = NOW() WHERE id = $1 RETURNING id",
        )
        .bind(*id),
        CartRef::OwnedBy(user_id) => sqlx::query_as::<_, (CartId,)>(
            "UPDATE shop.carts SET updated_at = NOW() WHERE user_id = $1 RETURNING id",
        )
        .bind(user_id.clone()),
    };

    query
        .fetch_optional(&mut *conn)
        .await
        .map_err(RepositoryError::from_sqlx)?
        .map(|(id,)| id)
        .ok_or_else(|| RepositoryError::NotFound(format!("cart {cart:?}")))
}

async fn expect_cart_items(
    conn: &mut PgConnection,
    cart_id: CartId,
    expected: &[ExpectedLine],
) -> Result<()> {
    let locked = sqlx::query_as::<_, (CartId,)>("SELECT id FROM shop.carts WHERE id = $1 FOR UPDATE")
        .bind(cart_id)
        .fetch_optional(&mut *conn)
        .await
        .map_err(RepositoryError::from_sqlx)?;
    if locked.is_none() {
        return Err(RepositoryError::NotFound(format!("cart {cart_id}")));
    }

    let actual = sqlx::query_as::<_, (ProductId, i32)>(
        "SELECT product_id, quantity FROM shop.cart_items WHERE cart_id = $1",
    )
    .bind(cart_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(RepositoryError::from_sqlx)?;

    if lines_match(&actual, expected) {
        Ok(())
    } else {
        Err(RepositoryError::Conflict(format!(
            "cart {cart_id} changed since it was read"
        )))
    }
}

async fn upsert_cart_item(
    conn: &mut PgConnection,
    cart: &CartRef,
    product_id: ProductId,
    quantity: i32,
) -> Result<CartItem> {
    let cart_id = lock_cart(conn, cart).await?;

    let row = sqlx::query_as::<_, CartItemRow>(&format!(
        r"
        INSERT INTO shop.cart_items (cart_id, product_id, quantity)
        VALUES ($1, $2, $3)
        ON CONFLICT (cart_id, product_id) DO UPDATE
            SET quantity = shop.cart_items.quantity + EXCLUDED.quantity,
                updated_at = NOW()
        RETURNING {CART_ITEM_COLUMNS}
        "
    ))
    .bind(cart_id)
    .bind(product_id)
    .bind(quantity)
    .fetch_one(&mut *conn)
    .await
    .map_err(RepositoryError::from_sqlx)?;

    Ok(row.into())
}

async fn delete_cart_item(
    conn: &mut PgConnection,
    cart_id: CartId,
    product_id: ProductId,
) -> Result<CartItem> {
    lock_cart(conn, &CartRef::Id(cart_id)).await?;

    sqlx::query_as::<_, CartItemRow>(&format!(
        "DELETE FROM shop.cart_items WHERE cart_id = $1 AND product_id = $2 RETURNING {CART_ITEM_COLUMNS}"
    ))
    .bind(cart_id)
    .bind(product_id)
    .fetch_optional(&mut *conn)
    .await
    .map_err(RepositoryError::from_sqlx)?
    .map(Into::into)
    .ok_or_else(|| RepositoryError::NotFound(format!("product {product_id} in cart {cart_id}")))
}

async fn clear_cart(conn: &mut PgConnection, cart_id: CartId) -> Result<u64> {
    lock_cart(conn, &CartRef::Id(cart_id)).await?;

    let result = sqlx::query("DELETE FROM shop.cart_items WHERE cart_id = $1")
        .bind(cart_id)
        .execute(&mut *conn)
        .await
        .map_err(RepositoryError::from_sqlx)?;

    Ok(result.rows_affected())
}

async fn create_order(conn: &mut PgConnection, order: &NewOrder) -> Result<OrderWithItems> {
    let header = sqlx::query_as::<_, OrderRow>(&format!(
        r"
        INSERT INTO shop.orders (user_id, status, total_amount, created_at, updated_at)
        VALUES ($1, $2, $3, COALESCE($4, NOW()), COALESCE($4, NOW()))
        RETURNING {ORDER_COLUMNS}
        "
    ))
    .bind(&order.user_id)
    .bind(order.status)
    .bind(order.total_amount)
    .bind(order.placed_at)
    .fetch_one(&mut *conn)
    .await
    .map_err(RepositoryError::from_sqlx)?;

    let mut items = Vec::with_capacity(order.items.len());
    for item in &order.items {
        let row = sqlx::query_as::<_, OrderItemRow>(&format!(
            r"
            INSERT INTO shop.order_items
                (order_id, product_id, quantity, price_at_order, product_name, product_code)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ORDER_ITEM_COLUMNS}
            "
        ))
        .bind(header.id)
        .bind(item.product_id)
        .bind(item.quantity)
        .bind(item.price_at_order)
        .bind(&item.product_name)
        .bind(&item.product_code)
        .fetch_one(&mut *conn)
        .await
        .map_err(RepositoryError::from_sqlx)?;
        items.push(row.into());
    }

    Ok(OrderWithItems {
        order: header.into(),
        items,
    })
}
