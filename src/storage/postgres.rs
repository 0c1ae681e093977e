use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::collections::HashMap;
use uuid::Uuid;
use super::Store;
use crate::domain::access::OrderScope;
use crate::domain::aggregates::{
    Cart, CartLine, Order, OrderChange, OrderLine, OrderRecord, OrderStatus, Product, ProductSnapshot,
};
use crate::domain::value_objects::{
    ArtifactHandle, CartId, CartLineId, Money, OrderId, OrderLineId, ProductId, Quantity, ShippingInfo, UserId,
};
use crate::{EcommerceError, Result};

/// Postgres-backed store.
#[derive(Debug, Clone)]
pub struct PgStore {
    db: PgPool,
}

#[derive(Debug, sqlx::FromRow)]
struct ProductRow { id: Uuid, name: String, price: Decimal, created_at: DateTime<Utc> }

#[derive(Debug, sqlx::FromRow)]
struct CartRow { id: Uuid, user_id: Uuid, created_at: DateTime<Utc>, updated_at: DateTime<Utc> }

#[derive(Debug, sqlx::FromRow)]
struct CartLineRow { id: Uuid, cart_id: Uuid, product_id: Uuid, quantity: i32, subtotal: Decimal }

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid, customer_id: Uuid, address: String, postal_code: String, unit: String, phone: String,
    total_price: Decimal, status: String, is_paid: bool, bill_handle: Option<String>,
    created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderLineRow { order_id: Uuid, id: Uuid, product_id: Uuid, product_name: String, quantity: i32, unit_price: Decimal }

const PRODUCT_COLUMNS: &str = "id, name, price, created_at";
const CART_LINE_COLUMNS: &str = "id, cart_id, product_id, quantity, subtotal";
const ORDER_COLUMNS: &str =
    "id, customer_id, address, postal_code, unit, phone, total_price, status, is_paid, bill_handle, created_at, updated_at";
const ORDER_LINE_COLUMNS: &str = "order_id, id, product_id, product_name, quantity, unit_price";

impl From<ProductRow> for Product {
    fn from(r: ProductRow) -> Self {
        Product::restore(ProductId::from_uuid(r.id), r.name, Money::new(r.price), r.created_at)
    }
}

fn quantity_from_db(raw: i32) -> Result<Quantity> {
    u32::try_from(raw).map(Quantity::new).map_err(|_| EcommerceError::CorruptRecord(format!("negative quantity {raw}")))
}

fn quantity_to_db(quantity: Quantity) -> Result<i32> {
    i32::try_from(quantity.value()).map_err(|_| EcommerceError::Validation(format!("quantity {quantity} is too large")))
}

impl TryFrom<CartLineRow> for CartLine {
    type Error = EcommerceError;

    fn try_from(r: CartLineRow) -> Result<Self> {
        Ok(CartLine {
            id: CartLineId::from_uuid(r.id),
            cart_id: CartId::from_uuid(r.cart_id),
            product_id: ProductId::from_uuid(r.product_id),
            quantity: quantity_from_db(r.quantity)?,
            subtotal: Money::new(r.subtotal),
        })
    }
}

impl TryFrom<OrderLineRow> for OrderLine {
    type Error = EcommerceError;

    fn try_from(r: OrderLineRow) -> Result<Self> {
        Ok(OrderLine {
            id: OrderLineId::from_uuid(r.id),
            product_id: ProductId::from_uuid(r.product_id),
            product_name: r.product_name,
            quantity: quantity_from_db(r.quantity)?,
            unit_price: Money::new(r.unit_price),
        })
    }
}

fn order_from_rows(row: OrderRow, lines: Vec<OrderLineRow>) -> Result<Order> {
    let status: OrderStatus = row
        .status
        .parse()
        .map_err(|_| EcommerceError::CorruptRecord(format!("order {} has status `{}`", row.id, row.status)))?;
    let lines = lines.into_iter().map(OrderLine::try_from).collect::<Result<Vec<_>>>()?;
    Ok(OrderRecord {
        id: OrderId::from_uuid(row.id),
        customer_id: UserId::from_uuid(row.customer_id),
        shipping: ShippingInfo { address: row.address, postal_code: row.postal_code, unit: row.unit, phone: row.phone },
        total_price: Money::new(row.total_price),
        status,
        is_paid: row.is_paid,
        bill: row.bill_handle.map(ArtifactHandle::new),
        lines,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
    .into())
}

impl PgStore {
    pub fn new(db: PgPool) -> Self { Self { db } }

    pub async fn connect(url: &str, max_connections: u32) -> std::result::Result<Self, sqlx::Error> {
        let db = PgPoolOptions::new().max_connections(max_connections).connect(url).await?;
        Ok(Self::new(db))
    }

    pub async fn migrate(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.db).await
    }

    async fn cart_lines(&self, cart: Uuid) -> Result<Vec<CartLine>> {
        sqlx::query_as::<_, CartLineRow>(&format!("SELECT {CART_LINE_COLUMNS} FROM cart_lines WHERE cart_id = $1 ORDER BY created_at, id"))
            .bind(cart)
            .fetch_all(&self.db)
            .await?
            .into_iter()
            .map(CartLine::try_from)
            .collect()
    }

    async fn order_lines(&self, orders: &[Uuid]) -> Result<HashMap<Uuid, Vec<OrderLineRow>>> {
        let rows = sqlx::query_as::<_, OrderLineRow>(&format!(
            "SELECT {ORDER_LINE_COLUMNS} FROM order_lines WHERE order_id = ANY($1) ORDER BY order_id, position"
        ))
        .bind(orders)
        .fetch_all(&self.db)
        .await?;
        let mut grouped: HashMap<Uuid, Vec<OrderLineRow>> = HashMap::new();
        for row in rows {
            grouped.entry(row.order_id).or_default().push(row);
        }
        Ok(grouped)
    }
}

#[async_trait]
impl Store for PgStore {
    async fn save_product(&self, product: &Product) -> Result<()> {
        sqlx::query(
            "INSERT INTO products (id, name, price, created_at) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (id) DO UPDATE SET name = EXCLUDED.name, price = EXCLUDED.price, created_at = EXCLUDED.created_at",
        )
        .bind(product.id().into_uuid())
        .bind(product.name())
        .bind(product.price().amount())
        .bind(product.created_at())
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id.into_uuid())
            .fetch_optional(&self.db)
            .await?;
        Ok(row.map(Product::from))
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at, id"))
            .fetch_all(&self.db)
            .await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    async fn get_or_create_cart(&self, user: UserId) -> Result<Cart> {
        let row = sqlx::query_as::<_, CartRow>(
            "INSERT INTO carts (id, user_id, created_at, updated_at) VALUES ($1, $2, NOW(), NOW()) \
             ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id \
             RETURNING id, user_id, created_at, updated_at",
        )
        .bind(CartId::generate().into_uuid())
        .bind(user.into_uuid())
        .fetch_one(&self.db)
        .await?;
        let lines = self.cart_lines(row.id).await?;
        Ok(Cart::restore(CartId::from_uuid(row.id), UserId::from_uuid(row.user_id), lines, row.created_at, row.updated_at))
    }

    async fn add_cart_line(&self, cart: CartId, product: &ProductSnapshot, quantity: Quantity) -> Result<CartLine> {
        let mut tx = self.db.begin().await?;
        // Lock the cart row before any line row, the same order `place_order` takes.
        let touched = sqlx::query("UPDATE carts SET updated_at = NOW() WHERE id = $1")
            .bind(cart.into_uuid())
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if touched == 0 {
            return Err(EcommerceError::NotFound("cart"));
        }

        let current: Option<(i32,)> = sqlx::query_as("SELECT quantity FROM cart_lines WHERE cart_id = $1 AND product_id = $2")
            .bind(cart.into_uuid())
            .bind(product.id.into_uuid())
            .fetch_optional(&mut *tx)
            .await?;
        if let Some((current,)) = current {
            quantity_from_db(current)?.checked_add(quantity)?;
        }

        let row = sqlx::query_as::<_, CartLineRow>(&format!(
            "INSERT INTO cart_lines (id, cart_id, product_id, quantity, subtotal, created_at) \
             VALUES ($1, $2, $3, $4::INTEGER, $4::INTEGER * $5::NUMERIC, NOW()) \
             ON CONFLICT (cart_id, product_id) DO UPDATE \
             SET quantity = cart_lines.quantity + EXCLUDED.quantity, \
                 subtotal = (cart_lines.quantity + EXCLUDED.quantity) * $5::NUMERIC \
             RETURNING {CART_LINE_COLUMNS}"
        ))
        .bind(CartLineId::generate().into_uuid())
        .bind(cart.into_uuid())
        .bind(product.id.into_uuid())
        .bind(quantity_to_db(quantity)?)
        .bind(product.price.amount())
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        CartLine::try_from(row)
    }

    async fn get_cart_line(&self, cart: CartId, line: CartLineId) -> Result<Option<CartLine>> {
        sqlx::query_as::<_, CartLineRow>(&format!("SELECT {CART_LINE_COLUMNS} FROM cart_lines WHERE cart_id = $1 AND id = $2"))
            .bind(cart.into_uuid())
            .bind(line.into_uuid())
            .fetch_optional(&self.db)
            .await?
            .map(CartLine::try_from)
            .transpose()
    }

    async fn save_cart_line(&self, line: &CartLine) -> Result<()> {
        let updated = sqlx::query("UPDATE cart_lines SET quantity = $3, subtotal = $4 WHERE id = $1 AND cart_id = $2")
            .bind(line.id.into_uuid())
            .bind(line.cart_id.into_uuid())
            .bind(quantity_to_db(line.quantity)?)
            .bind(line.subtotal.amount())
            .execute(&self.db)
            .await?
            .rows_affected();
        if updated == 0 {
            return Err(EcommerceError::NotFound("cart line"));
        }
        Ok(())
    }

    async fn delete_cart_line(&self, cart: CartId, line: CartLineId) -> Result<bool> {
        let deleted = sqlx::query("DELETE FROM cart_lines WHERE id = $1 AND cart_id = $2")
            .bind(line.into_uuid())
            .bind(cart.into_uuid())
            .execute(&self.db)
            .await?
            .rows_affected();
        Ok(deleted > 0)
    }

    async fn place_order(&self, customer: UserId, shipping: &ShippingInfo, now: DateTime<Utc>) -> Result<Order> {
        // Dropping `tx` on any early return rolls everything back.
        let mut tx = self.db.begin().await?;

        let cart: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM carts WHERE user_id = $1 FOR UPDATE")
            .bind(customer.into_uuid())
            .fetch_optional(&mut *tx)
            .await?;
        let Some((cart_id,)) = cart else { return Err(EcommerceError::EmptyCart) };

        let lines = sqlx::query_as::<_, CartLineRow>(&format!(
            "SELECT {CART_LINE_COLUMNS} FROM cart_lines WHERE cart_id = $1 ORDER BY created_at, id"
        ))
        .bind(cart_id)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(CartLine::try_from)
        .collect::<Result<Vec<_>>>()?;

        let product_ids: Vec<Uuid> = lines.iter().map(|l| l.product_id.into_uuid()).collect();
        let catalog: HashMap<ProductId, ProductSnapshot> = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ANY($1)"
        ))
        .bind(&product_ids)
        .fetch_all(&mut *tx)
        .await?
        .into_iter()
        .map(|row| {
            let product = Product::from(row);
            (product.id(), product.snapshot_at(now))
        })
        .collect();

        let order = Order::place(customer, shipping.clone(), &lines, &catalog, now)?;

        sqlx::query(&format!(
            "INSERT INTO orders ({ORDER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)"
        ))
        .bind(order.id().into_uuid())
        .bind(order.customer_id().into_uuid())
        .bind(&order.shipping().address)
        .bind(&order.shipping().postal_code)
        .bind(&order.shipping().unit)
        .bind(&order.shipping().phone)
        .bind(order.total_price().amount())
        .bind(order.status().as_str())
        .bind(order.is_paid())
        .bind(order.bill().map(ArtifactHandle::as_str))
        .bind(order.created_at())
        .bind(order.updated_at())
        .execute(&mut *tx)
        .await?;

        for (position, line) in order.lines().iter().enumerate() {
            let position = i32::try_from(position).map_err(|_| EcommerceError::Validation("too many order lines".into()))?;
            sqlx::query(
                "INSERT INTO order_lines (id, order_id, position, product_id, product_name, quantity, unit_price) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7)",
            )
            .bind(line.id.into_uuid())
            .bind(order.id().into_uuid())
            .bind(position)
            .bind(line.product_id.into_uuid())
            .bind(&line.product_name)
            .bind(quantity_to_db(line.quantity)?)
            .bind(line.unit_price.amount())
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("DELETE FROM cart_lines WHERE cart_id = $1").bind(cart_id).execute(&mut *tx).await?;
        sqlx::query("UPDATE carts SET updated_at = NOW() WHERE id = $1").bind(cart_id).execute(&mut *tx).await?;

        tx.commit().await?;
        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let Some(row) = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id.into_uuid())
            .fetch_optional(&self.db)
            .await?
        else {
            return Ok(None);
        };
        let lines = self.order_lines(&[row.id]).await?.remove(&row.id).unwrap_or_default();
        order_from_rows(row, lines).map(Some)
    }

    async fn list_orders(&self, scope: OrderScope) -> Result<Vec<Order>> {
        let customer = match scope {
            OrderScope::Own(user) => Some(user.into_uuid()),
            OrderScope::All => None,
        };
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE ($1::UUID IS NULL OR customer_id = $1) ORDER BY created_at, id"
        ))
        .bind(customer)
        .fetch_all(&self.db)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let mut lines = self.order_lines(&ids).await?;
        rows.into_iter()
            .map(|row| {
                let order_lines = lines.remove(&row.id).unwrap_or_default();
                order_from_rows(row, order_lines)
            })
            .collect()
    }

    async fn apply_order_change(&self, id: OrderId, change: &OrderChange) -> Result<Order> {
        let key = id.into_uuid();
        let query = match change {
            OrderChange::ConfirmPayment => sqlx::query("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1")
                .bind(key)
                .bind(OrderStatus::Paid.as_str()),
            OrderChange::FlagPaid => sqlx::query("UPDATE orders SET is_paid = TRUE, updated_at = NOW() WHERE id = $1").bind(key),
            OrderChange::SetStatus(status) => sqlx::query("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1")
                .bind(key)
                .bind(status.as_str()),
            OrderChange::AttachBill(handle) => sqlx::query("UPDATE orders SET bill_handle = $2, updated_at = NOW() WHERE id = $1")
                .bind(key)
                .bind(handle.as_str().to_owned()),
        };
        if query.execute(&self.db).await?.rows_affected() == 0 {
            return Err(EcommerceError::NotFound("order"));
        }
        self.get_order(id).await?.ok_or(EcommerceError::NotFound("order"))
    }
}
