//! Persistence for the catalog, carts and orders.
//!
//! Every method is atomic on its own. [`Store::place_order`] is the one
//! multi-record write: the order header, its lines and the emptied cart are
//! committed together or not at all.

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crate::domain::access::OrderScope;
use crate::domain::aggregates::{Cart, CartLine, Order, OrderChange, Product, ProductSnapshot};
use crate::domain::value_objects::{CartId, CartLineId, OrderId, ProductId, Quantity, ShippingInfo, UserId};
use crate::Result;

#[async_trait]
pub trait Store: Send + Sync {
    /// Insert or replace a catalog product.
    async fn save_product(&self, product: &Product) -> Result<()>;

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>>;

    async fn list_products(&self) -> Result<Vec<Product>>;

    /// The user's cart with its lines, created empty on first access.
    async fn get_or_create_cart(&self, user: UserId) -> Result<Cart>;

    /// Increment the (cart, product) line by `quantity`, creating it when
    /// absent. The subtotal is recomputed from `product.price`.
    async fn add_cart_line(&self, cart: CartId, product: &ProductSnapshot, quantity: Quantity) -> Result<CartLine>;

    async fn get_cart_line(&self, cart: CartId, line: CartLineId) -> Result<Option<CartLine>>;

    /// Persist quantity and subtotal of an existing line.
    async fn save_cart_line(&self, line: &CartLine) -> Result<()>;

    /// Returns `false` when the line did not exist in `cart`.
    async fn delete_cart_line(&self, cart: CartId, line: CartLineId) -> Result<bool>;

    /// Materialize an order from the user's cart and empty the cart.
    ///
    /// Fails with `EmptyCart` without writing anything when the cart has no lines.
    async fn place_order(&self, customer: UserId, shipping: &ShippingInfo, now: DateTime<Utc>) -> Result<Order>;

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>>;

    /// Orders in `scope`, oldest first.
    async fn list_orders(&self, scope: OrderScope) -> Result<Vec<Order>>;

    /// Apply `change` to the current stored order and return the result.
    ///
    /// Only the field named by the change (and the update time) is written,
    /// so concurrent changes to different fields never undo one another.
    async fn apply_order_change(&self, id: OrderId, change: &OrderChange) -> Result<Order>;
}
