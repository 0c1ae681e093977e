use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;
use super::Store;
use crate::domain::access::OrderScope;
use crate::domain::aggregates::{Cart, CartError, CartLine, Order, OrderChange, Product, ProductSnapshot};
use crate::domain::value_objects::{CartId, CartLineId, OrderId, ProductId, Quantity, ShippingInfo, UserId};
use crate::{EcommerceError, Result};

/// In-process store. A single lock makes every operation, including order
/// placement, run as one writer at a time.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

#[derive(Debug, Default)]
struct State {
    products: Vec<Product>,
    carts: HashMap<UserId, Cart>,
    cart_owners: HashMap<CartId, UserId>,
    orders: Vec<Order>,
}

impl State {
    fn cart_mut(&mut self, cart: CartId) -> Option<&mut Cart> {
        let owner = self.cart_owners.get(&cart)?;
        self.carts.get_mut(owner)
    }
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }
}

#[async_trait]
impl Store for MemoryStore {
    async fn save_product(&self, product: &Product) -> Result<()> {
        let mut state = self.state.write().await;
        match state.products.iter_mut().find(|p| p.id() == product.id()) {
            Some(existing) => *existing = product.clone(),
            None => state.products.push(product.clone()),
        }
        Ok(())
    }

    async fn get_product(&self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.state.read().await.products.iter().find(|p| p.id() == id).cloned())
    }

    async fn list_products(&self) -> Result<Vec<Product>> {
        Ok(self.state.read().await.products.clone())
    }

    async fn get_or_create_cart(&self, user: UserId) -> Result<Cart> {
        let mut state = self.state.write().await;
        if let Some(cart) = state.carts.get(&user) {
            return Ok(cart.clone());
        }
        let cart = Cart::for_user(user);
        state.cart_owners.insert(cart.id(), user);
        state.carts.insert(user, cart.clone());
        Ok(cart)
    }

    async fn add_cart_line(&self, cart: CartId, product: &ProductSnapshot, quantity: Quantity) -> Result<CartLine> {
        let mut state = self.state.write().await;
        let cart = state.cart_mut(cart).ok_or(EcommerceError::NotFound("cart"))?;
        Ok(cart.add_line(product, quantity)?.clone())
    }

    async fn get_cart_line(&self, cart: CartId, line: CartLineId) -> Result<Option<CartLine>> {
        let mut state = self.state.write().await;
        Ok(state.cart_mut(cart).and_then(|c| c.line(line)).cloned())
    }

    async fn save_cart_line(&self, line: &CartLine) -> Result<()> {
        let mut state = self.state.write().await;
        let cart = state.cart_mut(line.cart_id).ok_or(EcommerceError::NotFound("cart"))?;
        cart.replace_line(line.clone())?;
        Ok(())
    }

    async fn delete_cart_line(&self, cart: CartId, line: CartLineId) -> Result<bool> {
        let mut state = self.state.write().await;
        let Some(cart) = state.cart_mut(cart) else { return Ok(false) };
        match cart.remove_line(line) {
            Ok(_) => Ok(true),
            Err(CartError::LineNotFound) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn place_order(&self, customer: UserId, shipping: &ShippingInfo, now: DateTime<Utc>) -> Result<Order> {
        let mut state = self.state.write().await;
        let order = {
            let Some(cart) = state.carts.get(&customer) else { return Err(EcommerceError::EmptyCart) };
            let catalog: HashMap<ProductId, ProductSnapshot> = state
                .products
                .iter()
                .filter(|p| cart.lines().iter().any(|l| l.product_id == p.id()))
                .map(|p| (p.id(), p.snapshot_at(now)))
                .collect();
            Order::place(customer, shipping.clone(), cart.lines(), &catalog, now)?
        };

        // Nothing below can fail, so the order and the cleared cart land together.
        let mut stored = order.clone();
        stored.take_events();
        state.orders.push(stored);
        if let Some(cart) = state.carts.get_mut(&customer) {
            cart.clear();
        }
        Ok(order)
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.iter().find(|o| o.id() == id).cloned())
    }

    async fn list_orders(&self, scope: OrderScope) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        Ok(state.orders.iter().filter(|o| scope.includes(o.customer_id())).cloned().collect())
    }

    async fn apply_order_change(&self, id: OrderId, change: &OrderChange) -> Result<Order> {
        let mut state = self.state.write().await;
        let order = state.orders.iter_mut().find(|o| o.id() == id).ok_or(EcommerceError::NotFound("order"))?;
        order.apply(change);
        Ok(order.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use crate::domain::aggregates::OrderStatus;
    use crate::domain::value_objects::{ArtifactHandle, Money};

    fn shipping() -> ShippingInfo {
        ShippingInfo { address: "1 Elm Rd".into(), postal_code: "12345".into(), unit: "7".into(), phone: "5551234567".into() }
    }

    #[tokio::test]
    async fn test_cart_is_created_once_per_user() {
        let store = MemoryStore::new();
        let user = UserId::generate();
        let a = store.get_or_create_cart(user).await.unwrap();
        let b = store.get_or_create_cart(user).await.unwrap();
        assert_eq!(a.id(), b.id());
        assert_ne!(store.get_or_create_cart(UserId::generate()).await.unwrap().id(), a.id());
    }

    #[tokio::test]
    async fn test_place_order_clears_cart_and_keeps_it() {
        let store = MemoryStore::new();
        let product = Product::create("Mug", Money::new(Decimal::new(800, 2)));
        store.save_product(&product).await.unwrap();
        let user = UserId::generate();
        let cart = store.get_or_create_cart(user).await.unwrap();
        store.add_cart_line(cart.id(), &product.snapshot_at(Utc::now()), Quantity::new(2)).await.unwrap();

        let order = store.place_order(user, &shipping(), Utc::now()).await.unwrap();
        assert_eq!(order.total_price().amount(), Decimal::new(1600, 2));

        let after = store.get_or_create_cart(user).await.unwrap();
        assert_eq!(after.id(), cart.id());
        assert!(after.is_empty());
        assert_eq!(store.list_orders(OrderScope::All).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_place_order_on_missing_cart_writes_nothing() {
        let store = MemoryStore::new();
        let err = store.place_order(UserId::generate(), &shipping(), Utc::now()).await.unwrap_err();
        assert!(matches!(err, EcommerceError::EmptyCart));
        assert!(store.list_orders(OrderScope::All).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_stored_orders_carry_no_pending_events() {
        let store = MemoryStore::new();
        let product = Product::create("Mug", Money::new(Decimal::new(1, 0)));
        store.save_product(&product).await.unwrap();
        let user = UserId::generate();
        let cart = store.get_or_create_cart(user).await.unwrap();
        store.add_cart_line(cart.id(), &product.snapshot_at(Utc::now()), Quantity::new(1)).await.unwrap();
        let mut placed = store.place_order(user, &shipping(), Utc::now()).await.unwrap();
        assert_eq!(placed.take_events().len(), 1);

        let mut loaded = store.get_order(placed.id()).await.unwrap().unwrap();
        assert!(loaded.take_events().is_empty());
        assert_eq!(loaded.status(), OrderStatus::Undecided);
    }

    #[tokio::test]
    async fn test_delete_unknown_line_reports_false() {
        let store = MemoryStore::new();
        let cart = store.get_or_create_cart(UserId::generate()).await.unwrap();
        assert!(!store.delete_cart_line(cart.id(), CartLineId::generate()).await.unwrap());
    }

    #[tokio::test]
    async fn test_order_changes_from_stale_copies_all_persist() {
        let store = MemoryStore::new();
        let product = Product::create("Mug", Money::new(Decimal::new(1, 0)));
        store.save_product(&product).await.unwrap();
        let user = UserId::generate();
        let cart = store.get_or_create_cart(user).await.unwrap();
        store.add_cart_line(cart.id(), &product.snapshot_at(Utc::now()), Quantity::new(1)).await.unwrap();
        let placed = store.place_order(user, &shipping(), Utc::now()).await.unwrap();

        // Two writers load the same order before either one writes.
        let mut by_customer = store.get_order(placed.id()).await.unwrap().unwrap();
        let mut by_cashier = by_customer.clone();
        by_customer.apply(&OrderChange::FlagPaid);
        by_cashier.apply(&OrderChange::SetStatus(OrderStatus::Completed));

        store.apply_order_change(by_customer.id(), &OrderChange::FlagPaid).await.unwrap();
        store.apply_order_change(by_cashier.id(), &OrderChange::SetStatus(OrderStatus::Completed)).await.unwrap();
        let last = store
            .apply_order_change(placed.id(), &OrderChange::AttachBill(ArtifactHandle::new("orders/x/payment.html")))
            .await
            .unwrap();

        assert!(last.is_paid());
        assert_eq!(last.status(), OrderStatus::Completed);
        let stored = store.get_order(placed.id()).await.unwrap().unwrap();
        assert!(stored.is_paid());
        assert_eq!(stored.status(), OrderStatus::Completed);
        assert!(stored.bill().is_some());
    }

    #[tokio::test]
    async fn test_change_to_unknown_order_is_not_found() {
        let store = MemoryStore::new();
        let err = store.apply_order_change(OrderId::generate(), &OrderChange::FlagPaid).await.unwrap_err();
        assert!(matches!(err, EcommerceError::NotFound("order")));
    }
}
