use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use crate::domain::access::Actor;
use crate::domain::aggregates::{Cart, CartLine, ProductSnapshot};
use crate::domain::value_objects::{CartLineId, Money, ProductId, Quantity};
use crate::storage::Store;
use crate::{EcommerceError, Result};

/// A cart priced at the moment it was read.
#[derive(Clone, Debug, Serialize)]
pub struct CartView {
    pub cart: Cart,
    pub total: Money,
}

#[derive(Clone, Debug, Serialize)]
pub struct LineUpdate {
    pub line: CartLine,
    pub total: Money,
}

#[derive(Clone)]
pub struct CartService {
    store: Arc<dyn Store>,
}

impl CartService {
    pub fn new(store: Arc<dyn Store>) -> Self { Self { store } }

    pub async fn get_or_create_cart(&self, actor: &Actor) -> Result<Cart> {
        self.store.get_or_create_cart(actor.id).await
    }

    /// The actor's cart with every line repriced from current product prices.
    #[tracing::instrument(skip(self), fields(user_id = %actor.id))]
    pub async fn view_cart(&self, actor: &Actor) -> Result<CartView> {
        let mut cart = self.store.get_or_create_cart(actor.id).await?;
        let catalog = self.live_catalog(cart.lines(), Utc::now()).await?;
        cart.reprice(&catalog);
        let total = cart.total();
        Ok(CartView { cart, total })
    }

    /// Sum of quantity × current price over the actor's cart.
    pub async fn compute_total(&self, actor: &Actor) -> Result<Money> {
        Ok(self.view_cart(actor).await?.total)
    }

    /// Add `quantity` of a product, merging with an existing line for it.
    #[tracing::instrument(skip(self), fields(user_id = %actor.id))]
    pub async fn add_line(&self, actor: &Actor, product_id: ProductId, quantity: i64) -> Result<CartLine> {
        let quantity = Quantity::positive(quantity)?;
        let product = self.store.get_product(product_id).await?.ok_or(EcommerceError::NotFound("product"))?;
        let cart = self.store.get_or_create_cart(actor.id).await?;
        let line = self.store.add_cart_line(cart.id(), &product.snapshot_at(Utc::now()), quantity).await?;
        tracing::debug!(line_id = %line.id, quantity = %line.quantity, "cart line added");
        Ok(line)
    }

    /// Set a line's quantity; zero keeps the line. Returns the line and the new cart total.
    #[tracing::instrument(skip(self), fields(user_id = %actor.id))]
    pub async fn update_line_quantity(&self, actor: &Actor, line_id: CartLineId, quantity: i64) -> Result<LineUpdate> {
        let quantity = Quantity::non_negative(quantity)?;
        let cart = self.store.get_or_create_cart(actor.id).await?;
        let mut line = self.store.get_cart_line(cart.id(), line_id).await?.ok_or(EcommerceError::NotFound("cart line"))?;
        let product = self.store.get_product(line.product_id).await?.ok_or(EcommerceError::NotFound("product"))?;
        line.set_quantity(quantity, &product.snapshot_at(Utc::now()));
        self.store.save_cart_line(&line).await?;
        let total = self.compute_total(actor).await?;
        Ok(LineUpdate { line, total })
    }

    #[tracing::instrument(skip(self), fields(user_id = %actor.id))]
    pub async fn remove_line(&self, actor: &Actor, line_id: CartLineId) -> Result<()> {
        let cart = self.store.get_or_create_cart(actor.id).await?;
        if !self.store.delete_cart_line(cart.id(), line_id).await? {
            return Err(EcommerceError::NotFound("cart line"));
        }
        Ok(())
    }

    async fn live_catalog(&self, lines: &[CartLine], now: DateTime<Utc>) -> Result<HashMap<ProductId, ProductSnapshot>> {
        let mut catalog = HashMap::with_capacity(lines.len());
        for line in lines {
            if catalog.contains_key(&line.product_id) {
                continue;
            }
            if let Some(product) = self.store.get_product(line.product_id).await? {
                catalog.insert(product.id(), product.snapshot_at(now));
            }
        }
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use testresult::TestResult;
    use crate::domain::access::Role;
    use crate::services::fixtures::{actor, money, old_product, product};
    use crate::storage::MemoryStore;

    fn service() -> (Arc<MemoryStore>, CartService) {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), CartService::new(store))
    }

    #[tokio::test]
    async fn test_repeated_adds_sum_into_one_line() -> TestResult {
        let (store, carts) = service();
        let mug = product(&store, "Mug", 800).await;
        let user = actor(Role::User);
        for qty in [1, 2, 4] {
            carts.add_line(&user, mug.id(), qty).await?;
        }
        let view = carts.view_cart(&user).await?;
        assert_eq!(view.cart.line_count(), 1);
        assert_eq!(view.cart.lines()[0].quantity.value(), 7);
        assert_eq!(view.total, money(5600));
        Ok(())
    }

    #[tokio::test]
    async fn test_add_rejects_bad_input() -> TestResult {
        let (store, carts) = service();
        let mug = product(&store, "Mug", 800).await;
        let user = actor(Role::User);
        for qty in [0, -3] {
            assert!(matches!(carts.add_line(&user, mug.id(), qty).await, Err(EcommerceError::Validation(_))));
        }
        let missing = carts.add_line(&user, ProductId::generate(), 1).await;
        assert!(matches!(missing, Err(EcommerceError::NotFound("product"))));
        assert!(carts.view_cart(&user).await?.cart.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_add_past_the_quantity_ceiling_is_rejected() -> TestResult {
        let (store, carts) = service();
        let mug = product(&store, "Mug", 1).await;
        let user = actor(Role::User);
        carts.add_line(&user, mug.id(), i64::from(i32::MAX)).await?;

        let err = carts.add_line(&user, mug.id(), 1).await.unwrap_err();
        assert!(matches!(err, EcommerceError::Validation(_)));
        assert!(matches!(carts.add_line(&user, mug.id(), i64::from(i32::MAX) + 1).await, Err(EcommerceError::Validation(_))));
        let view = carts.view_cart(&user).await?;
        assert_eq!(view.cart.lines()[0].quantity.value(), Quantity::MAX);
        Ok(())
    }

    #[tokio::test]
    async fn test_total_follows_live_prices() -> TestResult {
        let (store, carts) = service();
        let mut mug = product(&store, "Mug", 1000).await;
        let user = actor(Role::User);
        carts.add_line(&user, mug.id(), 3).await?;

        mug.update_price(money(1250));
        store.save_product(&mug).await?;
        assert_eq!(carts.compute_total(&user).await?, money(3750));
        Ok(())
    }

    #[tokio::test]
    async fn test_cart_subtotal_ignores_age_discount() -> TestResult {
        let (store, carts) = service();
        let lamp = old_product(&store, "Lamp", 5000).await;
        let user = actor(Role::User);
        let line = carts.add_line(&user, lamp.id(), 2).await?;
        assert_eq!(line.subtotal, money(10000));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_quantity_returns_new_total() -> TestResult {
        let (store, carts) = service();
        let mug = product(&store, "Mug", 1000).await;
        let pen = product(&store, "Pen", 150).await;
        let user = actor(Role::User);
        let line = carts.add_line(&user, mug.id(), 1).await?;
        carts.add_line(&user, pen.id(), 2).await?;

        let update = carts.update_line_quantity(&user, line.id, 4).await?;
        assert_eq!(update.line.quantity.value(), 4);
        assert_eq!(update.line.subtotal, money(4000));
        assert_eq!(update.total, money(4300));

        let zero = carts.update_line_quantity(&user, line.id, 0).await?;
        assert_eq!(zero.total, money(300));
        assert_eq!(carts.view_cart(&user).await?.cart.line_count(), 2);

        assert!(matches!(carts.update_line_quantity(&user, line.id, -1).await, Err(EcommerceError::Validation(_))));
        Ok(())
    }

    #[tokio::test]
    async fn test_other_users_lines_are_not_found() -> TestResult {
        let (store, carts) = service();
        let mug = product(&store, "Mug", 1000).await;
        let owner = actor(Role::User);
        let line = carts.add_line(&owner, mug.id(), 1).await?;

        let stranger = actor(Role::Admin);
        assert!(matches!(carts.update_line_quantity(&stranger, line.id, 5).await, Err(EcommerceError::NotFound("cart line"))));
        assert!(matches!(carts.remove_line(&stranger, line.id).await, Err(EcommerceError::NotFound("cart line"))));
        assert_eq!(carts.view_cart(&owner).await?.cart.lines()[0].quantity.value(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_second_remove_fails() -> TestResult {
        let (store, carts) = service();
        let mug = product(&store, "Mug", 1000).await;
        let user = actor(Role::User);
        let line = carts.add_line(&user, mug.id(), 1).await?;
        carts.remove_line(&user, line.id).await?;
        assert!(matches!(carts.remove_line(&user, line.id).await, Err(EcommerceError::NotFound(_))));
        assert_eq!(carts.compute_total(&user).await?, Money::ZERO);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_adds_are_not_lost() -> TestResult {
        let (store, carts) = service();
        let mug = product(&store, "Mug", 100).await.id();
        let user = actor(Role::User);
        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let carts = carts.clone();
                tokio::spawn(async move { carts.add_line(&user, mug, 1).await })
            })
            .collect();
        for task in tasks {
            task.await??;
        }
        let view = carts.view_cart(&user).await?;
        assert_eq!(view.cart.line_count(), 1);
        assert_eq!(view.cart.lines()[0].quantity.value(), 20);
        Ok(())
    }
}
