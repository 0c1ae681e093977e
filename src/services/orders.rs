use chrono::Utc;
use std::sync::Arc;
use crate::domain::access::{AccessContext, Actor, Capability};
use crate::domain::aggregates::Order;
use crate::domain::value_objects::{OrderId, ShippingInfo};
use crate::publisher::EventPublisher;
use crate::services::publish_events;
use crate::storage::Store;
use crate::{EcommerceError, Result};

#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
    publisher: Arc<dyn EventPublisher>,
}

impl OrderService {
    pub fn new(store: Arc<dyn Store>, publisher: Arc<dyn EventPublisher>) -> Self { Self { store, publisher } }

    /// Turn the actor's cart into an order. Shipping details are validated
    /// before anything is written.
    #[tracing::instrument(skip(self, shipping), fields(user_id = %actor.id))]
    pub async fn create_order(&self, actor: &Actor, shipping: ShippingInfo) -> Result<Order> {
        let shipping = shipping.normalized()?;
        let mut order = self.store.place_order(actor.id, &shipping, Utc::now()).await?;
        tracing::info!(order_id = %order.id(), total = %order.total_price(), lines = order.lines().len(), "order placed");
        publish_events(self.publisher.as_ref(), &mut order).await;
        Ok(order)
    }

    /// Orders the actor cannot see are reported as missing.
    pub async fn get_order(&self, actor: &Actor, id: OrderId) -> Result<Order> {
        let ctx = AccessContext::resolve(*actor);
        self.store
            .get_order(id)
            .await?
            .filter(|order| ctx.can_view(order.customer_id()))
            .ok_or(EcommerceError::NotFound("order"))
    }

    pub async fn list_orders(&self, actor: &Actor) -> Result<Vec<Order>> {
        let ctx = AccessContext::resolve(*actor);
        self.store.list_orders(ctx.order_scope()).await
    }

    #[tracing::instrument(skip(self), fields(user_id = %actor.id, role = %actor.role))]
    pub async fn pay(&self, actor: &Actor, id: OrderId) -> Result<Order> {
        let ctx = AccessContext::resolve(*actor);
        let mut order = self.load(id).await?;
        let change = match order.pay(&ctx) {
            Ok(change) => change,
            Err(e) => {
                tracing::warn!(order_id = %id, error = %e, "payment refused");
                return Err(e.into());
            }
        };
        let stored = self.store.apply_order_change(id, &change).await?;
        tracing::info!(order_id = %id, status = %stored.status(), is_paid = stored.is_paid(), "payment recorded");
        publish_events(self.publisher.as_ref(), &mut order).await;
        Ok(stored)
    }

    /// Overwrite the status with any value from the closed set.
    #[tracing::instrument(skip(self), fields(user_id = %actor.id, role = %actor.role))]
    pub async fn change_status(&self, actor: &Actor, id: OrderId, status: &str) -> Result<Order> {
        let ctx = AccessContext::resolve(*actor);
        // Refuse base roles before touching storage so they learn nothing about the order.
        if let Err(e) = ctx.require(Capability::ManageOrders) {
            tracing::warn!(order_id = %id, "status change refused");
            return Err(e.into());
        }
        let mut order = self.load(id).await?;
        let previous = order.status();
        let change = order.change_status(&ctx, status)?;
        let stored = self.store.apply_order_change(id, &change).await?;
        tracing::info!(order_id = %id, from = %previous, to = %stored.status(), "order status changed");
        publish_events(self.publisher.as_ref(), &mut order).await;
        Ok(stored)
    }

    async fn load(&self, id: OrderId) -> Result<Order> {
        self.store.get_order(id).await?.ok_or(EcommerceError::NotFound("order"))
    }
}
