use std::sync::Arc;
use crate::artifacts::{Artifact, ArtifactError, ArtifactStore};
use crate::domain::access::{AccessContext, Actor, Capability};
use crate::domain::aggregates::Order;
use crate::domain::bill::{bill_key, render_bill};
use crate::domain::value_objects::{ArtifactHandle, OrderId};
use crate::publisher::EventPublisher;
use crate::services::publish_events;
use crate::storage::Store;
use crate::{EcommerceError, Result};

#[derive(Clone)]
pub struct BillingService {
    store: Arc<dyn Store>,
    artifacts: Arc<dyn ArtifactStore>,
    publisher: Arc<dyn EventPublisher>,
}

impl BillingService {
    pub fn new(store: Arc<dyn Store>, artifacts: Arc<dyn ArtifactStore>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self { store, artifacts, publisher }
    }

    /// Render the order's bill and attach it. Regenerating replaces the
    /// stored document under the same handle.
    #[tracing::instrument(skip(self), fields(user_id = %actor.id, role = %actor.role))]
    pub async fn generate_bill(&self, actor: &Actor, id: OrderId) -> Result<ArtifactHandle> {
        let ctx = AccessContext::resolve(*actor);
        if let Err(e) = ctx.require(Capability::IssueBills) {
            tracing::warn!(order_id = %id, "bill generation refused");
            return Err(e.into());
        }
        let mut order = self.store.get_order(id).await?.ok_or(EcommerceError::NotFound("order"))?;

        let document = render_bill(&order);
        let handle = self.artifacts.store(&bill_key(&order), document.into_bytes()).await?;
        let change = order.attach_bill(handle.clone());
        self.store.apply_order_change(id, &change).await?;

        tracing::info!(order_id = %id, %handle, "bill generated");
        publish_events(self.publisher.as_ref(), &mut order).await;
        Ok(handle)
    }

    /// Fetch the bill of an order visible to the actor.
    pub async fn download_bill(&self, actor: &Actor, id: OrderId) -> Result<Artifact> {
        let order = self.visible_order(actor, id).await?;
        let handle = order.bill().ok_or(EcommerceError::NotFound("bill"))?;
        match self.artifacts.retrieve(handle).await {
            Ok(artifact) => Ok(artifact),
            Err(ArtifactError::NotFound(_)) => Err(EcommerceError::NotFound("bill")),
            Err(e) => Err(e.into()),
        }
    }

    async fn visible_order(&self, actor: &Actor, id: OrderId) -> Result<Order> {
        let ctx = AccessContext::resolve(*actor);
        self.store
            .get_order(id)
            .await?
            .filter(|order| ctx.can_view(order.customer_id()))
            .ok_or(EcommerceError::NotFound("order"))
    }
}
