//! Order event publishing.
//!
//! Events are published after the state change that raised them is stored.
//! A failed publish is logged and never undoes or fails the operation.

use async_trait::async_trait;
use crate::domain::events::OrderEvent;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &OrderEvent);
}

/// Publishes each event as JSON on `{prefix}.{event name}`.
#[derive(Clone, Debug)]
pub struct NatsPublisher {
    client: async_nats::Client,
    prefix: String,
}

impl NatsPublisher {
    pub fn new(client: async_nats::Client, prefix: impl Into<String>) -> Self {
        Self { client, prefix: prefix.into() }
    }

    pub fn subject_for(&self, event: &OrderEvent) -> String { format!("{}.{}", self.prefix, event.name()) }
}

#[async_trait]
impl EventPublisher for NatsPublisher {
    async fn publish(&self, event: &OrderEvent) {
        let payload = match serde_json::to_vec(event) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, event = event.name(), "failed to encode order event");
                return;
            }
        };
        let subject = self.subject_for(event);
        if let Err(e) = self.client.publish(subject.clone(), payload.into()).await {
            tracing::warn!(error = %e, %subject, order_id = %event.order_id(), "failed to publish order event");
        }
    }
}

/// Fallback used when no broker is configured.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogPublisher;

#[async_trait]
impl EventPublisher for LogPublisher {
    async fn publish(&self, event: &OrderEvent) {
        tracing::info!(event = event.name(), order_id = %event.order_id(), "order event");
    }
}
