//! Application services
//!
//! Each service resolves the caller's access, talks to storage and publishes
//! whatever events the touched order recorded once the write has landed.

mod billing;
mod cart;
mod orders;

pub use billing::BillingService;
pub use cart::{CartService, CartView, LineUpdate};
pub use orders::OrderService;

use crate::domain::aggregates::Order;
use crate::publisher::EventPublisher;

/// Drain the order's pending events and hand them to the publisher.
pub(crate) async fn publish_events(publisher: &dyn EventPublisher, order: &mut Order) {
    for event in order.take_events() {
        publisher.publish(&event).await;
    }
}
