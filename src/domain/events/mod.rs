//! Domain events
use serde::Serialize;
use crate::domain::aggregates::order::OrderStatus;
use crate::domain::value_objects::{Money, OrderId, UserId};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: OrderId, customer_id: UserId, total_price: Money, line_count: usize },
    PaymentRecorded { order_id: OrderId, status: OrderStatus, is_paid: bool },
    StatusChanged { order_id: OrderId, from: OrderStatus, to: OrderStatus },
    BillGenerated { order_id: OrderId, handle: String },
}

impl OrderEvent {
    pub fn order_id(&self) -> OrderId {
        match self {
            Self::Placed { order_id, .. }
            | Self::PaymentRecorded { order_id, .. }
            | Self::StatusChanged { order_id, .. }
            | Self::BillGenerated { order_id, .. } => *order_id,
        }
    }

    /// Subject suffix used when publishing.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Placed { .. } => "placed",
            Self::PaymentRecorded { .. } => "payment_recorded",
            Self::StatusChanged { .. } => "status_changed",
            Self::BillGenerated { .. } => "bill_generated",
        }
    }
}
