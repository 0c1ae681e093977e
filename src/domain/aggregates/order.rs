//! Order Aggregate
//!
//! An order is materialized once from a cart. Its lines and total price are
//! frozen at that moment; afterwards only the status, the paid flag and the
//! attached bill change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use crate::domain::access::{AccessContext, AccessError, Capability};
use crate::domain::aggregates::cart::CartLine;
use crate::domain::aggregates::product::ProductSnapshot;
use crate::domain::events::OrderEvent;
use crate::domain::value_objects::{ArtifactHandle, Money, OrderId, OrderLineId, ProductId, Quantity, ShippingInfo, UserId};

#[derive(Clone, Debug, Serialize)]
pub struct Order {
    id: OrderId,
    customer_id: UserId,
    shipping: ShippingInfo,
    total_price: Money,
    status: OrderStatus,
    /// Legacy payment signal set when a customer without payment authority
    /// pays. `status` is the primary lifecycle field.
    is_paid: bool,
    bill: Option<ArtifactHandle>,
    lines: Vec<OrderLine>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    #[serde(skip)]
    events: Vec<OrderEvent>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLine {
    pub id: OrderLineId,
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: Quantity,
    /// Price at the time the order was placed. Never recomputed.
    pub unit_price: Money,
}

impl OrderLine {
    pub fn line_total(&self) -> Money { self.unit_price.multiply(self.quantity) }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    #[default]
    Undecided,
    Paid,
    Completed,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 3] = [Self::Undecided, Self::Paid, Self::Completed];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Undecided => "Undecided",
            Self::Paid => "Paid",
            Self::Completed => "Completed",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderStatus {
    type Err = OrderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| OrderError::InvalidStatus(s.to_string()))
    }
}

/// Persisted form of an order, used by storage backends to rebuild the aggregate.
#[derive(Clone, Debug)]
pub struct OrderRecord {
    pub id: OrderId,
    pub customer_id: UserId,
    pub shipping: ShippingInfo,
    pub total_price: Money,
    pub status: OrderStatus,
    pub is_paid: bool,
    pub bill: Option<ArtifactHandle>,
    pub lines: Vec<OrderLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<OrderRecord> for Order {
    fn from(r: OrderRecord) -> Self {
        Self {
            id: r.id, customer_id: r.customer_id, shipping: r.shipping, total_price: r.total_price,
            status: r.status, is_paid: r.is_paid, bill: r.bill, lines: r.lines,
            created_at: r.created_at, updated_at: r.updated_at, events: vec![],
        }
    }
}

impl Order {
    /// Materialize an order from the current cart lines.
    ///
    /// Every line is priced at the product's discounted price when it has one,
    /// otherwise at its current price, and the total is frozen from those
    /// prices. `catalog` must contain a snapshot for every line's product.
    pub fn place(
        customer_id: UserId,
        shipping: ShippingInfo,
        cart_lines: &[CartLine],
        catalog: &HashMap<ProductId, ProductSnapshot>,
        now: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        if cart_lines.is_empty() { return Err(OrderError::EmptyCart); }

        let mut order = Self {
            id: OrderId::generate(), customer_id, shipping, total_price: Money::ZERO,
            status: OrderStatus::Undecided, is_paid: false, bill: None,
            lines: Vec::with_capacity(cart_lines.len()),
            created_at: now, updated_at: now, events: vec![],
        };

        let mut running_total = Money::ZERO;
        for cart_line in cart_lines {
            let product = catalog.get(&cart_line.product_id).ok_or(OrderError::UnknownProduct(cart_line.product_id))?;
            let line = OrderLine {
                id: OrderLineId::generate(),
                product_id: product.id,
                product_name: product.name.clone(),
                quantity: cart_line.quantity,
                unit_price: product.effective_price(),
            };
            running_total = running_total + line.line_total();
            order.lines.push(line);
        }
        order.total_price = running_total;

        order.raise_event(OrderEvent::Placed {
            order_id: order.id, customer_id, total_price: order.total_price, line_count: order.lines.len(),
        });
        Ok(order)
    }

    pub fn id(&self) -> OrderId { self.id }
    pub fn customer_id(&self) -> UserId { self.customer_id }
    pub fn shipping(&self) -> &ShippingInfo { &self.shipping }
    pub fn total_price(&self) -> Money { self.total_price }
    pub fn status(&self) -> OrderStatus { self.status }
    pub fn is_paid(&self) -> bool { self.is_paid }
    pub fn bill(&self) -> Option<&ArtifactHandle> { self.bill.as_ref() }
    pub fn lines(&self) -> &[OrderLine] { &self.lines }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    /// Only the customer may pay. Actors allowed to confirm payments move the
    /// order to `Paid`; everyone else only raises the paid flag.
    pub fn pay(&mut self, ctx: &AccessContext) -> Result<OrderChange, OrderError> {
        ctx.require_owner(self.customer_id)?;
        let change = if ctx.has(Capability::ConfirmPayment) { OrderChange::ConfirmPayment } else { OrderChange::FlagPaid };
        self.apply(&change);
        self.raise_event(OrderEvent::PaymentRecorded { order_id: self.id, status: self.status, is_paid: self.is_paid });
        Ok(change)
    }

    /// Set any status from the closed set. Transitions are not required to
    /// move forward. The role gate is checked before `raw` is looked at.
    pub fn change_status(&mut self, ctx: &AccessContext, raw: &str) -> Result<OrderChange, OrderError> {
        ctx.require(Capability::ManageOrders)?;
        let status: OrderStatus = raw.parse()?;
        let previous = self.status;
        let change = OrderChange::SetStatus(status);
        self.apply(&change);
        self.raise_event(OrderEvent::StatusChanged { order_id: self.id, from: previous, to: status });
        Ok(change)
    }

    /// Attach (or replace) the generated bill.
    pub fn attach_bill(&mut self, handle: ArtifactHandle) -> OrderChange {
        self.raise_event(OrderEvent::BillGenerated { order_id: self.id, handle: handle.to_string() });
        let change = OrderChange::AttachBill(handle);
        self.apply(&change);
        change
    }

    /// Apply a change without recording events. Storage uses this to update
    /// the current copy of an order instead of writing back a stale one.
    pub fn apply(&mut self, change: &OrderChange) {
        match change {
            OrderChange::ConfirmPayment => self.status = OrderStatus::Paid,
            OrderChange::FlagPaid => self.is_paid = true,
            OrderChange::SetStatus(status) => self.status = *status,
            OrderChange::AttachBill(handle) => self.bill = Some(handle.clone()),
        }
        self.touch();
    }

    pub fn take_events(&mut self) -> Vec<OrderEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: OrderEvent) { self.events.push(e); }
    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

/// The only mutations an order accepts after placement. Each touches a single field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OrderChange {
    /// `status = Paid`
    ConfirmPayment,
    /// `is_paid = true`
    FlagPaid,
    SetStatus(OrderStatus),
    AttachBill(ArtifactHandle),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OrderError {
    #[error("cannot place an order from an empty cart")]
    EmptyCart,
    #[error("product {0} is no longer in the catalog")]
    UnknownProduct(ProductId),
    #[error("unknown order status `{0}`")]
    InvalidStatus(String),
    #[error(transparent)]
    Access(#[from] AccessError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::access::{Actor, Role};
    use crate::domain::value_objects::CartId;
    use chrono::Duration;
    use rust_decimal::Decimal;

    fn shipping() -> ShippingInfo {
        ShippingInfo { address: "1 Elm Rd".into(), postal_code: "12345".into(), unit: "7".into(), phone: "5551234567".into() }
    }

    fn snapshot(name: &str, price: Decimal, discounted: Option<Decimal>) -> ProductSnapshot {
        ProductSnapshot { id: ProductId::generate(), name: name.into(), price: Money::new(price), discounted_price: discounted.map(Money::new) }
    }

    fn line(product: &ProductSnapshot, qty: u32) -> CartLine {
        let quantity = Quantity::new(qty);
        CartLine { id: crate::domain::value_objects::CartLineId::generate(), cart_id: CartId::generate(), product_id: product.id, quantity, subtotal: product.price.multiply(quantity) }
    }

    fn place(customer: UserId, products: &[(&ProductSnapshot, u32)]) -> Result<Order, OrderError> {
        let lines: Vec<CartLine> = products.iter().map(|(p, q)| line(p, *q)).collect();
        let catalog = products.iter().map(|(p, _)| (p.id, (*p).clone())).collect();
        Order::place(customer, shipping(), &lines, &catalog, Utc::now())
    }

    fn ctx(id: UserId, role: Role) -> AccessContext { AccessContext::resolve(Actor::new(id, role)) }

    #[test]
    fn test_place_freezes_total() {
        let a = snapshot("A", Decimal::new(1000, 2), None);
        let b = snapshot("B", Decimal::new(500, 2), None);
        let mut order = place(UserId::generate(), &[(&a, 2), (&b, 1)]).unwrap();
        assert_eq!(order.total_price().amount(), Decimal::new(2500, 2));
        assert_eq!(order.lines().len(), 2);
        assert_eq!(order.status(), OrderStatus::Undecided);
        assert!(!order.is_paid());
        assert!(matches!(order.take_events().as_slice(), [OrderEvent::Placed { line_count: 2, .. }]));
    }

    #[test]
    fn test_place_uses_discounted_price() {
        let a = snapshot("A", Decimal::new(50, 0), Some(Decimal::new(40, 0)));
        let order = place(UserId::generate(), &[(&a, 3)]).unwrap();
        assert_eq!(order.lines()[0].unit_price.amount(), Decimal::new(40, 0));
        assert_eq!(order.total_price().amount(), Decimal::new(120, 0));
    }

    #[test]
    fn test_place_rejects_empty_cart() {
        let err = Order::place(UserId::generate(), shipping(), &[], &HashMap::new(), Utc::now()).unwrap_err();
        assert_eq!(err, OrderError::EmptyCart);
    }

    #[test]
    fn test_place_rejects_line_without_snapshot() {
        let a = snapshot("A", Decimal::new(1, 0), None);
        let err = Order::place(UserId::generate(), shipping(), &[line(&a, 1)], &HashMap::new(), Utc::now() - Duration::seconds(1)).unwrap_err();
        assert_eq!(err, OrderError::UnknownProduct(a.id));
    }

    #[test]
    fn test_pay_by_customer_sets_flag() {
        let customer = UserId::generate();
        let a = snapshot("A", Decimal::new(1, 0), None);
        let mut order = place(customer, &[(&a, 1)]).unwrap();
        order.pay(&ctx(customer, Role::User)).unwrap();
        assert!(order.is_paid());
        assert_eq!(order.status(), OrderStatus::Undecided);
    }

    #[test]
    fn test_pay_by_admin_customer_sets_status() {
        let customer = UserId::generate();
        let a = snapshot("A", Decimal::new(1, 0), None);
        let mut order = place(customer, &[(&a, 1)]).unwrap();
        order.pay(&ctx(customer, Role::Admin)).unwrap();
        assert_eq!(order.status(), OrderStatus::Paid);
        assert!(!order.is_paid());
    }

    #[test]
    fn test_pay_by_stranger_is_forbidden() {
        let a = snapshot("A", Decimal::new(1, 0), None);
        let mut order = place(UserId::generate(), &[(&a, 1)]).unwrap();
        order.take_events();
        for role in [Role::User, Role::Admin, Role::Cashier] {
            let err = order.pay(&ctx(UserId::generate(), role)).unwrap_err();
            assert_eq!(err, OrderError::Access(AccessError::NotOwner));
        }
        assert_eq!(order.status(), OrderStatus::Undecided);
        assert!(!order.is_paid());
        assert!(order.take_events().is_empty());
    }

    #[test]
    fn test_change_status_role_gate_comes_first() {
        let customer = UserId::generate();
        let a = snapshot("A", Decimal::new(1, 0), None);
        let mut order = place(customer, &[(&a, 1)]).unwrap();
        for raw in ["Paid", "garbage", ""] {
            let err = order.change_status(&ctx(customer, Role::User), raw).unwrap_err();
            assert_eq!(err, OrderError::Access(AccessError::Missing(Capability::ManageOrders)));
        }
        assert_eq!(order.status(), OrderStatus::Undecided);
    }

    #[test]
    fn test_change_status_allows_any_known_value() {
        let a = snapshot("A", Decimal::new(1, 0), None);
        let mut order = place(UserId::generate(), &[(&a, 1)]).unwrap();
        let cashier = ctx(UserId::generate(), Role::Cashier);
        order.change_status(&cashier, "Completed").unwrap();
        let change = order.change_status(&cashier, "undecided").unwrap();
        assert_eq!(change, OrderChange::SetStatus(OrderStatus::Undecided));
        assert_eq!(order.status(), OrderStatus::Undecided);
        let events = order.take_events();
        assert!(matches!(
            events.last(),
            Some(OrderEvent::StatusChanged { from: OrderStatus::Completed, to: OrderStatus::Undecided, .. })
        ));
        assert_eq!(order.change_status(&cashier, "Shipped"), Err(OrderError::InvalidStatus("Shipped".into())));
        assert_eq!(order.status(), OrderStatus::Undecided);
    }

    #[test]
    fn test_apply_touches_only_its_field() {
        let a = snapshot("A", Decimal::new(1, 0), None);
        let mut order = place(UserId::generate(), &[(&a, 1)]).unwrap();
        order.apply(&OrderChange::FlagPaid);
        order.apply(&OrderChange::SetStatus(OrderStatus::Completed));
        order.apply(&OrderChange::AttachBill(ArtifactHandle::new("orders/x/payment.html")));
        assert!(order.is_paid());
        assert_eq!(order.status(), OrderStatus::Completed);
        assert!(order.bill().is_some());
        assert_eq!(order.take_events().len(), 1);
    }

    #[test]
    fn test_attach_bill_overwrites() {
        let a = snapshot("A", Decimal::new(1, 0), None);
        let mut order = place(UserId::generate(), &[(&a, 1)]).unwrap();
        order.attach_bill(ArtifactHandle::new("orders/x/payment.html"));
        order.attach_bill(ArtifactHandle::new("orders/x/payment.html"));
        assert_eq!(order.bill().map(ArtifactHandle::file_name), Some("payment.html"));
        assert_eq!(order.lines().len(), 1);
    }
}
