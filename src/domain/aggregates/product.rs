//! Catalog Product
//!
//! The catalog is owned elsewhere; orders and carts only ever see a
//! [`ProductSnapshot`] taken at a point in time.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use crate::domain::value_objects::{Money, ProductId};

/// Products older than this many days are marked down.
pub const SALE_AFTER_DAYS: i64 = 30;

/// Price factor applied to products on sale (20% off).
pub const SALE_FACTOR: Decimal = Decimal::from_parts(8, 0, 0, false, 1);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    name: String,
    price: Money,
    created_at: DateTime<Utc>,
}

/// Identity and prices of a product at one instant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    pub discounted_price: Option<Money>,
}

impl ProductSnapshot {
    /// Price an order line is frozen at.
    pub fn effective_price(&self) -> Money { self.discounted_price.unwrap_or(self.price) }
}

impl Product {
    pub fn create(name: impl Into<String>, price: Money) -> Self {
        Self::restore(ProductId::generate(), name.into(), price, Utc::now())
    }

    pub fn restore(id: ProductId, name: String, price: Money, created_at: DateTime<Utc>) -> Self {
        Self { id, name, price, created_at }
    }

    pub fn id(&self) -> ProductId { self.id }
    pub fn name(&self) -> &str { &self.name }
    pub fn price(&self) -> Money { self.price }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }

    pub fn update_price(&mut self, new_price: Money) { self.price = new_price; }

    /// Backdate the listing, e.g. when importing existing stock.
    pub fn listed_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Old stock is discounted by calendar day, not by exact age.
    pub fn is_on_sale(&self, now: DateTime<Utc>) -> bool {
        self.created_at.date_naive() < (now - Duration::days(SALE_AFTER_DAYS)).date_naive()
    }

    pub fn snapshot_at(&self, now: DateTime<Utc>) -> ProductSnapshot {
        ProductSnapshot {
            id: self.id,
            name: self.name.clone(),
            price: self.price,
            discounted_price: self.is_on_sale(now).then(|| self.price.scale(SALE_FACTOR)),
        }
    }
}
