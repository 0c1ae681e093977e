//! Cart Aggregate
//!
//! A cart is a live quotation: line subtotals follow the product's current
//! price every time a line is touched, and [`Cart::reprice`] refreshes them
//! all before a total is shown.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use crate::domain::aggregates::product::ProductSnapshot;
use crate::domain::value_objects::{CartId, CartLineId, Money, ProductId, Quantity, QuantityError, UserId};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Cart {
    id: CartId,
    user_id: UserId,
    lines: Vec<CartLine>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub id: CartLineId,
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub quantity: Quantity,
    pub subtotal: Money,
}

impl CartLine {
    /// Set the quantity and recompute the subtotal from the given live price.
    pub fn set_quantity(&mut self, quantity: Quantity, product: &ProductSnapshot) {
        self.quantity = quantity;
        self.reprice(product);
    }

    pub fn reprice(&mut self, product: &ProductSnapshot) {
        self.subtotal = product.price.multiply(self.quantity);
    }
}

impl Cart {
    pub fn for_user(user_id: UserId) -> Self {
        let now = Utc::now();
        Self::restore(CartId::generate(), user_id, vec![], now, now)
    }

    pub fn restore(id: CartId, user_id: UserId, lines: Vec<CartLine>, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        Self { id, user_id, lines, created_at, updated_at }
    }

    pub fn id(&self) -> CartId { self.id }
    pub fn user_id(&self) -> UserId { self.user_id }
    pub fn lines(&self) -> &[CartLine] { &self.lines }
    pub fn line(&self, line_id: CartLineId) -> Option<&CartLine> { self.lines.iter().find(|l| l.id == line_id) }
    pub fn line_count(&self) -> usize { self.lines.len() }
    pub fn is_empty(&self) -> bool { self.lines.is_empty() }
    pub fn updated_at(&self) -> DateTime<Utc> { self.updated_at }

    /// Adding a product already in the cart increments its line.
    pub fn add_line(&mut self, product: &ProductSnapshot, quantity: Quantity) -> Result<&CartLine, CartError> {
        let index = match self.lines.iter().position(|l| l.product_id == product.id) {
            Some(index) => {
                let line = &mut self.lines[index];
                let quantity = line.quantity.checked_add(quantity)?;
                line.set_quantity(quantity, product);
                index
            }
            None => {
                self.lines.push(CartLine {
                    id: CartLineId::generate(),
                    cart_id: self.id,
                    product_id: product.id,
                    quantity,
                    subtotal: product.price.multiply(quantity),
                });
                self.lines.len() - 1
            }
        };
        self.touch();
        Ok(&self.lines[index])
    }

    pub fn update_quantity(&mut self, line_id: CartLineId, quantity: Quantity, product: &ProductSnapshot) -> Result<&CartLine, CartError> {
        let index = self.lines.iter().position(|l| l.id == line_id).ok_or(CartError::LineNotFound)?;
        self.lines[index].set_quantity(quantity, product);
        self.touch();
        Ok(&self.lines[index])
    }

    /// Overwrite a stored line, keeping its position.
    pub fn replace_line(&mut self, line: CartLine) -> Result<(), CartError> {
        let slot = self.lines.iter_mut().find(|l| l.id == line.id).ok_or(CartError::LineNotFound)?;
        *slot = line;
        self.touch();
        Ok(())
    }

    pub fn remove_line(&mut self, line_id: CartLineId) -> Result<CartLine, CartError> {
        let index = self.lines.iter().position(|l| l.id == line_id).ok_or(CartError::LineNotFound)?;
        let line = self.lines.remove(index);
        self.touch();
        Ok(line)
    }

    pub fn clear(&mut self) { self.lines.clear(); self.touch(); }

    /// Refresh every subtotal from current prices. Lines whose product is
    /// missing from `catalog` keep their last subtotal.
    pub fn reprice(&mut self, catalog: &HashMap<ProductId, ProductSnapshot>) {
        for line in &mut self.lines {
            if let Some(product) = catalog.get(&line.product_id) {
                line.reprice(product);
            }
        }
    }

    pub fn total(&self) -> Money { self.lines.iter().map(|l| l.subtotal).sum() }

    fn touch(&mut self) { self.updated_at = Utc::now(); }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    #[error("cart line not found")]
    LineNotFound,
    #[error(transparent)]
    Quantity(#[from] QuantityError),
}
