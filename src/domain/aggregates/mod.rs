//! Aggregates module
pub mod product;
pub mod order;
pub mod cart;

pub use product::{Product, ProductSnapshot};
pub use order::{Order, OrderChange, OrderError, OrderLine, OrderRecord, OrderStatus};
pub use cart::{Cart, CartError, CartLine};
