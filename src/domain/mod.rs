//! Domain model: catalog snapshots, carts, orders and who may touch them.

pub mod access;
pub mod aggregates;
pub mod bill;
pub mod events;
pub mod value_objects;
