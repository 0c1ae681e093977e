//! Storefront order management
//!
//! Cart-to-order conversion and the order lifecycle behind a small storefront.
//!
//! ## Features
//! - Per-user shopping carts priced from live catalog prices
//! - Atomic order placement that freezes line prices and the total
//! - Role-gated payment and status changes
//! - Bill generation and download
//! - Postgres or in-memory storage, optional NATS event publishing

pub mod artifacts;
pub mod config;
pub mod domain;
pub mod http;
pub mod publisher;
pub mod services;
pub mod storage;

use thiserror::Error;
use crate::artifacts::ArtifactError;
use crate::domain::access::AccessError;
use crate::domain::aggregates::{CartError, OrderError};
use crate::domain::value_objects::QuantityError;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum EcommerceError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("cart is empty")]
    EmptyCart,

    #[error("storage error")]
    Storage(#[source] sqlx::Error),

    #[error("corrupt record: {0}")]
    CorruptRecord(String),

    #[error("artifact storage error")]
    Artifact(#[from] ArtifactError),
}

impl From<sqlx::Error> for EcommerceError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::RowNotFound => Self::NotFound("record"),
            other => Self::Storage(other),
        }
    }
}

impl From<QuantityError> for EcommerceError {
    fn from(error: QuantityError) -> Self { Self::Validation(error.to_string()) }
}

impl From<validator::ValidationErrors> for EcommerceError {
    fn from(errors: validator::ValidationErrors) -> Self { Self::Validation(errors.to_string()) }
}

impl From<AccessError> for EcommerceError {
    fn from(error: AccessError) -> Self { Self::Forbidden(error.to_string()) }
}

impl From<CartError> for EcommerceError {
    fn from(error: CartError) -> Self {
        match error {
            CartError::LineNotFound => Self::NotFound("cart line"),
            CartError::Quantity(e) => e.into(),
        }
    }
}

impl From<OrderError> for EcommerceError {
    fn from(error: OrderError) -> Self {
        match error {
            OrderError::EmptyCart => Self::EmptyCart,
            OrderError::UnknownProduct(_) => Self::NotFound("product"),
            OrderError::InvalidStatus(raw) => Self::Validation(format!("unknown order status `{raw}`")),
            OrderError::Access(e) => e.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EcommerceError>;
