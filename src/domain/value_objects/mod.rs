//! Value Objects for the storefront

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::Add;
use uuid::Uuid;
use validator::{Validate, ValidationError};

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Fresh time-ordered identifier.
            pub fn generate() -> Self { Self(Uuid::now_v7()) }
            pub const fn from_uuid(uuid: Uuid) -> Self { Self(uuid) }
            pub const fn into_uuid(self) -> Uuid { self.0 }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self { Self(uuid) }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
        }
    };
}

uuid_id!(
    /// Authenticated user, as issued by the identity provider.
    UserId
);
uuid_id!(ProductId);
uuid_id!(CartId);
uuid_id!(CartLineId);
uuid_id!(OrderId);
uuid_id!(OrderLineId);

/// Money value object. Single-currency; amounts keep two decimal places.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::from_parts(0, 0, 0, false, 2));

    /// Rounds to cents and always carries a scale of two, so `5` becomes `5.00`.
    pub fn new(amount: Decimal) -> Self {
        let mut amount = amount.round_dp(2);
        amount.rescale(2);
        Self(amount)
    }
    pub fn amount(&self) -> Decimal { self.0 }
    pub fn multiply(&self, qty: Quantity) -> Money { Money::new(self.0 * Decimal::from(qty.value())) }
    /// Scale by a factor such as `0.8` for a 20% markdown.
    pub fn scale(&self, factor: Decimal) -> Money { Money::new(self.0 * factor) }
}

impl Default for Money {
    fn default() -> Self { Self::ZERO }
}

impl Add for Money {
    type Output = Money;
    fn add(self, other: Money) -> Money { Money(self.0 + other.0) }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money { iter.fold(Money::ZERO, Add::add) }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self { Money::new(amount) }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{:.2}", self.0) }
}

/// Quantity value object. Never exceeds [`Quantity::MAX`], which fits a Postgres `INTEGER`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(u32);

impl Quantity {
    pub const MAX: u32 = i32::MAX as u32;

    pub const fn new(value: u32) -> Self { Self(value) }

    /// Quantity for an "add to cart" request: strictly positive.
    pub fn positive(raw: i64) -> Result<Self, QuantityError> {
        if raw <= 0 { return Err(QuantityError::NotPositive(raw)); }
        Self::bounded(raw)
    }

    /// Quantity for an explicit update: zero is allowed.
    pub fn non_negative(raw: i64) -> Result<Self, QuantityError> {
        if raw < 0 { return Err(QuantityError::Negative(raw)); }
        Self::bounded(raw)
    }

    fn bounded(raw: i64) -> Result<Self, QuantityError> {
        match u32::try_from(raw) {
            Ok(value) if value <= Self::MAX => Ok(Self(value)),
            _ => Err(QuantityError::TooLarge(raw)),
        }
    }

    pub fn value(&self) -> u32 { self.0 }
    pub fn is_zero(&self) -> bool { self.0 == 0 }

    pub fn checked_add(&self, other: Quantity) -> Result<Self, QuantityError> {
        match self.0.checked_add(other.0) {
            Some(sum) if sum <= Self::MAX => Ok(Self(sum)),
            _ => Err(QuantityError::Overflow),
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QuantityError {
    #[error("quantity must be greater than zero, got {0}")]
    NotPositive(i64),
    #[error("quantity must not be negative, got {0}")]
    Negative(i64),
    #[error("quantity {0} is too large")]
    TooLarge(i64),
    #[error("quantity overflow")]
    Overflow,
}

/// Retrievable reference to a stored artifact, e.g. `orders/<id>/payment.html`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactHandle(String);

impl ArtifactHandle {
    pub fn new(key: impl Into<String>) -> Self { Self(key.into()) }
    pub fn as_str(&self) -> &str { &self.0 }
    pub fn file_name(&self) -> &str { self.0.rsplit('/').next().unwrap_or(&self.0) }
}

impl fmt::Display for ArtifactHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.0) }
}

/// Shipping details captured when an order is placed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ShippingInfo {
    #[validate(length(min = 1, max = 250, message = "address is required"))]
    pub address: String,
    #[validate(length(min = 1, max = 20), custom = "validate_postal_code")]
    pub postal_code: String,
    /// Department, apartment or unit number.
    #[validate(length(min = 1, max = 50, message = "unit is required"))]
    pub unit: String,
    #[validate(custom = "validate_phone")]
    pub phone: String,
}

impl ShippingInfo {
    /// Trims every field, then validates presence and format.
    pub fn normalized(self) -> Result<Self, validator::ValidationErrors> {
        let info = Self {
            address: self.address.trim().to_string(),
            postal_code: self.postal_code.trim().to_string(),
            unit: self.unit.trim().to_string(),
            phone: self.phone.trim().to_string(),
        };
        info.validate()?;
        Ok(info)
    }
}

fn validate_postal_code(value: &str) -> Result<(), ValidationError> {
    let ok = value.len() >= 3
        && value.chars().all(|c| c.is_ascii_alphanumeric() || c == ' ' || c == '-')
        && value.chars().any(|c| c.is_ascii_alphanumeric());
    if ok { Ok(()) } else { Err(ValidationError::new("postal_code_format")) }
}

fn validate_phone(value: &str) -> Result<(), ValidationError> {
    let digits = value.chars().filter(char::is_ascii_digit).count();
    let allowed = value
        .chars()
        .enumerate()
        .all(|(i, c)| c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')') || (c == '+' && i == 0));
    if allowed && (7..=15).contains(&digits) { Ok(()) } else { Err(ValidationError::new("phone_format")) }
}
