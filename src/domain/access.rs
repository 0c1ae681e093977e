//! Roles, capabilities and order visibility.
//!
//! A role is resolved once into an [`AccessContext`]; operations ask the
//! context for the capability they need instead of matching on roles.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use crate::domain::value_objects::UserId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Role {
    User,
    Admin,
    Cashier,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Admin => "ADMIN",
            Self::Cashier => "CASHIER",
        }
    }

    pub fn capabilities(&self) -> &'static [Capability] {
        use Capability::*;
        match self {
            Self::User => &[],
            Self::Cashier => &[ManageOrders, ViewAllOrders, IssueBills],
            Self::Admin => &[ConfirmPayment, ManageOrders, ViewAllOrders, IssueBills],
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USER" => Ok(Self::User),
            "ADMIN" => Ok(Self::Admin),
            "CASHIER" => Ok(Self::Cashier),
            _ => Err(UnknownRole(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role `{0}`")]
pub struct UnknownRole(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// Paying moves the order straight to `Paid` instead of only flagging it.
    ConfirmPayment,
    ManageOrders,
    ViewAllOrders,
    IssueBills,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { fmt::Debug::fmt(self, f) }
}

/// Authenticated caller as handed over by the identity layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: UserId, role: Role) -> Self { Self { id, role } }
}

/// Which orders an actor may list or open.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderScope {
    Own(UserId),
    All,
}

impl OrderScope {
    pub fn includes(&self, customer_id: UserId) -> bool {
        match self {
            Self::Own(user) => *user == customer_id,
            Self::All => true,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessContext {
    actor: Actor,
    capabilities: &'static [Capability],
}

impl AccessContext {
    pub fn resolve(actor: Actor) -> Self {
        Self { actor, capabilities: actor.role.capabilities() }
    }

    pub fn actor(&self) -> &Actor { &self.actor }
    pub fn user_id(&self) -> UserId { self.actor.id }
    pub fn has(&self, capability: Capability) -> bool { self.capabilities.contains(&capability) }

    pub fn require(&self, capability: Capability) -> Result<(), AccessError> {
        if self.has(capability) { Ok(()) } else { Err(AccessError::Missing(capability)) }
    }

    pub fn require_owner(&self, owner: UserId) -> Result<(), AccessError> {
        if self.actor.id == owner { Ok(()) } else { Err(AccessError::NotOwner) }
    }

    pub fn order_scope(&self) -> OrderScope {
        if self.has(Capability::ViewAllOrders) { OrderScope::All } else { OrderScope::Own(self.actor.id) }
    }

    pub fn can_view(&self, customer_id: UserId) -> bool { self.order_scope().includes(customer_id) }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("missing capability {0}")]
    Missing(Capability),
    #[error("only the order's customer may do this")]
    NotOwner,
}
