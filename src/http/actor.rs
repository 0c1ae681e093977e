use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use uuid::Uuid;
use super::ApiError;
use crate::domain::access::{Actor, Role};
use crate::domain::value_objects::UserId;

/// Authenticated user id, set by the gateway in front of the service.
pub const USER_HEADER: &str = "x-user-id";
/// One of `USER`, `ADMIN`, `CASHIER`.
pub const ROLE_HEADER: &str = "x-user-role";

/// The caller of a request.
#[derive(Clone, Copy, Debug)]
pub struct CurrentActor(pub Actor);

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for CurrentActor {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let header = |name: &str| parts.headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim);
        let id = header(USER_HEADER)
            .and_then(|raw| Uuid::parse_str(raw).ok())
            .ok_or(ApiError::Unauthorized("missing or invalid x-user-id header"))?;
        let role = header(ROLE_HEADER)
            .and_then(|raw| raw.parse::<Role>().ok())
            .ok_or(ApiError::Unauthorized("missing or invalid x-user-role header"))?;
        Ok(Self(Actor::new(UserId::from_uuid(id), role)))
    }
}
