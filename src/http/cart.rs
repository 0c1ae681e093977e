use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::Value;
use super::{ApiError, AppState, CurrentActor, ValidJson, ValidPath};
use crate::domain::aggregates::CartLine;
use crate::domain::value_objects::{CartLineId, ProductId};
use crate::services::{CartView, LineUpdate};
use crate::EcommerceError;

#[derive(Debug, Deserialize)]
pub struct AddItem {
    pub product_id: ProductId,
    #[serde(default)]
    pub quantity: Value,
}

#[derive(Debug, Deserialize)]
pub struct SetQuantity {
    #[serde(default)]
    pub quantity: Value,
}

/// Accepts JSON integers and integer strings; anything else is a validation error.
fn quantity(raw: &Value) -> Result<i64, EcommerceError> {
    let parsed = match raw {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| EcommerceError::Validation(format!("quantity must be an integer, got {raw}")))
}

pub async fn view_cart(State(s): State<AppState>, CurrentActor(actor): CurrentActor) -> Result<Json<CartView>, ApiError> {
    Ok(Json(s.carts.view_cart(&actor).await?))
}

pub async fn add_item(
    State(s): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ValidJson(body): ValidJson<AddItem>,
) -> Result<Json<CartLine>, ApiError> {
    let line = s.carts.add_line(&actor, body.product_id, quantity(&body.quantity)?).await?;
    Ok(Json(line))
}

pub async fn update_item(
    State(s): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ValidPath(line_id): ValidPath<CartLineId>,
    ValidJson(body): ValidJson<SetQuantity>,
) -> Result<Json<LineUpdate>, ApiError> {
    let update = s.carts.update_line_quantity(&actor, line_id, quantity(&body.quantity)?).await?;
    Ok(Json(update))
}

pub async fn remove_item(
    State(s): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ValidPath(line_id): ValidPath<CartLineId>,
) -> Result<StatusCode, ApiError> {
    s.carts.remove_line(&actor, line_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
