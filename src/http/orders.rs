use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use super::{ApiError, AppState, CurrentActor, ValidJson, ValidPath};
use crate::domain::aggregates::Order;
use crate::domain::value_objects::{ArtifactHandle, Money, OrderId, ShippingInfo};

/// Checkout form. Missing fields arrive empty and fail validation.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ShippingForm {
    pub address: String,
    pub postal_code: String,
    pub unit: String,
    pub phone: String,
}

impl From<ShippingForm> for ShippingInfo {
    fn from(f: ShippingForm) -> Self {
        ShippingInfo { address: f.address, postal_code: f.postal_code, unit: f.unit, phone: f.phone }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderCreated {
    pub id: OrderId,
    pub total_price: Money,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StatusChange {
    pub status: String,
}

#[derive(Debug, Serialize)]
pub struct BillIssued {
    pub handle: ArtifactHandle,
}

pub async fn list_orders(State(s): State<AppState>, CurrentActor(actor): CurrentActor) -> Result<Json<Vec<Order>>, ApiError> {
    Ok(Json(s.orders.list_orders(&actor).await?))
}

pub async fn create_order(
    State(s): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ValidJson(form): ValidJson<ShippingForm>,
) -> Result<(StatusCode, Json<OrderCreated>), ApiError> {
    let order = s.orders.create_order(&actor, form.into()).await?;
    Ok((StatusCode::CREATED, Json(OrderCreated { id: order.id(), total_price: order.total_price() })))
}

pub async fn get_order(
    State(s): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ValidPath(id): ValidPath<OrderId>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(s.orders.get_order(&actor, id).await?))
}

pub async fn pay(
    State(s): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ValidPath(id): ValidPath<OrderId>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(s.orders.pay(&actor, id).await?))
}

pub async fn change_status(
    State(s): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ValidPath(id): ValidPath<OrderId>,
    ValidJson(body): ValidJson<StatusChange>,
) -> Result<Json<Order>, ApiError> {
    Ok(Json(s.orders.change_status(&actor, id, &body.status).await?))
}

pub async fn generate_bill(
    State(s): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ValidPath(id): ValidPath<OrderId>,
) -> Result<Json<BillIssued>, ApiError> {
    let handle = s.billing.generate_bill(&actor, id).await?;
    Ok(Json(BillIssued { handle }))
}

pub async fn download_bill(
    State(s): State<AppState>,
    CurrentActor(actor): CurrentActor,
    ValidPath(id): ValidPath<OrderId>,
) -> Result<Response, ApiError> {
    let artifact = s.billing.download_bill(&actor, id).await?;
    let disposition = format!("attachment; filename=\"{}\"", artifact.file_name);
    Ok(([(header::CONTENT_TYPE, artifact.content_type.to_string()), (header::CONTENT_DISPOSITION, disposition)], artifact.bytes).into_response())
}
