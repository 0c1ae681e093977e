use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use super::{ApiError, AppState, ValidPath};
use crate::domain::aggregates::Product;
use crate::domain::value_objects::{Money, ProductId};
use crate::EcommerceError;

#[derive(Debug, Serialize)]
pub struct ProductView {
    pub id: ProductId,
    pub name: String,
    pub price: Money,
    /// Present while the product is on sale.
    pub discounted_price: Option<Money>,
    pub created_at: DateTime<Utc>,
}

impl ProductView {
    fn at(product: &Product, now: DateTime<Utc>) -> Self {
        let snapshot = product.snapshot_at(now);
        Self {
            id: snapshot.id,
            name: snapshot.name,
            price: snapshot.price,
            discounted_price: snapshot.discounted_price,
            created_at: product.created_at(),
        }
    }
}

pub async fn list_products(State(s): State<AppState>) -> Result<Json<Vec<ProductView>>, ApiError> {
    let now = Utc::now();
    let products = s.store.list_products().await?;
    Ok(Json(products.iter().map(|p| ProductView::at(p, now)).collect()))
}

pub async fn get_product(
    State(s): State<AppState>,
    ValidPath(id): ValidPath<ProductId>,
) -> Result<Json<ProductView>, ApiError> {
    let product = s.store.get_product(id).await?.ok_or(EcommerceError::NotFound("product"))?;
    Ok(Json(ProductView::at(&product, Utc::now())))
}
