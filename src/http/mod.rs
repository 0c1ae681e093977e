//! JSON API over the order services.

mod actor;
mod cart;
mod error;
mod extract;
mod orders;
mod products;

pub use actor::{CurrentActor, ROLE_HEADER, USER_HEADER};
pub use error::ApiError;
pub use extract::{ValidJson, ValidPath};

use axum::routing::{get, patch, post};
use axum::{Json, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use crate::artifacts::ArtifactStore;
use crate::publisher::EventPublisher;
use crate::services::{BillingService, CartService, OrderService};
use crate::storage::Store;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub carts: CartService,
    pub orders: OrderService,
    pub billing: BillingService,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, artifacts: Arc<dyn ArtifactStore>, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            carts: CartService::new(store.clone()),
            orders: OrderService::new(store.clone(), publisher.clone()),
            billing: BillingService::new(store.clone(), artifacts, publisher),
            store,
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "storefront-orders"})) }))
        .route("/api/v1/products", get(products::list_products))
        .route("/api/v1/products/:id", get(products::get_product))
        .route("/api/v1/cart", get(cart::view_cart))
        .route("/api/v1/cart/items", post(cart::add_item))
        .route("/api/v1/cart/items/:line_id", patch(cart::update_item).delete(cart::remove_item))
        .route("/api/v1/orders", get(orders::list_orders).post(orders::create_order))
        .route("/api/v1/orders/:id", get(orders::get_order))
        .route("/api/v1/orders/:id/payment", post(orders::pay))
        .route("/api/v1/orders/:id/status", post(orders::change_status))
        .route("/api/v1/orders/:id/bill", post(orders::generate_bill).get(orders::download_bill))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
