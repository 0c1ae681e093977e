//! Storefront order service

use anyhow::{Context, Result};
use std::sync::Arc;
use storefront_orders::artifacts::{ArtifactStore, FsArtifactStore, MemoryArtifactStore};
use storefront_orders::config::Config;
use storefront_orders::http::{router, AppState};
use storefront_orders::publisher::{EventPublisher, LogPublisher, NatsPublisher};
use storefront_orders::storage::{MemoryStore, PgStore, Store};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let store = PgStore::connect(url, config.max_connections).await.context("connecting to Postgres")?;
            store.migrate().await.context("running migrations")?;
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set, keeping carts and orders in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let artifacts: Arc<dyn ArtifactStore> = match &config.artifact_dir {
        Some(dir) => {
            tokio::fs::create_dir_all(dir).await.with_context(|| format!("creating {}", dir.display()))?;
            Arc::new(FsArtifactStore::new(dir.clone()))
        }
        None => Arc::new(MemoryArtifactStore::new()),
    };

    let publisher: Arc<dyn EventPublisher> = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => Arc::new(NatsPublisher::new(client, config.subject_prefix.clone())),
            Err(e) => {
                tracing::warn!(error = %e, "NATS unavailable, order events will only be logged");
                Arc::new(LogPublisher)
            }
        },
        None => Arc::new(LogPublisher),
    };

    let app = router(AppState::new(store, artifacts, publisher));

    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("storefront-orders listening on {}", addr);
    axum::serve(tokio::net::TcpListener::bind(&addr).await?, app).await?;
    Ok(())
}
