//! Storefront - headless order pipeline served over JSON

use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Arc;
use storefront::ports::{DocumentStore, InMemoryDocumentStore, LogNotifier, NatsNotifier, NotificationSink, SimulatedGateway};
use storefront::{api, AppConfig, Storefront};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer()).init();
    let config = AppConfig::from_env()?;

    let store: Arc<dyn DocumentStore> = match &config.seed_file {
        Some(path) => {
            let raw = tokio::fs::read_to_string(path).await.with_context(|| format!("reading seed file {}", path.display()))?;
            let root: Value = serde_json::from_str(&raw).with_context(|| format!("parsing seed file {}", path.display()))?;
            tracing::info!(path = %path.display(), "Seeded document store");
            Arc::new(InMemoryDocumentStore::with_root(root))
        }
        None => Arc::new(InMemoryDocumentStore::new()),
    };

    let notifier: Arc<dyn NotificationSink> = match &config.nats_url {
        Some(url) => match async_nats::connect(url.as_str()).await {
            Ok(client) => {
                tracing::info!(%url, prefix = %config.nats_subject_prefix, "Publishing notifications to NATS");
                Arc::new(NatsNotifier::new(client, config.nats_subject_prefix.clone()))
            }
            Err(error) => {
                tracing::warn!(%url, %error, "NATS unavailable, logging notifications instead");
                Arc::new(LogNotifier)
            }
        },
        None => Arc::new(LogNotifier),
    };

    let gateway = Arc::new(SimulatedGateway::with_latency(config.payment_latency));
    let storefront = Arc::new(Storefront::new(store, gateway, notifier, config.storefront_options()));

    let app = api::router(storefront).layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive());

    let address = config.bind_address();
    tracing::info!("🚀 Storefront listening on {}", address);
    axum::serve(tokio::net::TcpListener::bind(&address).await?, app).await?;
    Ok(())
}
