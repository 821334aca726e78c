use std::sync::Arc;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::signal::{
    ctrl_c,
    unix::{signal, SignalKind},
};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use booking_engine::booking::models::Resource;
use booking_engine::booking::{BookingService, BookingStore, InMemoryStore, ResourceStore};
use booking_engine::cache::{AppCache, CachedResourceStore};
use booking_engine::config::Config;
use booking_engine::db::PgStore;
use booking_engine::payments::{HttpPaymentGateway, PaymentGateway, UnconfiguredGateway};
use booking_engine::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("booking_engine=info,tower_http=info")),
        )
        .init();

    let config = Config::from_env()?;

    let (resources, bookings) = init_stores(&config).await?;

    let cache = AppCache::new(config.resource_cache_ttl);
    let resources: Arc<dyn ResourceStore> =
        Arc::new(CachedResourceStore::new(resources, cache.clone()));

    let payments: Arc<dyn PaymentGateway> = match &config.payment_api_key {
        Some(key) => Arc::new(
            HttpPaymentGateway::new(&config.payment_api_base, key, config.payment_timeout)
                .context("Failed to build payment client")?,
        ),
        None => {
            warn!("PAYMENT_API_KEY not set, bookings will fail until a processor is configured");
            Arc::new(UnconfiguredGateway)
        }
    };

    let service = BookingService::new(resources, bookings, payments, config.payment_timeout);
    let state = AppState {
        bookings: Arc::new(service),
        cache,
    };
    let app = router(state, config.request_timeout);

    info!("Binding to {}", config.bind_address);
    let listener = TcpListener::bind(&config.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_address))?;
    info!("Server running on {}", config.bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shut down");
    Ok(())
}

async fn init_stores(
    config: &Config,
) -> anyhow::Result<(Arc<dyn ResourceStore>, Arc<dyn BookingStore>)> {
    match &config.database_url {
        Some(url) => {
            let store = PgStore::connect(url, config.database_max_connections)
                .await
                .context("Failed to connect to database")?;
            sqlx::migrate!("./migrations")
                .run(store.pool())
                .await
                .context("Failed to run migrations")?;
            info!("Connected to database");

            let store = Arc::new(store);
            let resources: Arc<dyn ResourceStore> = store.clone();
            let bookings: Arc<dyn BookingStore> = store;
            Ok((resources, bookings))
        }
        None => {
            warn!("DATABASE_URL not set, using in-memory store; bookings are lost on restart");
            let store = Arc::new(InMemoryStore::new());

            if let Some(path) = &config.resource_seed_file {
                let raw = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("Failed to read {}", path))?;
                let seed: Vec<Resource> = serde_json::from_str(&raw)
                    .with_context(|| format!("Invalid resources in {}", path))?;
                info!("Seeding {} resources from {}", seed.len(), path);
                for resource in seed {
                    store.put_resource(resource).await;
                }
            }

            let resources: Arc<dyn ResourceStore> = store.clone();
            let bookings: Arc<dyn BookingStore> = store;
            Ok((resources, bookings))
        }
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match ctrl_c().await {
            Ok(()) => info!("Received Ctrl+C, shutting down"),
            Err(e) => {
                error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                error!("Failed to install terminate handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
