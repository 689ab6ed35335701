use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use salon_queue::bookings::BookingService;
use salon_queue::config::{AppConfig, StoreBackend};
use salon_queue::notifications::{LogDispatcher, NotificationDispatcher, PgNotificationDispatcher};
use salon_queue::queue::QueueEventBus;
use salon_queue::salons::WeeklyScheduleGate;
use salon_queue::store::{EntityStore, InMemoryStore, PgStore};
use salon_queue::{create_router, db, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_level(true)
        .init();

    tracing::info!("Salon Queue API - Starting...");

    let config = AppConfig::from_env().map_err(anyhow::Error::msg)?;

    let (store, notifier): (Arc<dyn EntityStore>, Arc<dyn NotificationDispatcher>) =
        match (config.store_backend, config.database_url.as_deref()) {
            (StoreBackend::Postgres, Some(database_url)) => {
                tracing::info!("Connecting to database...");
                let pool = db::create_pool(database_url, config.db_max_connections)
                    .await
                    .context("Failed to create database pool")?;
                db::run_migrations(&pool)
                    .await
                    .context("Failed to run database migrations")?;
                (
                    Arc::new(PgStore::new(pool.clone())),
                    Arc::new(PgNotificationDispatcher::new(pool)),
                )
            }
            (StoreBackend::Postgres, None) => {
                anyhow::bail!("DATABASE_URL must be set when STORE_BACKEND=postgres")
            }
            (StoreBackend::Memory, _) => {
                tracing::warn!("Using the in-memory store; data is lost on restart");
                (Arc::new(InMemoryStore::new()), Arc::new(LogDispatcher))
            }
        };

    let service = BookingService::new(store, notifier)
        .with_hours_gate(Arc::new(WeeklyScheduleGate))
        .with_settings(config.queue_settings())
        .with_events(QueueEventBus::new(config.event_channel_capacity));
    let metrics = service.metrics().clone();

    let app = create_router(AppState::new(service));

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    tracing::info!("Salon Queue API is running on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
        })
        .await
        .context("Server error")?;

    metrics.log_summary();
    Ok(())
}
