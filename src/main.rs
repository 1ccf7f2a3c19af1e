// Main entry point - Dependency injection and server setup
mod domain;
mod application;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc, time::Duration};
use anyhow::Context;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use crate::application::broadcaster::Broadcaster;
use crate::application::credentials::StaticApiKeys;
use crate::application::fleet_service::FleetService;
use crate::application::ingestion_service::IngestionService;
use crate::application::reconciler::Reconciler;
use crate::application::repository::{FleetDirectory, TripRepository, VehicleStateStore};
use crate::application::tracking_service::TrackingService;
use crate::application::trip_sessions::TripSessionManager;
use crate::infrastructure::config::{load_app_config, StorageBackend};
use crate::infrastructure::gps_provider::HttpGpsProvider;
use crate::infrastructure::journal_repository::JournalRepository;
use crate::infrastructure::memory_repository::InMemoryRepository;
use crate::presentation::app_state::AppState;
use crate::presentation::routes::router;

struct Repositories {
    store: Arc<dyn VehicleStateStore>,
    trips: Arc<dyn TripRepository>,
    fleet: Arc<dyn FleetDirectory>,
}

impl Repositories {
    fn from_backend<R>(repo: Arc<R>) -> Self
    where
        R: VehicleStateStore + TripRepository + FleetDirectory + 'static,
    {
        Self {
            store: repo.clone(),
            trips: repo.clone(),
            fleet: repo,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let config = load_app_config()?;

    // Create repositories (infrastructure layer)
    let repos = match config.storage.backend {
        StorageBackend::Memory => {
            tracing::info!("using in-memory storage");
            Repositories::from_backend(Arc::new(InMemoryRepository::new()))
        }
        StorageBackend::Journal => {
            let journal = JournalRepository::open(&config.storage.path).await?;
            tracing::info!(path = %journal.path().display(), "using journal storage");
            Repositories::from_backend(Arc::new(journal))
        }
    };

    let credentials = StaticApiKeys::new(config.auth.api_keys.iter().cloned());
    if credentials.is_empty() {
        tracing::warn!("no API keys configured; all device pushes will be rejected");
    }

    // Create services (application layer)
    let broadcaster = Arc::new(Broadcaster::new(config.broadcast.observer_buffer));
    broadcaster.on_notification(|n| {
        tracing::trace!(vehicle_id = %n.vehicle_id(), "telemetry notification");
    });
    let trip_sessions = TripSessionManager::new(repos.trips.clone());
    let ingestion = IngestionService::new(
        repos.store.clone(),
        trip_sessions.clone(),
        broadcaster.clone(),
        Arc::new(credentials),
    );
    let tracking = TrackingService::new(repos.store.clone(), trip_sessions);
    let fleet = FleetService::new(repos.fleet.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reconciler_task = if config.reconciler.enabled {
        let provider = HttpGpsProvider::new(&config.reconciler)?;
        let reconciler = Reconciler::new(
            Arc::new(provider),
            repos.fleet.clone(),
            ingestion.clone(),
            Duration::from_secs(config.reconciler.interval_secs.max(1)),
        );
        Some(tokio::spawn(reconciler.run(shutdown_rx)))
    } else {
        tracing::info!("reconciler disabled");
        None
    };

    // Create application state
    let state = Arc::new(AppState {
        ingestion,
        tracking,
        fleet,
        broadcaster,
    });

    // Build router (presentation layer)
    let app = router(state);

    // Start server
    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address {}", config.server.bind))?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!(%addr, "fleet-telemetry listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to listen for shutdown signal");
                std::future::pending::<()>().await;
            }
            tracing::info!("shutdown requested");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    if let Some(task) = reconciler_task {
        let _ = task.await;
    }

    Ok(())
}
