use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use typeset_server::{
    api,
    config::{Config, StatusBackend},
    db,
    renderer::{RenderInvoker, RenderPool},
    repository::{MemoryStatusStore, PgStatusStore, StatusStore},
    service::{QueryService, SubmissionService},
    state::AppState,
    storage::JobDirectoryStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "typeset_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Typeset Server...");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let statuses = connect_status_store(&config).await?;

    let directories = JobDirectoryStore::new(config.jobs_root.clone()).with_context(|| {
        format!(
            "Failed to prepare jobs root {}",
            config.jobs_root.display()
        )
    })?;
    tracing::info!("Job directories under {}", directories.root().display());

    let invoker = Arc::new(RenderInvoker::new(
        Arc::clone(&statuses),
        directories.clone(),
        config.renderer.clone(),
    ));
    let (pool, dispatcher) = RenderPool::start(
        invoker,
        config.renderer.max_parallel,
        config.renderer.queue_capacity,
    );

    let state = AppState::new(
        SubmissionService::new(Arc::clone(&statuses), directories.clone(), pool),
        QueryService::new(
            Arc::clone(&statuses),
            directories,
            config.renderer.artifact_file.clone(),
        ),
    );

    // Build router with all API endpoints
    let app = api::create_router(state, config.max_upload_bytes);

    tracing::info!("Listening on {}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    // Serving consumes the router; once it returns the render queue has no senders left
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Failed to start server")?;

    tracing::info!("HTTP server stopped, waiting for renders to finish");
    if let Err(e) = dispatcher.await {
        tracing::error!("Render pool task failed: {}", e);
    }

    statuses.close().await;
    tracing::info!("Typeset Server stopped");
    Ok(())
}

async fn connect_status_store(config: &Config) -> Result<Arc<dyn StatusStore>> {
    match config.status_backend {
        StatusBackend::Postgres => {
            tracing::info!("Connecting to database...");

            let pool = db::create_pool(&config.database_url, config.database_max_connections)
                .await
                .context("Failed to create database pool")?;

            tracing::info!("Database connection pool created");

            db::run_migrations(&pool)
                .await
                .context("Failed to run database migrations")?;

            let store = PgStatusStore::new(pool);
            store
                .health_check()
                .await
                .context("Status store is not reachable")?;
            Ok(Arc::new(store))
        }
        StatusBackend::Memory => {
            tracing::warn!("Using the in-memory status store; job states are lost on restart");
            Ok(Arc::new(MemoryStatusStore::new()))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
