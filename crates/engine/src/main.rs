use std::sync::Arc;

use anyhow::Result;
use domain::services::{LogNotificationPort, MarketplaceStore, NotificationPort};
use persistence::{InMemoryStore, PgMarketplaceStore};
use tracing::{info, warn};

use ops_engine::app::create_app;
use ops_engine::config::Config;
use ops_engine::engine::OpsEngine;
use ops_engine::jobs::{claim_cleanup, ClaimCleanupJob};
use ops_engine::middleware::{init_metrics, logging::init_logging};
use ops_engine::services::HttpNotificationPort;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // `--dry-run` runs against an in-memory store and logs messages instead
    // of sending them.
    let dry_run = std::env::args().skip(1).any(|arg| arg == "--dry-run");

    let config = Config::load()?;
    init_logging(&config.logging)?;
    init_metrics()?;

    info!(
        "Starting marketplace operations engine v{}",
        env!("CARGO_PKG_VERSION")
    );

    let mut cleanup_job = None;
    let store: Arc<dyn MarketplaceStore> = if dry_run {
        warn!("Dry run: using in-memory store, nothing is persisted");
        Arc::new(InMemoryStore::new())
    } else {
        config.require_database()?;
        let pool = persistence::db::create_pool(&config.pool_config()).await?;

        info!("Running database migrations...");
        sqlx::migrate!("../persistence/src/migrations")
            .run(&pool)
            .await?;
        info!("Migrations completed");

        let store = Arc::new(PgMarketplaceStore::new(pool));
        cleanup_job = Some(ClaimCleanupJob::new(Arc::clone(&store)));
        store
    };

    let notifier: Arc<dyn NotificationPort> =
        if !dry_run && config.notifications.provider == "http" {
            Arc::new(HttpNotificationPort::new(&config.notifications)?)
        } else {
            Arc::new(LogNotificationPort)
        };

    let engine = Arc::new(OpsEngine::new(store, notifier, config.engine_settings()?));
    if let Some(job) = cleanup_job {
        engine
            .register_job(
                claim_cleanup::JOB_NAME,
                claim_cleanup::DEFAULT_EXPRESSION,
                Arc::new(job),
            )
            .await?;
    }
    engine.init().await?;

    let app = create_app(Arc::clone(&engine), config.request_timeout());

    let addr = config.socket_addr()?;
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    engine.shutdown(engine.shutdown_timeout()).await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
