//! Controller command
//!
//! Starts the resync loop and workers, and stops them on Ctrl-C.

use anyhow::{Context, Result};
use runsync_controller::config::Config;
use runsync_controller::db;
use runsync_controller::repository::PgPipelineStore;
use runsync_controller::scheduler::{Controller, WorkQueue};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info};

use super::build_synchronizer;

const REQUEUE_BASE_DELAY: Duration = Duration::from_millis(5);

pub async fn run(config: Config) -> Result<()> {
    info!("Starting Runsync controller");
    info!(
        "Loaded configuration: jenkins_url={}, workers={}, resync_interval={:?}",
        config.jenkins_url, config.workers, config.resync_interval
    );

    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to create database pool")?;
    info!("Database connection pool created");

    db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let (synchronizer, events) = build_synchronizer(&config, &pool);
    let synchronizer = Arc::new(synchronizer);
    let queue = Arc::new(WorkQueue::new(REQUEUE_BASE_DELAY, config.max_requeue_delay));
    let controller = Arc::new(Controller::new(
        synchronizer,
        Arc::new(PgPipelineStore::new(pool)),
        queue,
        config.resync_interval,
        config.workers,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => info!("Received Ctrl-C, shutting down"),
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
        let _ = shutdown_tx.send(true);
    });

    // The controller owns the last recorder; once it returns the writer can drain
    let result = controller.run(shutdown_rx).await;
    let written = events.finish().await;
    info!("Flushed event writer ({} events recorded)", written);

    result
}
