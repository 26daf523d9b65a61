//! Commands module
//!
//! Defines all CLI commands and their handlers.

mod controller;
mod pipeline;

use anyhow::{Context, Result};
use clap::Subcommand;
use runsync_client::JenkinsClient;
use runsync_controller::config::Config;
use runsync_controller::db;
use runsync_controller::repository::{
    EventWriter, PgEventSink, PgPipelineStore, PgRunRecordStore, spawn_event_writer,
};
use runsync_controller::source::CiRunSource;
use runsync_controller::PipelineRunSynchronizer;
use runsync_core::domain::meta::ObjectKey;
use sqlx::PgPool;
use std::sync::Arc;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Run the controller until interrupted
    Run,
    /// Run a single sync pass for one pipeline
    Reconcile {
        /// Pipeline as <namespace>/<name>
        key: ObjectKey,
    },
    /// Set the sync request marker on a pipeline
    Trigger {
        /// Pipeline as <namespace>/<name>
        key: ObjectKey,
    },
    /// Create or replace a pipeline from a JSON file
    Apply {
        /// Path to the pipeline JSON file
        file: String,
    },
    /// Create the database schema
    Migrate,
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, database_url: Option<String>) -> Result<()> {
    match command {
        Commands::Run => {
            let config = load_config(database_url)?;
            controller::run(config).await
        }
        Commands::Reconcile { key } => {
            let config = load_config(database_url)?;
            pipeline::reconcile(&config, &key).await
        }
        Commands::Trigger { key } => {
            let pool = connect(database_url).await?;
            pipeline::trigger(pool, &key).await
        }
        Commands::Apply { file } => {
            let pool = connect(database_url).await?;
            pipeline::apply(pool, &file).await
        }
        Commands::Migrate => {
            let pool = connect(database_url).await?;
            db::run_migrations(&pool)
                .await
                .context("Failed to run database migrations")?;
            println!("Database schema is up to date");
            Ok(())
        }
    }
}

/// Loads the full controller configuration, preferring `--database-url`
fn load_config(database_url: Option<String>) -> Result<Config> {
    let config = Config::from_lookup(|name| match name {
        "DATABASE_URL" => database_url.clone().or_else(|| std::env::var(name).ok()),
        _ => std::env::var(name).ok(),
    })?;
    config.validate()?;
    Ok(config)
}

async fn connect(database_url: Option<String>) -> Result<PgPool> {
    let database_url = database_url
        .ok_or_else(|| anyhow::anyhow!("DATABASE_URL environment variable not set"))?;
    db::create_pool(&database_url)
        .await
        .context("Failed to create database pool")
}

/// Wires a synchronizer to PostgreSQL and the CI engine
///
/// Events go through the returned writer; call [`EventWriter::finish`] after
/// dropping the synchronizer so queued events are written before exit.
fn build_synchronizer(config: &Config, pool: &PgPool) -> (PipelineRunSynchronizer, EventWriter) {
    let mut client =
        JenkinsClient::new(config.jenkins_url.clone()).with_page_size(config.run_page_size);
    if let (Some(user), Some(token)) = (&config.jenkins_user, &config.jenkins_token) {
        client = client.with_credentials(user.clone(), token.clone());
    }

    let (recorder, writer) = spawn_event_writer(PgEventSink::new(pool.clone()));

    let synchronizer = PipelineRunSynchronizer::new(
        Arc::new(PgPipelineStore::new(pool.clone())),
        Arc::new(PgRunRecordStore::new(pool.clone())),
        Arc::new(CiRunSource::new(client)),
        Arc::new(recorder),
    )
    .with_backoff(config.conflict_backoff());

    (synchronizer, writer)
}
