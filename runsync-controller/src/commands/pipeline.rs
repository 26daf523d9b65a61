//! Pipeline command handlers
//!
//! One-shot operator commands: run a single sync pass, request a sync, and
//! register a pipeline definition.

use anyhow::{Context, Result};
use chrono::Utc;
use colored::*;
use runsync_controller::config::Config;
use runsync_controller::db;
use runsync_controller::repository::{PgPipelineStore, PipelineStore};
use runsync_controller::service::retry::{Backoff, retry_on_conflict};
use runsync_controller::{SyncOutcome, SyncSummary};
use runsync_core::domain::meta::ObjectKey;
use runsync_core::domain::pipeline::PipelineDefinition;
use sqlx::PgPool;

use super::build_synchronizer;

/// Run one sync pass and print what it changed
pub async fn reconcile(config: &Config, key: &ObjectKey) -> Result<()> {
    let pool = db::create_pool(&config.database_url)
        .await
        .context("Failed to create database pool")?;
    let (synchronizer, events) = build_synchronizer(config, &pool);

    let result = synchronizer.reconcile(key).await;
    drop(synchronizer);
    events.finish().await;

    let outcome = result.with_context(|| format!("Sync of {} failed", key))?;

    match outcome {
        SyncOutcome::PipelineGone => {
            println!("{} Pipeline {} not found", "!".yellow(), key);
        }
        SyncOutcome::NotRequested => {
            println!(
                "{} Pipeline {} has no sync request; run `runsync trigger {}` first",
                "-".dimmed(),
                key,
                key
            );
        }
        SyncOutcome::Synced(summary) => print_summary(key, &summary),
    }

    Ok(())
}

fn print_summary(key: &ObjectKey, summary: &SyncSummary) {
    let mark = if summary.failures() == 0 {
        "✓".green()
    } else {
        "✗".red()
    };
    println!("{} Synced {}", mark, key.to_string().bold());
    println!("  {}  {}", "Created:".bold(), summary.created);
    println!("  {}  {}", "Deleted:".bold(), summary.deleted);

    for failure in &summary.failed_creates {
        println!("  {} create {}: {}", "✗".red(), failure.target, failure.error);
    }
    for failure in &summary.failed_deletes {
        println!("  {} delete {}: {}", "✗".red(), failure.target, failure.error);
    }

    if !summary.acknowledged {
        println!("  {}", "Sync request was already cleared".dimmed());
    }
}

/// Set the sync request marker, retrying on concurrent updates
pub async fn trigger(pool: PgPool, key: &ObjectKey) -> Result<()> {
    let store = PgPipelineStore::new(pool);
    let store = &store;

    let updated = retry_on_conflict(&Backoff::default(), || async move {
        let mut pipeline = store.get(key).await?;
        pipeline.request_sync(Utc::now().to_rfc3339());
        store.update(&pipeline).await
    })
    .await
    .with_context(|| format!("Failed to request sync of {}", key))?;

    println!(
        "{} Sync requested for {} (resource version {})",
        "✓".green(),
        key,
        updated.metadata.resource_version
    );
    Ok(())
}

/// Create or replace a pipeline from a JSON file
pub async fn apply(pool: PgPool, path: &str) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read pipeline file: {}", path))?;
    let pipeline: PipelineDefinition = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse pipeline file: {}", path))?;

    if pipeline.metadata.name.is_empty() || pipeline.metadata.namespace.is_empty() {
        anyhow::bail!("Pipeline file {} must set metadata.namespace and metadata.name", path);
    }

    let stored = PgPipelineStore::new(pool)
        .apply(&pipeline)
        .await
        .context("Failed to store pipeline")?;

    println!(
        "{} Applied {} pipeline {}",
        "✓".green(),
        stored.spec.pipeline_type,
        stored.metadata.key().to_string().bold()
    );
    Ok(())
}
