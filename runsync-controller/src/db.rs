use sqlx::{PgPool, postgres::PgPoolOptions};
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    // Create pipelines table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pipelines (
            namespace VARCHAR(253) NOT NULL,
            name VARCHAR(253) NOT NULL,
            uid UUID NOT NULL,
            labels JSONB NOT NULL DEFAULT '{}',
            annotations JSONB NOT NULL DEFAULT '{}',
            spec JSONB NOT NULL,
            resource_version BIGINT NOT NULL DEFAULT 1,
            created_at TIMESTAMPTZ NOT NULL,
            PRIMARY KEY (namespace, name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create pipeline run records table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS pipeline_runs (
            namespace VARCHAR(253) NOT NULL,
            name VARCHAR(253) NOT NULL,
            uid UUID NOT NULL,
            generate_name VARCHAR(253),
            labels JSONB NOT NULL DEFAULT '{}',
            annotations JSONB NOT NULL DEFAULT '{}',
            owner_references JSONB NOT NULL DEFAULT '[]',
            spec JSONB NOT NULL,
            resource_version BIGINT NOT NULL DEFAULT 1,
            created_at TIMESTAMPTZ NOT NULL,
            PRIMARY KEY (namespace, name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create events table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS events (
            id SERIAL PRIMARY KEY,
            kind VARCHAR(64) NOT NULL,
            namespace VARCHAR(253) NOT NULL,
            name VARCHAR(253) NOT NULL,
            event_type VARCHAR(20) NOT NULL,
            reason VARCHAR(128) NOT NULL,
            message TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Label selectors use JSONB containment
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_pipeline_runs_labels ON pipeline_runs USING GIN (labels)",
    )
    .execute(pool)
    .await?;

    // Marker scans use key existence on annotations
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_pipelines_annotations ON pipelines USING GIN (annotations)",
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_events_object ON events(namespace, name, created_at DESC)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}
