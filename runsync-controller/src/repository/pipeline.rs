//! Pipeline Repository
//!
//! PostgreSQL store for pipeline definitions.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use runsync_core::domain::meta::{ObjectKey, ObjectMeta};
use runsync_core::domain::pipeline::{PipelineDefinition, PipelineSpec};
use runsync_core::keys::{PIPELINE_KIND, SYNC_REQUEST_ANNOTATION};
use sqlx::PgPool;
use sqlx::types::Json;
use std::collections::BTreeMap;
use uuid::Uuid;

use super::{PipelineStore, StoreError};

const PIPELINE_COLUMNS: &str =
    "namespace, name, uid, labels, annotations, spec, resource_version, created_at";

/// PostgreSQL implementation of [`PipelineStore`]
#[derive(Debug, Clone)]
pub struct PgPipelineStore {
    pool: PgPool,
}

impl PgPipelineStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create or replace a pipeline, keeping its uid if it already exists
    ///
    /// Used by operators to register pipelines; it bypasses the resource
    /// version check on purpose, like a forced apply.
    pub async fn apply(&self, pipeline: &PipelineDefinition) -> Result<PipelineDefinition, StoreError> {
        let query = format!(
            r#"
            INSERT INTO pipelines (namespace, name, uid, labels, annotations, spec, resource_version, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, 1, $7)
            ON CONFLICT (namespace, name) DO UPDATE
            SET labels = EXCLUDED.labels,
                annotations = EXCLUDED.annotations,
                spec = EXCLUDED.spec,
                resource_version = pipelines.resource_version + 1
            RETURNING {}
            "#,
            PIPELINE_COLUMNS
        );

        let row = sqlx::query_as::<_, PipelineRow>(&query)
            .bind(&pipeline.metadata.namespace)
            .bind(&pipeline.metadata.name)
            .bind(Uuid::new_v4())
            .bind(Json(&pipeline.metadata.labels))
            .bind(Json(&pipeline.metadata.annotations))
            .bind(Json(&pipeline.spec))
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await?;

        Ok(row.into())
    }

    async fn exists(&self, key: &ObjectKey) -> Result<bool, StoreError> {
        let found: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM pipelines WHERE namespace = $1 AND name = $2")
                .bind(&key.namespace)
                .bind(&key.name)
                .fetch_optional(&self.pool)
                .await?;

        Ok(found.is_some())
    }
}

#[async_trait]
impl PipelineStore for PgPipelineStore {
    async fn get(&self, key: &ObjectKey) -> Result<PipelineDefinition, StoreError> {
        let query = format!(
            "SELECT {} FROM pipelines WHERE namespace = $1 AND name = $2",
            PIPELINE_COLUMNS
        );

        let row = sqlx::query_as::<_, PipelineRow>(&query)
            .bind(&key.namespace)
            .bind(&key.name)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Into::into).ok_or_else(|| StoreError::NotFound {
            kind: PIPELINE_KIND,
            key: key.clone(),
        })
    }

    async fn update(&self, pipeline: &PipelineDefinition) -> Result<PipelineDefinition, StoreError> {
        let key = pipeline.metadata.key();
        let query = format!(
            r#"
            UPDATE pipelines
            SET labels = $1, annotations = $2, spec = $3, resource_version = resource_version + 1
            WHERE namespace = $4 AND name = $5 AND resource_version = $6
            RETURNING {}
            "#,
            PIPELINE_COLUMNS
        );

        let row = sqlx::query_as::<_, PipelineRow>(&query)
            .bind(Json(&pipeline.metadata.labels))
            .bind(Json(&pipeline.metadata.annotations))
            .bind(Json(&pipeline.spec))
            .bind(&key.namespace)
            .bind(&key.name)
            .bind(pipeline.metadata.resource_version)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(row.into()),
            None if self.exists(&key).await? => Err(StoreError::Conflict {
                kind: PIPELINE_KIND,
                key,
                resource_version: pipeline.metadata.resource_version,
            }),
            None => Err(StoreError::NotFound {
                kind: PIPELINE_KIND,
                key,
            }),
        }
    }

    async fn list_sync_requested(&self) -> Result<Vec<ObjectKey>, StoreError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT namespace, name
            FROM pipelines
            WHERE annotations ? $1
            ORDER BY namespace, name
            "#,
        )
        .bind(SYNC_REQUEST_ANNOTATION)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(namespace, name)| ObjectKey::new(namespace, name))
            .collect())
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct PipelineRow {
    namespace: String,
    name: String,
    uid: Uuid,
    labels: Json<BTreeMap<String, String>>,
    annotations: Json<BTreeMap<String, String>>,
    spec: Json<PipelineSpec>,
    resource_version: i64,
    created_at: DateTime<Utc>,
}

impl From<PipelineRow> for PipelineDefinition {
    fn from(row: PipelineRow) -> Self {
        PipelineDefinition {
            metadata: ObjectMeta {
                name: row.name,
                generate_name: None,
                namespace: row.namespace,
                uid: Some(row.uid),
                labels: row.labels.0,
                annotations: row.annotations.0,
                owner_references: Vec::new(),
                resource_version: row.resource_version,
                creation_timestamp: Some(row.created_at),
            },
            spec: row.spec.0,
        }
    }
}
