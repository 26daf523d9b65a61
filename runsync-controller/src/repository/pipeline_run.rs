//! Pipeline Run Repository
//!
//! PostgreSQL store for pipeline run records.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use runsync_core::domain::meta::{ObjectKey, ObjectMeta, OwnerReference};
use runsync_core::domain::pipeline_run::{PipelineRunRecord, PipelineRunSpec};
use runsync_core::keys::PIPELINE_RUN_KIND;
use sqlx::PgPool;
use sqlx::types::Json;
use std::collections::BTreeMap;
use uuid::Uuid;

use super::{RecordSelector, RunRecordStore, StoreError, name_for_create};

const RUN_COLUMNS: &str = "namespace, name, uid, generate_name, labels, annotations, \
                           owner_references, spec, resource_version, created_at";

/// PostgreSQL implementation of [`RunRecordStore`]
#[derive(Debug, Clone)]
pub struct PgRunRecordStore {
    pool: PgPool,
}

impl PgRunRecordStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RunRecordStore for PgRunRecordStore {
    async fn list(&self, selector: &RecordSelector) -> Result<Vec<PipelineRunRecord>, StoreError> {
        let query = format!(
            r#"
            SELECT {}
            FROM pipeline_runs
            WHERE namespace = $1 AND labels @> $2
            ORDER BY name ASC
            "#,
            RUN_COLUMNS
        );

        let rows = sqlx::query_as::<_, RunRow>(&query)
            .bind(&selector.namespace)
            .bind(Json(&selector.labels))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn create(&self, record: &PipelineRunRecord) -> Result<PipelineRunRecord, StoreError> {
        let name = name_for_create(&record.metadata)?;
        let key = ObjectKey::new(record.metadata.namespace.clone(), name.clone());
        let query = format!(
            r#"
            INSERT INTO pipeline_runs (
                namespace, name, uid, generate_name, labels, annotations,
                owner_references, spec, resource_version, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, 1, $9)
            RETURNING {}
            "#,
            RUN_COLUMNS
        );

        let result = sqlx::query_as::<_, RunRow>(&query)
            .bind(&key.namespace)
            .bind(&key.name)
            .bind(Uuid::new_v4())
            .bind(&record.metadata.generate_name)
            .bind(Json(&record.metadata.labels))
            .bind(Json(&record.metadata.annotations))
            .bind(Json(&record.metadata.owner_references))
            .bind(Json(&record.spec))
            .bind(Utc::now())
            .fetch_one(&self.pool)
            .await;

        match result {
            Ok(row) => Ok(row.into()),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
                Err(StoreError::AlreadyExists {
                    kind: PIPELINE_RUN_KIND,
                    key,
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn delete(&self, record: &PipelineRunRecord) -> Result<(), StoreError> {
        // A uid precondition keeps us from deleting a newer record that reused the name
        let result = sqlx::query(
            r#"
            DELETE FROM pipeline_runs
            WHERE namespace = $1 AND name = $2 AND ($3::uuid IS NULL OR uid = $3)
            "#,
        )
        .bind(&record.metadata.namespace)
        .bind(&record.metadata.name)
        .bind(record.metadata.uid)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                kind: PIPELINE_RUN_KIND,
                key: record.metadata.key(),
            });
        }

        Ok(())
    }
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct RunRow {
    namespace: String,
    name: String,
    uid: Uuid,
    generate_name: Option<String>,
    labels: Json<BTreeMap<String, String>>,
    annotations: Json<BTreeMap<String, String>>,
    owner_references: Json<Vec<OwnerReference>>,
    spec: Json<PipelineRunSpec>,
    resource_version: i64,
    created_at: DateTime<Utc>,
}

impl From<RunRow> for PipelineRunRecord {
    fn from(row: RunRow) -> Self {
        PipelineRunRecord {
            metadata: ObjectMeta {
                name: row.name,
                generate_name: row.generate_name,
                namespace: row.namespace,
                uid: Some(row.uid),
                labels: row.labels.0,
                annotations: row.annotations.0,
                owner_references: row.owner_references.0,
                resource_version: row.resource_version,
                creation_timestamp: Some(row.created_at),
            },
            spec: row.spec.0,
        }
    }
}
