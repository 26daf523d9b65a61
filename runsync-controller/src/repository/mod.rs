//! Repository Module
//!
//! Object store access for the controller.
//! Each store handles one kind of object; every write that can race with
//! another writer goes through the resource version guard.
//!
//! All stores are trait-based so the sync logic can run against PostgreSQL in
//! production and the in-memory store (test builds only) in tests.

pub mod event;
#[cfg(test)]
pub mod memory;
pub mod pipeline;
pub mod pipeline_run;

// Re-export implementations
pub use event::{EventSink, EventWriter, PgEventSink, QueuedEventRecorder, spawn_event_writer};
#[cfg(test)]
pub use memory::InMemoryStore;
pub use pipeline::PgPipelineStore;
pub use pipeline_run::PgRunRecordStore;

use async_trait::async_trait;
use runsync_core::domain::event::{EventType, InvolvedObject};
use runsync_core::domain::meta::{ObjectKey, ObjectMeta};
use runsync_core::domain::pipeline::PipelineDefinition;
use runsync_core::domain::pipeline_run::PipelineRunRecord;
use runsync_core::keys::PIPELINE_NAME_LABEL;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors returned by object stores
#[derive(Debug, Error)]
pub enum StoreError {
    /// The object does not exist (or vanished between read and use)
    #[error("{kind} {key} not found")]
    NotFound { kind: &'static str, key: ObjectKey },

    /// The update carried a stale resource version
    #[error("{kind} {key} was modified concurrently (stale resource version {resource_version})")]
    Conflict {
        kind: &'static str,
        key: ObjectKey,
        resource_version: i64,
    },

    /// An object with the same name already exists
    #[error("{kind} {key} already exists")]
    AlreadyExists { kind: &'static str, key: ObjectKey },

    /// The object cannot be stored as given
    #[error("invalid object: {0}")]
    Invalid(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store refused the request (used for injected faults)
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

/// Namespace and label equality selector for listing run records
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSelector {
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
}

impl RecordSelector {
    /// Selects every record owned by `pipeline`
    pub fn for_pipeline(pipeline: &PipelineDefinition) -> Self {
        let mut labels = BTreeMap::new();
        labels.insert(
            PIPELINE_NAME_LABEL.to_string(),
            pipeline.metadata.name.clone(),
        );
        Self {
            namespace: pipeline.metadata.namespace.clone(),
            labels,
        }
    }

    pub fn matches(&self, meta: &ObjectMeta) -> bool {
        meta.namespace == self.namespace
            && self
                .labels
                .iter()
                .all(|(k, v)| meta.labels.get(k) == Some(v))
    }
}

/// Store for pipeline definitions
#[async_trait]
pub trait PipelineStore: Send + Sync {
    /// Loads a pipeline by key
    async fn get(&self, key: &ObjectKey) -> Result<PipelineDefinition, StoreError>;

    /// Writes back a pipeline previously read from the store
    ///
    /// Fails with [`StoreError::Conflict`] when the stored resource version no
    /// longer matches `pipeline.metadata.resource_version`. Returns the stored
    /// pipeline with its new resource version.
    async fn update(&self, pipeline: &PipelineDefinition) -> Result<PipelineDefinition, StoreError>;

    /// Keys of every pipeline currently carrying the sync request marker
    async fn list_sync_requested(&self) -> Result<Vec<ObjectKey>, StoreError>;
}

/// Store for pipeline run records
#[async_trait]
pub trait RunRecordStore: Send + Sync {
    /// Lists the records matching `selector`, ordered by name
    async fn list(&self, selector: &RecordSelector) -> Result<Vec<PipelineRunRecord>, StoreError>;

    /// Creates a record, assigning a name from `generate_name` when `name` is empty
    async fn create(&self, record: &PipelineRunRecord) -> Result<PipelineRunRecord, StoreError>;

    async fn delete(&self, record: &PipelineRunRecord) -> Result<(), StoreError>;
}

/// Sink for user-visible events
///
/// Emitting is fire-and-forget: failures are logged by the recorder and never
/// reach the caller.
pub trait EventRecorder: Send + Sync {
    fn emit(&self, object: &InvolvedObject, event_type: EventType, reason: &str, message: &str);
}

/// Appends a random suffix to a `generate_name` prefix
pub(crate) fn generate_name(prefix: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("{}{}", prefix, &suffix[..5])
}

/// Name a new object will be stored under
pub(crate) fn name_for_create(meta: &ObjectMeta) -> Result<String, StoreError> {
    match (meta.name.is_empty(), meta.generate_name.as_deref()) {
        (false, _) => Ok(meta.name.clone()),
        (true, Some(prefix)) if !prefix.is_empty() => Ok(generate_name(prefix)),
        _ => Err(StoreError::Invalid(format!(
            "object in namespace {} has neither name nor generateName",
            meta.namespace
        ))),
    }
}
