//! In-memory object store
//!
//! Implements every store trait over plain maps, with the same resource
//! version semantics as the PostgreSQL stores. Faults can be injected per
//! operation, which is what the synchronizer tests rely on.

use async_trait::async_trait;
use chrono::Utc;
use runsync_core::domain::event::{Event, EventType, InvolvedObject};
use runsync_core::domain::meta::ObjectKey;
use runsync_core::domain::pipeline::PipelineDefinition;
use runsync_core::domain::pipeline_run::PipelineRunRecord;
use runsync_core::keys::{PIPELINE_KIND, PIPELINE_RUN_KIND};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{
    EventRecorder, PipelineStore, RecordSelector, RunRecordStore, StoreError, name_for_create,
};

/// Number of mutating calls the store has received, failed ones included
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub creates: usize,
    pub deletes: usize,
    pub updates: usize,
}

#[derive(Default)]
struct Inner {
    pipelines: BTreeMap<ObjectKey, PipelineDefinition>,
    records: BTreeMap<ObjectKey, PipelineRunRecord>,
    events: Vec<Event>,
    version: i64,
    stats: StoreStats,
    failing_run_ids: HashSet<String>,
    failing_deletes: HashSet<String>,
    fail_list: bool,
    conflicting_updates: usize,
}

impl Inner {
    fn next_version(&mut self) -> i64 {
        self.version += 1;
        self.version
    }
}

/// Thread-safe in-memory implementation of the store traits
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Stores a pipeline as-is, assigning uid, resource version and timestamp
    pub fn insert_pipeline(&self, mut pipeline: PipelineDefinition) -> PipelineDefinition {
        let mut inner = self.lock();
        pipeline.metadata.uid.get_or_insert_with(Uuid::new_v4);
        pipeline.metadata.resource_version = inner.next_version();
        pipeline.metadata.creation_timestamp.get_or_insert_with(Utc::now);
        inner
            .pipelines
            .insert(pipeline.metadata.key(), pipeline.clone());
        pipeline
    }

    /// Stores a record under its given name, bypassing name generation
    pub fn insert_record(&self, mut record: PipelineRunRecord) -> PipelineRunRecord {
        let mut inner = self.lock();
        record.metadata.uid.get_or_insert_with(Uuid::new_v4);
        record.metadata.resource_version = inner.next_version();
        inner.records.insert(record.metadata.key(), record.clone());
        record
    }

    pub fn remove_pipeline(&self, key: &ObjectKey) -> Option<PipelineDefinition> {
        self.lock().pipelines.remove(key)
    }

    /// Edits a stored pipeline in place, as another client would
    ///
    /// Bumps the resource version but not [`StoreStats::updates`], which only
    /// counts calls made through [`PipelineStore::update`].
    pub fn modify_pipeline(&self, key: &ObjectKey, edit: impl FnOnce(&mut PipelineDefinition)) -> bool {
        let mut inner = self.lock();
        let version = inner.next_version();
        match inner.pipelines.get_mut(key) {
            Some(pipeline) => {
                edit(pipeline);
                pipeline.metadata.resource_version = version;
                true
            }
            None => false,
        }
    }

    pub fn remove_record(&self, key: &ObjectKey) -> Option<PipelineRunRecord> {
        self.lock().records.remove(key)
    }

    pub fn pipeline(&self, key: &ObjectKey) -> Option<PipelineDefinition> {
        self.lock().pipelines.get(key).cloned()
    }

    /// Every stored record, ordered by namespace and name
    pub fn records(&self) -> Vec<PipelineRunRecord> {
        self.lock().records.values().cloned().collect()
    }

    pub fn events(&self) -> Vec<Event> {
        self.lock().events.clone()
    }

    pub fn stats(&self) -> StoreStats {
        self.lock().stats
    }

    // =============================================================================
    // Fault Injection
    // =============================================================================

    /// Makes `create` fail for records annotated with `run_id`
    pub fn fail_creates_for_run(&self, run_id: impl Into<String>) {
        self.lock().failing_run_ids.insert(run_id.into());
    }

    /// Makes `delete` fail for the record named `name`
    pub fn fail_deletes_for(&self, name: impl Into<String>) {
        self.lock().failing_deletes.insert(name.into());
    }

    /// Makes record listing fail until reset
    pub fn fail_record_list(&self, fail: bool) {
        self.lock().fail_list = fail;
    }

    /// Simulates a concurrent writer racing the next `count` pipeline updates
    ///
    /// Each raced update bumps the stored resource version and fails with a
    /// conflict, as if another client had written first.
    pub fn conflict_next_updates(&self, count: usize) {
        self.lock().conflicting_updates = count;
    }

    pub fn clear_faults(&self) {
        let mut inner = self.lock();
        inner.failing_run_ids.clear();
        inner.failing_deletes.clear();
        inner.fail_list = false;
        inner.conflicting_updates = 0;
    }
}

#[async_trait]
impl PipelineStore for InMemoryStore {
    async fn get(&self, key: &ObjectKey) -> Result<PipelineDefinition, StoreError> {
        self.lock()
            .pipelines
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: PIPELINE_KIND,
                key: key.clone(),
            })
    }

    async fn update(&self, pipeline: &PipelineDefinition) -> Result<PipelineDefinition, StoreError> {
        let mut inner = self.lock();
        inner.stats.updates += 1;

        let key = pipeline.metadata.key();
        if !inner.pipelines.contains_key(&key) {
            return Err(StoreError::NotFound {
                kind: PIPELINE_KIND,
                key,
            });
        }

        if inner.conflicting_updates > 0 {
            inner.conflicting_updates -= 1;
            let version = inner.next_version();
            if let Some(stored) = inner.pipelines.get_mut(&key) {
                stored.metadata.resource_version = version;
            }
        }

        let version = inner.next_version();
        let stored = inner
            .pipelines
            .get_mut(&key)
            .ok_or_else(|| StoreError::NotFound {
                kind: PIPELINE_KIND,
                key: key.clone(),
            })?;

        if stored.metadata.resource_version != pipeline.metadata.resource_version {
            return Err(StoreError::Conflict {
                kind: PIPELINE_KIND,
                key,
                resource_version: pipeline.metadata.resource_version,
            });
        }

        let mut updated = pipeline.clone();
        updated.metadata.uid = stored.metadata.uid;
        updated.metadata.creation_timestamp = stored.metadata.creation_timestamp;
        updated.metadata.resource_version = version;
        *stored = updated.clone();
        Ok(updated)
    }

    async fn list_sync_requested(&self) -> Result<Vec<ObjectKey>, StoreError> {
        Ok(self
            .lock()
            .pipelines
            .values()
            .filter(|p| p.has_sync_request())
            .map(|p| p.metadata.key())
            .collect())
    }
}

#[async_trait]
impl RunRecordStore for InMemoryStore {
    async fn list(&self, selector: &RecordSelector) -> Result<Vec<PipelineRunRecord>, StoreError> {
        let inner = self.lock();
        if inner.fail_list {
            return Err(StoreError::Unavailable("record listing disabled".to_string()));
        }

        Ok(inner
            .records
            .values()
            .filter(|r| selector.matches(&r.metadata))
            .cloned()
            .collect())
    }

    async fn create(&self, record: &PipelineRunRecord) -> Result<PipelineRunRecord, StoreError> {
        let mut inner = self.lock();
        inner.stats.creates += 1;

        if let Some(run_id) = record.run_id() {
            if inner.failing_run_ids.contains(run_id) {
                return Err(StoreError::Unavailable(format!(
                    "create rejected for run {}",
                    run_id
                )));
            }
        }

        let name = name_for_create(&record.metadata)?;
        let key = ObjectKey::new(record.metadata.namespace.clone(), name.clone());
        if inner.records.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                kind: PIPELINE_RUN_KIND,
                key,
            });
        }

        let mut created = record.clone();
        created.metadata.name = name;
        created.metadata.uid = Some(Uuid::new_v4());
        created.metadata.resource_version = inner.next_version();
        created.metadata.creation_timestamp = Some(Utc::now());
        inner.records.insert(key, created.clone());
        Ok(created)
    }

    async fn delete(&self, record: &PipelineRunRecord) -> Result<(), StoreError> {
        let mut inner = self.lock();
        inner.stats.deletes += 1;

        if inner.failing_deletes.contains(record.name()) {
            return Err(StoreError::Unavailable(format!(
                "delete rejected for {}",
                record.name()
            )));
        }

        let key = record.metadata.key();
        let same_object = inner.records.get(&key).is_some_and(|stored| {
            record.metadata.uid.is_none() || stored.metadata.uid == record.metadata.uid
        });
        if !same_object {
            return Err(StoreError::NotFound {
                kind: PIPELINE_RUN_KIND,
                key,
            });
        }

        inner.records.remove(&key);
        Ok(())
    }
}

impl EventRecorder for InMemoryStore {
    fn emit(&self, object: &InvolvedObject, event_type: EventType, reason: &str, message: &str) {
        self.lock().events.push(Event {
            involved_object: object.clone(),
            event_type,
            reason: reason.to_string(),
            message: message.to_string(),
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use runsync_core::domain::meta::ObjectMeta;
    use runsync_core::domain::pipeline::PipelineSpec;

    fn pipeline() -> PipelineDefinition {
        PipelineDefinition::new(ObjectMeta::new("devops", "build-app"), PipelineSpec::default())
    }

    #[tokio::test]
    async fn test_update_rejects_stale_version() {
        let store = InMemoryStore::new();
        let stored = store.insert_pipeline(pipeline());

        let mut first = stored.clone();
        first.request_sync("1");
        let updated = store.update(&first).await.unwrap();
        assert!(updated.metadata.resource_version > stored.metadata.resource_version);

        let mut stale = stored;
        stale.request_sync("2");
        let err = store.update(&stale).await.unwrap_err();
        assert!(err.is_conflict());
    }

    #[tokio::test]
    async fn test_update_missing_pipeline_is_not_found() {
        let store = InMemoryStore::new();
        let err = store.update(&pipeline()).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_conflict_injection_bumps_version() {
        let store = InMemoryStore::new();
        let stored = store.insert_pipeline(pipeline());
        store.conflict_next_updates(1);

        assert!(store.update(&stored).await.unwrap_err().is_conflict());

        let fresh = store.get(&stored.metadata.key()).await.unwrap();
        assert_ne!(fresh.metadata.resource_version, stored.metadata.resource_version);
        assert!(store.update(&fresh).await.is_ok());
        assert_eq!(store.stats().updates, 2);
    }

    #[tokio::test]
    async fn test_create_generates_name_and_list_selects() {
        let store = InMemoryStore::new();
        let owner = store.insert_pipeline(pipeline());
        let run = runsync_core::domain::run::ExternalRun::new("7");
        let record = crate::service::factory::new_bare_pipeline_run(&owner, &run);

        let created = store.create(&record).await.unwrap();
        assert!(created.name().starts_with("build-app-"));
        assert!(created.metadata.uid.is_some());

        let listed = store
            .list(&RecordSelector::for_pipeline(&owner))
            .await
            .unwrap();
        assert_eq!(listed, vec![created]);
    }

    #[tokio::test]
    async fn test_delete_checks_uid() {
        let store = InMemoryStore::new();
        let owner = store.insert_pipeline(pipeline());
        let run = runsync_core::domain::run::ExternalRun::new("7");
        let created = store
            .create(&crate::service::factory::new_bare_pipeline_run(&owner, &run))
            .await
            .unwrap();

        let mut impostor = created.clone();
        impostor.metadata.uid = Some(Uuid::new_v4());
        assert!(store.delete(&impostor).await.unwrap_err().is_not_found());

        store.delete(&created).await.unwrap();
        assert!(store.records().is_empty());
        assert!(store.delete(&created).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_list_sync_requested() {
        let store = InMemoryStore::new();
        store.insert_pipeline(pipeline());
        let mut marked = pipeline();
        marked.metadata.name = "deploy-app".to_string();
        marked.request_sync("now");
        store.insert_pipeline(marked);

        let keys = store.list_sync_requested().await.unwrap();
        assert_eq!(keys, vec![ObjectKey::new("devops", "deploy-app")]);
    }
}
