//! Pipeline run synchronizer
//!
//! Drives one sync pass for one pipeline:
//!
//! 1. Load the pipeline; stop quietly if it is gone.
//! 2. Stop quietly unless the sync request marker is set.
//! 3. List the pipeline's records and the CI engine's runs.
//! 4. Diff them, then apply every create and every delete, collecting
//!    per-record failures instead of stopping at the first one.
//! 5. Clear the marker with a conflict-retried read-modify-write.
//! 6. Emit one summary event.
//!
//! Passes are idempotent: a pass cut short before the marker is cleared is
//! simply run again, and finds less (or nothing) left to do.

use runsync_core::domain::event::{EventType, InvolvedObject};
use runsync_core::domain::meta::ObjectKey;
use runsync_core::domain::pipeline::PipelineDefinition;
use runsync_core::domain::pipeline_run::PipelineRunRecord;
use runsync_core::domain::run::ExternalRun;
use runsync_core::keys::PIPELINE_KIND;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::repository::{EventRecorder, PipelineStore, RecordSelector, RunRecordStore, StoreError};
use crate::service::diff::SyncPlan;
use crate::service::factory::new_bare_pipeline_run;
use crate::service::retry::{Backoff, retry_on_conflict};
use crate::source::ExternalRunSource;

/// Event reason for a completed pass
pub const REASON_SYNCED: &str = "PipelineRunsSynced";

/// Event reason for a pass that could not list the CI engine's runs
pub const REASON_LIST_FAILED: &str = "FailedListRuns";

/// Event reason for a pass whose changes could not be acknowledged
pub const REASON_ACK_FAILED: &str = "FailedAcknowledgeSync";

/// Result of a pass that did not fail
///
/// None of these ask for a timed requeue: the pass is re-run only when the
/// marker is set again or when it returned an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The pipeline no longer exists
    PipelineGone,
    /// The pipeline carries no sync request; nothing was read or written
    NotRequested,
    /// The pass ran and the marker was acknowledged
    Synced(SyncSummary),
}

/// A record create or delete that failed during a pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyFailure {
    /// Run (for creates) or record name (for deletes)
    pub target: String,
    pub error: String,
}

/// What a pass changed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub created: usize,
    pub deleted: usize,
    pub failed_creates: Vec<ApplyFailure>,
    pub failed_deletes: Vec<ApplyFailure>,
    /// Whether this pass removed the marker (false if someone else already had)
    pub acknowledged: bool,
}

impl SyncSummary {
    pub fn failures(&self) -> usize {
        self.failed_creates.len() + self.failed_deletes.len()
    }

    fn message(&self) -> String {
        format!(
            "Synchronized pipeline runs: {} created, {} deleted, {} failed",
            self.created,
            self.deleted,
            self.failures()
        )
    }
}

/// Keeps a pipeline's run records in line with the CI engine
pub struct PipelineRunSynchronizer {
    pipelines: Arc<dyn PipelineStore>,
    records: Arc<dyn RunRecordStore>,
    source: Arc<dyn ExternalRunSource>,
    recorder: Arc<dyn EventRecorder>,
    backoff: Backoff,
}

impl PipelineRunSynchronizer {
    pub fn new(
        pipelines: Arc<dyn PipelineStore>,
        records: Arc<dyn RunRecordStore>,
        source: Arc<dyn ExternalRunSource>,
        recorder: Arc<dyn EventRecorder>,
    ) -> Self {
        Self {
            pipelines,
            records,
            source,
            recorder,
            backoff: Backoff::default(),
        }
    }

    /// Overrides the conflict retry schedule used to clear the marker
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    /// Runs one sync pass for the pipeline at `key`
    ///
    /// Returns an error only when the CI engine could not be listed, when the
    /// marker could not be cleared within the retry bound, or when the store
    /// failed outright. Missing objects and per-record failures are absorbed.
    pub async fn reconcile(&self, key: &ObjectKey) -> Result<SyncOutcome, SyncError> {
        let pipeline = match self.pipelines.get(key).await {
            Ok(pipeline) => pipeline,
            Err(e) if e.is_not_found() => {
                debug!("Pipeline {} not found, nothing to sync", key);
                return Ok(SyncOutcome::PipelineGone);
            }
            Err(e) => return Err(e.into()),
        };

        if !pipeline.has_sync_request() {
            debug!("Pipeline {} has no sync request", key);
            return Ok(SyncOutcome::NotRequested);
        }

        let records = self
            .records
            .list(&RecordSelector::for_pipeline(&pipeline))
            .await?;

        let runs = match self.source.list_runs(&pipeline).await {
            Ok(runs) => runs,
            Err(source) => {
                self.recorder.emit(
                    &involved(key),
                    EventType::Warning,
                    REASON_LIST_FAILED,
                    &format!("Failed to list runs from the CI engine: {}", source),
                );
                return Err(SyncError::ExternalSource {
                    pipeline: key.clone(),
                    source,
                });
            }
        };

        let multi_branch = pipeline.is_multi_branch();
        let plan = SyncPlan::compute(&records, &runs, multi_branch);
        debug!(
            "Pipeline {}: {} records, {} runs, {} to create, {} to delete",
            key,
            records.len(),
            runs.len(),
            plan.to_create.len(),
            plan.to_delete.len()
        );

        let mut summary = SyncSummary::default();
        self.apply_creates(&pipeline, &plan.to_create, &mut summary)
            .await;
        self.apply_deletes(&plan.to_delete, &mut summary).await;

        summary.acknowledged = match self.acknowledge(key).await {
            Ok(acknowledged) => acknowledged,
            Err(e) if e.is_not_found() => {
                debug!("Pipeline {} vanished before acknowledging", key);
                return Ok(SyncOutcome::PipelineGone);
            }
            Err(e) if e.is_conflict() => {
                self.recorder.emit(
                    &involved(key),
                    EventType::Warning,
                    REASON_ACK_FAILED,
                    &summary.message(),
                );
                return Err(SyncError::ConflictRetriesExhausted {
                    pipeline: key.clone(),
                    attempts: self.backoff.steps.max(1),
                });
            }
            Err(e) => return Err(e.into()),
        };

        self.recorder.emit(
            &involved(key),
            EventType::Normal,
            REASON_SYNCED,
            &summary.message(),
        );
        info!(
            "Synced pipeline {}: {} created, {} deleted, {} failed",
            key,
            summary.created,
            summary.deleted,
            summary.failures()
        );

        Ok(SyncOutcome::Synced(summary))
    }

    async fn apply_creates(&self, pipeline: &PipelineDefinition, runs: &[ExternalRun], summary: &mut SyncSummary) {
        for run in runs {
            let record = new_bare_pipeline_run(pipeline, run);
            match self.records.create(&record).await {
                Ok(created) => {
                    debug!("Created {} for run {}", created.name(), run);
                    summary.created += 1;
                }
                Err(e) => {
                    warn!(
                        "Failed to create record for run {} of {}: {}",
                        run,
                        pipeline.metadata.key(),
                        e
                    );
                    summary.failed_creates.push(ApplyFailure {
                        target: run.to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    async fn apply_deletes(&self, records: &[PipelineRunRecord], summary: &mut SyncSummary) {
        for record in records {
            match self.records.delete(record).await {
                Ok(()) => {
                    debug!("Deleted {}", record.metadata.key());
                    summary.deleted += 1;
                }
                Err(e) if e.is_not_found() => {
                    debug!("{} already deleted", record.metadata.key());
                    summary.deleted += 1;
                }
                Err(e) => {
                    warn!("Failed to delete {}: {}", record.metadata.key(), e);
                    summary.failed_deletes.push(ApplyFailure {
                        target: record.name().to_string(),
                        error: e.to_string(),
                    });
                }
            }
        }
    }

    /// Clears the marker on a freshly read copy of the pipeline
    ///
    /// Returns `false` when the marker had already been removed.
    async fn acknowledge(&self, key: &ObjectKey) -> Result<bool, StoreError> {
        let pipelines = &self.pipelines;
        retry_on_conflict(&self.backoff, || async move {
            let mut latest = pipelines.get(key).await?;
            if !latest.clear_sync_request() {
                return Ok(false);
            }
            pipelines.update(&latest).await?;
            Ok(true)
        })
        .await
    }
}

fn involved(key: &ObjectKey) -> InvolvedObject {
    InvolvedObject {
        kind: PIPELINE_KIND.to_string(),
        key: key.clone(),
    }
}
