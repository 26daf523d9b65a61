//! Error types returned by a sync pass

use runsync_core::domain::meta::ObjectKey;
use thiserror::Error;

use crate::repository::StoreError;
use crate::source::SourceError;

/// Errors that end a sync pass and ask the scheduler to retry with backoff
///
/// Missing objects and per-record apply failures are not represented here:
/// they are absorbed by the pass and only show up in logs and events.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The CI engine could not list the pipeline's runs
    #[error("failed to list runs of {pipeline}: {source}")]
    ExternalSource {
        pipeline: ObjectKey,
        #[source]
        source: SourceError,
    },

    /// The sync request marker could not be cleared without conflicting
    #[error("gave up clearing the sync request of {pipeline} after {attempts} conflicting updates")]
    ConflictRetriesExhausted { pipeline: ObjectKey, attempts: u32 },

    /// The object store failed for a reason other than a missing object
    #[error("object store error: {0}")]
    Store(#[from] StoreError),
}

impl SyncError {
    pub fn is_external_source(&self) -> bool {
        matches!(self, Self::ExternalSource { .. })
    }
}
