//! Service Module
//!
//! Sync logic for the controller.
//! Identity matching, diffing and record construction are pure functions over
//! in-memory collections; only the synchronizer talks to stores and the run
//! source.

pub mod diff;
pub mod factory;
pub mod finder;
pub mod identity;
pub mod retry;
pub mod synchronizer;

// Re-export for convenience
pub use diff::{SyncPlan, runs_to_create, runs_to_delete};
pub use factory::new_bare_pipeline_run;
pub use finder::RunIndex;
pub use identity::{IdentityKey, MatchStrategy};
pub use retry::{Backoff, retry_on_conflict};
pub use synchronizer::{PipelineRunSynchronizer, SyncOutcome, SyncSummary};
