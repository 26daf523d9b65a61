//! Sync diff
//!
//! Computes which records to create and which to delete so the record set
//! mirrors the CI engine's run list. Pure and deterministic: output order
//! follows input order.

use runsync_core::domain::pipeline_run::PipelineRunRecord;
use runsync_core::domain::run::ExternalRun;
use std::collections::HashSet;

use super::finder::RunIndex;

/// Runs that have no record yet
pub fn runs_to_create(index: &RunIndex<'_>, runs: &[ExternalRun], multi_branch: bool) -> Vec<ExternalRun> {
    runs.iter()
        .filter(|run| index.find(run, multi_branch).is_none())
        .cloned()
        .collect()
}

/// Records no run resolves to
///
/// A record is kept only if some run finds it through the index. When two
/// records share a key the index holds just the later one, so the earlier one
/// is selected here even though its run still exists. A record without a run
/// ID annotation is keyed on the empty run ID, so no run reaches it.
pub fn runs_to_delete(
    index: &RunIndex<'_>,
    runs: &[ExternalRun],
    records: &[PipelineRunRecord],
    multi_branch: bool,
) -> Vec<PipelineRunRecord> {
    let reachable: HashSet<&str> = runs
        .iter()
        .filter_map(|run| index.find(run, multi_branch))
        .map(|record| record.name())
        .collect();

    records
        .iter()
        .filter(|record| !reachable.contains(record.name()))
        .cloned()
        .collect()
}

/// Creates and deletes needed to bring the records in line with the runs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncPlan {
    pub to_create: Vec<ExternalRun>,
    pub to_delete: Vec<PipelineRunRecord>,
}

impl SyncPlan {
    pub fn compute(records: &[PipelineRunRecord], runs: &[ExternalRun], multi_branch: bool) -> Self {
        let index = RunIndex::build(records);
        Self {
            to_create: runs_to_create(&index, runs, multi_branch),
            to_delete: runs_to_delete(&index, runs, records, multi_branch),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_create.is_empty() && self.to_delete.is_empty()
    }
}
