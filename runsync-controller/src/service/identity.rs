//! Run identity
//!
//! Records and CI runs are keyed independently: records by generated name,
//! runs by the CI engine's run ID (and branch, for multi-branch pipelines).
//! [`IdentityKey`] is the common key both sides are projected onto.

use runsync_core::domain::pipeline_run::PipelineRunRecord;
use runsync_core::domain::run::ExternalRun;

/// Key correlating a CI run with its record
///
/// `branch_ref` is empty whenever branches are not part of the identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey {
    pub run_id: String,
    pub branch_ref: String,
}

/// How runs and records are matched, chosen by the pipeline type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchStrategy {
    /// Run ID alone; branches are ignored on both sides
    RunId,
    /// Run ID and branch; the same run ID on two branches is two runs
    RunIdAndBranch,
}

impl MatchStrategy {
    pub fn for_pipeline(multi_branch: bool) -> Self {
        if multi_branch {
            MatchStrategy::RunIdAndBranch
        } else {
            MatchStrategy::RunId
        }
    }

    pub fn key(&self, run_id: &str, branch_ref: &str) -> IdentityKey {
        let branch_ref = match self {
            MatchStrategy::RunId => String::new(),
            MatchStrategy::RunIdAndBranch => branch_ref.to_string(),
        };
        IdentityKey {
            run_id: run_id.to_string(),
            branch_ref,
        }
    }

    pub fn key_for_run(&self, run: &ExternalRun) -> IdentityKey {
        self.key(&run.run_id, &run.branch_ref)
    }

    /// Key of a record; a missing annotation or label reads as empty
    pub fn key_for_record(&self, record: &PipelineRunRecord) -> IdentityKey {
        self.key(
            record.run_id().unwrap_or_default(),
            record.branch_ref().unwrap_or_default(),
        )
    }
}
