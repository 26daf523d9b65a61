//! External run projection

use serde::{Deserialize, Serialize};

/// A run as reported by the CI engine
///
/// Read-only and never cached: every sync pass fetches a fresh list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalRun {
    /// Run ID, unique per pipeline (and per branch for multi-branch pipelines)
    pub run_id: String,

    /// Branch the run belongs to. Empty when the pipeline is not multi-branch.
    #[serde(default)]
    pub branch_ref: String,
}

impl ExternalRun {
    pub fn new(run_id: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            branch_ref: String::new(),
        }
    }

    pub fn on_branch(run_id: impl Into<String>, branch_ref: impl Into<String>) -> Self {
        Self {
            run_id: run_id.into(),
            branch_ref: branch_ref.into(),
        }
    }
}

impl std::fmt::Display for ExternalRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.branch_ref.is_empty() {
            write!(f, "#{}", self.run_id)
        } else {
            write!(f, "{}#{}", self.branch_ref, self.run_id)
        }
    }
}
