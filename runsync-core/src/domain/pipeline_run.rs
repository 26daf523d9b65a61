//! Pipeline run record domain types

use serde::{Deserialize, Serialize};

use crate::domain::meta::ObjectMeta;
use crate::domain::pipeline::PipelineSpec;
use crate::keys::{RUN_ID_ANNOTATION, SCM_REF_NAME_LABEL};

/// Declarative record of a single run mirrored from the CI engine
///
/// The record is created when its run shows up in the CI engine and deleted
/// when the run disappears. It is never updated in between.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRunRecord {
    pub metadata: ObjectMeta,
    pub spec: PipelineRunSpec,
}

/// Snapshot of the pipeline at the time the record was created
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineRunSpec {
    pub pipeline_ref: PipelineReference,
    pub pipeline_spec: PipelineSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scm: Option<ScmRef>,
}

/// Reference to the pipeline a run belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineReference {
    pub namespace: String,
    pub name: String,
}

/// SCM reference a multi-branch run was built from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScmRef {
    pub ref_name: String,
}

impl PipelineRunRecord {
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// CI engine run ID, if the record has been bound to a run
    pub fn run_id(&self) -> Option<&str> {
        self.metadata.annotation(RUN_ID_ANNOTATION)
    }

    /// SCM reference name, set only for records of multi-branch pipelines
    pub fn branch_ref(&self) -> Option<&str> {
        self.metadata.label(SCM_REF_NAME_LABEL)
    }
}
