//! Pipeline domain types

use serde::{Deserialize, Serialize};

use crate::domain::meta::ObjectMeta;
use crate::keys::SYNC_REQUEST_ANNOTATION;

/// Pipeline definition
///
/// Authored by users. The controller only ever mutates the sync request
/// annotation; everything else is read-only here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineDefinition {
    pub metadata: ObjectMeta,
    pub spec: PipelineSpec,
}

/// Kind of pipeline as configured in the CI engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PipelineType {
    /// Single Jenkinsfile pipeline; runs have no branch
    #[default]
    Pipeline,
    /// One job per SCM branch; runs are identified per branch
    MultiBranchPipeline,
}

impl std::fmt::Display for PipelineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PipelineType::Pipeline => write!(f, "pipeline"),
            PipelineType::MultiBranchPipeline => write!(f, "multi-branch-pipeline"),
        }
    }
}

/// Pipeline specification
///
/// Treated as an opaque snapshot by the controller: it is copied verbatim into
/// every run record created for the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineSpec {
    #[serde(rename = "type")]
    pub pipeline_type: PipelineType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jenkinsfile: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scm: Option<ScmSource>,
}

/// Source repository of a multi-branch pipeline
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScmSource {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_id: Option<String>,
}

impl PipelineDefinition {
    pub fn new(metadata: ObjectMeta, spec: PipelineSpec) -> Self {
        Self { metadata, spec }
    }

    pub fn is_multi_branch(&self) -> bool {
        self.spec.pipeline_type == PipelineType::MultiBranchPipeline
    }

    /// Whether a run synchronization has been requested and not yet acknowledged
    pub fn has_sync_request(&self) -> bool {
        self.metadata
            .annotations
            .contains_key(SYNC_REQUEST_ANNOTATION)
    }

    /// Sets the sync request marker to `value`
    pub fn request_sync(&mut self, value: impl Into<String>) {
        self.metadata
            .annotations
            .insert(SYNC_REQUEST_ANNOTATION.to_string(), value.into());
    }

    /// Removes the sync request marker, returning whether it was present
    pub fn clear_sync_request(&mut self) -> bool {
        self.metadata
            .annotations
            .remove(SYNC_REQUEST_ANNOTATION)
            .is_some()
    }
}
