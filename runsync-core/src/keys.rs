//! Well-known annotation and label keys
//!
//! These keys are part of the stored schema. Run identity matching depends on
//! them, so renaming any of them orphans every existing record.

/// Annotation on a pipeline requesting that its runs be synchronized.
///
/// Only presence matters; the value is advisory (usually a timestamp).
pub const SYNC_REQUEST_ANNOTATION: &str = "devops.runsync.io/request-to-sync-pipelineruns";

/// Annotation on a pipeline run record holding the CI engine's run ID.
pub const RUN_ID_ANNOTATION: &str = "devops.runsync.io/jenkins-pipelinerun-id";

/// Label on a pipeline run record holding the SCM reference (branch) name.
pub const SCM_REF_NAME_LABEL: &str = "devops.runsync.io/scm-ref-name";

/// Label on a pipeline run record naming the pipeline that owns it.
pub const PIPELINE_NAME_LABEL: &str = "devops.runsync.io/pipeline";

/// Kind string used in owner references and events for pipelines.
pub const PIPELINE_KIND: &str = "Pipeline";

/// Kind string used in events for pipeline run records.
pub const PIPELINE_RUN_KIND: &str = "PipelineRun";
