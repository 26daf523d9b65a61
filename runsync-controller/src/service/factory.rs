//! Bare record construction

use runsync_core::domain::meta::{ObjectMeta, OwnerReference};
use runsync_core::domain::pipeline::PipelineDefinition;
use runsync_core::domain::pipeline_run::{
    PipelineReference, PipelineRunRecord, PipelineRunSpec, ScmRef,
};
use runsync_core::domain::run::ExternalRun;
use runsync_core::keys::{PIPELINE_KIND, PIPELINE_NAME_LABEL, RUN_ID_ANNOTATION, SCM_REF_NAME_LABEL};

/// Builds the minimal record mirroring `run`
///
/// The record is owned by `pipeline` through a controller reference that
/// blocks the pipeline's deletion while the record exists, and carries a copy
/// of the pipeline's current spec. The branch is only recorded for
/// multi-branch pipelines. The name is left to the store (`generate_name`).
pub fn new_bare_pipeline_run(pipeline: &PipelineDefinition, run: &ExternalRun) -> PipelineRunRecord {
    let mut metadata = ObjectMeta {
        generate_name: Some(format!("{}-", pipeline.metadata.name)),
        namespace: pipeline.metadata.namespace.clone(),
        ..Default::default()
    };
    metadata.owner_references.push(OwnerReference {
        kind: PIPELINE_KIND.to_string(),
        name: pipeline.metadata.name.clone(),
        uid: pipeline.metadata.uid.unwrap_or_default(),
        controller: true,
        block_owner_deletion: true,
    });
    metadata.labels.insert(
        PIPELINE_NAME_LABEL.to_string(),
        pipeline.metadata.name.clone(),
    );
    metadata
        .annotations
        .insert(RUN_ID_ANNOTATION.to_string(), run.run_id.clone());

    let mut scm = None;
    if pipeline.is_multi_branch() {
        metadata
            .labels
            .insert(SCM_REF_NAME_LABEL.to_string(), run.branch_ref.clone());
        scm = Some(ScmRef {
            ref_name: run.branch_ref.clone(),
        });
    }

    PipelineRunRecord {
        metadata,
        spec: PipelineRunSpec {
            pipeline_ref: PipelineReference {
                namespace: pipeline.metadata.namespace.clone(),
                name: pipeline.metadata.name.clone(),
            },
            pipeline_spec: pipeline.spec.clone(),
            scm,
        },
    }
}
