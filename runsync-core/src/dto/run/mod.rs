//! Run listing DTOs
//!
//! Shape of one entry of the CI engine's `.../runs/` listing. Only the fields
//! the controller needs are modelled; everything else is ignored on decode.

use serde::{Deserialize, Serialize};

use crate::domain::run::ExternalRun;

/// One run as returned by the CI engine's run listing endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub id: String,

    /// Name of the job the run belongs to. For multi-branch pipelines this is
    /// the branch name.
    #[serde(default)]
    pub pipeline: Option<String>,

    #[serde(default)]
    pub state: Option<String>,

    #[serde(default)]
    pub result: Option<String>,
}

impl RunSummary {
    /// Projects the summary onto the identity the controller matches on
    ///
    /// The branch is only kept for multi-branch pipelines; for plain pipelines
    /// the `pipeline` field is just the pipeline's own name.
    pub fn to_external_run(&self, multi_branch: bool) -> ExternalRun {
        match (&self.pipeline, multi_branch) {
            (Some(branch), true) => ExternalRun::on_branch(self.id.clone(), branch.clone()),
            _ => ExternalRun::new(self.id.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ignores_unknown_fields() {
        let json = r#"{
            "_class": "io.jenkins.blueocean.rest.impl.pipeline.PipelineRunImpl",
            "id": "12",
            "pipeline": "main",
            "organization": "jenkins",
            "state": "FINISHED",
            "result": "SUCCESS"
        }"#;
        let run: RunSummary = serde_json::from_str(json).unwrap();
        assert_eq!(run.id, "12");
        assert_eq!(run.pipeline.as_deref(), Some("main"));
        assert_eq!(run.result.as_deref(), Some("SUCCESS"));
    }

    #[test]
    fn test_to_external_run_keeps_branch_only_for_multi_branch() {
        let run = RunSummary {
            id: "7".to_string(),
            pipeline: Some("feature-x".to_string()),
            state: None,
            result: None,
        };
        assert_eq!(
            run.to_external_run(true),
            ExternalRun::on_branch("7", "feature-x")
        );
        assert_eq!(run.to_external_run(false), ExternalRun::new("7"));
    }
}
