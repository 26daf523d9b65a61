//! External run source
//!
//! The CI engine is the source of truth for which runs exist. The
//! synchronizer only sees it through [`ExternalRunSource`].

use async_trait::async_trait;
use runsync_client::{ClientError, JenkinsClient};
use runsync_core::domain::pipeline::PipelineDefinition;
use runsync_core::domain::run::ExternalRun;
use thiserror::Error;

/// Errors returned by an external run source
#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("run source unavailable: {0}")]
    Unavailable(String),
}

/// Lists the runs the CI engine currently holds for a pipeline
#[async_trait]
pub trait ExternalRunSource: Send + Sync {
    /// Lists every run of `pipeline` in a single logical call
    ///
    /// Runs of multi-branch pipelines carry their branch; runs of plain
    /// pipelines have an empty branch.
    async fn list_runs(&self, pipeline: &PipelineDefinition) -> Result<Vec<ExternalRun>, SourceError>;
}

/// [`ExternalRunSource`] backed by the CI engine's HTTP API
#[derive(Debug, Clone)]
pub struct CiRunSource {
    client: JenkinsClient,
}

impl CiRunSource {
    pub fn new(client: JenkinsClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ExternalRunSource for CiRunSource {
    async fn list_runs(&self, pipeline: &PipelineDefinition) -> Result<Vec<ExternalRun>, SourceError> {
        let multi_branch = pipeline.is_multi_branch();
        let summaries = self
            .client
            .list_runs(&pipeline.metadata.namespace, &pipeline.metadata.name)
            .await?;

        Ok(summaries
            .iter()
            .map(|s| s.to_external_run(multi_branch))
            .collect())
    }
}
