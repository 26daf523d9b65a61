//! Run history endpoints

use crate::JenkinsClient;
use crate::error::{ClientError, Result};
use runsync_core::dto::run::RunSummary;

/// Upper bound on pages fetched for a single listing
const MAX_PAGES: usize = 1000;

impl JenkinsClient {
    // =============================================================================
    // Run History
    // =============================================================================

    /// List every run of a pipeline, across all pages
    ///
    /// For multi-branch pipelines the listing spans every branch and each
    /// entry's `pipeline` field carries the branch name.
    ///
    /// # Arguments
    /// * `namespace` - The folder (namespace) the pipeline lives in
    /// * `pipeline` - The pipeline name
    pub async fn list_runs(&self, namespace: &str, pipeline: &str) -> Result<Vec<RunSummary>> {
        let mut runs = Vec::new();

        for page in 0..MAX_PAGES {
            let url = self.runs_url(namespace, pipeline, runs.len(), self.page_size);
            let response = self.get(&url).send().await?;
            let batch: Vec<RunSummary> = self.handle_response(response).await?;

            tracing::debug!(
                "Fetched run page {} for {}/{} ({} runs)",
                page,
                namespace,
                pipeline,
                batch.len()
            );

            let last_page = batch.len() < self.page_size;
            runs.extend(batch);
            if last_page {
                return Ok(runs);
            }
        }

        Err(ClientError::TooManyPages(MAX_PAGES))
    }

    /// URL of one page of a pipeline's run listing
    pub(crate) fn runs_url(&self, namespace: &str, pipeline: &str, start: usize, limit: usize) -> String {
        format!(
            "{}/blue/rest/organizations/jenkins/pipelines/{}/pipelines/{}/runs/?start={}&limit={}",
            self.base_url, namespace, pipeline, start, limit
        )
    }
}
