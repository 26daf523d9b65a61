//! Runsync CI Engine Client
//!
//! A small, type-safe HTTP client for the CI engine's run history API.
//!
//! The controller only needs one thing from the CI engine: the list of runs
//! that currently exist for a pipeline. Pagination and authentication are
//! handled here so callers see a single logical call.
//!
//! # Example
//!
//! ```no_run
//! use runsync_client::JenkinsClient;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = JenkinsClient::new("http://localhost:8080/jenkins")
//!         .with_credentials("admin", "api-token");
//!
//!     let runs = client.list_runs("devops", "build-app").await?;
//!     println!("Found {} runs", runs.len());
//!     Ok(())
//! }
//! ```

pub mod error;
mod runs;

// Re-export commonly used types
pub use error::{ClientError, Result};
pub use runsync_core::dto::run::RunSummary;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

/// Default number of runs requested per page
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// HTTP client for the CI engine's run listing API
#[derive(Debug, Clone)]
pub struct JenkinsClient {
    /// Base URL of the CI engine (e.g., "http://localhost:8080/jenkins")
    base_url: String,
    /// HTTP client instance
    client: Client,
    /// Basic auth user name and API token
    credentials: Option<(String, String)>,
    /// Runs requested per page
    page_size: usize,
}

impl JenkinsClient {
    /// Create a new CI engine client
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the CI engine (e.g., "http://localhost:8080/jenkins")
    ///
    /// # Example
    /// ```
    /// use runsync_client::JenkinsClient;
    ///
    /// let client = JenkinsClient::new("http://localhost:8080/jenkins");
    /// ```
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(base_url, Client::new())
    }

    /// Create a new CI engine client with a custom HTTP client
    ///
    /// This allows you to configure timeouts, proxies, TLS settings, etc.
    ///
    /// # Arguments
    /// * `base_url` - The base URL of the CI engine
    /// * `client` - A configured reqwest Client
    pub fn with_client(base_url: impl Into<String>, client: Client) -> Self {
        let base_url = base_url.into();
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            credentials: None,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Authenticate every request with HTTP basic auth
    pub fn with_credentials(mut self, username: impl Into<String>, token: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), token.into()));
        self
    }

    /// Set the number of runs requested per page (minimum 1)
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Get the base URL of the CI engine
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    // =============================================================================
    // Request Helpers
    // =============================================================================

    fn get(&self, url: &str) -> RequestBuilder {
        let request = self.client.get(url);
        match &self.credentials {
            Some((user, token)) => request.basic_auth(user, Some(token)),
            None => request,
        }
    }

    /// Handle an API response and deserialize JSON
    ///
    /// This method checks the status code and returns an appropriate error if
    /// the request failed, or deserializes the response body if successful.
    async fn handle_response<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T> {
        let status = response.status();

        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(ClientError::api_error(status.as_u16(), error_text));
        }

        response
            .json()
            .await
            .map_err(|e| ClientError::ParseError(format!("Failed to parse JSON response: {}", e)))
    }
}
