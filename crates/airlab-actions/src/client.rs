//! Retrying GitHub API client.
//!
//! Wraps `reqwest` with exponential backoff for retryable failures
//! (5xx, 429, transport errors) and immediate typed errors for fatal
//! ones. 404 is surfaced as [`ActionsError::NotFound`] so callers can
//! treat absence as "not there yet".

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ActionsError, Result};

/// Repository coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
}

impl RepoRef {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
        }
    }

    /// `owner/name` form used in API paths.
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// GitHub API configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// API base URL.
    pub api_base: String,
    /// Personal access token (optional for public data, required for
    /// dispatch).
    pub token: Option<String>,
    /// User-Agent header; GitHub rejects requests without one.
    pub user_agent: String,
}

impl Default for GithubConfig {
    fn default() -> Self {
        GithubConfig {
            api_base: std::env::var("GITHUB_API_URL")
                .unwrap_or_else(|_| "https://api.github.com".to_string()),
            token: std::env::var("GITHUB_TOKEN").ok(),
            user_agent: format!("airlab/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl GithubConfig {
    /// Create a config from environment variables.
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Set the authentication token.
    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }
}

/// Bounded retry with exponential backoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum number of retries (0 = no retries, run once).
    pub max_retries: u32,
    /// Base delay for exponential backoff between retries (milliseconds).
    pub backoff_base_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff_base_ms: 500,
        }
    }
}

/// Classification of an HTTP response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StatusClass {
    Success,
    NotFound,
    Retryable,
    Fatal,
}

/// Classify a status code into the retry taxonomy.
pub(crate) fn classify_status(status: u16) -> StatusClass {
    match status {
        200..=299 => StatusClass::Success,
        404 => StatusClass::NotFound,
        429 => StatusClass::Retryable,
        500..=599 => StatusClass::Retryable,
        _ => StatusClass::Fatal,
    }
}

/// GitHub API client with a retry policy.
pub struct ApiClient {
    http: reqwest::Client,
    config: GithubConfig,
    policy: RetryPolicy,
}

impl ApiClient {
    /// Create a new client.
    pub fn new(config: GithubConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(ApiClient {
            http,
            config,
            policy: RetryPolicy::default(),
        })
    }

    /// Create a client from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(GithubConfig::from_env())
    }

    /// Replace the retry policy.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_base.trim_end_matches('/'), path)
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.header("Accept", "application/vnd.github+json");
        match &self.config.token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    /// GET a JSON document.
    pub async fn get_json(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<serde_json::Value> {
        let url = self.url(path);
        let response = self
            .send_with_retry(path, || {
                self.authorize(self.http.get(&url).query(query))
            })
            .await?;
        Ok(response.json().await?)
    }

    /// POST a JSON body; returns the response status code.
    pub async fn post_json(&self, path: &str, body: &serde_json::Value) -> Result<u16> {
        let url = self.url(path);
        let response = self
            .send_with_retry(path, || self.authorize(self.http.post(&url).json(body)))
            .await?;
        Ok(response.status().as_u16())
    }

    /// Send a request, retrying retryable failures with exponential
    /// backoff. Fatal statuses raise immediately with the status code
    /// attached; 404 maps to [`ActionsError::NotFound`].
    async fn send_with_retry<F>(&self, what: &str, build: F) -> Result<reqwest::Response>
    where
        F: Fn() -> reqwest::RequestBuilder,
    {
        let max_attempts = self.policy.max_retries + 1;
        let mut last = String::new();

        for attempt in 1..=max_attempts {
            match build().send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    match classify_status(status) {
                        StatusClass::Success => {
                            debug!(what, attempt, status, "github api request ok");
                            return Ok(response);
                        }
                        StatusClass::NotFound => {
                            return Err(ActionsError::NotFound(what.to_string()));
                        }
                        StatusClass::Fatal => {
                            let mut message = response.text().await.unwrap_or_default();
                            message.truncate(200);
                            return Err(ActionsError::Api { status, message });
                        }
                        StatusClass::Retryable => {
                            last = format!("status {status}");
                        }
                    }
                }
                Err(e) => {
                    last = e.to_string();
                }
            }

            if attempt == max_attempts {
                return Err(ActionsError::RetriesExhausted {
                    attempts: max_attempts,
                    last,
                });
            }

            warn!(what, attempt, error = %last, "retryable github api failure; backing off");
            let delay = Duration::from_millis(self.policy.backoff_base_ms * 2u64.pow(attempt - 1));
            tokio::time::sleep(delay).await;
        }

        unreachable!("retry loop returns within the attempt budget");
    }
}

/// One repository's view of the API: dispatch, run listing, and contents
/// operations are implemented against this handle in their own modules.
pub struct GithubRepo {
    client: Arc<ApiClient>,
    repo: RepoRef,
}

impl GithubRepo {
    pub fn new(client: Arc<ApiClient>, repo: RepoRef) -> Self {
        Self { client, repo }
    }

    pub fn repo(&self) -> &RepoRef {
        &self.repo
    }

    pub(crate) fn client(&self) -> &ApiClient {
        &self.client
    }
}
