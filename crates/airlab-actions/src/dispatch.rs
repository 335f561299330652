//! Workflow dispatch.
//!
//! The dispatch API is fire-and-forget: a 2xx response means the remote
//! accepted the trigger, but no run id comes back. The id is discovered
//! later by the poller from the run listing.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use crate::client::GithubRepo;
use crate::error::Result;

/// Inputs passed to a workflow dispatch.
///
/// The remote API requires every value to be a string; non-string values
/// go through [`DispatchInputs::insert_json`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DispatchInputs(BTreeMap<String, String>);

impl DispatchInputs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a string value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Insert a non-string value, JSON-encoded.
    pub fn insert_json<T: Serialize>(&mut self, key: impl Into<String>, value: &T) -> Result<&mut Self> {
        self.0.insert(key.into(), serde_json::to_string(value)?);
        Ok(self)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn as_map(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

/// Seam for triggering remote workflows.
#[async_trait]
pub trait WorkflowDispatch: Send + Sync {
    /// Trigger `workflow_file` on `branch`. Returns whether the trigger
    /// was accepted; failures are logged, not raised, so callers decide
    /// whether a failed dispatch is fatal.
    async fn dispatch(&self, branch: &str, workflow_file: &str, inputs: &DispatchInputs) -> bool;
}

#[async_trait]
impl WorkflowDispatch for GithubRepo {
    async fn dispatch(&self, branch: &str, workflow_file: &str, inputs: &DispatchInputs) -> bool {
        if branch.is_empty() || workflow_file.is_empty() {
            warn!("workflow dispatch rejected: branch and workflow_file are required");
            return false;
        }

        let path = format!(
            "/repos/{}/actions/workflows/{}/dispatches",
            self.repo().full_name(),
            workflow_file
        );
        let body = json!({
            "ref": branch,
            "inputs": inputs.as_map(),
        });

        match self.client().post_json(&path, &body).await {
            Ok(status) => {
                info!(
                    workflow = workflow_file,
                    branch,
                    status,
                    inputs = inputs.len(),
                    "workflow dispatched"
                );
                true
            }
            Err(e) => {
                warn!(workflow = workflow_file, branch, error = %e, "workflow dispatch failed");
                false
            }
        }
    }
}
