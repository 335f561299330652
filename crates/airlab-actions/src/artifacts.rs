//! Experiment artifact retrieval.
//!
//! After a run settles, result files live in the repository at a known
//! path (e.g. `.research/iteration3/`). Retrieval is deliberately
//! tolerant: a partially-successful experiment may produce only some of
//! the expected outputs, so missing files become absent fields, malformed
//! directory listings become empty lists, and unparseable metrics become
//! `None`. The one hard stop is a Git-LFS pointer: pointer files are not
//! usable content, so the whole retrieval is skipped with a warning
//! rather than partially returned.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::client::GithubRepo;
use crate::error::{ActionsError, Result};

const LFS_POINTER_PREFIX: &str = "version https://git-lfs.github.com/spec";

/// A decoded repository file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    pub path: String,
    pub text: String,
}

/// One entry of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl DirEntry {
    pub fn is_file(&self) -> bool {
        self.kind == "file"
    }
}

/// Seam for repository-contents reads.
#[async_trait]
pub trait ContentsProvider: Send + Sync {
    /// Fetch and decode one file at a branch ref. `Ok(None)` means the
    /// file does not exist (or carried no usable content).
    async fn fetch_file(&self, path: &str, git_ref: &str) -> Result<Option<FileContent>>;

    /// List a directory at a branch ref. Missing or malformed listings
    /// yield an empty list.
    async fn list_dir(&self, path: &str, git_ref: &str) -> Result<Vec<DirEntry>>;
}

/// Decode a contents-API file payload.
///
/// Returns `Ok(None)` when the payload has no content field or the
/// base64 does not decode — "no data available", not an error. Detects
/// Git-LFS pointers by content prefix and raises [`ActionsError::LfsPointer`].
pub fn decode_file_payload(value: &serde_json::Value, path: &str) -> Result<Option<FileContent>> {
    let encoded = match value.get("content").and_then(|v| v.as_str()) {
        Some(s) => s,
        None => {
            warn!(path, "contents response has no content field");
            return Ok(None);
        }
    };

    // The API wraps base64 at 60 columns.
    let cleaned: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = match BASE64.decode(cleaned.as_bytes()) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path, error = %e, "content is not valid base64");
            return Ok(None);
        }
    };

    let text = String::from_utf8_lossy(&bytes).to_string();
    if text.starts_with(LFS_POINTER_PREFIX) {
        return Err(ActionsError::LfsPointer(path.to_string()));
    }

    Ok(Some(FileContent {
        path: path.to_string(),
        text,
    }))
}

/// Parse a contents-API directory listing.
///
/// A non-list response (e.g. a single file object where a directory was
/// expected) yields an empty list rather than an error.
pub fn parse_dir_listing(value: &serde_json::Value) -> Vec<DirEntry> {
    match value.as_array() {
        Some(entries) => entries
            .iter()
            .filter_map(|entry| serde_json::from_value::<DirEntry>(entry.clone()).ok())
            .collect(),
        None => {
            warn!("directory listing response is not a list; treating as empty");
            Vec::new()
        }
    }
}

#[async_trait]
impl ContentsProvider for GithubRepo {
    async fn fetch_file(&self, path: &str, git_ref: &str) -> Result<Option<FileContent>> {
        let api_path = format!("/repos/{}/contents/{}", self.repo().full_name(), path);
        match self
            .client()
            .get_json(&api_path, &[("ref", git_ref.to_string())])
            .await
        {
            Ok(value) => decode_file_payload(&value, path),
            Err(ActionsError::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list_dir(&self, path: &str, git_ref: &str) -> Result<Vec<DirEntry>> {
        let api_path = format!("/repos/{}/contents/{}", self.repo().full_name(), path);
        match self
            .client()
            .get_json(&api_path, &[("ref", git_ref.to_string())])
            .await
        {
            Ok(value) => Ok(parse_dir_listing(&value)),
            Err(ActionsError::NotFound(_)) => Ok(Vec::new()),
            Err(e) => Err(e),
        }
    }
}

/// Collected results of one experiment run. Every field degrades to
/// empty/absent when the remote did not produce it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentArtifacts {
    pub stdout: Option<String>,
    pub stderr: Option<String>,
    pub figures: Vec<String>,
    pub metrics: Option<serde_json::Value>,
}

const FIGURE_EXTENSIONS: [&str; 4] = [".png", ".pdf", ".jpg", ".svg"];

/// Fetch the standard result set under `base_path` at `git_ref`:
/// `stdout.txt`, `stderr.txt`, `metrics.json`, and the `figures/`
/// directory listing.
///
/// An LFS pointer anywhere skips the whole retrieval and returns an
/// empty result with a warning.
pub async fn collect_results(
    provider: &dyn ContentsProvider,
    base_path: &str,
    git_ref: &str,
) -> Result<ExperimentArtifacts> {
    match collect_inner(provider, base_path, git_ref).await {
        Ok(artifacts) => Ok(artifacts),
        Err(ActionsError::LfsPointer(path)) => {
            warn!(path, "git-lfs pointer encountered; skipping result retrieval");
            Ok(ExperimentArtifacts::default())
        }
        Err(e) => Err(e),
    }
}

async fn collect_inner(
    provider: &dyn ContentsProvider,
    base_path: &str,
    git_ref: &str,
) -> Result<ExperimentArtifacts> {
    let base = base_path.trim_end_matches('/');

    let stdout = fetch_text(provider, &format!("{base}/stdout.txt"), git_ref).await?;
    let stderr = fetch_text(provider, &format!("{base}/stderr.txt"), git_ref).await?;

    let figures = provider
        .list_dir(&format!("{base}/figures"), git_ref)
        .await?
        .into_iter()
        .filter(|entry| {
            entry.is_file()
                && FIGURE_EXTENSIONS
                    .iter()
                    .any(|ext| entry.name.to_ascii_lowercase().ends_with(ext))
        })
        .map(|entry| entry.name)
        .collect();

    let metrics = match fetch_text(provider, &format!("{base}/metrics.json"), git_ref).await? {
        Some(raw) => match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, "metrics.json did not parse; treating as no data");
                None
            }
        },
        None => None,
    };

    Ok(ExperimentArtifacts {
        stdout,
        stderr,
        figures,
        metrics,
    })
}

async fn fetch_text(
    provider: &dyn ContentsProvider,
    path: &str,
    git_ref: &str,
) -> Result<Option<String>> {
    match provider.fetch_file(path, git_ref).await? {
        Some(file) => {
            debug!(path, bytes = file.text.len(), "fetched result file");
            Ok(Some(file.text))
        }
        None => {
            warn!(path, "expected result file is missing");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode(text: &str) -> String {
        BASE64.encode(text.as_bytes())
    }

    #[test]
    fn test_decode_file_payload() {
        let value = json!({ "content": encode("final loss: 0.03\n") });
        let file = decode_file_payload(&value, "stdout.txt").unwrap().unwrap();
        assert_eq!(file.text, "final loss: 0.03\n");
        assert_eq!(file.path, "stdout.txt");
    }

    #[test]
    fn test_decode_handles_wrapped_base64() {
        // The API inserts newlines into long payloads.
        let mut encoded = encode("a long line of experiment output");
        encoded.insert(8, '\n');
        let value = json!({ "content": encoded });
        let file = decode_file_payload(&value, "stdout.txt").unwrap().unwrap();
        assert!(file.text.contains("experiment output"));
    }

    #[test]
    fn test_decode_missing_content_field() {
        let value = json!({ "name": "stdout.txt" });
        assert_eq!(decode_file_payload(&value, "stdout.txt").unwrap(), None);
    }

    #[test]
    fn test_decode_invalid_base64_is_no_data() {
        let value = json!({ "content": "!!! not base64 !!!" });
        assert_eq!(decode_file_payload(&value, "stdout.txt").unwrap(), None);
    }

    #[test]
    fn test_decode_detects_lfs_pointer() {
        let pointer = "version https://git-lfs.github.com/spec/v1\noid sha256:abc\nsize 123\n";
        let value = json!({ "content": encode(pointer) });
        let err = decode_file_payload(&value, "figures/plot.png").unwrap_err();
        assert!(matches!(err, ActionsError::LfsPointer(_)));
    }

    #[test]
    fn test_parse_dir_listing() {
        let value = json!([
            { "name": "loss.png", "type": "file" },
            { "name": "checkpoints", "type": "dir" },
        ]);
        let entries = parse_dir_listing(&value);
        assert_eq!(entries.len(), 2);
        assert!(entries[0].is_file());
        assert!(!entries[1].is_file());
    }

    #[test]
    fn test_parse_dir_listing_non_list_is_empty() {
        // A single dict simulates a malformed (file-for-directory) response.
        let value = json!({ "name": "stdout.txt", "type": "file" });
        assert!(parse_dir_listing(&value).is_empty());
    }

    #[test]
    fn test_experiment_artifacts_default_is_empty() {
        let artifacts = ExperimentArtifacts::default();
        assert!(artifacts.stdout.is_none());
        assert!(artifacts.stderr.is_none());
        assert!(artifacts.figures.is_empty());
        assert!(artifacts.metrics.is_none());
    }
}
