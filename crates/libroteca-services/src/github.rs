//! GitHub repository adapter behind the [`DocumentSource`] capability.
//!
//! An optional second source: a repository whose tree carries PDF files.
//! The stored `origin_ref` is the tree path; downloads go through the raw
//! content host, which needs no API quota.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libroteca_core::models::{Book, SourceCandidate, UploaderSource};
use libroteca_core::{AppError, Config, DocumentSource, UploaderProfile};
use serde::Deserialize;

const API_BASE: &str = "https://api.github.com";
const RAW_BASE: &str = "https://raw.githubusercontent.com";
const USER_AGENT: &str = "libroteca";
const HTTP_TIMEOUT_SECS: u64 = 30;

pub struct GithubSource {
    http_client: reqwest::Client,
    token: Option<String>,
    owner: String,
    repo: String,
}

#[derive(Debug, Deserialize)]
struct RepoInfo {
    default_branch: String,
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    #[serde(default)]
    tree: Vec<TreeEntry>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct TreeEntry {
    path: String,
    #[serde(rename = "type")]
    entry_type: String,
}

#[derive(Debug, Deserialize)]
struct GithubUser {
    login: String,
    #[serde(default)]
    avatar_url: String,
}

impl GithubSource {
    /// Build the adapter when a repository is configured, `None` otherwise.
    pub fn from_config(config: &Config) -> Result<Option<Self>, AppError> {
        let Some((owner, repo)) = config.github_repo() else {
            return Ok(None);
        };
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| AppError::Config(format!("failed to build GitHub client: {e}")))?;
        Ok(Some(Self {
            http_client,
            token: config.github_token.clone(),
            owner: owner.to_string(),
            repo: repo.to_string(),
        }))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
        what: &str,
    ) -> Result<Option<T>, AppError> {
        let mut request = self
            .http_client
            .get(url)
            .header("User-Agent", USER_AGENT)
            .header("Accept", "application/vnd.github+json");
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::SourceAdapter(format!("failed to fetch {what}: {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(AppError::SourceAdapter(format!(
                "{what} request failed: {status} - {error_text}"
            )));
        }

        let parsed = response
            .json::<T>()
            .await
            .map_err(|e| AppError::SourceAdapter(format!("failed to decode {what}: {e}")))?;
        Ok(Some(parsed))
    }

    async fn default_branch(&self) -> Result<String, AppError> {
        let info = self
            .get_json::<RepoInfo>(
                format!("{API_BASE}/repos/{}/{}", self.owner, self.repo),
                "repository info",
            )
            .await?
            .ok_or_else(|| {
                AppError::SourceAdapter(format!("repository {}/{} not found", self.owner, self.repo))
            })?;
        Ok(info.default_branch)
    }
}

#[async_trait]
impl DocumentSource for GithubSource {
    fn kind(&self) -> UploaderSource {
        UploaderSource::Github
    }

    async fn fetch_candidates(
        &self,
        _since: Option<DateTime<Utc>>,
    ) -> Result<Vec<SourceCandidate>, AppError> {
        // The tree listing carries no timestamps, so every sync returns the
        // full set and dedup drops what is already stored.
        let branch = self.default_branch().await?;
        let tree = self
            .get_json::<TreeResponse>(
                format!(
                    "{API_BASE}/repos/{}/{}/git/trees/{branch}?recursive=1",
                    self.owner, self.repo
                ),
                "repository tree",
            )
            .await?
            .ok_or_else(|| {
                AppError::SourceAdapter(format!("branch '{branch}' has no tree listing"))
            })?;
        if tree.truncated {
            tracing::warn!(
                owner = %self.owner,
                repo = %self.repo,
                "Repository tree listing was truncated, some files may be missed"
            );
        }

        let candidates = candidates_from_tree(&tree.tree, &self.owner, Utc::now());
        tracing::info!(
            owner = %self.owner,
            repo = %self.repo,
            count = candidates.len(),
            "Collected PDF files from repository tree"
        );
        Ok(candidates)
    }

    async fn resolve_download_url(&self, book: &Book) -> Result<Option<String>, AppError> {
        let Some(path) = book.origin_ref.as_deref() else {
            tracing::warn!(book_id = book.id, "Record has no origin reference");
            return Ok(None);
        };
        let branch = self.default_branch().await?;
        Ok(Some(raw_download_url(&self.owner, &self.repo, &branch, path)?))
    }

    async fn fetch_profile(&self, uploader_id: &str) -> Result<Option<UploaderProfile>, AppError> {
        let user = self
            .get_json::<GithubUser>(format!("{API_BASE}/users/{uploader_id}"), "user profile")
            .await?;
        Ok(user.map(|user| UploaderProfile {
            uploader_id: uploader_id.to_string(),
            name: user.login,
            avatar: user.avatar_url,
        }))
    }
}

fn candidates_from_tree(
    entries: &[TreeEntry],
    owner: &str,
    now: DateTime<Utc>,
) -> Vec<SourceCandidate> {
    entries
        .iter()
        .filter(|entry| entry.entry_type == "blob" && is_pdf_path(&entry.path))
        .map(|entry| SourceCandidate {
            uploader_id: owner.to_string(),
            file: entry.path.clone(),
            origin_ref: Some(entry.path.clone()),
            date: now,
            source: UploaderSource::Github,
        })
        .collect()
}

fn is_pdf_path(path: &str) -> bool {
    Path::new(path)
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

fn raw_download_url(owner: &str, repo: &str, branch: &str, path: &str) -> Result<String, AppError> {
    let base = reqwest::Url::parse(&format!("{RAW_BASE}/{owner}/{repo}/{branch}/"))
        .map_err(|e| AppError::SourceAdapter(format!("bad raw content base URL: {e}")))?;
    let url = base
        .join(path)
        .map_err(|e| AppError::SourceAdapter(format!("bad file path '{path}': {e}")))?;
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(path: &str, entry_type: &str) -> TreeEntry {
        TreeEntry {
            path: path.to_string(),
            entry_type: entry_type.to_string(),
        }
    }

    #[test]
    fn test_candidates_keep_only_pdf_blobs() {
        let now = Utc::now();
        let entries = vec![
            entry("books/rayuela.pdf", "blob"),
            entry("books", "tree"),
            entry("README.md", "blob"),
            entry("books/El Aleph.PDF", "blob"),
        ];
        let candidates = candidates_from_tree(&entries, "octocat", now);
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].file, "books/rayuela.pdf");
        assert_eq!(candidates[0].uploader_id, "octocat");
        assert_eq!(candidates[0].origin_ref.as_deref(), Some("books/rayuela.pdf"));
        assert_eq!(candidates[0].date, now);
        assert_eq!(candidates[1].source, UploaderSource::Github);
    }

    #[test]
    fn test_raw_download_url_percent_encodes() {
        let url = raw_download_url("octocat", "books", "main", "dir/El Aleph.pdf").unwrap();
        assert_eq!(
            url,
            "https://raw.githubusercontent.com/octocat/books/main/dir/El%20Aleph.pdf"
        );
    }

    #[test]
    fn test_tree_response_tolerates_missing_fields() {
        let tree: TreeResponse = serde_json::from_str(r#"{"sha": "abc"}"#).unwrap();
        assert!(tree.tree.is_empty());
        assert!(!tree.truncated);
    }
}
