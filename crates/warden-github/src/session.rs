use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use warden_core::{ChangedFile, FileStatus, GithubConfig, PrLocator, Result, WardenError};

use crate::boundary::{GeneratedFile, PullRequestSink, PullRequestSource};

const PER_PAGE: u32 = 100;

/// An authenticated connection to the GitHub API.
///
/// One session is opened per pipeline stage that talks to GitHub and released
/// when that stage's state is dropped.
///
/// # Examples
///
/// ```no_run
/// use warden_core::GithubConfig;
/// use warden_github::GithubSession;
///
/// let config = GithubConfig {
///     token: Some("ghp_xxxx".into()),
///     ..GithubConfig::default()
/// };
/// let session = GithubSession::new(&config).unwrap();
/// # let _ = session;
/// ```
#[derive(Debug)]
pub struct GithubSession {
    octocrab: octocrab::Octocrab,
    http: reqwest::Client,
    token: String,
    api_url: String,
    max_retries: u32,
    retry_backoff_ms: u64,
}

enum FetchFault {
    Retryable(WardenError),
    Fatal(WardenError),
}

impl GithubSession {
    /// Open a session from config, falling back to the `GITHUB_TOKEN`
    /// environment variable for the token.
    ///
    /// # Errors
    ///
    /// Returns [`WardenError::Config`] if no token is available, or
    /// [`WardenError::Github`] if a client cannot be built.
    pub fn new(config: &GithubConfig) -> Result<Self> {
        let token = match &config.token {
            Some(t) => t.clone(),
            None => std::env::var("GITHUB_TOKEN").map_err(|_| {
                WardenError::Config(
                    "GITHUB_TOKEN not set. Set [github].token in .warden.toml or the GITHUB_TOKEN env var".into(),
                )
            })?,
        };

        let api_url = config.api_url.trim_end_matches('/').to_string();

        let octocrab = octocrab::Octocrab::builder()
            .base_uri(api_url.as_str())
            .map_err(|e| WardenError::Github(format!("invalid GitHub API URL: {e}")))?
            .personal_token(token.clone())
            .build()
            .map_err(|e| WardenError::Github(format!("failed to create GitHub client: {e}")))?;

        let http = reqwest::Client::builder()
            .user_agent("warden")
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| WardenError::Github(format!("failed to create HTTP client: {e}")))?;

        debug!(api_url = %api_url, "github session opened");

        Ok(Self {
            octocrab,
            http,
            token,
            api_url,
            max_retries: config.max_retries,
            retry_backoff_ms: config.retry_backoff_ms,
        })
    }

    async fn fetch_files_page(&self, pr: &PrLocator, page: u32) -> Result<Vec<FileRecord>> {
        let url = format!(
            "{}/repos/{}/{}/pulls/{}/files?per_page={PER_PAGE}&page={page}",
            self.api_url, pr.owner, pr.repo, pr.number
        );
        let mut attempt: u32 = 0;
        loop {
            match self.try_fetch_files_page(&url).await {
                Ok(records) => return Ok(records),
                Err(FetchFault::Fatal(err)) => return Err(err),
                Err(FetchFault::Retryable(err)) => {
                    if attempt >= self.max_retries {
                        return Err(err);
                    }
                    let wait = Duration::from_millis(self.retry_backoff_ms << attempt);
                    attempt += 1;
                    warn!(
                        page,
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        error = %err,
                        "changed-file fetch failed, retrying"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    async fn try_fetch_files_page(
        &self,
        url: &str,
    ) -> std::result::Result<Vec<FileRecord>, FetchFault> {
        let response = self
            .http
            .get(url)
            .header("Accept", "application/vnd.github+json")
            .header("Authorization", format!("Bearer {}", self.token))
            .send()
            .await
            .map_err(|e| {
                FetchFault::Retryable(WardenError::Github(format!(
                    "failed to fetch changed files: {e}"
                )))
            })?;

        let status = response.status();
        if !status.is_success() {
            let retryable = status.is_server_error() || status.as_u16() == 429;
            let body = response.text().await.unwrap_or_default();
            let err = WardenError::Github(format!("GitHub API error {status}: {body}"));
            return Err(if retryable {
                FetchFault::Retryable(err)
            } else {
                FetchFault::Fatal(err)
            });
        }

        response.json::<Vec<FileRecord>>().await.map_err(|e| {
            FetchFault::Fatal(WardenError::Github(format!(
                "failed to decode changed files: {e}"
            )))
        })
    }

    async fn raw_get(&self, route: String) -> Result<serde_json::Value> {
        self.octocrab
            .get(&route, None::<&()>)
            .await
            .map_err(|e| WardenError::Github(format!("GET {route} failed: {e}")))
    }

    async fn raw_post(&self, route: String, body: serde_json::Value) -> Result<serde_json::Value> {
        self.octocrab
            .post(&route, Some(&body))
            .await
            .map_err(|e| WardenError::Github(format!("POST {route} failed: {e}")))
    }
}

impl Drop for GithubSession {
    fn drop(&mut self) {
        debug!("github session released");
    }
}

/// One entry of the `/pulls/{n}/files` listing.
///
/// GitHub omits `patch` for binary files and oversized diffs.
#[derive(Debug, Deserialize)]
struct FileRecord {
    filename: String,
    status: FileStatus,
    #[serde(default)]
    additions: u64,
    #[serde(default)]
    deletions: u64,
    #[serde(default)]
    changes: u64,
    #[serde(default)]
    patch: Option<String>,
}

impl From<FileRecord> for ChangedFile {
    fn from(record: FileRecord) -> Self {
        ChangedFile {
            filename: record.filename,
            status: record.status,
            additions: record.additions,
            deletions: record.deletions,
            changes: record.changes,
            patch: record.patch.unwrap_or_default(),
        }
    }
}

#[async_trait]
impl PullRequestSource for GithubSession {
    async fn list_changed_files(&self, pr: &PrLocator) -> Result<Vec<ChangedFile>> {
        let mut files: Vec<ChangedFile> = Vec::new();
        let mut page = 1u32;
        loop {
            let batch = self.fetch_files_page(pr, page).await?;
            let batch_len = batch.len();
            files.extend(batch.into_iter().map(ChangedFile::from));
            if batch_len < PER_PAGE as usize {
                break;
            }
            page += 1;
        }
        info!(pr = %pr, count = files.len(), "fetched changed files");
        Ok(files)
    }
}

#[async_trait]
impl PullRequestSink for GithubSession {
    async fn post_comment(&self, pr: &PrLocator, body: &str) -> Result<()> {
        let route = format!(
            "/repos/{}/{}/issues/{}/comments",
            pr.owner, pr.repo, pr.number
        );
        let payload = serde_json::json!({ "body": body });
        let _response = self.raw_post(route, payload).await?;
        info!(pr = %pr, "posted review comment");
        Ok(())
    }

    /// Commits through the git data API: one blob per file, one tree, one
    /// commit, then a head-ref update. The whole sequence targets the pull
    /// request's head branch.
    async fn commit_test_files(
        &self,
        pr: &PrLocator,
        message: &str,
        dir: &str,
        files: &[GeneratedFile],
    ) -> Result<()> {
        if files.is_empty() {
            return Ok(());
        }
        let repo = format!("/repos/{}/{}", pr.owner, pr.repo);
        let dir = dir.trim_matches('/');

        let pull = self.raw_get(format!("{repo}/pulls/{}", pr.number)).await?;
        let head_ref = json_str(&pull, &["head", "ref"])?;
        let head_sha = json_str(&pull, &["head", "sha"])?;

        let head_commit = self.raw_get(format!("{repo}/git/commits/{head_sha}")).await?;
        let base_tree = json_str(&head_commit, &["tree", "sha"])?;

        let mut entries = Vec::with_capacity(files.len());
        for file in files {
            let blob = self
                .raw_post(
                    format!("{repo}/git/blobs"),
                    serde_json::json!({ "content": file.content, "encoding": "utf-8" }),
                )
                .await?;
            let blob_sha = json_str(&blob, &["sha"])?;
            entries.push(serde_json::json!({
                "path": format!("{dir}/{}", file.name),
                "mode": "100644",
                "type": "blob",
                "sha": blob_sha,
            }));
        }

        let tree = self
            .raw_post(
                format!("{repo}/git/trees"),
                serde_json::json!({ "base_tree": base_tree, "tree": entries }),
            )
            .await?;
        let tree_sha = json_str(&tree, &["sha"])?;

        let commit = self
            .raw_post(
                format!("{repo}/git/commits"),
                serde_json::json!({
                    "message": message,
                    "tree": tree_sha,
                    "parents": [head_sha],
                }),
            )
            .await?;
        let commit_sha = json_str(&commit, &["sha"])?;

        let route = format!("{repo}/git/refs/heads/{head_ref}");
        let payload = serde_json::json!({ "sha": commit_sha });
        let _updated: serde_json::Value = self
            .octocrab
            .patch(&route, Some(&payload))
            .await
            .map_err(|e| WardenError::Github(format!("PATCH {route} failed: {e}")))?;

        info!(pr = %pr, branch = %head_ref, count = files.len(), "committed generated test files");
        Ok(())
    }

    async fn add_label(&self, pr: &PrLocator, label: &str) -> Result<()> {
        let route = format!("/repos/{}/{}/issues/{}/labels", pr.owner, pr.repo, pr.number);
        let payload = serde_json::json!({ "labels": [label] });
        let _response = self.raw_post(route, payload).await?;
        info!(pr = %pr, label, "labeled pull request");
        Ok(())
    }
}

fn json_str(value: &serde_json::Value, path: &[&str]) -> Result<String> {
    let mut cursor = value;
    for key in path {
        cursor = &cursor[*key];
    }
    cursor
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| {
            WardenError::Github(format!(
                "GitHub response missing '{}' field",
                path.join(".")
            ))
        })
}
