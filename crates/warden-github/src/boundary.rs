use async_trait::async_trait;

use warden_core::{ChangedFile, PrLocator, Result};

/// A file to be committed by [`PullRequestSink::commit_test_files`].
#[derive(Debug, Clone)]
pub struct GeneratedFile {
    /// File name relative to the commit directory.
    pub name: String,
    /// Full file content.
    pub content: String,
}

/// Read side of the pull request boundary.
///
/// Listing is idempotent, so implementations may retry transient failures
/// before surfacing an error.
#[async_trait]
pub trait PullRequestSource: Send + Sync {
    /// List every changed file in the pull request, across all pages.
    ///
    /// # Errors
    ///
    /// Returns [`warden_core::WardenError::Github`] when the listing cannot
    /// be fetched or decoded.
    async fn list_changed_files(&self, pr: &PrLocator) -> Result<Vec<ChangedFile>>;
}

/// Write side of the pull request boundary.
///
/// Every operation here creates something visible, so none of them retry; a
/// failure is reported once and the caller decides what it means for the run.
#[async_trait]
pub trait PullRequestSink: Send + Sync {
    /// Post a comment on the pull request conversation.
    async fn post_comment(&self, pr: &PrLocator, body: &str) -> Result<()>;

    /// Commit the given files under `dir` on the pull request's head branch,
    /// as a single commit with `message`.
    async fn commit_test_files(
        &self,
        pr: &PrLocator,
        message: &str,
        dir: &str,
        files: &[GeneratedFile],
    ) -> Result<()>;

    /// Add a label to the pull request.
    async fn add_label(&self, pr: &PrLocator, label: &str) -> Result<()>;
}
