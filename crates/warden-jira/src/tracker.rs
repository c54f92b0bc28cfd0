use async_trait::async_trait;

use warden_core::Result;

/// A fully rendered issue, ready to file.
///
/// The tracker session supplies the project; everything per-issue lives here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIssue {
    /// One-line issue title.
    pub summary: String,
    /// Issue body text.
    pub description: String,
    /// Tracker issue type, e.g. `"Bug"`.
    pub issue_type: String,
    /// Tracker priority name, e.g. `"High"`.
    pub priority: String,
}

/// The issue-tracker boundary.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    /// File one issue and return the tracker's raw response text.
    ///
    /// The response is not decoded here; callers extract the issue key with
    /// [`crate::extract_ticket_key`] and decide what a missing key means.
    async fn create_issue(&self, issue: &NewIssue) -> Result<String>;

    /// Human-facing URL for an issue key.
    fn browse_url(&self, key: &str) -> String;
}
