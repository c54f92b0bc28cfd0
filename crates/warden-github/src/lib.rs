//! GitHub boundary for the Warden pipeline.
//!
//! This crate owns everything that touches the GitHub API:
//! - [`parse_pr_url`] — strict pull request URL parsing
//! - [`GithubSession`] — an authenticated connection handle
//! - [`PullRequestSource`] / [`PullRequestSink`] — the read and write
//!   boundary traits the pipeline stages depend on, so tests can substitute
//!   in-memory fakes and never open a socket
//!
//! Reads (changed-file listing) retry transient failures with bounded
//! backoff. Writes (comment, commit, label) are best-effort and never retry.

mod boundary;
mod parse;
mod session;

pub use boundary::{GeneratedFile, PullRequestSink, PullRequestSource};
pub use parse::parse_pr_url;
pub use session::GithubSession;
