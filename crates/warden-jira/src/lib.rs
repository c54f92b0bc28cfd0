//! Jira issue filing for review findings.
//!
//! Findings become tickets one at a time, best effort:
//! [`issue_for_finding`] renders a finding into an issue payload, a
//! [`JiraSession`] files it, and [`extract_ticket_key`] recovers the issue
//! key from whatever the tracker sent back.

mod session;
mod ticket;
mod tracker;

pub use session::JiraSession;
pub use ticket::{
    build_description, build_summary, extract_ticket_key, issue_for_finding, priority_for,
};
pub use tracker::{IssueTracker, NewIssue};
