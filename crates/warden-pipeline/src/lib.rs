//! The staged review pipeline: fetch, analyze, tickets, write-back.
//!
//! Each stage is a [`warden_flow::Flow`] over its own state type, produced by
//! a factory (`build_*_flow`) that captures the stage's boundary handles and
//! settings. The orchestrating flow in [`build_review_flow`] runs the stages
//! in order, copying fields into each stage's state and projecting results
//! back out, and [`run_review`] turns one pull request URL into a
//! [`warden_core::RunReport`].
//!
//! Boundary handles enter through [`Connector`] factories so stages acquire
//! their sessions per run and tests can substitute in-memory fakes. Fetch and
//! analyze faults abort the run; ticket and write-back faults degrade it, and
//! the report lists which stages faulted.

use std::sync::Arc;

use warden_core::Result;

mod analyze;
mod fetch;
mod orchestrator;
mod tickets;
mod writeback;

pub use analyze::{build_analyze_flow, run_analyze, AnalyzeState};
pub use fetch::{build_fetch_flow, run_fetch, FetchOutput, FetchState};
pub use orchestrator::{build_review_flow, run_review, Boundaries, RunState};
pub use tickets::{
    build_tickets_flow, run_tickets, should_create_tickets, TicketOutput, TicketState,
};
pub use writeback::{
    build_write_back_flow, render_pr_comment, run_write_back, should_write_back, WriteBackState,
};

/// Factory for a stage's boundary handle.
///
/// A stage's CONNECT node calls this once per run, so a handle never outlives
/// the run that acquired it. Whether a factory failure aborts the run is the
/// stage's decision: fetch cannot proceed without its source, while the
/// ticket and write-back stages log the failure and skip.
pub type Connector<T> = Arc<dyn Fn() -> Result<T> + Send + Sync>;
