use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::warn;

use warden_core::{
    PrLocator, Result, ReviewAnalysis, RunReport, StageFailure, StructuredDiff, TicketRecord,
    WardenConfig, WardenError, WriteBackOutcome,
};
use warden_flow::{Flow, FlowBuilder, Target};
use warden_github::{PullRequestSink, PullRequestSource};
use warden_jira::IssueTracker;
use warden_review::ChatModel;

use crate::{
    build_analyze_flow, build_fetch_flow, build_tickets_flow, build_write_back_flow,
    render_pr_comment, run_analyze, run_fetch, run_tickets, run_write_back, Connector,
};

/// Everything the pipeline touches outside the process.
///
/// The model is a shared handle used directly; the other three are
/// per-run factories called by their stage's CONNECT node.
#[derive(Clone)]
pub struct Boundaries {
    /// Factory for the changed-file source.
    pub source_connect: Connector<Arc<dyn PullRequestSource>>,
    /// The analysis model.
    pub model: Arc<dyn ChatModel>,
    /// Factory for the issue tracker session.
    pub tracker_connect: Connector<Arc<dyn IssueTracker>>,
    /// Factory for the write-back sink.
    pub sink_connect: Connector<Arc<dyn PullRequestSink>>,
}

/// State for the orchestrating review flow.
///
/// Stage nodes copy what their sub-flow needs out of this state, run it, and
/// project the results back in. Everything except the URL is written by the
/// nodes, so the fields stay private and leave through [`RunReport`] only.
pub struct RunState {
    /// Pull request URL under review.
    pub pr_url: String,
    started_at: DateTime<Utc>,
    locator: Option<PrLocator>,
    files_fetched: usize,
    files_skipped: usize,
    diffs: Vec<StructuredDiff>,
    analysis: ReviewAnalysis,
    tickets: Vec<TicketRecord>,
    tickets_attempted: usize,
    outcome: WriteBackOutcome,
    failures: Vec<StageFailure>,
}

impl RunState {
    /// Fresh state for one review run.
    pub fn new(pr_url: impl Into<String>) -> Self {
        Self {
            pr_url: pr_url.into(),
            started_at: Utc::now(),
            locator: None,
            files_fetched: 0,
            files_skipped: 0,
            diffs: Vec::new(),
            analysis: ReviewAnalysis::default(),
            tickets: Vec::new(),
            tickets_attempted: 0,
            outcome: WriteBackOutcome::default(),
            failures: Vec::new(),
        }
    }

    fn into_report(self) -> Result<RunReport> {
        let Some(locator) = self.locator else {
            return Err(WardenError::Assembly(
                "review flow finished without pull request coordinates".into(),
            ));
        };
        Ok(RunReport {
            pr: locator,
            files_fetched: self.files_fetched,
            files_reviewed: self.diffs.len(),
            files_skipped: self.files_skipped,
            summary: self.analysis.summary,
            findings: self.analysis.findings,
            tickets: self.tickets,
            tickets_attempted: self.tickets_attempted,
            write_back: self.outcome,
            failures: self.failures,
            started_at: self.started_at,
            finished_at: Utc::now(),
        })
    }
}

/// Build the orchestrating flow: INIT, FETCH, ANALYZE, TICKETS, WRITE_BACK.
///
/// The four stage flows are built here, once, and shared by every run of the
/// returned flow. Fault policy differs by stage: FETCH and ANALYZE propagate
/// errors and abort the run, while TICKETS and WRITE_BACK record a
/// [`StageFailure`] and let the run finish degraded.
pub fn build_review_flow(boundaries: Boundaries, config: &WardenConfig) -> Result<Flow<RunState>> {
    let fetch = Arc::new(build_fetch_flow(
        boundaries.source_connect,
        &config.review.skip_patterns,
    )?);
    let analyze = Arc::new(build_analyze_flow(
        boundaries.model,
        config.review.max_patch_chars,
    )?);
    let tickets = Arc::new(build_tickets_flow(
        boundaries.tracker_connect,
        config.jira.issue_type.clone(),
    )?);
    let write_back = Arc::new(build_write_back_flow(
        boundaries.sink_connect,
        config.review.label.clone(),
        config.review.test_dir.clone(),
    )?);

    FlowBuilder::new("review")
        .node("INIT", |mut state: RunState| async move {
            state.started_at = Utc::now();
            state.locator = None;
            state.files_fetched = 0;
            state.files_skipped = 0;
            state.diffs.clear();
            state.analysis = ReviewAnalysis::default();
            state.tickets.clear();
            state.tickets_attempted = 0;
            state.outcome = WriteBackOutcome::default();
            state.failures.clear();
            Ok(state)
        })
        .node("FETCH", {
            let fetch = fetch.clone();
            move |mut state: RunState| {
                let fetch = fetch.clone();
                async move {
                    let out = run_fetch(&fetch, &state.pr_url).await?;
                    state.locator = Some(out.locator);
                    state.files_fetched = out.files_fetched;
                    state.files_skipped = out.skipped_files;
                    state.diffs = out.diffs;
                    Ok(state)
                }
            }
        })
        .node("ANALYZE", {
            let analyze = analyze.clone();
            move |mut state: RunState| {
                let analyze = analyze.clone();
                async move {
                    state.analysis = run_analyze(&analyze, state.diffs.clone()).await?;
                    Ok(state)
                }
            }
        })
        .node("TICKETS", {
            let tickets = tickets.clone();
            move |mut state: RunState| {
                let tickets = tickets.clone();
                async move {
                    let Some(locator) = state.locator.clone() else {
                        return Err(WardenError::Assembly(
                            "ticket stage reached without pull request coordinates".into(),
                        ));
                    };
                    match run_tickets(&tickets, locator, state.analysis.findings.clone()).await {
                        Ok(out) => {
                            state.tickets = out.tickets;
                            state.tickets_attempted = out.attempted;
                        }
                        Err(e) => {
                            warn!(error = %e, "ticket stage faulted, continuing without tickets");
                            state.failures.push(StageFailure {
                                stage: "tickets".into(),
                                message: e.to_string(),
                            });
                        }
                    }
                    Ok(state)
                }
            }
        })
        .node("WRITE_BACK", {
            let write_back = write_back.clone();
            move |mut state: RunState| {
                let write_back = write_back.clone();
                async move {
                    let Some(locator) = state.locator.clone() else {
                        return Err(WardenError::Assembly(
                            "write-back reached without pull request coordinates".into(),
                        ));
                    };
                    let body = render_pr_comment(&state.analysis, &state.tickets);
                    match run_write_back(&write_back, locator, body, state.analysis.tests.clone())
                        .await
                    {
                        Ok(outcome) => state.outcome = outcome,
                        Err(e) => {
                            warn!(error = %e, "write-back stage faulted, continuing");
                            state.failures.push(StageFailure {
                                stage: "write-back".into(),
                                message: e.to_string(),
                            });
                        }
                    }
                    Ok(state)
                }
            }
        })
        .entry("INIT")
        .edge("INIT", "FETCH")
        .edge("FETCH", "ANALYZE")
        .edge("ANALYZE", "TICKETS")
        .edge("TICKETS", "WRITE_BACK")
        .edge("WRITE_BACK", Target::End)
        .build()
}

/// Review one pull request end to end and return the run report.
///
/// # Errors
///
/// Returns an error when the flow cannot be assembled, when the URL does not
/// parse, or when the fetch or analyze stage faults. Ticket and write-back
/// faults do not error; they appear in the report's failure list.
pub async fn run_review(
    pr_url: &str,
    boundaries: Boundaries,
    config: &WardenConfig,
) -> Result<RunReport> {
    let flow = build_review_flow(boundaries, config)?;
    let state = flow.run(RunState::new(pr_url)).await?;
    state.into_report()
}

#[cfg(test)]
mod tests {
    use super::*;

    use warden_core::{BugFinding, Severity};

    fn locator() -> PrLocator {
        PrLocator {
            owner: "octo".into(),
            repo: "demo".into(),
            number: 7,
        }
    }

    #[test]
    fn report_projection_requires_coordinates() {
        let state = RunState::new("https://github.com/octo/demo/pull/7");
        let err = state.into_report().unwrap_err();
        assert!(matches!(err, WardenError::Assembly(_)));
    }

    #[test]
    fn report_projection_maps_the_run() {
        let mut state = RunState::new("https://github.com/octo/demo/pull/7");
        state.locator = Some(locator());
        state.files_fetched = 3;
        state.files_skipped = 2;
        state.diffs = vec![StructuredDiff {
            filename: "src/app.py".into(),
            language: "py".into(),
            status: warden_core::FileStatus::Modified,
            additions: 1,
            deletions: 1,
            changes: 2,
            patch: "@@".into(),
        }];
        state.analysis.summary = "one bug".into();
        state.analysis.findings = vec![BugFinding {
            severity: Severity::High,
            kind: "logic error".into(),
            description: "off by one".into(),
            location: "src/app.py line 3".into(),
            suggestion: String::new(),
        }];
        state.tickets_attempted = 1;

        let report = state.into_report().unwrap();

        assert_eq!(report.pr.to_string(), "octo/demo#7");
        assert_eq!(report.files_fetched, 3);
        assert_eq!(report.files_reviewed, 1);
        assert_eq!(report.files_skipped, 2);
        assert_eq!(report.summary, "one bug");
        assert_eq!(report.bugs_found(), 1);
        assert_eq!(report.tickets_attempted, 1);
        assert!(report.finished_at >= report.started_at);
    }
}
