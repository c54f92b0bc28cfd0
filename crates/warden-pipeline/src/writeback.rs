use std::sync::Arc;

use tracing::{debug, info, warn};

use warden_core::{
    PrLocator, Result, ReviewAnalysis, TestSuggestions, TicketRecord, WardenError,
    WriteBackOutcome,
};
use warden_flow::{Flow, FlowBuilder, Target};
use warden_github::{GeneratedFile, PullRequestSink};

use crate::Connector;

/// State for the write-back stage.
pub struct WriteBackState {
    /// The pull request being written to.
    pub locator: PrLocator,
    /// Rendered comment to post on the conversation.
    pub comment_body: String,
    /// Generated tests to commit, when the analysis proposed any.
    pub tests: Option<TestSuggestions>,
    /// Which operations succeeded, filled in as the nodes run.
    pub outcome: WriteBackOutcome,
    session: Option<Arc<dyn PullRequestSink>>,
}

impl WriteBackState {
    /// Fresh state for one write-back run.
    pub fn new(locator: PrLocator, comment_body: String, tests: Option<TestSuggestions>) -> Self {
        Self {
            locator,
            comment_body,
            tests,
            outcome: WriteBackOutcome::default(),
            session: None,
        }
    }
}

/// Router after CONNECT: write only when a sink session exists.
pub fn should_write_back(state: &WriteBackState) -> &'static str {
    if state.session.is_none() {
        "skip"
    } else {
        "write"
    }
}

/// Build the write-back flow: INIT, CONNECT, then POST_COMMENT,
/// COMMIT_TESTS, and TAG_PR in order.
///
/// The three write operations are independent: each one that fails is logged
/// and leaves its outcome flag false while the rest still run. Only a missing
/// sink session skips the stage as a whole.
pub fn build_write_back_flow(
    connect: Connector<Arc<dyn PullRequestSink>>,
    label: String,
    test_dir: String,
) -> Result<Flow<WriteBackState>> {
    FlowBuilder::new("write-back")
        .node("INIT", |mut state: WriteBackState| async move {
            state.outcome = WriteBackOutcome::default();
            state.session = None;
            Ok(state)
        })
        .node("CONNECT", {
            let connect = connect.clone();
            move |mut state: WriteBackState| {
                let connect = connect.clone();
                async move {
                    match connect() {
                        Ok(session) => state.session = Some(session),
                        Err(e) => {
                            warn!(error = %e, "write-back sink unavailable, skipping write-back")
                        }
                    }
                    Ok(state)
                }
            }
        })
        .node("POST_COMMENT", |mut state: WriteBackState| async move {
            let Some(session) = state.session.clone() else {
                return Err(WardenError::Assembly(
                    "comment posting reached without a sink session".into(),
                ));
            };
            match session.post_comment(&state.locator, &state.comment_body).await {
                Ok(()) => {
                    state.outcome.comment_posted = true;
                    info!("review comment posted");
                }
                Err(e) => warn!(error = %e, "comment post failed"),
            }
            Ok(state)
        })
        .node("COMMIT_TESTS", {
            let test_dir = test_dir.clone();
            move |mut state: WriteBackState| {
                let test_dir = test_dir.clone();
                async move {
                    let files = generated_files(state.tests.as_ref());
                    if files.is_empty() {
                        debug!("no generated tests to commit");
                        return Ok(state);
                    }
                    let Some(session) = state.session.clone() else {
                        return Err(WardenError::Assembly(
                            "test commit reached without a sink session".into(),
                        ));
                    };
                    let message =
                        format!("Add generated tests from review of #{}", state.locator.number);
                    match session
                        .commit_test_files(&state.locator, &message, &test_dir, &files)
                        .await
                    {
                        Ok(()) => {
                            state.outcome.tests_committed = true;
                            info!(files = files.len(), dir = %test_dir, "generated tests committed");
                        }
                        Err(e) => warn!(error = %e, "test commit failed"),
                    }
                    Ok(state)
                }
            }
        })
        .node("TAG_PR", {
            let label = label.clone();
            move |mut state: WriteBackState| {
                let label = label.clone();
                async move {
                    let Some(session) = state.session.clone() else {
                        return Err(WardenError::Assembly(
                            "labeling reached without a sink session".into(),
                        ));
                    };
                    match session.add_label(&state.locator, &label).await {
                        Ok(()) => {
                            state.outcome.pr_tagged = true;
                            info!(label = %label, "pull request labeled");
                        }
                        Err(e) => warn!(error = %e, "labeling failed"),
                    }
                    Ok(state)
                }
            }
        })
        .entry("INIT")
        .edge("INIT", "CONNECT")
        .branch(
            "CONNECT",
            should_write_back,
            [
                ("skip", Target::End),
                ("write", Target::Node("POST_COMMENT")),
            ],
        )
        .edge("POST_COMMENT", "COMMIT_TESTS")
        .edge("COMMIT_TESTS", "TAG_PR")
        .edge("TAG_PR", Target::End)
        .build()
}

/// Run the write-back flow for one pull request.
pub async fn run_write_back(
    flow: &Flow<WriteBackState>,
    locator: PrLocator,
    comment_body: String,
    tests: Option<TestSuggestions>,
) -> Result<WriteBackOutcome> {
    let state = flow
        .run(WriteBackState::new(locator, comment_body, tests))
        .await?;
    Ok(state.outcome)
}

/// Render the review comment posted on the pull request conversation.
///
/// # Examples
///
/// ```
/// use warden_core::ReviewAnalysis;
/// use warden_pipeline::render_pr_comment;
///
/// let comment = render_pr_comment(&ReviewAnalysis::default(), &[]);
/// assert!(comment.starts_with("## Warden Review"));
/// assert!(comment.contains("No reviewable changes"));
/// ```
pub fn render_pr_comment(analysis: &ReviewAnalysis, tickets: &[TicketRecord]) -> String {
    let mut out = String::from("## Warden Review\n\n");

    if analysis.summary.is_empty() && analysis.findings.is_empty() {
        out.push_str("No reviewable changes in this pull request.\n");
        return out;
    }

    if !analysis.summary.is_empty() {
        out.push_str(&analysis.summary);
        out.push_str("\n\n");
    }

    if analysis.findings.is_empty() {
        out.push_str("No bugs found in this change.\n\n");
    } else {
        out.push_str(&format!("### Bugs found ({})\n\n", analysis.findings.len()));
        for finding in &analysis.findings {
            let severity = finding.severity.to_string().to_uppercase();
            out.push_str(&format!(
                "- **[{severity}]** {} (`{}`): {}\n",
                finding.kind, finding.location, finding.description
            ));
            if !finding.suggestion.is_empty() {
                out.push_str(&format!("  - Suggested fix: {}\n", finding.suggestion));
            }
        }
        out.push('\n');
    }

    push_section(&mut out, "Code quality", &analysis.quality_issues);
    push_section(&mut out, "Security", &analysis.security_issues);
    push_section(&mut out, "Positive", &analysis.positive_feedback);

    if !tickets.is_empty() {
        out.push_str(&format!("### Tickets filed ({})\n\n", tickets.len()));
        for ticket in tickets {
            out.push_str(&format!(
                "- [{}]({}): {}, {}\n",
                ticket.key, ticket.url, ticket.kind, ticket.severity
            ));
        }
        out.push('\n');
    }

    let mut out = out.trim_end().to_string();
    out.push('\n');
    out
}

fn push_section(out: &mut String, title: &str, items: &[String]) {
    if items.is_empty() {
        return;
    }
    out.push_str(&format!("### {title}\n\n"));
    for item in items {
        out.push_str(&format!("- {item}\n"));
    }
    out.push('\n');
}

/// Turn test suggestions into committable files, one per test case.
///
/// Cases with blank code are dropped; a case with an unusable name still gets
/// a file under a generic stem.
fn generated_files(tests: Option<&TestSuggestions>) -> Vec<GeneratedFile> {
    let Some(tests) = tests else {
        return Vec::new();
    };
    tests
        .cases
        .iter()
        .filter(|case| !case.code.trim().is_empty())
        .map(|case| GeneratedFile {
            name: test_filename(&case.name, &tests.framework),
            content: case.code.clone(),
        })
        .collect()
}

fn test_filename(name: &str, framework: &str) -> String {
    let stem: String = name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    let stem = if stem.is_empty() {
        "generated_test".to_string()
    } else {
        stem
    };
    format!("{stem}.{}", extension_for(framework))
}

fn extension_for(framework: &str) -> &'static str {
    let fw = framework.to_ascii_lowercase();
    if fw.contains("pytest") || fw.contains("unittest") {
        "py"
    } else if fw.contains("jest") || fw.contains("mocha") || fw.contains("vitest") {
        "js"
    } else if fw.contains("junit") {
        "java"
    } else if fw.contains("rspec") {
        "rb"
    } else if fw.contains("cargo") || fw == "rust" {
        "rs"
    } else {
        "txt"
    }
}
