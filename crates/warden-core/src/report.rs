use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{BugFinding, PrLocator, Severity, StageFailure, TicketRecord, WriteBackOutcome};

/// Final status of one review run.
///
/// Every run ends in exactly one of two ways: a fault that aborts it, or
/// this report. A run with nothing to review still produces a report that
/// says so.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use warden_core::{PrLocator, RunReport};
///
/// let now = Utc::now();
/// let report = RunReport {
///     pr: PrLocator { owner: "octo".into(), repo: "demo".into(), number: 7 },
///     files_fetched: 0,
///     files_reviewed: 0,
///     files_skipped: 0,
///     summary: String::new(),
///     findings: vec![],
///     tickets: vec![],
///     tickets_attempted: 0,
///     write_back: Default::default(),
///     failures: vec![],
///     started_at: now,
///     finished_at: now,
/// };
/// assert!(report.to_string().contains("Nothing to review."));
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// The reviewed pull request.
    pub pr: PrLocator,
    /// Changed files returned by the source listing.
    pub files_fetched: usize,
    /// Files that made it into the analysis prompt.
    pub files_reviewed: usize,
    /// Files dropped before analysis (empty patches, skip patterns).
    pub files_skipped: usize,
    /// Overall assessment from the analysis stage.
    pub summary: String,
    /// Bugs reported by the analysis stage.
    pub findings: Vec<BugFinding>,
    /// Tickets successfully filed.
    pub tickets: Vec<TicketRecord>,
    /// Ticket creations attempted, including failed ones.
    pub tickets_attempted: usize,
    /// Which write-back operations happened.
    pub write_back: WriteBackOutcome,
    /// Stages that faulted while the run continued degraded.
    pub failures: Vec<StageFailure>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Number of bugs the analysis stage reported.
    pub fn bugs_found(&self) -> usize {
        self.findings.len()
    }

    /// Wall-clock duration of the run in seconds.
    pub fn duration_secs(&self) -> f64 {
        (self.finished_at - self.started_at).num_milliseconds() as f64 / 1000.0
    }
}

fn severity_label(s: Severity) -> &'static str {
    match s {
        Severity::Low => "LOW",
        Severity::Medium => "MEDIUM",
        Severity::High => "HIGH",
        Severity::Critical => "CRITICAL",
    }
}

fn severity_emoji(s: Severity) -> &'static str {
    match s {
        Severity::Low => "\u{1f4a1}",
        Severity::Medium => "\u{26a0}\u{fe0f}",
        Severity::High => "\u{1f41b}",
        Severity::Critical => "\u{1f6a8}",
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Warden Review")?;
        writeln!(f, "=============")?;
        writeln!(
            f,
            "PR: {} | Files: {} fetched, {} reviewed, {} skipped | Bugs: {} | Tickets: {}/{} | {:.1}s\n",
            self.pr,
            self.files_fetched,
            self.files_reviewed,
            self.files_skipped,
            self.findings.len(),
            self.tickets.len(),
            self.tickets_attempted,
            self.duration_secs(),
        )?;

        if self.files_reviewed == 0 {
            writeln!(f, "Nothing to review.")?;
        } else {
            if !self.summary.is_empty() {
                writeln!(f, "{}\n", self.summary)?;
            }
            if self.findings.is_empty() {
                writeln!(f, "No bugs found.")?;
            } else {
                for bug in &self.findings {
                    writeln!(
                        f,
                        "[{}] {}: {}",
                        severity_label(bug.severity),
                        bug.kind,
                        bug.location
                    )?;
                    writeln!(f, "  {}", bug.description)?;
                    if !bug.suggestion.is_empty() {
                        writeln!(f, "  Suggestion: {}", bug.suggestion)?;
                    }
                    writeln!(f)?;
                }
            }
            if !self.tickets.is_empty() {
                writeln!(f, "Tickets filed:")?;
                for ticket in &self.tickets {
                    writeln!(f, "  {} ({})", ticket.key, ticket.url)?;
                }
            }
        }

        let wb = &self.write_back;
        writeln!(
            f,
            "\nWrite-back: comment {} | tests {} | label {}",
            if wb.comment_posted { "posted" } else { "skipped" },
            if wb.tests_committed { "committed" } else { "skipped" },
            if wb.pr_tagged { "applied" } else { "skipped" },
        )?;

        if !self.failures.is_empty() {
            writeln!(f, "\nDegraded stages:")?;
            for failure in &self.failures {
                writeln!(f, "  {}: {}", failure.stage, failure.message)?;
            }
        }

        Ok(())
    }
}

impl RunReport {
    /// Render the report as markdown.
    ///
    /// # Examples
    ///
    /// ```
    /// use chrono::Utc;
    /// use warden_core::{PrLocator, RunReport};
    ///
    /// let now = Utc::now();
    /// let report = RunReport {
    ///     pr: PrLocator { owner: "octo".into(), repo: "demo".into(), number: 7 },
    ///     files_fetched: 0,
    ///     files_reviewed: 0,
    ///     files_skipped: 0,
    ///     summary: String::new(),
    ///     findings: vec![],
    ///     tickets: vec![],
    ///     tickets_attempted: 0,
    ///     write_back: Default::default(),
    ///     failures: vec![],
    ///     started_at: now,
    ///     finished_at: now,
    /// };
    /// assert!(report.to_markdown().contains("# Warden Review"));
    /// ```
    pub fn to_markdown(&self) -> String {
        let mut out = String::new();
        out.push_str("# Warden Review\n\n");
        out.push_str(&format!(
            "**PR:** {} | **Files:** {} fetched, {} reviewed, {} skipped | **Bugs:** {} | **Tickets:** {}/{}\n\n",
            self.pr,
            self.files_fetched,
            self.files_reviewed,
            self.files_skipped,
            self.findings.len(),
            self.tickets.len(),
            self.tickets_attempted,
        ));

        if self.files_reviewed == 0 {
            out.push_str("Nothing to review.\n");
            return out;
        }

        if !self.summary.is_empty() {
            out.push_str(&format!("{}\n\n", self.summary));
        }

        if self.findings.is_empty() {
            out.push_str("No bugs found.\n");
        } else {
            for bug in &self.findings {
                out.push_str(&format!(
                    "## {} {} — `{}`\n\n",
                    severity_emoji(bug.severity),
                    bug.kind,
                    bug.location,
                ));
                out.push_str(&format!("{}\n\n", bug.description));
                if !bug.suggestion.is_empty() {
                    out.push_str(&format!("> **Suggestion:** {}\n\n", bug.suggestion));
                }
            }
        }

        if !self.tickets.is_empty() {
            out.push_str("## Tickets\n\n");
            for ticket in &self.tickets {
                out.push_str(&format!(
                    "- [{}]({}) — {} {}\n",
                    ticket.key,
                    ticket.url,
                    ticket.severity,
                    ticket.kind,
                ));
            }
            out.push('\n');
        }

        if !self.failures.is_empty() {
            out.push_str("## Degraded stages\n\n");
            for failure in &self.failures {
                out.push_str(&format!("- **{}**: {}\n", failure.stage, failure.message));
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_report() -> RunReport {
        let now = Utc::now();
        RunReport {
            pr: PrLocator {
                owner: "octo".into(),
                repo: "demo".into(),
                number: 7,
            },
            files_fetched: 2,
            files_reviewed: 1,
            files_skipped: 1,
            summary: "One real bug in the retry path.".into(),
            findings: vec![BugFinding {
                severity: Severity::High,
                kind: "logic error".into(),
                description: "retry counter never resets".into(),
                location: "src/retry.rs in run()".into(),
                suggestion: "reset the counter after a success".into(),
            }],
            tickets: vec![TicketRecord {
                key: "OPS-42".into(),
                url: "https://example.atlassian.net/browse/OPS-42".into(),
                severity: Severity::High,
                kind: "logic error".into(),
            }],
            tickets_attempted: 1,
            write_back: WriteBackOutcome {
                comment_posted: true,
                tests_committed: false,
                pr_tagged: true,
            },
            failures: vec![],
            started_at: now,
            finished_at: now + chrono::Duration::milliseconds(2300),
        }
    }

    #[test]
    fn display_shows_stats_findings_and_tickets() {
        let text = base_report().to_string();
        assert!(text.contains("PR: octo/demo#7"));
        assert!(text.contains("2 fetched, 1 reviewed, 1 skipped"));
        assert!(text.contains("Tickets: 1/1"));
        assert!(text.contains("[HIGH] logic error: src/retry.rs in run()"));
        assert!(text.contains("Suggestion: reset the counter"));
        assert!(text.contains("OPS-42"));
        assert!(text.contains("comment posted"));
        assert!(text.contains("tests skipped"));
    }

    #[test]
    fn display_reports_nothing_to_review() {
        let mut report = base_report();
        report.files_reviewed = 0;
        report.findings.clear();
        report.tickets.clear();
        let text = report.to_string();
        assert!(text.contains("Nothing to review."));
        assert!(!text.contains("No bugs found."));
    }

    #[test]
    fn display_lists_degraded_stages() {
        let mut report = base_report();
        report.failures.push(StageFailure {
            stage: "tickets".into(),
            message: "tracker unreachable".into(),
        });
        let text = report.to_string();
        assert!(text.contains("Degraded stages:"));
        assert!(text.contains("tickets: tracker unreachable"));
    }

    #[test]
    fn markdown_shows_findings_and_ticket_links() {
        let md = base_report().to_markdown();
        assert!(md.contains("# Warden Review"));
        assert!(md.contains("**Bugs:** 1"));
        assert!(md.contains("`src/retry.rs in run()`"));
        assert!(md.contains("> **Suggestion:**"));
        assert!(md.contains("[OPS-42](https://example.atlassian.net/browse/OPS-42)"));
    }

    #[test]
    fn markdown_nothing_to_review_is_short() {
        let mut report = base_report();
        report.files_reviewed = 0;
        let md = report.to_markdown();
        assert!(md.contains("Nothing to review."));
        assert!(!md.contains("## Tickets"));
    }

    #[test]
    fn duration_is_derived_from_timestamps() {
        let report = base_report();
        assert!((report.duration_secs() - 2.3).abs() < 1e-9);
    }

    #[test]
    fn report_serializes_camel_case() {
        let json = serde_json::to_value(base_report()).unwrap();
        assert!(json.get("filesFetched").is_some());
        assert!(json.get("ticketsAttempted").is_some());
        assert!(json.get("writeBack").is_some());
        assert!(json.get("startedAt").is_some());
        assert_eq!(json["findings"][0]["severity"], "high");
    }
}
