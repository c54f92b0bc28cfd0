use regex::Regex;

use warden_core::{BugFinding, PrLocator, Severity};

use crate::tracker::NewIssue;

/// One-line issue title for a finding: uppercase severity, kind tag, and
/// the head of the description.
///
/// # Examples
///
/// ```
/// use warden_core::{BugFinding, Severity};
/// use warden_jira::build_summary;
///
/// let bug = BugFinding {
///     severity: Severity::High,
///     kind: "logic error".into(),
///     description: "retry counter never resets".into(),
///     location: "src/retry.rs".into(),
///     suggestion: String::new(),
/// };
/// assert_eq!(build_summary(&bug), "[HIGH] logic error: retry counter never resets");
/// ```
pub fn build_summary(finding: &BugFinding) -> String {
    let head: String = finding.description.chars().take(80).collect();
    format!(
        "[{}] {}: {}",
        finding.severity.to_string().to_uppercase(),
        finding.kind,
        head
    )
}

/// Issue body for a finding: the finding's fields plus where the bug came
/// from, as markdown.
pub fn build_description(finding: &BugFinding, pr: &PrLocator) -> String {
    format!(
        "**Bug found in PR #{number}**\n\n\
         **Repository:** {owner}/{repo}\n\
         **Severity:** {severity}\n\
         **Type:** {kind}\n\
         **Location:** {location}\n\n\
         **Description:**\n{description}\n\n\
         **Suggestion:**\n{suggestion}\n\n\
         **PR Link:** https://github.com/{owner}/{repo}/pull/{number}\n",
        number = pr.number,
        owner = pr.owner,
        repo = pr.repo,
        severity = finding.severity,
        kind = finding.kind,
        location = finding.location,
        description = finding.description,
        suggestion = finding.suggestion,
    )
}

/// Tracker priority name for a severity.
///
/// # Examples
///
/// ```
/// use warden_core::Severity;
/// use warden_jira::priority_for;
///
/// assert_eq!(priority_for(Severity::Critical), "Highest");
/// assert_eq!(priority_for(Severity::Low), "Low");
/// ```
pub fn priority_for(severity: Severity) -> &'static str {
    match severity {
        Severity::Low => "Low",
        Severity::Medium => "Medium",
        Severity::High => "High",
        Severity::Critical => "Highest",
    }
}

/// Assemble the full issue payload for one finding.
pub fn issue_for_finding(finding: &BugFinding, pr: &PrLocator, issue_type: &str) -> NewIssue {
    NewIssue {
        summary: build_summary(finding),
        description: build_description(finding, pr),
        issue_type: issue_type.to_string(),
        priority: priority_for(finding.severity).to_string(),
    }
}

/// Pull an issue key like `OPS-42` out of a tracker response.
///
/// Tries the well-formed path first: decode the response as JSON and take
/// its `key` field. Falls back to scanning the free text for anything
/// key-shaped, which also handles error bodies that mention the key.
/// Returns `None` when no key can be found; the caller decides whether
/// that skips one ticket or fails a batch.
///
/// # Examples
///
/// ```
/// use warden_jira::extract_ticket_key;
///
/// assert_eq!(
///     extract_ticket_key(r#"{"id":"10001","key":"OPS-42"}"#),
///     Some("OPS-42".to_string())
/// );
/// assert_eq!(
///     extract_ticket_key("created OPS-43 successfully"),
///     Some("OPS-43".to_string())
/// );
/// assert_eq!(extract_ticket_key("no key here"), None);
/// ```
pub fn extract_ticket_key(response: &str) -> Option<String> {
    let strict = Regex::new(r"^[A-Z][A-Z0-9]*-\d+$").ok()?;

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(response) {
        if let Some(key) = value.get("key").and_then(|k| k.as_str()) {
            if strict.is_match(key) {
                return Some(key.to_string());
            }
        }
    }

    let scan = Regex::new(r"[A-Z][A-Z0-9]*-\d+").ok()?;
    scan.find(response).map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn finding() -> BugFinding {
        BugFinding {
            severity: Severity::Critical,
            kind: "null handling".into(),
            description: "user lookup dereferences a missing record".into(),
            location: "src/users.py line 51".into(),
            suggestion: "return 404 when the record is absent".into(),
        }
    }

    fn locator() -> PrLocator {
        PrLocator {
            owner: "octo".into(),
            repo: "demo".into(),
            number: 9,
        }
    }

    #[test]
    fn summary_is_severity_kind_description() {
        assert_eq!(
            build_summary(&finding()),
            "[CRITICAL] null handling: user lookup dereferences a missing record"
        );
    }

    #[test]
    fn summary_truncates_long_descriptions() {
        let mut bug = finding();
        bug.description = "d".repeat(200);
        let summary = build_summary(&bug);
        assert!(summary.ends_with(&"d".repeat(80)));
        assert!(!summary.contains(&"d".repeat(81)));
    }

    #[test]
    fn summary_truncates_on_char_boundaries() {
        let mut bug = finding();
        bug.description = "ü".repeat(100);
        let summary = build_summary(&bug);
        assert!(summary.ends_with(&"ü".repeat(80)));
    }

    #[test]
    fn description_includes_finding_fields_and_pr_link() {
        let body = build_description(&finding(), &locator());
        assert!(body.starts_with("**Bug found in PR #9**"));
        assert!(body.contains("**Repository:** octo/demo"));
        assert!(body.contains("**Severity:** critical"));
        assert!(body.contains("**Type:** null handling"));
        assert!(body.contains("**Location:** src/users.py line 51"));
        assert!(body.contains("return 404 when the record is absent"));
        assert!(body.contains("**PR Link:** https://github.com/octo/demo/pull/9"));
    }

    #[test]
    fn priority_mapping_is_total() {
        assert_eq!(priority_for(Severity::Low), "Low");
        assert_eq!(priority_for(Severity::Medium), "Medium");
        assert_eq!(priority_for(Severity::High), "High");
        assert_eq!(priority_for(Severity::Critical), "Highest");
    }

    #[test]
    fn issue_for_finding_assembles_all_fields() {
        let issue = issue_for_finding(&finding(), &locator(), "Defect");
        assert!(issue.summary.starts_with("[CRITICAL]"));
        assert_eq!(issue.issue_type, "Defect");
        assert_eq!(issue.priority, "Highest");
        assert!(issue.description.contains("**Repository:** octo/demo"));
    }

    #[test]
    fn extract_key_from_create_response() {
        let response = r#"{"id":"10001","key":"PROJ-123","self":"https://example/issue/10001"}"#;
        assert_eq!(extract_ticket_key(response), Some("PROJ-123".into()));
    }

    #[test]
    fn extract_key_accepts_digits_in_project() {
        assert_eq!(
            extract_ticket_key(r#"{"key":"A1B2-7"}"#),
            Some("A1B2-7".into())
        );
    }

    #[test]
    fn extract_key_rejects_malformed_json_key_but_scans_text() {
        // The JSON key field is not key-shaped; the scan still finds one
        // elsewhere in the body.
        let response = r#"{"key":"not a key","message":"duplicate of OPS-7"}"#;
        assert_eq!(extract_ticket_key(response), Some("OPS-7".into()));
    }

    #[test]
    fn extract_key_scans_free_text() {
        assert_eq!(
            extract_ticket_key("Issue CORE-88 created."),
            Some("CORE-88".into())
        );
    }

    #[test]
    fn extract_key_returns_none_without_a_key() {
        assert_eq!(extract_ticket_key("{}"), None);
        assert_eq!(extract_ticket_key("internal server error"), None);
        assert_eq!(extract_ticket_key("lowercase-123 is not a key"), None);
    }
}
