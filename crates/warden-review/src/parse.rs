use serde::Deserialize;
use tracing::warn;

use warden_core::{BugFinding, ReviewAnalysis, Severity, TestCase, TestSuggestions};

/// Wire shape of the model's combined response. Every field defaults so a
/// partial answer still decodes.
#[derive(Debug, Default, Deserialize)]
struct CombinedResponse {
    #[serde(default)]
    review_comments: ReviewComments,
    #[serde(default)]
    bugs_found: Vec<LooseBug>,
    #[serde(default)]
    test_suggestions: Option<LooseTestSuggestions>,
}

#[derive(Debug, Default, Deserialize)]
struct ReviewComments {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    quality_issues: Vec<String>,
    #[serde(default)]
    security_issues: Vec<String>,
    #[serde(default)]
    positive_feedback: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LooseBug {
    #[serde(default)]
    severity: String,
    #[serde(default, rename = "type")]
    kind: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    location: String,
    #[serde(default)]
    suggestion: String,
}

#[derive(Debug, Default, Deserialize)]
struct LooseTestSuggestions {
    #[serde(default)]
    test_framework: String,
    #[serde(default)]
    test_cases: Vec<LooseTestCase>,
}

#[derive(Debug, Default, Deserialize)]
struct LooseTestCase {
    #[serde(default)]
    test_name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    test_code: String,
    #[serde(default)]
    covers_bug: String,
}

impl From<CombinedResponse> for ReviewAnalysis {
    fn from(wire: CombinedResponse) -> Self {
        ReviewAnalysis {
            summary: wire.review_comments.summary,
            findings: wire
                .bugs_found
                .into_iter()
                .map(|b| BugFinding {
                    severity: Severity::parse_lossy(&b.severity),
                    kind: b.kind,
                    description: b.description,
                    location: b.location,
                    suggestion: b.suggestion,
                })
                .collect(),
            quality_issues: wire.review_comments.quality_issues,
            security_issues: wire.review_comments.security_issues,
            positive_feedback: wire.review_comments.positive_feedback,
            tests: wire.test_suggestions.map(|t| TestSuggestions {
                framework: t.test_framework,
                cases: t
                    .test_cases
                    .into_iter()
                    .map(|c| TestCase {
                        name: c.test_name,
                        description: c.description,
                        code: c.test_code,
                        covers: c.covers_bug,
                    })
                    .collect(),
            }),
        }
    }
}

/// Strip markdown code fences from LLM output.
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

/// Slice out the outermost JSON object: first `{` through last `}`.
///
/// Models routinely wrap their JSON in prose; the span between the first
/// opening brace and the last closing brace is the answer.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}

/// Decode a model response into a [`ReviewAnalysis`].
///
/// Never fails: when no JSON object can be found or decoded, the raw
/// response text is preserved as the review summary so the run still
/// produces a report.
///
/// # Examples
///
/// ```
/// use warden_review::parse_review_response;
///
/// let analysis = parse_review_response(
///     r#"{"review_comments": {"summary": "LGTM"}, "bugs_found": []}"#,
/// );
/// assert_eq!(analysis.summary, "LGTM");
/// assert!(analysis.findings.is_empty());
/// ```
pub fn parse_review_response(raw: &str) -> ReviewAnalysis {
    let text = strip_code_fences(raw);
    let Some(json) = extract_json_object(text) else {
        warn!("no JSON object in model response, keeping raw text");
        return ReviewAnalysis::from_raw_text(raw);
    };

    match serde_json::from_str::<CombinedResponse>(json) {
        Ok(wire) => wire.into(),
        Err(e) => {
            warn!(error = %e, "model response is not valid JSON, keeping raw text");
            ReviewAnalysis::from_raw_text(raw)
        }
    }
}
