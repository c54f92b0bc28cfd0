use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Coordinates of a pull request on GitHub.
///
/// # Examples
///
/// ```
/// use warden_core::PrLocator;
///
/// let pr = PrLocator {
///     owner: "rust-lang".into(),
///     repo: "cargo".into(),
///     number: 1234,
/// };
/// assert_eq!(pr.to_string(), "rust-lang/cargo#1234");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrLocator {
    /// Repository owner (user or organization).
    pub owner: String,
    /// Repository name.
    pub repo: String,
    /// Pull request number.
    pub number: u64,
}

impl fmt::Display for PrLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.owner, self.repo, self.number)
    }
}

/// Change status of a file within a pull request, as reported by GitHub.
///
/// Statuses outside the common set (`copied`, `changed`, `unchanged`)
/// deserialize to [`FileStatus::Other`] rather than failing the whole
/// changed-file listing.
///
/// # Examples
///
/// ```
/// use warden_core::FileStatus;
///
/// let s: FileStatus = serde_json::from_str("\"modified\"").unwrap();
/// assert_eq!(s, FileStatus::Modified);
///
/// let s: FileStatus = serde_json::from_str("\"copied\"").unwrap();
/// assert_eq!(s, FileStatus::Other);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// A newly added file.
    Added,
    /// An existing file modified in place.
    Modified,
    /// A deleted file.
    Removed,
    /// A renamed file.
    Renamed,
    /// Any status outside the common set.
    #[serde(other)]
    Other,
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileStatus::Added => write!(f, "added"),
            FileStatus::Modified => write!(f, "modified"),
            FileStatus::Removed => write!(f, "removed"),
            FileStatus::Renamed => write!(f, "renamed"),
            FileStatus::Other => write!(f, "other"),
        }
    }
}

/// One changed file from a pull request listing.
///
/// `patch` is the unified diff text for the file. GitHub omits it for binary
/// files and for very large diffs, in which case it is empty here.
///
/// # Examples
///
/// ```
/// use warden_core::{ChangedFile, FileStatus};
///
/// let file = ChangedFile {
///     filename: "src/auth.py".into(),
///     status: FileStatus::Modified,
///     additions: 12,
///     deletions: 3,
///     changes: 15,
///     patch: "@@ -1,3 +1,4 @@".into(),
/// };
/// assert_eq!(file.changes, 15);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangedFile {
    /// Path of the file within the repository.
    pub filename: String,
    /// Kind of change.
    pub status: FileStatus,
    /// Lines added.
    pub additions: u64,
    /// Lines deleted.
    pub deletions: u64,
    /// Total changed lines.
    pub changes: u64,
    /// Unified diff text, possibly empty.
    pub patch: String,
}

/// A changed file annotated with its inferred language, ready for analysis.
///
/// # Examples
///
/// ```
/// use warden_core::{ChangedFile, FileStatus, StructuredDiff};
///
/// let file = ChangedFile {
///     filename: "src/utils.py".into(),
///     status: FileStatus::Added,
///     additions: 40,
///     deletions: 0,
///     changes: 40,
///     patch: "@@ -0,0 +1,40 @@".into(),
/// };
/// let diff = StructuredDiff::from_changed_file(&file);
/// assert_eq!(diff.language, "py");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StructuredDiff {
    /// Path of the file within the repository.
    pub filename: String,
    /// Language tag inferred from the filename.
    pub language: String,
    /// Kind of change.
    pub status: FileStatus,
    /// Lines added.
    pub additions: u64,
    /// Lines deleted.
    pub deletions: u64,
    /// Total changed lines.
    pub changes: u64,
    /// Unified diff text.
    pub patch: String,
}

impl StructuredDiff {
    /// Annotate a changed file with its inferred language.
    pub fn from_changed_file(file: &ChangedFile) -> Self {
        Self {
            filename: file.filename.clone(),
            language: infer_language(&file.filename).to_string(),
            status: file.status,
            additions: file.additions,
            deletions: file.deletions,
            changes: file.changes,
            patch: file.patch.clone(),
        }
    }
}

/// Infer a language tag from a filename.
///
/// The tag is whatever follows the last `.` in the full path string, or
/// `"unknown"` when there is no dot at all. The rule is deliberately blunt:
/// it is only used to label diffs in the analysis prompt, and downstream
/// consumers must tolerate arbitrary tags.
///
/// # Examples
///
/// ```
/// use warden_core::infer_language;
///
/// assert_eq!(infer_language("src/utils.py"), "py");
/// assert_eq!(infer_language("archive.tar.gz"), "gz");
/// assert_eq!(infer_language(".gitignore"), "gitignore");
/// assert_eq!(infer_language("Makefile"), "unknown");
/// ```
pub fn infer_language(filename: &str) -> &str {
    match filename.rsplit_once('.') {
        Some((_, tag)) => tag,
        None => "unknown",
    }
}

/// Issue severity level for bug findings.
///
/// # Examples
///
/// ```
/// use warden_core::Severity;
///
/// let s: Severity = serde_json::from_str("\"high\"").unwrap();
/// assert_eq!(s, Severity::High);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Cosmetic or minor issue.
    Low,
    /// Worth fixing but not urgent.
    Medium,
    /// A real defect likely to bite users.
    High,
    /// Data loss, security exposure, or crash.
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(format!("unknown severity: {other}")),
        }
    }
}

impl Severity {
    /// Parse a severity from untrusted model output, defaulting to
    /// [`Severity::Medium`] for anything unrecognized.
    ///
    /// # Examples
    ///
    /// ```
    /// use warden_core::Severity;
    ///
    /// assert_eq!(Severity::parse_lossy("HIGH"), Severity::High);
    /// assert_eq!(Severity::parse_lossy("sev1"), Severity::Medium);
    /// assert_eq!(Severity::parse_lossy(""), Severity::Medium);
    /// ```
    pub fn parse_lossy(s: &str) -> Severity {
        s.parse().unwrap_or(Severity::Medium)
    }

    /// Returns `true` if `self` is at least as severe as `threshold`.
    ///
    /// Severity order: Critical > High > Medium > Low.
    ///
    /// # Examples
    ///
    /// ```
    /// use warden_core::Severity;
    ///
    /// assert!(Severity::Critical.meets_threshold(Severity::High));
    /// assert!(Severity::High.meets_threshold(Severity::High));
    /// assert!(!Severity::Low.meets_threshold(Severity::Medium));
    /// ```
    pub fn meets_threshold(self, threshold: Severity) -> bool {
        self.rank() <= threshold.rank()
    }

    fn rank(self) -> u8 {
        match self {
            Severity::Critical => 0,
            Severity::High => 1,
            Severity::Medium => 2,
            Severity::Low => 3,
        }
    }
}

/// A single bug reported by the analysis stage.
///
/// `location` is free text ("src/auth.py line 42") rather than a structured
/// path and line: it comes straight from the model and is displayed, never
/// dereferenced.
///
/// # Examples
///
/// ```
/// use warden_core::{BugFinding, Severity};
///
/// let bug = BugFinding {
///     severity: Severity::High,
///     kind: "index_error".into(),
///     description: "off-by-one in pagination loop".into(),
///     location: "src/list.py line 88".into(),
///     suggestion: "iterate to len(items)".into(),
/// };
/// assert_eq!(bug.severity, Severity::High);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BugFinding {
    /// Severity of the bug.
    pub severity: Severity,
    /// Short classification tag, e.g. `"null_check"` or `"race_condition"`.
    pub kind: String,
    /// Explanation of the defect.
    pub description: String,
    /// Free-text location hint.
    pub location: String,
    /// Suggested fix, possibly empty.
    pub suggestion: String,
}

/// One generated test case.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    /// Function-style test name.
    pub name: String,
    /// What the test verifies.
    pub description: String,
    /// Complete test source text.
    pub code: String,
    /// Which finding the test covers, as free text.
    pub covers: String,
}

/// Test cases proposed by the analysis stage, with their framework tag.
///
/// # Examples
///
/// ```
/// use warden_core::{TestCase, TestSuggestions};
///
/// let tests = TestSuggestions {
///     framework: "pytest".into(),
///     cases: vec![TestCase {
///         name: "test_empty_list".into(),
///         description: "empty input returns empty output".into(),
///         code: "def test_empty_list(): ...".into(),
///         covers: "index_error in pagination".into(),
///     }],
/// };
/// assert_eq!(tests.cases.len(), 1);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestSuggestions {
    /// Test framework the cases are written for.
    pub framework: String,
    /// Proposed test cases, in model order.
    pub cases: Vec<TestCase>,
}

/// Everything the analysis stage produced for one pull request.
///
/// When the model response cannot be decoded, `summary` carries the raw
/// response text and every list is empty; a run never loses the model's
/// words to a parse failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewAnalysis {
    /// Overall free-text assessment.
    pub summary: String,
    /// Concrete bugs found, in model order.
    pub findings: Vec<BugFinding>,
    /// Code quality observations.
    pub quality_issues: Vec<String>,
    /// Security observations.
    pub security_issues: Vec<String>,
    /// Things the change does well.
    pub positive_feedback: Vec<String>,
    /// Generated test cases, when the model proposed any.
    pub tests: Option<TestSuggestions>,
}

impl ReviewAnalysis {
    /// Build the degraded analysis used when the model response has no
    /// decodable JSON object: the raw text becomes the summary.
    pub fn from_raw_text(raw: &str) -> Self {
        Self {
            summary: raw.trim().to_string(),
            ..Self::default()
        }
    }
}

/// A ticket successfully filed for one bug finding.
///
/// # Examples
///
/// ```
/// use warden_core::{Severity, TicketRecord};
///
/// let ticket = TicketRecord {
///     key: "PROJ-42".into(),
///     url: "https://example.atlassian.net/browse/PROJ-42".into(),
///     severity: Severity::High,
///     kind: "index_error".into(),
/// };
/// assert_eq!(ticket.key, "PROJ-42");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketRecord {
    /// Tracker issue key, e.g. `"PROJ-42"`.
    pub key: String,
    /// Browse URL for the ticket.
    pub url: String,
    /// Severity of the originating finding.
    pub severity: Severity,
    /// Kind tag of the originating finding.
    pub kind: String,
}

/// Which of the three write-back operations actually happened.
///
/// The flags are independent: a failed test commit does not prevent the
/// label from being applied.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteBackOutcome {
    /// A summary comment was posted on the pull request.
    pub comment_posted: bool,
    /// Generated test files were committed to the head branch.
    pub tests_committed: bool,
    /// The review label was applied.
    pub pr_tagged: bool,
}

/// A stage that faulted during a run that continued degraded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageFailure {
    /// Stage name, e.g. `"tickets"`.
    pub stage: String,
    /// Rendered error message.
    pub message: String,
}

/// Output format for CLI subcommands.
///
/// Implements [`FromStr`] so it can be used directly with `clap` argument parsing.
///
/// # Examples
///
/// ```
/// use warden_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summary.
    #[default]
    Text,
    /// Machine-readable JSON with camelCase keys.
    Json,
    /// Markdown-formatted output.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
