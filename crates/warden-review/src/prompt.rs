use warden_core::StructuredDiff;

/// Instruction block prepended to every analysis request.
///
/// Asks for review commentary, concrete bug findings, and regression test
/// suggestions in one response, as a single JSON object.
pub const ANALYSIS_INSTRUCTION: &str = r#"You are an expert code reviewer and QA engineer. Analyze the code changes below and produce a thorough review.

Respond with ONLY a JSON object in exactly this format:
{
    "review_comments": {
        "summary": "Overall review summary",
        "quality_issues": ["code quality issue 1", "code quality issue 2"],
        "security_issues": ["security concern 1"],
        "positive_feedback": ["what was done well"]
    },
    "bugs_found": [
        {
            "severity": "critical|high|medium|low",
            "type": "bug category (e.g. logic error, null handling, race condition)",
            "description": "clear description of the bug",
            "location": "file and function where the bug lives",
            "suggestion": "how to fix it"
        }
    ],
    "test_suggestions": {
        "test_framework": "recommended test framework for this code",
        "test_cases": [
            {
                "test_name": "test_function_name",
                "description": "what this test verifies",
                "test_code": "complete runnable test code",
                "covers_bug": "which bug or behavior this test covers"
            }
        ]
    }
}

Rules:
- Report only real problems you can point at in the diff. An empty bugs_found list is a valid answer.
- Severity reflects user impact: critical breaks the product, high breaks a feature, medium degrades behavior, low is cosmetic.
- Test code must be complete and runnable, not pseudocode.
- Do not wrap the JSON in markdown fences or add commentary around it."#;

/// Render one changed file as a prompt section.
///
/// Patches longer than `max_patch_chars` are cut at the limit; the model
/// sees the head of the diff, which carries the hunk headers.
pub fn render_diff(diff: &StructuredDiff, max_patch_chars: usize) -> String {
    let patch: String = diff.patch.chars().take(max_patch_chars).collect();
    format!(
        "=== File: {} ===\nLanguage: {}\nChanges: +{}/-{}\n\nDiff:\n{}\n",
        diff.filename, diff.language, diff.additions, diff.deletions, patch
    )
}

/// Render every changed file into one block, separated by blank lines.
pub fn render_diffs(diffs: &[StructuredDiff], max_patch_chars: usize) -> String {
    diffs
        .iter()
        .map(|d| render_diff(d, max_patch_chars))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Build the full analysis prompt for a set of changed files.
///
/// # Examples
///
/// ```
/// use warden_core::{FileStatus, StructuredDiff};
/// use warden_review::build_analysis_prompt;
///
/// let diffs = vec![StructuredDiff {
///     filename: "src/lib.rs".into(),
///     language: "rs".into(),
///     status: FileStatus::Modified,
///     additions: 1,
///     deletions: 1,
///     changes: 2,
///     patch: "@@ -1 +1 @@\n-old\n+new".into(),
/// }];
/// let prompt = build_analysis_prompt(&diffs, 2000);
/// assert!(prompt.contains("=== File: src/lib.rs ==="));
/// ```
pub fn build_analysis_prompt(diffs: &[StructuredDiff], max_patch_chars: usize) -> String {
    format!(
        "{}\n\nAnalyze this code change:\n{}",
        ANALYSIS_INSTRUCTION,
        render_diffs(diffs, max_patch_chars)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn diff(filename: &str, patch: &str) -> StructuredDiff {
        StructuredDiff {
            filename: filename.into(),
            language: warden_core::infer_language(filename).into(),
            status: warden_core::FileStatus::Modified,
            additions: 3,
            deletions: 1,
            changes: 4,
            patch: patch.into(),
        }
    }

    #[test]
    fn render_diff_includes_header_and_counts() {
        let rendered = render_diff(&diff("src/main.py", "@@ -1 +1 @@"), 2000);
        assert!(rendered.contains("=== File: src/main.py ==="));
        assert!(rendered.contains("Language: py"));
        assert!(rendered.contains("Changes: +3/-1"));
        assert!(rendered.contains("@@ -1 +1 @@"));
    }

    #[test]
    fn render_diff_truncates_long_patches() {
        let long_patch = "x".repeat(5000);
        let rendered = render_diff(&diff("big.rs", &long_patch), 2000);
        assert!(rendered.contains(&"x".repeat(2000)));
        assert!(!rendered.contains(&"x".repeat(2001)));
    }

    #[test]
    fn render_diff_truncates_on_char_boundaries() {
        let patch = "é".repeat(10);
        let rendered = render_diff(&diff("accents.txt", &patch), 4);
        assert!(rendered.contains(&"é".repeat(4)));
        assert!(!rendered.contains(&"é".repeat(5)));
    }

    #[test]
    fn render_diffs_joins_files() {
        let diffs = vec![diff("a.rs", "+a"), diff("b.rs", "+b")];
        let rendered = render_diffs(&diffs, 2000);
        assert!(rendered.contains("=== File: a.rs ==="));
        assert!(rendered.contains("=== File: b.rs ==="));
        let a_pos = rendered.find("a.rs").unwrap();
        let b_pos = rendered.find("b.rs").unwrap();
        assert!(a_pos < b_pos);
    }

    #[test]
    fn prompt_leads_with_instruction() {
        let prompt = build_analysis_prompt(&[diff("x.go", "+x")], 2000);
        assert!(prompt.starts_with("You are an expert code reviewer"));
        assert!(prompt.contains("Analyze this code change:"));
        assert!(prompt.contains("bugs_found"));
        assert!(prompt.contains("test_suggestions"));
    }
}
