use std::sync::Arc;

use tracing::info;

use warden_core::{Result, ReviewAnalysis, StructuredDiff};
use warden_flow::{Flow, FlowBuilder, Target};
use warden_review::{build_analysis_prompt, parse_review_response, ChatModel};

/// State for the analysis stage.
pub struct AnalyzeState {
    /// Diffs under review.
    pub diffs: Vec<StructuredDiff>,
    /// Analysis result, set by ANALYZE_AND_GENERATE.
    pub analysis: ReviewAnalysis,
}

impl AnalyzeState {
    /// Fresh state for one analysis run.
    pub fn new(diffs: Vec<StructuredDiff>) -> Self {
        Self {
            diffs,
            analysis: ReviewAnalysis::default(),
        }
    }
}

/// Build the analysis flow: INIT, ANALYZE_AND_GENERATE.
///
/// Review commentary, bug findings, and test suggestions come from a single
/// model call. With no diffs to review the node returns the empty analysis
/// without calling the model at all.
///
/// A model fault aborts the run; there is nothing to report without an
/// analysis. A response the parser cannot decode is not a fault: the raw
/// text becomes the summary and every list stays empty.
pub fn build_analyze_flow(
    model: Arc<dyn ChatModel>,
    max_patch_chars: usize,
) -> Result<Flow<AnalyzeState>> {
    FlowBuilder::new("analyze")
        .node("INIT", |mut state: AnalyzeState| async move {
            state.analysis = ReviewAnalysis::default();
            Ok(state)
        })
        .node("ANALYZE_AND_GENERATE", {
            let model = model.clone();
            move |mut state: AnalyzeState| {
                let model = model.clone();
                async move {
                    if state.diffs.is_empty() {
                        info!("no reviewable diffs, skipping analysis");
                        return Ok(state);
                    }
                    let prompt = build_analysis_prompt(&state.diffs, max_patch_chars);
                    let raw = model.complete(&prompt).await?;
                    state.analysis = parse_review_response(&raw);
                    info!(
                        bugs = state.analysis.findings.len(),
                        tests = state.analysis.tests.as_ref().map_or(0, |t| t.cases.len()),
                        "analysis complete"
                    );
                    Ok(state)
                }
            }
        })
        .entry("INIT")
        .edge("INIT", "ANALYZE_AND_GENERATE")
        .edge("ANALYZE_AND_GENERATE", Target::End)
        .build()
}

/// Run the analysis flow over the given diffs.
pub async fn run_analyze(
    flow: &Flow<AnalyzeState>,
    diffs: Vec<StructuredDiff>,
) -> Result<ReviewAnalysis> {
    let state = flow.run(AnalyzeState::new(diffs)).await?;
    Ok(state.analysis)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use warden_core::{FileStatus, WardenError};

    struct FakeModel {
        response: std::result::Result<String, String>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ChatModel for FakeModel {
        async fn complete(&self, _prompt: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.response {
                Ok(text) => Ok(text.clone()),
                Err(msg) => Err(WardenError::Llm(msg.clone())),
            }
        }
    }

    fn model(
        response: std::result::Result<String, String>,
    ) -> (Arc<dyn ChatModel>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let model = Arc::new(FakeModel {
            response,
            calls: calls.clone(),
        });
        (model, calls)
    }

    fn diff(filename: &str) -> StructuredDiff {
        StructuredDiff {
            filename: filename.into(),
            language: warden_core::infer_language(filename).into(),
            status: FileStatus::Modified,
            additions: 2,
            deletions: 1,
            changes: 3,
            patch: "@@ -1 +1 @@".into(),
        }
    }

    #[tokio::test]
    async fn decodes_a_full_model_response() {
        let response = r#"{
            "review_comments": {
                "summary": "One real bug.",
                "quality_issues": ["long function"],
                "security_issues": [],
                "positive_feedback": ["good naming"]
            },
            "bugs_found": [{
                "severity": "high",
                "type": "logic error",
                "description": "loop runs once too many",
                "location": "src/app.py line 12",
                "suggestion": "use range(len(items))"
            }],
            "test_suggestions": {
                "test_framework": "pytest",
                "test_cases": [{
                    "test_name": "test_last_item",
                    "description": "covers the boundary",
                    "test_code": "def test_last_item(): ...",
                    "covers_bug": "loop bound"
                }]
            }
        }"#;
        let (model, calls) = model(Ok(response.into()));
        let flow = build_analyze_flow(model, 2000).unwrap();

        let analysis = run_analyze(&flow, vec![diff("src/app.py")]).await.unwrap();

        assert_eq!(analysis.summary, "One real bug.");
        assert_eq!(analysis.findings.len(), 1);
        assert_eq!(analysis.findings[0].location, "src/app.py line 12");
        assert_eq!(analysis.tests.as_ref().unwrap().framework, "pytest");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_diffs_skip_the_model_call() {
        let (model, calls) = model(Ok("{}".into()));
        let flow = build_analyze_flow(model, 2000).unwrap();

        let analysis = run_analyze(&flow, vec![]).await.unwrap();

        assert!(analysis.summary.is_empty());
        assert!(analysis.findings.is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn model_fault_aborts_the_run() {
        let (model, _) = model(Err("rate limited".into()));
        let flow = build_analyze_flow(model, 2000).unwrap();

        let err = run_analyze(&flow, vec![diff("src/app.py")]).await.unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("ANALYZE_AND_GENERATE"));
        assert!(msg.contains("rate limited"));
    }

    #[tokio::test]
    async fn undecodable_response_degrades_to_raw_summary() {
        let (model, _) = model(Ok("I could not produce JSON today.".into()));
        let flow = build_analyze_flow(model, 2000).unwrap();

        let analysis = run_analyze(&flow, vec![diff("src/app.py")]).await.unwrap();

        assert_eq!(analysis.summary, "I could not produce JSON today.");
        assert!(analysis.findings.is_empty());
    }
}
