use std::sync::Arc;

use glob::Pattern;
use tracing::{debug, info};

use warden_core::{ChangedFile, PrLocator, Result, StructuredDiff, WardenError};
use warden_flow::{Flow, FlowBuilder, Target};
use warden_github::{parse_pr_url, PullRequestSource};

use crate::Connector;

/// State for the fetch stage.
///
/// The source session is a run-local handle: acquired by CONNECT, dropped
/// with the state when the flow finishes or faults.
pub struct FetchState {
    /// Pull request URL as given by the caller.
    pub pr_url: String,
    /// Parsed coordinates, set by INIT.
    pub locator: Option<PrLocator>,
    /// Raw changed-file listing, set by FETCH_FILES.
    pub changed_files: Vec<ChangedFile>,
    /// Reviewable diffs, set by EXTRACT_DIFFS.
    pub diffs: Vec<StructuredDiff>,
    /// Whether any diff survived extraction.
    pub has_valid_files: bool,
    /// Files dropped for empty patches or skip patterns.
    pub skipped_files: usize,
    session: Option<Arc<dyn PullRequestSource>>,
}

impl FetchState {
    /// Fresh state for one fetch run.
    pub fn new(pr_url: impl Into<String>) -> Self {
        Self {
            pr_url: pr_url.into(),
            locator: None,
            changed_files: Vec::new(),
            diffs: Vec::new(),
            has_valid_files: false,
            skipped_files: 0,
            session: None,
        }
    }
}

/// What the fetch stage hands to the rest of the pipeline.
#[derive(Debug)]
pub struct FetchOutput {
    /// Parsed pull request coordinates.
    pub locator: PrLocator,
    /// Changed files returned by the source listing.
    pub files_fetched: usize,
    /// Files dropped before analysis.
    pub skipped_files: usize,
    /// Diffs ready for the analysis stage.
    pub diffs: Vec<StructuredDiff>,
}

/// Build the fetch flow: INIT, CONNECT, FETCH_FILES, EXTRACT_DIFFS.
///
/// The URL is parsed in INIT, before CONNECT runs, so a malformed URL never
/// touches the source. A connector failure here is a fault: nothing
/// downstream can happen without the changed files.
///
/// # Errors
///
/// Returns [`WardenError::Config`] when a skip pattern is not a valid glob.
pub fn build_fetch_flow(
    connect: Connector<Arc<dyn PullRequestSource>>,
    skip_patterns: &[String],
) -> Result<Flow<FetchState>> {
    let patterns = Arc::new(compile_patterns(skip_patterns)?);

    FlowBuilder::new("fetch")
        .node("INIT", |mut state: FetchState| async move {
            state.locator = None;
            state.changed_files.clear();
            state.diffs.clear();
            state.has_valid_files = false;
            state.skipped_files = 0;
            state.session = None;
            state.locator = Some(parse_pr_url(&state.pr_url)?);
            Ok(state)
        })
        .node("CONNECT", {
            let connect = connect.clone();
            move |mut state: FetchState| {
                let connect = connect.clone();
                async move {
                    state.session = Some(connect()?);
                    Ok(state)
                }
            }
        })
        .node("FETCH_FILES", |mut state: FetchState| async move {
            let Some(session) = state.session.clone() else {
                return Err(WardenError::Assembly(
                    "file listing reached without a source session".into(),
                ));
            };
            let Some(locator) = state.locator.clone() else {
                return Err(WardenError::Assembly(
                    "file listing reached without parsed coordinates".into(),
                ));
            };
            state.changed_files = session.list_changed_files(&locator).await?;
            info!(pr = %locator, files = state.changed_files.len(), "changed files fetched");
            Ok(state)
        })
        .node("EXTRACT_DIFFS", {
            let patterns = patterns.clone();
            move |mut state: FetchState| {
                let patterns = patterns.clone();
                async move {
                    for file in &state.changed_files {
                        if file.patch.is_empty() {
                            debug!(file = %file.filename, "no patch text, skipping");
                            state.skipped_files += 1;
                            continue;
                        }
                        if patterns.iter().any(|p| p.matches(&file.filename)) {
                            debug!(file = %file.filename, "matches skip pattern, skipping");
                            state.skipped_files += 1;
                            continue;
                        }
                        state.diffs.push(StructuredDiff::from_changed_file(file));
                    }
                    state.has_valid_files = !state.diffs.is_empty();
                    info!(
                        reviewable = state.diffs.len(),
                        skipped = state.skipped_files,
                        "diffs extracted"
                    );
                    Ok(state)
                }
            }
        })
        .entry("INIT")
        .edge("INIT", "CONNECT")
        .edge("CONNECT", "FETCH_FILES")
        .edge("FETCH_FILES", "EXTRACT_DIFFS")
        .edge("EXTRACT_DIFFS", Target::End)
        .build()
}

/// Run the fetch flow for one pull request URL.
pub async fn run_fetch(flow: &Flow<FetchState>, pr_url: &str) -> Result<FetchOutput> {
    let state = flow.run(FetchState::new(pr_url)).await?;
    let Some(locator) = state.locator else {
        return Err(WardenError::Assembly(
            "fetch flow finished without parsed coordinates".into(),
        ));
    };
    Ok(FetchOutput {
        locator,
        files_fetched: state.changed_files.len(),
        skipped_files: state.skipped_files,
        diffs: state.diffs,
    })
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Pattern>> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|e| WardenError::Config(format!("invalid skip pattern '{p}': {e}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use warden_core::FileStatus;

    struct FakeSource {
        files: Vec<ChangedFile>,
        fail: bool,
        list_calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl PullRequestSource for FakeSource {
        async fn list_changed_files(&self, _pr: &PrLocator) -> Result<Vec<ChangedFile>> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(WardenError::Github("503 from listing".into()));
            }
            Ok(self.files.clone())
        }
    }

    struct Counters {
        connects: Arc<AtomicUsize>,
        lists: Arc<AtomicUsize>,
    }

    fn counting_connector(
        files: Vec<ChangedFile>,
        fail: bool,
    ) -> (Connector<Arc<dyn PullRequestSource>>, Counters) {
        let connects = Arc::new(AtomicUsize::new(0));
        let lists = Arc::new(AtomicUsize::new(0));
        let counters = Counters {
            connects: connects.clone(),
            lists: lists.clone(),
        };
        let connector: Connector<Arc<dyn PullRequestSource>> = Arc::new(move || {
            connects.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(FakeSource {
                files: files.clone(),
                fail,
                list_calls: lists.clone(),
            }) as Arc<dyn PullRequestSource>)
        });
        (connector, counters)
    }

    fn file(name: &str, patch: &str) -> ChangedFile {
        ChangedFile {
            filename: name.into(),
            status: FileStatus::Modified,
            additions: 1,
            deletions: 1,
            changes: 2,
            patch: patch.into(),
        }
    }

    #[tokio::test]
    async fn lists_and_extracts_diffs() {
        let (connect, counters) = counting_connector(
            vec![file("src/app.py", "@@ -1 +1 @@"), file("src/db.py", "@@ -2 +2 @@")],
            false,
        );
        let flow = build_fetch_flow(connect, &[]).unwrap();

        let out = run_fetch(&flow, "https://github.com/octo/demo/pull/7")
            .await
            .unwrap();

        assert_eq!(out.locator.to_string(), "octo/demo#7");
        assert_eq!(out.files_fetched, 2);
        assert_eq!(out.skipped_files, 0);
        assert_eq!(out.diffs.len(), 2);
        assert_eq!(out.diffs[0].language, "py");
        assert_eq!(counters.connects.load(Ordering::SeqCst), 1);
        assert_eq!(counters.lists.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_url_faults_before_any_listing() {
        let (connect, counters) = counting_connector(vec![file("a.py", "@@")], false);
        let flow = build_fetch_flow(connect, &[]).unwrap();

        let err = run_fetch(&flow, "https://gitlab.com/octo/demo/pull/7")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("INIT"));
        assert_eq!(counters.connects.load(Ordering::SeqCst), 0);
        assert_eq!(counters.lists.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_patches_are_skipped_and_counted() {
        let (connect, _) = counting_connector(
            vec![file("src/app.py", "@@ -1 +1 @@"), file("assets/logo.png", "")],
            false,
        );
        let flow = build_fetch_flow(connect, &[]).unwrap();

        let out = run_fetch(&flow, "https://github.com/octo/demo/pull/7")
            .await
            .unwrap();

        assert_eq!(out.files_fetched, 2);
        assert_eq!(out.skipped_files, 1);
        assert_eq!(out.diffs.len(), 1);
        assert_eq!(out.diffs[0].filename, "src/app.py");
    }

    #[tokio::test]
    async fn skip_patterns_drop_matching_files() {
        let (connect, _) = counting_connector(
            vec![
                file("Cargo.lock", "@@ lockfile churn @@"),
                file("vendor/lib/util.js", "@@ vendored @@"),
                file("src/app.py", "@@ -1 +1 @@"),
            ],
            false,
        );
        let patterns = vec!["*.lock".to_string(), "vendor/**".to_string()];
        let flow = build_fetch_flow(connect, &patterns).unwrap();

        let out = run_fetch(&flow, "https://github.com/octo/demo/pull/7")
            .await
            .unwrap();

        assert_eq!(out.skipped_files, 2);
        assert_eq!(out.diffs.len(), 1);
        assert_eq!(out.diffs[0].filename, "src/app.py");
    }

    #[tokio::test]
    async fn rerunning_the_flow_yields_identical_diffs() {
        let (connect, counters) = counting_connector(
            vec![
                file("src/app.py", "@@ -1 +1 @@"),
                file("assets/logo.png", ""),
                file("src/db.py", "@@ -2 +2 @@"),
            ],
            false,
        );
        let flow = build_fetch_flow(connect, &[]).unwrap();

        let first = run_fetch(&flow, "https://github.com/octo/demo/pull/7")
            .await
            .unwrap();
        let second = run_fetch(&flow, "https://github.com/octo/demo/pull/7")
            .await
            .unwrap();

        // Each run acquires and releases its own session.
        assert_eq!(counters.connects.load(Ordering::SeqCst), 2);
        assert_eq!(first.files_fetched, second.files_fetched);
        assert_eq!(first.skipped_files, second.skipped_files);
        assert_eq!(first.diffs.len(), second.diffs.len());
        for (a, b) in first.diffs.iter().zip(&second.diffs) {
            assert_eq!(a.filename, b.filename);
            assert_eq!(a.language, b.language);
            assert_eq!(a.patch, b.patch);
        }
    }

    #[tokio::test]
    async fn listing_error_names_the_node() {
        let (connect, _) = counting_connector(vec![], true);
        let flow = build_fetch_flow(connect, &[]).unwrap();

        let err = run_fetch(&flow, "https://github.com/octo/demo/pull/7")
            .await
            .unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("FETCH_FILES"));
        assert!(msg.contains("503 from listing"));
    }

    struct ProbeSource {
        released: Arc<AtomicBool>,
    }

    #[async_trait]
    impl PullRequestSource for ProbeSource {
        async fn list_changed_files(&self, _pr: &PrLocator) -> Result<Vec<ChangedFile>> {
            Err(WardenError::Github("503 from listing".into()))
        }
    }

    impl Drop for ProbeSource {
        fn drop(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn source_handle_is_released_when_the_listing_faults() {
        let released = Arc::new(AtomicBool::new(false));
        let connect: Connector<Arc<dyn PullRequestSource>> = {
            let released = released.clone();
            Arc::new(move || {
                Ok(Arc::new(ProbeSource {
                    released: released.clone(),
                }) as Arc<dyn PullRequestSource>)
            })
        };
        let flow = build_fetch_flow(connect, &[]).unwrap();

        let err = run_fetch(&flow, "https://github.com/octo/demo/pull/7")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("FETCH_FILES"));
        assert!(released.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn connector_failure_is_a_fault() {
        let connect: Connector<Arc<dyn PullRequestSource>> =
            Arc::new(|| Err(WardenError::Config("GITHUB_TOKEN not set".into())));
        let flow = build_fetch_flow(connect, &[]).unwrap();

        let err = run_fetch(&flow, "https://github.com/octo/demo/pull/7")
            .await
            .unwrap_err();

        let msg = err.to_string();
        assert!(msg.contains("CONNECT"));
        assert!(msg.contains("GITHUB_TOKEN"));
    }

    #[test]
    fn invalid_skip_pattern_fails_assembly() {
        let (connect, _) = counting_connector(vec![], false);
        let err = build_fetch_flow(connect, &["[".to_string()]).unwrap_err();
        assert!(matches!(err, WardenError::Config(_)));
        assert!(err.to_string().contains("invalid skip pattern"));
    }
}
