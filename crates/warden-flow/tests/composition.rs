//! Integration test: flows nested inside flows, the shape the review
//! pipeline uses for its stages.

use std::sync::Arc;

use warden_flow::{Flow, FlowBuilder, Target};

#[derive(Debug, Default)]
struct WordState {
    input: String,
    words: Vec<String>,
}

#[derive(Debug, Default)]
struct OuterState {
    text: String,
    word_count: usize,
    shouted: Vec<String>,
}

fn word_flow() -> Flow<WordState> {
    FlowBuilder::new("words")
        .node("INIT", |mut s: WordState| async move {
            s.words.clear();
            Ok(s)
        })
        .node("SPLIT", |mut s: WordState| async move {
            s.words = s.input.split_whitespace().map(str::to_string).collect();
            Ok(s)
        })
        .entry("INIT")
        .edge("INIT", "SPLIT")
        .edge("SPLIT", Target::End)
        .build()
        .unwrap()
}

#[tokio::test]
async fn a_node_can_run_an_inner_flow_and_project_its_output() {
    let inner = Arc::new(word_flow());

    let inner_for_node = inner.clone();
    let outer = FlowBuilder::new("outer")
        .node("COUNT", move |mut s: OuterState| {
            let inner = inner_for_node.clone();
            async move {
                // Project only the input field in, only the outputs back out.
                let result = inner
                    .run(WordState {
                        input: s.text.clone(),
                        ..WordState::default()
                    })
                    .await?;
                s.word_count = result.words.len();
                s.shouted = result.words.iter().map(|w| w.to_uppercase()).collect();
                Ok(s)
            }
        })
        .entry("COUNT")
        .edge("COUNT", Target::End)
        .build()
        .unwrap();

    let out = outer
        .run(OuterState {
            text: "fetch analyze file report".into(),
            ..OuterState::default()
        })
        .await
        .unwrap();

    assert_eq!(out.word_count, 4);
    assert_eq!(out.shouted, vec!["FETCH", "ANALYZE", "FILE", "REPORT"]);
}

#[tokio::test]
async fn inner_flow_faults_surface_through_the_outer_run() {
    let inner = Arc::new(
        FlowBuilder::new("inner")
            .node("BOOM", |_: WordState| async {
                Err(warden_core::WardenError::Github("boom".into()))
            })
            .entry("BOOM")
            .edge("BOOM", Target::End)
            .build()
            .unwrap(),
    );

    let outer = FlowBuilder::new("outer")
        .node("WRAP", move |s: OuterState| {
            let inner = inner.clone();
            async move {
                inner.run(WordState::default()).await?;
                Ok(s)
            }
        })
        .entry("WRAP")
        .edge("WRAP", Target::End)
        .build()
        .unwrap();

    let err = outer.run(OuterState::default()).await.unwrap_err();
    let msg = err.to_string();
    assert!(msg.contains("'WRAP' in flow 'outer'"), "got: {msg}");
    assert!(msg.contains("'BOOM' in flow 'inner'"), "got: {msg}");
}

#[test]
fn flows_are_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>(_: &T) {}
    let flow = word_flow();
    assert_send_sync(&flow);
}

#[tokio::test]
async fn independent_flows_from_one_factory_share_nothing() {
    let a = word_flow();
    let b = word_flow();

    let (ra, rb) = tokio::join!(
        a.run(WordState {
            input: "one two".into(),
            ..WordState::default()
        }),
        b.run(WordState {
            input: "three".into(),
            ..WordState::default()
        }),
    );

    assert_eq!(ra.unwrap().words.len(), 2);
    assert_eq!(rb.unwrap().words.len(), 1);
}
