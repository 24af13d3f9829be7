mod common;

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use common::{dispatcher, init_logging, EditingBackend};
use pretty_assertions::assert_eq;
use redline_core::{prioritize, split_text, Chunk, SplitSettings, Target};
use redline_engine::{aggregate, process_all, InferenceFailure, ProgressSink};

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<(u8, String)>>,
}

impl ProgressSink for RecordingSink {
    fn progress(&self, progress: u8, message: String) {
        self.events.lock().unwrap().push((progress, message));
    }
}

fn document() -> String {
    (1..=30)
        .map(|i| {
            format!("{i}. Section {i}: ABC Corp. supplies unit {i} and invoices monthly for it.")
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn chunks(text: &str) -> Vec<Chunk> {
    split_text(
        text,
        SplitSettings {
            max_size: 400,
            overlap: 80,
        },
    )
}

#[tokio::test(start_paused = true)]
async fn results_come_back_in_document_order_under_the_cap() {
    init_logging();
    let text = document();
    let chunks = chunks(&text);
    assert!(chunks.len() > 5);
    let targets = vec![Target {
        text: "unit 30".to_string(),
        offset: 0,
    }];
    let ordered = prioritize(chunks.clone(), &targets);
    assert_ne!(ordered[0].index, 0);

    let backend = Arc::new(
        EditingBackend::new("ABC Corp.", "XYZ Technologies, Inc.")
            .with_delay(Duration::from_millis(200)),
    );
    let dispatcher = dispatcher(backend.clone());
    let sink = RecordingSink::default();

    let results = process_all(&dispatcher, &ordered, "rename", 2, false, &sink)
        .await
        .unwrap();

    let indices: Vec<_> = results.iter().map(|r| r.index).collect();
    assert_eq!(indices, (0..chunks.len()).collect::<Vec<_>>());
    assert!(results.iter().all(|r| r.changed));
    assert_eq!(backend.calls(), chunks.len());
    assert!(backend.max_in_flight.load(Ordering::SeqCst) <= 2);

    let merged = aggregate(&chunks, &results);
    assert_eq!(merged, text.replace("ABC Corp.", "XYZ Technologies, Inc."));

    let events = sink.events.lock().unwrap();
    assert_eq!(events.len(), chunks.len());
    assert!(events.windows(2).all(|w| w[0].0 <= w[1].0));
    assert_eq!(events.last().unwrap().0, 70);
}

#[tokio::test]
async fn credential_failure_aborts_the_run() {
    let text = document();
    let chunks = chunks(&text);
    let backend = Arc::new(
        EditingBackend::new("ABC", "XYZ").failing_on("unit 3 ", InferenceFailure::CredentialOrAuth),
    );
    let dispatcher = dispatcher(backend);
    let sink = RecordingSink::default();

    let err = process_all(&dispatcher, &chunks, "rename", 1, false, &sink)
        .await
        .unwrap_err();
    assert_eq!(err.kind, InferenceFailure::CredentialOrAuth);
}

#[tokio::test(start_paused = true)]
async fn other_failures_leave_the_chunk_unchanged() {
    let text = document();
    let chunks = chunks(&text);
    let backend = Arc::new(
        EditingBackend::new("ABC", "XYZ")
            .failing_on("unit 1 ", InferenceFailure::ServiceUnavailable),
    );
    let dispatcher = dispatcher(backend);
    let sink = RecordingSink::default();

    let results = process_all(&dispatcher, &chunks, "rename", 3, false, &sink)
        .await
        .unwrap();

    assert!(!results[0].changed);
    assert_eq!(results[0].text, chunks[0].text);
    assert!(results[1..].iter().any(|r| r.changed));
}
