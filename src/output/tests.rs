//! Tests for output module

use super::*;
use crate::engine::EmittedRecord;
use crate::partition::PartitionContext;
use crate::state::{Bookmark, BookmarkEntry, State};
use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

fn record() -> EmittedRecord {
    EmittedRecord::new(
        "stacks",
        PartitionContext::new().with("org_name", "acme"),
        json!({"org_name": "acme", "stack_name": "prod"}),
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
    )
}

fn state() -> State {
    let mut state = State::new();
    state.set_entry(
        "audit_logs",
        r#"{"org_name":"acme"}"#,
        BookmarkEntry::new("timestamp", &Bookmark::UnixTime(1_700_000_000)),
    );
    state
}

// ============================================================================
// Message Tests
// ============================================================================

#[test]
fn test_record_message_layout() {
    let line = Message::record(record()).to_json_line().unwrap();
    let value: Value = serde_json::from_str(&line).unwrap();

    assert_eq!(
        value,
        json!({
            "type": "RECORD",
            "stream": "stacks",
            "context": {"org_name": "acme"},
            "record": {"org_name": "acme", "stack_name": "prod"},
            "time_extracted": "2024-03-01T12:00:00Z"
        })
    );
}

#[test]
fn test_state_message_layout() {
    let line = Message::state(state()).to_json_line().unwrap();
    let value: Value = serde_json::from_str(&line).unwrap();

    assert_eq!(value["type"], "STATE");
    assert_eq!(
        value["value"]["bookmarks"]["audit_logs"][r#"{"org_name":"acme"}"#]["value"],
        1_700_000_000
    );
}

#[test]
fn test_message_kinds() {
    assert!(Message::record(record()).is_record());
    assert!(!Message::record(record()).is_state());
    assert!(Message::state(State::new()).is_state());
}

// ============================================================================
// Sink Tests
// ============================================================================

#[tokio::test]
async fn test_json_lines_sink_one_object_per_line() {
    let sink = JsonLinesSink::new(Vec::new());
    sink.write(&Message::record(record())).await.unwrap();
    sink.write(&Message::state(state())).await.unwrap();
    sink.flush().await.unwrap();

    let output = String::from_utf8(sink.into_inner()).unwrap();
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(output.ends_with('\n'));

    let types: Vec<String> = lines
        .iter()
        .map(|line| serde_json::from_str::<Value>(line).unwrap()["type"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(types, vec!["RECORD", "STATE"]);
}

#[tokio::test]
async fn test_memory_sink_filters() {
    let sink = MemorySink::new();
    sink.write(&Message::record(record())).await.unwrap();
    sink.write(&Message::state(state())).await.unwrap();

    assert_eq!(sink.messages().len(), 2);
    assert_eq!(sink.records(), vec![record()]);
    assert_eq!(sink.records_of("stacks").len(), 1);
    assert!(sink.records_of("audit_logs").is_empty());
    assert_eq!(sink.states(), vec![state()]);
}
