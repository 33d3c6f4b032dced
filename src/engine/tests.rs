//! Tests for the sync engine

use super::*;
use crate::auth::AuthConfig;
use crate::error::Error;
use crate::http::HttpClientConfig;
use crate::output::MemorySink;
use crate::pagination::PaginationStrategy;
use crate::partition::{ContextField, PartitionContext, PartitionSource};
use crate::streams::{Catalog, ReplicationKey, ServerFilter, StreamDefinition};
use crate::types::BookmarkKind;
use futures::TryStreamExt;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const ACME: &str = r#"{"org_name":"acme"}"#;

const UPDATED_AT: ReplicationKey = ReplicationKey {
    field: "updated_at",
    kind: BookmarkKind::Timestamp,
    sorted: true,
    server_filter: None,
};

const EVENT_TIME: ReplicationKey = ReplicationKey {
    field: "timestamp",
    kind: BookmarkKind::UnixTime,
    sorted: false,
    server_filter: Some(ServerFilter { param: "startTime" }),
};

const GADGET_FIELDS: &[ContextField] = &[ContextField::new("widget_id", "id")];

fn widgets() -> StreamDefinition {
    StreamDefinition::new(
        "widgets",
        "/api/orgs/{org_name}/widgets",
        "$.widgets[*]",
        PartitionSource::Organizations,
    )
    .paginated(PaginationStrategy::continuation_token())
    .keys(&["id"])
    .incremental(UPDATED_AT)
}

fn gadgets() -> StreamDefinition {
    StreamDefinition::new(
        "gadgets",
        "/api/orgs/{org_name}/widgets/{widget_id}/gadgets",
        "$[*]",
        PartitionSource::Parent {
            stream: "widgets",
            fields: GADGET_FIELDS,
        },
    )
}

fn events() -> StreamDefinition {
    StreamDefinition::new(
        "events",
        "/api/orgs/{org_name}/events",
        "$.events[*]",
        PartitionSource::Organizations,
    )
    .incremental(EVENT_TIME)
    .tolerate(&[403])
}

fn paged_events() -> StreamDefinition {
    events().paginated(PaginationStrategy::continuation_token())
}

/// Flips the shutdown signal once the first record has been written
struct StopAfterFirstRecord {
    inner: MemorySink,
    shutdown: watch::Sender<bool>,
}

#[async_trait::async_trait]
impl MessageSink for StopAfterFirstRecord {
    async fn write(&self, message: &Message) -> Result<()> {
        if message.is_record() {
            let _ = self.shutdown.send(true);
        }
        self.inner.write(message).await
    }
}

fn client(server: &MockServer) -> HttpClient {
    let config = HttpClientConfig::builder()
        .base_url(server.uri())
        .max_retries(1)
        .backoff(Duration::from_millis(1), Duration::from_millis(5))
        .no_rate_limit()
        .build();
    HttpClient::with_auth(config, AuthConfig::token("pul-test")).unwrap()
}

fn engine(server: &MockServer, catalog: Catalog, orgs: &[&str]) -> SyncEngine {
    SyncEngine::new(
        client(server),
        StateManager::in_memory(),
        catalog,
        orgs.iter().map(ToString::to_string).collect(),
    )
}

async fn mount_first_event_page(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/orgs/acme/events"))
        .and(query_param_is_missing("continuationToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "events": [
                {"id": 2, "timestamp": 1_700_000_200},
                {"id": 1, "timestamp": 1_700_000_100}
            ],
            "continuationToken": "next"
        })))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_widget_pages(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/orgs/acme/widgets"))
        .and(query_param_is_missing("continuationToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "widgets": [
                {"id": "w1", "updatedAt": "2024-01-01T00:00:00Z"},
                {"id": "w2", "updatedAt": "2024-01-02T00:00:00Z"}
            ],
            "continuationToken": "abc"
        })))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/orgs/acme/widgets"))
        .and(query_param("continuationToken", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "widgets": [
                {"id": "w3", "updatedAt": "2024-01-03T00:00:00Z"},
                {"id": "w4", "updatedAt": "2024-01-04T00:00:00Z"}
            ],
            "continuationToken": ""
        })))
        .expect(1)
        .mount(server)
        .await;
}

// ============================================================================
// Config / Stats Tests
// ============================================================================

#[test]
fn test_sync_config_default() {
    let config = SyncConfig::default();
    assert_eq!(config.checkpoint_interval, 1);
    assert_eq!(config.max_concurrent_partitions, 1);
    assert!(config.streams.is_none());
}

#[test]
fn test_sync_config_builder() {
    let config = SyncConfig::new()
        .with_checkpoint_interval(0)
        .with_max_concurrent_partitions(4)
        .with_streams(["stacks", "audit_logs"]);

    assert_eq!(config.checkpoint_interval, 1);
    assert_eq!(config.max_concurrent_partitions, 4);
    assert_eq!(
        config.streams,
        Some(vec!["stacks".to_string(), "audit_logs".to_string()])
    );
}

#[test]
fn test_sync_stats_mutations() {
    let mut stats = SyncStats::new();
    stats.add_records(10);
    stats.add_pages(2);
    stats.add_stream();
    stats.add_partition();
    stats.add_checkpoints(3);
    stats.add_error();
    stats.set_duration(1500);

    assert_eq!(stats.records_synced, 10);
    assert_eq!(stats.pages_fetched, 2);
    assert_eq!(stats.streams_synced, 1);
    assert_eq!(stats.partitions_synced, 1);
    assert_eq!(stats.checkpoints, 3);
    assert_eq!(stats.errors, 1);
    assert_eq!(stats.duration_ms, 1500);
}

// ============================================================================
// Dependency Graph Tests
// ============================================================================

#[test]
fn test_graph_parent_runs_first() {
    let catalog = Catalog::new(vec![gadgets(), widgets()]);
    let graph = DependencyGraph::new(&catalog, None).unwrap();

    let order: Vec<_> = graph.execution_order().iter().map(|s| s.name).collect();
    assert_eq!(order, vec!["widgets", "gadgets"]);
    assert!(graph.is_selected("widgets"));
    assert!(graph.is_selected("gadgets"));
}

#[test]
fn test_graph_selected_child_pulls_in_ancestors() {
    let catalog = Catalog::pulumi();
    let selected = vec!["stack_webhook_deliveries".to_string()];
    let graph = DependencyGraph::new(&catalog, Some(&selected)).unwrap();

    let order: Vec<_> = graph.execution_order().iter().map(|s| s.name).collect();
    assert_eq!(order, vec!["stacks", "stack_webhooks", "stack_webhook_deliveries"]);
    assert!(!graph.is_selected("stacks"));
    assert!(!graph.is_selected("stack_webhooks"));
    assert!(graph.is_selected("stack_webhook_deliveries"));
}

#[test]
fn test_graph_full_catalog_order() {
    let catalog = Catalog::pulumi();
    let graph = DependencyGraph::new(&catalog, None).unwrap();
    assert_eq!(graph.len(), 31);

    let order: Vec<_> = graph.execution_order().iter().map(|s| s.name).collect();
    for stream in graph.execution_order() {
        if let Some(parent) = stream.parent() {
            let parent_at = order.iter().position(|s| *s == parent).unwrap();
            let child_at = order.iter().position(|s| *s == stream.name).unwrap();
            assert!(parent_at < child_at, "{parent} must run before {}", stream.name);
        }
    }
}

#[test]
fn test_graph_rejects_cycles() {
    const A_FIELDS: &[ContextField] = &[ContextField::same("a")];
    let a = StreamDefinition::new(
        "a",
        "/a",
        "$",
        PartitionSource::Parent { stream: "b", fields: A_FIELDS },
    );
    let b = StreamDefinition::new(
        "b",
        "/b",
        "$",
        PartitionSource::Parent { stream: "a", fields: A_FIELDS },
    );
    let catalog = Catalog::new(vec![a, b]);

    let err = DependencyGraph::new(&catalog, None).unwrap_err();
    assert!(err.is_configuration_error());
    match err {
        Error::DependencyCycle { streams } => assert_eq!(streams, vec!["a", "b", "a"]),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_graph_rejects_unknown_parent() {
    let catalog = Catalog::new(vec![gadgets()]);
    let err = DependencyGraph::new(&catalog, None).unwrap_err();
    assert!(err.to_string().contains("unknown stream 'widgets'"));
}

#[test]
fn test_graph_rejects_unknown_selection() {
    let catalog = Catalog::pulumi();
    let selected = vec!["widgets".to_string()];
    assert!(matches!(
        DependencyGraph::new(&catalog, Some(&selected)),
        Err(Error::StreamNotFound { .. })
    ));
}

// ============================================================================
// Record Stream Tests
// ============================================================================

#[tokio::test]
async fn test_record_stream_pages_and_bookmarks() {
    let server = MockServer::start().await;
    mount_widget_pages(&server).await;

    let ctx = PartitionContext::new().with("org_name", "acme");
    let mut records = RecordStream::new(Arc::new(client(&server)), widgets(), ctx, None).unwrap();

    let first = records.next_page().await.unwrap().unwrap();
    assert_eq!(first.len(), 2);
    assert_eq!(
        first.max_bookmark,
        Some(Bookmark::Timestamp("2024-01-02T00:00:00Z".into()))
    );

    let second = records.next_page().await.unwrap().unwrap();
    assert_eq!(
        second.max_bookmark,
        Some(Bookmark::Timestamp("2024-01-04T00:00:00Z".into()))
    );

    assert!(records.next_page().await.unwrap().is_none());
    assert_eq!(records.requests(), 2);
}

#[tokio::test]
async fn test_record_stream_encodes_path_values() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/orgs/acme/widgets/ops%2Fdaily%20run/gadgets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"gadgetName": "g1"}])))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = PartitionContext::new()
        .with("org_name", "acme")
        .with("widget_id", "ops/daily run");
    let mut records = RecordStream::new(Arc::new(client(&server)), gadgets(), ctx, None).unwrap();

    let page = records.next_page().await.unwrap().unwrap();
    assert_eq!(page.len(), 1);
    // The record keeps the raw value.
    assert_eq!(page.records[0].record["widget_id"], json!("ops/daily run"));
}

#[tokio::test]
async fn test_record_stream_normalizes_and_merges_context() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/orgs/acme/widgets/w1/gadgets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"gadgetName": "g1"},
            {"gadgetName": "g2", "widgetId": "other"}
        ])))
        .mount(&server)
        .await;

    let ctx = PartitionContext::new()
        .with("org_name", "acme")
        .with("widget_id", "w1");
    let records: Vec<EmittedRecord> = RecordStream::new(Arc::new(client(&server)), gadgets(), ctx.clone(), None)
        .unwrap()
        .into_records()
        .try_collect()
        .await
        .unwrap();

    assert_eq!(records.len(), 2);
    assert_eq!(
        records[0].record,
        json!({"gadget_name": "g1", "org_name": "acme", "widget_id": "w1"})
    );
    // Fields present in the record win over the context.
    assert_eq!(records[1].record["widget_id"], "other");
    assert_eq!(records[1].context, ctx);
    assert_eq!(records[1].stream, "gadgets");
}

#[tokio::test]
async fn test_record_stream_resume_filters_and_sends_server_filter() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/orgs/acme/events"))
        .and(query_param("startTime", "1700000000"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "events": [
                {"id": 3, "timestamp": 1_700_000_300},
                {"id": 2, "timestamp": 1_700_000_000},
                {"id": 1, "timestamp": 1_699_999_000}
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = PartitionContext::new().with("org_name", "acme");
    let resume = Some(Bookmark::UnixTime(1_700_000_000));
    let mut records = RecordStream::new(Arc::new(client(&server)), events(), ctx, resume).unwrap();

    let page = records.next_page().await.unwrap().unwrap();
    let ids: Vec<_> = page.records.iter().map(|r| r.record["id"].clone()).collect();
    assert_eq!(ids, vec![json!(3), json!(2)]);
    assert_eq!(page.fetched, 3);
    assert_eq!(page.max_bookmark, Some(Bookmark::UnixTime(1_700_000_300)));
}

#[tokio::test]
async fn test_record_stream_tolerated_status_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/orgs/acme/events"))
        .respond_with(ResponseTemplate::new(403).set_body_string("feature not enabled"))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = PartitionContext::new().with("org_name", "acme");
    let mut records = RecordStream::new(Arc::new(client(&server)), events(), ctx, None).unwrap();

    let page = records.next_page().await.unwrap().unwrap();
    assert!(page.is_empty());
    assert!(records.next_page().await.unwrap().is_none());
}

#[tokio::test]
async fn test_record_stream_client_error_aborts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/orgs/acme/widgets"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such org"))
        .mount(&server)
        .await;

    let ctx = PartitionContext::new().with("org_name", "acme");
    let mut records = RecordStream::new(Arc::new(client(&server)), widgets(), ctx, None).unwrap();

    let err = records.next_page().await.unwrap_err();
    assert_eq!(err.status(), Some(404));
}

#[test]
fn test_record_stream_missing_context_variable() {
    let client = HttpClient::with_config(HttpClientConfig::default()).unwrap();
    let result = RecordStream::new(Arc::new(client), gadgets(), PartitionContext::new(), None);
    assert!(result.is_err());
}

// ============================================================================
// Sync Engine Tests
// ============================================================================

#[tokio::test]
async fn test_sync_two_cursor_pages() {
    let server = MockServer::start().await;
    mount_widget_pages(&server).await;

    let engine = engine(&server, Catalog::new(vec![widgets()]), &["acme"]);
    let sink = MemorySink::new();
    let summary = engine.run(&sink).await.unwrap();

    assert!(summary.is_success());
    let ids: Vec<_> = sink
        .records()
        .iter()
        .map(|r| r.record["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["w1", "w2", "w3", "w4"]);
    assert_eq!(summary.stats.records_synced, 4);
    assert_eq!(summary.stats.pages_fetched, 2);
    assert_eq!(server.received_requests().await.unwrap().len(), 2);

    let state = engine.state().snapshot().await;
    assert_eq!(
        state.entry("widgets", ACME).unwrap().value,
        json!("2024-01-04T00:00:00Z")
    );
}

#[tokio::test]
async fn test_sync_checkpoints_per_page_for_sorted_streams() {
    let server = MockServer::start().await;
    mount_widget_pages(&server).await;

    let engine = engine(&server, Catalog::new(vec![widgets()]), &["acme"]);
    let sink = MemorySink::new();
    engine.run(&sink).await.unwrap();

    let bookmarks: Vec<_> = sink
        .states()
        .iter()
        .filter_map(|s| s.entry("widgets", ACME).map(|e| e.value.clone()))
        .collect();
    // One per page plus the final snapshot.
    assert_eq!(
        bookmarks,
        vec![
            json!("2024-01-02T00:00:00Z"),
            json!("2024-01-04T00:00:00Z"),
            json!("2024-01-04T00:00:00Z")
        ]
    );
    assert!(sink.messages().last().unwrap().is_state());
}

#[tokio::test]
async fn test_sync_unsorted_stream_offers_at_completion() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/orgs/acme/events"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "events": [
                {"id": 2, "timestamp": 1_700_000_200},
                {"id": 1, "timestamp": 1_700_000_100}
            ]
        })))
        .mount(&server)
        .await;

    let engine = engine(&server, Catalog::new(vec![events()]), &["acme"]);
    let sink = MemorySink::new();
    engine.run(&sink).await.unwrap();

    assert_eq!(
        engine.state().get("events", ACME, BookmarkKind::UnixTime).await,
        Some(Bookmark::UnixTime(1_700_000_200))
    );
}

#[tokio::test]
async fn test_sync_children_run_once_per_parent_record() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/orgs/acme/widgets"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "widgets": [
                {"id": "w1", "updatedAt": "2024-01-01T00:00:00Z"},
                {"id": "w2", "updatedAt": "2024-01-02T00:00:00Z"}
            ]
        })))
        .mount(&server)
        .await;
    for widget in ["w1", "w2"] {
        Mock::given(method("GET"))
            .and(path(format!("/api/orgs/acme/widgets/{widget}/gadgets")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"name": widget}])))
            .expect(1)
            .mount(&server)
            .await;
    }

    let engine = engine(&server, Catalog::new(vec![widgets(), gadgets()]), &["acme"])
        .with_config(SyncConfig::new().with_streams(["gadgets"]));
    let sink = MemorySink::new();
    let summary = engine.run(&sink).await.unwrap();

    assert!(summary.is_success());
    // The parent only feeds partitions.
    assert!(sink.records_of("widgets").is_empty());
    let gadgets = sink.records_of("gadgets");
    assert_eq!(gadgets.len(), 2);
    assert_eq!(gadgets[0].context.get_str("widget_id"), Some("w1"));
    assert_eq!(gadgets[1].context.get_str("widget_id"), Some("w2"));
    // Unselected parents keep no bookmark.
    assert!(engine.state().snapshot().await.is_empty());
}

#[tokio::test]
async fn test_sync_failed_partition_does_not_stop_siblings() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/orgs/broken/widgets"))
        .respond_with(ResponseTemplate::new(400).set_body_string("bad org"))
        .mount(&server)
        .await;
    mount_widget_pages(&server).await;

    let engine = engine(&server, Catalog::new(vec![widgets()]), &["broken", "acme"]);
    let sink = MemorySink::new();
    let summary = engine.run(&sink).await.unwrap();

    assert!(!summary.is_success());
    assert_eq!(summary.failures.len(), 1);
    let failure = &summary.failures[0];
    assert_eq!(failure.stream, "widgets");
    assert_eq!(failure.partition, r#"{"org_name":"broken"}"#);
    assert!(failure.error.contains("400"));
    assert_eq!(failure.last_checkpoint, None);

    assert_eq!(sink.records().len(), 4);
    assert_eq!(summary.stats.partitions_synced, 1);
    assert_eq!(summary.stats.errors, 1);
}

#[tokio::test]
async fn test_sync_concurrent_partitions_keep_order() {
    let server = MockServer::start().await;
    for org in ["acme", "globex"] {
        Mock::given(method("GET"))
            .and(path(format!("/api/orgs/{org}/events")))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"events": [{"id": org, "timestamp": 1_700_000_000}]})),
            )
            .mount(&server)
            .await;
    }

    let engine = engine(&server, Catalog::new(vec![events()]), &["acme", "globex"])
        .with_config(SyncConfig::new().with_max_concurrent_partitions(2));
    let sink = MemorySink::new();
    let summary = engine.run(&sink).await.unwrap();

    assert!(summary.is_success());
    assert_eq!(summary.stats.partitions_synced, 2);
    let state = engine.state().snapshot().await;
    assert!(state.entry("events", ACME).is_some());
    assert!(state.entry("events", r#"{"org_name":"globex"}"#).is_some());
}

#[tokio::test]
async fn test_sync_shutdown_before_start() {
    let server = MockServer::start().await;
    let (tx, rx) = watch::channel(false);
    tx.send(true).unwrap();

    let engine = engine(&server, Catalog::new(vec![widgets()]), &["acme"]).with_shutdown(rx);
    let sink = MemorySink::new();
    let summary = engine.run(&sink).await.unwrap();

    assert!(summary.interrupted);
    assert!(server.received_requests().await.unwrap().is_empty());
    assert_eq!(sink.messages().len(), 1);
    assert!(sink.messages()[0].is_state());
}

#[tokio::test]
async fn test_sync_resume_skips_old_records() {
    let server = MockServer::start().await;
    mount_widget_pages(&server).await;

    let state = StateManager::from_json(&format!(
        r#"{{"bookmarks": {{"widgets": {{{key}: {{"replication_key": "updated_at", "kind": "timestamp", "value": "2024-01-03T00:00:00Z"}}}}}}}}"#,
        key = serde_json::to_string(ACME).unwrap()
    ))
    .unwrap();
    let engine = SyncEngine::new(
        client(&server),
        state,
        Catalog::new(vec![widgets()]),
        vec!["acme".to_string()],
    );
    let sink = MemorySink::new();
    engine.run(&sink).await.unwrap();

    let ids: Vec<_> = sink
        .records()
        .iter()
        .map(|r| r.record["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, vec!["w3", "w4"]);
}

#[tokio::test]
async fn test_sync_error_mid_pagination_keeps_last_page_bookmark() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/orgs/acme/widgets"))
        .and(query_param_is_missing("continuationToken"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "widgets": [
                {"id": "w1", "updatedAt": "2023-12-31T00:00:00Z"},
                {"id": "w2", "updatedAt": "2024-01-01T00:00:00Z"}
            ],
            "continuationToken": "abc"
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/orgs/acme/widgets"))
        .and(query_param("continuationToken", "abc"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let engine = engine(&server, Catalog::new(vec![widgets()]), &["acme"]);
    let sink = MemorySink::new();
    let summary = engine.run(&sink).await.unwrap();

    assert_eq!(summary.failures.len(), 1);
    let failure = &summary.failures[0];
    assert!(failure.error.contains("500"));
    assert_eq!(failure.last_checkpoint, Some(json!("2024-01-01T00:00:00Z")));
    assert_eq!(sink.records().len(), 2);

    let last = sink.states().pop().unwrap();
    assert_eq!(
        last.entry("widgets", ACME).unwrap().value,
        json!("2024-01-01T00:00:00Z")
    );
}

#[tokio::test]
async fn test_sync_error_mid_pagination_unsorted_keeps_bookmark() {
    let server = MockServer::start().await;
    mount_first_event_page(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/orgs/acme/events"))
        .and(query_param("continuationToken", "next"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let engine = engine(&server, Catalog::new(vec![paged_events()]), &["acme"]);
    let sink = MemorySink::new();
    let summary = engine.run(&sink).await.unwrap();

    assert_eq!(summary.failures.len(), 1);
    assert_eq!(summary.failures[0].last_checkpoint, None);
    // Records were emitted but the newest-first stream never saw its end.
    assert_eq!(sink.records().len(), 2);
    assert_eq!(
        engine.state().get("events", ACME, BookmarkKind::UnixTime).await,
        None
    );
    assert!(sink.states().iter().all(|s| s.entry("events", ACME).is_none()));
}

#[tokio::test]
async fn test_sync_shutdown_between_pages() {
    let server = MockServer::start().await;
    mount_first_event_page(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/orgs/acme/events"))
        .and(query_param("continuationToken", "next"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"events": []})))
        .expect(0)
        .mount(&server)
        .await;

    let (tx, rx) = watch::channel(false);
    let engine = engine(&server, Catalog::new(vec![paged_events()]), &["acme"]).with_shutdown(rx);
    let sink = StopAfterFirstRecord {
        inner: MemorySink::new(),
        shutdown: tx,
    };
    let summary = engine.run(&sink).await.unwrap();

    assert!(summary.interrupted);
    assert!(summary.is_success());
    assert_eq!(server.received_requests().await.unwrap().len(), 1);

    // Page one is delivered in full, then the final snapshot.
    let messages = sink.inner.messages();
    assert_eq!(sink.inner.records().len(), 2);
    assert!(messages.last().unwrap().is_state());
    assert_eq!(
        engine.state().get("events", ACME, BookmarkKind::UnixTime).await,
        None
    );
}
