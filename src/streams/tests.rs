//! Tests for the stream catalog

use super::*;
use crate::pagination::PaginationStrategy;
use crate::partition::PartitionContext;
use crate::template;
use crate::types::{BookmarkKind, ReplicationMethod};
use pretty_assertions::assert_eq;
use std::collections::HashSet;
use std::str::FromStr;
use test_case::test_case;

#[test]
fn test_catalog_has_all_streams() {
    let catalog = Catalog::pulumi();
    assert_eq!(catalog.len(), 31);
    assert_eq!(StreamId::ALL.len(), 31);

    let names: HashSet<_> = catalog.names().into_iter().collect();
    assert_eq!(names.len(), 31, "stream names must be unique");
}

#[test]
fn test_definitions_carry_their_id_name() {
    for id in StreamId::ALL {
        assert_eq!(id.definition().name, id.name());
        assert_eq!(StreamId::from_str(id.name()).unwrap(), *id);
    }
}

#[test]
fn test_unknown_stream_name() {
    let err = StreamId::from_str("widgets").unwrap_err();
    assert!(err.is_configuration_error());
    assert!(Catalog::pulumi().require("widgets").is_err());
}

#[test]
fn test_every_parent_exists() {
    let catalog = Catalog::pulumi();
    for stream in catalog.iter() {
        if let Some(parent) = stream.parent() {
            assert!(
                catalog.get(parent).is_some(),
                "{} has unknown parent {parent}",
                stream.name
            );
        }
    }
}

#[test]
fn test_child_paths_render_from_parent_context() {
    // Every variable of a child's path is either org_name or provided by the
    // chain of context fields leading to it.
    let catalog = Catalog::pulumi();
    for stream in catalog.iter() {
        let mut ctx = PartitionContext::new().with("org_name", "acme");
        let mut current = stream.partition;
        let mut chain = Vec::new();
        while let crate::partition::PartitionSource::Parent { stream: parent, fields } = current {
            chain.push(fields);
            current = catalog.get(parent).unwrap().partition;
        }
        for fields in chain {
            for field in fields {
                ctx.insert(field.key, "x");
            }
        }

        template::render_path(stream.path, &ctx)
            .unwrap_or_else(|e| panic!("{}: {e}", stream.name));
        for (_, value) in stream.query {
            template::render(value, &ctx).unwrap();
        }
    }
}

#[test]
fn test_stack_children() {
    let catalog = Catalog::pulumi();
    let children: HashSet<_> = catalog.children("stacks").iter().map(|s| s.name).collect();

    assert_eq!(children.len(), 9);
    assert!(children.contains("stack_updates"));
    assert!(children.contains("stack_webhooks"));
    assert!(!children.contains("stack_webhook_deliveries"));
}

#[test]
fn test_stacks_definition() {
    let stacks = StreamId::Stacks.definition();
    assert_eq!(stacks.path, "/api/user/stacks");
    assert_eq!(stacks.query, &[("organization", "{org_name}")]);
    assert_eq!(stacks.pagination, PaginationStrategy::continuation_token());
    assert_eq!(stacks.replication_method(), ReplicationMethod::FullTable);
    assert!(stacks.parent().is_none());
}

#[test]
fn test_audit_logs_definition() {
    let audit = StreamId::AuditLogs.definition();
    let replication = audit.replication.unwrap();

    assert_eq!(replication.field, "timestamp");
    assert_eq!(replication.kind, BookmarkKind::UnixTime);
    assert!(!replication.sorted);
    assert_eq!(replication.server_filter.unwrap().param, "startTime");
    assert!(audit.tolerates(403));
    assert!(!audit.tolerates(401));
}

#[test]
fn test_stack_updates_definition() {
    let updates = StreamId::StackUpdates.definition();
    assert_eq!(updates.replication.unwrap().kind, BookmarkKind::Numeric);
    assert!(matches!(
        updates.pagination,
        PaginationStrategy::PageNumberPaged { page_param: "page", .. }
    ));
}

#[test_case(StreamId::StackDetails, "$")]
#[test_case(StreamId::OrganizationWebhooks, "$[*]")]
#[test_case(StreamId::StackResources, "$.deployment.resources[*]")]
#[test_case(StreamId::OrganizationOidcIssuers, "$.oidcIssuers[*]")]
fn test_record_paths(id: StreamId, path: &str) {
    assert_eq!(id.definition().record_path, path);
}

#[test]
fn test_describe() {
    let entry = StreamId::AuditLogs.definition().describe();
    assert_eq!(entry["stream"], "audit_logs");
    assert_eq!(entry["replication_method"], "INCREMENTAL");
    assert_eq!(entry["replication_key"], "timestamp");
    assert_eq!(entry["bookmark_kind"], "unix_time");
    assert_eq!(entry["parent_stream"], serde_json::Value::Null);
    assert_eq!(entry["pagination"]["type"], "cursor_token_paged");

    let child = StreamId::StackWebhookDeliveries.definition().describe();
    assert_eq!(child["parent_stream"], "stack_webhooks");
}
