//! Stream definition types

use crate::pagination::PaginationStrategy;
use crate::partition::PartitionSource;
use crate::types::{BookmarkKind, Method, ReplicationMethod};
use serde::Serialize;
use serde_json::{json, Value};

/// Server-side filter carrying the resume bookmark as unix seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServerFilter {
    /// Query parameter name, e.g. `startTime`
    pub param: &'static str,
}

/// Replication key of an incremental stream
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReplicationKey {
    /// Field in the normalized (snake_case) record
    pub field: &'static str,
    /// Comparison semantics of the field
    pub kind: BookmarkKind,
    /// Whether the API returns records in ascending key order. Unsorted
    /// streams only advance their bookmark once a partition completes.
    pub sorted: bool,
    /// Server-side filter the resume bookmark is sent as
    pub server_filter: Option<ServerFilter>,
}

/// Immutable definition of one stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamDefinition {
    /// Stream name
    pub name: &'static str,
    /// Path template rendered against the partition context
    pub path: &'static str,
    /// HTTP method
    pub method: Method,
    /// Selector of the records in the response body
    pub record_path: &'static str,
    /// Pagination strategy
    pub pagination: PaginationStrategy,
    /// Where partition contexts come from
    pub partition: PartitionSource,
    /// Primary key fields of the normalized record
    pub primary_keys: &'static [&'static str],
    /// Replication key, `None` for full-table streams
    pub replication: Option<ReplicationKey>,
    /// Query parameters; values are templates over the partition context
    pub query: &'static [(&'static str, &'static str)],
    /// HTTP statuses treated as an empty page rather than an error
    pub tolerated_statuses: &'static [u16],
}

impl StreamDefinition {
    /// Full-table GET stream with no query parameters
    pub const fn new(
        name: &'static str,
        path: &'static str,
        record_path: &'static str,
        partition: PartitionSource,
    ) -> Self {
        Self {
            name,
            path,
            method: Method::GET,
            record_path,
            pagination: PaginationStrategy::Unpaged,
            partition,
            primary_keys: &[],
            replication: None,
            query: &[],
            tolerated_statuses: &[],
        }
    }

    /// Set the pagination strategy
    #[must_use]
    pub const fn paginated(mut self, pagination: PaginationStrategy) -> Self {
        self.pagination = pagination;
        self
    }

    /// Set the primary keys
    #[must_use]
    pub const fn keys(mut self, keys: &'static [&'static str]) -> Self {
        self.primary_keys = keys;
        self
    }

    /// Make the stream incremental
    #[must_use]
    pub const fn incremental(mut self, replication: ReplicationKey) -> Self {
        self.replication = Some(replication);
        self
    }

    /// Set the query parameter templates
    #[must_use]
    pub const fn query(mut self, query: &'static [(&'static str, &'static str)]) -> Self {
        self.query = query;
        self
    }

    /// Treat these statuses as an empty page
    #[must_use]
    pub const fn tolerate(mut self, statuses: &'static [u16]) -> Self {
        self.tolerated_statuses = statuses;
        self
    }

    /// Name of the parent stream, if any
    pub fn parent(&self) -> Option<&'static str> {
        self.partition.parent()
    }

    /// Replication method
    pub fn replication_method(&self) -> ReplicationMethod {
        if self.replication.is_some() {
            ReplicationMethod::Incremental
        } else {
            ReplicationMethod::FullTable
        }
    }

    /// Whether `status` yields an empty page
    pub fn tolerates(&self, status: u16) -> bool {
        self.tolerated_statuses.contains(&status)
    }

    /// Catalog entry as printed by `discover`
    pub fn describe(&self) -> Value {
        json!({
            "stream": self.name,
            "path": self.path,
            "method": self.method,
            "key_properties": self.primary_keys,
            "replication_method": self.replication_method(),
            "replication_key": self.replication.map(|r| r.field),
            "bookmark_kind": self.replication.map(|r| r.kind),
            "parent_stream": self.parent(),
            "pagination": self.pagination,
        })
    }
}
