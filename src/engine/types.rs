//! Engine types
//!
//! Emitted records, sync configuration and the run summary.

use crate::partition::PartitionContext;
use crate::state::Bookmark;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// One record produced by a stream-partition run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EmittedRecord {
    /// Stream name
    pub stream: String,
    /// Partition the record was read from
    pub context: PartitionContext,
    /// Normalized record
    pub record: Value,
    /// When the page holding the record was received
    pub time_extracted: DateTime<Utc>,
}

impl EmittedRecord {
    /// Create a record
    pub fn new(
        stream: impl Into<String>,
        context: PartitionContext,
        record: Value,
        time_extracted: DateTime<Utc>,
    ) -> Self {
        Self {
            stream: stream.into(),
            context,
            record,
            time_extracted,
        }
    }
}

/// One page of records with the bookmark it would advance to
#[derive(Debug, Clone, Default)]
pub struct RecordPage {
    /// Records that passed the resume filter, in API order
    pub records: Vec<EmittedRecord>,
    /// Highest replication value among `records`
    pub max_bookmark: Option<Bookmark>,
    /// Records on the page before filtering
    pub fetched: usize,
}

impl RecordPage {
    /// Number of records kept
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether no record was kept
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Configuration for sync operation
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Records emitted between two checkpoints. Checkpoints happen at page
    /// boundaries once this many records went out.
    pub checkpoint_interval: usize,
    /// Partitions of one stream run concurrently
    pub max_concurrent_partitions: usize,
    /// Streams to emit; `None` selects the whole catalog
    pub streams: Option<Vec<String>>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            checkpoint_interval: 1,
            max_concurrent_partitions: 1,
            streams: None,
        }
    }
}

impl SyncConfig {
    /// Create a new sync config
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the checkpoint interval
    #[must_use]
    pub fn with_checkpoint_interval(mut self, records: usize) -> Self {
        self.checkpoint_interval = records.max(1);
        self
    }

    /// Set the partition concurrency
    #[must_use]
    pub fn with_max_concurrent_partitions(mut self, partitions: usize) -> Self {
        self.max_concurrent_partitions = partitions.max(1);
        self
    }

    /// Select streams by name
    #[must_use]
    pub fn with_streams<I, S>(mut self, streams: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.streams = Some(streams.into_iter().map(Into::into).collect());
        self
    }
}

/// Statistics from a sync operation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncStats {
    /// Records emitted
    pub records_synced: usize,
    /// Pages fetched
    pub pages_fetched: usize,
    /// Streams run, emitted or not
    pub streams_synced: usize,
    /// Stream-partitions run to completion
    pub partitions_synced: usize,
    /// Checkpoints written
    pub checkpoints: usize,
    /// Failed stream-partitions
    pub errors: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

impl SyncStats {
    /// Create new stats
    pub fn new() -> Self {
        Self::default()
    }

    /// Add records
    pub fn add_records(&mut self, count: usize) {
        self.records_synced += count;
    }

    /// Add pages
    pub fn add_pages(&mut self, count: usize) {
        self.pages_fetched += count;
    }

    /// Add a stream
    pub fn add_stream(&mut self) {
        self.streams_synced += 1;
    }

    /// Add a completed partition
    pub fn add_partition(&mut self) {
        self.partitions_synced += 1;
    }

    /// Add checkpoints
    pub fn add_checkpoints(&mut self, count: usize) {
        self.checkpoints += count;
    }

    /// Add an error
    pub fn add_error(&mut self) {
        self.errors += 1;
    }

    /// Set duration
    pub fn set_duration(&mut self, ms: u64) {
        self.duration_ms = ms;
    }
}

/// A stream-partition run that did not complete
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PartitionFailure {
    /// Stream name
    pub stream: String,
    /// Serialized partition key
    pub partition: String,
    /// Error that aborted the run
    pub error: String,
    /// Last checkpointed bookmark of the partition
    pub last_checkpoint: Option<Value>,
}

/// Outcome of a whole sync
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SyncSummary {
    /// Run statistics
    pub stats: SyncStats,
    /// Failed stream-partitions
    pub failures: Vec<PartitionFailure>,
    /// Whether a shutdown signal stopped the run early
    pub interrupted: bool,
}

impl SyncSummary {
    /// Whether every stream-partition completed
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }
}
