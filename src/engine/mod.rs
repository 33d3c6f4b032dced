//! Execution engine module
//!
//! Main read loop and stream orchestration.
//!
//! # Overview
//!
//! The engine module provides:
//! - `SyncEngine` - Runs the planned streams partition by partition
//! - `RecordStream` - Lazy records of one stream-partition
//! - `DependencyGraph` - Parent-before-child execution order
//! - `SyncConfig` / `SyncSummary` - Run configuration and outcome

mod graph;
mod record_stream;
mod types;

pub use graph::DependencyGraph;
pub use record_stream::RecordStream;
pub use types::{
    EmittedRecord, PartitionFailure, RecordPage, SyncConfig, SyncStats, SyncSummary,
};

use crate::error::Result;
use crate::http::HttpClient;
use crate::output::{Message, MessageSink};
use crate::partition::{ListRouter, ParentRouter, PartitionContext, PartitionRouter, PartitionSource};
use crate::state::{Bookmark, StateManager};
use crate::streams::{Catalog, StreamDefinition};
use futures::StreamExt;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// Sync engine for orchestrating data extraction
pub struct SyncEngine {
    /// Request executor shared by all partitions
    client: Arc<HttpClient>,
    /// Bookmark store
    state: StateManager,
    /// Streams available to the run
    catalog: Catalog,
    /// Root partitions
    organizations: Vec<String>,
    /// Sync configuration
    config: SyncConfig,
    /// Set to `true` to stop before the next page request
    shutdown: Option<watch::Receiver<bool>>,
}

impl SyncEngine {
    /// Create a new sync engine
    pub fn new(
        client: HttpClient,
        state: StateManager,
        catalog: Catalog,
        organizations: Vec<String>,
    ) -> Self {
        Self {
            client: Arc::new(client),
            state,
            catalog,
            organizations,
            config: SyncConfig::default(),
            shutdown: None,
        }
    }

    /// Set sync configuration
    #[must_use]
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    /// Stop gracefully once `shutdown` turns `true`
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Get the state manager
    pub fn state(&self) -> &StateManager {
        &self.state
    }

    /// Get the catalog
    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Get the sync configuration
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run every planned stream and write its messages to `sink`.
    ///
    /// Only configuration problems and the final checkpoint fail the run.
    /// A failing stream-partition is recorded in the summary while its
    /// siblings and independent streams carry on.
    pub async fn run(&self, sink: &dyn MessageSink) -> Result<SyncSummary> {
        let start = Instant::now();
        let graph = DependencyGraph::new(&self.catalog, self.config.streams.as_deref())?;
        let mut summary = SyncSummary::default();

        info!(
            streams = graph.len(),
            organizations = self.organizations.len(),
            "Starting sync"
        );

        // Child partitions collected from parent records, by child stream.
        let mut pending: HashMap<&'static str, ParentRouter> = graph
            .execution_order()
            .iter()
            .filter_map(|s| match s.partition {
                PartitionSource::Parent { fields, .. } => Some((s.name, ParentRouter::new(fields))),
                PartitionSource::Organizations => None,
            })
            .collect();

        for stream in graph.execution_order() {
            if self.is_shutting_down() {
                summary.interrupted = true;
                break;
            }

            let partitions = match stream.partition {
                PartitionSource::Organizations => {
                    ListRouter::organizations(&self.organizations).partitions()?
                }
                PartitionSource::Parent { .. } => match pending.remove(stream.name) {
                    Some(router) => router.partitions()?,
                    None => Vec::new(),
                },
            };

            let children = graph.children(stream.name);
            let emit = graph.is_selected(stream.name);
            info!(
                stream = stream.name,
                partitions = partitions.len(),
                emit,
                "Syncing stream"
            );
            summary.stats.add_stream();

            let runs: Vec<PartitionRun> = futures::stream::iter(
                partitions
                    .into_iter()
                    .map(|context| self.run_partition(stream, context, &children, emit, sink)),
            )
            .buffered(self.config.max_concurrent_partitions.max(1))
            .collect()
            .await;

            for run in runs {
                summary.stats.add_records(run.records);
                summary.stats.add_pages(run.pages);
                summary.stats.add_checkpoints(run.checkpoints);

                for (child, router) in run.children {
                    if let Some(target) = pending.get_mut(child) {
                        for context in router.partitions()? {
                            target.push_context(context);
                        }
                    }
                }

                match run.outcome {
                    PartitionOutcome::Completed => summary.stats.add_partition(),
                    PartitionOutcome::Interrupted => summary.interrupted = true,
                    PartitionOutcome::Failed(failure) => {
                        summary.stats.add_error();
                        summary.failures.push(failure);
                    }
                }
            }
        }

        // Always flush whatever was accepted, including on shutdown.
        self.checkpoint(sink).await?;
        summary.stats.add_checkpoints(1);
        summary.stats.set_duration(start.elapsed().as_millis() as u64);

        for failure in &summary.failures {
            error!(
                stream = %failure.stream,
                partition = %failure.partition,
                last_checkpoint = ?failure.last_checkpoint,
                error = %failure.error,
                "Stream partition failed"
            );
        }
        info!(
            records = summary.stats.records_synced,
            pages = summary.stats.pages_fetched,
            partitions = summary.stats.partitions_synced,
            failed = summary.failures.len(),
            interrupted = summary.interrupted,
            duration_ms = summary.stats.duration_ms,
            "Sync finished"
        );

        Ok(summary)
    }

    async fn run_partition(
        &self,
        stream: &StreamDefinition,
        context: PartitionContext,
        children: &[&StreamDefinition],
        emit: bool,
        sink: &dyn MessageSink,
    ) -> PartitionRun {
        let key = context.key();
        let mut run = PartitionRun::new(children);

        let result = self
            .drive_partition(stream, context, &key, emit, sink, &mut run)
            .await;
        run.outcome = match result {
            Ok(true) => PartitionOutcome::Completed,
            Ok(false) => PartitionOutcome::Interrupted,
            Err(e) => {
                warn!(stream = stream.name, partition = %key, error = %e, "Partition aborted");
                let last_checkpoint = self
                    .state
                    .snapshot()
                    .await
                    .entry(stream.name, &key)
                    .map(|entry| entry.value.clone());
                PartitionOutcome::Failed(PartitionFailure {
                    stream: stream.name.to_string(),
                    partition: key,
                    error: e.to_string(),
                    last_checkpoint,
                })
            }
        };

        run
    }

    /// Page through one partition. Returns `false` when stopped by shutdown.
    async fn drive_partition(
        &self,
        stream: &StreamDefinition,
        context: PartitionContext,
        key: &str,
        emit: bool,
        sink: &dyn MessageSink,
        run: &mut PartitionRun,
    ) -> Result<bool> {
        // Ancestors that are only read for their children neither filter
        // nor advance bookmarks.
        let replication = stream.replication.filter(|_| emit);
        let resume_from = match replication {
            Some(r) => self.state.get(stream.name, key, r.kind).await,
            None => None,
        };
        debug!(stream = stream.name, partition = %key, resume_from = ?resume_from, "Starting partition");

        let mut records = RecordStream::new(Arc::clone(&self.client), stream.clone(), context, resume_from)?;
        let mut unsorted_max: Option<Bookmark> = None;
        let mut since_checkpoint = 0;

        loop {
            if self.is_shutting_down() {
                info!(stream = stream.name, partition = %key, "Shutdown requested, stopping partition");
                return Ok(false);
            }

            let Some(page) = records.next_page().await? else {
                break;
            };
            run.pages += 1;

            for record in &page.records {
                for (_, router) in &mut run.children {
                    router.push_record(&record.context, &record.record);
                }
            }

            if emit {
                let count = page.records.len();
                for record in page.records {
                    sink.write(&Message::record(record)).await?;
                }
                run.records += count;
                since_checkpoint += count;
            }

            if let (Some(replication), Some(max)) = (replication, page.max_bookmark) {
                if replication.sorted {
                    self.state.offer(stream.name, key, replication.field, &max).await;
                } else {
                    unsorted_max = Some(higher(unsorted_max, max));
                }
            }

            if since_checkpoint >= self.config.checkpoint_interval && self.state.is_dirty() {
                self.checkpoint(sink).await?;
                run.checkpoints += 1;
                since_checkpoint = 0;
            }
        }

        if let (Some(replication), Some(max)) = (replication, unsorted_max) {
            self.state.offer(stream.name, key, replication.field, &max).await;
        }
        if self.state.is_dirty() {
            self.checkpoint(sink).await?;
            run.checkpoints += 1;
        }

        debug!(stream = stream.name, partition = %key, requests = records.requests(), "Partition complete");
        Ok(true)
    }

    async fn checkpoint(&self, sink: &dyn MessageSink) -> Result<()> {
        let snapshot = self.state.checkpoint().await?;
        sink.write(&Message::state(snapshot)).await?;
        sink.flush().await
    }

    fn is_shutting_down(&self) -> bool {
        self.shutdown.as_ref().is_some_and(|rx| *rx.borrow())
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("streams", &self.catalog.len())
            .field("organizations", &self.organizations)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn higher(current: Option<Bookmark>, candidate: Bookmark) -> Bookmark {
    match current {
        Some(current) if candidate.partial_cmp(&current) != Some(Ordering::Greater) => current,
        _ => candidate,
    }
}

/// Result of one stream-partition run
struct PartitionRun {
    records: usize,
    pages: usize,
    checkpoints: usize,
    /// Child partitions found in this partition's records
    children: Vec<(&'static str, ParentRouter)>,
    outcome: PartitionOutcome,
}

impl PartitionRun {
    fn new(children: &[&StreamDefinition]) -> Self {
        Self {
            records: 0,
            pages: 0,
            checkpoints: 0,
            children: children
                .iter()
                .filter_map(|child| match child.partition {
                    PartitionSource::Parent { fields, .. } => {
                        Some((child.name, ParentRouter::new(fields)))
                    }
                    PartitionSource::Organizations => None,
                })
                .collect(),
            outcome: PartitionOutcome::Completed,
        }
    }
}

enum PartitionOutcome {
    Completed,
    Interrupted,
    Failed(PartitionFailure),
}

#[cfg(test)]
mod tests;
