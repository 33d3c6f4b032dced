//! State manager implementation
//!
//! Holds the bookmarks of the current run and persists them with atomic
//! writes (temp file + rename) at checkpoints.

use super::types::{Bookmark, BookmarkEntry, State};
use crate::error::{Error, Result};
use crate::types::BookmarkKind;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};

/// State manager for persisting and loading bookmarks
#[derive(Debug, Clone)]
pub struct StateManager {
    /// Path to the state file (`None` keeps state in memory)
    path: Option<PathBuf>,
    /// Current state
    state: Arc<RwLock<State>>,
    /// Accepted offers not yet checkpointed
    dirty: Arc<AtomicBool>,
    /// One checkpoint writer at a time
    checkpoint_lock: Arc<Mutex<()>>,
    /// Floor for partitions without a stored bookmark
    start_date: Option<DateTime<Utc>>,
}

impl StateManager {
    fn with_state(path: Option<PathBuf>, state: State) -> Self {
        Self {
            path,
            state: Arc::new(RwLock::new(state)),
            dirty: Arc::new(AtomicBool::new(false)),
            checkpoint_lock: Arc::new(Mutex::new(())),
            start_date: None,
        }
    }

    /// Create an in-memory state manager (no file persistence)
    pub fn in_memory() -> Self {
        Self::with_state(None, State::new())
    }

    /// Create a state manager from a file, loading existing state if present
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| Error::state(format!("Failed to read state file: {e}")))?;
            if contents.trim().is_empty() {
                State::new()
            } else {
                serde_json::from_str(&contents)
                    .map_err(|e| Error::state(format!("Failed to parse state file: {e}")))?
            }
        } else {
            State::new()
        };

        Ok(Self::with_state(Some(path), state))
    }

    /// Create a state manager from inline JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let state: State = serde_json::from_str(json)
            .map_err(|e| Error::state(format!("Failed to parse state JSON: {e}")))?;
        Ok(Self::with_state(None, state))
    }

    /// Persist checkpoints to `path`
    #[must_use]
    pub fn with_path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Use `start_date` as the bookmark floor of partitions never synced
    #[must_use]
    pub fn with_start_date(mut self, start_date: Option<DateTime<Utc>>) -> Self {
        self.start_date = start_date;
        self
    }

    /// Bookmark to resume a partition from: the stored bookmark, else the
    /// configured start date converted to `kind`, else none.
    pub async fn get(&self, stream: &str, partition_key: &str, kind: BookmarkKind) -> Option<Bookmark> {
        let stored = {
            let state = self.state.read().await;
            state.entry(stream, partition_key).and_then(BookmarkEntry::bookmark)
        };

        match stored {
            Some(bookmark) if bookmark.kind() == kind => Some(bookmark),
            Some(bookmark) => {
                warn!(
                    stream,
                    partition = partition_key,
                    stored = ?bookmark.kind(),
                    expected = ?kind,
                    "Stored bookmark has a different kind, ignoring it"
                );
                self.start_date.and_then(|dt| Bookmark::from_datetime(dt, kind))
            }
            None => self.start_date.and_then(|dt| Bookmark::from_datetime(dt, kind)),
        }
    }

    /// Offer a candidate bookmark. Accepted only if it does not regress the
    /// stored one; returns whether it was accepted. A stored bookmark of
    /// another kind is ignored by [`get`](Self::get), so it is replaced.
    pub async fn offer(
        &self,
        stream: &str,
        partition_key: &str,
        replication_key: &str,
        candidate: &Bookmark,
    ) -> bool {
        let mut state = self.state.write().await;

        if let Some(current) = state.entry(stream, partition_key).and_then(BookmarkEntry::bookmark) {
            match candidate.partial_cmp(&current) {
                Some(std::cmp::Ordering::Less) => {
                    debug!(stream, partition = partition_key, %candidate, %current, "Rejected regressing bookmark");
                    return false;
                }
                Some(std::cmp::Ordering::Equal) => return true,
                Some(std::cmp::Ordering::Greater) => {}
                None => {
                    warn!(
                        stream,
                        partition = partition_key,
                        %candidate,
                        %current,
                        "Replacing stored bookmark of a different kind"
                    );
                }
            }
        }

        state.set_entry(
            stream,
            partition_key,
            BookmarkEntry::new(replication_key, candidate),
        );
        self.dirty.store(true, Ordering::SeqCst);
        true
    }

    /// Flush the current state to durable storage and return the snapshot.
    ///
    /// The file is written whole through a temp file and a rename, so a
    /// crash never leaves a torn state file behind.
    pub async fn checkpoint(&self) -> Result<State> {
        let _writer = self.checkpoint_lock.lock().await;
        // Offers landing after the snapshot mark the state dirty again.
        let was_dirty = self.dirty.swap(false, Ordering::SeqCst);
        let snapshot = self.snapshot().await;

        if let Some(path) = &self.path {
            let written = match serde_json::to_string_pretty(&snapshot) {
                Ok(contents) => write_atomic(path, &contents).await,
                Err(e) => Err(Error::state(format!("Failed to serialize state: {e}"))),
            };
            if let Err(e) = written {
                self.dirty.fetch_or(was_dirty, Ordering::SeqCst);
                return Err(e);
            }
            debug!(path = %path.display(), "State checkpoint written");
        }

        Ok(snapshot)
    }

    /// Copy of the current state
    pub async fn snapshot(&self) -> State {
        self.state.read().await.clone()
    }

    /// Whether accepted offers are waiting for a checkpoint
    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    /// Serialize the state to JSON
    pub async fn to_json(&self) -> Result<String> {
        let state = self.state.read().await;
        Ok(serde_json::to_string(&*state)?)
    }

    /// Get the state file path
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Check if this is an in-memory state manager
    pub fn is_in_memory(&self) -> bool {
        self.path.is_none()
    }
}

async fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let temp_path = path.with_extension("tmp");
    tokio::fs::write(&temp_path, contents)
        .await
        .map_err(|e| Error::Checkpoint {
            message: format!("Failed to write state file: {e}"),
        })?;
    tokio::fs::rename(&temp_path, path)
        .await
        .map_err(|e| Error::Checkpoint {
            message: format!("Failed to rename state file: {e}"),
        })?;
    Ok(())
}
