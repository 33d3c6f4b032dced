//! State management module
//!
//! Handles bookmark tracking, checkpointing, and resumability.
//! State is persisted between sync runs to enable incremental syncs.
//!
//! # Overview
//!
//! The state module provides:
//! - `Bookmark` - replication cursor, compared by kind
//! - `State` - persisted `{"bookmarks": ...}` document
//! - `StateManager` - monotonic bookmark store with atomic checkpoints

mod manager;
mod types;

pub use manager::StateManager;
pub use types::{Bookmark, BookmarkEntry, State};
