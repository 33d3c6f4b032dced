//! State types for tracking sync progress
//!
//! These types are serialized to JSON and persisted between runs.

use crate::types::BookmarkKind;
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::BTreeMap;

// ============================================================================
// Bookmark
// ============================================================================

/// Replication cursor of one stream partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Bookmark {
    /// RFC 3339 timestamp
    Timestamp(String),
    /// Unix seconds
    UnixTime(i64),
    /// Monotonic counter
    Numeric(i64),
}

impl Bookmark {
    /// Kind of this bookmark
    pub fn kind(&self) -> BookmarkKind {
        match self {
            Self::Timestamp(_) => BookmarkKind::Timestamp,
            Self::UnixTime(_) => BookmarkKind::UnixTime,
            Self::Numeric(_) => BookmarkKind::Numeric,
        }
    }

    /// Read a bookmark of the given kind from a record value.
    ///
    /// Returns `None` for nulls and values that do not fit the kind.
    pub fn from_value(value: &Value, kind: BookmarkKind) -> Option<Self> {
        match (kind, value) {
            (BookmarkKind::Timestamp, Value::String(s)) if !s.is_empty() => {
                Some(Self::Timestamp(s.clone()))
            }
            (BookmarkKind::Timestamp, Value::Number(n)) => {
                let dt = Utc.timestamp_opt(n.as_i64()?, 0).single()?;
                Some(Self::Timestamp(dt.to_rfc3339_opts(SecondsFormat::Secs, true)))
            }
            (BookmarkKind::UnixTime, Value::Number(n)) => {
                n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)).map(Self::UnixTime)
            }
            (BookmarkKind::UnixTime, Value::String(s)) => s
                .parse::<i64>()
                .ok()
                .or_else(|| parse_timestamp(s).map(|dt| dt.timestamp()))
                .map(Self::UnixTime),
            (BookmarkKind::Numeric, Value::Number(n)) => n.as_i64().map(Self::Numeric),
            (BookmarkKind::Numeric, Value::String(s)) => s.parse().ok().map(Self::Numeric),
            _ => None,
        }
    }

    /// Bookmark of the given kind for a start date. Counters have no date
    /// equivalent.
    pub fn from_datetime(dt: DateTime<Utc>, kind: BookmarkKind) -> Option<Self> {
        match kind {
            BookmarkKind::Timestamp => Some(Self::Timestamp(
                dt.to_rfc3339_opts(SecondsFormat::Secs, true),
            )),
            BookmarkKind::UnixTime => Some(Self::UnixTime(dt.timestamp())),
            BookmarkKind::Numeric => None,
        }
    }

    /// JSON value of the bookmark
    pub fn to_value(&self) -> Value {
        match self {
            Self::Timestamp(s) => Value::String(s.clone()),
            Self::UnixTime(n) | Self::Numeric(n) => Value::from(*n),
        }
    }

    /// Bookmark as unix seconds, for server-side time filters
    pub fn as_unix_seconds(&self) -> Option<i64> {
        match self {
            Self::Timestamp(s) => parse_timestamp(s).map(|dt| dt.timestamp()),
            Self::UnixTime(n) => Some(*n),
            Self::Numeric(_) => None,
        }
    }
}

impl PartialOrd for Bookmark {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Self::Timestamp(a), Self::Timestamp(b)) => {
                match (parse_timestamp(a), parse_timestamp(b)) {
                    (Some(x), Some(y)) => Some(x.cmp(&y)),
                    _ => Some(a.cmp(b)),
                }
            }
            (Self::UnixTime(a), Self::UnixTime(b)) | (Self::Numeric(a), Self::Numeric(b)) => {
                Some(a.cmp(b))
            }
            _ => None,
        }
    }
}

impl std::fmt::Display for Bookmark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Timestamp(s) => f.write_str(s),
            Self::UnixTime(n) | Self::Numeric(n) => write!(f, "{n}"),
        }
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

// ============================================================================
// Persisted layout
// ============================================================================

/// Persisted bookmark of one partition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookmarkEntry {
    /// Record field the bookmark tracks
    pub replication_key: String,
    /// Comparison semantics of `value`
    pub kind: BookmarkKind,
    /// Bookmark value
    pub value: Value,
}

impl BookmarkEntry {
    /// Create an entry from a bookmark
    pub fn new(replication_key: impl Into<String>, bookmark: &Bookmark) -> Self {
        Self {
            replication_key: replication_key.into(),
            kind: bookmark.kind(),
            value: bookmark.to_value(),
        }
    }

    /// Decode the stored value
    pub fn bookmark(&self) -> Option<Bookmark> {
        Bookmark::from_value(&self.value, self.kind)
    }
}

/// Complete state of the tap
///
/// `{"bookmarks": {<stream>: {<partition key>: {...}}}}`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct State {
    /// Per-stream, per-partition bookmarks
    #[serde(default)]
    pub bookmarks: BTreeMap<String, BTreeMap<String, BookmarkEntry>>,
}

impl State {
    /// Create a new empty state
    pub fn new() -> Self {
        Self::default()
    }

    /// Bookmark entry of a partition
    pub fn entry(&self, stream: &str, partition_key: &str) -> Option<&BookmarkEntry> {
        self.bookmarks.get(stream)?.get(partition_key)
    }

    /// Set the bookmark entry of a partition
    pub fn set_entry(&mut self, stream: &str, partition_key: &str, entry: BookmarkEntry) {
        self.bookmarks
            .entry(stream.to_string())
            .or_default()
            .insert(partition_key.to_string(), entry);
    }

    /// Whether no bookmark is stored
    pub fn is_empty(&self) -> bool {
        self.bookmarks.values().all(BTreeMap::is_empty)
    }
}
