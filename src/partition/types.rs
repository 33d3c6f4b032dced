//! Partition types and traits
//!
//! Defines the partition context handed to every pagination run and the
//! router abstraction that produces contexts.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Key/value scope of one pagination run, e.g. `{org_name: "acme"}` or
/// `{org_name: "acme", project_name: "web", stack_name: "prod"}`.
///
/// Keys are kept sorted so that `key()` is stable across runs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PartitionContext {
    values: BTreeMap<String, Value>,
}

impl PartitionContext {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value to the context
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Insert a value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    /// Get a string value by key
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    /// Iterate over the context entries in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the context has no keys
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Serialized partition key used to address bookmarks.
    ///
    /// Compact JSON of the sorted map, e.g. `{"org_name":"acme"}`.
    pub fn key(&self) -> String {
        serde_json::to_string(&self.values).unwrap_or_default()
    }

    /// Parse a serialized partition key back into a context
    pub fn from_key(key: &str) -> Result<Self> {
        Ok(serde_json::from_str(key)?)
    }

    /// Context as a JSON object
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.values
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

impl std::fmt::Display for PartitionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.key())
    }
}

/// Mapping from a parent record field to a child partition key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextField {
    /// Key in the child partition context
    pub key: &'static str,
    /// Dot path of the field in the (normalized) parent record
    pub record_field: &'static str,
}

impl ContextField {
    /// Map `record_field` of the parent record to `key`
    pub const fn new(key: &'static str, record_field: &'static str) -> Self {
        Self { key, record_field }
    }

    /// Parent field and child key share a name
    pub const fn same(key: &'static str) -> Self {
        Self {
            key,
            record_field: key,
        }
    }
}

/// Where a stream's partition contexts come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionSource {
    /// Once per configured organization, as `{org_name: <org>}`
    Organizations,
    /// Once per record emitted by the parent stream
    Parent {
        /// Name of the parent stream
        stream: &'static str,
        /// Fields copied from each parent record into the child context
        fields: &'static [ContextField],
    },
}

impl PartitionSource {
    /// Name of the parent stream, if any
    pub fn parent(&self) -> Option<&'static str> {
        match self {
            Self::Organizations => None,
            Self::Parent { stream, .. } => Some(stream),
        }
    }
}

/// Trait for partition routers
pub trait PartitionRouter: Send + Sync {
    /// Generate partition contexts
    fn partitions(&self) -> Result<Vec<PartitionContext>>;
}
