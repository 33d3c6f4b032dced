//! Partition router implementations
//!
//! Each router handles a specific partitioning strategy.

use super::types::{ContextField, PartitionContext, PartitionRouter};
use crate::error::Result;
use serde_json::Value;
use tracing::warn;

/// Context key holding the organization of root partitions
pub const ORG_KEY: &str = "org_name";

// ============================================================================
// List Router
// ============================================================================

/// List-based partition router
///
/// Creates one partition per value of a static list, e.g. the configured
/// organizations.
#[derive(Debug, Clone)]
pub struct ListRouter {
    /// List of partition values
    values: Vec<String>,
    /// Field name for partition
    partition_field: String,
}

impl ListRouter {
    /// Create a new list router
    pub fn new(values: Vec<String>, partition_field: impl Into<String>) -> Self {
        Self {
            values,
            partition_field: partition_field.into(),
        }
    }

    /// One partition per organization
    pub fn organizations(orgs: &[String]) -> Self {
        Self::new(orgs.to_vec(), ORG_KEY)
    }
}

impl PartitionRouter for ListRouter {
    fn partitions(&self) -> Result<Vec<PartitionContext>> {
        Ok(self
            .values
            .iter()
            .map(|v| PartitionContext::new().with(self.partition_field.clone(), v.clone()))
            .collect())
    }
}

// ============================================================================
// Parent Router
// ============================================================================

/// Parent stream-based partition router
///
/// Creates one child partition per parent record. Each child context is the
/// parent's own context extended with the mapped parent record fields, so a
/// child never needs to look at the parent record again.
#[derive(Debug, Clone)]
pub struct ParentRouter {
    /// Child context of each parent record, in emission order
    contexts: Vec<PartitionContext>,
    /// Parent fields to copy
    fields: &'static [ContextField],
}

impl ParentRouter {
    /// Create an empty parent router
    pub fn new(fields: &'static [ContextField]) -> Self {
        Self {
            contexts: Vec::new(),
            fields,
        }
    }

    /// Build the child context for one parent record.
    ///
    /// Returns `None` if a mapped field is missing from the record.
    pub fn child_context(
        fields: &[ContextField],
        parent: &PartitionContext,
        record: &Value,
    ) -> Option<PartitionContext> {
        let mut ctx = parent.clone();
        for field in fields {
            let value = extract_json_path(record, field.record_field)?;
            if value.is_null() {
                return None;
            }
            ctx.insert(field.key, value);
        }
        Some(ctx)
    }

    /// Register a parent record
    pub fn push_record(&mut self, parent: &PartitionContext, record: &Value) {
        match Self::child_context(self.fields, parent, record) {
            Some(ctx) => self.contexts.push(ctx),
            None => warn!(
                parent = %parent,
                "Parent record is missing a partition field, no child partition created"
            ),
        }
    }

    /// Add an already materialized child context
    pub fn push_context(&mut self, ctx: PartitionContext) {
        self.contexts.push(ctx);
    }

    /// Number of child partitions collected so far
    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    /// Whether no child partitions were collected
    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }
}

impl PartitionRouter for ParentRouter {
    fn partitions(&self) -> Result<Vec<PartitionContext>> {
        Ok(self.contexts.clone())
    }
}

/// Extract a value from JSON using a simple dot path (e.g., "id", "owner.name")
pub fn extract_json_path(value: &Value, path: &str) -> Option<Value> {
    let path = path.strip_prefix("$.").unwrap_or(path);
    let mut current = value;
    for part in path.split('.') {
        current = current.get(part)?;
    }
    Some(current.clone())
}
