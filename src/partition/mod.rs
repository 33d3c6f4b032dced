//! Partition routing module
//!
//! Supports: configured organization list, parent stream records
//!
//! # Overview
//!
//! Partitions split a stream into independent pagination runs. Root streams
//! run once per configured organization; child streams run once per record
//! of their parent stream (for example once per stack).

mod routers;
mod types;

pub use routers::{extract_json_path, ListRouter, ParentRouter, ORG_KEY};
pub use types::{ContextField, PartitionContext, PartitionRouter, PartitionSource};
