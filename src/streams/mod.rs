//! Stream catalog module
//!
//! Each stream is an immutable [`StreamDefinition`]: path template, record
//! selector, pagination, partition source and optional replication key.

mod catalog;
mod types;

pub use catalog::{Catalog, StreamId};
pub use types::{ReplicationKey, ServerFilter, StreamDefinition};

#[cfg(test)]
mod tests;
