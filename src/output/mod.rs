//! Output module
//!
//! Serializes sync messages for the downstream loader.
//!
//! # Overview
//!
//! Every message is one JSON object on its own line:
//! - `RECORD` carries a normalized record with its stream and partition
//! - `STATE` carries the full bookmark snapshot taken at a checkpoint
//!
//! Logs never go through a sink.

mod message;
mod sink;

pub use message::Message;
pub use sink::{JsonLinesSink, MemorySink, MessageSink};

#[cfg(test)]
mod tests;
