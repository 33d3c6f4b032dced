//! Message sinks

use super::message::Message;
use crate::engine::EmittedRecord;
use crate::error::{Error, Result};
use crate::state::State;
use async_trait::async_trait;
use std::io::{Stdout, Write};
use std::sync::{Mutex, MutexGuard};

/// Destination of sync messages. Shared by concurrently running partitions,
/// so writes take `&self`.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Write one message
    async fn write(&self, message: &Message) -> Result<()>;

    /// Flush buffered output
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Writes one JSON object per line
#[derive(Debug)]
pub struct JsonLinesSink<W> {
    writer: Mutex<W>,
}

impl JsonLinesSink<Stdout> {
    /// Sink on standard output
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> JsonLinesSink<W> {
    /// Wrap a writer
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Unwrap the writer
    pub fn into_inner(self) -> W {
        self.writer
            .into_inner()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn lock(&self) -> Result<MutexGuard<'_, W>> {
        self.writer
            .lock()
            .map_err(|_| Error::output("Sink writer lock poisoned"))
    }
}

#[async_trait]
impl<W: Write + Send> MessageSink for JsonLinesSink<W> {
    async fn write(&self, message: &Message) -> Result<()> {
        let line = message.to_json_line()?;
        let mut writer = self.lock()?;
        writeln!(writer, "{line}")?;
        // Loaders act on state lines as they arrive.
        if message.is_state() {
            writer.flush()?;
        }
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        self.lock()?.flush()?;
        Ok(())
    }
}

/// Keeps messages in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    messages: Mutex<Vec<Message>>,
}

impl MemorySink {
    /// Create an empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages in write order
    pub fn messages(&self) -> Vec<Message> {
        self.messages
            .lock()
            .map(|m| m.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Records in write order
    pub fn records(&self) -> Vec<EmittedRecord> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                Message::Record(record) => Some(record),
                Message::State { .. } => None,
            })
            .collect()
    }

    /// Records of one stream
    pub fn records_of(&self, stream: &str) -> Vec<EmittedRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.stream == stream)
            .collect()
    }

    /// State snapshots in write order
    pub fn states(&self) -> Vec<State> {
        self.messages()
            .into_iter()
            .filter_map(|m| match m {
                Message::State { value } => Some(value),
                Message::Record(_) => None,
            })
            .collect()
    }
}

#[async_trait]
impl MessageSink for MemorySink {
    async fn write(&self, message: &Message) -> Result<()> {
        self.messages
            .lock()
            .map_err(|_| Error::output("Sink lock poisoned"))?
            .push(message.clone());
        Ok(())
    }
}
