//! Messages written to the sink

use crate::engine::EmittedRecord;
use crate::error::Result;
use crate::state::State;
use serde::Serialize;

/// One line of sink output
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "UPPERCASE")]
pub enum Message {
    /// A record of one stream
    Record(EmittedRecord),
    /// Full bookmark snapshot
    State {
        /// Snapshot at the checkpoint
        value: State,
    },
}

impl Message {
    /// Create a record message
    pub fn record(record: EmittedRecord) -> Self {
        Self::Record(record)
    }

    /// Create a state message
    pub fn state(value: State) -> Self {
        Self::State { value }
    }

    /// Check if this is a record message
    pub fn is_record(&self) -> bool {
        matches!(self, Self::Record(_))
    }

    /// Check if this is a state message
    pub fn is_state(&self) -> bool {
        matches!(self, Self::State { .. })
    }

    /// Serialize as a single JSON line (without the newline)
    pub fn to_json_line(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}
