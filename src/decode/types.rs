//! Decoder types and traits

use crate::error::Result;
use serde_json::Value;

/// Trait for extracting records from a parsed response body
pub trait RecordDecoder: Send + Sync {
    /// Extract the list of records from the body
    fn decode(&self, body: &Value) -> Result<Vec<Value>>;

    /// Parse a raw response body into a JSON value.
    ///
    /// An empty (or whitespace only) body decodes to `Null`.
    fn decode_raw(&self, body: &str) -> Result<Value>;
}
