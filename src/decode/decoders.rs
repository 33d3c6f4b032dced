//! JSON record decoder

use super::types::RecordDecoder;
use crate::error::{Error, Result};
use serde_json::Value;

/// JSON decoder with a record selector
///
/// Supported selectors:
/// - `$` - the whole body is one record (object endpoints)
/// - `$[*]` - the body is an array of records
/// - `$.a.b[*]` - the array at `a.b`
/// - `$.a.b` - the value at `a.b`, flattened when it is an array
///
/// Anything more involved (filters, recursive descent) goes through
/// jsonpath-rust.
#[derive(Debug, Clone)]
pub struct JsonDecoder {
    record_path: String,
}

impl Default for JsonDecoder {
    fn default() -> Self {
        Self {
            record_path: "$".to_string(),
        }
    }
}

impl JsonDecoder {
    /// Create a decoder that treats the whole body as the record set
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a decoder with a record path
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            record_path: path.into(),
        }
    }

    /// Record path of this decoder
    pub fn record_path(&self) -> &str {
        &self.record_path
    }

    fn extract_records(&self, value: &Value) -> Result<Vec<Value>> {
        if value.is_null() {
            return Ok(vec![]);
        }

        let path = self.record_path.trim();
        if path == "$" || path.is_empty() {
            return Ok(vec![value.clone()]);
        }
        if is_simple_path(path) {
            return Ok(match extract_simple_path(value, path) {
                Some(Value::Array(arr)) => arr,
                Some(Value::Null) | None => vec![],
                Some(v) => vec![v],
            });
        }
        extract_with_jsonpath(value, path)
    }
}

impl RecordDecoder for JsonDecoder {
    fn decode(&self, body: &Value) -> Result<Vec<Value>> {
        self.extract_records(body)
    }

    fn decode_raw(&self, body: &str) -> Result<Value> {
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(body)
            .map_err(|e| Error::serialization(format!("Failed to parse JSON: {e}")))
    }
}

/// Dot paths with an optional trailing `[*]`
fn is_simple_path(path: &str) -> bool {
    let body = path.strip_prefix('$').unwrap_or(path);
    let body = body.strip_suffix("[*]").unwrap_or(body);
    body.split('.')
        .filter(|part| !part.is_empty())
        .all(|part| part.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-'))
}

/// Extract a value using a simple path like `$.deployment.resources[*]`
fn extract_simple_path(value: &Value, path: &str) -> Option<Value> {
    let path = path.strip_prefix('$').unwrap_or(path);
    let path = path.strip_suffix("[*]").unwrap_or(path);

    let mut current = value;
    for part in path.split('.').filter(|p| !p.is_empty()) {
        current = current.get(part)?;
    }
    Some(current.clone())
}

/// Extract records using jsonpath-rust
fn extract_with_jsonpath(value: &Value, path: &str) -> Result<Vec<Value>> {
    use jsonpath_rust::JsonPath;

    let jp = JsonPath::try_from(path)
        .map_err(|e| Error::json_path(format!("Invalid JSONPath '{path}': {e}")))?;

    match jp.find(value) {
        Value::Array(arr) => Ok(arr),
        Value::Null => Ok(vec![]),
        other => Ok(vec![other]),
    }
}
