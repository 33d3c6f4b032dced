//! Error types for the Pulumi Cloud tap
//!
//! This module defines the error hierarchy for the whole crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use thiserror::Error;

/// The main error type for the tap
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Stream dependency cycle detected: {}", streams.join(" -> "))]
    DependencyCycle { streams: Vec<String> },

    #[error("Stream '{stream}' not found in catalog")]
    StreamNotFound { stream: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Client request error (HTTP {status}): {body}")]
    ClientRequest { status: u16, body: String },

    #[error("Rate limit exceeded after {attempts} attempts (last retry-after {retry_after_seconds}s)")]
    RateLimitExceeded {
        attempts: u32,
        retry_after_seconds: u64,
    },

    #[error("Transient server error after {attempts} attempts: {message}")]
    TransientServer { attempts: u32, message: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // Data Processing Errors
    // ============================================================================
    #[error("Malformed response body: {message}")]
    Serialization { message: String },

    #[error("JSONPath error: {message}")]
    JsonPath { message: String },

    // ============================================================================
    // State Errors
    // ============================================================================
    #[error("State error: {message}")]
    State { message: String },

    #[error("Checkpoint failed: {message}")]
    Checkpoint { message: String },

    // ============================================================================
    // Template Errors
    // ============================================================================
    #[error("Undefined variable in template: {variable}")]
    UndefinedVariable { variable: String },

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Output error: {message}")]
    Output { message: String },

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an invalid config value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a client request error
    pub fn client_request(status: u16, body: impl Into<String>) -> Self {
        Self::ClientRequest {
            status,
            body: body.into(),
        }
    }

    /// Create a serialization error for a malformed body
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Create a JSONPath error
    pub fn json_path(message: impl Into<String>) -> Self {
        Self::JsonPath {
            message: message.into(),
        }
    }

    /// Create an undefined variable error
    pub fn undefined_var(variable: impl Into<String>) -> Self {
        Self::UndefinedVariable {
            variable: variable.into(),
        }
    }

    /// Create a state error
    pub fn state(message: impl Into<String>) -> Self {
        Self::State {
            message: message.into(),
        }
    }

    /// Create an output error
    pub fn output(message: impl Into<String>) -> Self {
        Self::Output {
            message: message.into(),
        }
    }

    /// Whether a retry may succeed. For transport errors this covers
    /// timeouts, refused or reset connections, and bodies cut short.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(e) => e.is_timeout() || e.is_connect() || e.is_request() || e.is_body(),
            Error::RateLimitExceeded { .. } | Error::TransientServer { .. } => true,
            _ => false,
        }
    }

    /// Whether the failure is a client-side request problem that a retry
    /// cannot fix. Malformed bodies are classified the same way.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::ClientRequest { .. } | Error::Serialization { .. } | Error::JsonPath { .. }
        )
    }

    /// Whether the error must stop the tap before any stream runs
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            Error::Config { .. }
                | Error::MissingConfigField { .. }
                | Error::InvalidConfigValue { .. }
                | Error::DependencyCycle { .. }
                | Error::StreamNotFound { .. }
        )
    }

    /// HTTP status carried by the error, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::ClientRequest { status, .. } => Some(*status),
            Error::RateLimitExceeded { .. } => Some(429),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Result type alias for the tap
pub type Result<T> = std::result::Result<T, Error>;
