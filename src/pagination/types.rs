//! Pagination types and traits
//!
//! Defines the page request/response values and the core pagination
//! abstractions used by all strategies.

use crate::decode::RecordDecoder;
use crate::error::Result;
use crate::types::{Method, StringMap};
use reqwest::header::HeaderMap;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// Page Request / Response
// ============================================================================

/// A single page request. Plain value, cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// HTTP method
    pub method: Method,
    /// Absolute URL, or a path relative to the executor's base URL
    pub url: String,
    /// Query parameters (sorted)
    pub query: StringMap,
    /// Extra request headers
    pub headers: StringMap,
}

impl PageRequest {
    /// Create a GET request
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: Method::GET,
            url: url.into(),
            query: StringMap::new(),
            headers: StringMap::new(),
        }
    }

    /// Add a query parameter
    #[must_use]
    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Add several query parameters
    #[must_use]
    pub fn with_params(mut self, params: StringMap) -> Self {
        self.query.extend(params);
        self
    }

    /// Add a header
    #[must_use]
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Cache key: method, resolved URL and sorted query. Auth is not part of it.
    pub fn cache_key(&self, full_url: &str) -> String {
        let query = self
            .query
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        format!("{} {full_url}?{query}", self.method)
    }
}

/// A received page. Transient; only lives for one pagination step.
#[derive(Debug, Clone)]
pub struct PageResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Parsed body (`Null` for an empty body)
    pub body: Value,
    /// Records extracted from the body
    pub records: Vec<Value>,
}

impl PageResponse {
    /// Create a response with no records extracted yet
    pub fn new(status: u16, headers: HeaderMap, body: Value) -> Self {
        Self {
            status,
            headers,
            body,
            records: Vec::new(),
        }
    }

    /// An empty page, used for tolerated error statuses
    pub fn empty(status: u16) -> Self {
        Self::new(status, HeaderMap::new(), Value::Null)
    }

    /// Extract the records of this page with the given decoder
    pub fn decoded(mut self, decoder: &dyn RecordDecoder) -> Result<Self> {
        self.records = decoder.decode(&self.body)?;
        Ok(self)
    }

    /// Number of records on this page
    pub fn record_count(&self) -> usize {
        self.records.len()
    }
}

// ============================================================================
// Strategy description
// ============================================================================

/// Pagination strategy of a stream. Closed set; lives in the immutable
/// stream definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaginationStrategy {
    /// Single request
    #[default]
    Unpaged,

    /// Offset/limit pagination
    OffsetPaged {
        /// Query parameter name for offset
        offset_param: &'static str,
        /// Query parameter name for limit
        limit_param: &'static str,
        /// Number of records per page
        page_size: u32,
    },

    /// Page number pagination
    PageNumberPaged {
        /// Query parameter name for the page number
        page_param: &'static str,
        /// Query parameter name for the page size
        page_size_param: &'static str,
        /// First page number (usually 0 or 1)
        start_page: u32,
        /// Number of records per page
        page_size: u32,
    },

    /// Continuation token read from the response body
    CursorTokenPaged {
        /// Query parameter carrying the token
        token_param: &'static str,
        /// Dot path of the token in the body
        token_path: &'static str,
    },

    /// RFC 8288 `Link` header, or a next URL carried in the body
    LinkHeaderPaged {
        /// Rel value to follow
        rel: &'static str,
        /// Dot path of a next URL in the body, used instead of the header
        body_field: Option<&'static str>,
    },
}

impl PaginationStrategy {
    /// Pulumi's continuation token pagination
    pub const fn continuation_token() -> Self {
        Self::CursorTokenPaged {
            token_param: "continuationToken",
            token_path: "continuationToken",
        }
    }

    /// Pulumi's `page`/`pageSize` pagination
    pub const fn page_number(page_size: u32) -> Self {
        Self::PageNumberPaged {
            page_param: "page",
            page_size_param: "pageSize",
            start_page: 1,
            page_size,
        }
    }

    /// `offset`/`limit` pagination
    pub const fn offset(page_size: u32) -> Self {
        Self::OffsetPaged {
            offset_param: "offset",
            limit_param: "limit",
            page_size,
        }
    }

    /// `Link: <...>; rel="next"` pagination
    pub const fn link_header() -> Self {
        Self::LinkHeaderPaged {
            rel: "next",
            body_field: None,
        }
    }
}

// ============================================================================
// Paginator
// ============================================================================

/// Result of the next page computation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextPage {
    /// More pages available
    Continue {
        /// Query parameters to add/replace
        query_params: StringMap,
        /// Replacement URL (link header / next URL pagination)
        url: Option<String>,
    },
    /// No more pages
    Done,
}

impl NextPage {
    /// Create a continuation with query parameters
    pub fn with_params(params: StringMap) -> Self {
        Self::Continue {
            query_params: params,
            url: None,
        }
    }

    /// Create a continuation with a single parameter
    pub fn with_param(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut params = StringMap::new();
        params.insert(key.into(), value.into());
        Self::with_params(params)
    }

    /// Create a continuation with a new URL
    pub fn with_url(url: impl Into<String>) -> Self {
        Self::Continue {
            query_params: StringMap::new(),
            url: Some(url.into()),
        }
    }

    /// Check if this is a done result
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}

/// Tracks pagination state during iteration
#[derive(Debug, Clone, Default)]
pub struct PaginationState {
    /// Current page number
    pub page: u32,
    /// Current offset
    pub offset: u32,
    /// Last cursor value
    pub cursor: Option<String>,
    /// Total records fetched so far
    pub total_fetched: u64,
    /// Number of requests issued
    pub requests: u32,
    /// Is pagination complete?
    pub done: bool,
}

impl PaginationState {
    /// Create a new pagination state
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark pagination as complete
    pub fn mark_done(&mut self) {
        self.done = true;
    }

    /// Add to total fetched
    pub fn add_fetched(&mut self, count: usize) {
        self.total_fetched += count as u64;
    }
}

/// Core trait for pagination strategies
pub trait Paginator: Send + Sync {
    /// Query parameters for the first request
    fn initial_params(&self, state: &mut PaginationState) -> StringMap;

    /// Process a response and determine if there's a next page
    fn process_response(&self, response: &PageResponse, state: &mut PaginationState) -> NextPage;
}
