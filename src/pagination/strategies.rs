//! Pagination strategy implementations
//!
//! Each strategy handles a specific pagination pattern.

use super::types::{NextPage, PageResponse, PaginationState, Paginator};
use crate::partition::extract_json_path;
use crate::types::StringMap;
use serde_json::Value;
use tracing::warn;

// ============================================================================
// No Pagination
// ============================================================================

/// No pagination - single request
#[derive(Debug, Clone, Default)]
pub struct NoPaginator;

impl Paginator for NoPaginator {
    fn initial_params(&self, _state: &mut PaginationState) -> StringMap {
        StringMap::new()
    }

    fn process_response(&self, response: &PageResponse, state: &mut PaginationState) -> NextPage {
        state.add_fetched(response.record_count());
        state.mark_done();
        NextPage::Done
    }
}

// ============================================================================
// Offset Pagination
// ============================================================================

/// Offset-based pagination
///
/// `?offset=100&limit=50`. A page shorter than the limit is the last one.
#[derive(Debug, Clone)]
pub struct OffsetPaginator {
    /// Query parameter name for offset
    pub offset_param: String,
    /// Query parameter name for limit
    pub limit_param: String,
    /// Number of records per page
    pub limit_value: u32,
}

impl OffsetPaginator {
    /// Create a new offset paginator
    pub fn new(
        offset_param: impl Into<String>,
        limit_param: impl Into<String>,
        limit_value: u32,
    ) -> Self {
        Self {
            offset_param: offset_param.into(),
            limit_param: limit_param.into(),
            limit_value: limit_value.max(1),
        }
    }

    fn params(&self, offset: u32) -> StringMap {
        let mut params = StringMap::new();
        params.insert(self.offset_param.clone(), offset.to_string());
        params.insert(self.limit_param.clone(), self.limit_value.to_string());
        params
    }
}

impl Paginator for OffsetPaginator {
    fn initial_params(&self, state: &mut PaginationState) -> StringMap {
        self.params(state.offset)
    }

    fn process_response(&self, response: &PageResponse, state: &mut PaginationState) -> NextPage {
        let count = response.record_count();
        state.add_fetched(count);

        if count < self.limit_value as usize {
            state.mark_done();
            return NextPage::Done;
        }

        state.offset += self.limit_value;
        NextPage::with_params(self.params(state.offset))
    }
}

// ============================================================================
// Page Number Pagination
// ============================================================================

/// Page number pagination
///
/// `?page=2&pageSize=100`. A short or empty page is the last one.
#[derive(Debug, Clone)]
pub struct PageNumberPaginator {
    /// Query parameter name for page number
    pub page_param: String,
    /// Query parameter name for page size
    pub page_size_param: String,
    /// First page number (usually 0 or 1)
    pub start_page: u32,
    /// Page size value
    pub page_size: u32,
}

impl PageNumberPaginator {
    /// Create a new page number paginator
    pub fn new(
        page_param: impl Into<String>,
        page_size_param: impl Into<String>,
        start_page: u32,
        page_size: u32,
    ) -> Self {
        Self {
            page_param: page_param.into(),
            page_size_param: page_size_param.into(),
            start_page,
            page_size: page_size.max(1),
        }
    }

    fn params(&self, page: u32) -> StringMap {
        let mut params = StringMap::new();
        params.insert(self.page_param.clone(), page.to_string());
        params.insert(self.page_size_param.clone(), self.page_size.to_string());
        params
    }
}

impl Paginator for PageNumberPaginator {
    fn initial_params(&self, state: &mut PaginationState) -> StringMap {
        state.page = self.start_page;
        self.params(state.page)
    }

    fn process_response(&self, response: &PageResponse, state: &mut PaginationState) -> NextPage {
        let count = response.record_count();
        state.add_fetched(count);

        if count < self.page_size as usize {
            state.mark_done();
            return NextPage::Done;
        }

        state.page += 1;
        NextPage::with_params(self.params(state.page))
    }
}

// ============================================================================
// Cursor Token Pagination
// ============================================================================

/// Continuation token pagination
///
/// The token is read from the response body and sent back as a query
/// parameter. A missing, null or empty token ends pagination.
#[derive(Debug, Clone)]
pub struct CursorPaginator {
    /// Query parameter name for the token
    pub cursor_param: String,
    /// Dot path of the token in the response body
    pub cursor_path: String,
}

impl CursorPaginator {
    /// Create a new cursor paginator
    pub fn new(cursor_param: impl Into<String>, cursor_path: impl Into<String>) -> Self {
        Self {
            cursor_param: cursor_param.into(),
            cursor_path: cursor_path.into(),
        }
    }
}

impl Paginator for CursorPaginator {
    fn initial_params(&self, _state: &mut PaginationState) -> StringMap {
        StringMap::new()
    }

    fn process_response(&self, response: &PageResponse, state: &mut PaginationState) -> NextPage {
        state.add_fetched(response.record_count());

        let Some(cursor) = extract_json_path(&response.body, &self.cursor_path)
            .and_then(|v| value_as_token(&v))
        else {
            state.mark_done();
            return NextPage::Done;
        };

        // A server echoing the same token would loop forever.
        if state.cursor.as_deref() == Some(cursor.as_str()) {
            warn!(cursor = %cursor, "Continuation token did not advance, stopping pagination");
            state.mark_done();
            return NextPage::Done;
        }

        state.cursor = Some(cursor.clone());
        NextPage::with_param(&self.cursor_param, cursor)
    }
}

fn value_as_token(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ============================================================================
// Link Header Pagination
// ============================================================================

/// Link header pagination (RFC 8288)
///
/// Extracts next page URL from the Link header, or from a body field when
/// configured. Format: `Link: <https://api.example.com/...?page=2>; rel="next"`
#[derive(Debug, Clone)]
pub struct LinkHeaderPaginator {
    /// Rel value to follow (default: "next")
    pub rel: String,
    /// Dot path of the next URL in the body
    pub body_field: Option<String>,
}

impl Default for LinkHeaderPaginator {
    fn default() -> Self {
        Self {
            rel: "next".to_string(),
            body_field: None,
        }
    }
}

impl LinkHeaderPaginator {
    /// Create a new link header paginator
    pub fn new(rel: impl Into<String>) -> Self {
        Self {
            rel: rel.into(),
            body_field: None,
        }
    }

    /// Read the next URL from a body field instead of the header
    #[must_use]
    pub fn with_body_field(mut self, path: impl Into<String>) -> Self {
        self.body_field = Some(path.into());
        self
    }

    fn next_url(&self, response: &PageResponse) -> Option<String> {
        if let Some(path) = &self.body_field {
            return extract_json_path(&response.body, path)
                .and_then(|v| v.as_str().map(str::to_string))
                .filter(|s| !s.is_empty());
        }

        response
            .headers
            .get_all("link")
            .iter()
            .filter_map(|v| v.to_str().ok())
            .find_map(|header| parse_link_header(header, &self.rel))
    }
}

impl Paginator for LinkHeaderPaginator {
    fn initial_params(&self, _state: &mut PaginationState) -> StringMap {
        StringMap::new()
    }

    fn process_response(&self, response: &PageResponse, state: &mut PaginationState) -> NextPage {
        state.add_fetched(response.record_count());

        match self.next_url(response) {
            Some(url) => {
                state.page += 1;
                NextPage::with_url(url)
            }
            None => {
                state.mark_done();
                NextPage::Done
            }
        }
    }
}

/// Parse a Link header and extract the URL for the given rel
pub(crate) fn parse_link_header(header: &str, target_rel: &str) -> Option<String> {
    // Link header format: <url>; rel="next", <url>; rel="prev"
    for part in header.split(',') {
        let mut url = None;
        let mut rel = None;

        for segment in part.trim().split(';') {
            let segment = segment.trim();
            if segment.starts_with('<') && segment.ends_with('>') {
                url = Some(&segment[1..segment.len() - 1]);
            } else if let Some(stripped) = segment.strip_prefix("rel=") {
                rel = Some(stripped.trim_matches('"').trim_matches('\''));
            }
        }

        if let (Some(u), Some(r)) = (url, rel) {
            if r.split_whitespace().any(|r| r == target_rel) {
                return Some(u.to_string());
            }
        }
    }

    None
}
