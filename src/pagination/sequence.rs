//! Page request sequencing
//!
//! Turns a strategy plus a base request into the sequence of page requests
//! for one partition run.

use super::strategies::{
    CursorPaginator, LinkHeaderPaginator, NoPaginator, OffsetPaginator, PageNumberPaginator,
};
use super::types::{NextPage, PageRequest, PageResponse, PaginationState, PaginationStrategy, Paginator};
use tracing::debug;
use url::Url;

impl PaginationStrategy {
    /// Build the paginator implementing this strategy
    pub fn paginator(&self) -> Box<dyn Paginator> {
        match *self {
            Self::Unpaged => Box::new(NoPaginator),
            Self::OffsetPaged {
                offset_param,
                limit_param,
                page_size,
            } => Box::new(OffsetPaginator::new(offset_param, limit_param, page_size)),
            Self::PageNumberPaged {
                page_param,
                page_size_param,
                start_page,
                page_size,
            } => Box::new(PageNumberPaginator::new(
                page_param,
                page_size_param,
                start_page,
                page_size,
            )),
            Self::CursorTokenPaged {
                token_param,
                token_path,
            } => Box::new(CursorPaginator::new(token_param, token_path)),
            Self::LinkHeaderPaged { rel, body_field } => {
                let paginator = LinkHeaderPaginator::new(rel);
                match body_field {
                    Some(field) => Box::new(paginator.with_body_field(field)),
                    None => Box::new(paginator),
                }
            }
        }
    }
}

/// Sequence of page requests for one pagination run
///
/// `next(None)` yields the first request; every following call takes the
/// previous response and yields the next request, or `None` once the strategy
/// reports exhaustion.
pub struct PageSequence {
    paginator: Box<dyn Paginator>,
    base: PageRequest,
    current: Option<PageRequest>,
    state: PaginationState,
}

impl PageSequence {
    /// Create a sequence starting from `base`
    pub fn new(strategy: &PaginationStrategy, base: PageRequest) -> Self {
        Self::with_paginator(strategy.paginator(), base)
    }

    /// Create a sequence from an explicit paginator
    pub fn with_paginator(paginator: Box<dyn Paginator>, base: PageRequest) -> Self {
        Self {
            paginator,
            base,
            current: None,
            state: PaginationState::new(),
        }
    }

    /// Next request to issue, or `None` when pagination is exhausted
    pub fn next(&mut self, previous: Option<&PageResponse>) -> Option<PageRequest> {
        if self.state.done {
            return None;
        }

        let request = match (previous, &self.current) {
            (None, None) => {
                let params = self.paginator.initial_params(&mut self.state);
                self.base.clone().with_params(params)
            }
            // Asked for the first page twice; repeat it.
            (None, Some(current)) => return Some(current.clone()),
            (Some(response), _) => match self.paginator.process_response(response, &mut self.state)
            {
                NextPage::Done => {
                    debug!(
                        requests = self.state.requests,
                        records = self.state.total_fetched,
                        "Pagination complete"
                    );
                    return None;
                }
                NextPage::Continue { query_params, url } => match url {
                    Some(next_url) => {
                        let mut request = self.base.clone();
                        request.url = self.resolve(&next_url);
                        // The next URL carries its own query string.
                        request.query.clear();
                        request.with_params(query_params)
                    }
                    None => {
                        let mut request = self.current.clone().unwrap_or_else(|| self.base.clone());
                        request.query.extend(query_params);
                        request
                    }
                },
            },
        };

        self.state.requests += 1;
        self.current = Some(request.clone());
        Some(request)
    }

    /// Pagination state so far
    pub fn state(&self) -> &PaginationState {
        &self.state
    }

    /// Whether pagination is exhausted
    pub fn is_done(&self) -> bool {
        self.state.done
    }

    /// Resolve a possibly relative next URL against the current request
    fn resolve(&self, next_url: &str) -> String {
        if Url::parse(next_url).is_ok() {
            return next_url.to_string();
        }
        let current = self.current.as_ref().map_or(&self.base.url, |r| &r.url);
        match Url::parse(current).and_then(|base| base.join(next_url)) {
            Ok(url) => url.to_string(),
            // Relative base (resolved by the executor); keep the path as is.
            Err(_) => next_url.to_string(),
        }
    }
}

impl std::fmt::Debug for PageSequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageSequence")
            .field("base", &self.base)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
