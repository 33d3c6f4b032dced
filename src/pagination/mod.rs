//! Pagination module
//!
//! Supports: Unpaged, Offset, Page Number, Continuation Token, Link Header
//!
//! # Overview
//!
//! The pagination module provides a unified interface for the pagination
//! patterns used by Pulumi Cloud endpoints. Each strategy extracts the next
//! page parameters from responses and tracks when pagination is complete.
//! [`PageSequence`] drives a strategy for one partition run.

mod sequence;
mod strategies;
mod types;

pub use sequence::PageSequence;
pub use strategies::{
    CursorPaginator, LinkHeaderPaginator, NoPaginator, OffsetPaginator, PageNumberPaginator,
};
pub use types::{
    NextPage, PageRequest, PageResponse, PaginationState, PaginationStrategy, Paginator,
};
