//! HTTP client module
//!
//! Provides the request executor used by every stream.
//!
//! # Features
//!
//! - **Automatic Retries**: 429 honours `Retry-After`; 5xx and connection
//!   failures back off exponentially with jitter
//! - **Rate Limiting**: governor token bucket plus `X-RateLimit-*` pauses
//! - **Caching**: optional response cache handle with expiry
//! - **Authentication**: Integration with auth module

mod cache;
mod client;
mod rate_limit;

pub use cache::{MemoryResponseCache, ResponseCache};
pub use client::{
    HttpClient, HttpClientConfig, HttpClientConfigBuilder, DEFAULT_BASE_URL, PULUMI_ACCEPT,
};
pub use rate_limit::{retry_after, RateLimitGate, RateLimiter, RateLimiterConfig};
