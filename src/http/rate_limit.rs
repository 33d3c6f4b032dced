//! Rate limiting implementation
//!
//! Two layers: a governor token bucket that paces requests proactively, and
//! a pause gate set from the server's `X-RateLimit-*` headers once the
//! advertised budget is exhausted.

use chrono::{DateTime, Utc};
use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use reqwest::header::HeaderMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

/// Configuration for rate limiting
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Maximum number of requests per second
    pub requests_per_second: u32,
    /// Burst size (max tokens in bucket)
    pub burst_size: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 10,
            burst_size: 10,
        }
    }
}

impl RateLimiterConfig {
    /// Create a new rate limiter config
    pub fn new(requests_per_second: u32, burst_size: u32) -> Self {
        Self {
            requests_per_second,
            burst_size,
        }
    }
}

/// Token bucket rate limiter
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<Governor<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given config
    pub fn new(config: &RateLimiterConfig) -> Self {
        let quota = Quota::per_second(NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN))
            .allow_burst(NonZeroU32::new(config.burst_size).unwrap_or(NonZeroU32::MIN));

        Self {
            limiter: Arc::new(Governor::direct(quota)),
        }
    }

    /// Wait until a request can be made
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish()
    }
}

// ============================================================================
// Server-advertised limits
// ============================================================================

/// Reset values above this are absolute unix timestamps, below are deltas
const EPOCH_THRESHOLD: i64 = 1_000_000_000;

/// Longest pause honoured from a rate-limit header
pub(crate) const MAX_PAUSE: Duration = Duration::from_secs(15 * 60);

/// Suspends requests until the server's rate-limit window resets
#[derive(Debug, Default, Clone)]
pub struct RateLimitGate {
    resume_at: Arc<Mutex<Option<Instant>>>,
}

impl RateLimitGate {
    /// Create an open gate
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect response headers; close the gate when the budget is exhausted
    pub async fn observe(&self, headers: &HeaderMap) {
        let remaining = header_str(headers, "x-ratelimit-remaining").and_then(|v| v.parse::<i64>().ok());
        if remaining.is_none_or(|r| r > 0) {
            return;
        }

        let pause = header_str(headers, "x-ratelimit-reset")
            .and_then(parse_reset)
            .or_else(|| retry_after(headers))
            .unwrap_or(Duration::from_secs(1))
            .min(MAX_PAUSE);

        warn!(pause_ms = pause.as_millis() as u64, "Rate limit budget exhausted, pausing requests");
        *self.resume_at.lock().await = Some(Instant::now() + pause);
    }

    /// Wait for the gate to open
    pub async fn wait(&self) {
        let resume_at = *self.resume_at.lock().await;
        if let Some(at) = resume_at {
            if at > Instant::now() {
                debug!("Waiting for rate limit window to reset");
                tokio::time::sleep_until(at).await;
            }
            let mut guard = self.resume_at.lock().await;
            if guard.is_some_and(|t| t <= Instant::now()) {
                *guard = None;
            }
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

/// Parse an `X-RateLimit-Reset` value (unix seconds or delta seconds)
fn parse_reset(value: &str) -> Option<Duration> {
    let n = value.parse::<i64>().ok()?;
    if n >= EPOCH_THRESHOLD {
        let delta = n - Utc::now().timestamp();
        Some(Duration::from_secs(delta.max(0).unsigned_abs()))
    } else {
        Some(Duration::from_secs(n.max(0).unsigned_abs()))
    }
}

/// Parse a `Retry-After` header: delay seconds or an HTTP date
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = header_str(headers, "retry-after")?;
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?;
    let delta = at.with_timezone(&Utc) - Utc::now();
    Some(delta.to_std().unwrap_or(Duration::ZERO))
}
