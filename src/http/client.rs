//! HTTP request executor
//!
//! Turns a [`PageRequest`] into a [`PageResponse`], handling:
//! - authentication on every request
//! - an optional response cache consulted before the network
//! - proactive pacing and server-advertised rate limits
//! - retries with exponential backoff and jitter
//! - error classification (client, rate limit, transient server)

use super::cache::ResponseCache;
use super::rate_limit::{retry_after, RateLimitGate, RateLimiter, RateLimiterConfig, MAX_PAUSE};
use crate::auth::{AuthConfig, Authenticator};
use crate::decode::{JsonDecoder, RecordDecoder};
use crate::error::{Error, Result};
use crate::pagination::{PageRequest, PageResponse};
use crate::types::{Method, StringMap};
use backoff::backoff::Backoff;
use backoff::exponential::ExponentialBackoff;
use backoff::SystemClock;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Pulumi Cloud API base URL
pub const DEFAULT_BASE_URL: &str = "https://api.pulumi.com";

/// Media type requested from Pulumi Cloud
pub const PULUMI_ACCEPT: &str = "application/vnd.pulumi+8";

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL for relative request paths
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,
    /// Initial delay for backoff
    pub initial_backoff: Duration,
    /// Maximum delay for backoff
    pub max_backoff: Duration,
    /// Longest `Retry-After` honoured on a 429
    pub max_retry_after: Duration,
    /// Rate limiter configuration
    pub rate_limit: Option<RateLimiterConfig>,
    /// Default headers for all requests
    pub default_headers: StringMap,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        let mut default_headers = StringMap::new();
        default_headers.insert("Accept".to_string(), PULUMI_ACCEPT.to_string());

        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            max_retries: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(60),
            max_retry_after: MAX_PAUSE,
            rate_limit: Some(RateLimiterConfig::default()),
            default_headers,
            user_agent: format!("tap-pulumi-cloud/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into();
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set max retries
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set backoff bounds
    pub fn backoff(mut self, initial: Duration, max: Duration) -> Self {
        self.config.initial_backoff = initial;
        self.config.max_backoff = max;
        self
    }

    /// Cap the wait advised by a 429's `Retry-After`
    pub fn max_retry_after(mut self, max: Duration) -> Self {
        self.config.max_retry_after = max;
        self
    }

    /// Set rate limiter
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Disable rate limiting
    pub fn no_rate_limit(mut self) -> Self {
        self.config.rate_limit = None;
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// HTTP request executor with retry, rate limiting and caching
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    authenticator: Authenticator,
    rate_limiter: Option<RateLimiter>,
    gate: RateLimitGate,
    cache: Option<Arc<dyn ResponseCache>>,
    decoder: JsonDecoder,
}

impl HttpClient {
    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);

        Ok(Self {
            client,
            config,
            authenticator: Authenticator::default(),
            rate_limiter,
            gate: RateLimitGate::new(),
            cache: None,
            decoder: JsonDecoder::new(),
        })
    }

    /// Create a client with authentication
    pub fn with_auth(config: HttpClientConfig, auth_config: AuthConfig) -> Result<Self> {
        let mut client = Self::with_config(config)?;
        client.authenticator = Authenticator::new(auth_config);
        Ok(client)
    }

    /// Attach a response cache
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<dyn ResponseCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Execute one page request.
    ///
    /// Rate limiting and transient failures are handled here; callers only
    /// see a response or a classified error.
    pub async fn execute(&self, request: &PageRequest) -> Result<PageResponse> {
        let full_url = self.build_url(&request.url);

        let cache_key = match (&self.cache, request.method) {
            (Some(_), Method::GET) => Some(request.cache_key(&full_url)),
            _ => None,
        };
        if let (Some(cache), Some(key)) = (&self.cache, &cache_key) {
            if let Some(hit) = cache.get(key) {
                debug!(url = %full_url, "Response cache hit");
                return Ok(hit);
            }
        }

        let max_retries = self.config.max_retries;
        let mut backoff = self.create_backoff();
        let mut attempt: u32 = 0;

        loop {
            if let Some(ref limiter) = self.rate_limiter {
                limiter.wait().await;
            }
            self.gate.wait().await;

            let mut req = self
                .client
                .request(request.method.into(), &full_url)
                .timeout(self.config.timeout);
            for (key, value) in self.config.default_headers.iter().chain(&request.headers) {
                req = req.header(key.as_str(), value.as_str());
            }
            if !request.query.is_empty() {
                req = req.query(&request.query);
            }
            req = self.authenticator.apply(req);

            debug!(method = %request.method, url = %full_url, attempt, "Sending request");

            let response = match req.send().await.map_err(Error::from) {
                Ok(response) => response,
                Err(e) if e.is_retryable() => {
                    let delay = self.transient_delay(attempt, &mut backoff, &e)?;
                    warn!(
                        attempt = attempt + 1,
                        max_attempts = max_retries + 1,
                        retry_after_ms = delay.as_millis() as u64,
                        error = %e,
                        "Connection failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let status = response.status().as_u16();
            let headers = response.headers().clone();
            self.gate.observe(&headers).await;

            if status == 429 {
                let advised = retry_after(&headers);
                if attempt >= max_retries {
                    return Err(Error::RateLimitExceeded {
                        attempts: attempt + 1,
                        retry_after_seconds: advised.map_or(0, |d| d.as_secs()),
                    });
                }
                let delay = advised
                    .map(|d| d.min(self.config.max_retry_after))
                    .unwrap_or_else(|| self.next_delay(&mut backoff));
                warn!(
                    attempt = attempt + 1,
                    max_attempts = max_retries + 1,
                    retry_after_ms = delay.as_millis() as u64,
                    "Rate limited (429), waiting"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            if (500..600).contains(&status) {
                if attempt >= max_retries {
                    let body = response.text().await.unwrap_or_default();
                    return Err(Error::TransientServer {
                        attempts: attempt + 1,
                        message: format!("HTTP {status}: {body}"),
                    });
                }
                let delay = self.next_delay(&mut backoff);
                warn!(
                    status,
                    attempt = attempt + 1,
                    max_attempts = max_retries + 1,
                    retry_after_ms = delay.as_millis() as u64,
                    "Server error, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            // A connection dropped mid-body is retried like a failed send.
            let text = match response.text().await {
                Ok(text) => text,
                Err(e) => {
                    let e = Error::from(e);
                    let delay = self.transient_delay(attempt, &mut backoff, &e)?;
                    warn!(
                        status,
                        attempt = attempt + 1,
                        max_attempts = max_retries + 1,
                        retry_after_ms = delay.as_millis() as u64,
                        error = %e,
                        "Reading response body failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
            };

            if (400..500).contains(&status) {
                return Err(Error::client_request(status, text));
            }

            let body = self.decoder.decode_raw(&text)?;
            let page = PageResponse::new(status, headers, body);

            if let (Some(cache), Some(key)) = (&self.cache, cache_key) {
                cache.put(key, &page);
            }

            debug!(status, url = %full_url, "Request succeeded");
            return Ok(page);
        }
    }

    /// Check if rate limiting is enabled
    pub fn has_rate_limiter(&self) -> bool {
        self.rate_limiter.is_some()
    }

    /// Build full URL from path
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        let base = self.config.base_url.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    fn create_backoff(&self) -> ExponentialBackoff<SystemClock> {
        ExponentialBackoff {
            current_interval: self.config.initial_backoff,
            initial_interval: self.config.initial_backoff,
            randomization_factor: 0.5,
            multiplier: 2.0,
            max_interval: self.config.max_backoff,
            // Attempts are bounded by max_retries instead.
            max_elapsed_time: None,
            ..ExponentialBackoff::default()
        }
    }

    fn next_delay(&self, backoff: &mut ExponentialBackoff<SystemClock>) -> Duration {
        backoff.next_backoff().unwrap_or(self.config.max_backoff)
    }

    /// Delay before retrying a connection-level failure, or the final
    /// error once the retry budget is spent
    fn transient_delay(
        &self,
        attempt: u32,
        backoff: &mut ExponentialBackoff<SystemClock>,
        error: &Error,
    ) -> Result<Duration> {
        if attempt >= self.config.max_retries {
            return Err(Error::TransientServer {
                attempts: attempt + 1,
                message: error.to_string(),
            });
        }
        Ok(self.next_delay(backoff))
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("auth", self.authenticator.config())
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .field("has_cache", &self.cache.is_some())
            .finish_non_exhaustive()
    }
}
