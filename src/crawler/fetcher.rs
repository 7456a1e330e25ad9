//! Rate-limited HTTP client for the upstream public API
//!
//! All upstream calls go through [`PublicApiClient`], which provides:
//! - Rate limiting with governor
//! - JSON decoding with error classification
//! - An overridable base URL so tests can point it at a mock server
//!
//! Requests are never retried here. A failed fetch aborts the current
//! profile and the entry is picked up again on the next scheduled run.

use crate::config::UpstreamConfig;
use crate::utils::error::FetchError;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT},
    Client,
};
use serde::de::DeserializeOwned;
use std::num::NonZeroU32;
use std::time::Duration;

/// HTTP client for the upstream profile and workbook endpoints
pub struct PublicApiClient {
    /// HTTP client with configured timeout and compression
    client: Client,

    /// Rate limiter to control request frequency
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,

    /// Root URL every request path is appended to
    base_url: String,
}

impl PublicApiClient {
    /// Create a client from the upstream section of the configuration
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, FetchError> {
        Self::with_config(
            &config.base_url,
            config.requests_per_second,
            Duration::from_secs(config.request_timeout_secs),
            &config.user_agent,
        )
    }

    /// Create a client against a specific base URL
    ///
    /// # Arguments
    ///
    /// * `base_url` - Root URL (a mock server URI in tests)
    /// * `requests_per_second` - Maximum number of requests per second
    /// * `timeout` - Request timeout duration
    /// * `user_agent` - User-Agent header value
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn with_config(
        base_url: &str,
        requests_per_second: u32,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, FetchError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(timeout)
            .gzip(true)
            .user_agent(user_agent.to_string())
            .default_headers(headers)
            .build()?;

        let rate = NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN);
        let rate_limiter = RateLimiter::direct(Quota::per_second(rate));

        Ok(Self {
            client,
            rate_limiter,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create a client with default limits against a base URL
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Http` if the HTTP client cannot be created
    pub fn with_base_url(base_url: &str) -> Result<Self, FetchError> {
        Self::with_config(
            base_url,
            10,
            Duration::from_secs(30),
            concat!("statsync/", env!("CARGO_PKG_VERSION")),
        )
    }

    /// Root URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET a path and decode the JSON body
    ///
    /// # Arguments
    ///
    /// * `path` - Path below the base URL, starting with `/`
    /// * `query` - Query string pairs
    ///
    /// # Errors
    ///
    /// Returns `FetchError::Status` on a non-success status,
    /// `FetchError::Timeout` on timeouts and `FetchError::Decode` when the
    /// body is not the expected JSON
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, FetchError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.base_url, path);
        tracing::trace!(url = %url, ?query, "Fetching upstream URL");

        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(Self::classify)?;

        let status = response.status();
        if !status.is_success() {
            tracing::debug!(url = %url, status = status.as_u16(), "Upstream returned error status");
            return Err(FetchError::Status(status.as_u16()));
        }

        let bytes = response.bytes().await.map_err(Self::classify)?;
        serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))
    }

    fn classify(err: reqwest::Error) -> FetchError {
        if err.is_timeout() {
            FetchError::Timeout
        } else {
            FetchError::Http(err)
        }
    }
}
