//! Network layer: the injectable fetcher the probes run against, plus the
//! repository API client with its scoped, expiring token cache.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// One outbound request. Probes build these; the fetcher owns transport
/// concerns (timeouts, TLS, connection reuse).
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub body: String,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Rate-limit rejections from the commit/PR API arrive as 403 or 429.
    pub fn is_rate_limited(&self) -> bool {
        self.status == 403 || self.status == 429
    }

    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }
}

/// Transport-level failures. All variants are transient: the cursor is left
/// untouched and the unit is retried on the next scheduled cycle.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,

    #[error("network error: {0}")]
    Network(String),
}

/// GET-only fetch abstraction so probes can be driven by scripted responses
/// in tests. Non-2xx statuses are returned as responses, not errors; the
/// probes decide what each status means for their cursor.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn get(&self, request: FetchRequest) -> Result<FetchResponse, FetchError>;
}

/// Production fetcher over a shared reqwest client.
pub struct HttpFetcher {
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            timeout,
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn get(&self, request: FetchRequest) -> Result<FetchResponse, FetchError> {
        let mut builder = self.client.get(&request.url).timeout(self.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout
            } else {
                FetchError::Network(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(FetchResponse { status, body })
    }
}

const USER_AGENT: &str = "locwatch/0.1";

struct CachedToken {
    token: String,
    expires_at: Option<DateTime<Utc>>,
}

/// Repository API client. Owns its access-token cache with an expiry check;
/// one instance is created by the coordinator and shared with the probes,
/// never a process-wide singleton.
pub struct GithubClient {
    token_cache: Mutex<Option<CachedToken>>,
}

impl GithubClient {
    pub fn new() -> Self {
        Self {
            token_cache: Mutex::new(None),
        }
    }

    /// Seed the cache with a token and optional expiry.
    pub fn with_token(token: impl Into<String>, expires_at: Option<DateTime<Utc>>) -> Self {
        Self {
            token_cache: Mutex::new(Some(CachedToken {
                token: token.into(),
                expires_at,
            })),
        }
    }

    fn token(&self) -> Option<String> {
        let mut cache = self.token_cache.lock();
        if let Some(cached) = cache.as_ref() {
            let expired = cached
                .expires_at
                .map(|at| at <= Utc::now())
                .unwrap_or(false);
            if !expired {
                return Some(cached.token.clone());
            }
            *cache = None;
        }

        // Fall back to the environment; re-read after expiry so rotated
        // tokens are picked up without a restart.
        let token = std::env::var("GITHUB_TOKEN").ok()?;
        *cache = Some(CachedToken {
            token: token.clone(),
            expires_at: None,
        });
        Some(token)
    }

    /// Build an API request with the standard headers and, when available,
    /// an authorization token.
    pub fn request(&self, url: impl Into<String>) -> FetchRequest {
        let mut request = FetchRequest::new(url)
            .header("Accept", "application/vnd.github.v3+json")
            .header("User-Agent", USER_AGENT);
        if let Some(token) = self.token() {
            request = request.header("Authorization", format!("token {token}"));
        }
        request
    }
}

impl Default for GithubClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Browser-ish request for public pages (docs, store listings).
pub fn page_request(url: impl Into<String>) -> FetchRequest {
    FetchRequest::new(url).header("User-Agent", "Mozilla/5.0 (compatible; locwatch/0.1)")
}
