//! Cache-first, politeness-gated text fetching.

use super::cache::ResponseCache;
use super::rate_limit::DomainRateLimiter;
use super::robots::RobotsGate;
use crate::error::{ConfigError, FetchFailure, RequestFailure};
use reqwest::header::{ACCEPT_LANGUAGE, HeaderMap, HeaderValue};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, instrument, warn};
use url::Url;

/// Identifies the crawler to publishers.
pub const DEFAULT_USER_AGENT: &str = "NewsTrendBot/1.1 (+educational-project; respectful scraping)";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(25);

/// Build the shared HTTP client: identifying user agent, bounded timeout.
pub fn build_http_client(user_agent: &str, timeout: Duration) -> Result<reqwest::Client, ConfigError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-GB,en;q=0.8"));
    let client = reqwest::Client::builder()
        .user_agent(user_agent)
        .default_headers(headers)
        .timeout(timeout)
        .build()?;
    Ok(client)
}

/// Fetches page and feed bodies.
///
/// Order of operations for every URL:
/// 1. on-disk cache (a hit returns without touching the network)
/// 2. robots.txt gate (a disallow returns [`FetchFailure::RobotsDisallowed`])
/// 3. per-domain rate limiter
/// 4. HTTP GET; status >= 400 or a transport error is
///    [`FetchFailure::RequestFailed`]
///
/// Every failure is returned as a value; nothing here panics or aborts the run.
#[derive(Debug, Clone)]
pub struct FetchClient {
    http: reqwest::Client,
    robots: Arc<RobotsGate>,
    limiter: Arc<DomainRateLimiter>,
    cache: Option<ResponseCache>,
}

impl FetchClient {
    pub fn new(
        http: reqwest::Client,
        robots: Arc<RobotsGate>,
        limiter: Arc<DomainRateLimiter>,
        cache: Option<ResponseCache>,
    ) -> Self {
        Self {
            http,
            robots,
            limiter,
            cache,
        }
    }

    pub fn cache(&self) -> Option<&ResponseCache> {
        self.cache.as_ref()
    }

    #[instrument(level = "info", skip(self), fields(cached = tracing::field::Empty))]
    pub async fn fetch_text(&self, url: &str) -> Result<String, FetchFailure> {
        if let Some(cache) = &self.cache {
            if let Some(body) = cache.read(url).await {
                tracing::Span::current().record("cached", true);
                debug!(bytes = body.len(), "Cache hit");
                return Ok(body);
            }
        }

        let parsed = Url::parse(url).map_err(|e| FetchFailure::RequestFailed {
            url: url.to_string(),
            reason: RequestFailure::InvalidUrl(e.to_string()),
        })?;

        if !self.robots.can_fetch(&parsed).await {
            return Err(FetchFailure::RobotsDisallowed {
                url: url.to_string(),
            });
        }

        self.limiter.wait_before_request(&parsed).await;

        let t0 = Instant::now();
        let response = match self.http.get(parsed).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Request failed");
                return Err(FetchFailure::RequestFailed {
                    url: url.to_string(),
                    reason: RequestFailure::Transport(e.to_string()),
                });
            }
        };

        let status = response.status();
        if status.as_u16() >= 400 {
            warn!(%status, "HTTP error status");
            return Err(FetchFailure::RequestFailed {
                url: url.to_string(),
                reason: RequestFailure::Status(status.as_u16()),
            });
        }

        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => {
                warn!(error = %e, "Failed reading response body");
                return Err(FetchFailure::RequestFailed {
                    url: url.to_string(),
                    reason: RequestFailure::Transport(e.to_string()),
                });
            }
        };
        debug!(
            bytes = body.len(),
            elapsed_ms = t0.elapsed().as_millis() as u64,
            "Fetched"
        );

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.write(url, &body).await {
                warn!(error = %e, "Failed to write cache entry");
            }
        }
        Ok(body)
    }
}
