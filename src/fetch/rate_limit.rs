//! Per-domain minimum-interval throttle.
//!
//! Uses a keyed GCRA limiter from the governor crate with a burst of one, so
//! consecutive requests to the same domain are spaced at least
//! `min_interval` apart. The check-and-update is a single atomic operation
//! on the keyed state store, which keeps concurrent callers targeting the same
//! domain from both seeing a stale "last request" time and bursting it.
//!
//! A robots.txt `Crawl-delay` longer than `min_interval` adds a second,
//! per-domain limiter with that period (capped at [`MAX_CRAWL_DELAY`]).

use governor::{DefaultDirectRateLimiter, DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

/// Default spacing between requests to one domain.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(1);

/// Longest robots.txt crawl delay honored.
pub const MAX_CRAWL_DELAY: Duration = Duration::from_secs(60);

pub struct DomainRateLimiter {
    min_interval: Duration,
    /// `None` when throttling is disabled (zero interval).
    limiter: Option<DefaultKeyedRateLimiter<String>>,
    crawl_delays: Mutex<HashMap<String, Arc<DefaultDirectRateLimiter>>>,
}

impl DomainRateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            limiter: Quota::with_period(min_interval).map(RateLimiter::keyed),
            crawl_delays: Mutex::new(HashMap::new()),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Key requests by host plus explicit port.
    pub fn domain_key(url: &Url) -> String {
        let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
        match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host,
        }
    }

    /// Wait until a request to `url`'s domain is allowed, then claim the slot.
    pub async fn wait_before_request(&self, url: &Url) {
        let key = Self::domain_key(url);
        if let Some(limiter) = &self.limiter {
            trace!(domain = %key, "Waiting for rate limiter");
            limiter.until_key_ready(&key).await;
        }

        let delayed = self
            .crawl_delays
            .lock()
            .ok()
            .and_then(|delays| delays.get(&key).cloned());
        if let Some(delayed) = delayed {
            trace!(domain = %key, "Waiting for crawl delay");
            delayed.until_ready().await;
        }
    }

    /// Space requests to `url`'s domain at least `delay` apart from now on.
    ///
    /// Ignored when `delay` does not exceed `min_interval`. The first call for
    /// a domain wins.
    pub fn apply_crawl_delay(&self, url: &Url, delay: Duration) {
        let delay = delay.min(MAX_CRAWL_DELAY);
        if delay <= self.min_interval {
            return;
        }
        let Some(quota) = Quota::with_period(delay) else {
            return;
        };
        let Ok(mut delays) = self.crawl_delays.lock() else {
            return;
        };
        let key = Self::domain_key(url);
        delays.entry(key).or_insert_with_key(|key| {
            debug!(domain = %key, ?delay, "Honoring robots.txt crawl delay");
            let limiter = RateLimiter::direct(quota);
            // The request that just fetched robots.txt takes the first slot.
            let _ = limiter.check();
            Arc::new(limiter)
        });
    }
}

impl Default for DomainRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_INTERVAL)
    }
}

impl fmt::Debug for DomainRateLimiter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DomainRateLimiter")
            .field("min_interval", &self.min_interval)
            .field("enabled", &self.limiter.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn test_domain_key() {
        let a = Url::parse("https://News.Example.com/a").unwrap();
        let b = Url::parse("http://127.0.0.1:8080/b").unwrap();
        assert_eq!(DomainRateLimiter::domain_key(&a), "news.example.com");
        assert_eq!(DomainRateLimiter::domain_key(&b), "127.0.0.1:8080");
    }

    #[tokio::test]
    async fn test_same_domain_is_spaced() {
        let limiter = DomainRateLimiter::new(Duration::from_millis(200));
        let url = Url::parse("https://example.com/a").unwrap();

        let start = Instant::now();
        limiter.wait_before_request(&url).await;
        limiter.wait_before_request(&url).await;
        limiter.wait_before_request(&url).await;
        let elapsed = start.elapsed();

        // First is immediate, the next two wait one interval each.
        assert!(elapsed >= Duration::from_millis(350), "elapsed {elapsed:?}");
    }

    #[tokio::test]
    async fn test_different_domains_do_not_wait() {
        let limiter = DomainRateLimiter::new(Duration::from_secs(5));
        let start = Instant::now();
        for host in ["a.example", "b.example", "c.example"] {
            let url = Url::parse(&format!("https://{host}/x")).unwrap();
            limiter.wait_before_request(&url).await;
        }
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_concurrent_callers_do_not_burst() {
        let limiter = Arc::new(DomainRateLimiter::new(Duration::from_millis(150)));
        let url = Url::parse("https://example.com/a").unwrap();

        let start = Instant::now();
        let waits = (0..3).map(|_| {
            let limiter = Arc::clone(&limiter);
            let url = url.clone();
            async move { limiter.wait_before_request(&url).await }
        });
        futures::future::join_all(waits).await;

        assert!(start.elapsed() >= Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_crawl_delay_spaces_requests() {
        let limiter = DomainRateLimiter::new(Duration::ZERO);
        let slow = Url::parse("https://slow.example/a").unwrap();
        let fast = Url::parse("https://fast.example/a").unwrap();
        limiter.apply_crawl_delay(&slow, Duration::from_millis(150));

        let start = Instant::now();
        for _ in 0..3 {
            limiter.wait_before_request(&fast).await;
        }
        assert!(start.elapsed() < Duration::from_millis(100));

        let start = Instant::now();
        limiter.wait_before_request(&slow).await;
        limiter.wait_before_request(&slow).await;
        assert!(start.elapsed() >= Duration::from_millis(250), "elapsed {:?}", start.elapsed());
    }

    #[tokio::test]
    async fn test_crawl_delay_below_interval_is_ignored() {
        let limiter = DomainRateLimiter::new(Duration::from_millis(100));
        let url = Url::parse("https://example.com/a").unwrap();
        limiter.apply_crawl_delay(&url, Duration::from_millis(50));
        assert!(limiter.crawl_delays.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_zero_interval_disables_throttle() {
        let limiter = DomainRateLimiter::new(Duration::ZERO);
        let url = Url::parse("https://example.com/a").unwrap();
        let start = Instant::now();
        for _ in 0..10 {
            limiter.wait_before_request(&url).await;
        }
        assert!(start.elapsed() < Duration::from_millis(100));
        assert_eq!(limiter.min_interval(), Duration::ZERO);
    }
}
