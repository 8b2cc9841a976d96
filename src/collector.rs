//! Per-source strategy sequencing, capping and the cross-source merge.
//!
//! For every source the [`Collector`]:
//! 1. runs the primary strategy with the full per-source cap
//! 2. runs the secondary strategy only when the primary came up short, limited
//!    to the remaining room
//! 3. dedupes the pooled articles (primary results first) and truncates to
//!    the cap
//!
//! Sources are then merged in configuration order; an article already kept
//! for an earlier source is removed from later ones and charged to the later
//! source's `deduped` counter.

use crate::config::CollectorConfig;
use crate::dates::{DateNormalizer, DateWindow};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::error::ConfigError;
use crate::extract::MetadataExtractor;
use crate::fetch::{DomainRateLimiter, FetchClient, ResponseCache, RobotsGate, build_http_client};
use crate::models::{Article, Source, Strategy};
use crate::scrapers::feed::ingest_feeds;
use crate::scrapers::listing::ingest_listing;
use crate::scrapers::{IngestContext, SourceRun};
use crate::urls::Deduper;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// What one source produced.
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub name: String,
    pub articles: Vec<Article>,
    pub diagnostics: Diagnostics,
}

/// Result of one collection run.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionReport {
    pub window: DateWindow,
    /// Per-source results, in configuration order.
    pub sources: Vec<SourceReport>,
    /// Every kept article across sources, newest first, undated last.
    pub merged: Vec<Article>,
}

impl CollectionReport {
    pub fn total_articles(&self) -> usize {
        self.merged.len()
    }

    /// Why the run produced nothing, or `None` when it produced something.
    pub fn explain_empty(&self) -> Option<String> {
        if !self.merged.is_empty() {
            return None;
        }
        if self.sources.is_empty() {
            return Some("No articles collected: no sources configured".to_string());
        }
        let per_source = self
            .sources
            .iter()
            .map(|s| format!("{}: {}", s.name, s.diagnostics.explain()))
            .join(" | ");
        Some(format!(
            "No articles collected between {} and {}. {}",
            self.window.start.to_rfc3339(),
            self.window.end.to_rfc3339(),
            per_source
        ))
    }
}

/// Runs the configured sources through their discovery strategies.
#[derive(Debug)]
pub struct Collector {
    fetcher: FetchClient,
    extractor: MetadataExtractor,
    dates: DateNormalizer,
    window: DateWindow,
    max_articles_per_source: usize,
    enrich_feed_entries: bool,
    source_concurrency: usize,
}

impl Collector {
    pub fn new(
        fetcher: FetchClient,
        dates: DateNormalizer,
        window: DateWindow,
        max_articles_per_source: usize,
    ) -> Self {
        Self {
            fetcher,
            extractor: MetadataExtractor::new(dates),
            dates,
            window,
            max_articles_per_source,
            enrich_feed_entries: true,
            source_concurrency: 1,
        }
    }

    pub fn with_feed_enrichment(mut self, enabled: bool) -> Self {
        self.enrich_feed_entries = enabled;
        self
    }

    /// Process up to `n` sources at once; output order is unaffected.
    pub fn with_source_concurrency(mut self, n: usize) -> Self {
        self.source_concurrency = n.max(1);
        self
    }

    /// Wire the HTTP client, politeness collaborators and cache from config.
    pub fn from_config(cfg: &CollectorConfig, now: DateTime<Utc>) -> Result<Self, ConfigError> {
        let tz = cfg.timezone()?;
        let http = build_http_client(&cfg.user_agent, cfg.request_timeout())?;
        let limiter = Arc::new(DomainRateLimiter::new(cfg.min_request_interval()));
        let robots = Arc::new(RobotsGate::new(
            http.clone(),
            cfg.user_agent.clone(),
            Arc::clone(&limiter),
        ));
        let cache = cfg.use_cache.then(|| ResponseCache::new(&cfg.cache_dir));
        let fetcher = FetchClient::new(http, robots, limiter, cache);

        let window = cfg.window(now.with_timezone(&tz));
        Ok(Self::new(
            fetcher,
            DateNormalizer::new(tz),
            window,
            cfg.max_articles_per_source,
        )
        .with_feed_enrichment(cfg.enrich_feed_entries)
        .with_source_concurrency(cfg.source_concurrency))
    }

    pub fn window(&self) -> &DateWindow {
        &self.window
    }

    fn ctx(&self) -> IngestContext<'_> {
        IngestContext {
            fetcher: &self.fetcher,
            extractor: &self.extractor,
            dates: &self.dates,
            window: &self.window,
            enrich_feed_entries: self.enrich_feed_entries,
        }
    }

    async fn run_strategy(&self, strategy: Strategy, run: &mut SourceRun<'_>, limit: usize) -> Vec<Article> {
        let ctx = self.ctx();
        match strategy {
            Strategy::Feed => ingest_feeds(&ctx, run, limit).await,
            Strategy::Listing => ingest_listing(&ctx, run, limit).await,
        }
    }

    /// Collect one source: primary strategy, fallback if short, dedupe, cap.
    #[instrument(level = "info", skip_all, fields(source = %source.name, strategy = ?source.strategy))]
    pub async fn collect_source(&self, source: &Source) -> SourceReport {
        let cap = self.max_articles_per_source;
        let mut run = SourceRun::new(source);
        let (primary, secondary) = source.strategy.sequence();

        let mut pooled = self.run_strategy(primary, &mut run, cap).await;
        if pooled.len() < cap {
            let room = cap - pooled.len();
            info!(have = pooled.len(), room, fallback = ?secondary, "Primary strategy short; trying fallback");
            pooled.extend(self.run_strategy(secondary, &mut run, room).await);
        }

        let (mut articles, duplicates) = Deduper::new().retain_first(pooled, |a| a.url.as_str());
        run.diagnostics
            .record_n(DiagnosticKind::Deduped, duplicates as u32);
        articles.truncate(cap);

        SourceReport {
            name: source.name.clone(),
            articles,
            diagnostics: run.diagnostics,
        }
    }

    /// Collect every source and merge the results.
    ///
    /// Never fails: every per-URL problem is recorded in the owning source's
    /// diagnostics.
    #[instrument(level = "info", skip_all, fields(sources = sources.len()))]
    pub async fn collect(&self, sources: &[Source]) -> CollectionReport {
        info!(
            start = %self.window.start.to_rfc3339(),
            end = %self.window.end.to_rfc3339(),
            "Collecting"
        );

        let mut reports: Vec<SourceReport> = stream::iter(sources)
            .map(|source| self.collect_source(source))
            .buffered(self.source_concurrency)
            .collect()
            .await;

        let mut seen = Deduper::new();
        for report in &mut reports {
            let (kept, duplicates) =
                seen.retain_first(std::mem::take(&mut report.articles), |a| a.url.as_str());
            report.articles = kept;
            report
                .diagnostics
                .record_n(DiagnosticKind::Deduped, duplicates as u32);
            report.diagnostics.articles_kept = report.articles.len() as u32;

            info!(
                source = %report.name,
                kept = report.articles.len(),
                diagnostics = ?report.diagnostics,
                "Source finished"
            );
            if report.articles.is_empty() {
                warn!(source = %report.name, explanation = %report.diagnostics.explain(), "Source produced no articles");
            }
        }

        let mut merged: Vec<Article> = reports
            .iter()
            .flat_map(|r| r.articles.iter().cloned())
            .collect();
        // Descending; `None` sorts below every date, so undated land last.
        merged.sort_by(|a, b| b.published.cmp(&a.published));

        let report = CollectionReport {
            window: self.window,
            sources: reports,
            merged,
        };
        if let Some(explanation) = report.explain_empty() {
            warn!(%explanation, "Empty collection");
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::DEFAULT_USER_AGENT;
    use crate::models::StrategyOrder;
    use chrono::TimeZone;
    use chrono_tz::Europe::London;
    use regex::Regex;
    use std::time::Duration;
    use url::Url;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn collector(cap: usize) -> Collector {
        let http = build_http_client(DEFAULT_USER_AGENT, Duration::from_secs(5)).unwrap();
        let limiter = Arc::new(DomainRateLimiter::new(Duration::ZERO));
        let robots = Arc::new(RobotsGate::new(
            http.clone(),
            DEFAULT_USER_AGENT,
            Arc::clone(&limiter),
        ));
        let window = DateWindow::new(
            London.with_ymd_and_hms(2024, 10, 1, 0, 0, 0).unwrap(),
            London.with_ymd_and_hms(2024, 10, 7, 23, 59, 59).unwrap(),
        );
        Collector::new(
            FetchClient::new(http, robots, limiter, None),
            DateNormalizer::new(London),
            window,
            cap,
        )
    }

    fn source(name: &str, base: &str, strategy: StrategyOrder, listing: &str, feeds: &[&str]) -> Source {
        Source {
            name: name.to_string(),
            strategy,
            listing_url: Url::parse(&format!("{base}{listing}")).unwrap(),
            feed_urls: feeds
                .iter()
                .map(|p| Url::parse(&format!("{base}{p}")).unwrap())
                .collect(),
            link_pattern: Some(Regex::new("/story/").unwrap()),
            discover_feeds: false,
        }
    }

    fn page(title: &str, date: &str) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_string(format!(
            r#"<html><head><meta property="og:title" content="{title}">
            <meta property="article:published_time" content="{date}"></head>
            <body><p>{title} body.</p></body></html>"#
        ))
    }

    async fn mount(server: &MockServer, route: &str, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(response)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_fallback_fills_remaining_room_and_dedupes() {
        let server = MockServer::start().await;
        let uri = server.uri();
        let feed = format!(
            "<rss><channel><item><title>One</title><link>{uri}/story/1</link></item></channel></rss>"
        );
        mount(&server, "/feed", ResponseTemplate::new(200).set_body_string(feed)).await;
        mount(
            &server,
            "/a",
            ResponseTemplate::new(200).set_body_string(
                r#"<a href="/story/1">dup</a><a href="/story/2">two</a><a href="/story/3">three</a>"#,
            ),
        )
        .await;
        mount(&server, "/story/1", page("One", "2024-10-02T10:00:00Z")).await;
        mount(&server, "/story/2", page("Two", "2024-10-03T10:00:00Z")).await;
        Mock::given(method("GET"))
            .and(path("/story/3"))
            .respond_with(page("Three", "2024-10-04T10:00:00Z"))
            .expect(0)
            .mount(&server)
            .await;

        let src = source("A", &uri, StrategyOrder::FeedFirst, "/a", &["/feed"]);
        let report = collector(2).collect(&[src]).await;

        let titles: Vec<&str> = report.sources[0].articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["One", "Two"]);
        let d = &report.sources[0].diagnostics;
        assert_eq!(d.deduped, 1);
        assert_eq!(d.articles_kept, 2);
        // Merged output is newest first.
        assert_eq!(report.merged[0].title, "Two");
        assert_eq!(report.explain_empty(), None);
    }

    #[tokio::test]
    async fn test_cross_source_duplicate_charged_to_later_source() {
        let server = MockServer::start().await;
        let uri = server.uri();
        mount(
            &server,
            "/a",
            ResponseTemplate::new(200).set_body_string(r#"<a href="/story/shared">S</a>"#),
        )
        .await;
        mount(
            &server,
            "/b",
            ResponseTemplate::new(200).set_body_string(
                r#"<a href="/story/shared?ref=b">S</a><a href="/story/own">O</a>"#,
            ),
        )
        .await;
        mount(&server, "/story/shared", page("Shared first", "2024-10-02T10:00:00Z")).await;
        mount(&server, "/story/own", page("Own", "2024-10-05T10:00:00Z")).await;

        let sources = vec![
            source("A", &uri, StrategyOrder::ListingFirst, "/a", &[]),
            source("B", &uri, StrategyOrder::ListingFirst, "/b", &[]),
        ];
        let report = collector(10).with_source_concurrency(2).collect(&sources).await;

        assert_eq!(report.sources[0].name, "A");
        assert_eq!(report.sources[0].articles.len(), 1);
        assert_eq!(report.sources[0].articles[0].title, "Shared first");
        assert_eq!(report.sources[1].articles.len(), 1);
        assert_eq!(report.sources[1].articles[0].title, "Own");
        assert_eq!(report.sources[1].diagnostics.deduped, 1);
        assert_eq!(report.sources[0].diagnostics.deduped, 0);
        assert_eq!(report.total_articles(), 2);
    }

    #[tokio::test]
    async fn test_empty_run_is_explained() {
        let server = MockServer::start().await;
        let uri = server.uri();
        mount(&server, "/a", ResponseTemplate::new(500)).await;
        mount(&server, "/feed", ResponseTemplate::new(404)).await;

        let src = source("A", &uri, StrategyOrder::ListingFirst, "/a", &["/feed"]);
        let report = collector(5).collect(&[src]).await;

        assert!(report.merged.is_empty());
        assert_eq!(report.sources[0].diagnostics.request_failed, 2);
        let explanation = report.explain_empty().unwrap();
        assert!(explanation.starts_with("No articles collected"));
        assert!(explanation.contains("A: 0 article(s) kept; 2 request(s) failed"));
    }

    #[tokio::test]
    async fn test_feed_fallback_reuses_listing_page() {
        let server = MockServer::start().await;
        let uri = server.uri();
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<head><link rel="alternate" type="application/rss+xml" href="/feed"></head>
                <body><a href="/shop">Shop</a></body>"#,
            ))
            .expect(1)
            .mount(&server)
            .await;
        let feed = format!(
            "<rss><channel><item><title>Via feed</title><link>{uri}/story/1</link></item></channel></rss>"
        );
        mount(&server, "/feed", ResponseTemplate::new(200).set_body_string(feed)).await;
        mount(&server, "/story/1", page("Via feed", "2024-10-02T10:00:00Z")).await;

        let mut src = source("A", &uri, StrategyOrder::ListingFirst, "/a", &[]);
        src.discover_feeds = true;
        let report = collector(5).collect(&[src]).await;

        assert_eq!(report.total_articles(), 1);
        assert_eq!(report.merged[0].title, "Via feed");
        assert_eq!(report.sources[0].diagnostics.listing_structure_changed, 1);
    }

    #[tokio::test]
    async fn test_zero_cap_fetches_nothing() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let src = source("A", &server.uri(), StrategyOrder::FeedFirst, "/a", &["/feed"]);
        let report = collector(0).collect(&[src]).await;
        assert!(report.merged.is_empty());
    }

    #[test]
    fn test_no_sources_explanation() {
        let report = CollectionReport {
            window: collector(1).window,
            sources: Vec::new(),
            merged: Vec::new(),
        };
        assert_eq!(
            report.explain_empty().as_deref(),
            Some("No articles collected: no sources configured")
        );
    }
}
