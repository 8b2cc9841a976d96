//! End-to-end collection against local HTTP fixtures.

use chrono::{TimeZone, Utc};
use chrono_tz::Europe::London;
use news_ingest::collector::Collector;
use news_ingest::config::{CollectorConfig, SourceConfig};
use news_ingest::dates::{DateNormalizer, DateWindow};
use news_ingest::fetch::{DEFAULT_USER_AGENT, DomainRateLimiter, FetchClient, ResponseCache, RobotsGate, build_http_client};
use news_ingest::models::{Source, StrategyOrder};
use regex::Regex;
use std::sync::Arc;
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn window() -> DateWindow {
    DateWindow::new(
        London.with_ymd_and_hms(2024, 10, 1, 0, 0, 0).unwrap(),
        London.with_ymd_and_hms(2024, 10, 7, 23, 59, 59).unwrap(),
    )
}

fn collector(cache: Option<ResponseCache>, cap: usize) -> Collector {
    let http = build_http_client(DEFAULT_USER_AGENT, Duration::from_secs(5)).unwrap();
    let limiter = Arc::new(DomainRateLimiter::new(Duration::ZERO));
    let robots = Arc::new(RobotsGate::new(
        http.clone(),
        DEFAULT_USER_AGENT,
        Arc::clone(&limiter),
    ));
    Collector::new(
        FetchClient::new(http, robots, limiter, cache),
        DateNormalizer::new(London),
        window(),
        cap,
    )
}

fn article_page(title: &str, published: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_string(format!(
        r#"<!doctype html><html><head>
        <title>{title} | Trade Paper</title>
        <meta property="og:title" content="{title}">
        <meta property="og:description" content="{title}: the details.">
        <meta property="article:published_time" content="{published}">
        </head><body><article><p>{title} full story.</p></article></body></html>"#
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
async fn listing_keeps_only_same_origin_filtered_links() {
    let server = MockServer::start().await;
    let listing = r#"<html><body>
        <ul class="headlines">
          <li><a href="/news/label-deal">Label deal</a></li>
          <li><a href="/news/tour-announced">Tour announced</a></li>
          <li><a href="https://elsewhere.example.org/news/syndicated">Syndicated</a></li>
        </ul>
    </body></html>"#;
    mount(&server, "/news", ResponseTemplate::new(200).set_body_string(listing)).await;
    mount(&server, "/news/label-deal", article_page("Label deal", "2024-10-02T09:00:00+01:00")).await;
    mount(&server, "/news/tour-announced", article_page("Tour announced", "2024-10-04T15:30:00Z")).await;

    let source = Source {
        name: "Trade Paper".to_string(),
        strategy: StrategyOrder::ListingFirst,
        listing_url: Url::parse(&format!("{}/news", server.uri())).unwrap(),
        feed_urls: Vec::new(),
        link_pattern: Some(Regex::new("/news/").unwrap()),
        discover_feeds: false,
    };

    let report = collector(None, 80).collect(&[source]).await;
    let trade = &report.sources[0];

    assert_eq!(trade.articles.len(), 2);
    assert_eq!(trade.diagnostics.urls_discovered, 2);
    assert_eq!(trade.diagnostics.articles_kept, 2);
    assert!(trade.articles.iter().all(|a| a.url.starts_with(&server.uri())));
    assert_eq!(report.merged[0].title, "Tour announced");
    assert_eq!(report.merged[1].excerpt, "Label deal: the details.");
    assert_eq!(report.merged[1].text.as_deref(), Some("Label deal full story."));
}

#[tokio::test]
async fn feed_drops_entry_dated_before_window() {
    let server = MockServer::start().await;
    let uri = server.uri();
    let feed = format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Trade Paper</title>
    <item>
      <title>Last month&rsquo;s chart</title>
      <link>{uri}/news/old-chart</link>
      <pubDate>Sun, 15 Sep 2024 08:00:00 +0000</pubDate>
    </item>
    <item>
      <title>This week&rsquo;s chart</title>
      <link>{uri}/news/new-chart</link>
      <pubDate>Thu, 03 Oct 2024 08:00:00 +0000</pubDate>
      <description>Chart news</description>
    </item>
  </channel>
</rss>"#
    );
    mount(&server, "/feed/", ResponseTemplate::new(200).set_body_string(feed)).await;
    mount(&server, "/news/new-chart", article_page("This week's chart", "2024-10-03T09:00:00+01:00")).await;

    let source = Source {
        name: "Trade Paper".to_string(),
        strategy: StrategyOrder::FeedFirst,
        listing_url: Url::parse(&format!("{uri}/category/news/")).unwrap(),
        feed_urls: vec![Url::parse(&format!("{uri}/feed/")).unwrap()],
        link_pattern: None,
        discover_feeds: false,
    };

    // A cap of one keeps the listing fallback out of the picture.
    let report = collector(None, 1).collect(&[source]).await;
    let trade = &report.sources[0];

    assert_eq!(trade.articles.len(), 1);
    assert_eq!(trade.articles[0].title, "This week's chart");
    assert_eq!(trade.diagnostics.dropped_out_of_range, 1);
}

#[tokio::test]
async fn cached_run_needs_no_network() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/news"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"<a href="/news/only">Only</a>"#))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/news/only"))
        .respond_with(article_page("Only", "2024-10-05T12:00:00Z"))
        .expect(1)
        .mount(&server)
        .await;

    let source = Source {
        name: "Trade Paper".to_string(),
        strategy: StrategyOrder::ListingFirst,
        listing_url: Url::parse(&format!("{}/news", server.uri())).unwrap(),
        feed_urls: Vec::new(),
        link_pattern: Some(Regex::new("^/news/").unwrap()),
        discover_feeds: false,
    };

    let tmp = tempfile::tempdir().unwrap();
    let first = collector(Some(ResponseCache::new(tmp.path())), 80)
        .collect(std::slice::from_ref(&source))
        .await;
    let second = collector(Some(ResponseCache::new(tmp.path())), 80)
        .collect(std::slice::from_ref(&source))
        .await;

    assert_eq!(first.total_articles(), 1);
    assert_eq!(second.merged[0].title, first.merged[0].title);
}

#[tokio::test]
async fn config_driven_collector_uses_config_window() {
    let yaml = r#"
days: 2
timezone: Europe/London
use_cache: false
min_request_interval_ms: 0
sources:
  - name: Trade Paper
    strategy: listing-first
    listing_url: http://127.0.0.1:9/news
"#;
    let config = CollectorConfig::from_yaml(yaml).unwrap();
    assert_eq!(
        config.sources,
        vec![SourceConfig {
            name: "Trade Paper".to_string(),
            strategy: StrategyOrder::ListingFirst,
            listing_url: "http://127.0.0.1:9/news".to_string(),
            feed_urls: Vec::new(),
            link_pattern: None,
            discover_feeds: true,
        }]
    );

    let now = Utc.with_ymd_and_hms(2024, 10, 7, 12, 0, 0).unwrap();
    let collector = Collector::from_config(&config, now).unwrap();
    let window = collector.window();
    assert_eq!(window.start, London.with_ymd_and_hms(2024, 10, 6, 0, 0, 0).unwrap());
    assert_eq!(window.end, now.with_timezone(&London));
}
