//! Locate a source's syndication feeds.
//!
//! Feeds the listing page advertises through
//! `<link rel="alternate" type="application/rss+xml|atom+xml">` come first,
//! followed by the statically configured feed URLs. A listing body already
//! fetched in this run is reused. Discovery problems are never fatal: the
//! static list is always returned.

use super::IngestContext;
use crate::models::Source;
use crate::urls::canonical_key;
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{debug, instrument};
use url::Url;

static ALTERNATE_LINKS: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"link[rel~="alternate"][href]"#).expect("static selector must parse"));

/// Feed URLs advertised in an HTML document's head, resolved against `base`.
pub fn advertised_feeds(html: &str, base: &Url) -> Vec<Url> {
    let doc = Html::parse_document(html);
    doc.select(&ALTERNATE_LINKS)
        .filter(|link| {
            link.value().attr("type").is_some_and(|t| {
                let t = t.to_ascii_lowercase();
                t.contains("rss") || t.contains("atom")
            })
        })
        .filter_map(|link| link.value().attr("href"))
        .filter_map(|href| base.join(href.trim()).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .collect()
}

/// Candidate feed URLs for `source`, discovered ones first, without duplicates.
#[instrument(level = "debug", skip_all, fields(source = %source.name))]
pub async fn discover_feeds(ctx: &IngestContext<'_>, source: &Source, listing_html: Option<&str>) -> Vec<Url> {
    let mut discovered = Vec::new();
    if source.discover_feeds {
        match listing_html {
            Some(html) => discovered = advertised_feeds(html, &source.listing_url),
            None => match ctx.fetcher.fetch_text(source.listing_url.as_str()).await {
                Ok(html) => discovered = advertised_feeds(&html, &source.listing_url),
                Err(failure) => debug!(%failure, "Feed discovery skipped"),
            },
        }
    }
    if !discovered.is_empty() {
        debug!(count = discovered.len(), "Discovered advertised feeds");
    }

    discovered
        .into_iter()
        .chain(source.feed_urls.iter().cloned())
        .unique_by(|url| canonical_key(url.as_str()))
        .collect()
}
