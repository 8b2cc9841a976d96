//! Listing-first discovery: scrape article links from a section page.

use super::{IngestContext, SourceRun, fetch_article_page, settle};
use crate::diagnostics::DiagnosticKind;
use crate::models::{Article, Candidate, Source};
use crate::urls::canonical_key;
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{info, instrument, warn};
use url::Url;

static ANCHORS: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").expect("static selector must parse"));

fn same_origin(a: &Url, b: &Url) -> bool {
    a.host_str() == b.host_str() && a.port_or_known_default() == b.port_or_known_default()
}

/// Article links on a listing page, in document order.
///
/// Links are resolved against the listing URL with fragments removed, then
/// kept only when they are http(s), on the listing's origin, accepted by the
/// source's path filter, and not the listing page itself. Duplicates (by
/// canonical key) keep their first position.
pub fn extract_listing_links(html: &str, listing_url: &Url, source: &Source) -> Vec<Url> {
    let doc = Html::parse_document(html);
    let listing_key = canonical_key(listing_url.as_str());

    doc.select(&ANCHORS)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| listing_url.join(href.trim()).ok())
        .map(|mut url| {
            url.set_fragment(None);
            url
        })
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .filter(|url| same_origin(url, listing_url))
        .filter(|url| source.accepts_link(url))
        .filter(|url| canonical_key(url.as_str()) != listing_key)
        .unique_by(|url| canonical_key(url.as_str()))
        .collect()
}

/// Collect up to `limit` articles from the source's listing page.
///
/// Every link's page is fetched; a link whose page cannot be fetched is
/// dropped. A listing that yields no links at all is flagged as a likely
/// page-structure change.
#[instrument(level = "info", skip_all, fields(source = %run.source.name, limit = limit))]
pub async fn ingest_listing(ctx: &IngestContext<'_>, run: &mut SourceRun<'_>, limit: usize) -> Vec<Article> {
    if limit == 0 {
        return Vec::new();
    }

    let listing_url = run.source.listing_url.clone();
    let html = match ctx.fetcher.fetch_text(listing_url.as_str()).await {
        Ok(html) => html,
        Err(failure) => {
            warn!(%failure, "Listing page fetch failed");
            run.diagnostics.record_failure(&failure);
            return Vec::new();
        }
    };

    let links = extract_listing_links(&html, &listing_url, run.source);
    run.listing_html = Some(html);
    run.diagnostics
        .record_n(DiagnosticKind::UrlDiscovered, links.len() as u32);
    if links.is_empty() {
        warn!(listing = %listing_url, "No article links on listing page; structure may have changed");
        run.diagnostics
            .record(DiagnosticKind::ListingStructureChanged);
        return Vec::new();
    }
    info!(links = links.len(), "Found listing links");

    let mut articles = Vec::new();
    for link in links {
        if articles.len() >= limit {
            break;
        }
        if !run.claim(link.as_str()) {
            continue;
        }
        let Some(page) = fetch_article_page(ctx, link.as_str(), &mut run.diagnostics).await else {
            continue;
        };

        let mut article = Article::from_candidate(
            &run.source.name,
            Candidate::from_url(link.as_str()),
            ctx.dates,
        );
        article.enrich(page);
        if let Some(article) = settle(ctx, run, link.as_str(), article) {
            articles.push(article);
        }
    }
    articles
}
