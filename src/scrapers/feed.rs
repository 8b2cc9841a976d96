//! Feed-first discovery: RSS 2.0, RSS 1.0 (RDF) and Atom.
//!
//! Candidate feeds come from [`super::discovery`]. They are tried in order
//! and the first one that fetches and parses supplies the candidates; the
//! rest are not requested.

use super::discovery::discover_feeds;
use super::{IngestContext, SourceRun, fetch_article_page, settle};
use crate::diagnostics::DiagnosticKind;
use crate::error::FeedError;
use crate::extract::visible_text;
use crate::models::{Article, Candidate};
use quick_xml::events::Event;
use quick_xml::reader::Reader;
use scraper::Html;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// HTML named entities are common in publisher feeds but undefined in XML.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", "&#160;")
        .replace("&ndash;", "&#8211;")
        .replace("&mdash;", "&#8212;")
        .replace("&lsquo;", "&#8216;")
        .replace("&rsquo;", "&#8217;")
        .replace("&ldquo;", "&#8220;")
        .replace("&rdquo;", "&#8221;")
        .replace("&hellip;", "&#8230;")
}

/// Local name of the document's root element, lowercased.
fn root_element(xml: &str) -> Option<String> {
    let mut reader = Reader::from_str(xml);
    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                return Some(String::from_utf8_lossy(e.local_name().as_ref()).to_ascii_lowercase());
            }
            Ok(Event::Eof) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

/// Markup in titles and summaries reduced to plain text.
fn html_to_text(fragment: &str) -> String {
    visible_text(Html::parse_fragment(fragment).root_element())
}

fn non_empty_text(raw: Option<&str>) -> Option<String> {
    raw.map(html_to_text).filter(|t| !t.is_empty())
}

/// Resolve an entry link against the feed URL; only http(s) survives.
fn resolve_link(base: &Url, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let url = base.join(raw).ok()?;
    matches!(url.scheme(), "http" | "https").then(|| url.to_string())
}

/// The guid as a link, when it is not flagged off and is an absolute URL.
fn guid_permalink(guid: &rss::Guid) -> Option<&str> {
    let value = guid.value().trim();
    (guid.is_permalink() && Url::parse(value).is_ok()).then_some(value)
}

/// `dc:date`, whether or not the Dublin Core namespace was declared.
fn dc_date(item: &rss::Item) -> Option<String> {
    item.dublin_core_ext()
        .and_then(|dc| dc.dates().first().cloned())
        .or_else(|| {
            item.extensions()
                .get("dc")
                .and_then(|ext| ext.get("date"))
                .and_then(|values| values.first())
                .and_then(|e| e.value())
                .map(str::to_string)
        })
}

fn rss_candidate(item: &rss::Item, base: &Url) -> Option<Candidate> {
    let url = item
        .link()
        .and_then(|l| resolve_link(base, l))
        .or_else(|| item.guid().and_then(guid_permalink).and_then(|g| resolve_link(base, g)))?;
    Some(Candidate {
        url,
        title: non_empty_text(item.title()),
        raw_date: item.pub_date().map(str::to_string).or_else(|| dc_date(item)),
        excerpt: non_empty_text(item.description()),
    })
}

/// The `alternate` link, else the first link.
fn atom_permalink(entry: &atom_syndication::Entry) -> Option<&str> {
    let links = entry.links();
    links
        .iter()
        .find(|l| l.rel() == "alternate")
        .or_else(|| links.first())
        .map(|l| l.href())
}

fn atom_candidate(entry: &atom_syndication::Entry, base: &Url) -> Option<Candidate> {
    let url = atom_permalink(entry).and_then(|href| resolve_link(base, href))?;
    // A missing <updated> reads back as the Unix epoch.
    let updated = Some(entry.updated()).filter(|d| d.timestamp() != 0);
    Some(Candidate {
        url,
        title: non_empty_text(Some(entry.title().as_str())),
        raw_date: entry.published().or(updated).map(|d| d.to_rfc3339()),
        excerpt: non_empty_text(entry.summary().map(|t| t.as_str())),
    })
}

/// Parse a feed body into candidates, in document order.
///
/// The root element picks the format: `rss` and `rdf:RDF` go through the
/// `rss` crate, `feed` through `atom_syndication`. Namespaced extension
/// elements (`media:*`, `atom:link`, `content:encoded`) are ignored. Entries
/// without a usable link are skipped.
pub fn parse_feed(body: &str, feed_url: &Url) -> Result<Vec<Candidate>, FeedError> {
    let xml = scrub_html_entities_for_xml(body);
    let root = root_element(&xml).unwrap_or_default();

    let candidates = match root.as_str() {
        "rss" | "rdf" => rss::Channel::read_from(xml.as_bytes())?
            .items()
            .iter()
            .filter_map(|item| rss_candidate(item, feed_url))
            .collect(),
        "feed" => atom_syndication::Feed::read_from(xml.as_bytes())?
            .entries()
            .iter()
            .filter_map(|entry| atom_candidate(entry, feed_url))
            .collect(),
        _ => return Err(FeedError::NotAFeed(root)),
    };
    Ok(candidates)
}

/// Collect up to `limit` articles from the source's first working feed.
#[instrument(level = "info", skip_all, fields(source = %run.source.name, limit = limit))]
pub async fn ingest_feeds(ctx: &IngestContext<'_>, run: &mut SourceRun<'_>, limit: usize) -> Vec<Article> {
    if limit == 0 {
        return Vec::new();
    }

    for feed_url in discover_feeds(ctx, run.source, run.listing_html.as_deref()).await {
        let body = match ctx.fetcher.fetch_text(feed_url.as_str()).await {
            Ok(body) => body,
            Err(failure) => {
                debug!(%failure, "Feed fetch failed");
                run.diagnostics.record_failure(&failure);
                continue;
            }
        };

        let candidates = match parse_feed(&body, &feed_url) {
            Ok(c) => c,
            Err(e) => {
                warn!(feed = %feed_url, error = %e, "Unparsable feed");
                run.diagnostics.record(DiagnosticKind::FeedUnparsable);
                continue;
            }
        };

        info!(feed = %feed_url, entries = candidates.len(), "Parsed feed");
        return harvest(ctx, run, candidates, limit).await;
    }

    Vec::new()
}

async fn harvest(
    ctx: &IngestContext<'_>,
    run: &mut SourceRun<'_>,
    candidates: Vec<Candidate>,
    limit: usize,
) -> Vec<Article> {
    run.diagnostics
        .record_n(DiagnosticKind::UrlDiscovered, candidates.len() as u32);

    let mut articles = Vec::new();
    for candidate in candidates {
        if articles.len() >= limit {
            break;
        }
        if !run.claim(&candidate.url) {
            continue;
        }

        let requested = candidate.url.clone();
        let mut article = Article::from_candidate(&run.source.name, candidate, ctx.dates);

        // A feed date outside the window is final; skip the page fetch.
        if article.published.as_ref().is_some_and(|d| !ctx.window.contains(d)) {
            debug!(url = %article.url, "Feed entry outside collection window");
            run.diagnostics.record(DiagnosticKind::DroppedOutOfRange);
            continue;
        }

        if ctx.enrich_feed_entries {
            if let Some(page) = fetch_article_page(ctx, &requested, &mut run.diagnostics).await {
                article.enrich(page);
            }
        }
        article.fill_text_fallback();

        if let Some(article) = settle(ctx, run, &requested, article) {
            articles.push(article);
        }
    }
    articles
}
