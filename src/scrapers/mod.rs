//! Discovery strategies for configured sources.
//!
//! Each strategy turns a source into candidate URLs, fetches each candidate's
//! page through the politeness-gated [`FetchClient`], enriches it with the
//! [`MetadataExtractor`], and applies the collection window.
//!
//! | Strategy | Module | Discovery |
//! |----------|--------|-----------|
//! | Feed | [`feed`] | RSS 2.0 / RSS 1.0 / Atom entries, feeds located by [`discovery`] |
//! | Listing | [`listing`] | Same-origin links on the listing page matching the source's path filter |
//!
//! # Window policy
//!
//! Both strategies apply the same rule: an article whose date lies outside
//! the window is dropped (`dropped_out_of_range`); an article with no
//! recoverable date is kept and counted (`kept_missing_date`).

pub mod discovery;
pub mod feed;
pub mod listing;

use crate::dates::{DateNormalizer, DateWindow, WindowVerdict};
use crate::diagnostics::{DiagnosticKind, Diagnostics};
use crate::extract::{MetadataExtractor, PageMetadata};
use crate::fetch::FetchClient;
use crate::models::{Article, Source};
use crate::urls::{Deduper, canonical_key};
use tracing::debug;

/// Shared, read-only collaborators for one collection run.
#[derive(Debug, Clone, Copy)]
pub struct IngestContext<'a> {
    pub fetcher: &'a FetchClient,
    pub extractor: &'a MetadataExtractor,
    pub dates: &'a DateNormalizer,
    pub window: &'a DateWindow,
    /// Fetch each feed entry's own page to fill in missing metadata.
    pub enrich_feed_entries: bool,
}

/// Mutable state for one source, threaded through both strategies.
#[derive(Debug)]
pub struct SourceRun<'s> {
    pub source: &'s Source,
    /// Canonical keys of every candidate processed so far for this source.
    pub seen: Deduper,
    pub diagnostics: Diagnostics,
    /// Listing page body, once fetched, for feed discovery to reuse.
    pub listing_html: Option<String>,
}

impl<'s> SourceRun<'s> {
    pub fn new(source: &'s Source) -> Self {
        Self {
            source,
            seen: Deduper::new(),
            diagnostics: Diagnostics::new(),
            listing_html: None,
        }
    }

    /// Claim a candidate URL; a repeat is counted as a duplicate.
    pub(crate) fn claim(&mut self, url: &str) -> bool {
        if self.seen.admit(url) {
            true
        } else {
            debug!(%url, "Skipping duplicate candidate");
            self.diagnostics.record(DiagnosticKind::Deduped);
            false
        }
    }
}

/// Fetch an article page and run the extractor over it.
///
/// Failures are recorded and yield `None`. A page that yields neither an
/// excerpt nor body text is counted as `no_content`.
pub(crate) async fn fetch_article_page(
    ctx: &IngestContext<'_>,
    url: &str,
    diagnostics: &mut Diagnostics,
) -> Option<PageMetadata> {
    diagnostics.record(DiagnosticKind::UrlAttempted);
    match ctx.fetcher.fetch_text(url).await {
        Ok(html) => {
            diagnostics.record(DiagnosticKind::ArticleFetched);
            let page = ctx.extractor.extract(&html, url);
            if page.excerpt.is_none() && page.body_text.is_none() {
                debug!(%url, "No extractable content");
                diagnostics.record(DiagnosticKind::NoContent);
            }
            Some(page)
        }
        Err(failure) => {
            debug!(%failure, "Article fetch failed");
            diagnostics.record_failure(&failure);
            None
        }
    }
}

/// Final checks for an enriched article: identity after canonicalization,
/// then the collection window.
pub(crate) fn settle(
    ctx: &IngestContext<'_>,
    run: &mut SourceRun<'_>,
    requested_url: &str,
    article: Article,
) -> Option<Article> {
    // Enrichment may have revealed a different canonical URL.
    if canonical_key(&article.url) != canonical_key(requested_url) && !run.claim(&article.url) {
        return None;
    }

    match ctx.window.verdict(article.published.as_ref()) {
        WindowVerdict::InRange => Some(article),
        WindowVerdict::MissingDate => {
            run.diagnostics.record(DiagnosticKind::KeptMissingDate);
            Some(article)
        }
        WindowVerdict::OutOfRange => {
            debug!(url = %article.url, published = ?article.published, "Outside collection window");
            run.diagnostics.record(DiagnosticKind::DroppedOutOfRange);
            None
        }
    }
}
