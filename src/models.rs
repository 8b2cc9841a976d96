//! Data models for sources, candidates and articles.
//!
//! - [`Source`]: a configured publication and how to discover its stories
//! - [`Candidate`]: a raw discovery produced by one ingester
//! - [`Article`]: the normalized output unit handed to downstream consumers
//!   (summarization, entity extraction, translation, report rendering)
//!
//! Article identity is the canonical key of its URL (see
//! [`crate::urls::canonical_key`]); the URL itself is kept as published.

use crate::dates::DateNormalizer;
use crate::extract::PageMetadata;
use crate::urls::canonical_key;
use crate::utils::{EXCERPT_MAX_CHARS, bound_excerpt, collapse_whitespace};
use chrono::DateTime;
use chrono_tz::Tz;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// Title used when no extraction rule finds one.
pub const UNTITLED: &str = "Untitled";

/// Which discovery strategy a source tries first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyOrder {
    /// Syndication feed first, listing page as fallback.
    FeedFirst,
    /// Listing page first, syndication feed as fallback.
    ListingFirst,
}

/// A single discovery strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    Feed,
    Listing,
}

impl StrategyOrder {
    /// `(primary, secondary)` for this ordering.
    pub fn sequence(self) -> (Strategy, Strategy) {
        match self {
            StrategyOrder::FeedFirst => (Strategy::Feed, Strategy::Listing),
            StrategyOrder::ListingFirst => (Strategy::Listing, Strategy::Feed),
        }
    }
}

/// A configured news source. Immutable for the duration of a run.
#[derive(Debug, Clone)]
pub struct Source {
    pub name: String,
    pub strategy: StrategyOrder,
    pub listing_url: Url,
    /// Static candidate feeds, most specific first.
    pub feed_urls: Vec<Url>,
    /// Listing links must match this pattern (against the URL path) to count.
    pub link_pattern: Option<Regex>,
    /// Scan the listing page for advertised feeds before using `feed_urls`.
    pub discover_feeds: bool,
}

impl Source {
    /// Whether a listing link's path passes this source's filter.
    pub fn accepts_link(&self, link: &Url) -> bool {
        match &self.link_pattern {
            Some(re) => re.is_match(link.path()),
            None => true,
        }
    }
}

/// A raw discovery, before enrichment and normalization.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidate {
    pub url: String,
    pub title: Option<String>,
    pub raw_date: Option<String>,
    pub excerpt: Option<String>,
}

impl Candidate {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }
}

/// A normalized article.
///
/// `url` is the page's declared canonical URL when it names one, else the URL
/// it was discovered under. Downstream collaborators fill `summary` after
/// collection.
#[derive(Debug, Clone, Serialize)]
pub struct Article {
    pub source: String,
    pub title: String,
    pub url: String,
    pub published: Option<DateTime<Tz>>,
    pub excerpt: String,
    /// Full extracted page text, when the page was fetched and had any.
    pub text: Option<String>,
    pub summary: Vec<String>,
}

impl PartialEq for Article {
    fn eq(&self, other: &Self) -> bool {
        canonical_key(&self.url) == canonical_key(&other.url)
    }
}

impl Eq for Article {}

impl Article {
    /// Build an article from feed- or listing-derived candidate fields.
    pub fn from_candidate(source: &str, candidate: Candidate, dates: &DateNormalizer) -> Self {
        let title = candidate
            .title
            .as_deref()
            .map(collapse_whitespace)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| UNTITLED.to_string());
        let published = candidate.raw_date.as_deref().and_then(|raw| dates.parse(raw));
        let excerpt = candidate
            .excerpt
            .as_deref()
            .map(|e| bound_excerpt(e, EXCERPT_MAX_CHARS))
            .unwrap_or_default();

        Self {
            source: source.to_string(),
            title,
            url: candidate.url.trim().to_string(),
            published,
            excerpt,
            text: None,
            summary: Vec::new(),
        }
    }

    /// Merge metadata extracted from the article page.
    ///
    /// Page values replace candidate values only when they are non-empty; a
    /// populated field is never cleared. When the page has no excerpt the
    /// body text is used, and when the page has no text at all the
    /// title/excerpt pair stands in for it.
    pub fn enrich(&mut self, page: PageMetadata) {
        if !page.canonical_url.trim().is_empty() {
            self.url = page.canonical_url.trim().to_string();
        }
        if let Some(title) = page.title.filter(|t| !t.is_empty()) {
            self.title = title;
        }
        if page.published.is_some() {
            self.published = page.published;
        }

        let excerpt_source = page
            .excerpt
            .as_deref()
            .filter(|e| !e.is_empty())
            .or_else(|| page.body_text.as_deref().filter(|b| !b.is_empty()));
        if let Some(e) = excerpt_source {
            self.excerpt = bound_excerpt(e, EXCERPT_MAX_CHARS);
        }

        if let Some(body) = page.body_text.filter(|b| !b.is_empty()) {
            self.text = Some(body);
        }
        self.fill_text_fallback();
    }

    /// Stand in "title. excerpt" for `text` when no page text is available.
    pub fn fill_text_fallback(&mut self) {
        if self.text.is_none() && !self.excerpt.is_empty() {
            self.text = Some(format!("{}. {}", self.title, self.excerpt));
        }
    }
}
