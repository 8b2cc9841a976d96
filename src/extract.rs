//! Article page → structured metadata via ordered fallback rules.
//!
//! Every field is backed by an ordered list of [`ExtractRule`]s. Rules offer
//! raw candidate strings; the first candidate that survives the field's
//! validation (non-empty text, a parseable date, a resolvable URL) wins. A
//! site redesign that breaks one rule degrades to the next one instead of
//! failing, with no per-site branching.
//!
//! | Field | Rules, in order |
//! |-------|-----------------|
//! | canonical URL | `link[rel=canonical]`, `og:url`, requested URL |
//! | title | `og:title`, `twitter:title`, first `h1`, `<title>` (the article falls back to "Untitled") |
//! | date | published-time meta, `time[datetime]`, JSON-LD search |
//! | excerpt | `og:description`, `twitter:description`, `description`, first `p` |
//! | body | `p`/`h2`/`h3` text inside the main container, else the body |

use crate::dates::DateNormalizer;
use crate::utils::collapse_whitespace;
use chrono::DateTime;
use chrono_tz::Tz;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use url::Url;

/// Keys searched, in order, inside JSON-LD objects.
const JSON_LD_DATE_KEYS: &[&str] = &["datePublished", "dateCreated", "uploadDate"];

/// Elements whose text is never visible.
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

fn selector(css: &'static str) -> Selector {
    Selector::parse(css).expect("static selector must parse")
}

/// One way of finding a field value in a document.
pub trait ExtractRule: Send + Sync {
    /// Raw values this rule finds, in document order.
    fn candidates(&self, doc: &Html) -> Vec<String>;
}

/// Value of an attribute on elements matching a selector.
pub struct AttrRule {
    selector: Selector,
    attr: &'static str,
}

impl AttrRule {
    pub fn new(css: &'static str, attr: &'static str) -> Self {
        Self {
            selector: selector(css),
            attr,
        }
    }
}

impl ExtractRule for AttrRule {
    fn candidates(&self, doc: &Html) -> Vec<String> {
        doc.select(&self.selector)
            .filter_map(|el| el.value().attr(self.attr))
            .map(collapse_whitespace)
            .collect()
    }
}

/// Visible text of the first element matching a selector.
pub struct TextRule {
    selector: Selector,
}

impl TextRule {
    pub fn new(css: &'static str) -> Self {
        Self {
            selector: selector(css),
        }
    }
}

impl ExtractRule for TextRule {
    fn candidates(&self, doc: &Html) -> Vec<String> {
        doc.select(&self.selector)
            .map(visible_text)
            .filter(|t| !t.is_empty())
            .take(1)
            .collect()
    }
}

/// Date-like values from `<script type="application/ld+json">` blocks,
/// searched recursively through objects and arrays.
pub struct JsonLdDateRule {
    selector: Selector,
}

impl JsonLdDateRule {
    pub fn new() -> Self {
        Self {
            selector: selector(r#"script[type="application/ld+json"]"#),
        }
    }
}

impl Default for JsonLdDateRule {
    fn default() -> Self {
        Self::new()
    }
}

fn collect_json_ld_dates(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::Object(map) => {
            for key in JSON_LD_DATE_KEYS {
                match map.get(*key) {
                    Some(Value::String(s)) => out.push(s.clone()),
                    Some(Value::Null) | None => {}
                    Some(other) => out.push(other.to_string()),
                }
            }
            for nested in map.values() {
                collect_json_ld_dates(nested, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_json_ld_dates(item, out);
            }
        }
        _ => {}
    }
}

impl ExtractRule for JsonLdDateRule {
    fn candidates(&self, doc: &Html) -> Vec<String> {
        let mut out = Vec::new();
        for script in doc.select(&self.selector) {
            let raw: String = script.text().collect();
            match serde_json::from_str::<Value>(raw.trim()) {
                Ok(value) => collect_json_ld_dates(&value, &mut out),
                Err(e) => tracing::trace!(error = %e, "Skipping malformed JSON-LD block"),
            }
        }
        out
    }
}

/// Text of an element, excluding script/style/noscript content, whitespace collapsed.
pub fn visible_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in el.descendants() {
        let Some(text) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|a| {
            a.value()
                .as_element()
                .is_some_and(|e| HIDDEN_ELEMENTS.contains(&e.name()))
        });
        if !hidden {
            out.push_str(text);
        }
    }
    collapse_whitespace(&out)
}

/// Everything extracted from one article page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageMetadata {
    /// Absolute canonical URL; the requested URL when the page names none.
    pub canonical_url: String,
    /// `None` when every title rule came up empty.
    pub title: Option<String>,
    pub published: Option<DateTime<Tz>>,
    pub excerpt: Option<String>,
    pub body_text: Option<String>,
}

/// Applies the per-field rule chains to article pages.
pub struct MetadataExtractor {
    canonical: Vec<Box<dyn ExtractRule>>,
    title: Vec<Box<dyn ExtractRule>>,
    date: Vec<Box<dyn ExtractRule>>,
    excerpt: Vec<Box<dyn ExtractRule>>,
    containers: Vec<Selector>,
    blocks: Selector,
    body: Selector,
    dates: DateNormalizer,
}

impl std::fmt::Debug for MetadataExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataExtractor")
            .field("canonical_rules", &self.canonical.len())
            .field("title_rules", &self.title.len())
            .field("date_rules", &self.date.len())
            .field("excerpt_rules", &self.excerpt.len())
            .finish()
    }
}

impl MetadataExtractor {
    pub fn new(dates: DateNormalizer) -> Self {
        Self {
            canonical: vec![
                Box::new(AttrRule::new(r#"link[rel="canonical"]"#, "href")),
                Box::new(AttrRule::new(r#"meta[property="og:url"]"#, "content")),
            ],
            title: vec![
                Box::new(AttrRule::new(r#"meta[property="og:title"]"#, "content")),
                Box::new(AttrRule::new(r#"meta[name="twitter:title"]"#, "content")),
                Box::new(TextRule::new("h1")),
                Box::new(TextRule::new("title")),
            ],
            date: vec![
                Box::new(AttrRule::new(
                    r#"meta[property="article:published_time"]"#,
                    "content",
                )),
                Box::new(AttrRule::new(r#"meta[name="publish_date"]"#, "content")),
                Box::new(AttrRule::new(r#"meta[name="date"]"#, "content")),
                Box::new(AttrRule::new("time[datetime]", "datetime")),
                Box::new(JsonLdDateRule::new()),
            ],
            excerpt: vec![
                Box::new(AttrRule::new(r#"meta[property="og:description"]"#, "content")),
                Box::new(AttrRule::new(r#"meta[name="twitter:description"]"#, "content")),
                Box::new(AttrRule::new(r#"meta[name="description"]"#, "content")),
                Box::new(TextRule::new("p")),
            ],
            containers: vec![selector("article"), selector("main"), selector(r#"[role="main"]"#)],
            blocks: selector("p, h2, h3"),
            body: selector("body"),
            dates,
        }
    }

    /// Extract metadata from an HTML document fetched from `requested_url`.
    pub fn extract(&self, html: &str, requested_url: &str) -> PageMetadata {
        let doc = Html::parse_document(html);
        let base = Url::parse(requested_url).ok();

        let canonical_url = first_valid(&self.canonical, &doc, |raw| resolve(base.as_ref(), raw))
            .unwrap_or_else(|| requested_url.to_string());
        let title = first_valid(&self.title, &doc, non_empty);
        let published = first_valid(&self.date, &doc, |raw| self.dates.parse(raw));
        let excerpt = first_valid(&self.excerpt, &doc, non_empty);
        let body_text = self.body_text(&doc);

        PageMetadata {
            canonical_url,
            title,
            published,
            excerpt,
            body_text,
        }
    }

    fn body_text(&self, doc: &Html) -> Option<String> {
        let scope = self
            .containers
            .iter()
            .find_map(|sel| doc.select(sel).next())
            .or_else(|| doc.select(&self.body).next())
            .unwrap_or_else(|| doc.root_element());

        let text = scope
            .select(&self.blocks)
            .map(visible_text)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        non_empty(&text)
    }
}

/// Run `rules` in order and return the first candidate `accept` maps to a value.
fn first_valid<T, F>(rules: &[Box<dyn ExtractRule>], doc: &Html, accept: F) -> Option<T>
where
    F: Fn(&str) -> Option<T>,
{
    rules
        .iter()
        .flat_map(|rule| rule.candidates(doc))
        .find_map(|raw| accept(&raw))
}

fn non_empty(raw: &str) -> Option<String> {
    let text = collapse_whitespace(raw);
    (!text.is_empty()).then_some(text)
}

fn resolve(base: Option<&Url>, raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let resolved = match base {
        Some(b) => b.join(raw).ok()?,
        None => Url::parse(raw).ok()?,
    };
    matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
}
