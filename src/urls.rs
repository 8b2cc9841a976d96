//! URL identity: canonical keys and first-wins duplicate suppression.
//!
//! Publishers hand out the same story under many spellings: tracking query
//! strings, fragments, doubled slashes, trailing slashes, mixed-case hosts.
//! [`canonical_key`] folds these into one key, and [`Deduper`] uses it to keep
//! the first occurrence and drop the rest.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use url::Url;

static REPEATED_SLASHES: Lazy<Regex> = Lazy::new(|| Regex::new(r"/{2,}").expect("static regex"));

/// Normalize a URL for identity comparison.
///
/// Lowercases scheme and host, collapses repeated `/` in the path, strips a
/// trailing `/` (the root path stays `/`), and drops query and fragment.
/// Non-default ports are kept. Input that does not parse as an absolute URL
/// is returned trimmed, minus any query or fragment.
///
/// The function is idempotent: `canonical_key(&canonical_key(u)) == canonical_key(u)`.
pub fn canonical_key(url: &str) -> String {
    let trimmed = url.trim();
    let parsed = match Url::parse(trimmed) {
        Ok(u) => u,
        Err(_) => {
            let end = trimmed.find(['?', '#']).unwrap_or(trimmed.len());
            return trimmed[..end].to_string();
        }
    };

    let scheme = parsed.scheme().to_ascii_lowercase();
    let host = match parsed.host_str() {
        Some(h) => h.to_ascii_lowercase(),
        None => {
            let mut opaque = parsed.clone();
            opaque.set_query(None);
            opaque.set_fragment(None);
            return opaque.to_string();
        }
    };

    let collapsed = REPEATED_SLASHES.replace_all(parsed.path(), "/");
    let path = match collapsed.trim_end_matches('/') {
        "" => "/",
        p => p,
    };

    match parsed.port() {
        Some(port) => format!("{scheme}://{host}:{port}{path}"),
        None => format!("{scheme}://{host}{path}"),
    }
}

/// Tracks canonical keys already seen; the first occurrence wins.
#[derive(Debug, Default, Clone)]
pub struct Deduper {
    seen: HashSet<String>,
}

impl Deduper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `url`. Returns `true` if its canonical key was not seen before.
    pub fn admit(&mut self, url: &str) -> bool {
        self.seen.insert(canonical_key(url))
    }

    /// Keep the first item per canonical key, preserving order.
    ///
    /// Returns the survivors and the number of discarded duplicates.
    pub fn retain_first<T, F>(&mut self, items: Vec<T>, key: F) -> (Vec<T>, usize)
    where
        F: Fn(&T) -> &str,
    {
        let mut kept = Vec::with_capacity(items.len());
        let mut dropped = 0usize;
        for item in items {
            if self.admit(key(&item)) {
                kept.push(item);
            } else {
                dropped += 1;
            }
        }
        (kept, dropped)
    }
}
