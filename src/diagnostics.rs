//! Per-source counters that explain every keep/drop decision.
//!
//! An empty result is only useful if it says *why* it is empty. Each
//! [`Diagnostics`] record is created per source per run, accumulated while
//! the source is collected, read once at the end, and never persisted.

use crate::error::FetchFailure;
use serde::Serialize;

/// One countable event in the life of a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    UrlDiscovered,
    UrlAttempted,
    ArticleFetched,
    DroppedOutOfRange,
    KeptMissingDate,
    RequestFailed,
    RobotsDisallowed,
    ListingStructureChanged,
    NoContent,
    Deduped,
    FeedUnparsable,
}

/// Counters for one source.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub urls_discovered: u32,
    pub urls_attempted: u32,
    pub articles_fetched: u32,
    pub articles_kept: u32,
    pub dropped_out_of_range: u32,
    pub kept_missing_date: u32,
    pub request_failed: u32,
    pub robots_disallowed: u32,
    pub listing_structure_changed: u32,
    pub no_content: u32,
    pub deduped: u32,
    pub feed_unparsable: u32,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, kind: DiagnosticKind) {
        self.record_n(kind, 1);
    }

    pub fn record_n(&mut self, kind: DiagnosticKind, n: u32) {
        let counter = match kind {
            DiagnosticKind::UrlDiscovered => &mut self.urls_discovered,
            DiagnosticKind::UrlAttempted => &mut self.urls_attempted,
            DiagnosticKind::ArticleFetched => &mut self.articles_fetched,
            DiagnosticKind::DroppedOutOfRange => &mut self.dropped_out_of_range,
            DiagnosticKind::KeptMissingDate => &mut self.kept_missing_date,
            DiagnosticKind::RequestFailed => &mut self.request_failed,
            DiagnosticKind::RobotsDisallowed => &mut self.robots_disallowed,
            DiagnosticKind::ListingStructureChanged => &mut self.listing_structure_changed,
            DiagnosticKind::NoContent => &mut self.no_content,
            DiagnosticKind::Deduped => &mut self.deduped,
            DiagnosticKind::FeedUnparsable => &mut self.feed_unparsable,
        };
        *counter = counter.saturating_add(n);
    }

    /// Count a failed fetch under its tag.
    pub fn record_failure(&mut self, failure: &FetchFailure) {
        match failure {
            FetchFailure::RobotsDisallowed { .. } => self.record(DiagnosticKind::RobotsDisallowed),
            FetchFailure::RequestFailed { .. } => self.record(DiagnosticKind::RequestFailed),
        }
    }

    /// Human-readable reasons behind an empty or short result, most telling first.
    pub fn reasons(&self) -> Vec<String> {
        let mut out = Vec::new();
        if self.listing_structure_changed > 0 {
            out.push("listing page structure changed (no matching links found)".to_string());
        }
        if self.robots_disallowed > 0 {
            out.push(format!("{} URL(s) disallowed by robots.txt", self.robots_disallowed));
        }
        if self.request_failed > 0 {
            out.push(format!("{} request(s) failed", self.request_failed));
        }
        if self.feed_unparsable > 0 {
            out.push(format!("{} feed(s) could not be parsed", self.feed_unparsable));
        }
        if self.dropped_out_of_range > 0 {
            out.push(format!(
                "{} article(s) dated outside the collection window",
                self.dropped_out_of_range
            ));
        }
        if self.no_content > 0 {
            out.push(format!(
                "{} article(s) with no extractable content (paywall?)",
                self.no_content
            ));
        }
        if self.deduped > 0 {
            out.push(format!("{} duplicate(s) removed", self.deduped));
        }
        if out.is_empty() && self.urls_discovered == 0 {
            out.push("no candidate URLs discovered".to_string());
        }
        out
    }

    /// One-line explanation, e.g. for a log line or a report footer.
    pub fn explain(&self) -> String {
        let reasons = self.reasons();
        if reasons.is_empty() {
            format!("{} article(s) kept", self.articles_kept)
        } else {
            format!("{} article(s) kept; {}", self.articles_kept, reasons.join("; "))
        }
    }
}
