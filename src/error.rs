//! Typed errors for the ingestion engine.
//!
//! The main families live here:
//! - [`FetchFailure`]: the tagged, non-fatal outcome of a single fetch. It is
//!   recorded in diagnostics and never aborts a run.
//! - [`FeedError`]: a feed body that is not a parseable RSS/Atom document.
//! - [`ConfigError`]: setup problems (bad YAML, unknown timezone, invalid
//!   URLs or patterns) that are surfaced to the caller before collection starts.

use thiserror::Error;

/// Why a fetch produced no body.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FetchFailure {
    /// A successfully parsed robots.txt forbids this URL. No request was made.
    #[error("robots.txt disallows {url}")]
    RobotsDisallowed { url: String },

    /// The request could not be made or the server refused it.
    #[error("request for {url} failed: {reason}")]
    RequestFailed { url: String, reason: RequestFailure },
}

impl FetchFailure {
    /// The URL this failure is about.
    pub fn url(&self) -> &str {
        match self {
            FetchFailure::RobotsDisallowed { url } => url,
            FetchFailure::RequestFailed { url, .. } => url,
        }
    }
}

/// Detail for [`FetchFailure::RequestFailed`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RequestFailure {
    #[error("HTTP status {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// A fetched feed body that could not be turned into entries.
#[derive(Debug, Error)]
pub enum FeedError {
    #[error("not a syndication feed (root element {0:?})")]
    NotAFeed(String),

    #[error("malformed RSS feed: {0}")]
    Rss(#[from] rss::Error),

    #[error("malformed Atom feed: {0}")]
    Atom(#[from] atom_syndication::Error),
}

/// Errors raised while loading configuration or building collaborators.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unknown timezone {name:?}: {reason}")]
    Timezone { name: String, reason: String },

    #[error("source {source_name:?}: invalid {field} URL {url:?}: {reason}")]
    InvalidUrl {
        source_name: String,
        field: &'static str,
        url: String,
        reason: url::ParseError,
    },

    #[error("source {source_name:?}: invalid link pattern: {reason}")]
    InvalidPattern {
        source_name: String,
        reason: regex::Error,
    },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("invalid setting {field}: {reason}")]
    InvalidSetting { field: &'static str, reason: String },
}
