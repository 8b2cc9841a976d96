//! Collector settings and the source table, loaded from YAML.
//!
//! Every field has a default, so an empty file (or no file at all) yields the
//! built-in configuration covering the two music-trade sources.
//!
//! ```yaml
//! timezone: Europe/London
//! days: 7
//! max_articles_per_source: 80
//! sources:
//!   - name: Music Week
//!     strategy: listing-first
//!     listing_url: https://www.musicweek.com/news
//!     link_pattern: /news/
//! ```

use crate::dates::{DateWindow, MAX_WINDOW_DAYS};
use crate::error::ConfigError;
use crate::fetch::{DEFAULT_USER_AGENT, rate_limit::DEFAULT_MIN_INTERVAL};
use crate::models::{Source, StrategyOrder};
use chrono::DateTime;
use chrono_tz::Tz;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// One configured source, as written in YAML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,
    pub strategy: StrategyOrder,
    pub listing_url: String,
    #[serde(default)]
    pub feed_urls: Vec<String>,
    /// Regex matched against the path of each listing link.
    #[serde(default)]
    pub link_pattern: Option<String>,
    #[serde(default = "default_true")]
    pub discover_feeds: bool,
}

fn default_true() -> bool {
    true
}

fn parse_url(source_name: &str, field: &'static str, raw: &str) -> Result<Url, ConfigError> {
    Url::parse(raw).map_err(|reason| ConfigError::InvalidUrl {
        source_name: source_name.to_string(),
        field,
        url: raw.to_string(),
        reason,
    })
}

impl TryFrom<&SourceConfig> for Source {
    type Error = ConfigError;

    fn try_from(cfg: &SourceConfig) -> Result<Self, Self::Error> {
        let listing_url = parse_url(&cfg.name, "listing", &cfg.listing_url)?;
        let feed_urls = cfg
            .feed_urls
            .iter()
            .map(|raw| parse_url(&cfg.name, "feed", raw))
            .collect::<Result<Vec<_>, _>>()?;
        let link_pattern = cfg
            .link_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|reason| ConfigError::InvalidPattern {
                source_name: cfg.name.clone(),
                reason,
            })?;

        Ok(Source {
            name: cfg.name.clone(),
            strategy: cfg.strategy,
            listing_url,
            feed_urls,
            link_pattern,
            discover_feeds: cfg.discover_feeds,
        })
    }
}

/// Top-level collector configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// IANA name of the reference timezone.
    pub timezone: String,
    /// Size of the collection window in calendar days, today included.
    pub days: u32,
    pub max_articles_per_source: usize,
    pub min_request_interval_ms: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub cache_dir: PathBuf,
    pub use_cache: bool,
    /// Fetch each feed entry's page for richer metadata.
    pub enrich_feed_entries: bool,
    /// Sources processed at once. 1 keeps the run strictly sequential.
    pub source_concurrency: usize,
    pub sources: Vec<SourceConfig>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            timezone: "Europe/London".to_string(),
            days: 7,
            max_articles_per_source: 80,
            min_request_interval_ms: DEFAULT_MIN_INTERVAL.as_millis() as u64,
            request_timeout_secs: 25,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            cache_dir: PathBuf::from("cache"),
            use_cache: true,
            enrich_feed_entries: true,
            source_concurrency: 1,
            sources: default_sources(),
        }
    }
}

/// The built-in source table.
pub fn default_sources() -> Vec<SourceConfig> {
    vec![
        SourceConfig {
            name: "Music Week".to_string(),
            strategy: StrategyOrder::ListingFirst,
            listing_url: "https://www.musicweek.com/news".to_string(),
            feed_urls: Vec::new(),
            link_pattern: Some("/news/".to_string()),
            discover_feeds: true,
        },
        SourceConfig {
            name: "Music Business Worldwide".to_string(),
            strategy: StrategyOrder::FeedFirst,
            listing_url: "https://www.musicbusinessworldwide.com/category/news/".to_string(),
            feed_urls: vec!["https://www.musicbusinessworldwide.com/feed/".to_string()],
            link_pattern: None,
            discover_feeds: true,
        },
    ]
}

impl CollectorConfig {
    /// Load and validate a YAML config file.
    #[instrument(level = "info")]
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_yaml(&raw)?;
        debug!(sources = config.sources.len(), "Loaded config");
        Ok(config)
    }

    pub fn from_yaml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = if raw.trim().is_empty() {
            Self::default()
        } else {
            serde_yaml::from_str(raw)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make a run meaningless.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.days == 0 || self.days > MAX_WINDOW_DAYS {
            return Err(ConfigError::InvalidSetting {
                field: "days",
                reason: format!("must be between 1 and {MAX_WINDOW_DAYS}"),
            });
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::InvalidSetting {
                field: "request_timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.source_concurrency == 0 {
            return Err(ConfigError::InvalidSetting {
                field: "source_concurrency",
                reason: "must be at least 1".to_string(),
            });
        }
        self.timezone()?;
        self.sources()?;
        Ok(())
    }

    pub fn timezone(&self) -> Result<Tz, ConfigError> {
        self.timezone.parse::<Tz>().map_err(|e| ConfigError::Timezone {
            name: self.timezone.clone(),
            reason: e.to_string(),
        })
    }

    /// Parsed sources, in configuration order.
    pub fn sources(&self) -> Result<Vec<Source>, ConfigError> {
        self.sources.iter().map(Source::try_from).collect()
    }

    /// The collection window ending at `now`.
    pub fn window(&self, now: DateTime<Tz>) -> DateWindow {
        DateWindow::last_days(self.days, now)
    }

    pub fn min_request_interval(&self) -> Duration {
        Duration::from_millis(self.min_request_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
