//! Command-line interface definitions for the news ingestion engine.
//!
//! Every flag overrides the matching setting from the YAML config (or the
//! built-in defaults when no config is given). Flags can also be supplied
//! through environment variables.

use crate::config::CollectorConfig;
use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments.
///
/// # Examples
///
/// ```sh
/// # Default sources, last 7 days, JSON into ./json
/// news_ingest -j ./json
///
/// # Custom config, shorter window, fresh fetches
/// news_ingest -j ./json -c sources.yaml --days 3 --no-cache
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Output directory for the collection JSON
    #[arg(short, long, env = "NEWS_INGEST_JSON_DIR")]
    pub json_output_dir: String,

    /// Optional path to config.yaml file
    #[arg(short, long, env = "NEWS_INGEST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Collection window in days, today included
    #[arg(long)]
    pub days: Option<u32>,

    /// Maximum articles kept per source
    #[arg(long)]
    pub max_articles_per_source: Option<usize>,

    /// Directory for cached responses
    #[arg(long, env = "NEWS_INGEST_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Always fetch from the network; neither read nor write the cache
    #[arg(long)]
    pub no_cache: bool,
}

impl Cli {
    /// Apply flag overrides on top of `config`.
    pub fn apply(&self, config: &mut CollectorConfig) {
        if let Some(days) = self.days {
            config.days = days;
        }
        if let Some(max) = self.max_articles_per_source {
            config.max_articles_per_source = max;
        }
        if let Some(dir) = &self.cache_dir {
            config.cache_dir = dir.clone();
        }
        if self.no_cache {
            config.use_cache = false;
        }
    }
}
