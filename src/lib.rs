//! # News Ingest
//!
//! A polite news ingestion engine. It discovers articles from configured
//! publications through syndication feeds or listing pages, fetches them under
//! robots.txt and per-domain rate limits, normalizes titles, dates and URLs,
//! deduplicates, applies a date window, and explains every empty or partial
//! result through per-source diagnostics.
//!
//! ## Architecture
//!
//! 1. **Discovery**: [`scrapers::feed`] or [`scrapers::listing`], primary then
//!    fallback, per [`models::StrategyOrder`]
//! 2. **Fetching**: [`fetch::FetchClient`] (cache, robots gate, rate limiter)
//! 3. **Extraction**: [`extract::MetadataExtractor`] fills in title, date,
//!    excerpt and body text from article pages
//! 4. **Normalization**: [`dates`] and [`urls`]
//! 5. **Orchestration**: [`collector::Collector`] caps, dedupes and merges
//! 6. **Output**: [`outputs::json`] writes the hand-off file
//!
//! ```no_run
//! use chrono::Utc;
//! use news_ingest::collector::Collector;
//! use news_ingest::config::CollectorConfig;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CollectorConfig::default();
//! let collector = Collector::from_config(&config, Utc::now())?;
//! let report = collector.collect(&config.sources()?).await;
//! if let Some(why) = report.explain_empty() {
//!     eprintln!("{why}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod collector;
pub mod config;
pub mod dates;
pub mod diagnostics;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod models;
pub mod outputs;
pub mod scrapers;
pub mod urls;
pub mod utils;
