//! # News Ingest
//!
//! Collects recent articles from the configured news sources and writes them
//! as one JSON file for downstream summarization and reporting.
//!
//! ## Usage
//!
//! ```sh
//! news_ingest -j ./json
//! news_ingest -j ./json -c sources.yaml --days 3
//! ```
//!
//! Set `RUST_LOG=news_ingest=debug` to see every fetch and keep/drop decision.

use chrono::Utc;
use clap::Parser;
use news_ingest::cli::Cli;
use news_ingest::collector::Collector;
use news_ingest::config::CollectorConfig;
use news_ingest::outputs::json;
use news_ingest::utils::{ensure_writable_dir, truncate_for_log};
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("news_ingest starting up");

    // Parse CLI
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let mut config = match &args.config {
        Some(path) => CollectorConfig::load(path)?,
        None => CollectorConfig::default(),
    };
    args.apply(&mut config);
    config.validate()?;
    let sources = config.sources()?;
    info!(
        sources = sources.len(),
        days = config.days,
        timezone = %config.timezone,
        use_cache = config.use_cache,
        "Configuration loaded"
    );

    // Early check: ensure JSON output dir is writable
    if let Err(e) = ensure_writable_dir(&args.json_output_dir).await {
        error!(
            path = %args.json_output_dir,
            error = %e,
            "JSON output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    if config.use_cache {
        let cache_dir = config.cache_dir.to_string_lossy().into_owned();
        if let Err(e) = ensure_writable_dir(&cache_dir).await {
            warn!(path = %cache_dir, error = %e, "Cache directory is not writable; continuing without cache");
            config.use_cache = false;
        }
    }

    let collector = Collector::from_config(&config, Utc::now())?;
    let report = collector.collect(&sources).await;

    for source in &report.sources {
        info!(
            source = %source.name,
            kept = source.articles.len(),
            summary = %source.diagnostics.explain(),
            "Source summary"
        );
    }

    let path = json::write_report(&report, &args.json_output_dir).await?;

    if let Some(explanation) = report.explain_empty() {
        warn!(
            explanation = %truncate_for_log(&explanation, 2000),
            "Zero articles collected across all sources"
        );
    }

    info!(
        total_articles = report.total_articles(),
        path = %path.display(),
        elapsed_secs = start_time.elapsed().as_secs_f64(),
        "news_ingest finished"
    );

    Ok(())
}
