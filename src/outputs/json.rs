//! JSON hand-off file for downstream collaborators.
//!
//! Summarization, entity extraction, translation and report rendering all
//! read the collection from here.
//!
//! ```text
//! json_output_dir/
//! └── 2024-10-07/
//!     └── collection.json
//! ```
//!
//! The date directory is the last day of the collection window in the
//! reference timezone, so reruns for the same window overwrite one file.

use crate::collector::CollectionReport;
use std::error::Error;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, instrument};

pub const REPORT_FILE_NAME: &str = "collection.json";

/// Write `report` as pretty-printed JSON and return the file path.
#[instrument(level = "info", skip_all, fields(json_output_dir = %json_output_dir))]
pub async fn write_report(
    report: &CollectionReport,
    json_output_dir: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    let json = serde_json::to_string_pretty(report)?;

    let day = report.window.end.date_naive().format("%Y-%m-%d").to_string();
    let full_json_dir = Path::new(json_output_dir).join(day);

    info!(full_json_dir = %full_json_dir.display(), "Ensuring JSON directory exists");
    if let Err(e) = fs::create_dir_all(&full_json_dir).await {
        error!(full_json_dir = %full_json_dir.display(), error = %e, "Failed to create JSON dir");
        return Err(e.into());
    }

    let path = full_json_dir.join(REPORT_FILE_NAME);
    fs::write(&path, json).await?;
    info!(
        path = %path.display(),
        articles = report.total_articles(),
        "Wrote collection JSON"
    );

    Ok(path)
}
