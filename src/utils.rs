//! Small text and filesystem helpers shared across the crate.
//!
//! - Whitespace collapsing and excerpt bounding for article fields
//! - String truncation for log lines
//! - Directory validation for the cache and output directories

use std::error::Error;
use std::fs as stdfs;
use tokio::fs;
use tracing::{info, instrument};

/// Maximum length of an [`Article`](crate::models::Article) excerpt, in characters.
pub const EXCERPT_MAX_CHARS: usize = 300;

/// Collapse every run of whitespace to a single space and trim the ends.
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Bound an excerpt to `max` characters.
///
/// Whitespace is collapsed first. Text that still exceeds `max` is cut to
/// `max - 3` characters, trailing whitespace removed, and `"..."` appended,
/// so the result never exceeds `max` characters.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(bound_excerpt("  a   b ", 300), "a b");
/// assert_eq!(bound_excerpt("abcdefgh", 6), "abc...");
/// ```
pub fn bound_excerpt(text: &str, max: usize) -> String {
    let compact = collapse_whitespace(text);
    if compact.chars().count() <= max {
        return compact;
    }
    let keep = max.saturating_sub(3);
    let cut: String = compact.chars().take(keep).collect();
    format!("{}...", cut.trim_end())
}

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to `max` bytes (backed off to a char boundary)
/// with an ellipsis and byte count indicator appended.
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…(+{} bytes)", &s[..end], s.len() - end)
}

/// Ensure a directory exists and is writable.
///
/// This function creates the directory if it doesn't exist, then performs
/// a write test by creating and immediately deleting a probe file.
///
/// # Errors
///
/// Returns an error if:
/// - The directory cannot be created
/// - The directory is not writable (permission denied, read-only filesystem, etc.)
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn ensure_writable_dir(path: &str) -> Result<(), Box<dyn Error>> {
    if let Err(e) = fs::create_dir_all(path).await {
        return Err(Box::new(e));
    }
    let probe_path = format!("{}/..__probe_write__", path.trim_end_matches('/'));
    match stdfs::File::create(&probe_path) {
        Ok(_) => {
            let _ = stdfs::remove_file(&probe_path);
            info!("Directory is writable");
            Ok(())
        }
        Err(e) => Err(Box::new(e)),
    }
}
