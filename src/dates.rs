//! Date normalization and the collection window.
//!
//! Publishers express dates in every format imaginable: RFC 2822 in feeds,
//! ISO 8601 in `<meta>` tags and JSON-LD, and free-form human dates on
//! listing pages. [`DateNormalizer`] folds all of them into one instant in a
//! fixed reference timezone so that window checks compare like with like.
//!
//! # Parse order
//!
//! 1. RFC 2822 (`Tue, 01 Oct 2024 09:00:00 GMT`)
//! 2. ISO 8601 with offset or `Z`, then naive ISO 8601
//! 3. Human formats: `YYYY-MM-DD`, `D Month YYYY`, `Month D, YYYY`,
//!    `YYYY/MM/DD`, `DD/MM/YYYY`, `YYYY-MM-DD HH:MM:SS`
//!
//! Values without a timezone are taken to be in the reference timezone.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone};
use chrono_tz::Tz;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

static ORDINAL_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(\d{1,2})(st|nd|rd|th)\b").expect("static regex"));

const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M:%S%:z",
];

const NAIVE_ISO_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

const HUMAN_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d %B %Y", "%B %d, %Y", "%Y/%m/%d", "%d/%m/%Y"];

const HUMAN_DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S"];

/// Parses free-form date text into the reference timezone.
#[derive(Debug, Clone, Copy)]
pub struct DateNormalizer {
    tz: Tz,
}

impl DateNormalizer {
    pub fn new(tz: Tz) -> Self {
        Self { tz }
    }

    /// The reference timezone every parsed value is converted into.
    pub fn timezone(&self) -> Tz {
        self.tz
    }

    /// Parse `raw` into an instant in the reference timezone.
    ///
    /// Returns `None` for empty or unrecognized input; absence is a normal
    /// outcome, not an error.
    pub fn parse(&self, raw: &str) -> Option<DateTime<Tz>> {
        let text = raw.trim();
        if text.is_empty() {
            return None;
        }

        if let Ok(dt) = DateTime::parse_from_rfc2822(text) {
            return Some(dt.with_timezone(&self.tz));
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
            return Some(dt.with_timezone(&self.tz));
        }
        for fmt in OFFSET_FORMATS {
            if let Ok(dt) = DateTime::parse_from_str(text, fmt) {
                return Some(dt.with_timezone(&self.tz));
            }
        }
        for fmt in NAIVE_ISO_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
                return Some(self.localize(naive));
            }
        }

        let cleaned = ORDINAL_SUFFIX.replace_all(text, "$1");
        for fmt in HUMAN_DATE_FORMATS {
            if let Ok(date) = NaiveDate::parse_from_str(&cleaned, fmt) {
                return Some(self.localize(date.and_time(NaiveTime::MIN)));
            }
        }
        for fmt in HUMAN_DATETIME_FORMATS {
            if let Ok(naive) = NaiveDateTime::parse_from_str(&cleaned, fmt) {
                return Some(self.localize(naive));
            }
        }

        tracing::trace!(raw = %text, "Unrecognized date format");
        None
    }

    /// Interpret a wall-clock time in the reference timezone.
    ///
    /// Ambiguous times (DST fall-back) take the earlier instant; times that
    /// do not exist (DST spring-forward) are read as UTC.
    pub fn localize(&self, naive: NaiveDateTime) -> DateTime<Tz> {
        self.tz
            .from_local_datetime(&naive)
            .earliest()
            .unwrap_or_else(|| self.tz.from_utc_datetime(&naive))
    }
}

/// How a dated (or undated) item relates to the collection window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowVerdict {
    InRange,
    OutOfRange,
    MissingDate,
}

/// Longest look-back a window may span, about a century.
pub const MAX_WINDOW_DAYS: u32 = 36_500;

/// Inclusive instant range an article's date must fall within.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateWindow {
    pub start: DateTime<Tz>,
    pub end: DateTime<Tz>,
}

impl DateWindow {
    pub fn new(start: DateTime<Tz>, end: DateTime<Tz>) -> Self {
        Self { start, end }
    }

    /// The last `days` calendar days ending at `now`.
    ///
    /// The window starts at local midnight of `now - (days - 1)` and ends at
    /// `now`, so `days = 1` means "today so far". `days` is clamped to
    /// `1..=MAX_WINDOW_DAYS`.
    pub fn last_days(days: u32, now: DateTime<Tz>) -> Self {
        let tz = now.timezone();
        let back = i64::from(days.clamp(1, MAX_WINDOW_DAYS) - 1);
        let first_day = now
            .checked_sub_signed(Duration::days(back))
            .unwrap_or(now)
            .date_naive();
        let start = DateNormalizer::new(tz).localize(first_day.and_time(NaiveTime::MIN));
        Self { start, end: now }
    }

    pub fn contains(&self, instant: &DateTime<Tz>) -> bool {
        self.start <= *instant && *instant <= self.end
    }

    pub fn verdict(&self, date: Option<&DateTime<Tz>>) -> WindowVerdict {
        match date {
            None => WindowVerdict::MissingDate,
            Some(d) if self.contains(d) => WindowVerdict::InRange,
            Some(_) => WindowVerdict::OutOfRange,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use chrono_tz::Europe::London;

    fn normalizer() -> DateNormalizer {
        DateNormalizer::new(London)
    }

    #[test]
    fn test_parse_rfc2822() {
        let dt = normalizer().parse("Tue, 01 Oct 2024 09:00:00 GMT").unwrap();
        // BST is UTC+1 in October.
        assert_eq!(dt.hour(), 10);
        assert_eq!(dt.timezone(), London);
    }

    #[test]
    fn test_parse_iso_with_z() {
        let dt = normalizer().parse("2024-01-15T12:30:00Z").unwrap();
        assert_eq!(dt.hour(), 12);
        assert_eq!(dt.minute(), 30);
    }

    #[test]
    fn test_same_instant_in_two_formats_converges() {
        let n = normalizer();
        let a = n.parse("Tue, 01 Oct 2024 09:00:00 GMT").unwrap();
        let b = n.parse("2024-10-01T11:00:00+02:00").unwrap();
        let c = n.parse("2024-10-01 10:00:00").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn test_naive_value_assumed_reference_timezone() {
        let dt = normalizer().parse("2024-07-01T08:00:00").unwrap();
        assert_eq!(dt.hour(), 8);
        assert_eq!(dt.naive_utc().hour(), 7);
    }

    #[test]
    fn test_human_formats() {
        let n = normalizer();
        let expected = n.parse("2024-03-05").unwrap();
        for raw in [
            "5 March 2024",
            "March 5, 2024",
            "Mar 5, 2024",
            "2024/03/05",
            "05/03/2024",
            "5th March 2024",
        ] {
            assert_eq!(n.parse(raw), Some(expected), "format {raw:?}");
        }
        assert_eq!(expected.hour(), 0);
    }

    #[test]
    fn test_unparsable_and_empty_are_absent() {
        let n = normalizer();
        assert_eq!(n.parse(""), None);
        assert_eq!(n.parse("   "), None);
        assert_eq!(n.parse("yesterday-ish"), None);
        assert_eq!(n.parse("2024-13-45"), None);
    }

    #[test]
    fn test_dst_gap_does_not_panic() {
        // 01:30 on the spring-forward day does not exist in London.
        let dt = normalizer().parse("2024-03-31 01:30:00");
        assert!(dt.is_some());
    }

    #[test]
    fn test_window_inclusive_boundaries() {
        let n = normalizer();
        let start = n.parse("2024-10-01T00:00:00").unwrap();
        let end = n.parse("2024-10-07T23:59:59").unwrap();
        let window = DateWindow::new(start, end);

        assert!(window.contains(&start));
        assert!(window.contains(&end));
        assert!(!window.contains(&(start - Duration::seconds(1))));
        assert!(!window.contains(&(end + Duration::seconds(1))));
    }

    #[test]
    fn test_window_verdicts() {
        let n = normalizer();
        let window = DateWindow::new(
            n.parse("2024-10-01").unwrap(),
            n.parse("2024-10-07").unwrap(),
        );
        let inside = n.parse("2024-10-03").unwrap();
        let outside = n.parse("2024-09-03").unwrap();
        assert_eq!(window.verdict(Some(&inside)), WindowVerdict::InRange);
        assert_eq!(window.verdict(Some(&outside)), WindowVerdict::OutOfRange);
        assert_eq!(window.verdict(None), WindowVerdict::MissingDate);
    }

    #[test]
    fn test_last_days_starts_at_midnight() {
        let n = normalizer();
        let now = n.parse("2024-10-07T15:45:00").unwrap();
        let window = DateWindow::last_days(7, now);
        assert_eq!(window.start, n.parse("2024-10-01T00:00:00").unwrap());
        assert_eq!(window.end, now);

        let today = DateWindow::last_days(1, now);
        assert_eq!(today.start, n.parse("2024-10-07").unwrap());
    }

    #[test]
    fn test_last_days_clamps_huge_look_back() {
        let n = normalizer();
        let now = n.parse("2024-10-07T15:45:00").unwrap();
        let huge = DateWindow::last_days(u32::MAX, now);
        let century = DateWindow::last_days(MAX_WINDOW_DAYS, now);
        assert_eq!(huge.start, century.start);
        assert!(huge.start < now);
    }
}
