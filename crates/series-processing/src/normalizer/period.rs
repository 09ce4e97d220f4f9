//! Period label parsing and bucketing.
//!
//! Accepted labels:
//! - quarterly: `1997Q1`, `1997-Q1`, `1997 Q1`, `Q1 1997`
//! - daily or monthly: `1997-02-15`, `1997/02/15`, `1997-02`, optionally
//!   followed by a time part (`1997-02-15 00:00:00`, `1997-02-15T00:00`)

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::Granularity;
use crate::error::{PipelineError, Result};

static YEAR_QUARTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(\d{4})\s*[-/ ]?\s*Q([1-4])$").expect("valid regex"));

static QUARTER_YEAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^Q([1-4])\s*[-/ ]?\s*(\d{4})$").expect("valid regex"));

static CALENDAR_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})[-/](\d{1,2})(?:[-/](\d{1,2}))?(?:[ T].*)?$").expect("valid regex")
});

/// Parse a period label into the calendar date it denotes.
///
/// Quarterly labels map to the first day of the quarter; dates keep their day.
pub fn parse_period_date(label: &str) -> Option<NaiveDate> {
    let label = label.trim();

    if let Some(caps) = YEAR_QUARTER.captures(label) {
        return quarter_start(caps[1].parse().ok()?, caps[2].parse().ok()?);
    }

    if let Some(caps) = QUARTER_YEAR.captures(label) {
        return quarter_start(caps[2].parse().ok()?, caps[1].parse().ok()?);
    }

    let caps = CALENDAR_DATE.captures(label)?;
    let year: i32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let day: u32 = match caps.get(3) {
        Some(day) => day.as_str().parse().ok()?,
        None => 1,
    };
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Truncate a date to the first day of its bucket.
pub fn bucket_start(date: NaiveDate, granularity: Granularity) -> NaiveDate {
    let month = match granularity {
        Granularity::Quarter => (date.month0() / 3) * 3 + 1,
        Granularity::Month => date.month(),
    };
    NaiveDate::from_ymd_opt(date.year(), month, 1).unwrap_or(date)
}

/// Parse a period label straight to its bucket start.
pub fn parse_period(label: &str, granularity: Granularity) -> Result<NaiveDate> {
    parse_period_date(label)
        .map(|date| bucket_start(date, granularity))
        .ok_or_else(|| PipelineError::Parse {
            label: label.to_string(),
            granularity,
        })
}

fn quarter_start(year: i32, quarter: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, (quarter - 1) * 3 + 1, 1)
}
