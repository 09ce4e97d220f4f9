//! Shared utilities for the aggregation pipeline.
//!
//! Helpers for reading polars columns into plain Rust values, cleaning labels
//! and building date columns on the way back out.

use chrono::{Datelike, NaiveDate};
use polars::prelude::*;

// =============================================================================
// Data Type Utilities
// =============================================================================

/// Check if a DataType is numeric (integer or float).
#[inline]
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

// =============================================================================
// Label Utilities
// =============================================================================

/// Leading artifacts left by byte-order marks, either intact or decoded as Latin-1.
pub const BOM_ARTIFACTS: [&str; 2] = ["\u{feff}", "\u{ef}\u{bb}\u{bf}"];

/// Strip whitespace, control characters and BOM artifacts from a label.
///
/// # Example
///
/// ```rust,ignore
/// use series_processing::utils::clean_label;
///
/// assert_eq!(clean_label("\u{feff}REF_DATE "), "REF_DATE");
/// assert_eq!(clean_label("ï»¿REF_DATE"), "REF_DATE");
/// ```
pub fn clean_label(raw: &str) -> String {
    let is_noise = |c: char| c.is_whitespace() || c.is_control() || c == '\u{feff}';
    let mut label = raw.trim_matches(is_noise);

    while let Some(rest) = BOM_ARTIFACTS
        .iter()
        .find_map(|artifact| label.strip_prefix(artifact))
    {
        label = rest.trim_matches(is_noise);
    }

    label.to_string()
}

// =============================================================================
// String Parsing Utilities
// =============================================================================

/// Characters commonly used in numeric formatting that should be stripped.
pub const NUMERIC_FORMAT_CHARS: [char; 6] = [',', '$', '%', '€', '£', ' '];

/// Common missing-value markers, including the status symbols used by
/// statistical agencies ("..", "...", "x", "F").
pub const ERROR_MARKERS: [&str; 12] = [
    "error", "unknown", "n/a", "na", "null", "missing", "none", "#n/a", "nan", "..", "...", "x",
];

/// Clean a string for numeric parsing by removing formatting characters.
pub fn clean_numeric_string(s: &str) -> String {
    let mut result = s.trim().to_string();
    for c in NUMERIC_FORMAT_CHARS {
        result = result.replace(c, "");
    }
    result
}

/// Check if a string is a missing-value marker.
pub fn is_error_marker(s: &str) -> bool {
    let trimmed = s.trim();
    // "F" flags a suppressed estimate; lowercase "f" is not a marker
    if trimmed == "F" {
        return true;
    }
    let lower = trimmed.to_ascii_lowercase();
    ERROR_MARKERS.iter().any(|&marker| lower == marker)
}

/// Try to parse a string as a finite numeric value (f64).
///
/// Handles common formatting like currency symbols, percentages, and thousands
/// separators. Missing-value markers and NaN yield `None`.
pub fn parse_numeric_string(s: &str) -> Option<f64> {
    if is_error_marker(s) {
        return None;
    }
    let cleaned = clean_numeric_string(s);
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

// =============================================================================
// Series Extraction Utilities
// =============================================================================

/// Read any column as optional strings.
///
/// Non-string columns are cast first, so a `Date` column yields ISO dates.
pub fn column_strings(series: &Series) -> PolarsResult<Vec<Option<String>>> {
    let casted;
    let series = if series.dtype() == &DataType::String {
        series
    } else {
        casted = series.cast(&DataType::String)?;
        &casted
    };

    Ok(series
        .str()?
        .into_iter()
        .map(|opt| opt.map(str::to_string))
        .collect())
}

/// Read any column as optional finite floats.
///
/// Numeric columns are cast to `Float64`; text is parsed with
/// [`parse_numeric_string`]. NaN and unparseable text become `None`.
pub fn column_values(series: &Series) -> PolarsResult<Vec<Option<f64>>> {
    if is_numeric_dtype(series.dtype()) {
        let floats = series.cast(&DataType::Float64)?;
        return Ok(floats
            .f64()?
            .into_iter()
            .map(|opt| opt.filter(|v| v.is_finite()))
            .collect());
    }

    Ok(column_strings(series)?
        .into_iter()
        .map(|opt| opt.as_deref().and_then(parse_numeric_string))
        .collect())
}

// =============================================================================
// Date Utilities
// =============================================================================

/// Days between 0001-01-01 and 1970-01-01, the offset polars dates count from.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

/// Days since the Unix epoch, the physical representation of a polars `Date`.
pub fn days_since_epoch(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - EPOCH_DAYS_FROM_CE
}

/// Build a `Date` column from chrono dates.
pub fn date_column(name: &str, dates: &[NaiveDate]) -> PolarsResult<Column> {
    let days: Vec<i32> = dates.iter().copied().map(days_since_epoch).collect();
    let series = Series::new(name.into(), days).cast(&DataType::Date)?;
    Ok(Column::from(series))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_numeric_dtype() {
        assert!(is_numeric_dtype(&DataType::Int64));
        assert!(is_numeric_dtype(&DataType::Float64));
        assert!(!is_numeric_dtype(&DataType::String));
        assert!(!is_numeric_dtype(&DataType::Boolean));
    }

    #[test]
    fn test_clean_label() {
        assert_eq!(clean_label("  REF_DATE  "), "REF_DATE");
        assert_eq!(clean_label("\u{feff}REF_DATE"), "REF_DATE");
        assert_eq!(clean_label("ï»¿REF_DATE"), "REF_DATE");
        assert_eq!(clean_label("\tDiesel fuel\r\n"), "Diesel fuel");
        assert_eq!(clean_label("\u{feff}"), "");
    }

    #[test]
    fn test_clean_numeric_string() {
        assert_eq!(clean_numeric_string("$1,234.56"), "1234.56");
        assert_eq!(clean_numeric_string("  42%  "), "42");
        assert_eq!(clean_numeric_string("1 000"), "1000");
    }

    #[test]
    fn test_is_error_marker() {
        assert!(is_error_marker(".."));
        assert!(is_error_marker("x"));
        assert!(is_error_marker("F"));
        assert!(is_error_marker("  N/A  "));
        assert!(!is_error_marker("42"));
        assert!(!is_error_marker("f"));
    }

    #[test]
    fn test_parse_numeric_string() {
        assert_eq!(parse_numeric_string("42"), Some(42.0));
        assert_eq!(parse_numeric_string("$1,234.56"), Some(1234.56));
        assert_eq!(parse_numeric_string("-100"), Some(-100.0));
        assert_eq!(parse_numeric_string(""), None);
        assert_eq!(parse_numeric_string(".."), None);
        assert_eq!(parse_numeric_string("NaN"), None);
        assert_eq!(parse_numeric_string("hello"), None);
    }

    #[test]
    fn test_column_values_from_text() {
        let series = Series::new("VALUE".into(), &[Some("1.5"), Some(".."), None, Some("2,000")]);
        assert_eq!(
            column_values(&series).unwrap(),
            vec![Some(1.5), None, None, Some(2000.0)]
        );
    }

    #[test]
    fn test_column_values_from_numbers() {
        let series = Series::new("VALUE".into(), &[Some(1.0), Some(f64::NAN), None]);
        assert_eq!(column_values(&series).unwrap(), vec![Some(1.0), None, None]);

        let ints = Series::new("VALUE".into(), &[3i64, 4]);
        assert_eq!(column_values(&ints).unwrap(), vec![Some(3.0), Some(4.0)]);
    }

    #[test]
    fn test_days_since_epoch() {
        assert_eq!(days_since_epoch(NaiveDate::from_ymd_opt(1970, 1, 1).unwrap()), 0);
        assert_eq!(days_since_epoch(NaiveDate::from_ymd_opt(1970, 1, 2).unwrap()), 1);
        assert_eq!(days_since_epoch(NaiveDate::from_ymd_opt(1969, 12, 31).unwrap()), -1);
    }

    #[test]
    fn test_date_column_roundtrips_to_string() {
        let column = date_column("period", &[NaiveDate::from_ymd_opt(1997, 4, 1).unwrap()]).unwrap();
        assert_eq!(column.dtype(), &DataType::Date);
        let strings = column_strings(column.as_materialized_series()).unwrap();
        assert_eq!(strings, vec![Some("1997-04-01".to_string())]);
    }
}
