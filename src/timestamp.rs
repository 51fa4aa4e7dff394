//! Datetime resolution across sensor timestamp conventions.
//!
//! Source files encode time three ways: a combined `date (year-mon-day)` +
//! `time (hour-min-sec)` column pair (the time segment sometimes
//! hyphen-delimited as `HH-MM-SS`), a single `simple date` column, or an
//! unlabeled column only a parse attempt can identify. Columns are
//! classified once per table, then the rules below run in priority order.
//!
//! This is a best-effort heuristic resolver, not a schema validator: the
//! generic fallback accepts the first column where enough rows parse, and
//! a false positive there is the accepted price of tolerating sensor
//! formats nobody has seen yet.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use tracing::debug;

use crate::constants::{
    COMBINED_DATETIME_FORMAT, DATETIME_COLUMN, FALLBACK_DATETIME_FORMATS, FALLBACK_DATE_FORMATS,
    GENERIC_PARSE_THRESHOLD,
};
use crate::error::Result;
use crate::models::{ColumnClass, classify_column};

/// Resolve the timestamp series for a table.
///
/// Returns a millisecond-UTC "datetime" series with one entry per input
/// row; rows that failed to parse are null. An all-null result means no
/// usable timestamp source exists and the caller should drop the table.
///
/// Priority: combined DateLike + TimeLike pair with the explicit
/// `%Y-%m-%d %H:%M:%S` format, then a SimpleDateLike column through the
/// generic parser, then the first column of any kind where at least
/// [`GENERIC_PARSE_THRESHOLD`] of the non-empty rows parse.
pub fn resolve_datetime(df: &DataFrame) -> Result<Series> {
    let height = df.height();
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();

    let mut date_col: Option<&str> = None;
    let mut time_col: Option<&str> = None;
    let mut simple_date_col: Option<&str> = None;
    for name in &names {
        match classify_column(name) {
            ColumnClass::DateLike if date_col.is_none() => date_col = Some(name),
            ColumnClass::TimeLike if time_col.is_none() => time_col = Some(name),
            ColumnClass::SimpleDateLike if simple_date_col.is_none() => {
                simple_date_col = Some(name)
            }
            _ => {}
        }
    }

    if let (Some(date), Some(time)) = (date_col, time_col) {
        debug!("Resolving datetime from combined columns '{}' + '{}'", date, time);
        let dates = string_values(df.column(date)?)?;
        let times = string_values(df.column(time)?)?;
        let values: Vec<Option<i64>> = dates
            .into_iter()
            .zip(&times)
            .map(|(d, t)| match (d, t) {
                (Some(d), Some(t)) => parse_combined(d, t),
                _ => None,
            })
            .collect();
        return Ok(millis_to_datetime_series(DATETIME_COLUMN, values)?);
    }

    if let Some(simple) = simple_date_col {
        debug!("Resolving datetime from simple date column '{}'", simple);
        let values = parse_column_generic(df.column(simple)?)?;
        return Ok(millis_to_datetime_series(DATETIME_COLUMN, values)?);
    }

    for name in &names {
        let values = parse_column_generic(df.column(name.as_str())?)?;
        let non_empty = non_empty_count(df.column(name.as_str())?)?;
        let parsed = values.iter().filter(|v| v.is_some()).count();
        if non_empty > 0 && parsed as f64 >= GENERIC_PARSE_THRESHOLD * non_empty as f64 {
            debug!(
                "Resolving datetime from fallback column '{}' ({}/{} rows parsed)",
                name, parsed, non_empty
            );
            return Ok(millis_to_datetime_series(DATETIME_COLUMN, values)?);
        }
    }

    Ok(millis_to_datetime_series(
        DATETIME_COLUMN,
        vec![None; height],
    )?)
}

/// Parse a single timestamp value with the generic format chain:
/// RFC 3339, the known datetime layouts, then bare dates at midnight UTC.
/// Returns epoch milliseconds.
pub fn parse_any_datetime(raw: &str) -> Option<i64> {
    let value = raw.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.timestamp_millis());
    }

    for format in FALLBACK_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt.and_utc().timestamp_millis());
        }
    }

    for format in FALLBACK_DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(value, format) {
            let midnight = date.and_hms_opt(0, 0, 0)?;
            return Some(midnight.and_utc().timestamp_millis());
        }
    }

    None
}

/// Build a millisecond-UTC datetime series from parsed epoch values
pub fn millis_to_datetime_series(name: &str, values: Vec<Option<i64>>) -> PolarsResult<Series> {
    let ca = Int64Chunked::from_iter_options(name.into(), values.into_iter());
    ca.into_series()
        .cast(&DataType::Datetime(TimeUnit::Milliseconds, None))
}

/// Combined date + time: hyphens in the time segment become colons before
/// the explicit-format parse.
fn parse_combined(date: &str, time: &str) -> Option<i64> {
    let combined = format!("{} {}", date.trim(), time.trim().replace('-', ":"));
    NaiveDateTime::parse_from_str(&combined, COMBINED_DATETIME_FORMAT)
        .ok()
        .map(|dt| dt.and_utc().timestamp_millis())
}

fn parse_column_generic(col: &Column) -> PolarsResult<Vec<Option<i64>>> {
    let values = string_values(col)?;
    Ok(values
        .into_iter()
        .map(|v| v.and_then(parse_any_datetime))
        .collect())
}

fn non_empty_count(col: &Column) -> PolarsResult<usize> {
    let values = string_values(col)?;
    Ok(values
        .iter()
        .filter(|v| v.map(|s| !s.trim().is_empty()).unwrap_or(false))
        .count())
}

/// View any column as string values, casting when the source was not
/// already read as strings.
fn string_values(col: &Column) -> PolarsResult<StringChunked> {
    Ok(col.cast(&DataType::String)?.str()?.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn millis(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> i64 {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
            .and_utc()
            .timestamp_millis()
    }

    fn as_millis(series: &Series) -> Vec<Option<i64>> {
        series
            .cast(&DataType::Int64)
            .unwrap()
            .i64()
            .unwrap()
            .into_iter()
            .collect()
    }

    #[test]
    fn test_combined_date_time_with_hyphenated_time() {
        let df = df!(
            "date (year-mon-day)" => &["2025-06-06", "2025-06-06"],
            "time (hour-min-sec)" => &["11-00-00", "11:00:05"],
            "drssi" => &["-91.2", "-90.8"],
        )
        .unwrap();

        let series = resolve_datetime(&df).unwrap();
        assert_eq!(
            as_millis(&series),
            vec![
                Some(millis(2025, 6, 6, 11, 0, 0)),
                Some(millis(2025, 6, 6, 11, 0, 5)),
            ]
        );
    }

    #[test]
    fn test_combined_unparseable_rows_become_null() {
        let df = df!(
            "date (year-mon-day)" => &["2025-06-06", "June sixth"],
            "time (hour-min-sec)" => &["11-00-00", "11-00-05"],
        )
        .unwrap();

        let series = resolve_datetime(&df).unwrap();
        let values = as_millis(&series);
        assert_eq!(values[0], Some(millis(2025, 6, 6, 11, 0, 0)));
        assert_eq!(values[1], None);
    }

    #[test]
    fn test_simple_date_column() {
        let df = df!(
            "simple date" => &["2025-06-06 11:00:00", "2025-06-07"],
            "value" => &["1", "2"],
        )
        .unwrap();

        let series = resolve_datetime(&df).unwrap();
        assert_eq!(
            as_millis(&series),
            vec![
                Some(millis(2025, 6, 6, 11, 0, 0)),
                Some(millis(2025, 6, 7, 0, 0, 0)),
            ]
        );
    }

    #[test]
    fn test_generic_fallback_accepts_first_parseable_column() {
        let df = df!(
            "reading" => &["40.1", "41.3", "39.8", "40.0", "40.2"],
            "stamp" => &[
                "2025-06-06T11:00:00",
                "2025-06-06T11:00:05",
                "2025-06-06T11:00:10",
                "bad",
                "2025-06-06T11:00:20",
            ],
        )
        .unwrap();

        let series = resolve_datetime(&df).unwrap();
        let values = as_millis(&series);
        // "reading" fails the threshold, "stamp" passes at 4/5
        assert_eq!(values[0], Some(millis(2025, 6, 6, 11, 0, 0)));
        assert_eq!(values[3], None);
        assert_eq!(values[4], Some(millis(2025, 6, 6, 11, 0, 20)));
    }

    #[test]
    fn test_generic_fallback_threshold_counts_non_empty_rows() {
        // 2 parseable of 2 non-empty passes even with empty rows present
        let df = df!(
            "stamp" => &["2025-06-06 11:00:00", "", "2025-06-06 11:00:05", ""],
        )
        .unwrap();

        let series = resolve_datetime(&df).unwrap();
        let values = as_millis(&series);
        assert_eq!(values[0], Some(millis(2025, 6, 6, 11, 0, 0)));
        assert_eq!(values[1], None);
        assert_eq!(values[2], Some(millis(2025, 6, 6, 11, 0, 5)));
    }

    #[test]
    fn test_unresolvable_table_yields_all_null() {
        let df = df!(
            "a" => &["x", "y"],
            "b" => &["1e", "2f"],
        )
        .unwrap();

        let series = resolve_datetime(&df).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.null_count(), 2);
    }

    #[test]
    fn test_parse_any_datetime_formats() {
        assert_eq!(
            parse_any_datetime("2025-06-06 11:00:00"),
            Some(millis(2025, 6, 6, 11, 0, 0))
        );
        assert_eq!(
            parse_any_datetime("2025-06-06T11:00:00"),
            Some(millis(2025, 6, 6, 11, 0, 0))
        );
        // RFC 3339 offset converts to UTC
        assert_eq!(
            parse_any_datetime("2025-06-06T11:00:00+01:00"),
            Some(millis(2025, 6, 6, 10, 0, 0))
        );
        assert_eq!(
            parse_any_datetime("06/15/2025"),
            Some(millis(2025, 6, 15, 0, 0, 0))
        );
        assert_eq!(parse_any_datetime(""), None);
        assert_eq!(parse_any_datetime("not a date"), None);
    }
}
