//! Time-aligned merging of independently-sampled series.
//!
//! The core operation is an asof join: for each left row, find the right
//! row whose timestamp falls within a tolerance window, in the requested
//! direction. Unmatched left rows survive with nulls in the right-side
//! columns; dropping them is a separate, explicit step so callers decide
//! what "missing" means. N-way merges run pairwise, left-accumulating,
//! with `_df<n>` collision suffixes that a coalescing pass collapses
//! afterwards.
//!
//! The pairing itself is a two-pointer scan over both sorted timestamp
//! sequences producing take-indices into the right frame. Both inputs
//! are sorted here; the engine never assumes pre-sorted input.

use std::collections::BTreeMap;

use chrono::Duration;
use polars::prelude::*;
use regex::Regex;
use tracing::debug;

use crate::constants::{DATETIME_COLUMN, MIN_ALIGNED_ROWS, merge_suffix};
use crate::error::{AlignerError, Result};
use crate::header::normalize_header;
use crate::loader::DataLoader;
use crate::models::{MergeDirection, NormalizedTable};
use crate::timestamp::millis_to_datetime_series;

/// One series request for [`build_timeseries`]: which stored tables to
/// pull and which column to project out of them.
#[derive(Debug, Clone)]
pub struct TimeseriesSelection {
    pub category: String,
    pub instance: Option<i64>,
    pub special: String,
    pub column: String,
}

impl TimeseriesSelection {
    /// Column label carried into the merged output frame
    pub fn output_label(&self) -> String {
        format!("{}::{}::{}", self.category, self.column, self.special)
    }
}

/// Sort a frame ascending by its datetime column
pub fn sort_by_datetime(df: &DataFrame) -> Result<DataFrame> {
    Ok(df.sort([DATETIME_COLUMN], SortMultipleOptions::default())?)
}

/// Keep the first row per distinct datetime, preserving order
pub fn dedup_datetimes(df: &DataFrame) -> Result<DataFrame> {
    let timestamps = datetime_millis(df)?;
    let mut seen = std::collections::BTreeSet::new();
    let mut keep = Vec::with_capacity(timestamps.len());
    for (i, ts) in timestamps.iter().enumerate() {
        match ts {
            Some(value) => {
                if seen.insert(*value) {
                    keep.push(i as IdxSize);
                }
            }
            None => keep.push(i as IdxSize),
        }
    }
    let indices = IdxCa::from_vec("idx".into(), keep);
    Ok(df.take(&indices)?)
}

/// Asof-join `right` onto `left` within `tolerance`.
///
/// Right-side columns colliding with left names get a `_y` suffix; use
/// [`merge_many`] for the `_df<n>` suffix chain. Every left row appears
/// exactly once in the output.
pub fn merge_asof(
    left: &DataFrame,
    right: &DataFrame,
    tolerance: Duration,
    direction: MergeDirection,
) -> Result<DataFrame> {
    merge_asof_suffixed(left, right, tolerance, direction, "_y")
}

/// Asof-join with an explicit collision suffix for right-side columns
pub fn merge_asof_suffixed(
    left: &DataFrame,
    right: &DataFrame,
    tolerance: Duration,
    direction: MergeDirection,
    suffix: &str,
) -> Result<DataFrame> {
    let left = sort_by_datetime(left)?;
    let right = sort_by_datetime(right)?;

    let left_ts = datetime_millis(&left)?;
    let right_ts = datetime_millis(&right)?;
    let matches = pair_indices(&left_ts, &right_ts, tolerance.num_milliseconds(), direction);

    let indices = IdxCa::from_iter_options("idx".into(), matches.into_iter());
    let taken = right.take(&indices)?;

    let mut merged = left.clone();
    for column in taken.get_columns() {
        let name = column.name().as_str();
        if name == DATETIME_COLUMN {
            continue;
        }
        let mut column = column.clone();
        if merged.get_column_names().iter().any(|c| c.as_str() == name) {
            column.rename(format!("{}{}", name, suffix).into());
        }
        merged.with_column(column)?;
    }
    Ok(merged)
}

/// Merge a list of frames pairwise, left-accumulating, suffixing the
/// Nth frame's collisions with `_df<n>` (n counted from 2 as in the
/// merge chain's second input).
pub fn merge_many(
    frames: &[DataFrame],
    tolerance: Duration,
    direction: MergeDirection,
) -> Result<DataFrame> {
    let Some(first) = frames.first() else {
        return Err(AlignerError::MergeFailed {
            reason: "no input frames to merge".to_string(),
        });
    };

    let mut merged = sort_by_datetime(first)?;
    for (idx, frame) in frames.iter().enumerate().skip(1) {
        let before = merged.height();
        merged = merge_asof_suffixed(&merged, frame, tolerance, direction, &merge_suffix(idx + 1))?;
        debug!(
            "Merged frame {} of {}: {} -> {} rows",
            idx + 1,
            frames.len(),
            before,
            merged.height()
        );
    }
    Ok(merged)
}

/// Collapse suffix-duplicated columns into one canonical column each.
///
/// Column names are grouped by base name with a collision suffix (`_x`,
/// `_y`, `_z`, or `_df<n>`) stripped. Every group with more than one
/// member becomes a single column named after the base, taking the first
/// non-null value per row with earlier-added columns preferred, and the
/// suffixed originals are dropped.
pub fn coalesce_columns(df: &DataFrame) -> Result<DataFrame> {
    let suffix_re = Regex::new(r"^(.*?)(?:_[xyz]|_df\d+)?$").expect("valid suffix pattern");

    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .map(|n| n.to_string())
        .collect();

    // Group columns by base name, preserving first-seen order
    let mut order: Vec<String> = Vec::new();
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for name in &names {
        let base = suffix_re
            .captures(name)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_else(|| name.clone());
        if !groups.contains_key(&base) {
            order.push(base.clone());
        }
        groups.entry(base).or_default().push(name.clone());
    }

    let mut columns: Vec<Column> = Vec::with_capacity(order.len());
    for base in &order {
        let members = &groups[base];
        if members.len() == 1 {
            columns.push(df.column(&members[0])?.clone());
            continue;
        }

        debug!("Coalescing {:?} into '{}'", members, base);
        let mut acc = df.column(&members[0])?.as_materialized_series().clone();
        for member in &members[1..] {
            let other = df
                .column(member)?
                .as_materialized_series()
                .cast(&acc.dtype().clone())?;
            acc = acc.zip_with(&acc.is_not_null(), &other)?;
        }
        acc.rename(base.as_str().into());
        columns.push(acc.into_column());
    }

    Ok(DataFrame::new(columns)?)
}

/// Coerce the named columns to Float64, unparseable entries becoming
/// null. Columns absent from the frame are ignored.
pub fn coerce_numeric(df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
    let mut out = df.clone();
    for name in columns {
        if df.column(name).is_err() {
            continue;
        }
        let series = numeric_values(df.column(name)?)?;
        out.with_column(series)?;
    }
    Ok(out)
}

/// Drop rows null in any of the named columns (absent names ignored)
pub fn drop_null_rows(df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
    let mut mask = BooleanChunked::full("mask".into(), true, df.height());
    for name in columns {
        if let Ok(column) = df.column(name) {
            mask = &mask & &column.as_materialized_series().is_not_null();
        }
    }
    Ok(df.filter(&mask)?)
}

/// Build the aligned frame consumed by training and correlation callers.
///
/// Each input table is slimmed to its datetime plus whichever required
/// columns it carries, deduplicated and sorted, then the slims are
/// merged pairwise and coalesced. Every required column must appear in
/// the merged frame; the rest are coerced to numeric and rows null in
/// any of them are dropped. Fewer than [`MIN_ALIGNED_ROWS`] surviving
/// rows is an error.
pub fn build_aligned_frame(
    tables: &[&NormalizedTable],
    required_columns: &[String],
    tolerance: Duration,
    direction: MergeDirection,
) -> Result<DataFrame> {
    let required: Vec<String> = required_columns
        .iter()
        .map(|c| normalize_header(c))
        .collect();

    let mut slims = Vec::new();
    for table in tables {
        let matched: Vec<String> = table
            .columns()
            .into_iter()
            .filter(|col| col != DATETIME_COLUMN && required.contains(col))
            .collect();
        if matched.is_empty() {
            continue;
        }

        let mut selection = vec![DATETIME_COLUMN.to_string()];
        selection.extend(matched);
        let slim = table.frame.select(selection)?;
        slims.push(sort_by_datetime(&dedup_datetimes(&slim)?)?);
    }

    if slims.is_empty() {
        return Err(AlignerError::MergeFailed {
            reason: "no loaded tables carry the requested columns".to_string(),
        });
    }

    let merged = merge_many(&slims, tolerance, direction)?;
    let merged = coalesce_columns(&merged)?;

    let missing: Vec<&str> = required
        .iter()
        .filter(|name| merged.column(name).is_err())
        .map(|name| name.as_str())
        .collect();
    if !missing.is_empty() {
        return Err(AlignerError::MergeFailed {
            reason: format!(
                "requested column(s) absent from every loaded table: {}",
                missing.join(", ")
            ),
        });
    }

    let merged = coerce_numeric(&merged, &required)?;
    let merged = drop_null_rows(&merged, &required)?;

    if merged.height() < MIN_ALIGNED_ROWS {
        return Err(AlignerError::InsufficientAlignedData {
            rows: merged.height(),
            needed: MIN_ALIGNED_ROWS,
        });
    }
    Ok(merged)
}

/// Assemble a plotting frame from store selections.
///
/// Each selection pulls every stored table under its category, instance,
/// and special value that carries the column, projects it to
/// `(datetime, value)` under the `category::column::special` label, and
/// the projections are joined full-outer on exact datetime. Values are
/// coerced to numeric (the plotting contract is numeric series). No
/// projection matched anything → `Ok(None)`.
pub fn build_timeseries(
    loader: &DataLoader,
    selections: &[TimeseriesSelection],
) -> Result<Option<DataFrame>> {
    // label -> (datetime millis -> value); first value per timestamp wins
    let mut series: Vec<(String, BTreeMap<i64, f64>)> = Vec::new();

    for selection in selections {
        let label = selection.output_label();
        let mut values: BTreeMap<i64, f64> = BTreeMap::new();

        for key in loader.keys_for(&selection.category, selection.instance) {
            if key.special.as_str() != selection.special {
                continue;
            }
            let Some(tables) = loader.tables(key) else {
                continue;
            };
            for table in tables {
                let Some(projection) = table.select_with_datetime(&selection.column) else {
                    continue;
                };
                let timestamps = datetime_millis(&projection)?;
                let column = projection.get_columns().last().ok_or_else(|| {
                    AlignerError::MergeFailed {
                        reason: format!("empty projection for '{}'", label),
                    }
                })?;
                let numeric = numeric_values(column)?;
                for (ts, value) in timestamps.iter().zip(numeric.f64()?.into_iter()) {
                    if let (Some(ts), Some(value)) = (ts, value) {
                        values.entry(*ts).or_insert(value);
                    }
                }
            }
        }

        if !values.is_empty() {
            series.push((label, values));
        }
    }

    if series.is_empty() {
        return Ok(None);
    }

    // Full outer join on exact datetime: union of all timestamps
    let mut union: std::collections::BTreeSet<i64> = std::collections::BTreeSet::new();
    for (_, values) in &series {
        union.extend(values.keys());
    }
    let timestamps: Vec<i64> = union.into_iter().collect();

    let datetime =
        millis_to_datetime_series(DATETIME_COLUMN, timestamps.iter().map(|ts| Some(*ts)).collect())?;
    let mut columns = vec![datetime.into_column()];
    for (label, values) in &series {
        let ca = Float64Chunked::from_iter_options(
            label.as_str().into(),
            timestamps.iter().map(|ts| values.get(ts).copied()),
        );
        columns.push(ca.into_series().into_column());
    }

    Ok(Some(DataFrame::new(columns)?))
}

/// Filter a timeseries frame to a closed time range and resample it into
/// fixed buckets, taking the per-bucket mean of each value column.
/// Bucket timestamps are floored to the bucket width; rows null in any
/// selected column are dropped before aggregation.
pub fn filter_and_aggregate(
    df: &DataFrame,
    columns: &[String],
    range: (i64, i64),
    bucket: Duration,
) -> Result<DataFrame> {
    let bucket_ms = bucket.num_milliseconds();
    if bucket_ms <= 0 {
        return Err(AlignerError::MergeFailed {
            reason: "aggregation bucket must be positive".to_string(),
        });
    }

    let mut selection = vec![DATETIME_COLUMN.to_string()];
    selection.extend(columns.iter().cloned());
    let selected = df.select(selection)?;
    let selected = coerce_numeric(&selected, columns)?;
    let selected = drop_null_rows(&selected, columns)?;

    let timestamps = datetime_millis(&selected)?;
    let (start, end) = range;

    // bucket start -> per-column (sum, count)
    let mut buckets: BTreeMap<i64, Vec<(f64, u64)>> = BTreeMap::new();
    let value_columns: Vec<&Column> = columns
        .iter()
        .filter_map(|name| selected.column(name).ok())
        .collect();
    let numeric: Vec<Float64Chunked> = value_columns
        .iter()
        .map(|col| Ok(numeric_values(col)?.f64()?.clone()))
        .collect::<Result<_>>()?;

    for (row, ts) in timestamps.iter().enumerate() {
        let Some(ts) = ts else { continue };
        if *ts < start || *ts > end {
            continue;
        }
        let floored = ts - ts.rem_euclid(bucket_ms);
        let entry = buckets
            .entry(floored)
            .or_insert_with(|| vec![(0.0, 0); numeric.len()]);
        for (slot, ca) in entry.iter_mut().zip(&numeric) {
            if let Some(value) = ca.get(row) {
                slot.0 += value;
                slot.1 += 1;
            }
        }
    }

    let bucket_starts: Vec<i64> = buckets.keys().copied().collect();
    let datetime = millis_to_datetime_series(
        DATETIME_COLUMN,
        bucket_starts.iter().map(|ts| Some(*ts)).collect(),
    )?;
    let mut out = vec![datetime.into_column()];
    for (i, name) in columns.iter().enumerate() {
        let ca = Float64Chunked::from_iter_options(
            name.as_str().into(),
            bucket_starts.iter().map(|ts| {
                let (sum, count) = buckets[ts][i];
                (count > 0).then(|| sum / count as f64)
            }),
        );
        out.push(ca.into_series().into_column());
    }

    Ok(DataFrame::new(out)?)
}

/// Datetime column of a frame as epoch milliseconds
fn datetime_millis(df: &DataFrame) -> Result<Vec<Option<i64>>> {
    let column = df.column(DATETIME_COLUMN)?;
    let cast = column.as_materialized_series().cast(&DataType::Int64)?;
    Ok(cast.i64()?.into_iter().collect())
}

/// A column's values as Float64, unparseable entries null
fn numeric_values(column: &Column) -> Result<Series> {
    let series = column.as_materialized_series();
    if series.dtype().is_primitive_numeric() {
        return Ok(series.cast(&DataType::Float64)?);
    }
    let strings = series.cast(&DataType::String)?;
    let ca = Float64Chunked::from_iter_options(
        series.name().clone(),
        strings
            .str()?
            .into_iter()
            .map(|v| v.and_then(|s| s.trim().parse::<f64>().ok())),
    );
    Ok(ca.into_series())
}

/// Two-pointer asof pairing: for each left timestamp, the index of the
/// right row within tolerance per the direction, or None.
fn pair_indices(
    left_ts: &[Option<i64>],
    right_ts: &[Option<i64>],
    tolerance_ms: i64,
    direction: MergeDirection,
) -> Vec<Option<IdxSize>> {
    // Non-null right timestamps with their row indices, already sorted
    let rights: Vec<(i64, IdxSize)> = right_ts
        .iter()
        .enumerate()
        .filter_map(|(i, ts)| ts.map(|t| (t, i as IdxSize)))
        .collect();

    let mut backward = 0usize; // index of first right candidate > left ts
    left_ts
        .iter()
        .map(|ts| {
            let t = (*ts)?;
            while backward < rights.len() && rights[backward].0 <= t {
                backward += 1;
            }
            // rights[backward - 1] is the last right <= t, rights[backward]
            // the first right > t
            let before = backward
                .checked_sub(1)
                .map(|i| rights[i])
                .filter(|(rt, _)| t - rt <= tolerance_ms);
            let after = rights
                .get(backward)
                .copied()
                .filter(|(rt, _)| rt - t <= tolerance_ms);

            match direction {
                MergeDirection::Backward => before.map(|(_, i)| i),
                MergeDirection::Nearest => match (before, after) {
                    (Some((bt, bi)), Some((at, ai))) => {
                        // Ties go backward
                        if t - bt <= at - t {
                            Some(bi)
                        } else {
                            Some(ai)
                        }
                    }
                    (Some((_, i)), None) | (None, Some((_, i))) => Some(i),
                    (None, None) => None,
                },
            }
        })
        .collect()
}
