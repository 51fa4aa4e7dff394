//! Special-partition key extraction and discovery.
//!
//! Two sub-series can share a category and instance while measuring
//! different things: two burial depths on one soil sensor, two antenna
//! scenarios on one TVWS link. The special key keeps those apart in the
//! store. TVWS files carry the key as the "specialvalue" field of the
//! metadata preamble; soil files derive it from the "depth" data column.

use std::path::{Path, PathBuf};

use polars::prelude::*;
use tracing::{debug, warn};

use crate::constants::{DEPTH_COLUMN, SPECIAL_VALUE_FIELD};
use crate::header::{normalize_header, read_metadata_pairs};
use crate::models::{Category, SourceFile, SpecialKey};

/// Determine the special-partition key for one loaded file.
///
/// The metadata preamble read here is fixed-position (lines 0 and 1) and
/// independent of header detection. Missing fields or columns fall back
/// to [`SpecialKey::Unknown`] rather than failing the load.
pub fn determine_special_key(category: &Category, path: &Path, df: &DataFrame) -> SpecialKey {
    match category.as_str() {
        "tvws" => special_key_from_preamble(path, SPECIAL_VALUE_FIELD),
        "soil" => special_key_from_depth_column(path, df),
        _ => SpecialKey::Unknown,
    }
}

fn special_key_from_preamble(path: &Path, field: &str) -> SpecialKey {
    let pairs = read_metadata_pairs(path);
    match pairs.get(field) {
        Some(value) if !value.trim().is_empty() => SpecialKey::value(value),
        _ => {
            debug!(
                "No '{}' field in preamble of {}; special key unknown",
                field,
                path.display()
            );
            SpecialKey::Unknown
        }
    }
}

/// One depth per file gives that depth as the key; several give the
/// mixed-depth sentinel so the series are never conflated downstream.
fn special_key_from_depth_column(path: &Path, df: &DataFrame) -> SpecialKey {
    let Ok(column) = df.column(DEPTH_COLUMN) else {
        debug!(
            "No '{}' column in {}; special key unknown",
            DEPTH_COLUMN,
            path.display()
        );
        return SpecialKey::Unknown;
    };

    let depths = match unique_non_null_strings(column) {
        Ok(d) => d,
        Err(e) => {
            warn!("Could not read depths from {}: {}", path.display(), e);
            return SpecialKey::Unknown;
        }
    };

    match depths.len() {
        0 => SpecialKey::Unknown,
        1 => SpecialKey::value(normalize_header(&depths[0])),
        _ => {
            debug!(
                "{} mixes {} depths in one file",
                path.display(),
                depths.len()
            );
            SpecialKey::MixedDepth
        }
    }
}

/// Distinct trimmed string values of a column, first-seen order
fn unique_non_null_strings(column: &Column) -> PolarsResult<Vec<String>> {
    let values = column.cast(&DataType::String)?;
    let mut seen = Vec::new();
    for value in values.str()?.into_iter().flatten() {
        let trimmed = value.trim();
        if !trimmed.is_empty() && !seen.iter().any(|s| s == trimmed) {
            seen.push(trimmed.to_string());
        }
    }
    Ok(seen)
}

/// Enumerate the distinct `(instance id, special value)` pairs a category
/// offers across the catalog.
///
/// Only files carrying an instance token in their name participate. The
/// special value comes from the metadata preamble: "specialvalue" for
/// TVWS files, "depth" for soil files. Unreadable files are skipped.
/// The result is deduplicated and sorted, ready for a selection UI.
pub fn scan_special_values(files: &[PathBuf], category: &Category) -> Vec<(i64, String)> {
    let field = match category.as_str() {
        "tvws" => SPECIAL_VALUE_FIELD,
        "soil" => DEPTH_COLUMN,
        _ => return Vec::new(),
    };

    let mut found = Vec::new();
    for path in files {
        let source = SourceFile::from_path(path);
        if !source.matches(category, None) {
            continue;
        }
        let Some(instance) = source.instance else {
            continue;
        };

        let pairs = read_metadata_pairs(path);
        if let Some(value) = pairs.get(field) {
            let value = value.trim();
            if !value.is_empty() {
                found.push((instance, value.to_string()));
            }
        }
    }

    found.sort();
    found.dedup();
    found
}

/// Parse a `"<instance>|<special>"` selector, the round-trip format used
/// by selection UIs. Returns None for a missing separator or a
/// non-integer instance part.
pub fn parse_selector(selector: &str) -> Option<(i64, String)> {
    let (instance_part, special_part) = selector.split_once('|')?;
    match instance_part.trim().parse::<i64>() {
        Ok(instance) => Some((instance, special_part.to_string())),
        Err(e) => {
            warn!("Failed to parse selector '{}': {}", selector, e);
            None
        }
    }
}
