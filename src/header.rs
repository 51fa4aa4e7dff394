//! Sensor CSV header detection and column-name normalization.
//!
//! Field sensor exports disagree about where the column labels live: some
//! files start with them, others put a two-line metadata preamble first.
//! This module locates the header row by keyword heuristics, canonicalizes
//! column labels, and reads the fixed-position metadata preamble.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{debug, warn};

use crate::constants::{
    HEADER_DATE_TOKEN, HEADER_SENSOR_TOKENS, HEADER_TIME_TOKEN, MAX_HEADER_SCAN_LINES,
    METADATA_PREAMBLE_LINES,
};

/// Canonicalize a raw column label.
///
/// Removes straight and curly double quotes, maps right-single-quote and
/// apostrophe variants to the ASCII apostrophe, then trims and lowercases.
/// Character cleanup runs before the trim so the result is idempotent:
/// `normalize_header(normalize_header(x)) == normalize_header(x)`.
pub fn normalize_header(label: &str) -> String {
    let cleaned: String = label
        .chars()
        .filter_map(|c| match c {
            '"' | '\u{201C}' | '\u{201D}' => None,
            '\u{2019}' | '\u{02BC}' => Some('\''),
            other => Some(other),
        })
        .collect();
    cleaned.trim().to_lowercase()
}

/// Locate the header row of a sensor CSV, scanning at most
/// [`MAX_HEADER_SCAN_LINES`] lines.
///
/// Returns the 0-based row index and the raw (quote-stripped, not yet
/// normalized) labels found there. Never fails: with no qualifying line
/// the first line wins, and an unreadable or empty file yields
/// `(0, vec![])`.
pub fn detect_header_row(file_path: &Path) -> (usize, Vec<String>) {
    detect_header_row_within(file_path, MAX_HEADER_SCAN_LINES)
}

/// As [`detect_header_row`], with an explicit scan window.
pub fn detect_header_row_within(file_path: &Path, max_scan_lines: usize) -> (usize, Vec<String>) {
    let file = match File::open(file_path) {
        Ok(f) => f,
        Err(e) => {
            warn!(
                "Could not open {} for header detection: {}",
                file_path.display(),
                e
            );
            return (0, Vec::new());
        }
    };
    let reader = BufReader::new(file);

    let mut first_labels: Option<Vec<String>> = None;
    for (i, line) in reader.lines().take(max_scan_lines).enumerate() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                warn!("Read error in {} at line {}: {}", file_path.display(), i, e);
                break;
            }
        };

        let labels = split_labels(&line);
        if first_labels.is_none() {
            first_labels = Some(labels.clone());
        }

        let normalized: Vec<String> = labels.iter().map(|l| normalize_header(l)).collect();
        if is_header_row(&normalized) {
            debug!("Header detected at line {} in {}", i, file_path.display());
            return (i, labels);
        }
    }

    debug!(
        "No header match in {}; falling back to first line",
        file_path.display()
    );
    (0, first_labels.unwrap_or_default())
}

/// A line qualifies as the header when it carries a date token together
/// with either a time token or one of the sensor keywords.
fn is_header_row(normalized_labels: &[String]) -> bool {
    let has_date = normalized_labels
        .iter()
        .any(|col| col.contains(HEADER_DATE_TOKEN));
    if !has_date {
        return false;
    }
    normalized_labels.iter().any(|col| {
        col.contains(HEADER_TIME_TOKEN)
            || HEADER_SENSOR_TOKENS
                .iter()
                .any(|keyword| col.contains(keyword))
    })
}

/// Split a raw CSV line into whitespace- and quote-stripped labels
fn split_labels(line: &str) -> Vec<String> {
    line.trim()
        .split(',')
        .map(|c| c.trim().replace('"', ""))
        .collect()
}

/// Read the fixed two-line metadata preamble of a sensor export.
///
/// Line 0 carries the field names, line 1 the values; the two are zipped
/// into a map with normalized keys and trimmed, case-preserved values.
/// This read is positional and independent of [`detect_header_row`] - a
/// preamble that happens to contain date/time tokens cannot change where
/// metadata is looked for. Short or unreadable files yield an empty map.
pub fn read_metadata_pairs(file_path: &Path) -> BTreeMap<String, String> {
    let file = match File::open(file_path) {
        Ok(f) => f,
        Err(e) => {
            warn!(
                "Could not open {} for metadata: {}",
                file_path.display(),
                e
            );
            return BTreeMap::new();
        }
    };
    let reader = BufReader::new(file);

    let mut lines = Vec::with_capacity(METADATA_PREAMBLE_LINES);
    for line in reader.lines().take(METADATA_PREAMBLE_LINES) {
        match line {
            Ok(l) => lines.push(l),
            Err(e) => {
                warn!("Read error in {} preamble: {}", file_path.display(), e);
                return BTreeMap::new();
            }
        }
    }
    if lines.len() < METADATA_PREAMBLE_LINES {
        return BTreeMap::new();
    }

    let names: Vec<String> = lines[0]
        .trim()
        .split(',')
        .map(normalize_header)
        .collect();
    let values: Vec<String> = lines[1]
        .trim()
        .split(',')
        .map(|v| v.trim().to_string())
        .collect();

    names
        .into_iter()
        .zip(values)
        .filter(|(name, _)| !name.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_normalize_header_basics() {
        assert_eq!(normalize_header(" DRSSI "), "drssi");
        assert_eq!(normalize_header("drssi"), "drssi");
        assert_eq!(normalize_header("\"Soil Moisture Value\""), "soil moisture value");
        assert_eq!(normalize_header("\u{201C}Depth\u{201D}"), "depth");
        assert_eq!(normalize_header("sensor\u{2019}s id"), "sensor's id");
    }

    #[test]
    fn test_normalize_header_idempotent() {
        for raw in [" DRSSI ", "\" x\"", "Soil Temp (C)", "\u{2019}odd\u{2019}", ""] {
            let once = normalize_header(raw);
            assert_eq!(normalize_header(&once), once, "not idempotent for {:?}", raw);
        }
    }

    #[test]
    fn test_detect_header_at_row_zero() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "Date (Year-Mon-Day),Time (Hour-Min-Sec),DRSSI").unwrap();
        writeln!(temp_file, "2025-06-06,11-00-00,-91.2").unwrap();

        let (row, labels) = detect_header_row(temp_file.path());
        assert_eq!(row, 0);
        assert_eq!(
            labels,
            vec!["Date (Year-Mon-Day)", "Time (Hour-Min-Sec)", "DRSSI"]
        );
    }

    #[test]
    fn test_detect_header_behind_preamble() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "Sensor Name,SpecialValue").unwrap();
        writeln!(temp_file, "node4,tower").unwrap();
        writeln!(temp_file, "Date (Year-Mon-Day),Time (Hour-Min-Sec),Soil Moisture Value").unwrap();
        writeln!(temp_file, "2025-06-06,11-00-00,1831").unwrap();

        let (row, labels) = detect_header_row(temp_file.path());
        assert_eq!(row, 2);
        assert_eq!(labels[2], "Soil Moisture Value");
    }

    #[test]
    fn test_detect_header_falls_back_to_first_line() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "alpha,beta,gamma").unwrap();
        writeln!(temp_file, "1,2,3").unwrap();

        let (row, labels) = detect_header_row(temp_file.path());
        assert_eq!(row, 0);
        assert_eq!(labels, vec!["alpha", "beta", "gamma"]);
    }

    #[test]
    fn test_detect_header_empty_file() {
        let temp_file = NamedTempFile::new().unwrap();
        let (row, labels) = detect_header_row(temp_file.path());
        assert_eq!(row, 0);
        assert!(labels.is_empty());
    }

    #[test]
    fn test_detect_header_respects_scan_window() {
        let mut temp_file = NamedTempFile::new().unwrap();
        for i in 0..12 {
            writeln!(temp_file, "junk{},noise", i).unwrap();
        }
        writeln!(temp_file, "Date (Year-Mon-Day),Time (Hour-Min-Sec)").unwrap();

        let (row, labels) = detect_header_row(temp_file.path());
        assert_eq!(row, 0);
        assert_eq!(labels, vec!["junk0", "noise"]);
    }

    #[test]
    fn test_read_metadata_pairs() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "Sensor Name,SpecialValue,Depth").unwrap();
        writeln!(temp_file, "node4, tower ,-3").unwrap();
        writeln!(temp_file, "Date (Year-Mon-Day),Time (Hour-Min-Sec)").unwrap();

        let pairs = read_metadata_pairs(temp_file.path());
        assert_eq!(pairs.get("sensor name").map(String::as_str), Some("node4"));
        assert_eq!(pairs.get("specialvalue").map(String::as_str), Some("tower"));
        assert_eq!(pairs.get("depth").map(String::as_str), Some("-3"));
    }

    #[test]
    fn test_read_metadata_pairs_truncated_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "Sensor Name,SpecialValue").unwrap();

        assert!(read_metadata_pairs(temp_file.path()).is_empty());

        let empty = NamedTempFile::new().unwrap();
        assert!(read_metadata_pairs(empty.path()).is_empty());
    }
}
