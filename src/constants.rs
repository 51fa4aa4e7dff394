//! Application constants for the sensor aligner
//!
//! This module contains configuration constants, default values, and
//! column/metadata name mappings used throughout the aligner.

// =============================================================================
// Categories and File Patterns
// =============================================================================

/// Sensor categories recognized by filename prefix during scans
pub const KNOWN_CATEGORIES: &[&str] = &["tvws", "soil", "ambient", "sdr"];

/// Categories stored without a per-instance partition (site-wide sensors)
pub const SHARED_INSTANCE_CATEGORIES: &[&str] = &["ambient", "ambientweather", "atmospheric"];

/// File extension accepted by the catalog walk (matched case-insensitively)
pub const CSV_EXTENSION: &str = "csv";

/// Default data root relative to the working directory
pub const DEFAULT_DATA_ROOT: &str = "Data";

/// Filename of the optional column blacklist next to the data root
pub const BLACKLIST_FILENAME: &str = "dropdown_blacklist.txt";

// =============================================================================
// Header Detection
// =============================================================================

/// Maximum number of lines scanned when locating a header row
pub const MAX_HEADER_SCAN_LINES: usize = 10;

/// Token that must appear in a header row
pub const HEADER_DATE_TOKEN: &str = "date";

/// Token accepted alongside the date token
pub const HEADER_TIME_TOKEN: &str = "time";

/// Sensor keywords accepted in place of the time token
pub const HEADER_SENSOR_TOKENS: &[&str] = &["soil", "moisture", "temperature"];

// =============================================================================
// Column and Metadata Field Names
// =============================================================================

/// Canonical timestamp column name in every loaded table
pub const DATETIME_COLUMN: &str = "datetime";

/// Normalized name of the single-column date convention
pub const SIMPLE_DATE_COLUMN: &str = "simple date";

/// Preamble field carrying the TVWS scenario tag
pub const SPECIAL_VALUE_FIELD: &str = "specialvalue";

/// Preamble field and data column carrying soil burial depth
pub const DEPTH_COLUMN: &str = "depth";

/// Special key recorded when one soil file mixes several depths
pub const MIXED_DEPTH_KEY: &str = "mixed-depth";

/// Special key recorded when no category rule produced one
pub const UNKNOWN_SPECIAL_KEY: &str = "unknown";

/// Number of preamble lines read for metadata extraction
pub const METADATA_PREAMBLE_LINES: usize = 2;

// =============================================================================
// Datetime Parsing
// =============================================================================

/// Explicit format for the combined date + time convention
pub const COMBINED_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Fallback datetime formats tried by the generic parser, in order
pub const FALLBACK_DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
];

/// Fallback date-only formats; bare dates resolve to midnight UTC
pub const FALLBACK_DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y", "%Y/%m/%d"];

/// Minimum fraction of non-empty rows that must parse for the generic
/// fallback to accept a column as the timestamp source
pub const GENERIC_PARSE_THRESHOLD: f64 = 0.8;

// =============================================================================
// Merge Defaults
// =============================================================================

/// Default asof-join tolerance in seconds
pub const DEFAULT_TOLERANCE_SECS: i64 = 60;

/// Suffix applied to collision columns during the Nth pairwise merge,
/// formatted as `_df{n}`
pub const MERGE_SUFFIX_PREFIX: &str = "_df";

/// Minimum surviving rows for an aligned frame to be usable downstream
pub const MIN_ALIGNED_ROWS: usize = 2;

// =============================================================================
// Helper Functions
// =============================================================================

/// Check whether a category stores under the shared (instance-free) key
pub fn is_shared_instance_category(category: &str) -> bool {
    SHARED_INSTANCE_CATEGORIES.contains(&category)
}

/// Collision suffix for the Nth dataframe in a pairwise merge chain
pub fn merge_suffix(index: usize) -> String {
    format!("{}{}", MERGE_SUFFIX_PREFIX, index)
}
