//! Core data structures and types for sensor loading and alignment.
//!
//! Defines the typed store keys (category, instance, special partition),
//! column classification tags, merge direction, and the per-file table
//! wrapper used throughout the library.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use polars::prelude::DataFrame;
use regex::Regex;

use crate::constants::{
    DATETIME_COLUMN, HEADER_DATE_TOKEN, HEADER_TIME_TOKEN, KNOWN_CATEGORIES, SIMPLE_DATE_COLUMN,
    is_shared_instance_category,
};
use crate::error::AlignerError;
use crate::header::normalize_header;

/// A sensor class grouping such as "soil" or "tvws".
///
/// Always stored lowercase so lookups survive the mixed-case filenames
/// the capture tooling produces.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    pub fn new(name: impl AsRef<str>) -> Self {
        Category(name.as_ref().trim().to_lowercase())
    }

    /// Detect a known category from a filename prefix
    pub fn from_filename(file_name: &str) -> Option<Self> {
        let name = file_name.to_lowercase();
        KNOWN_CATEGORIES
            .iter()
            .find(|cat| name.starts_with(*cat))
            .map(|cat| Category((*cat).to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Instance partition within a category.
///
/// Site-wide categories (ambient weather and friends) carry no instance
/// numbering and store under `Shared`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum InstanceKey {
    Shared,
    Numbered(i64),
}

impl InstanceKey {
    /// Resolve the storage key for a load request. Shared-instance
    /// categories always collapse to `Shared`, as does a request without
    /// an instance id.
    pub fn from_request(category: &Category, instance_id: Option<i64>) -> Self {
        if is_shared_instance_category(category.as_str()) {
            return InstanceKey::Shared;
        }
        match instance_id {
            Some(id) => InstanceKey::Numbered(id),
            None => InstanceKey::Shared,
        }
    }
}

impl fmt::Display for InstanceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstanceKey::Shared => write!(f, "shared"),
            InstanceKey::Numbered(id) => write!(f, "instance{}", id),
        }
    }
}

/// Secondary discriminator within a category + instance: burial depth for
/// soil sensors, scenario tag for TVWS links. Tables under different
/// special keys are never concatenated.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SpecialKey {
    Unknown,
    MixedDepth,
    Value(String),
}

impl SpecialKey {
    pub fn value(raw: impl AsRef<str>) -> Self {
        SpecialKey::Value(raw.as_ref().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        match self {
            SpecialKey::Unknown => crate::constants::UNKNOWN_SPECIAL_KEY,
            SpecialKey::MixedDepth => crate::constants::MIXED_DEPTH_KEY,
            SpecialKey::Value(v) => v,
        }
    }
}

impl fmt::Display for SpecialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Full address of one bucket in the data store
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StoreKey {
    pub category: Category,
    pub instance: InstanceKey,
    pub special: SpecialKey,
}

impl StoreKey {
    pub fn new(category: Category, instance: InstanceKey, special: SpecialKey) -> Self {
        Self {
            category,
            instance,
            special,
        }
    }
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.category, self.instance, self.special)
    }
}

/// Classification tag assigned once per column before datetime resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnClass {
    DateLike,
    TimeLike,
    SimpleDateLike,
    Value,
    Unknown,
}

/// Classify a normalized column name.
///
/// A name containing both "date" and "time" (e.g. "datetime") counts as a
/// plain value column so the combined date+time rule never pairs a column
/// with itself; the generic fallback parser picks such columns up instead.
pub fn classify_column(name: &str) -> ColumnClass {
    if name.is_empty() {
        return ColumnClass::Unknown;
    }
    if name == SIMPLE_DATE_COLUMN {
        return ColumnClass::SimpleDateLike;
    }
    let has_date = name.contains(HEADER_DATE_TOKEN);
    let has_time = name.contains(HEADER_TIME_TOKEN);
    match (has_date, has_time) {
        (true, false) => ColumnClass::DateLike,
        (false, true) => ColumnClass::TimeLike,
        _ => ColumnClass::Value,
    }
}

/// Direction of the asof join when pairing timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeDirection {
    /// Closest timestamp on either side within tolerance
    Nearest,
    /// Closest earlier-or-equal timestamp within tolerance
    Backward,
}

impl MergeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeDirection::Nearest => "nearest",
            MergeDirection::Backward => "backward",
        }
    }
}

impl fmt::Display for MergeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for MergeDirection {
    type Err = AlignerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "nearest" => Ok(MergeDirection::Nearest),
            "backward" => Ok(MergeDirection::Backward),
            other => Err(AlignerError::Configuration {
                message: format!(
                    "Unknown merge direction '{}'. Available directions: nearest, backward",
                    other
                ),
            }),
        }
    }
}

/// One catalog entry viewed through the filename heuristics
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Lowercased file name used by all pattern matching
    pub name: String,
    /// Known category detected from the filename prefix, if any
    pub category: Option<Category>,
    /// Instance id detected from the filename token, if any
    pub instance: Option<i64>,
}

impl SourceFile {
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let category = Category::from_filename(&name);
        let instance = detect_instance_id(&name);
        Self {
            path: path.to_path_buf(),
            name,
            category,
            instance,
        }
    }

    /// Match against a load request. The category token must appear in the
    /// filename; a numbered instance additionally requires the `_<id>`
    /// token bounded by a separator. `None` skips the instance check.
    pub fn matches(&self, category: &Category, instance_id: Option<i64>) -> bool {
        if category.as_str() == "ambient" {
            return self.name.contains("ambient");
        }
        if !self.name.contains(category.as_str()) {
            return false;
        }
        match instance_id {
            None => true,
            Some(id) => has_instance_token(&self.name, id),
        }
    }
}

/// Look for `_<id>` immediately followed by `_`, `.` or `-`, so `_1` does
/// not match inside `_10`.
fn has_instance_token(file_name: &str, id: i64) -> bool {
    let pattern = format!(r"_{}[_.\-]", regex::escape(&id.to_string()));
    match Regex::new(&pattern) {
        Ok(re) => re.is_match(file_name),
        Err(_) => false,
    }
}

/// Pull the first separator-bounded `<int>` token out of a filename.
/// The trailing boundary accepts `.` so `soil_1.csv` detects the same
/// instance that [`has_instance_token`] matches.
fn detect_instance_id(file_name: &str) -> Option<i64> {
    let re = Regex::new(r"[-_](-?\d+)[-_.]").ok()?;
    let caps = re.captures(file_name)?;
    caps.get(1)?.as_str().parse().ok()
}

/// The parsed contents of one source file after header detection, column
/// normalization, and datetime resolution. Every row carries a non-null
/// "datetime"; unresolvable rows were dropped at load time.
#[derive(Debug, Clone)]
pub struct NormalizedTable {
    pub source: PathBuf,
    pub frame: DataFrame,
}

impl NormalizedTable {
    pub fn new(source: PathBuf, frame: DataFrame) -> Self {
        Self { source, frame }
    }

    /// Ordered normalized column names, "datetime" first
    pub fn columns(&self) -> Vec<String> {
        self.frame
            .get_column_names()
            .iter()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        let wanted = normalize_header(name);
        self.frame
            .get_column_names()
            .iter()
            .any(|col| col.as_str() == wanted)
    }

    pub fn len(&self) -> usize {
        self.frame.height()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    /// Project to (datetime, column), or None when the column is absent
    pub fn select_with_datetime(&self, column: &str) -> Option<DataFrame> {
        let wanted = normalize_header(column);
        if !self.has_column(&wanted) {
            return None;
        }
        self.frame
            .select([DATETIME_COLUMN, wanted.as_str()])
            .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_category_from_filename() {
        assert_eq!(
            Category::from_filename("soil_1_north.csv"),
            Some(Category::new("soil"))
        );
        assert_eq!(
            Category::from_filename("TVWSScenario_2_a.csv"),
            Some(Category::new("tvws"))
        );
        assert_eq!(Category::from_filename("readme.txt"), None);
    }

    #[test]
    fn test_instance_key_resolution() {
        let soil = Category::new("soil");
        let ambient = Category::new("ambient");

        assert_eq!(
            InstanceKey::from_request(&soil, Some(3)),
            InstanceKey::Numbered(3)
        );
        assert_eq!(InstanceKey::from_request(&soil, None), InstanceKey::Shared);
        assert_eq!(
            InstanceKey::from_request(&ambient, Some(3)),
            InstanceKey::Shared
        );
    }

    #[test]
    fn test_special_key_display() {
        assert_eq!(SpecialKey::Unknown.to_string(), "unknown");
        assert_eq!(SpecialKey::MixedDepth.to_string(), "mixed-depth");
        assert_eq!(SpecialKey::value(" tower ").to_string(), "tower");
    }

    #[test]
    fn test_classify_column() {
        assert_eq!(
            classify_column("date (year-mon-day)"),
            ColumnClass::DateLike
        );
        assert_eq!(
            classify_column("time (hour-min-sec)"),
            ColumnClass::TimeLike
        );
        assert_eq!(classify_column("simple date"), ColumnClass::SimpleDateLike);
        assert_eq!(classify_column("drssi"), ColumnClass::Value);
        assert_eq!(classify_column(""), ColumnClass::Unknown);
        // Contains both tokens, so it must not trigger the combined rule
        assert_eq!(classify_column("datetime"), ColumnClass::Value);
    }

    #[test]
    fn test_merge_direction_parsing() {
        assert_eq!(
            "nearest".parse::<MergeDirection>().unwrap(),
            MergeDirection::Nearest
        );
        assert_eq!(
            " Backward ".parse::<MergeDirection>().unwrap(),
            MergeDirection::Backward
        );
        assert!("sideways".parse::<MergeDirection>().is_err());
    }

    #[test]
    fn test_source_file_matching() {
        let file = SourceFile::from_path(Path::new("/data/soil/soil_1_north.csv"));
        let soil = Category::new("soil");
        let tvws = Category::new("tvws");

        assert_eq!(file.category, Some(Category::new("soil")));
        assert_eq!(file.instance, Some(1));
        assert!(file.matches(&soil, Some(1)));
        assert!(file.matches(&soil, None));
        assert!(!file.matches(&soil, Some(10)));
        assert!(!file.matches(&tvws, Some(1)));

        // Extension-bounded token: matching and detection must agree
        let bare = SourceFile::from_path(Path::new("/data/soil/soil_1.csv"));
        assert!(bare.matches(&soil, Some(1)));
        assert_eq!(bare.instance, Some(1));
    }

    #[test]
    fn test_instance_token_is_bounded() {
        assert!(has_instance_token("soil_1_north.csv", 1));
        assert!(has_instance_token("soil_1.csv", 1));
        assert!(!has_instance_token("soil_10_north.csv", 1));
        assert!(has_instance_token("soil_10_north.csv", 10));
    }

    #[test]
    fn test_ambient_matches_without_instance_token() {
        let file = SourceFile::from_path(Path::new("/data/ambient/ambientweather_march.csv"));
        let ambient = Category::new("ambient");
        assert!(file.matches(&ambient, Some(7)));
    }
}
