//! File catalog and discovery scans over the data root.
//!
//! The catalog is a flat, sorted inventory of every CSV under the data
//! root, rebuilt on construction and on explicit [`FileCatalog::refresh`].
//! Discovery scans sit on top of it: known-category detection by filename
//! prefix, and the per-category column listing probed from the first file
//! of each category subfolder.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::constants::CSV_EXTENSION;
use crate::error::{AlignerError, Result};
use crate::header::{detect_header_row, normalize_header};
use crate::models::Category;

/// Recursive CSV inventory under one data root
#[derive(Debug, Clone)]
pub struct FileCatalog {
    data_root: PathBuf,
    files: Vec<PathBuf>,
}

impl FileCatalog {
    /// Walk the data root and build a sorted catalog
    pub fn build(data_root: &Path) -> Result<Self> {
        if !data_root.exists() {
            return Err(AlignerError::DataRootNotFound {
                path: data_root.to_path_buf(),
            });
        }

        let mut catalog = Self {
            data_root: data_root.to_path_buf(),
            files: Vec::new(),
        };
        catalog.refresh()?;
        Ok(catalog)
    }

    /// Rehydrate a catalog from snapshot paths without touching the
    /// filesystem
    pub fn from_paths(data_root: PathBuf, files: Vec<PathBuf>) -> Self {
        Self { data_root, files }
    }

    /// Re-walk the data root, replacing the current inventory.
    /// Unreadable entries are logged and skipped, never fatal.
    pub fn refresh(&mut self) -> Result<()> {
        let mut files = Vec::new();
        for entry in WalkDir::new(&self.data_root).sort_by_file_name() {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {}", self.data_root.display(), e);
                    continue;
                }
            };
            if entry.file_type().is_file() && is_csv_file(entry.path()) {
                files.push(entry.path().to_path_buf());
            }
        }
        debug!(
            "Catalog of {} holds {} CSV files",
            self.data_root.display(),
            files.len()
        );
        self.files = files;
        Ok(())
    }

    pub fn data_root(&self) -> &Path {
        &self.data_root
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Check if a path is a CSV file (extension matched case-insensitively)
fn is_csv_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(CSV_EXTENSION))
}

/// Detect which known categories have at least one file in the catalog,
/// by filename prefix
pub fn scan_available_categories(files: &[PathBuf]) -> BTreeSet<Category> {
    let mut found = BTreeSet::new();
    for path in files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if let Some(category) = Category::from_filename(&name) {
            found.insert(category);
        }
    }
    found
}

/// Probe the available columns per category subfolder.
///
/// Each first-level subfolder of the data root names a category; only the
/// first CSV found inside it (sorted path order) is inspected, through
/// header detection and normalization, minus the blacklist. A column
/// missing from that first file will not appear here even when later
/// files carry it.
pub fn scan_available_columns(
    data_root: &Path,
    blacklist: &BTreeSet<String>,
) -> BTreeMap<Category, Vec<String>> {
    let mut available: BTreeMap<Category, Vec<String>> = BTreeMap::new();

    for entry in WalkDir::new(data_root).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", data_root.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() || !is_csv_file(entry.path()) {
            continue;
        }

        let Some(category) = category_subfolder(data_root, entry.path()) else {
            // CSVs directly in the root belong to no category subfolder
            continue;
        };
        if available.contains_key(&category) {
            continue;
        }

        let (_, labels) = detect_header_row(entry.path());
        if labels.is_empty() {
            continue;
        }

        let mut seen = BTreeSet::new();
        let columns: Vec<String> = labels
            .iter()
            .map(|label| normalize_header(label))
            .filter(|col| !col.is_empty() && !blacklist.contains(col) && seen.insert(col.clone()))
            .collect();

        debug!(
            "Category '{}' columns probed from {}: {:?}",
            category,
            entry.path().display(),
            columns
        );
        available.insert(category, columns);
    }

    available
}

/// First path component below the data root, as the category name
fn category_subfolder(data_root: &Path, path: &Path) -> Option<Category> {
    let relative = path.strip_prefix(data_root).ok()?;
    let mut components = relative.components();
    let first = components.next()?;
    // A lone component means the file sits directly in the root
    components.next()?;
    Some(Category::new(first.as_os_str().to_string_lossy()))
}
