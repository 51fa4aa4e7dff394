//! The data loader: discovery state plus the nested per-file table store.
//!
//! A loader captures three pieces of discovery metadata at construction -
//! the file catalog, the detected category set, and the per-category
//! column listing - then populates its store through repeated
//! [`DataLoader::load_data`] calls. The store is append-only and owned
//! exclusively by the loader; consumers read through accessors.
//!
//! Discovery metadata (never loaded tables) round-trips through
//! [`DiscoverySnapshot`] so a stateless caller such as a web session can
//! rehydrate a loader without re-walking the filesystem.

pub mod special;

#[cfg(test)]
pub mod tests;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::catalog::{FileCatalog, scan_available_categories, scan_available_columns};
use crate::config::AlignerConfig;
use crate::error::{AlignerError, Result};
use crate::header::{detect_header_row, normalize_header, read_metadata_pairs};
use crate::models::{Category, InstanceKey, NormalizedTable, SourceFile, SpecialKey, StoreKey};
use crate::timestamp::resolve_datetime;

use self::special::{determine_special_key, scan_special_values};

/// The serializable discovery state of a loader: everything captured at
/// construction, nothing loaded afterwards. Sets become sorted lists and
/// paths become strings so the snapshot survives any key/value store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoverySnapshot {
    pub data_root: String,
    pub blacklist: Vec<String>,
    pub categories: Vec<String>,
    pub available_columns: BTreeMap<String, Vec<String>>,
    pub files: Vec<String>,
}

impl DiscoverySnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Loads sensor CSVs into a nested store keyed by
/// category → instance → special value.
#[derive(Debug)]
pub struct DataLoader {
    blacklist: BTreeSet<String>,
    categories: BTreeSet<Category>,
    available_columns: BTreeMap<Category, Vec<String>>,
    catalog: FileCatalog,
    store: BTreeMap<StoreKey, Vec<NormalizedTable>>,
}

impl DataLoader {
    /// Build a loader over a data root, running the discovery scans once.
    pub fn new(data_root: &Path, blacklist: BTreeSet<String>) -> Result<Self> {
        let catalog = FileCatalog::build(data_root)?;
        let categories = scan_available_categories(catalog.files());
        let available_columns = scan_available_columns(data_root, &blacklist);

        info!(
            "Loader discovered {} files, {} categories under {}",
            catalog.len(),
            categories.len(),
            data_root.display()
        );

        Ok(Self {
            blacklist,
            categories,
            available_columns,
            catalog,
            store: BTreeMap::new(),
        })
    }

    /// Build a loader from configuration (data root + blacklist)
    pub fn from_config(config: &AlignerConfig) -> Result<Self> {
        Self::new(&config.data_root, config.blacklist.clone())
    }

    /// Reconstruct a loader from a discovery snapshot without touching
    /// the filesystem. The store starts empty; only discovery metadata
    /// survives rehydration.
    pub fn from_snapshot(snapshot: &DiscoverySnapshot) -> Self {
        let catalog = FileCatalog::from_paths(
            PathBuf::from(&snapshot.data_root),
            snapshot.files.iter().map(PathBuf::from).collect(),
        );
        Self {
            blacklist: snapshot.blacklist.iter().cloned().collect(),
            categories: snapshot.categories.iter().map(Category::new).collect(),
            available_columns: snapshot
                .available_columns
                .iter()
                .map(|(cat, cols)| (Category::new(cat), cols.clone()))
                .collect(),
            catalog,
            store: BTreeMap::new(),
        }
    }

    /// Capture the discovery state for later rehydration
    pub fn snapshot(&self) -> DiscoverySnapshot {
        DiscoverySnapshot {
            data_root: self.catalog.data_root().to_string_lossy().into_owned(),
            blacklist: self.blacklist.iter().cloned().collect(),
            categories: self.categories.iter().map(|c| c.to_string()).collect(),
            available_columns: self
                .available_columns
                .iter()
                .map(|(cat, cols)| (cat.to_string(), cols.clone()))
                .collect(),
            files: self
                .catalog
                .files()
                .iter()
                .map(|p| p.to_string_lossy().into_owned())
                .collect(),
        }
    }

    /// Re-run all discovery scans against the filesystem. The store is
    /// left untouched; only discovery metadata is rebuilt.
    pub fn refresh(&mut self) -> Result<()> {
        self.catalog.refresh()?;
        self.categories = scan_available_categories(self.catalog.files());
        self.available_columns = scan_available_columns(self.catalog.data_root(), &self.blacklist);
        Ok(())
    }

    /// Load every catalog file matching `(category, instance_id)` that
    /// carries at least one of the requested columns, appending the
    /// resulting tables into the store.
    ///
    /// Per-file failures are logged and skipped; the call itself only
    /// fails on programming errors, never on bad input files. Matching
    /// zero files leaves the store unchanged and is not an error -
    /// callers check [`DataLoader::has_data`] afterwards.
    pub fn load_data(
        &mut self,
        category: &str,
        instance_id: Option<i64>,
        requested_columns: &BTreeSet<String>,
    ) -> Result<()> {
        let category = Category::new(category);
        let requested: BTreeSet<String> = requested_columns
            .iter()
            .map(|c| normalize_header(c))
            .collect();
        let instance_key = InstanceKey::from_request(&category, instance_id);

        let candidates: Vec<PathBuf> = self
            .catalog
            .files()
            .iter()
            .filter(|path| SourceFile::from_path(path).matches(&category, instance_id))
            .cloned()
            .collect();
        debug!(
            "{} catalog files match {}/{:?}",
            candidates.len(),
            category,
            instance_id
        );

        for path in candidates {
            match self.load_file(&path, &category, &requested) {
                Ok(Some((special, table))) => {
                    let key = StoreKey::new(category.clone(), instance_key, special);
                    info!(
                        "Loaded {} ({} rows) into {}",
                        path.display(),
                        table.len(),
                        key
                    );
                    self.store.entry(key).or_default().push(table);
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Skipping {}: {}", path.display(), e);
                }
            }
        }

        Ok(())
    }

    /// Parse one file into a table. None means the file carries none of
    /// the requested columns; a file with no resolvable datetime is a
    /// [`AlignerError::DatetimeUnresolved`] the load loop logs and skips.
    fn load_file(
        &self,
        path: &Path,
        category: &Category,
        requested: &BTreeSet<String>,
    ) -> Result<Option<(SpecialKey, NormalizedTable)>> {
        let (header_row, _) = detect_header_row(path);
        let df = read_table(path, header_row)?;

        let datetime = resolve_datetime(&df)?;
        if datetime.null_count() == datetime.len() {
            return Err(AlignerError::DatetimeUnresolved {
                path: path.to_path_buf(),
            });
        }

        let matching: Vec<String> = df
            .get_column_names()
            .iter()
            .filter(|col| requested.contains(col.as_str()))
            .map(|col| col.to_string())
            .collect();
        if matching.is_empty() {
            debug!(
                "Skipping {}: no requested columns present",
                path.display()
            );
            return Ok(None);
        }

        // Special key comes from the full table, before projection drops
        // columns like "depth" that were not requested.
        let special = determine_special_key(category, path, &df);

        let mut frame = DataFrame::new(vec![datetime.clone().into_column()])?;
        for col in &matching {
            frame.with_column(df.column(col)?.clone())?;
        }
        let frame = frame.filter(&datetime.is_not_null())?;

        Ok(Some((special, NormalizedTable::new(path.to_path_buf(), frame))))
    }

    /// Metadata preambles for every catalog file matching the pattern.
    /// Files with no readable preamble are skipped.
    pub fn load_metadata(
        &self,
        category: &str,
        instance_id: Option<i64>,
    ) -> Vec<BTreeMap<String, String>> {
        let category = Category::new(category);
        self.catalog
            .files()
            .iter()
            .filter(|path| SourceFile::from_path(path).matches(&category, instance_id))
            .map(|path| read_metadata_pairs(path))
            .filter(|pairs| !pairs.is_empty())
            .collect()
    }

    /// Distinct `(instance, special value)` pairs for a category
    pub fn special_values(&self, category: &str) -> Vec<(i64, String)> {
        scan_special_values(self.catalog.files(), &Category::new(category))
    }

    pub fn categories(&self) -> &BTreeSet<Category> {
        &self.categories
    }

    pub fn available_columns(&self) -> &BTreeMap<Category, Vec<String>> {
        &self.available_columns
    }

    pub fn blacklist(&self) -> &BTreeSet<String> {
        &self.blacklist
    }

    pub fn catalog(&self) -> &FileCatalog {
        &self.catalog
    }

    /// Tables stored under one exact key
    pub fn tables(&self, key: &StoreKey) -> Option<&[NormalizedTable]> {
        self.store.get(key).map(|tables| tables.as_slice())
    }

    /// All store keys for one category + instance, across special values
    pub fn keys_for(&self, category: &str, instance_id: Option<i64>) -> Vec<&StoreKey> {
        let category = Category::new(category);
        let instance = InstanceKey::from_request(&category, instance_id);
        self.store
            .keys()
            .filter(|key| key.category == category && key.instance == instance)
            .collect()
    }

    /// Every table loaded for one category + instance, across special
    /// values, in store order
    pub fn tables_for(&self, category: &str, instance_id: Option<i64>) -> Vec<&NormalizedTable> {
        let category_norm = Category::new(category);
        let instance = InstanceKey::from_request(&category_norm, instance_id);
        self.store
            .iter()
            .filter(|(key, _)| key.category == category_norm && key.instance == instance)
            .flat_map(|(_, tables)| tables.iter())
            .collect()
    }

    /// Whether any table was loaded for a category + instance. Callers
    /// use this to distinguish "no data found" from a load failure.
    pub fn has_data(&self, category: &str, instance_id: Option<i64>) -> bool {
        !self.tables_for(category, instance_id).is_empty()
    }

    pub fn store_keys(&self) -> impl Iterator<Item = &StoreKey> {
        self.store.keys()
    }

    pub fn store_is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

/// Read a sensor CSV from its detected header row onward.
///
/// Schema inference is disabled: every column arrives as a string and all
/// parsing (datetime, numeric) is explicit downstream. Ragged lines are
/// truncated rather than fatal. Column names are normalized after the
/// read; a duplicate normalized name gets a positional suffix because a
/// frame cannot hold two columns with one name.
fn read_table(path: &Path, header_row: usize) -> Result<DataFrame> {
    let parse_options = CsvParseOptions::default().with_truncate_ragged_lines(true);
    let mut df = CsvReadOptions::default()
        .with_has_header(true)
        .with_skip_rows(header_row)
        .with_infer_schema_length(Some(0))
        .with_parse_options(parse_options)
        .try_into_reader_with_file_path(Some(path.to_path_buf()))
        .map_err(|e| AlignerError::InvalidFormat {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?
        .finish()?;

    let mut seen: BTreeSet<String> = BTreeSet::new();
    let names: Vec<String> = df
        .get_column_names()
        .iter()
        .enumerate()
        .map(|(i, raw)| {
            let name = normalize_header(raw);
            if seen.insert(name.clone()) {
                name
            } else {
                format!("{}_{}", name, i)
            }
        })
        .collect();
    df.set_column_names(names)?;

    Ok(df)
}
