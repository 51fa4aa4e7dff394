//! Configuration for the aligner.
//!
//! Settings layer as defaults → optional TOML file → CLI flags; this
//! module holds the struct, the file loaders, and validation. The
//! blacklist names columns excluded from discovery listings (dropdown
//! noise like raw date/time columns), either inline or via a plain text
//! file next to the data root.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::constants::{BLACKLIST_FILENAME, DEFAULT_DATA_ROOT, DEFAULT_TOLERANCE_SECS};
use crate::error::{AlignerError, Result};
use crate::models::MergeDirection;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlignerConfig {
    /// Root folder scanned for sensor CSV exports
    pub data_root: PathBuf,

    /// Normalized column names excluded from discovery listings
    pub blacklist: BTreeSet<String>,

    /// Asof-join tolerance window in seconds
    pub tolerance_secs: i64,

    /// Asof-join direction
    pub direction: MergeDirection,
}

impl Default for AlignerConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from(DEFAULT_DATA_ROOT),
            blacklist: BTreeSet::new(),
            tolerance_secs: DEFAULT_TOLERANCE_SECS,
            direction: MergeDirection::Nearest,
        }
    }
}

impl AlignerConfig {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| AlignerError::Configuration {
            message: format!("could not read config file {}: {}", path.display(), e),
        })?;
        let config: AlignerConfig =
            toml::from_str(&contents).map_err(|e| AlignerError::Configuration {
                message: format!("invalid config file {}: {}", path.display(), e),
            })?;
        debug!("Loaded configuration from {}", path.display());
        config.validate()?;
        Ok(config)
    }

    pub fn with_data_root(mut self, data_root: PathBuf) -> Self {
        self.data_root = data_root;
        self
    }

    pub fn with_blacklist(mut self, blacklist: BTreeSet<String>) -> Self {
        self.blacklist = blacklist;
        self
    }

    pub fn with_tolerance_secs(mut self, tolerance_secs: i64) -> Self {
        self.tolerance_secs = tolerance_secs;
        self
    }

    pub fn with_direction(mut self, direction: MergeDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Merge the blacklist from a text file, one entry per line. A
    /// missing file is a warning, not an error.
    pub fn with_blacklist_file(mut self, path: &Path) -> Self {
        self.blacklist.extend(load_blacklist_file(path));
        self
    }

    /// Merge the conventional blacklist file sitting next to the data
    /// root, when present
    pub fn with_default_blacklist_file(self) -> Self {
        let candidate = self
            .data_root
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(BLACKLIST_FILENAME);
        if candidate.exists() {
            self.with_blacklist_file(&candidate)
        } else {
            self
        }
    }

    pub fn tolerance(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.tolerance_secs)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tolerance_secs <= 0 {
            return Err(AlignerError::Configuration {
                message: format!(
                    "merge tolerance must be positive, got {} seconds",
                    self.tolerance_secs
                ),
            });
        }
        Ok(())
    }
}

/// Read a blacklist file: one column name per line, trimmed and
/// lowercased, blank lines ignored. Missing or unreadable files log a
/// warning and contribute nothing.
pub fn load_blacklist_file(path: &Path) -> BTreeSet<String> {
    match fs::read_to_string(path) {
        Ok(contents) => contents
            .lines()
            .map(|line| line.trim().to_lowercase())
            .filter(|line| !line.is_empty())
            .collect(),
        Err(e) => {
            warn!("Could not read blacklist file {}: {}", path.display(), e);
            BTreeSet::new()
        }
    }
}
