//! Command-line argument definitions for the sensor aligner.
//!
//! Defines the CLI surface with the clap derive API: the `scan`, `align`
//! and `correlate` subcommands, the selector syntax shared by the latter
//! two, and per-command validation.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};

use crate::error::{AlignerError, Result};
use crate::models::MergeDirection;

/// CLI arguments for the sensor CSV alignment tool
///
/// Loads heterogeneous time-stamped sensor CSV exports (soil moisture,
/// TVWS radio link quality, ambient weather) and produces time-aligned
/// joined datasets for correlation analysis and model training.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "sensor-aligner",
    version,
    about = "Load and time-align heterogeneous sensor CSV exports",
    long_about = "Loads time-stamped sensor CSV exports with inconsistent header layouts, \
                  timestamp formats, and column naming, and produces time-aligned joined \
                  datasets usable for correlation analysis, plotting, and regression modeling. \
                  Series sampled at different rates are paired by nearest timestamp within a \
                  configurable tolerance window."
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Discover categories, columns, and special values under a data root
    Scan(ScanArgs),
    /// Load selections and write the time-aligned merged table
    Align(AlignArgs),
    /// Correlate two selections after alignment and normalization
    Correlate(CorrelateArgs),
}

/// Arguments for the scan command
#[derive(Debug, Clone, Parser)]
pub struct ScanArgs {
    /// Root folder scanned recursively for sensor CSV exports
    #[arg(
        short = 'd',
        long = "data-root",
        value_name = "PATH",
        help = "Root folder containing sensor CSV exports"
    )]
    pub data_root: Option<PathBuf>,

    /// Optional TOML configuration file layered under the flags
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Text file of column names to hide from discovery listings,
    /// one per line
    #[arg(long = "blacklist-file", value_name = "FILE")]
    pub blacklist_file: Option<PathBuf>,

    /// Output format for the discovery report
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Human)]
    pub format: OutputFormat,

    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

/// Arguments for the align command
#[derive(Debug, Clone, Parser)]
pub struct AlignArgs {
    /// Series to load and align, as a comma-separated list of
    /// CATEGORY[:INSTANCE]:COLUMN selectors
    ///
    /// Examples: "soil:1:soil moisture value,tvws:1:drssi" or
    /// "ambient:outdoor temperature" for categories without instances.
    #[arg(
        short = 's',
        long = "select",
        value_name = "SELECTORS",
        help = "Comma-separated CATEGORY[:INSTANCE]:COLUMN selectors"
    )]
    pub select: SelectionList,

    /// Asof-join tolerance window in seconds
    #[arg(short = 't', long = "tolerance", value_name = "SECS")]
    pub tolerance: Option<i64>,

    /// Asof-join direction: nearest or backward
    #[arg(long = "direction", value_name = "DIRECTION")]
    pub direction: Option<MergeDirection>,

    /// Write the aligned table to this CSV file instead of stdout
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Root folder scanned recursively for sensor CSV exports
    #[arg(short = 'd', long = "data-root", value_name = "PATH")]
    pub data_root: Option<PathBuf>,

    /// Optional TOML configuration file layered under the flags
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Text file of column names to hide from discovery listings
    #[arg(long = "blacklist-file", value_name = "FILE")]
    pub blacklist_file: Option<PathBuf>,

    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

/// Arguments for the correlate command
#[derive(Debug, Clone, Parser)]
pub struct CorrelateArgs {
    /// Left series, as a CATEGORY[:INSTANCE]:COLUMN selector
    #[arg(short = 'l', long = "left", value_name = "SELECTOR")]
    pub left: Selection,

    /// Right series, as a CATEGORY[:INSTANCE]:COLUMN selector
    #[arg(short = 'r', long = "right", value_name = "SELECTOR")]
    pub right: Selection,

    /// Asof-join tolerance window in seconds
    #[arg(short = 't', long = "tolerance", value_name = "SECS")]
    pub tolerance: Option<i64>,

    /// Asof-join direction: nearest or backward
    #[arg(long = "direction", value_name = "DIRECTION")]
    pub direction: Option<MergeDirection>,

    /// Root folder scanned recursively for sensor CSV exports
    #[arg(short = 'd', long = "data-root", value_name = "PATH")]
    pub data_root: Option<PathBuf>,

    /// Optional TOML configuration file layered under the flags
    #[arg(short = 'c', long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except warnings and errors
    #[arg(short = 'q', long = "quiet")]
    pub quiet: bool,
}

/// Output formats for the scan report
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Colored human-readable summary
    Human,
    /// Machine-readable JSON
    Json,
}

/// One series request: a category, an optional instance id, and a
/// column name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub category: String,
    pub instance: Option<i64>,
    pub column: String,
}

impl FromStr for Selection {
    type Err = AlignerError;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').map(str::trim).collect();
        let (category, instance, column) = match parts.as_slice() {
            [category, column] => (*category, None, *column),
            [category, instance, column] => {
                let id = instance.parse::<i64>().map_err(|_| invalid_selector(s))?;
                (*category, Some(id), *column)
            }
            _ => return Err(invalid_selector(s)),
        };
        if category.is_empty() || column.is_empty() {
            return Err(invalid_selector(s));
        }
        Ok(Selection {
            category: category.to_lowercase(),
            instance,
            column: column.to_string(),
        })
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.instance {
            Some(id) => write!(f, "{}:{}:{}", self.category, id, self.column),
            None => write!(f, "{}:{}", self.category, self.column),
        }
    }
}

fn invalid_selector(s: &str) -> AlignerError {
    AlignerError::Configuration {
        message: format!(
            "Invalid selector '{}'. Expected CATEGORY[:INSTANCE]:COLUMN, \
             e.g. 'soil:1:soil moisture value' or 'ambient:outdoor temperature'",
            s
        ),
    }
}

/// Comma-separated list of selectors
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionList(pub Vec<Selection>);

impl FromStr for SelectionList {
    type Err = AlignerError;

    fn from_str(s: &str) -> Result<Self> {
        let selections: Vec<Selection> = s
            .split(',')
            .filter(|part| !part.trim().is_empty())
            .map(Selection::from_str)
            .collect::<Result<_>>()?;
        if selections.is_empty() {
            return Err(AlignerError::Configuration {
                message: "At least one selector is required".to_string(),
            });
        }
        Ok(SelectionList(selections))
    }
}

impl SelectionList {
    pub fn selections(&self) -> &[Selection] {
        &self.0
    }
}

impl ScanArgs {
    pub fn get_log_level(&self) -> &'static str {
        log_level(self.verbose, self.quiet)
    }
}

impl AlignArgs {
    pub fn get_log_level(&self) -> &'static str {
        log_level(self.verbose, self.quiet)
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(tolerance) = self.tolerance {
            if tolerance <= 0 {
                return Err(AlignerError::Configuration {
                    message: format!("merge tolerance must be positive, got {}", tolerance),
                });
            }
        }
        Ok(())
    }
}

impl CorrelateArgs {
    pub fn get_log_level(&self) -> &'static str {
        log_level(self.verbose, self.quiet)
    }

    pub fn validate(&self) -> Result<()> {
        if self.left == self.right {
            return Err(AlignerError::Configuration {
                message: "left and right selectors are identical; correlation would be trivial"
                    .to_string(),
            });
        }
        if let Some(tolerance) = self.tolerance {
            if tolerance <= 0 {
                return Err(AlignerError::Configuration {
                    message: format!("merge tolerance must be positive, got {}", tolerance),
                });
            }
        }
        Ok(())
    }
}

fn log_level(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        "warn"
    } else {
        match verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_with_instance() {
        let selection: Selection = "soil:1:soil moisture value".parse().unwrap();
        assert_eq!(selection.category, "soil");
        assert_eq!(selection.instance, Some(1));
        assert_eq!(selection.column, "soil moisture value");
    }

    #[test]
    fn test_selection_without_instance() {
        let selection: Selection = "ambient:outdoor temperature".parse().unwrap();
        assert_eq!(selection.category, "ambient");
        assert_eq!(selection.instance, None);
        assert_eq!(selection.column, "outdoor temperature");
    }

    #[test]
    fn test_selection_category_is_lowercased() {
        let selection: Selection = "TVWSScenario:2:DRSSI".parse().unwrap();
        assert_eq!(selection.category, "tvwsscenario");
        assert_eq!(selection.column, "DRSSI");
    }

    #[test]
    fn test_invalid_selections_rejected() {
        assert!("".parse::<Selection>().is_err());
        assert!("justcategory".parse::<Selection>().is_err());
        assert!("soil:x:column".parse::<Selection>().is_err());
        assert!(":1:column".parse::<Selection>().is_err());
        assert!("soil:1:".parse::<Selection>().is_err());
    }

    #[test]
    fn test_selection_list_parsing() {
        let list: SelectionList = "soil:1:soil moisture value,tvws:1:drssi".parse().unwrap();
        assert_eq!(list.selections().len(), 2);
        assert_eq!(list.selections()[1].category, "tvws");

        assert!("".parse::<SelectionList>().is_err());
    }

    #[test]
    fn test_log_levels() {
        assert_eq!(log_level(0, false), "info");
        assert_eq!(log_level(1, false), "debug");
        assert_eq!(log_level(3, false), "trace");
        assert_eq!(log_level(2, true), "warn");
    }

    #[test]
    fn test_args_parse_align() {
        let args = Args::try_parse_from([
            "sensor-aligner",
            "align",
            "--select",
            "soil:1:soil moisture value,tvws:1:drssi",
            "--tolerance",
            "5",
            "--direction",
            "nearest",
        ])
        .unwrap();
        match args.command {
            Some(Commands::Align(align)) => {
                assert_eq!(align.select.selections().len(), 2);
                assert_eq!(align.tolerance, Some(5));
                assert_eq!(align.direction, Some(MergeDirection::Nearest));
                assert!(align.validate().is_ok());
            }
            _ => panic!("expected align subcommand"),
        }
    }
}
