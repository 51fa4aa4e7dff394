//! Shared components for CLI commands
//!
//! Logging setup, layered configuration resolution, selection loading,
//! and frame output used by more than one subcommand.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use polars::prelude::*;
use tracing::{debug, info, warn};

use crate::cli::args::Selection;
use crate::config::AlignerConfig;
use crate::error::{AlignerError, Result};
use crate::loader::DataLoader;
use crate::models::{MergeDirection, NormalizedTable};

/// Set up structured logging to stderr
pub fn setup_logging(log_level: &str, quiet: bool) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sensor_aligner={}", log_level)));

    if quiet {
        // Minimal logging for quiet mode
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .init();
    } else {
        // Standard logging with timestamps
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_level(true)
                    .with_timer(fmt::time::uptime())
                    .with_writer(std::io::stderr),
            )
            .init();
    }

    debug!("Logging initialized at level: {}", log_level);
    Ok(())
}

/// Load configuration using the layered approach (defaults -> file -> flags)
pub fn resolve_config(
    config_file: Option<&Path>,
    data_root: Option<PathBuf>,
    blacklist_file: Option<&Path>,
    tolerance_secs: Option<i64>,
    direction: Option<MergeDirection>,
) -> Result<AlignerConfig> {
    let mut config = match config_file {
        Some(path) => {
            info!("Using config file: {}", path.display());
            AlignerConfig::from_file(path)?
        }
        None => AlignerConfig::default(),
    };

    if let Some(data_root) = data_root {
        config = config.with_data_root(data_root);
    }
    if let Some(tolerance) = tolerance_secs {
        config = config.with_tolerance_secs(tolerance);
    }
    if let Some(direction) = direction {
        config = config.with_direction(direction);
    }

    config = config.with_default_blacklist_file();
    if let Some(path) = blacklist_file {
        config = config.with_blacklist_file(path);
    }

    config.validate()?;
    Ok(config)
}

/// Create a progress bar with appropriate styling
pub fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap()
            .progress_chars("#>-"),
    );
    pb.set_message(message.to_string());
    pb
}

/// Group selections by their (category, instance) load target, merging
/// the requested columns per target
pub fn group_selections(
    selections: &[Selection],
) -> BTreeMap<(String, Option<i64>), BTreeSet<String>> {
    let mut groups: BTreeMap<(String, Option<i64>), BTreeSet<String>> = BTreeMap::new();
    for selection in selections {
        groups
            .entry((selection.category.clone(), selection.instance))
            .or_default()
            .insert(selection.column.clone());
    }
    groups
}

/// Load every selection's files into the loader, one load per distinct
/// (category, instance) target. A target matching no data logs a
/// warning; every target coming up empty is an error.
pub fn load_selections(loader: &mut DataLoader, selections: &[Selection]) -> Result<()> {
    let groups = group_selections(selections);
    let progress = create_progress_bar(groups.len() as u64, "Loading sensor files");

    let mut any_loaded = false;
    for ((category, instance), columns) in &groups {
        loader.load_data(category, *instance, columns)?;
        if loader.has_data(category, *instance) {
            any_loaded = true;
        } else {
            warn!(
                "No data loaded for category '{}' instance {:?} columns {:?}",
                category, instance, columns
            );
        }
        progress.inc(1);
    }
    progress.finish_and_clear();

    if !any_loaded {
        return Err(AlignerError::MergeFailed {
            reason: "no files matched the requested selections".to_string(),
        });
    }
    Ok(())
}

/// Every stored table backing the selections, one pass per distinct
/// (category, instance) target so shared targets are not double-counted
pub fn collect_tables<'a>(
    loader: &'a DataLoader,
    selections: &[Selection],
) -> Vec<&'a NormalizedTable> {
    let mut tables = Vec::new();
    for (category, instance) in group_selections(selections).keys() {
        tables.extend(loader.tables_for(category, *instance));
    }
    tables
}

/// Write a frame as CSV to a file, or to stdout when no path is given
pub fn write_frame(df: &mut DataFrame, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            let mut file = File::create(path).map_err(|e| AlignerError::Configuration {
                message: format!("could not create output file {}: {}", path.display(), e),
            })?;
            CsvWriter::new(&mut file).finish(df)?;
            info!("Aligned table written to {}", path.display());
        }
        None => {
            let mut stdout = std::io::stdout();
            CsvWriter::new(&mut stdout).finish(df)?;
        }
    }
    Ok(())
}
