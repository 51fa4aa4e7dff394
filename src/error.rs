//! Error handling for sensor loading and alignment operations.
//!
//! Provides error types with context for file parsing, datetime
//! resolution, and merge failures. Per-file problems during a load are
//! logged and skipped rather than surfaced through these types; see the
//! loader for that policy.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AlignerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("Data root not found at path: {path}")]
    DataRootNotFound { path: PathBuf },

    #[error("Invalid sensor CSV in file: {path} - {reason}")]
    InvalidFormat { path: PathBuf, reason: String },

    #[error("No datetime column resolved in file: {path}")]
    DatetimeUnresolved { path: PathBuf },

    #[error("Snapshot serialization failed: {0}")]
    Snapshot(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Insufficient aligned data: {rows} row(s) after merge, need at least {needed}")]
    InsufficientAlignedData { rows: usize, needed: usize },

    #[error("Merge failed: {reason}")]
    MergeFailed { reason: String },
}

pub type Result<T> = std::result::Result<T, AlignerError>;
