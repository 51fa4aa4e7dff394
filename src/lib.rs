//! Sensor Aligner Library
//!
//! A Rust library for loading heterogeneous time-stamped sensor CSV
//! exports (soil moisture probes, TVWS radio link logs, ambient weather
//! stations) and producing time-aligned joined datasets.
//!
//! This library provides tools for:
//! - Locating the real header row in files with metadata preambles
//! - Normalizing inconsistent column naming across capture tools
//! - Resolving split, combined, or ad-hoc timestamp conventions into one
//!   canonical datetime column
//! - Cataloging a data root and discovering categories, columns, and
//!   per-instance special values
//! - Storing loaded tables keyed by category, instance, and special value
//! - Asof-joining independently sampled series within a tolerance window
//! - Min-max normalization and Pearson correlation over aligned series

pub mod catalog;
pub mod config;
pub mod constants;
pub mod error;
pub mod header;
pub mod loader;
pub mod merge;
pub mod models;
pub mod stats;
pub mod timestamp;

// CLI modules
pub mod cli;

// Re-export commonly used types
pub use config::AlignerConfig;
pub use error::{AlignerError, Result};
pub use loader::{DataLoader, DiscoverySnapshot};
pub use models::{Category, InstanceKey, MergeDirection, NormalizedTable, SpecialKey, StoreKey};
