//! Command-line interface for the sensor aligner.

pub mod args;
pub mod commands;
