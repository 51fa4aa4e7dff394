//! CLI command implementations
//!
//! One module per subcommand plus the shared helpers (logging setup,
//! layered configuration, selection loading, frame output). `run`
//! dispatches parsed arguments to the right command.

pub mod align;
pub mod correlate;
pub mod scan;
pub mod shared;

use crate::cli::args::{Args, Commands};
use crate::error::Result;

/// Dispatch a parsed command line to its command implementation
pub fn run(args: Args) -> Result<()> {
    match args.command {
        Some(Commands::Scan(scan_args)) => scan::run_scan(scan_args),
        Some(Commands::Align(align_args)) => align::run_align(align_args),
        Some(Commands::Correlate(correlate_args)) => correlate::run_correlate(correlate_args),
        None => Ok(()),
    }
}
