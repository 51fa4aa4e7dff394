//! Align command implementation
//!
//! Loads every selected series, builds the time-aligned merged table,
//! and writes it as CSV to a file or stdout.

use colored::Colorize;
use tracing::{debug, info};

use crate::cli::args::AlignArgs;
use crate::cli::commands::shared::{
    collect_tables, load_selections, resolve_config, setup_logging, write_frame,
};
use crate::error::Result;
use crate::loader::DataLoader;
use crate::merge::build_aligned_frame;

/// Align command runner
pub fn run_align(args: AlignArgs) -> Result<()> {
    setup_logging(args.get_log_level(), args.quiet)?;
    args.validate()?;
    debug!("Align arguments: {:?}", args);

    let config = resolve_config(
        args.config_file.as_deref(),
        args.data_root.clone(),
        args.blacklist_file.as_deref(),
        args.tolerance,
        args.direction,
    )?;

    let mut loader = DataLoader::from_config(&config)?;
    load_selections(&mut loader, args.select.selections())?;

    let tables = collect_tables(&loader, args.select.selections());
    let columns: Vec<String> = args
        .select
        .selections()
        .iter()
        .map(|selection| selection.column.clone())
        .collect();

    info!(
        "Aligning {} table(s) on {} column(s) within {}s ({})",
        tables.len(),
        columns.len(),
        config.tolerance_secs,
        config.direction
    );
    let mut aligned = build_aligned_frame(&tables, &columns, config.tolerance(), config.direction)?;

    let rows = aligned.height();
    let width = aligned.width();
    write_frame(&mut aligned, args.output.as_deref())?;

    // The summary only goes to the terminal when stdout is not already
    // carrying the CSV itself.
    if let Some(path) = &args.output {
        if !args.quiet {
            println!(
                "{} Aligned {} rows x {} columns -> {}",
                "✓".green().bold(),
                rows,
                width,
                path.display()
            );
        }
    }
    Ok(())
}
