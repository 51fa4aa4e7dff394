//! Correlate command implementation
//!
//! Loads two selections, aligns them into one frame, min-max normalizes
//! each side, and reports the Pearson correlation with its p-value.

use colored::Colorize;
use tracing::{debug, info};

use crate::cli::args::CorrelateArgs;
use crate::cli::commands::shared::{
    collect_tables, load_selections, resolve_config, setup_logging,
};
use crate::error::{AlignerError, Result};
use crate::header::normalize_header;
use crate::loader::DataLoader;
use crate::merge::build_aligned_frame;
use crate::stats::{Correlation, normalize, pearson};

/// Correlate command runner
pub fn run_correlate(args: CorrelateArgs) -> Result<()> {
    setup_logging(args.get_log_level(), args.quiet)?;
    args.validate()?;
    debug!("Correlate arguments: {:?}", args);

    let left_column = normalize_header(&args.left.column);
    let right_column = normalize_header(&args.right.column);
    if left_column == right_column {
        // Same-named columns coalesce into one during alignment, so the
        // two sides must be distinguishable by name.
        return Err(AlignerError::Configuration {
            message: format!(
                "left and right must select differently named columns, both normalize to '{}'",
                left_column
            ),
        });
    }

    let config = resolve_config(
        args.config_file.as_deref(),
        args.data_root.clone(),
        None,
        args.tolerance,
        args.direction,
    )?;

    let selections = [args.left.clone(), args.right.clone()];
    let mut loader = DataLoader::from_config(&config)?;
    load_selections(&mut loader, &selections)?;

    let tables = collect_tables(&loader, &selections);
    let columns = vec![left_column.clone(), right_column.clone()];

    info!(
        "Aligning {} table(s) for correlation within {}s ({})",
        tables.len(),
        config.tolerance_secs,
        config.direction
    );
    let aligned = build_aligned_frame(&tables, &columns, config.tolerance(), config.direction)?;

    let left = normalize(aligned.column(&left_column)?.as_materialized_series())?;
    let right = normalize(aligned.column(&right_column)?.as_materialized_series())?;

    println!("{}", "Correlation Report".bold());
    println!("{}", "==================".bold());
    println!("Left:       {}", args.left.to_string().cyan());
    println!("Right:      {}", args.right.to_string().cyan());
    println!("Rows:       {}", aligned.height());
    println!("Tolerance:  {}s ({})", config.tolerance_secs, config.direction);

    match pearson(&left, &right)? {
        Correlation::Defined { r, p } => {
            let r_text = format!("{:+.4}", r);
            let r_colored = if r.abs() >= 0.7 {
                r_text.green().bold()
            } else if r.abs() >= 0.3 {
                r_text.yellow()
            } else {
                r_text.normal()
            };
            println!("Pearson r:  {}", r_colored);
            println!("p-value:    {:.4e}", p);
        }
        Correlation::Undefined => {
            println!(
                "{}",
                "Correlation undefined: fewer than two paired rows or zero variance".yellow()
            );
        }
    }
    Ok(())
}
