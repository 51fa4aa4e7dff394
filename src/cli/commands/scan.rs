//! Scan command implementation
//!
//! Walks a data root, runs the discovery scans, and reports what is
//! available for loading: categories, columns, instance special values,
//! and the catalog size, in human-readable or JSON form.

use std::collections::BTreeMap;

use colored::Colorize;
use serde_json::json;
use tracing::info;

use crate::cli::args::{OutputFormat, ScanArgs};
use crate::cli::commands::shared::{resolve_config, setup_logging};
use crate::constants::is_shared_instance_category;
use crate::error::Result;
use crate::loader::DataLoader;

/// Scan command runner
pub fn run_scan(args: ScanArgs) -> Result<()> {
    setup_logging(args.get_log_level(), args.quiet)?;

    let config = resolve_config(
        args.config_file.as_deref(),
        args.data_root.clone(),
        args.blacklist_file.as_deref(),
        None,
        None,
    )?;

    info!("Scanning data root {}", config.data_root.display());
    let loader = DataLoader::from_config(&config)?;

    match args.format {
        OutputFormat::Human => print_human_report(&loader),
        OutputFormat::Json => print_json_report(&loader)?,
    }
    Ok(())
}

fn print_human_report(loader: &DataLoader) {
    println!("{}", "Sensor Data Discovery".bold());
    println!("{}", "=====================".bold());
    println!(
        "Data root: {} ({} CSV files)",
        loader.catalog().data_root().display(),
        loader.catalog().len()
    );

    if loader.categories().is_empty() {
        println!("\n{}", "No known sensor categories found.".yellow());
        return;
    }

    for category in loader.categories() {
        println!("\n{}", format!("Category: {}", category).cyan().bold());

        match loader.available_columns().get(category) {
            Some(columns) if !columns.is_empty() => {
                for column in columns {
                    println!("  - {}", column);
                }
            }
            _ => println!("  (no columns probed)"),
        }

        if !is_shared_instance_category(category.as_str()) {
            let specials = loader.special_values(category.as_str());
            if !specials.is_empty() {
                println!("  Special values:");
                for (instance, value) in specials {
                    println!("    instance {} -> {}", instance, value.green());
                }
            }
        }
    }

    if !loader.blacklist().is_empty() {
        println!(
            "\n{} column(s) hidden by the blacklist",
            loader.blacklist().len()
        );
    }
}

fn print_json_report(loader: &DataLoader) -> Result<()> {
    let snapshot = loader.snapshot();

    let special_values: BTreeMap<String, Vec<(i64, String)>> = loader
        .categories()
        .iter()
        .filter(|category| !is_shared_instance_category(category.as_str()))
        .map(|category| {
            (
                category.to_string(),
                loader.special_values(category.as_str()),
            )
        })
        .collect();

    let report = json!({
        "data_root": snapshot.data_root,
        "file_count": snapshot.files.len(),
        "categories": snapshot.categories,
        "available_columns": snapshot.available_columns,
        "special_values": special_values,
        "blacklist": snapshot.blacklist,
    });

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
