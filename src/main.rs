use clap::Parser;
use sensor_aligner::cli::{args::Args, commands};
use std::process;

fn main() {
    // Parse command line arguments
    let args = Args::parse();

    // If no subcommand was provided, show help and available commands
    if args.command.is_none() {
        show_help_and_commands();
        process::exit(0);
    }

    match commands::run(args) {
        Ok(()) => {
            process::exit(0);
        }
        Err(error) => {
            // Error occurred - print to stderr and exit with error code
            eprintln!("Error: {}", error);
            process::exit(1);
        }
    }
}

/// Show help information and available commands when no subcommand is provided
fn show_help_and_commands() {
    println!("Sensor Aligner - Field Sensor CSV Alignment Tool");
    println!("================================================");
    println!();
    println!("Load time-stamped sensor CSV exports with inconsistent layouts and");
    println!("produce time-aligned joined datasets for analysis and modeling.");
    println!();
    println!("USAGE:");
    println!("    sensor-aligner <COMMAND> [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    scan         Discover categories, columns, and special values");
    println!("    align        Load selections and write the time-aligned table");
    println!("    correlate    Correlate two selections after alignment");
    println!("    help         Show this help message or help for specific commands");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help       Show help information");
    println!("    -V, --version    Show version information");
    println!();
    println!("EXAMPLES:");
    println!("    # Discover what a data root contains:");
    println!("    sensor-aligner scan --data-root ./Data");
    println!();
    println!("    # Align soil moisture against TVWS link quality:");
    println!("    sensor-aligner align --select 'soil:1:soil moisture value,tvws:1:drssi' \\");
    println!("                         --tolerance 60 --output aligned.csv");
    println!();
    println!("    # Correlate the same pair:");
    println!("    sensor-aligner correlate --left 'soil:1:soil moisture value' \\");
    println!("                             --right 'tvws:1:drssi' --tolerance 60");
    println!();
    println!("For detailed help on any command, use:");
    println!("    sensor-aligner <COMMAND> --help");
}
