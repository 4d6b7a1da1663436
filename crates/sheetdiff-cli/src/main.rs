//! sheetdiff CLI
//!
//! Command-line interface for comparing character sheet snapshots

use clap::{Parser, Subcommand};
use sheetdiff_core::logging_facility::{init, Profile};

mod commands;
mod config;
mod input;

#[derive(Debug, Parser)]
#[command(name = "sheetdiff")]
#[command(about = "sheetdiff - Semantic diffs of character sheet snapshots", long_about = None)]
struct Cli {
    /// Logging profile: development or production
    #[arg(long, global = true, default_value = "development")]
    log_profile: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print the full detection result as JSON
    Diff(commands::diff::DiffArgs),
    /// Print the changes formatted for one audience
    Render(commands::render::RenderArgs),
}

fn main() {
    let cli = Cli::parse();

    let Some(profile) = Profile::parse(&cli.log_profile) else {
        eprintln!("Error: unknown log profile '{}'", cli.log_profile);
        std::process::exit(2);
    };
    init(profile);

    let result = match cli.command {
        Commands::Diff(args) => commands::diff::execute(args),
        Commands::Render(args) => commands::render::execute(args),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
