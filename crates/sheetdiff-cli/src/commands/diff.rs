//! Diff command
//!
//! Usage: sheetdiff diff --old <FILE> --new <FILE> [--config <FILE>] [--sequential] [--output <FILE>]

use clap::Args;
use sheetdiff_core::DetectionEngine;
use std::path::PathBuf;

use crate::config::CliConfig;
use crate::input::{context_for, read_snapshot};

#[derive(Debug, Args)]
pub struct DiffArgs {
    /// Earlier snapshot (JSON)
    #[arg(long)]
    pub old: PathBuf,

    /// Later snapshot (JSON)
    #[arg(long)]
    pub new: PathBuf,

    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Run detectors one after another instead of in parallel
    #[arg(long)]
    pub sequential: bool,

    /// Output file path (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Execute diff command
pub fn execute(args: DiffArgs) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = CliConfig::load(args.config.as_deref())?;
    if args.sequential {
        config.engine.parallel = false;
    }

    let old = read_snapshot(&args.old)?;
    let new = read_snapshot(&args.new)?;
    let ctx = context_for(&args.old, &args.new, &old, &new);

    let engine = DetectionEngine::new().with_config(config.engine);
    let result = engine.detect(&old, &new, &ctx)?;
    let json = serde_json::to_string_pretty(&result)?;

    if let Some(output_path) = args.output {
        std::fs::write(&output_path, json)?;
        println!("✓ {} changes written to {}", result.changes.len(), output_path.display());
    } else {
        println!("{}", json);
    }

    Ok(())
}
