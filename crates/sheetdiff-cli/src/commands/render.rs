//! Render command
//!
//! Usage: sheetdiff render --old <FILE> --new <FILE> --audience <discord|change_log> [--config <FILE>]

use clap::Args;
use sheetdiff_core::{present_result, Audience, DetectionEngine, Presentation};
use std::path::PathBuf;

use crate::config::CliConfig;
use crate::input::{context_for, read_snapshot};

#[derive(Debug, Args)]
pub struct RenderArgs {
    /// Earlier snapshot (JSON)
    #[arg(long)]
    pub old: PathBuf,

    /// Later snapshot (JSON)
    #[arg(long)]
    pub new: PathBuf,

    /// Target audience: discord or change_log
    #[arg(short, long, default_value = "discord")]
    pub audience: String,

    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output file path (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Execute render command
pub fn execute(args: RenderArgs) -> Result<(), Box<dyn std::error::Error>> {
    let audience = Audience::parse(&args.audience)?;
    let config = CliConfig::load(args.config.as_deref())?;

    let old = read_snapshot(&args.old)?;
    let new = read_snapshot(&args.new)?;
    let ctx = context_for(&args.old, &args.new, &old, &new);

    let engine = DetectionEngine::new().with_config(config.engine);
    let result = engine.detect(&old, &new, &ctx)?;
    let presentation = present_result(&result, audience, &config.presentation);
    let text = render_text(&presentation);

    if let Some(output_path) = args.output {
        std::fs::write(&output_path, text)?;
        println!("✓ Rendered to {}", output_path.display());
    } else {
        print!("{}", text);
    }

    Ok(())
}

/// One line per entry, then the summary line when there is one.
fn render_text(presentation: &Presentation) -> String {
    let mut out = String::new();
    for entry in &presentation.entries {
        out.push_str(&entry.text);
        out.push('\n');
    }
    if let Some(summary) = &presentation.summary {
        out.push_str(&format!("Summary: {}\n", summary));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetdiff_core::present::PresentedChange;
    use sheetdiff_core::ChangePriority;

    #[test]
    fn test_render_text_appends_summary() {
        let presentation = Presentation {
            entries: vec![PresentedChange {
                field_path: "character_info.level".to_string(),
                text: "📈 Level increased from 3 to 4".to_string(),
                importance: 60,
                priority: ChangePriority::High,
            }],
            summary: Some("1 changes (progression 1); priority: high 1".to_string()),
        };
        assert_eq!(
            render_text(&presentation),
            "📈 Level increased from 3 to 4\nSummary: 1 changes (progression 1); priority: high 1\n"
        );
        assert_eq!(render_text(&Presentation::default()), "");
    }
}
