//! TOML configuration file
//!
//! ```toml
//! [engine]
//! parallel = true
//! disabled = ["personality"]
//!
//! [presentation]
//! discord_only_high_priority = true
//! min_priority = "medium"
//! excluded_categories = ["metadata"]
//! summary_threshold = 10
//! max_discord_length = 180
//! ```
//!
//! Both tables and every key are optional.

use serde::Deserialize;
use sheetdiff_core::{EngineConfig, PresentationConfig, SheetDiffError};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CliConfig {
    pub engine: EngineConfig,
    pub presentation: PresentationConfig,
}

impl CliConfig {
    pub fn parse(text: &str) -> Result<Self, SheetDiffError> {
        toml::from_str(text).map_err(|e| SheetDiffError::InvalidConfig {
            message: e.to_string(),
        })
    }

    /// Load from `path`, or defaults when no path is given.
    pub fn load(path: Option<&Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path).map_err(|e| SheetDiffError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Ok(Self::parse(&text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sheetdiff_core::{ChangeCategory, ChangePriority};

    #[test]
    fn test_empty_config_is_default() {
        assert_eq!(CliConfig::parse("").unwrap(), CliConfig::default());
    }

    #[test]
    fn test_partial_tables() {
        let config = CliConfig::parse(
            r#"
            [engine]
            parallel = false

            [presentation]
            min_priority = "high"
            excluded_categories = ["social", "metadata"]
            "#,
        )
        .unwrap();
        assert!(!config.engine.parallel);
        assert!(config.engine.disabled.is_empty());
        assert_eq!(config.presentation.min_priority, Some(ChangePriority::High));
        assert_eq!(
            config.presentation.excluded_categories,
            [ChangeCategory::Social, ChangeCategory::Metadata]
        );
        assert_eq!(config.presentation.summary_threshold, 10);
    }

    #[test]
    fn test_unknown_table_rejected() {
        let err = CliConfig::parse("[detectors]\nfoo = 1\n").unwrap_err();
        assert!(matches!(err, SheetDiffError::InvalidConfig { .. }));
    }
}
