//! Audience-specific filtering and formatting of a detection batch.
//!
//! Two audiences are supported: `discord`, a terse one-line-per-change feed,
//! and `change_log`, a verbose audit trail that spells out attribution and
//! causation. Presentation never reorders changes.

pub mod format;
pub mod score;

pub use format::{brief_line, category_emoji, verbose_text};
pub use score::{importance, summarize};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::errors::{Result, SheetDiffError};
use crate::model::{
    Change, ChangeAttribution, ChangeCategory, ChangeCausation, ChangePriority, DetectionResult,
};

/// Who the presentation is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Audience {
    Discord,
    ChangeLog,
}

impl Audience {
    /// Parse an audience tag.
    ///
    /// # Errors
    ///
    /// Returns `SheetDiffError::UnknownAudience` for anything other than
    /// `discord` or `change_log`.
    pub fn parse(tag: &str) -> Result<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "discord" => Ok(Audience::Discord),
            "change_log" | "changelog" => Ok(Audience::ChangeLog),
            _ => Err(SheetDiffError::UnknownAudience {
                audience: tag.to_string(),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Audience::Discord => "discord",
            Audience::ChangeLog => "change_log",
        }
    }
}

fn default_summary_threshold() -> usize {
    10
}

fn default_max_discord_length() -> usize {
    180
}

/// Presentation options, loadable from the `[presentation]` config table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PresentationConfig {
    /// Discord keeps only high and critical changes
    pub discord_only_high_priority: bool,
    /// Applied to both audiences
    pub min_priority: Option<ChangePriority>,
    pub excluded_categories: Vec<ChangeCategory>,
    /// Summary is produced when more changes than this survive filtering
    pub summary_threshold: usize,
    pub max_discord_length: usize,
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self {
            discord_only_high_priority: false,
            min_priority: None,
            excluded_categories: Vec::new(),
            summary_threshold: default_summary_threshold(),
            max_discord_length: default_max_discord_length(),
        }
    }
}

/// One formatted change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresentedChange {
    pub field_path: String,
    pub text: String,
    pub importance: i64,
    pub priority: ChangePriority,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presentation {
    pub entries: Vec<PresentedChange>,
    pub summary: Option<String>,
}

impl Presentation {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries ordered by importance, highest first; ties keep batch order.
    pub fn ranked(&self) -> Vec<&PresentedChange> {
        let mut ranked: Vec<&PresentedChange> = self.entries.iter().collect();
        ranked.sort_by(|a, b| b.importance.cmp(&a.importance));
        ranked
    }
}

/// Order-preserving audience filter.
pub fn filter<'a>(
    changes: &'a [Change],
    audience: Audience,
    config: &PresentationConfig,
) -> Vec<&'a Change> {
    let excluded: HashSet<ChangeCategory> = config.excluded_categories.iter().copied().collect();
    changes
        .iter()
        .filter(|c| !excluded.contains(&c.category))
        .filter(|c| config.min_priority.map_or(true, |min| c.priority >= min))
        .filter(|c| {
            audience != Audience::Discord
                || !config.discord_only_high_priority
                || c.priority.is_high_or_above()
        })
        .collect()
}

/// Filter, format and score a batch for one audience.
pub fn present(
    changes: &[Change],
    attributions: &BTreeMap<String, ChangeAttribution>,
    causations: &BTreeMap<String, ChangeCausation>,
    audience: Audience,
    config: &PresentationConfig,
) -> Presentation {
    let kept = filter(changes, audience, config);
    let entries = kept
        .iter()
        .map(|change| {
            let attribution = attributions.get(&change.field_path);
            let causation = causations.get(&change.field_path);
            let text = match audience {
                Audience::Discord => brief_line(change, config.max_discord_length),
                Audience::ChangeLog => verbose_text(change, attribution, causation),
            };
            PresentedChange {
                field_path: change.field_path.clone(),
                text,
                importance: importance(change, attribution, causation),
                priority: change.priority,
            }
        })
        .collect();
    let summary = (kept.len() > config.summary_threshold).then(|| summarize(&kept));
    Presentation { entries, summary }
}

/// [`present`] over a complete detection result.
pub fn present_result(
    result: &DetectionResult,
    audience: Audience,
    config: &PresentationConfig,
) -> Presentation {
    present(
        &result.changes,
        &result.attributions,
        &result.causations,
        audience,
        config,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChangeType;
    use chrono::Utc;
    use serde_json::json;

    fn change(path: &str, priority: ChangePriority, category: ChangeCategory) -> Change {
        Change::new(
            path,
            ChangeType::Modified,
            category,
            priority,
            format!("{path} changed"),
            Utc::now(),
        )
        .with_values(Some(json!("a")), Some(json!("b")))
    }

    fn mixed() -> Vec<Change> {
        vec![
            change("a", ChangePriority::Low, ChangeCategory::Skills),
            change("b", ChangePriority::High, ChangeCategory::Abilities),
            change("c", ChangePriority::Medium, ChangeCategory::Combat),
            change("d", ChangePriority::Critical, ChangeCategory::Progression),
            change("e", ChangePriority::High, ChangeCategory::Features),
        ]
    }

    #[test]
    fn test_audience_parse() {
        assert_eq!(Audience::parse("discord").unwrap(), Audience::Discord);
        assert_eq!(Audience::parse("CHANGE_LOG").unwrap(), Audience::ChangeLog);
        assert!(matches!(
            Audience::parse("email"),
            Err(SheetDiffError::UnknownAudience { .. })
        ));
    }

    #[test]
    fn test_discord_high_only_keeps_order() {
        let changes = mixed();
        let config = PresentationConfig {
            discord_only_high_priority: true,
            ..Default::default()
        };
        let kept: Vec<&str> = filter(&changes, Audience::Discord, &config)
            .iter()
            .map(|c| c.field_path.as_str())
            .collect();
        assert_eq!(kept, ["b", "d", "e"]);

        // the flag is discord-only
        assert_eq!(filter(&changes, Audience::ChangeLog, &config).len(), 5);
    }

    #[test]
    fn test_min_priority_and_excluded_categories() {
        let changes = mixed();
        let config = PresentationConfig {
            min_priority: Some(ChangePriority::Medium),
            excluded_categories: vec![ChangeCategory::Features],
            ..Default::default()
        };
        let kept: Vec<&str> = filter(&changes, Audience::ChangeLog, &config)
            .iter()
            .map(|c| c.field_path.as_str())
            .collect();
        assert_eq!(kept, ["b", "c", "d"]);
    }

    #[test]
    fn test_summary_only_above_threshold() {
        let changes = mixed();
        let empty = BTreeMap::new();
        let config = PresentationConfig {
            summary_threshold: 4,
            ..Default::default()
        };
        let p = present(&changes, &empty, &BTreeMap::new(), Audience::Discord, &config);
        assert_eq!(p.entries.len(), 5);
        assert!(p.summary.is_some());

        let config = PresentationConfig::default();
        let p = present(&changes, &empty, &BTreeMap::new(), Audience::Discord, &config);
        assert!(p.summary.is_none());
    }

    #[test]
    fn test_ranked_by_importance() {
        let changes = mixed();
        let p = present(
            &changes,
            &BTreeMap::new(),
            &BTreeMap::new(),
            Audience::ChangeLog,
            &PresentationConfig::default(),
        );
        let top: Vec<&str> = p.ranked().iter().map(|e| e.field_path.as_str()).collect();
        assert_eq!(top[0], "d");
        assert_eq!(top[4], "a");
    }

    #[test]
    fn test_config_defaults_from_partial_toml_like_json() {
        let config: PresentationConfig =
            serde_json::from_value(json!({"min_priority": "high"})).unwrap();
        assert_eq!(config.min_priority, Some(ChangePriority::High));
        assert_eq!(config.summary_threshold, 10);
        assert_eq!(config.max_discord_length, 180);
        assert!(!config.discord_only_high_priority);
    }
}
