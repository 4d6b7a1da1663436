//! Personality traits, ideals, bonds, flaws and free-text descriptions.

use serde_json::Value;
use std::collections::BTreeSet;

use crate::classify::PriorityRules;
use crate::errors::ExError;
use crate::extract::{slug, CharacterSheet, PersonalityValue, PERSONALITY_LIST_KINDS};
use crate::model::{Change, ChangeCategory, ChangePriority, ChangeType, DetectionContext, Diagnostics};
use crate::rules::RulesData;

use super::{ChangeDetector, DetectorBase};

/// Longest entry slug used as a path segment
const ENTRY_SEGMENT_MAX: usize = 48;

pub struct PersonalityDetector {
    base: DetectorBase,
}

impl PersonalityDetector {
    pub fn new() -> Self {
        Self {
            base: DetectorBase::new("personality", PriorityRules::fixed(ChangePriority::Low)),
        }
    }
}

impl Default for PersonalityDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn entries(value: Option<&PersonalityValue>) -> Vec<&str> {
    match value {
        Some(PersonalityValue::List(items)) => items.iter().map(String::as_str).collect(),
        Some(PersonalityValue::Text(text)) => vec![text.as_str()],
        None => Vec::new(),
    }
}

fn text(value: Option<&PersonalityValue>) -> Option<String> {
    match value {
        Some(PersonalityValue::List(items)) if items.is_empty() => None,
        Some(PersonalityValue::List(items)) => Some(items.join("; ")),
        Some(PersonalityValue::Text(t)) => Some(t.clone()),
        None => None,
    }
}

fn entry_segment(entry: &str) -> String {
    slug(entry).chars().take(ENTRY_SEGMENT_MAX).collect()
}

/// `bonds` → `bond`, `traits` → `trait`
fn singular(kind: &str) -> String {
    kind.strip_suffix('s').unwrap_or(kind).replace('_', " ")
}

impl ChangeDetector for PersonalityDetector {
    fn name(&self) -> &'static str {
        self.base.name()
    }

    fn detect(
        &self,
        old: &CharacterSheet,
        new: &CharacterSheet,
        ctx: &DetectionContext,
        _rules: &RulesData,
        _diag: &mut Diagnostics,
    ) -> Result<Vec<Change>, ExError> {
        let mut changes = Vec::new();
        let kinds: BTreeSet<&String> = old.personality.keys().chain(new.personality.keys()).collect();

        for kind in kinds {
            let before = old.personality.get(kind);
            let after = new.personality.get(kind);
            if PERSONALITY_LIST_KINDS.contains(&kind.as_str()) {
                let old_entries = entries(before);
                let new_entries = entries(after);
                let old_keys: BTreeSet<String> = old_entries.iter().map(|e| entry_segment(e)).collect();
                let new_keys: BTreeSet<String> = new_entries.iter().map(|e| entry_segment(e)).collect();
                for entry in &new_entries {
                    let segment = entry_segment(entry);
                    if segment.is_empty() || old_keys.contains(&segment) {
                        continue;
                    }
                    changes.push(
                        self.base
                            .change(
                                ctx,
                                format!("personality.{kind}.{segment}"),
                                ChangeType::Added,
                                ChangeCategory::Social,
                                format!("New {}: {entry}", singular(kind)),
                            )
                            .with_values(None, Some(Value::String(entry.to_string()))),
                    );
                }
                for entry in &old_entries {
                    let segment = entry_segment(entry);
                    if segment.is_empty() || new_keys.contains(&segment) {
                        continue;
                    }
                    changes.push(
                        self.base
                            .change(
                                ctx,
                                format!("personality.{kind}.{segment}"),
                                ChangeType::Removed,
                                ChangeCategory::Social,
                                format!("Removed {}: {entry}", singular(kind)),
                            )
                            .with_values(Some(Value::String(entry.to_string())), None),
                    );
                }
            } else {
                let (before, after) = (text(before), text(after));
                if before == after {
                    continue;
                }
                let change_type = match (&before, &after) {
                    (None, Some(_)) => ChangeType::Added,
                    (Some(_), None) => ChangeType::Removed,
                    _ => ChangeType::Modified,
                };
                let label = kind.replace('_', " ");
                changes.push(
                    self.base
                        .change(
                            ctx,
                            format!("personality.{kind}"),
                            change_type,
                            ChangeCategory::Social,
                            format!("Updated {label}"),
                        )
                        .with_values(before.map(Value::String), after.map(Value::String)),
                );
            }
        }
        Ok(changes)
    }
}
