//! Known spells and their prepared state. Slots belong to spellcasting stats.

use std::collections::BTreeMap;

use crate::classify::PriorityRules;
use crate::errors::ExError;
use crate::extract::{CharacterSheet, SpellEntry};
use crate::model::{
    Change, ChangeCategory, ChangePriority, ChangeType, DetectionContext, Diagnostics,
};
use crate::rules::RulesData;

use super::{ChangeDetector, DetectorBase};

pub struct SpellsDetector {
    base: DetectorBase,
}

impl SpellsDetector {
    pub fn new() -> Self {
        Self {
            base: DetectorBase::new(
                "spells",
                PriorityRules::new()
                    .rule("spells.*.prepared", ChangePriority::Low)
                    .domain_default(ChangeType::Added, ChangePriority::Medium)
                    .domain_default(ChangeType::Removed, ChangePriority::Medium),
            ),
        }
    }
}

impl Default for SpellsDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn by_key(spells: &[SpellEntry]) -> BTreeMap<&str, &SpellEntry> {
    spells.iter().map(|s| (s.key.as_str(), s)).collect()
}

fn level_label(level: Option<i64>) -> String {
    match level {
        Some(0) => " (cantrip)".to_string(),
        Some(l) => format!(" (level {l})"),
        None => String::new(),
    }
}

impl ChangeDetector for SpellsDetector {
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
        let old_spells = by_key(&old.spells);
        let new_spells = by_key(&new.spells);
        let mut changes = Vec::new();

        for spell in &new.spells {
            let path = format!("spells.{}", spell.key);
            match old_spells.get(spell.key.as_str()) {
                None => changes.push(
                    self.base
                        .change(
                            ctx,
                            path,
                            ChangeType::Added,
                            ChangeCategory::Spells,
                            format!("Learned spell: {}{}", spell.name, level_label(spell.level)),
                        )
                        .with_values(None, Some(spell.value.clone())),
                ),
                Some(previous) => {
                    if previous.prepared.is_none() && spell.prepared.is_none() {
                        continue;
                    }
                    let (was, is) = (
                        previous.prepared.unwrap_or(false),
                        spell.prepared.unwrap_or(false),
                    );
                    if was == is {
                        continue;
                    }
                    let description = if is {
                        format!("{} is now prepared", spell.name)
                    } else {
                        format!("{} is no longer prepared", spell.name)
                    };
                    changes.push(
                        self.base
                            .change(
                                ctx,
                                format!("{path}.prepared"),
                                ChangeType::Modified,
                                ChangeCategory::Spells,
                                description,
                            )
                            .with_values(Some(was.into()), Some(is.into())),
                    );
                }
            }
        }
        for spell in &old.spells {
            if !new_spells.contains_key(spell.key.as_str()) {
                changes.push(
                    self.base
                        .change(
                            ctx,
                            format!("spells.{}", spell.key),
                            ChangeType::Removed,
                            ChangeCategory::Spells,
                            format!("Forgot spell: {}{}", spell.name, level_label(spell.level)),
                        )
                        .with_values(Some(spell.value.clone()), None),
                );
            }
        }
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::{find, paths, run};
    use serde_json::json;

    #[test]
    fn test_spell_added_removed_and_prepared() {
        let changes = run(
            &SpellsDetector::new(),
            json!({"spells": [
                {"name": "Magic Missile", "level": 1, "prepared": false},
                {"name": "Sleep", "level": 1}
            ]}),
            json!({"spells": [
                {"name": "magic missile", "level": 1, "prepared": true},
                {"name": "Fireball", "level": 3}
            ]}),
        );
        let added = find(&changes, "spells.fireball");
        assert_eq!(added.change_type, ChangeType::Added);
        assert_eq!(added.priority, ChangePriority::Medium);
        assert!(added.description.contains("level 3"));
        assert_eq!(find(&changes, "spells.sleep").change_type, ChangeType::Removed);
        let prepared = find(&changes, "spells.magic_missile.prepared");
        assert_eq!(prepared.priority, ChangePriority::Low);
        assert_eq!(prepared.new_value, Some(json!(true)));
        assert_eq!(changes.len(), 3);
    }

    #[test]
    fn test_spell_slots_are_not_reported_here() {
        let changes = run(
            &SpellsDetector::new(),
            json!({"spell_slots": {"1": 2}}),
            json!({"spell_slots": {"1": 3}}),
        );
        assert!(paths(&changes).is_empty());
    }
}
