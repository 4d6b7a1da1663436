//! Species (race), subrace, species traits and racial ability bonuses.

use serde_json::Value;

use crate::classify::PriorityRules;
use crate::errors::ExError;
use crate::extract::{Ability, CharacterSheet, SpeciesEntry};
use crate::model::metadata::{self as meta, trigger};
use crate::model::{
    Change, ChangeCategory, ChangePriority, ChangeType, DetectionContext, Diagnostics,
};
use crate::rules::{table_key, RulesData, SpeciesRules};

use super::{ChangeDetector, DetectorBase};

pub const SPECIES_PATH: &str = "character_info.species";
pub const SUBRACE_PATH: &str = "character_info.subrace";

pub struct SpeciesDetector {
    base: DetectorBase,
}

impl SpeciesDetector {
    pub fn new() -> Self {
        Self {
            base: DetectorBase::new(
                "species",
                PriorityRules::new()
                    .rule(SPECIES_PATH, ChangePriority::High)
                    .rule(SUBRACE_PATH, ChangePriority::Medium)
                    .rule("species.traits.*", ChangePriority::Medium)
                    .rule("abilities.*", ChangePriority::High),
            ),
        }
    }
}

impl Default for SpeciesDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Table entry for a species, preferring the `"<subrace> <species>"` entry.
pub fn species_rules<'r>(entry: &SpeciesEntry, rules: &'r RulesData) -> Option<&'r SpeciesRules> {
    entry
        .subrace
        .as_deref()
        .and_then(|sub| {
            let sub = table_key(sub);
            let name = table_key(&entry.name);
            if sub.ends_with(&name) {
                rules.species_rules(&sub)
            } else {
                rules.species_rules(&format!("{sub} {name}"))
            }
        })
        .or_else(|| rules.species_rules(&entry.name))
}

fn racial_bonus(rules: Option<&SpeciesRules>, ability: Ability) -> i64 {
    rules
        .and_then(|r| r.ability_bonuses.get(&ability).copied())
        .unwrap_or(0)
}

impl ChangeDetector for SpeciesDetector {
    fn name(&self) -> &'static str {
        self.base.name()
    }

    fn detect(
        &self,
        old: &CharacterSheet,
        new: &CharacterSheet,
        ctx: &DetectionContext,
        rules: &RulesData,
        diag: &mut Diagnostics,
    ) -> Result<Vec<Change>, ExError> {
        let mut changes = Vec::new();
        let old_name = old.species.as_ref().map(|s| s.name.as_str());
        let new_name = new.species.as_ref().map(|s| s.name.as_str());

        let species_change = self.base.text_presence(
            ctx,
            SPECIES_PATH,
            ChangeCategory::BasicInfo,
            "Species",
            old_name,
            new_name,
        );
        let species_changed = species_change.is_some();
        changes.extend(species_change);

        changes.extend(self.base.text_presence(
            ctx,
            SUBRACE_PATH,
            ChangeCategory::BasicInfo,
            "Subrace",
            old.species.as_ref().and_then(|s| s.subrace.as_deref()),
            new.species.as_ref().and_then(|s| s.subrace.as_deref()),
        ));

        let empty = Default::default();
        let old_traits = old.species.as_ref().map(|s| &s.traits).unwrap_or(&empty);
        let new_traits = new.species.as_ref().map(|s| &s.traits).unwrap_or(&empty);
        for (trait_slug, name) in new_traits.iter().filter(|(k, _)| !old_traits.contains_key(*k)) {
            changes.push(
                self.base
                    .change(
                        ctx,
                        format!("species.traits.{trait_slug}"),
                        ChangeType::Added,
                        ChangeCategory::Features,
                        format!("Gained species trait: {name}"),
                    )
                    .with_values(None, Some(Value::String(name.clone()))),
            );
        }
        for (trait_slug, name) in old_traits.iter().filter(|(k, _)| !new_traits.contains_key(*k)) {
            changes.push(
                self.base
                    .change(
                        ctx,
                        format!("species.traits.{trait_slug}"),
                        ChangeType::Removed,
                        ChangeCategory::Features,
                        format!("Lost species trait: {name}"),
                    )
                    .with_values(Some(Value::String(name.clone())), None),
            );
        }

        let subrace_changed = changes.iter().any(|c| c.field_path == SUBRACE_PATH);
        if !(species_changed || subrace_changed) {
            return Ok(changes);
        }
        let old_rules = old.species.as_ref().and_then(|s| species_rules(s, rules));
        let new_rules = new.species.as_ref().and_then(|s| species_rules(s, rules));
        if let (Some(entry), None) = (new.species.as_ref(), new_rules) {
            diag.record(
                self.base.name(),
                SPECIES_PATH,
                format!("no reference data for species '{}'", entry.name),
            );
        }
        let Some(new_species) = new_name else {
            return Ok(changes);
        };
        for ability in Ability::ALL {
            let expected = racial_bonus(new_rules, ability) - racial_bonus(old_rules, ability);
            let (before, after) = (old.score(ability), new.score(ability));
            if expected == 0 || after - before != expected {
                continue;
            }
            if let Some(change) = self.base.numeric(
                ctx,
                format!("abilities.{}", ability.name()),
                ChangeCategory::Abilities,
                ability.title(),
                before,
                after,
            ) {
                changes.push(
                    change
                        .with_meta(meta::CAUSATION_TRIGGER, trigger::RACE_CHANGE)
                        .with_meta(meta::CAUSED_BY_RACE, new_species)
                        .with_meta(meta::CAUSED_BY, SPECIES_PATH),
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
    fn test_species_change_with_racial_bonus() {
        let changes = run(
            &SpeciesDetector::new(),
            json!({"character_info": {"species": "Human"},
                   "abilities": {"ability_scores": {"dexterity": 13, "constitution": 13}}}),
            json!({"character_info": {"species": "Elf"},
                   "abilities": {"ability_scores": {"dexterity": 14, "constitution": 12}}}),
        );
        let species = find(&changes, SPECIES_PATH);
        assert_eq!(species.change_type, ChangeType::Modified);
        assert_eq!(species.priority, ChangePriority::High);
        assert_eq!(species.category, ChangeCategory::BasicInfo);

        // elf +2 dex vs human +1 dex
        let dex = find(&changes, "abilities.dexterity");
        assert_eq!(dex.meta_str(meta::CAUSED_BY_RACE), Some("Elf"));
        assert_eq!(dex.meta_str(meta::CAUSATION_TRIGGER), Some("race_change"));
        assert_eq!(dex.meta_str(meta::CAUSED_BY), Some(SPECIES_PATH));
        // elf 0 con vs human +1 con
        find(&changes, "abilities.constitution");
        // wisdom unchanged
        assert!(!paths(&changes).contains(&"abilities.wisdom"));
    }

    #[test]
    fn test_score_delta_not_matching_bonus_is_not_attributed() {
        let changes = run(
            &SpeciesDetector::new(),
            json!({"character_info": {"species": "Human"},
                   "abilities": {"ability_scores": {"dexterity": 13}}}),
            json!({"character_info": {"species": "Elf"},
                   "abilities": {"ability_scores": {"dexterity": 16}}}),
        );
        assert!(!paths(&changes).contains(&"abilities.dexterity"));
    }

    #[test]
    fn test_traits_and_subrace() {
        let changes = run(
            &SpeciesDetector::new(),
            json!({"character_info": {"species": {"name": "Dwarf", "traits": ["Darkvision", "Stonecunning"]}}}),
            json!({"character_info": {"species": {"name": "Dwarf", "subrace": "Hill Dwarf",
                   "traits": ["Darkvision", "Dwarven Toughness"]}},
                   "abilities": {"ability_scores": {"wisdom": 11}}}),
        );
        assert!(!paths(&changes).contains(&SPECIES_PATH));
        let subrace = find(&changes, SUBRACE_PATH);
        assert_eq!(subrace.change_type, ChangeType::Added);
        assert_eq!(subrace.priority, ChangePriority::Medium);
        let gained = find(&changes, "species.traits.dwarven_toughness");
        assert_eq!(gained.category, ChangeCategory::Features);
        assert_eq!(
            find(&changes, "species.traits.stonecunning").change_type,
            ChangeType::Removed
        );
        // hill dwarf +1 wisdom over plain dwarf
        let wis = find(&changes, "abilities.wisdom");
        assert_eq!(wis.meta_str(meta::CAUSED_BY_RACE), Some("Dwarf"));
    }

    #[test]
    fn test_unknown_species_diagnosed() {
        let rules = RulesData::builtin();
        let mut diag = Diagnostics::new();
        let old = CharacterSheet::extract(&json!({"race": "Human"}), &rules, &mut diag);
        let new = CharacterSheet::extract(&json!({"race": "Starborn"}), &rules, &mut diag);
        let mut detector_diag = Diagnostics::new();
        SpeciesDetector::new()
            .detect(
                &old,
                &new,
                &crate::detectors::test_support::ctx(),
                &rules,
                &mut detector_diag,
            )
            .unwrap();
        assert_eq!(detector_diag.len(), 1);
    }
}
