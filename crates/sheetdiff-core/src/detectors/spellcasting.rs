//! Spellcasting ability, save DC, attack bonus and slot totals.

use serde_json::Value;
use std::collections::BTreeSet;

use crate::classify::PriorityRules;
use crate::errors::ExError;
use crate::extract::CharacterSheet;
use crate::model::{
    Change, ChangeCategory, ChangePriority, ChangeType, DetectionContext, Diagnostics,
};
use crate::rules::RulesData;

use super::{ChangeDetector, DetectorBase};

pub const ABILITY_PATH: &str = "spellcasting.spellcasting_ability";
pub const SAVE_DC_PATH: &str = "spellcasting.spell_save_dc";
pub const ATTACK_BONUS_PATH: &str = "spellcasting.spell_attack_bonus";

pub struct SpellcastingStatsDetector {
    base: DetectorBase,
}

impl SpellcastingStatsDetector {
    pub fn new() -> Self {
        Self {
            base: DetectorBase::new(
                "spellcasting",
                PriorityRules::new()
                    .rule("spellcasting.spell_slots.*", ChangePriority::Low)
                    .rule("spellcasting.**", ChangePriority::Medium),
            ),
        }
    }

    /// Numeric stat that may be missing on either side
    fn optional_stat(
        &self,
        ctx: &DetectionContext,
        path: &str,
        label: &str,
        old: Option<i64>,
        new: Option<i64>,
    ) -> Option<Change> {
        match (old, new) {
            (Some(o), Some(n)) => self.base.numeric(ctx, path, ChangeCategory::Spells, label, o, n),
            (None, Some(n)) => Some(
                self.base
                    .change(ctx, path, ChangeType::Added, ChangeCategory::Spells, format!("{label} is now {n}"))
                    .with_values(None, Some(Value::from(n))),
            ),
            (Some(o), None) => Some(
                self.base
                    .change(ctx, path, ChangeType::Removed, ChangeCategory::Spells, format!("{label} removed"))
                    .with_values(Some(Value::from(o)), None),
            ),
            (None, None) => None,
        }
    }
}

impl Default for SpellcastingStatsDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn ordinal(level: i64) -> String {
    let suffix = match (level % 10, level % 100) {
        (_, 11..=13) => "th",
        (1, _) => "st",
        (2, _) => "nd",
        (3, _) => "rd",
        _ => "th",
    };
    format!("{level}{suffix}")
}

impl ChangeDetector for SpellcastingStatsDetector {
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

        if old.spellcasting_ability != new.spellcasting_ability {
            changes.extend(self.base.text_presence(
                ctx,
                ABILITY_PATH,
                ChangeCategory::Spells,
                "Spellcasting ability",
                old.spellcasting_ability.map(|a| a.title()),
                new.spellcasting_ability.map(|a| a.title()),
            ));
        }
        changes.extend(self.optional_stat(
            ctx,
            SAVE_DC_PATH,
            "Spell save DC",
            old.spell_save_dc,
            new.spell_save_dc,
        ));
        changes.extend(self.optional_stat(
            ctx,
            ATTACK_BONUS_PATH,
            "Spell attack bonus",
            old.spell_attack_bonus,
            new.spell_attack_bonus,
        ));

        let levels: BTreeSet<i64> = old
            .spell_slots
            .keys()
            .chain(new.spell_slots.keys())
            .copied()
            .collect();
        for level in levels {
            let before = old.spell_slots.get(&level).copied().unwrap_or(0);
            let after = new.spell_slots.get(&level).copied().unwrap_or(0);
            changes.extend(self.base.numeric(
                ctx,
                format!("spellcasting.spell_slots.{level}"),
                ChangeCategory::Spells,
                &format!("{}-level spell slots", ordinal(level)),
                before,
                after,
            ));
        }
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::{find, run};
    use serde_json::json;

    #[test]
    fn test_stats_and_slots() {
        let changes = run(
            &SpellcastingStatsDetector::new(),
            json!({"character_info": {"level": 4},
                   "abilities": {"ability_scores": {"intelligence": 16}},
                   "spellcasting": {"spellcasting_ability": "intelligence",
                                    "spell_slots": {"1": 4, "2": 3}}}),
            json!({"character_info": {"level": 5},
                   "abilities": {"ability_scores": {"intelligence": 16}},
                   "spellcasting": {"spellcasting_ability": "intelligence",
                                    "spell_slots": {"1": 4, "2": 3, "3": 2}}}),
        );
        let dc = find(&changes, SAVE_DC_PATH);
        assert_eq!(dc.change_type, ChangeType::Incremented);
        assert_eq!(dc.priority, ChangePriority::Medium);
        assert_eq!(dc.old_value, Some(json!(13)));
        assert_eq!(dc.new_value, Some(json!(14)));
        find(&changes, ATTACK_BONUS_PATH);

        let third = find(&changes, "spellcasting.spell_slots.3");
        assert_eq!(third.priority, ChangePriority::Low);
        assert_eq!(third.description, "3rd-level spell slots increased from 0 to 2");
        assert_eq!(changes.len(), 3);
    }

    #[test]
    fn test_spellcasting_ability_change() {
        let changes = run(
            &SpellcastingStatsDetector::new(),
            json!({"spellcasting": {"spellcasting_ability": "WIS"}}),
            json!({"spellcasting": {"spellcasting_ability": "CHA"}}),
        );
        let ability = find(&changes, ABILITY_PATH);
        assert_eq!(ability.change_type, ChangeType::Modified);
        assert_eq!(ability.priority, ChangePriority::Medium);
        assert_eq!(ability.new_value, Some(json!("Charisma")));
    }

    #[test]
    fn test_ordinals() {
        assert_eq!(ordinal(1), "1st");
        assert_eq!(ordinal(2), "2nd");
        assert_eq!(ordinal(9), "9th");
    }
}
