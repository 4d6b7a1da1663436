//! Ability scores and the cascade a modifier change causes.

use crate::classify::PriorityRules;
use crate::errors::ExError;
use crate::extract::{modifier, Ability, CharacterSheet, PASSIVE_SKILLS};
use crate::model::metadata::{self as meta, trigger};
use crate::model::{Change, ChangeCategory, ChangePriority, DetectionContext, Diagnostics};
use crate::rules::RulesData;

use super::{ChangeDetector, DetectorBase};

pub struct AbilityScoresDetector {
    base: DetectorBase,
}

impl AbilityScoresDetector {
    pub fn new() -> Self {
        Self {
            base: DetectorBase::new(
                "abilities",
                PriorityRules::new()
                    .rule("abilities.*", ChangePriority::High)
                    .rule("skills.*.bonus", ChangePriority::Low)
                    .rule("saving_throws.*.bonus", ChangePriority::Low)
                    .rule("passive_skills.*", ChangePriority::Low),
            ),
        }
    }

    /// Secondary changes for values that moved by exactly the modifier delta.
    fn cascade(
        &self,
        ctx: &DetectionContext,
        ability: Ability,
        mod_delta: i64,
        old: &CharacterSheet,
        new: &CharacterSheet,
    ) -> Vec<Change> {
        let mut out = Vec::new();
        let mut push_if_matching =
            |path: String, category: ChangeCategory, label: String, before: i64, after: i64| {
                if after - before != mod_delta {
                    return;
                }
                if let Some(c) = self.base.numeric(ctx, path, category, &label, before, after) {
                    out.push(c);
                }
            };

        for (skill, entry) in &new.skills {
            if entry.ability != Some(ability) {
                continue;
            }
            if let Some(previous) = old.skills.get(skill) {
                push_if_matching(
                    format!("skills.{skill}.bonus"),
                    ChangeCategory::Skills,
                    format!("{} bonus", title(skill)),
                    previous.bonus,
                    entry.bonus,
                );
            }
        }

        if let (Some(before), Some(after)) =
            (old.saving_throws.get(&ability), new.saving_throws.get(&ability))
        {
            push_if_matching(
                format!("saving_throws.{}.bonus", ability.name()),
                ChangeCategory::Skills,
                format!("{} saving throw", ability.title()),
                before.bonus,
                after.bonus,
            );
        }

        if old.spellcasting_ability == Some(ability) && new.spellcasting_ability == Some(ability) {
            if let (Some(before), Some(after)) = (old.spell_save_dc, new.spell_save_dc) {
                push_if_matching(
                    "spellcasting.spell_save_dc".to_string(),
                    ChangeCategory::Spells,
                    "Spell save DC".to_string(),
                    before,
                    after,
                );
            }
            if let (Some(before), Some(after)) = (old.spell_attack_bonus, new.spell_attack_bonus) {
                push_if_matching(
                    "spellcasting.spell_attack_bonus".to_string(),
                    ChangeCategory::Spells,
                    "Spell attack bonus".to_string(),
                    before,
                    after,
                );
            }
        }

        if ability == Ability::Dexterity {
            push_if_matching(
                "combat.initiative".to_string(),
                ChangeCategory::Combat,
                "Initiative".to_string(),
                old.initiative,
                new.initiative,
            );
        }

        for skill in PASSIVE_SKILLS {
            let governs = new.skills.get(skill).and_then(|s| s.ability) == Some(ability);
            if !governs {
                continue;
            }
            if let (Some(before), Some(after)) =
                (old.passive_skills.get(skill), new.passive_skills.get(skill))
            {
                push_if_matching(
                    format!("passive_skills.{skill}"),
                    ChangeCategory::Skills,
                    format!("Passive {}", title(skill)),
                    before.value,
                    after.value,
                );
            }
        }

        let source = format!("abilities.{}", ability.name());
        out.into_iter()
            .map(|c| {
                c.with_meta(meta::CAUSATION_TRIGGER, trigger::ABILITY_SCORE_CHANGE)
                    .with_meta(meta::CAUSED_BY_ABILITY, ability.title())
                    .with_meta(meta::CAUSED_BY, source.as_str())
                    .with_meta(meta::MODIFIER_DELTA, mod_delta)
            })
            .collect()
    }
}

impl Default for AbilityScoresDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// `sleight_of_hand` → `Sleight of hand`
pub(crate) fn title(skill: &str) -> String {
    let text = skill.replace('_', " ");
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

impl ChangeDetector for AbilityScoresDetector {
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
        for ability in Ability::ALL {
            let (before, after) = (old.score(ability), new.score(ability));
            let Some(change) = self.base.numeric(
                ctx,
                format!("abilities.{}", ability.name()),
                ChangeCategory::Abilities,
                ability.title(),
                before,
                after,
            ) else {
                continue;
            };
            let mod_delta = modifier(after) - modifier(before);
            changes.push(
                change
                    .with_meta(meta::MODIFIER_DELTA, mod_delta)
                    .with_meta("old_modifier", modifier(before))
                    .with_meta("new_modifier", modifier(after)),
            );
            if mod_delta != 0 {
                changes.extend(self.cascade(ctx, ability, mod_delta, old, new));
            }
        }
        Ok(changes)
    }
}
