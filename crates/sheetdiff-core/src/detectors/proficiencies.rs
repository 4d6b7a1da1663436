//! Proficiency toggles, skill and save bonuses, and the proficiency bonus.

use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::classify::PriorityRules;
use crate::errors::ExError;
use crate::extract::{Ability, CharacterSheet, PROFICIENCY_KINDS};
use crate::model::metadata::{self as meta, trigger};
use crate::model::{
    Change, ChangeCategory, ChangePriority, ChangeType, DetectionContext, Diagnostics,
};
use crate::rules::RulesData;

use super::abilities::title;
use super::level::LEVEL_PATH;
use super::{proficiency_category, ChangeDetector, DetectorBase};

pub const PROFICIENCY_BONUS_PATH: &str = "proficiencies.proficiency_bonus";

pub struct ProficienciesDetector {
    base: DetectorBase,
}

impl ProficienciesDetector {
    pub fn new() -> Self {
        Self {
            base: DetectorBase::new(
                "proficiencies",
                PriorityRules::new()
                    .rule("skills.*.bonus", ChangePriority::Low)
                    .rule("saving_throws.*.bonus", ChangePriority::Low)
                    .rule(PROFICIENCY_BONUS_PATH, ChangePriority::Medium)
                    .domain_default(ChangeType::Added, ChangePriority::Medium)
                    .domain_default(ChangeType::Removed, ChangePriority::Medium),
            ),
        }
    }

    fn toggle(
        &self,
        ctx: &DetectionContext,
        path: String,
        category: ChangeCategory,
        label: &str,
        was: bool,
        is: bool,
    ) -> Option<Change> {
        let (change_type, verb) = match (was, is) {
            (false, true) => (ChangeType::Added, "Gained"),
            (true, false) => (ChangeType::Removed, "Lost"),
            _ => return None,
        };
        Some(
            self.base
                .change(ctx, path, change_type, category, format!("{verb} {label}"))
                .with_values(
                    (!is).then_some(Value::Bool(true)),
                    is.then_some(Value::Bool(true)),
                ),
        )
    }

    fn skills(&self, old: &CharacterSheet, new: &CharacterSheet, ctx: &DetectionContext) -> Vec<Change> {
        let mut changes = Vec::new();
        let names: BTreeSet<&String> = old.skills.keys().chain(new.skills.keys()).collect();
        for skill in names {
            let before = old.skills.get(skill);
            let after = new.skills.get(skill);
            let label = title(skill);
            let was = before.is_some_and(|s| s.proficient);
            let is = after.is_some_and(|s| s.proficient);
            changes.extend(self.toggle(
                ctx,
                format!("proficiencies.skills.{skill}"),
                ChangeCategory::Skills,
                &format!("{label} proficiency"),
                was,
                is,
            ));
            let was = before.is_some_and(|s| s.expertise);
            let is = after.is_some_and(|s| s.expertise);
            changes.extend(self.toggle(
                ctx,
                format!("proficiencies.skills.{skill}.expertise"),
                ChangeCategory::Skills,
                &format!("{label} expertise"),
                was,
                is,
            ));
            if let (Some(b), Some(a)) = (before, after) {
                changes.extend(self.base.numeric(
                    ctx,
                    format!("skills.{skill}.bonus"),
                    ChangeCategory::Skills,
                    &format!("{label} bonus"),
                    b.bonus,
                    a.bonus,
                ));
            }
        }
        changes
    }

    fn saving_throws(
        &self,
        old: &CharacterSheet,
        new: &CharacterSheet,
        ctx: &DetectionContext,
    ) -> Vec<Change> {
        let mut changes = Vec::new();
        for ability in Ability::ALL {
            let (Some(before), Some(after)) =
                (old.saving_throws.get(&ability), new.saving_throws.get(&ability))
            else {
                continue;
            };
            changes.extend(self.toggle(
                ctx,
                format!("proficiencies.saving_throws.{}", ability.name()),
                ChangeCategory::Skills,
                &format!("{} saving throw proficiency", ability.title()),
                before.proficient,
                after.proficient,
            ));
            changes.extend(self.base.numeric(
                ctx,
                format!("saving_throws.{}.bonus", ability.name()),
                ChangeCategory::Skills,
                &format!("{} saving throw bonus", ability.title()),
                before.bonus,
                after.bonus,
            ));
        }
        changes
    }

    fn other_kinds(
        &self,
        old: &CharacterSheet,
        new: &CharacterSheet,
        ctx: &DetectionContext,
    ) -> Vec<Change> {
        let empty = BTreeMap::new();
        let mut changes = Vec::new();
        for kind in PROFICIENCY_KINDS {
            let before = old.proficiencies.get(kind).unwrap_or(&empty);
            let after = new.proficiencies.get(kind).unwrap_or(&empty);
            let singular = kind.trim_end_matches('s');
            for (item_slug, name) in after.iter().filter(|(k, _)| !before.contains_key(*k)) {
                changes.push(
                    self.base
                        .change(
                            ctx,
                            format!("proficiencies.{kind}.{item_slug}"),
                            ChangeType::Added,
                            proficiency_category(kind),
                            format!("Gained {singular} proficiency: {name}"),
                        )
                        .with_values(None, Some(Value::String(name.clone()))),
                );
            }
            for (item_slug, name) in before.iter().filter(|(k, _)| !after.contains_key(*k)) {
                changes.push(
                    self.base
                        .change(
                            ctx,
                            format!("proficiencies.{kind}.{item_slug}"),
                            ChangeType::Removed,
                            proficiency_category(kind),
                            format!("Lost {singular} proficiency: {name}"),
                        )
                        .with_values(Some(Value::String(name.clone())), None),
                );
            }
        }
        changes
    }
}

impl Default for ProficienciesDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeDetector for ProficienciesDetector {
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
        let mut changes = self.skills(old, new, ctx);
        changes.extend(self.saving_throws(old, new, ctx));
        changes.extend(self.other_kinds(old, new, ctx));

        if let Some(mut pb) = self.base.numeric(
            ctx,
            PROFICIENCY_BONUS_PATH,
            ChangeCategory::Progression,
            "Proficiency bonus",
            old.proficiency_bonus,
            new.proficiency_bonus,
        ) {
            if new.level > old.level {
                pb = pb
                    .with_meta(meta::CAUSATION_TRIGGER, trigger::LEVEL_PROGRESSION)
                    .with_meta(meta::CAUSED_BY, LEVEL_PATH);
            }
            changes.push(pb);
        }
        Ok(changes)
    }
}
