//! Class composition: new or dropped classes, per-class levels, the shared
//! spellcaster level and multiclass proficiency grants.

use serde_json::{json, Value};

use crate::classify::PriorityRules;
use crate::errors::ExError;
use crate::extract::CharacterSheet;
use crate::model::metadata::{self as meta, trigger};
use crate::model::{
    Change, ChangeCategory, ChangePriority, ChangeType, DetectionContext, Diagnostics,
};
use crate::rules::RulesData;

use super::subclass::infer_subclass;
use super::{granted_proficiencies, proficiency_category, ChangeDetector, DetectorBase};

pub const SPELLCASTER_LEVEL_PATH: &str = "classes.spellcaster_level";

pub struct MulticlassDetector {
    base: DetectorBase,
}

impl MulticlassDetector {
    pub fn new() -> Self {
        Self {
            base: DetectorBase::new(
                "multiclass",
                PriorityRules::new()
                    .rule("classes.*.level", ChangePriority::Medium)
                    .rule(SPELLCASTER_LEVEL_PATH, ChangePriority::Medium)
                    .rule("proficiencies.**", ChangePriority::Medium),
            ),
        }
    }
}

impl Default for MulticlassDetector {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared spellcaster level: full casters count every level, half and third
/// casters count the rounded-down fraction, pact magic is excluded.
pub fn spellcaster_level(sheet: &CharacterSheet, rules: &RulesData) -> i64 {
    sheet
        .classes
        .iter()
        .map(|class| {
            let subclass = infer_subclass(sheet, class, rules);
            rules
                .caster_type(&class.name, subclass.as_deref())
                .caster_levels(class.level)
        })
        .sum()
}

impl ChangeDetector for MulticlassDetector {
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

        for class in &new.classes {
            let before = old.class_level(&class.name);
            let path = format!("classes.{}", class.key);
            if class.level <= 0 {
                // dropped classes are reported from the old side below
                continue;
            }
            if before > 0 {
                changes.extend(self.base.numeric(
                    ctx,
                    format!("{path}.level"),
                    ChangeCategory::Progression,
                    &format!("{} level", class.name),
                    before,
                    class.level,
                ));
                continue;
            }
            let multiclass = old
                .classes
                .iter()
                .any(|c| c.key != class.key && c.level > 0);
            let description = if multiclass {
                format!("Multiclassed into {} (level {})", class.name, class.level)
            } else {
                format!("Took first class: {} (level {})", class.name, class.level)
            };
            let mut change = self
                .base
                .change(ctx, &path, ChangeType::Added, ChangeCategory::Progression, description)
                .with_values(None, Some(json!({"name": class.name, "level": class.level})))
                .with_meta(meta::MULTICLASS, multiclass);
            if multiclass {
                change = change.with_meta(meta::CAUSATION_TRIGGER, trigger::MULTICLASS);
            }
            changes.push(change);

            if !multiclass {
                continue;
            }
            let Some(class_rules) = rules.class(&class.name) else {
                diag.record(
                    self.base.name(),
                    &path,
                    format!("no reference data for class '{}'", class.name),
                );
                continue;
            };
            for (kind, item_slug, item) in
                granted_proficiencies(&class_rules.multiclass_proficiencies, old, new)
            {
                changes.push(
                    self.base
                        .change(
                            ctx,
                            format!("proficiencies.{kind}.{item_slug}"),
                            ChangeType::Added,
                            proficiency_category(&kind),
                            format!("Gained {item} proficiency from multiclassing into {}", class.name),
                        )
                        .with_values(None, Some(Value::String(item)))
                        .with_meta(meta::CAUSATION_TRIGGER, trigger::MULTICLASS)
                        .with_meta(meta::CAUSED_BY_CLASS, class.name.as_str())
                        .with_meta(meta::CAUSED_BY, path.as_str()),
                );
            }
        }

        for class in old.classes.iter().filter(|c| c.level > 0) {
            if new.class_level(&class.name) > 0 {
                continue;
            }
            changes.push(
                self.base
                    .change(
                        ctx,
                        format!("classes.{}", class.key),
                        ChangeType::Removed,
                        ChangeCategory::Progression,
                        format!("Dropped class: {}", class.name),
                    )
                    .with_values(Some(json!({"name": class.name, "level": class.level})), None),
            );
        }

        if new.classes.len() >= 2 {
            changes.extend(self.base.numeric(
                ctx,
                SPELLCASTER_LEVEL_PATH,
                ChangeCategory::Progression,
                "Multiclass spellcaster level",
                spellcaster_level(old, rules),
                spellcaster_level(new, rules),
            ));
        }
        Ok(changes)
    }
}
