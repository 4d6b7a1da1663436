//! Background and the proficiencies its table grants.

use serde_json::Value;

use crate::classify::PriorityRules;
use crate::errors::ExError;
use crate::extract::CharacterSheet;
use crate::model::metadata::{self as meta, trigger};
use crate::model::{
    Change, ChangeCategory, ChangePriority, ChangeType, DetectionContext, Diagnostics,
};
use crate::rules::RulesData;

use super::{granted_proficiencies, proficiency_category, ChangeDetector, DetectorBase};

pub const BACKGROUND_PATH: &str = "character_info.background";

pub struct BackgroundDetector {
    base: DetectorBase,
}

impl BackgroundDetector {
    pub fn new() -> Self {
        Self {
            base: DetectorBase::new(
                "background",
                PriorityRules::new()
                    .rule(BACKGROUND_PATH, ChangePriority::Medium)
                    .domain_default(ChangeType::Added, ChangePriority::Medium),
            ),
        }
    }
}

impl Default for BackgroundDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeDetector for BackgroundDetector {
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
        let Some(change) = self.base.text_presence(
            ctx,
            BACKGROUND_PATH,
            ChangeCategory::Social,
            "Background",
            old.background.as_deref(),
            new.background.as_deref(),
        ) else {
            return Ok(Vec::new());
        };
        let mut changes = vec![change];

        let Some(name) = new.background.as_deref() else {
            return Ok(changes);
        };
        let Some(grants) = rules.background(name) else {
            diag.record(
                self.base.name(),
                BACKGROUND_PATH,
                format!("no reference data for background '{name}'"),
            );
            return Ok(changes);
        };
        for (kind, item_slug, item) in granted_proficiencies(&grants.proficiencies, old, new) {
            changes.push(
                self.base
                    .change(
                        ctx,
                        format!("proficiencies.{kind}.{item_slug}"),
                        ChangeType::Added,
                        proficiency_category(&kind),
                        format!("Gained {item} proficiency from the {name} background"),
                    )
                    .with_values(None, Some(Value::String(item)))
                    .with_meta(meta::CAUSATION_TRIGGER, trigger::BACKGROUND_CHANGE)
                    .with_meta(meta::CAUSED_BY_BACKGROUND, name)
                    .with_meta(meta::CAUSED_BY, BACKGROUND_PATH),
            );
        }
        Ok(changes)
    }
}
