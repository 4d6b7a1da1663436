//! Passive perception, investigation and insight.

use serde_json::json;

use crate::classify::PriorityRules;
use crate::errors::ExError;
use crate::extract::{CharacterSheet, PASSIVE_SKILLS};
use crate::model::{Change, ChangeCategory, ChangePriority, DetectionContext, Diagnostics};
use crate::rules::RulesData;

use super::abilities::title;
use super::{ChangeDetector, DetectorBase};

pub const PASSIVE_BREAKDOWN: &str = "passive_breakdown";

pub struct PassiveSkillsDetector {
    base: DetectorBase,
}

impl PassiveSkillsDetector {
    pub fn new() -> Self {
        Self {
            base: DetectorBase::new("passive_skills", PriorityRules::fixed(ChangePriority::Low)),
        }
    }
}

impl Default for PassiveSkillsDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeDetector for PassiveSkillsDetector {
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
        for skill in PASSIVE_SKILLS {
            let (Some(before), Some(after)) = (old.passive_skills.get(skill), new.passive_skills.get(skill))
            else {
                continue;
            };
            let Some(change) = self.base.numeric(
                ctx,
                format!("passive_skills.{skill}"),
                ChangeCategory::Skills,
                &format!("Passive {}", title(skill)),
                before.value,
                after.value,
            ) else {
                continue;
            };
            changes.push(change.with_meta(
                PASSIVE_BREAKDOWN,
                json!({
                    "reported": after.reported,
                    "base": 10,
                    "skill_bonus": after.skill_bonus,
                    "feat_bonus": after.feat_bonus,
                    "equipment_bonus": after.equipment_bonus,
                    "total": after.value,
                }),
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
    fn test_observant_raises_passives() {
        let changes = run(
            &PassiveSkillsDetector::new(),
            json!({"abilities": {"ability_scores": {"wisdom": 12}}}),
            json!({"abilities": {"ability_scores": {"wisdom": 12}},
                   "features": {"feats": ["Observant"]}}),
        );
        let perception = find(&changes, "passive_skills.perception");
        assert_eq!(perception.old_value, Some(json!(11)));
        assert_eq!(perception.new_value, Some(json!(16)));
        assert_eq!(perception.priority, ChangePriority::Low);
        assert_eq!(perception.metadata[PASSIVE_BREAKDOWN]["feat_bonus"], json!(5));
        find(&changes, "passive_skills.investigation");
        assert_eq!(changes.len(), 2);
    }

    #[test]
    fn test_reported_passive_wins() {
        let changes = run(
            &PassiveSkillsDetector::new(),
            json!({"passive_skills": {"insight": 12}}),
            json!({"passive_skills": {"insight": 12}, "abilities": {"ability_scores": {"wisdom": 18}}}),
        );
        assert!(changes.iter().all(|c| c.field_path != "passive_skills.insight"));
    }
}
