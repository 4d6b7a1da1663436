//! Character level and experience points.

use crate::classify::PriorityRules;
use crate::errors::ExError;
use crate::extract::CharacterSheet;
use crate::model::metadata::{self as meta, trigger};
use crate::model::{Change, ChangeCategory, ChangePriority, DetectionContext, Diagnostics};
use crate::rules::RulesData;

use super::{ChangeDetector, DetectorBase};

pub const LEVEL_PATH: &str = "character_info.level";
pub const XP_PATH: &str = "character_info.experience_points";

pub struct LevelDetector {
    base: DetectorBase,
}

impl LevelDetector {
    pub fn new() -> Self {
        Self {
            base: DetectorBase::new(
                "level",
                PriorityRules::new()
                    .rule(LEVEL_PATH, ChangePriority::High)
                    .rule(XP_PATH, ChangePriority::Low),
            ),
        }
    }
}

impl Default for LevelDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeDetector for LevelDetector {
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
        if let Some(change) = self.base.numeric(
            ctx,
            LEVEL_PATH,
            ChangeCategory::Progression,
            "Level",
            old.level,
            new.level,
        ) {
            changes.push(
                change
                    .with_meta(meta::LEVELS_GAINED, new.level - old.level)
                    .with_meta(meta::CAUSATION_TRIGGER, trigger::LEVEL_PROGRESSION),
            );
        }
        if let Some(change) = self.base.numeric(
            ctx,
            XP_PATH,
            ChangeCategory::Progression,
            "Experience points",
            old.experience_points,
            new.experience_points,
        ) {
            changes.push(change);
        }
        Ok(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::{find, run};
    use crate::model::ChangeType;
    use serde_json::json;

    #[test]
    fn test_level_up_is_high_progression() {
        let changes = run(
            &LevelDetector::new(),
            json!({"character_info": {"level": 4, "experience_points": 2700}}),
            json!({"character_info": {"level": 5, "experience_points": 6500}}),
        );
        let level = find(&changes, LEVEL_PATH);
        assert_eq!(level.change_type, ChangeType::Incremented);
        assert_eq!(level.priority, ChangePriority::High);
        assert_eq!(level.category, ChangeCategory::Progression);
        assert_eq!(level.metadata[meta::LEVELS_GAINED], json!(1));
        assert_eq!(level.meta_str(meta::CAUSATION_TRIGGER), Some("level_progression"));
        assert_eq!(level.meta_str(meta::DETECTOR), Some("level"));
        assert_eq!(find(&changes, XP_PATH).priority, ChangePriority::Low);
    }

    #[test]
    fn test_no_changes_for_identical_level() {
        let snap = json!({"character_info": {"level": 3}});
        assert!(run(&LevelDetector::new(), snap.clone(), snap).is_empty());
    }
}
