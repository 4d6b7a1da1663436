//! Initiative and movement speeds.

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

pub const INITIATIVE_PATH: &str = "combat.initiative";

pub struct InitiativeDetector {
    base: DetectorBase,
}

impl InitiativeDetector {
    pub fn new() -> Self {
        Self {
            base: DetectorBase::new("initiative", PriorityRules::new()),
        }
    }
}

impl Default for InitiativeDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeDetector for InitiativeDetector {
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
        Ok(self
            .base
            .numeric(
                ctx,
                INITIATIVE_PATH,
                ChangeCategory::Combat,
                "Initiative",
                old.initiative,
                new.initiative,
            )
            .into_iter()
            .collect())
    }
}

pub struct SpeedDetector {
    base: DetectorBase,
}

impl SpeedDetector {
    pub fn new() -> Self {
        Self {
            base: DetectorBase::new("speed", PriorityRules::fixed(ChangePriority::Medium)),
        }
    }
}

impl Default for SpeedDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeDetector for SpeedDetector {
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
        let modes: BTreeSet<&String> = old.speed.keys().chain(new.speed.keys()).collect();
        for mode in modes {
            let path = format!("combat.speed.{mode}");
            match (old.speed.get(mode), new.speed.get(mode)) {
                (Some(&o), Some(&n)) => changes.extend(self.base.numeric(
                    ctx,
                    path,
                    ChangeCategory::Combat,
                    &format!("{mode} speed"),
                    o,
                    n,
                )),
                (None, Some(&n)) => changes.push(
                    self.base
                        .change(
                            ctx,
                            path,
                            ChangeType::Added,
                            ChangeCategory::Combat,
                            format!("Gained {mode} speed of {n} ft."),
                        )
                        .with_values(None, Some(Value::from(n))),
                ),
                (Some(&o), None) => changes.push(
                    self.base
                        .change(
                            ctx,
                            path,
                            ChangeType::Removed,
                            ChangeCategory::Combat,
                            format!("Lost {mode} speed"),
                        )
                        .with_values(Some(Value::from(o)), None),
                ),
                (None, None) => {}
            }
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
    fn test_initiative_follows_dexterity_default() {
        let changes = run(
            &InitiativeDetector::new(),
            json!({"abilities": {"ability_scores": {"dexterity": 12}}}),
            json!({"abilities": {"ability_scores": {"dexterity": 14}}}),
        );
        let init = find(&changes, INITIATIVE_PATH);
        assert_eq!(init.change_type, ChangeType::Incremented);
        assert_eq!(init.priority, ChangePriority::Medium);
        assert_eq!(init.category, ChangeCategory::Combat);
    }

    #[test]
    fn test_speed_modes() {
        let changes = run(
            &SpeedDetector::new(),
            json!({"combat": {"speed": {"walk": 25, "swim": 25}}}),
            json!({"combat": {"speed": {"walk": 30, "fly": 30}}}),
        );
        assert_eq!(changes.len(), 3);
        assert_eq!(find(&changes, "combat.speed.walk").change_type, ChangeType::Incremented);
        let fly = find(&changes, "combat.speed.fly");
        assert_eq!(fly.change_type, ChangeType::Added);
        assert_eq!(fly.priority, ChangePriority::Medium);
        assert_eq!(find(&changes, "combat.speed.swim").change_type, ChangeType::Removed);
    }

    #[test]
    fn test_unchanged_speed() {
        let changes = run(&SpeedDetector::new(), json!({}), json!({"speed": 30}));
        assert!(changes.is_empty());
    }
}
