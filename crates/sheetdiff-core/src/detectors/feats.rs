//! Feats and the effects a newly taken feat grants.

use serde_json::Value;
use std::collections::BTreeMap;

use crate::classify::PriorityRules;
use crate::errors::ExError;
use crate::extract::{slug, CharacterSheet, Record};
use crate::model::metadata::{self as meta, trigger};
use crate::model::{
    Change, ChangeCategory, ChangePriority, ChangeType, DetectionContext, Diagnostics,
};
use crate::rules::{FeatEffects, RulesData};

use super::{proficiency_category, proficiency_kind, ChangeDetector, DetectorBase};

pub struct FeatsDetector {
    base: DetectorBase,
}

impl FeatsDetector {
    pub fn new() -> Self {
        Self {
            base: DetectorBase::new(
                "feats",
                PriorityRules::new()
                    .rule("features.feats.*.effects.**", ChangePriority::Medium)
                    .rule_for("features.feats.*", ChangeType::Added, ChangePriority::High),
            ),
        }
    }

    /// One secondary change per effect entry of a newly taken feat.
    fn effect_changes(
        &self,
        ctx: &DetectionContext,
        feat: &Record,
        feat_path: &str,
        effects: &FeatEffects,
        total_level: i64,
    ) -> Vec<Change> {
        let mut out = Vec::new();
        let effects_path = format!("{feat_path}.effects");
        let name = feat.name.as_str();

        for (ability, bump) in &effects.ability_scores {
            out.push(
                self.base
                    .change(
                        ctx,
                        format!("{effects_path}.ability_scores.{}", ability.name()),
                        ChangeType::Added,
                        ChangeCategory::Abilities,
                        format!("{name} grants {bump:+} {}", ability.title()),
                    )
                    .with_values(None, Some(Value::from(*bump))),
            );
        }
        for (kind, items) in &effects.proficiencies {
            let kind = proficiency_kind(kind);
            for item in items {
                out.push(
                    self.base
                        .change(
                            ctx,
                            format!("{effects_path}.proficiencies.{kind}.{}", slug(item)),
                            ChangeType::Added,
                            proficiency_category(&kind),
                            format!("{name} grants proficiency: {item}"),
                        )
                        .with_values(None, Some(Value::String(item.clone()))),
                );
            }
        }
        for spell in &effects.spells {
            out.push(
                self.base
                    .change(
                        ctx,
                        format!("{effects_path}.spells.{}", slug(spell)),
                        ChangeType::Added,
                        ChangeCategory::Spells,
                        format!("{name} grants spell: {spell}"),
                    )
                    .with_values(None, Some(Value::String(spell.clone()))),
            );
        }
        for (option_kind, options) in &effects.combat_options {
            for option in options {
                out.push(
                    self.base
                        .change(
                            ctx,
                            format!("{effects_path}.combat_options.{option_kind}.{}", slug(option)),
                            ChangeType::Added,
                            ChangeCategory::Combat,
                            format!("{name} grants combat option: {option}"),
                        )
                        .with_values(None, Some(Value::String(option.clone()))),
                );
            }
        }
        if let Some(grant) = effects.hit_points {
            let amount = grant.amount(total_level);
            out.push(
                self.base
                    .change(
                        ctx,
                        format!("{effects_path}.hit_points"),
                        ChangeType::Added,
                        ChangeCategory::Combat,
                        format!("{name} grants {amount:+} maximum hit points"),
                    )
                    .with_values(None, Some(Value::from(amount))),
            );
        }

        out.into_iter()
            .map(|c| {
                c.with_meta(meta::CAUSATION_TRIGGER, trigger::FEAT_SELECTION)
                    .with_meta(meta::CAUSED_BY_FEAT, name)
                    .with_meta(meta::CAUSED_BY, feat_path)
            })
            .collect()
    }
}

impl Default for FeatsDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn by_key(feats: &[Record]) -> BTreeMap<&str, &Record> {
    feats.iter().map(|f| (f.key.as_str(), f)).collect()
}

impl ChangeDetector for FeatsDetector {
    fn name(&self) -> &'static str {
        self.base.name()
    }

    fn detect(
        &self,
        old: &CharacterSheet,
        new: &CharacterSheet,
        ctx: &DetectionContext,
        rules: &RulesData,
        _diag: &mut Diagnostics,
    ) -> Result<Vec<Change>, ExError> {
        let old_feats = by_key(&old.feats);
        let new_feats = by_key(&new.feats);
        let mut changes = Vec::new();

        for feat in &new.feats {
            let path = format!("features.feats.{}", feat.segment);
            match old_feats.get(feat.key.as_str()) {
                None => {
                    changes.push(
                        self.base
                            .change(
                                ctx,
                                &path,
                                ChangeType::Added,
                                ChangeCategory::Features,
                                format!("Gained feat: {}", feat.name),
                            )
                            .with_values(None, Some(feat.to_value())),
                    );
                    if let Some(effects) = rules.feat(&feat.name) {
                        changes.extend(self.effect_changes(ctx, feat, &path, effects, new.level));
                    }
                }
                Some(previous) if previous.fields != feat.fields => {
                    changes.push(
                        self.base
                            .change(
                                ctx,
                                &path,
                                ChangeType::Modified,
                                ChangeCategory::Features,
                                format!("Feat details changed: {}", feat.name),
                            )
                            .with_values(Some(previous.to_value()), Some(feat.to_value())),
                    );
                }
                Some(_) => {}
            }
        }
        for feat in &old.feats {
            if !new_feats.contains_key(feat.key.as_str()) {
                changes.push(
                    self.base
                        .change(
                            ctx,
                            format!("features.feats.{}", feat.segment),
                            ChangeType::Removed,
                            ChangeCategory::Features,
                            format!("Lost feat: {}", feat.name),
                        )
                        .with_values(Some(feat.to_value()), None),
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
    fn test_great_weapon_master_grants_combat_options() {
        let changes = run(
            &FeatsDetector::new(),
            json!({"features": {"feats": []}}),
            json!({"features": {"feats": [{"name": "Great Weapon Master"}]}}),
        );
        let feat = find(&changes, "features.feats.great_weapon_master");
        assert_eq!(feat.change_type, ChangeType::Added);
        assert_eq!(feat.priority, ChangePriority::High);

        let option = find(
            &changes,
            "features.feats.great_weapon_master.effects.combat_options.attack_options.power_attack",
        );
        assert_eq!(option.category, ChangeCategory::Combat);
        assert_eq!(option.priority, ChangePriority::Medium);
        assert_eq!(option.meta_str(meta::CAUSATION_TRIGGER), Some("feat_selection"));
        assert_eq!(option.meta_str(meta::CAUSED_BY_FEAT), Some("Great Weapon Master"));
        assert_eq!(
            option.meta_str(meta::CAUSED_BY),
            Some("features.feats.great_weapon_master")
        );
    }

    #[test]
    fn test_tough_scales_with_level() {
        let changes = run(
            &FeatsDetector::new(),
            json!({"character_info": {"level": 4}}),
            json!({"character_info": {"level": 4}, "features": {"feats": ["Tough"]}}),
        );
        let hp = find(&changes, "features.feats.tough.effects.hit_points");
        assert_eq!(hp.new_value, Some(json!(8)));
    }

    #[test]
    fn test_unknown_feat_has_no_effects() {
        let changes = run(
            &FeatsDetector::new(),
            json!({}),
            json!({"feats": ["Homebrew Brilliance"]}),
        );
        assert_eq!(paths(&changes), vec!["features.feats.homebrew_brilliance"]);
    }

    #[test]
    fn test_removed_and_modified() {
        let changes = run(
            &FeatsDetector::new(),
            json!({"feats": [{"id": 1, "name": "Alert"}, {"id": 2, "name": "Lucky", "uses": 3}]}),
            json!({"feats": [{"id": 2, "name": "Lucky", "uses": 2}]}),
        );
        assert_eq!(find(&changes, "features.feats.alert").change_type, ChangeType::Removed);
        assert_eq!(find(&changes, "features.feats.lucky").change_type, ChangeType::Modified);
    }

    #[test]
    fn test_identity_by_id_survives_rename() {
        let changes = run(
            &FeatsDetector::new(),
            json!({"feats": [{"id": 7, "name": "Skilled"}]}),
            json!({"feats": [{"id": 7, "name": "Skilled", "choices": ["Stealth"]}]}),
        );
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].change_type, ChangeType::Modified);
    }
}
