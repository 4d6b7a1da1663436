//! Heuristic correlators that link an effect to a likely cause when no
//! detector declared one.
//!
//! A correlator inspects one (cause, effect) pair and returns the signals it
//! matched. Confidence is the capped sum of signal weights.

use crate::extract::{modifier, slug, Ability, CharacterSheet};
use crate::model::metadata::{self as meta, trigger};
use crate::model::{Change, ChangeType};
use crate::rules::{proficiency_bonus_for_level, RulesData};

use crate::detectors::background::BACKGROUND_PATH;
use crate::detectors::level::LEVEL_PATH;
use crate::detectors::proficiencies::PROFICIENCY_BONUS_PATH;
use crate::detectors::species::{species_rules, SPECIES_PATH};

/// Lowest confidence at which a correlated edge is accepted
pub const MIN_CONFIDENCE: f64 = 0.5;

/// One matched piece of evidence.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Signal {
    pub name: &'static str,
    pub weight: f64,
}

impl Signal {
    pub const fn new(name: &'static str, weight: f64) -> Self {
        Self { name, weight }
    }
}

/// A correlator's verdict for one pair.
#[derive(Debug, Clone, PartialEq)]
pub struct Correlation {
    pub trigger: &'static str,
    pub signals: Vec<Signal>,
    /// Attribution metadata to stamp on the effect
    pub attribution: Option<(&'static str, String)>,
}

impl Correlation {
    pub fn confidence(&self) -> f64 {
        let sum: f64 = self.signals.iter().map(|s| s.weight).sum();
        (sum.min(1.0) * 100.0).round() / 100.0
    }
}

/// Everything a correlator may read besides the two changes.
pub struct CorrelationContext<'a> {
    pub old: &'a CharacterSheet,
    pub new: &'a CharacterSheet,
    pub rules: &'a RulesData,
}

pub trait Correlator: Send + Sync {
    fn name(&self) -> &'static str;

    /// Signals linking `cause` to `effect`, or `None` when the pair is
    /// unrelated for this correlator.
    fn correlate(
        &self,
        cause: &Change,
        effect: &Change,
        ctx: &CorrelationContext<'_>,
    ) -> Option<Correlation>;
}

/// Built-in correlators in evaluation order
pub fn default_correlators() -> Vec<Box<dyn Correlator>> {
    vec![
        Box::new(AbilityCorrelator),
        Box::new(LevelCorrelator),
        Box::new(ProficiencyBonusCorrelator),
        Box::new(SkillProficiencyCorrelator),
        Box::new(FeatAbilityCorrelator),
        Box::new(SpeciesCorrelator),
        Box::new(BackgroundCorrelator),
        Box::new(ItemCorrelator),
    ]
}

fn segments(path: &str) -> Vec<&str> {
    path.split('.').collect()
}

fn same_direction(a: i64, b: i64) -> bool {
    a != 0 && a.signum() == b.signum()
}

fn correlation(
    trigger: &'static str,
    signals: Vec<Signal>,
    attribution: Option<(&'static str, String)>,
) -> Option<Correlation> {
    if signals.is_empty() {
        return None;
    }
    Some(Correlation {
        trigger,
        signals,
        attribution,
    })
}

/// Ability score → derived statistics.
pub struct AbilityCorrelator;

impl Correlator for AbilityCorrelator {
    fn name(&self) -> &'static str {
        "ability"
    }

    fn correlate(
        &self,
        cause: &Change,
        effect: &Change,
        ctx: &CorrelationContext<'_>,
    ) -> Option<Correlation> {
        let ability = match segments(&cause.field_path).as_slice() {
            ["abilities", name] => Ability::parse(name)?,
            _ => return None,
        };
        let mod_delta = cause
            .metadata
            .get(meta::MODIFIER_DELTA)
            .and_then(|v| v.as_i64())
            .or_else(|| {
                let old = cause.old_value.as_ref()?.as_i64()?;
                let new = cause.new_value.as_ref()?.as_i64()?;
                Some(modifier(new) - modifier(old))
            })?;
        let governs = match segments(&effect.field_path).as_slice() {
            ["skills", skill, "bonus"] | ["passive_skills", skill] => {
                ctx.rules.skill_ability(skill) == Some(ability)
            }
            ["saving_throws", name, "bonus"] => Ability::parse(name) == Some(ability),
            ["combat", "initiative"] => ability == Ability::Dexterity,
            ["spellcasting", "spell_save_dc" | "spell_attack_bonus"] => {
                ctx.new.spellcasting_ability == Some(ability)
            }
            _ => return None,
        };
        let delta = effect.numeric_delta()?;
        let mut signals = Vec::new();
        if mod_delta != 0 && delta == mod_delta {
            signals.push(Signal::new("delta_equals_modifier_delta", 0.5));
        }
        if governs {
            signals.push(Signal::new("ability_governs_target", 0.3));
        }
        if same_direction(delta, mod_delta) {
            signals.push(Signal::new("same_direction", 0.1));
        }
        correlation(
            trigger::ABILITY_SCORE_CHANGE,
            signals,
            Some((meta::CAUSED_BY_ABILITY, ability.title().to_string())),
        )
    }
}

/// Total level → proficiency bonus, hit points, class features, spell slots.
pub struct LevelCorrelator;

impl Correlator for LevelCorrelator {
    fn name(&self) -> &'static str {
        "level"
    }

    fn correlate(
        &self,
        cause: &Change,
        effect: &Change,
        ctx: &CorrelationContext<'_>,
    ) -> Option<Correlation> {
        if cause.field_path != LEVEL_PATH {
            return None;
        }
        let level_up = cause.change_type == ChangeType::Incremented;
        let primary_class = ctx.new.classes.first().map(|c| c.name.clone());
        let mut signals = Vec::new();
        match segments(&effect.field_path).as_slice() {
            ["proficiencies", "proficiency_bonus"] => {
                if level_up {
                    signals.push(Signal::new("level_increased", 0.5));
                }
                if ctx.new.proficiency_bonus == proficiency_bonus_for_level(ctx.new.level) {
                    signals.push(Signal::new("bonus_matches_level_table", 0.3));
                }
            }
            ["combat", "hit_points", "maximum"] => {
                signals.push(Signal::new("level_changed", 0.5));
                if effect.change_type == ChangeType::Incremented {
                    signals.push(Signal::new("hit_points_increased", 0.2));
                }
            }
            ["classes", class, "subclass_features", _] if effect.change_type == ChangeType::Added => {
                signals.push(Signal::new("level_changed", 0.5));
                let gained = ctx
                    .new
                    .classes
                    .iter()
                    .find(|c| c.key == *class)
                    .is_some_and(|c| c.level > ctx.old.class_level(&c.name));
                if gained {
                    signals.push(Signal::new("class_level_increased", 0.2));
                }
                let class_name = ctx.new.classes.iter().find(|c| c.key == *class).map(|c| c.name.clone());
                return correlation(
                    trigger::LEVEL_PROGRESSION,
                    signals,
                    class_name.or(primary_class).map(|n| (meta::CAUSED_BY_CLASS, n)),
                );
            }
            ["spellcasting", "spell_slots", _] => {
                signals.push(Signal::new("level_changed", 0.5));
            }
            _ => return None,
        }
        correlation(trigger::LEVEL_PROGRESSION, signals, None)
    }
}

/// Proficiency bonus → proficient skill/save bonuses and spell statistics.
pub struct ProficiencyBonusCorrelator;

impl Correlator for ProficiencyBonusCorrelator {
    fn name(&self) -> &'static str {
        "proficiency_bonus"
    }

    fn correlate(
        &self,
        cause: &Change,
        effect: &Change,
        ctx: &CorrelationContext<'_>,
    ) -> Option<Correlation> {
        if cause.field_path != PROFICIENCY_BONUS_PATH {
            return None;
        }
        let pb_delta = cause.numeric_delta()?;
        let proficient = match segments(&effect.field_path).as_slice() {
            ["skills", skill, "bonus"] => ctx.new.has_proficiency("skills", skill),
            ["saving_throws", ability, "bonus"] => ctx.new.has_proficiency("saving_throws", ability),
            ["spellcasting", "spell_save_dc" | "spell_attack_bonus"] => true,
            _ => return None,
        };
        let delta = effect.numeric_delta()?;
        let mut signals = Vec::new();
        if delta == pb_delta {
            signals.push(Signal::new("delta_equals_bonus_delta", 0.5));
        }
        if same_direction(delta, pb_delta) {
            signals.push(Signal::new("same_direction", 0.1));
        }
        if proficient {
            signals.push(Signal::new("target_proficient", 0.2));
        }
        correlation(trigger::LEVEL_PROGRESSION, signals, None)
    }
}

/// Skill proficiency or expertise toggle → that skill's bonus.
pub struct SkillProficiencyCorrelator;

impl Correlator for SkillProficiencyCorrelator {
    fn name(&self) -> &'static str {
        "skill_proficiency"
    }

    fn correlate(
        &self,
        cause: &Change,
        effect: &Change,
        ctx: &CorrelationContext<'_>,
    ) -> Option<Correlation> {
        let cause_skill = match segments(&cause.field_path).as_slice() {
            ["proficiencies", "skills", skill] | ["proficiencies", "skills", skill, "expertise"] => {
                skill.to_string()
            }
            _ => return None,
        };
        let effect_skill = match segments(&effect.field_path).as_slice() {
            ["skills", skill, "bonus"] => skill.to_string(),
            _ => return None,
        };
        if cause_skill != effect_skill {
            return None;
        }
        let mut signals = vec![Signal::new("same_skill", 0.6)];
        let expected = match cause.change_type {
            ChangeType::Added => ctx.new.proficiency_bonus,
            ChangeType::Removed => -ctx.old.proficiency_bonus,
            _ => 0,
        };
        if expected != 0 && effect.numeric_delta() == Some(expected) {
            signals.push(Signal::new("delta_equals_proficiency_bonus", 0.2));
        }
        correlation(trigger::PROFICIENCY_CHANGE, signals, None)
    }
}

/// Newly selected feat → the ability score it raises.
pub struct FeatAbilityCorrelator;

impl Correlator for FeatAbilityCorrelator {
    fn name(&self) -> &'static str {
        "feat_ability"
    }

    fn correlate(
        &self,
        cause: &Change,
        effect: &Change,
        ctx: &CorrelationContext<'_>,
    ) -> Option<Correlation> {
        if cause.change_type != ChangeType::Added {
            return None;
        }
        let feat_segment = match segments(&cause.field_path).as_slice() {
            ["features", "feats", segment] => segment.to_string(),
            _ => return None,
        };
        let ability = match segments(&effect.field_path).as_slice() {
            ["abilities", name] => Ability::parse(name)?,
            _ => return None,
        };
        let feat = ctx.new.feats.iter().find(|f| f.segment == feat_segment)?;
        let bump = *ctx.rules.feat(&feat.name)?.ability_scores.get(&ability)?;
        let mut signals = vec![Signal::new("feat_raises_ability", 0.6)];
        if effect.numeric_delta() == Some(bump) {
            signals.push(Signal::new("delta_equals_bump", 0.3));
        }
        correlation(
            trigger::FEAT_SELECTION,
            signals,
            Some((meta::CAUSED_BY_FEAT, feat.name.clone())),
        )
    }
}

/// Species change → speed, size and ability scores.
pub struct SpeciesCorrelator;

impl Correlator for SpeciesCorrelator {
    fn name(&self) -> &'static str {
        "species"
    }

    fn correlate(
        &self,
        cause: &Change,
        effect: &Change,
        ctx: &CorrelationContext<'_>,
    ) -> Option<Correlation> {
        if cause.field_path != SPECIES_PATH {
            return None;
        }
        let new_species = ctx.new.species.as_ref()?;
        let table = species_rules(new_species, ctx.rules);
        let old_table = ctx
            .old
            .species
            .as_ref()
            .and_then(|s| species_rules(s, ctx.rules));
        let table_match = match segments(&effect.field_path).as_slice() {
            ["combat", "speed", "walk"] => {
                let walk = ctx.new.speed.get("walk").copied();
                table.and_then(|t| t.speed).is_some_and(|s| Some(s) == walk)
            }
            ["character_info", "size"] => table
                .and_then(|t| t.size.as_deref())
                .is_some_and(|s| s.eq_ignore_ascii_case(&ctx.new.size)),
            ["abilities", name] => {
                let ability = Ability::parse(name)?;
                let bonus = |t: Option<&crate::rules::SpeciesRules>| {
                    t.and_then(|t| t.ability_bonuses.get(&ability).copied())
                        .unwrap_or(0)
                };
                let expected = bonus(table) - bonus(old_table);
                expected != 0 && effect.numeric_delta() == Some(expected)
            }
            _ => return None,
        };
        let mut signals = vec![Signal::new("species_changed", 0.5)];
        if table_match {
            signals.push(Signal::new("species_table_match", 0.2));
        }
        correlation(
            trigger::RACE_CHANGE,
            signals,
            Some((meta::CAUSED_BY_RACE, new_species.name.clone())),
        )
    }
}

/// Background change → newly added proficiencies.
pub struct BackgroundCorrelator;

impl Correlator for BackgroundCorrelator {
    fn name(&self) -> &'static str {
        "background"
    }

    fn correlate(
        &self,
        cause: &Change,
        effect: &Change,
        ctx: &CorrelationContext<'_>,
    ) -> Option<Correlation> {
        if cause.field_path != BACKGROUND_PATH || effect.change_type != ChangeType::Added {
            return None;
        }
        let (kind, item) = match segments(&effect.field_path).as_slice() {
            ["proficiencies", kind, item] => (kind.to_string(), item.to_string()),
            _ => return None,
        };
        let name = ctx.new.background.clone()?;
        let listed = ctx.rules.background(&name).is_some_and(|b| {
            b.proficiencies.iter().any(|(k, items)| {
                crate::detectors::proficiency_kind(k) == kind && items.iter().any(|i| slug(i) == item)
            })
        });
        let mut signals = vec![Signal::new("background_changed", 0.5)];
        if listed {
            signals.push(Signal::new("background_table_match", 0.3));
        }
        correlation(
            trigger::BACKGROUND_CHANGE,
            signals,
            Some((meta::CAUSED_BY_BACKGROUND, name)),
        )
    }
}

/// Item equip or attunement → initiative, speed and passive scores the item
/// declares a bonus for.
pub struct ItemCorrelator;

impl Correlator for ItemCorrelator {
    fn name(&self) -> &'static str {
        "item"
    }

    fn correlate(
        &self,
        cause: &Change,
        effect: &Change,
        ctx: &CorrelationContext<'_>,
    ) -> Option<Correlation> {
        let segment = match segments(&cause.field_path).as_slice() {
            ["equipment", "inventory", segment] if cause.change_type == ChangeType::Added => {
                segment.to_string()
            }
            ["equipment", "inventory", segment, "equipped" | "attuned"] => segment.to_string(),
            _ => return None,
        };
        let item = ctx.new.inventory.iter().find(|i| i.segment == segment)?;
        let table = ctx.rules.item(&item.name);
        let declared = |field: &str| -> i64 {
            item.fields
                .get(field)
                .and_then(crate::extract::value::as_int)
                .or_else(|| {
                    table.map(|t| match field {
                        "initiative_bonus" => t.initiative_bonus,
                        _ => t.speed_bonus,
                    })
                })
                .unwrap_or(0)
        };
        let affects = match segments(&effect.field_path).as_slice() {
            ["combat", "initiative"] => declared("initiative_bonus") != 0,
            ["combat", "speed", _] => declared("speed_bonus") != 0,
            ["passive_skills", skill] => item.passive_bonus(skill, ctx.rules) != 0,
            _ => return None,
        };
        if !affects {
            return None;
        }
        correlation(
            trigger::EQUIPMENT,
            vec![Signal::new("item_declares_bonus", 0.5)],
            Some((meta::CAUSED_BY_ITEM, item.name.clone())),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::{ctx, sheet};
    use crate::detectors::DetectorBase;
    use crate::classify::PriorityRules;
    use crate::model::ChangeCategory;
    use serde_json::{json, Value};

    fn change(path: &str, change_type: ChangeType, old: Option<Value>, new: Option<Value>) -> Change {
        DetectorBase::new("test", PriorityRules::new())
            .change(&ctx(), path, change_type, ChangeCategory::Skills, "")
            .with_values(old, new)
    }

    fn numeric(path: &str, old: i64, new: i64) -> Change {
        let change_type = ChangeType::for_numeric(old, new).unwrap();
        change(path, change_type, Some(json!(old)), Some(json!(new)))
    }

    #[test]
    fn test_ability_correlator_full_match() {
        let s = sheet(&json!({}));
        let rules = RulesData::builtin();
        let cx = CorrelationContext { old: &s, new: &s, rules: &rules };
        let cause = numeric("abilities.dexterity", 13, 14);
        let effect = numeric("skills.stealth.bonus", 1, 2);
        let c = AbilityCorrelator.correlate(&cause, &effect, &cx).unwrap();
        assert_eq!(c.confidence(), 0.9);
        assert_eq!(c.trigger, "ability_score_change");

        // arcana is not a dexterity skill
        let effect = numeric("skills.arcana.bonus", 1, 2);
        let c = AbilityCorrelator.correlate(&cause, &effect, &cx).unwrap();
        assert_eq!(c.confidence(), 0.6);
        let unrelated = numeric("combat.hit_points.maximum", 10, 12);
        assert!(AbilityCorrelator.correlate(&cause, &unrelated, &cx).is_none());
    }

    #[test]
    fn test_level_correlator_for_proficiency_bonus() {
        let old = sheet(&json!({"character_info": {"level": 4}}));
        let new = sheet(&json!({"character_info": {"level": 5}}));
        let rules = RulesData::builtin();
        let cx = CorrelationContext { old: &old, new: &new, rules: &rules };
        let cause = numeric(LEVEL_PATH, 4, 5);
        let c = LevelCorrelator
            .correlate(&cause, &numeric(PROFICIENCY_BONUS_PATH, 2, 3), &cx)
            .unwrap();
        assert_eq!(c.confidence(), 0.8);
        let hp = LevelCorrelator
            .correlate(&cause, &numeric("combat.hit_points.maximum", 30, 38), &cx)
            .unwrap();
        assert_eq!(hp.confidence(), 0.7);
    }

    #[test]
    fn test_feat_ability_correlator() {
        let old = sheet(&json!({}));
        let new = sheet(&json!({"feats": ["Observant"]}));
        let rules = RulesData::builtin();
        let cx = CorrelationContext { old: &old, new: &new, rules: &rules };
        let cause = change("features.feats.observant", ChangeType::Added, None, Some(json!({"name": "Observant"})));
        let c = FeatAbilityCorrelator
            .correlate(&cause, &numeric("abilities.wisdom", 13, 14), &cx)
            .unwrap();
        assert_eq!(c.confidence(), 0.9);
        assert_eq!(c.attribution, Some((meta::CAUSED_BY_FEAT, "Observant".to_string())));
        assert!(FeatAbilityCorrelator
            .correlate(&cause, &numeric("abilities.strength", 13, 14), &cx)
            .is_none());
    }

    #[test]
    fn test_item_correlator_requires_declared_bonus() {
        let old = sheet(&json!({}));
        let new = sheet(&json!({"inventory": [
            {"name": "Sentinel Shield", "equipped": true},
            {"name": "Rope", "equipped": true}
        ]}));
        let rules = RulesData::builtin();
        let cx = CorrelationContext { old: &old, new: &new, rules: &rules };
        let shield = change("equipment.inventory.sentinel_shield", ChangeType::Added, None, Some(json!("x")));
        let rope = change("equipment.inventory.rope", ChangeType::Added, None, Some(json!("x")));
        let init = numeric("combat.initiative", 0, 2);
        assert!(ItemCorrelator.correlate(&shield, &init, &cx).is_some());
        assert!(ItemCorrelator.correlate(&rope, &init, &cx).is_none());
    }

    #[test]
    fn test_background_correlator_table_match() {
        let old = sheet(&json!({}));
        let new = sheet(&json!({"background": "Sage"}));
        let rules = RulesData::builtin();
        let cx = CorrelationContext { old: &old, new: &new, rules: &rules };
        let cause = change(BACKGROUND_PATH, ChangeType::Added, None, Some(json!("Sage")));
        let effect = change("proficiencies.skills.arcana", ChangeType::Added, None, Some(json!(true)));
        let c = BackgroundCorrelator.correlate(&cause, &effect, &cx).unwrap();
        assert_eq!(c.confidence(), 0.8);
        let effect = change("proficiencies.tools.lute", ChangeType::Added, None, Some(json!("Lute")));
        assert_eq!(BackgroundCorrelator.correlate(&cause, &effect, &cx).unwrap().confidence(), 0.5);
    }
}
