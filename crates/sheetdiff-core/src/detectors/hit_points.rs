//! Maximum hit points with ranked cause accounting.
//!
//! Candidate causes are tried in a fixed order. Each one that explains the
//! remaining delta (within tolerance, or partially in the same direction) is
//! recorded and its expected amount subtracted from the remainder.

use serde_json::{json, Value};
use std::collections::BTreeMap;

use crate::classify::PriorityRules;
use crate::errors::ExError;
use crate::extract::value::{as_int, field};
use crate::extract::{Ability, CharacterSheet, ItemEntry};
use crate::model::metadata::{self as meta, trigger};
use crate::model::{Change, ChangeCategory, ChangePriority, DetectionContext, Diagnostics};
use crate::rules::RulesData;

use super::level::LEVEL_PATH;
use super::{ChangeDetector, DetectorBase};

pub const MAX_HP_PATH: &str = "combat.hit_points.maximum";

/// Tolerance for causes other than level progression.
const FLAT_TOLERANCE: i64 = 2;
/// Tolerance per level gained.
const LEVEL_TOLERANCE: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HpCauseKind {
    LevelProgression,
    Constitution,
    Feat,
    MagicItem,
    ClassFeature,
}

impl HpCauseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HpCauseKind::LevelProgression => "level_progression",
            HpCauseKind::Constitution => "constitution_change",
            HpCauseKind::Feat => "feat",
            HpCauseKind::MagicItem => "magic_item",
            HpCauseKind::ClassFeature => "class_feature",
        }
    }

    /// Confidence contributed when this cause is recorded
    pub fn weight(&self) -> f64 {
        match self {
            HpCauseKind::LevelProgression => 0.7,
            HpCauseKind::Constitution => 0.5,
            HpCauseKind::Feat => 0.4,
            HpCauseKind::MagicItem => 0.3,
            HpCauseKind::ClassFeature => 0.3,
        }
    }

    fn trigger(&self) -> &'static str {
        match self {
            HpCauseKind::LevelProgression => trigger::LEVEL_PROGRESSION,
            HpCauseKind::Constitution => trigger::ABILITY_SCORE_CHANGE,
            HpCauseKind::Feat => trigger::FEAT_SELECTION,
            HpCauseKind::MagicItem => trigger::EQUIPMENT,
            HpCauseKind::ClassFeature => trigger::CLASS_FEATURE,
        }
    }
}

#[derive(Debug, Clone)]
struct Candidate {
    kind: HpCauseKind,
    source: String,
    amount: i64,
    tolerance: i64,
    /// Field path of the causing change in the same batch, when one exists
    caused_by: Option<String>,
    /// Attribution metadata key and entity name
    attribution: Option<(&'static str, String)>,
}

impl Candidate {
    fn explains(&self, remaining: i64) -> bool {
        if self.amount == 0 || remaining == 0 {
            return false;
        }
        let within = (remaining - self.amount).abs() <= self.tolerance;
        let partial =
            self.amount.signum() == remaining.signum() && self.amount.abs() < remaining.abs();
        within || partial
    }
}

pub struct HitPointsDetector {
    base: DetectorBase,
}

impl HitPointsDetector {
    pub fn new() -> Self {
        Self {
            base: DetectorBase::new(
                "hit_points",
                PriorityRules::new().rule(MAX_HP_PATH, ChangePriority::High),
            ),
        }
    }

    fn level_candidate(
        &self,
        old: &CharacterSheet,
        new: &CharacterSheet,
        rules: &RulesData,
        diag: &mut Diagnostics,
    ) -> Option<Candidate> {
        let levels_gained = new.level - old.level;
        if levels_gained == 0 {
            return None;
        }
        let con_mod = new.modifier(Ability::Constitution);
        let per_level = |hit_die: i64| hit_die / 2 + 1 + con_mod;

        let mut amount = 0;
        let mut gained_classes = Vec::new();
        let mut accounted = 0;
        for class in &new.classes {
            let gained = class.level - old.class_level(&class.name);
            if gained == 0 {
                continue;
            }
            match class.hit_die.or_else(|| rules.hit_die(&class.name)) {
                Some(hd) => {
                    amount += gained * per_level(hd);
                    accounted += gained;
                    gained_classes.push(class.name.clone());
                }
                None => diag.record(
                    self.base.name(),
                    MAX_HP_PATH,
                    format!("hit die unknown for class '{}'", class.name),
                ),
            }
        }
        if accounted != levels_gained {
            // Total level moved without matching class levels; fall back to
            // the primary class hit die for the unaccounted levels.
            let primary = new
                .classes
                .first()
                .and_then(|c| c.hit_die.or_else(|| rules.hit_die(&c.name)));
            match primary {
                Some(hd) => amount += (levels_gained - accounted) * per_level(hd),
                None if accounted == 0 => {
                    diag.record(
                        self.base.name(),
                        MAX_HP_PATH,
                        "level changed but no hit die is known",
                    );
                    return None;
                }
                None => {}
            }
        }
        let attribution = match gained_classes.as_slice() {
            [only] => Some((meta::CAUSED_BY_CLASS, only.clone())),
            _ => new
                .classes
                .first()
                .map(|c| (meta::CAUSED_BY_CLASS, c.name.clone())),
        };
        Some(Candidate {
            kind: HpCauseKind::LevelProgression,
            source: format!("level {} → {}", old.level, new.level),
            amount,
            tolerance: LEVEL_TOLERANCE * levels_gained.abs(),
            caused_by: Some(LEVEL_PATH.to_string()),
            attribution,
        })
    }

    fn candidates(
        &self,
        old: &CharacterSheet,
        new: &CharacterSheet,
        rules: &RulesData,
        diag: &mut Diagnostics,
    ) -> Vec<Candidate> {
        let mut out: Vec<Candidate> = self.level_candidate(old, new, rules, diag).into_iter().collect();

        let con_delta = new.modifier(Ability::Constitution) - old.modifier(Ability::Constitution);
        if con_delta != 0 {
            out.push(Candidate {
                kind: HpCauseKind::Constitution,
                source: "Constitution modifier".to_string(),
                amount: con_delta * old.level,
                tolerance: FLAT_TOLERANCE,
                caused_by: Some("abilities.constitution".to_string()),
                attribution: Some((meta::CAUSED_BY_ABILITY, Ability::Constitution.title().to_string())),
            });
        }

        let old_feats: BTreeMap<&str, _> = old.feats.iter().map(|f| (f.key.as_str(), f)).collect();
        let new_feats: BTreeMap<&str, _> = new.feats.iter().map(|f| (f.key.as_str(), f)).collect();
        for feat in new.feats.iter().filter(|f| !old_feats.contains_key(f.key.as_str())) {
            if let Some(grant) = rules.feat(&feat.name).and_then(|e| e.hit_points) {
                out.push(Candidate {
                    kind: HpCauseKind::Feat,
                    source: feat.name.clone(),
                    amount: grant.amount(new.level),
                    tolerance: FLAT_TOLERANCE,
                    caused_by: Some(format!("features.feats.{}", feat.segment)),
                    attribution: Some((meta::CAUSED_BY_FEAT, feat.name.clone())),
                });
            }
        }
        for feat in old.feats.iter().filter(|f| !new_feats.contains_key(f.key.as_str())) {
            if let Some(grant) = rules.feat(&feat.name).and_then(|e| e.hit_points) {
                out.push(Candidate {
                    kind: HpCauseKind::Feat,
                    source: feat.name.clone(),
                    amount: -grant.amount(old.level),
                    tolerance: FLAT_TOLERANCE,
                    caused_by: Some(format!("features.feats.{}", feat.segment)),
                    attribution: Some((meta::CAUSED_BY_FEAT, feat.name.clone())),
                });
            }
        }

        out.extend(item_candidates(old, new, rules));

        let old_features: BTreeMap<&str, _> =
            old.class_features.iter().map(|f| (f.key.as_str(), f)).collect();
        for feature in new
            .class_features
            .iter()
            .filter(|f| !old_features.contains_key(f.key.as_str()))
        {
            if let Some(grant) = rules.class_feature(&feature.name).and_then(|r| r.hit_points) {
                out.push(Candidate {
                    kind: HpCauseKind::ClassFeature,
                    source: feature.name.clone(),
                    amount: grant.amount(new.level),
                    tolerance: FLAT_TOLERANCE,
                    caused_by: None,
                    attribution: Some((meta::CAUSED_BY_CLASS, feature.name.clone())),
                });
            }
        }
        out
    }
}

impl Default for HitPointsDetector {
    fn default() -> Self {
        Self::new()
    }
}

fn item_hit_points(item: &ItemEntry, rules: &RulesData) -> i64 {
    field(&item.fields, &["hit_points", "hp_bonus"])
        .and_then(as_int)
        .or_else(|| rules.item(&item.name).map(|r| r.hit_points))
        .unwrap_or(0)
}

/// Items whose hit point bonus switched on or off between the sheets.
fn item_candidates(old: &CharacterSheet, new: &CharacterSheet, rules: &RulesData) -> Vec<Candidate> {
    let old_items: BTreeMap<&str, &ItemEntry> =
        old.inventory.iter().map(|i| (i.key.as_str(), i)).collect();
    let new_items: BTreeMap<&str, &ItemEntry> =
        new.inventory.iter().map(|i| (i.key.as_str(), i)).collect();
    let mut out = Vec::new();

    for item in &new.inventory {
        let hp = item_hit_points(item, rules);
        if hp == 0 {
            continue;
        }
        let previous = old_items.get(item.key.as_str());
        let was_active = previous.is_some_and(|p| p.is_active(rules));
        let is_active = item.is_active(rules);
        if was_active == is_active {
            continue;
        }
        let base = format!("equipment.inventory.{}", item.segment);
        let caused_by = match previous {
            None => base,
            Some(p) if p.attuned != item.attuned => format!("{base}.attuned"),
            Some(_) => format!("{base}.equipped"),
        };
        out.push(Candidate {
            kind: HpCauseKind::MagicItem,
            source: item.name.clone(),
            amount: if is_active { hp } else { -hp },
            tolerance: FLAT_TOLERANCE,
            caused_by: Some(caused_by),
            attribution: Some((meta::CAUSED_BY_ITEM, item.name.clone())),
        });
    }
    for item in &old.inventory {
        let hp = item_hit_points(item, rules);
        if hp == 0 || new_items.contains_key(item.key.as_str()) || !item.is_active(rules) {
            continue;
        }
        out.push(Candidate {
            kind: HpCauseKind::MagicItem,
            source: item.name.clone(),
            amount: -hp,
            tolerance: FLAT_TOLERANCE,
            caused_by: Some(format!("equipment.inventory.{}", item.segment)),
            attribution: Some((meta::CAUSED_BY_ITEM, item.name.clone())),
        });
    }
    out
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

impl ChangeDetector for HitPointsDetector {
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
        let Some(mut change) = self.base.numeric(
            ctx,
            MAX_HP_PATH,
            ChangeCategory::Combat,
            "Maximum hit points",
            old.max_hit_points,
            new.max_hit_points,
        ) else {
            return Ok(Vec::new());
        };

        let mut remaining = new.max_hit_points - old.max_hit_points;
        let mut matched: Vec<Candidate> = Vec::new();
        for candidate in self.candidates(old, new, rules, diag) {
            if candidate.explains(remaining) {
                remaining -= candidate.amount;
                matched.push(candidate);
            }
        }

        let modifiers: Vec<Value> = matched
            .iter()
            .map(|c| json!({"source": c.source, "kind": c.kind.as_str(), "amount": c.amount}))
            .collect();
        change = change.with_meta(
            meta::HP_BREAKDOWN,
            json!({
                "base_hp": old.max_hit_points,
                "modifiers": modifiers,
                "unexplained": remaining,
                "total": new.max_hit_points,
            }),
        );

        if let Some(primary) = matched.first() {
            let confidence: f64 = matched.iter().map(|c| c.kind.weight()).sum();
            let causes: Vec<Value> = matched.iter().map(|c| Value::from(c.kind.as_str())).collect();
            change = change
                .with_meta(meta::HP_CAUSES, causes)
                .with_meta(meta::CAUSATION_CONFIDENCE, round2(confidence.min(1.0)))
                .with_meta(meta::CAUSATION_TRIGGER, primary.kind.trigger());
            if let Some(path) = &primary.caused_by {
                change = change.with_meta(meta::CAUSED_BY, path.as_str());
            }
            if let Some((key, name)) = &primary.attribution {
                change = change.with_meta(*key, name.as_str());
            }
        }
        Ok(vec![change])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::run;
    use serde_json::json;

    fn fighter(level: i64, con: i64, hp: i64) -> Value {
        json!({
            "character_info": {"level": level, "classes": [{"name": "Fighter", "level": level}]},
            "abilities": {"ability_scores": {"constitution": con}},
            "combat": {"hit_points": {"maximum": hp}}
        })
    }

    #[test]
    fn test_level_up_within_tolerance() {
        // expected 1 × (10/2 + 1 + 2) = 8, observed 7
        let changes = run(&HitPointsDetector::new(), fighter(3, 14, 28), fighter(4, 14, 35));
        let hp = &changes[0];
        assert_eq!(hp.priority, ChangePriority::High);
        assert_eq!(hp.category, ChangeCategory::Combat);
        assert_eq!(hp.metadata[meta::HP_CAUSES], json!(["level_progression"]));
        assert_eq!(hp.metadata[meta::CAUSATION_CONFIDENCE], json!(0.7));
        assert_eq!(hp.meta_str(meta::CAUSATION_TRIGGER), Some("level_progression"));
        assert_eq!(hp.meta_str(meta::CAUSED_BY), Some(LEVEL_PATH));
        assert_eq!(hp.metadata[meta::HP_BREAKDOWN]["base_hp"], json!(28));
        assert_eq!(hp.metadata[meta::HP_BREAKDOWN]["total"], json!(35));
    }

    #[test]
    fn test_level_and_constitution_together() {
        // level: 1 × (5 + 1 + 3) = 9; constitution: +1 × 4 = 4
        let changes = run(&HitPointsDetector::new(), fighter(4, 15, 40), fighter(5, 16, 53));
        let hp = &changes[0];
        assert_eq!(
            hp.metadata[meta::HP_CAUSES],
            json!(["level_progression", "constitution_change"])
        );
        assert_eq!(hp.metadata[meta::CAUSATION_CONFIDENCE], json!(1.0));
        assert_eq!(hp.metadata[meta::HP_BREAKDOWN]["unexplained"], json!(0));
    }

    #[test]
    fn test_tough_feat_explains_hp() {
        let mut new = fighter(4, 14, 52);
        new["features"] = json!({"feats": ["Tough"]});
        let changes = run(&HitPointsDetector::new(), fighter(4, 14, 44), new);
        let hp = &changes[0];
        assert_eq!(hp.metadata[meta::HP_CAUSES], json!(["feat"]));
        assert_eq!(hp.meta_str(meta::CAUSED_BY_FEAT), Some("Tough"));
        assert_eq!(hp.meta_str(meta::CAUSED_BY), Some("features.feats.tough"));
        assert_eq!(hp.metadata[meta::CAUSATION_CONFIDENCE], json!(0.4));
    }

    #[test]
    fn test_attuned_item() {
        let mut old = fighter(4, 14, 44);
        old["equipment"] = json!({"inventory": [{"name": "Ring of Vitality"}]});
        let mut new = fighter(4, 14, 49);
        new["equipment"] = json!({"inventory": [{"name": "Ring of Vitality", "attuned": true}]});
        let changes = run(&HitPointsDetector::new(), old, new);
        let hp = &changes[0];
        assert_eq!(hp.metadata[meta::HP_CAUSES], json!(["magic_item"]));
        assert_eq!(hp.meta_str(meta::CAUSED_BY_ITEM), Some("Ring of Vitality"));
        assert_eq!(
            hp.meta_str(meta::CAUSED_BY),
            Some("equipment.inventory.ring_of_vitality.attuned")
        );
    }

    #[test]
    fn test_unexplained_change_has_no_cause() {
        let changes = run(&HitPointsDetector::new(), fighter(4, 14, 44), fighter(4, 14, 30));
        let hp = &changes[0];
        assert!(!hp.metadata.contains_key(meta::HP_CAUSES));
        assert!(!hp.metadata.contains_key(meta::CAUSED_BY));
        assert_eq!(hp.metadata[meta::HP_BREAKDOWN]["unexplained"], json!(-14));
    }

    #[test]
    fn test_unchanged_hp_emits_nothing() {
        let changes = run(&HitPointsDetector::new(), fighter(4, 14, 44), fighter(5, 14, 44));
        assert!(changes.is_empty());
    }
}
