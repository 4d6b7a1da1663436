//! Entry types of the reference tables.
//!
//! Every field is defaulted so a table entry only lists what it grants.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::extract::Ability;

/// Hit point grant that may scale with total character level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitPointGrant {
    #[serde(default)]
    pub per_level: i64,
    #[serde(default)]
    pub flat: i64,
}

impl HitPointGrant {
    pub fn amount(&self, total_level: i64) -> i64 {
        self.per_level * total_level + self.flat
    }
}

/// Mechanical effects granted when a feat is taken.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatEffects {
    #[serde(default)]
    pub ability_scores: BTreeMap<Ability, i64>,
    /// Proficiency kind (`skills`, `tools`, `languages`, ...) to granted items
    #[serde(default)]
    pub proficiencies: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub spells: Vec<String>,
    /// Option kind (`attack_options`, `bonus_actions`, `reactions`) to names
    #[serde(default)]
    pub combat_options: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub hit_points: Option<HitPointGrant>,
    /// Skill slug to flat bonus on the passive score
    #[serde(default)]
    pub passive_bonuses: BTreeMap<String, i64>,
}

/// How a class contributes to multiclass spellcaster level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CasterType {
    Full,
    Half,
    Third,
    /// Pact magic; excluded from the shared spellcaster level
    Pact,
    #[default]
    None,
}

impl CasterType {
    /// Contribution of `level` class levels to the shared spellcaster level
    pub fn caster_levels(&self, level: i64) -> i64 {
        match self {
            CasterType::Full => level,
            CasterType::Half => level / 2,
            CasterType::Third => level / 3,
            CasterType::Pact | CasterType::None => 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SubclassRules {
    /// Overrides the class caster type (e.g. third casters on martial classes)
    #[serde(default)]
    pub caster: Option<CasterType>,
    #[serde(default)]
    pub features: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassRules {
    pub hit_die: i64,
    #[serde(default)]
    pub caster: CasterType,
    #[serde(default)]
    pub saving_throws: Vec<Ability>,
    /// Keyed by lowercase subclass name
    #[serde(default)]
    pub subclasses: BTreeMap<String, SubclassRules>,
    /// Proficiencies granted when the class is taken as a multiclass
    #[serde(default)]
    pub multiclass_proficiencies: BTreeMap<String, Vec<String>>,
}

impl ClassRules {
    pub fn new(hit_die: i64) -> Self {
        Self {
            hit_die,
            caster: CasterType::None,
            saving_throws: Vec::new(),
            subclasses: BTreeMap::new(),
            multiclass_proficiencies: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeciesRules {
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub speed: Option<i64>,
    #[serde(default)]
    pub ability_bonuses: BTreeMap<Ability, i64>,
    #[serde(default)]
    pub traits: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackgroundRules {
    /// Proficiency kind to granted items
    #[serde(default)]
    pub proficiencies: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ItemRules {
    #[serde(default)]
    pub requires_attunement: bool,
    #[serde(default)]
    pub hit_points: i64,
    #[serde(default)]
    pub initiative_bonus: i64,
    #[serde(default)]
    pub speed_bonus: i64,
    #[serde(default)]
    pub passive_bonuses: BTreeMap<String, i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassFeatureRules {
    #[serde(default)]
    pub hit_points: Option<HitPointGrant>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_caster_levels() {
        assert_eq!(CasterType::Full.caster_levels(5), 5);
        assert_eq!(CasterType::Half.caster_levels(5), 2);
        assert_eq!(CasterType::Third.caster_levels(5), 1);
        assert_eq!(CasterType::Pact.caster_levels(5), 0);
    }

    #[test]
    fn test_hit_point_grant_scales_with_level() {
        let tough = HitPointGrant {
            per_level: 2,
            flat: 0,
        };
        assert_eq!(tough.amount(4), 8);
    }

    #[test]
    fn test_feat_effects_default_fields() {
        let parsed: FeatEffects =
            serde_json::from_str(r#"{"ability_scores": {"wisdom": 1}}"#).unwrap();
        assert_eq!(parsed.ability_scores.get(&Ability::Wisdom), Some(&1));
        assert!(parsed.spells.is_empty());
        assert!(parsed.hit_points.is_none());
    }
}
