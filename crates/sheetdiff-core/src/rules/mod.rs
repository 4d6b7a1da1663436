//! Game-rule reference tables.
//!
//! The built-in tables live in `data/*.json`, are embedded at compile time
//! and parsed once per process. A table that fails to parse is logged and
//! replaced by an empty one; detection degrades to "no table match" instead
//! of failing.

pub mod tables;

pub use tables::{
    BackgroundRules, CasterType, ClassFeatureRules, ClassRules, FeatEffects, HitPointGrant,
    ItemRules, SpeciesRules, SubclassRules,
};

use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::{Arc, OnceLock};

use crate::errors::{Result, SheetDiffError};
use crate::extract::Ability;

const FEATS_JSON: &str = include_str!("../../data/feats.json");
const CLASSES_JSON: &str = include_str!("../../data/classes.json");
const SPECIES_JSON: &str = include_str!("../../data/species.json");
const BACKGROUNDS_JSON: &str = include_str!("../../data/backgrounds.json");
const SKILLS_JSON: &str = include_str!("../../data/skills.json");
const MAGIC_ITEMS_JSON: &str = include_str!("../../data/magic_items.json");
const CLASS_FEATURES_JSON: &str = include_str!("../../data/class_features.json");

static BUILTIN: OnceLock<Arc<RulesData>> = OnceLock::new();

/// Proficiency bonus for a total character level: `2 + (level - 1) / 4`.
pub fn proficiency_bonus_for_level(level: i64) -> i64 {
    2 + (level.max(1) - 1) / 4
}

/// Normalize a display name into a table key.
pub fn table_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// All reference tables. Read-only once built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RulesData {
    pub feats: BTreeMap<String, FeatEffects>,
    pub classes: BTreeMap<String, ClassRules>,
    pub species: BTreeMap<String, SpeciesRules>,
    pub backgrounds: BTreeMap<String, BackgroundRules>,
    /// Skill slug to governing ability
    pub skills: BTreeMap<String, Ability>,
    pub items: BTreeMap<String, ItemRules>,
    pub class_features: BTreeMap<String, ClassFeatureRules>,
}

/// Raw JSON text of every table, used to build a [`RulesData`].
#[derive(Debug, Clone, Copy)]
pub struct RulesSource<'a> {
    pub feats: &'a str,
    pub classes: &'a str,
    pub species: &'a str,
    pub backgrounds: &'a str,
    pub skills: &'a str,
    pub items: &'a str,
    pub class_features: &'a str,
}

impl RulesSource<'static> {
    pub fn builtin() -> Self {
        Self {
            feats: FEATS_JSON,
            classes: CLASSES_JSON,
            species: SPECIES_JSON,
            backgrounds: BACKGROUNDS_JSON,
            skills: SKILLS_JSON,
            items: MAGIC_ITEMS_JSON,
            class_features: CLASS_FEATURES_JSON,
        }
    }
}

fn parse_table<T: DeserializeOwned>(table: &str, text: &str) -> Result<BTreeMap<String, T>> {
    let parsed: BTreeMap<String, T> =
        serde_json::from_str(text).map_err(|e| SheetDiffError::InvalidRulesTable {
            table: table.to_string(),
            message: e.to_string(),
        })?;
    Ok(parsed
        .into_iter()
        .map(|(k, v)| (table_key(&k), v))
        .collect())
}

fn parse_or_empty<T: DeserializeOwned>(table: &str, text: &str) -> BTreeMap<String, T> {
    match parse_table(table, text) {
        Ok(map) => map,
        Err(err) => {
            tracing::error!(
                component = module_path!(),
                op = "load_rules",
                table = table,
                error = %err,
                "reference table unusable, continuing without it"
            );
            BTreeMap::new()
        }
    }
}

impl RulesData {
    /// Built-in tables, parsed on first use and shared afterwards.
    pub fn builtin() -> Arc<RulesData> {
        BUILTIN
            .get_or_init(|| Arc::new(RulesData::from_source_lenient(RulesSource::builtin())))
            .clone()
    }

    /// Parse every table, failing on the first invalid one.
    ///
    /// # Errors
    ///
    /// Returns `SheetDiffError::InvalidRulesTable` naming the table that did
    /// not parse.
    pub fn from_source(source: RulesSource<'_>) -> Result<RulesData> {
        Ok(RulesData {
            feats: parse_table("feats", source.feats)?,
            classes: parse_table("classes", source.classes)?,
            species: parse_table("species", source.species)?,
            backgrounds: parse_table("backgrounds", source.backgrounds)?,
            skills: parse_table("skills", source.skills)?,
            items: parse_table("magic_items", source.items)?,
            class_features: parse_table("class_features", source.class_features)?,
        })
    }

    /// Parse every table, replacing invalid ones with empty tables.
    pub fn from_source_lenient(source: RulesSource<'_>) -> RulesData {
        RulesData {
            feats: parse_or_empty("feats", source.feats),
            classes: parse_or_empty("classes", source.classes),
            species: parse_or_empty("species", source.species),
            backgrounds: parse_or_empty("backgrounds", source.backgrounds),
            skills: parse_or_empty("skills", source.skills),
            items: parse_or_empty("magic_items", source.items),
            class_features: parse_or_empty("class_features", source.class_features),
        }
    }

    pub fn feat(&self, name: &str) -> Option<&FeatEffects> {
        self.feats.get(&table_key(name))
    }

    pub fn class(&self, name: &str) -> Option<&ClassRules> {
        self.classes.get(&table_key(name))
    }

    pub fn species_rules(&self, name: &str) -> Option<&SpeciesRules> {
        self.species.get(&table_key(name))
    }

    pub fn background(&self, name: &str) -> Option<&BackgroundRules> {
        self.backgrounds.get(&table_key(name))
    }

    pub fn item(&self, name: &str) -> Option<&ItemRules> {
        self.items.get(&table_key(name))
    }

    pub fn class_feature(&self, name: &str) -> Option<&ClassFeatureRules> {
        self.class_features.get(&table_key(name))
    }

    /// Governing ability of a skill given by slug
    pub fn skill_ability(&self, skill: &str) -> Option<Ability> {
        self.skills.get(skill).copied()
    }

    /// Skill slugs governed by an ability, in table order
    pub fn skills_for(&self, ability: Ability) -> impl Iterator<Item = &str> {
        self.skills
            .iter()
            .filter(move |(_, a)| **a == ability)
            .map(|(s, _)| s.as_str())
    }

    /// Hit die of a class, if the class is known
    pub fn hit_die(&self, class: &str) -> Option<i64> {
        self.class(class).map(|c| c.hit_die)
    }

    /// Caster type of a class, honoring a subclass override
    pub fn caster_type(&self, class: &str, subclass: Option<&str>) -> CasterType {
        let Some(rules) = self.class(class) else {
            return CasterType::None;
        };
        subclass
            .and_then(|s| rules.subclasses.get(&table_key(s)))
            .and_then(|s| s.caster)
            .unwrap_or(rules.caster)
    }

    // Builders used by tests and embedders with custom tables.

    pub fn with_feat(mut self, name: &str, effects: FeatEffects) -> Self {
        self.feats.insert(table_key(name), effects);
        self
    }

    pub fn with_class(mut self, name: &str, rules: ClassRules) -> Self {
        self.classes.insert(table_key(name), rules);
        self
    }

    pub fn with_species(mut self, name: &str, rules: SpeciesRules) -> Self {
        self.species.insert(table_key(name), rules);
        self
    }

    pub fn with_background(mut self, name: &str, rules: BackgroundRules) -> Self {
        self.backgrounds.insert(table_key(name), rules);
        self
    }

    pub fn with_item(mut self, name: &str, rules: ItemRules) -> Self {
        self.items.insert(table_key(name), rules);
        self
    }

    pub fn with_skill(mut self, skill: &str, ability: Ability) -> Self {
        self.skills.insert(skill.to_string(), ability);
        self
    }
}
