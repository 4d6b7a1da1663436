//! Logical attributes and their ordered snapshot path variants.
//!
//! The attempt order of every table below is a compatibility contract with
//! older and newer source schemas: current nested layout first, then legacy
//! flat aliases. Do not reorder entries.

use serde_json::{json, Value};

use super::value::lookup;

/// Which JSON shapes a path variant accepts as a hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accept {
    /// Any non-null value
    Any,
    /// Only arrays; objects at this path belong to a different layout
    ArrayOnly,
}

/// One snapshot location to try for an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathVariant {
    pub path: &'static str,
    pub accept: Accept,
}

// Struct literals, not const fn calls, so the tables below promote to 'static.
macro_rules! any {
    ($path:literal) => {
        PathVariant {
            path: $path,
            accept: Accept::Any,
        }
    };
}

macro_rules! array_only {
    ($path:literal) => {
        PathVariant {
            path: $path,
            accept: Accept::ArrayOnly,
        }
    };
}

/// A logical attribute of a character sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Attribute {
    CharacterId,
    Name,
    Level,
    ExperiencePoints,
    Classes,
    AbilityScores,
    SavingThrows,
    Skills,
    ProficiencyBonus,
    ArmorProficiencies,
    WeaponProficiencies,
    ToolProficiencies,
    Languages,
    Feats,
    ClassFeatures,
    Spells,
    SpellcastingAbility,
    SpellSaveDc,
    SpellAttackBonus,
    SpellSlots,
    Inventory,
    Currency,
    MaxHitPoints,
    Initiative,
    Speed,
    PassiveSkills,
    Species,
    Background,
    Alignment,
    Size,
    Personality,
}

impl Attribute {
    /// Logical name used in diagnostics
    pub fn name(&self) -> &'static str {
        match self {
            Attribute::CharacterId => "character_id",
            Attribute::Name => "name",
            Attribute::Level => "level",
            Attribute::ExperiencePoints => "experience_points",
            Attribute::Classes => "classes",
            Attribute::AbilityScores => "ability_scores",
            Attribute::SavingThrows => "saving_throws",
            Attribute::Skills => "skills",
            Attribute::ProficiencyBonus => "proficiency_bonus",
            Attribute::ArmorProficiencies => "armor_proficiencies",
            Attribute::WeaponProficiencies => "weapon_proficiencies",
            Attribute::ToolProficiencies => "tool_proficiencies",
            Attribute::Languages => "languages",
            Attribute::Feats => "feats",
            Attribute::ClassFeatures => "class_features",
            Attribute::Spells => "spells",
            Attribute::SpellcastingAbility => "spellcasting_ability",
            Attribute::SpellSaveDc => "spell_save_dc",
            Attribute::SpellAttackBonus => "spell_attack_bonus",
            Attribute::SpellSlots => "spell_slots",
            Attribute::Inventory => "inventory",
            Attribute::Currency => "currency",
            Attribute::MaxHitPoints => "max_hit_points",
            Attribute::Initiative => "initiative",
            Attribute::Speed => "speed",
            Attribute::PassiveSkills => "passive_skills",
            Attribute::Species => "species",
            Attribute::Background => "background",
            Attribute::Alignment => "alignment",
            Attribute::Size => "size",
            Attribute::Personality => "personality",
        }
    }

    /// Ordered path variants: current schema first, then legacy aliases.
    pub fn paths(&self) -> &'static [PathVariant] {
        match self {
            Attribute::CharacterId => &[
                any!("character_info.character_id"),
                any!("character_info.id"),
                any!("id"),
                any!("character_id"),
            ],
            Attribute::Name => &[any!("character_info.name"), any!("name")],
            Attribute::Level => &[
                any!("character_info.level"),
                any!("level"),
                any!("basic_info.level"),
            ],
            Attribute::ExperiencePoints => &[
                any!("character_info.experience_points"),
                any!("experience_points"),
                any!("xp"),
            ],
            Attribute::Classes => &[
                any!("character_info.classes"),
                any!("classes"),
                any!("class_levels"),
            ],
            Attribute::AbilityScores => &[
                any!("abilities.ability_scores"),
                any!("ability_scores"),
                any!("stats"),
            ],
            Attribute::SavingThrows => &[
                any!("abilities.saving_throws"),
                any!("proficiencies.saving_throws"),
                any!("saving_throws"),
                any!("saves"),
            ],
            Attribute::Skills => &[any!("proficiencies.skills"), any!("skills")],
            Attribute::ProficiencyBonus => &[
                any!("proficiencies.proficiency_bonus"),
                any!("character_info.proficiency_bonus"),
                any!("proficiency_bonus"),
            ],
            Attribute::ArmorProficiencies => {
                &[any!("proficiencies.armor"), any!("armor_proficiencies")]
            }
            Attribute::WeaponProficiencies => {
                &[any!("proficiencies.weapons"), any!("weapon_proficiencies")]
            }
            Attribute::ToolProficiencies => {
                &[any!("proficiencies.tools"), any!("tool_proficiencies")]
            }
            Attribute::Languages => &[any!("proficiencies.languages"), any!("languages")],
            Attribute::Feats => &[any!("features.feats"), any!("feats")],
            Attribute::ClassFeatures => &[any!("features.class_features"), any!("class_features")],
            Attribute::Spells => &[any!("spellcasting.spells"), any!("spells"), any!("spell_list")],
            Attribute::SpellcastingAbility => &[
                any!("spellcasting.spellcasting_ability"),
                any!("spellcasting_ability"),
            ],
            Attribute::SpellSaveDc => &[any!("spellcasting.spell_save_dc"), any!("spell_save_dc")],
            Attribute::SpellAttackBonus => &[
                any!("spellcasting.spell_attack_bonus"),
                any!("spell_attack_bonus"),
            ],
            Attribute::SpellSlots => &[any!("spellcasting.spell_slots"), any!("spell_slots")],
            Attribute::Inventory => &[
                any!("equipment.inventory"),
                any!("inventory"),
                array_only!("equipment"),
            ],
            Attribute::Currency => &[any!("equipment.currency"), any!("currency")],
            Attribute::MaxHitPoints => &[
                any!("combat.hit_points.maximum"),
                any!("combat.max_hp"),
                any!("hit_points.maximum"),
                any!("max_hp"),
                any!("hp"),
            ],
            Attribute::Initiative => &[
                any!("combat.initiative_bonus"),
                any!("combat.initiative"),
                any!("initiative"),
            ],
            Attribute::Speed => &[any!("combat.speed"), any!("speed"), any!("movement")],
            Attribute::PassiveSkills => &[
                any!("combat.passive_skills"),
                any!("passive_skills"),
                any!("senses.passive"),
            ],
            Attribute::Species => &[
                any!("character_info.species"),
                any!("species"),
                any!("race"),
                any!("character_info.race"),
            ],
            Attribute::Background => &[any!("character_info.background"), any!("background")],
            Attribute::Alignment => &[any!("character_info.alignment"), any!("alignment")],
            Attribute::Size => &[any!("character_info.size"), any!("size")],
            Attribute::Personality => &[
                any!("personality"),
                any!("character_info.personality"),
                any!("traits"),
            ],
        }
    }

    /// Raw default returned by [`extract`] when no path variant hits.
    ///
    /// `null` marks attributes whose default is computed from other
    /// attributes by the typed sheet extractor (see `CharacterSheet`).
    pub fn default_value(&self) -> Value {
        match self {
            Attribute::Name => json!("Unknown"),
            Attribute::Level => json!(1),
            Attribute::ExperiencePoints => json!(0),
            Attribute::MaxHitPoints => json!(0),
            Attribute::Size => json!("Medium"),
            Attribute::Speed => json!({"walk": 30}),
            Attribute::Classes
            | Attribute::ArmorProficiencies
            | Attribute::WeaponProficiencies
            | Attribute::ToolProficiencies
            | Attribute::Languages
            | Attribute::Feats
            | Attribute::ClassFeatures
            | Attribute::Spells
            | Attribute::Inventory => json!([]),
            Attribute::AbilityScores => json!({
                "strength": 10, "dexterity": 10, "constitution": 10,
                "intelligence": 10, "wisdom": 10, "charisma": 10
            }),
            Attribute::SpellSlots | Attribute::Currency | Attribute::Personality => json!({}),
            Attribute::CharacterId
            | Attribute::SavingThrows
            | Attribute::Skills
            | Attribute::ProficiencyBonus
            | Attribute::SpellcastingAbility
            | Attribute::SpellSaveDc
            | Attribute::SpellAttackBonus
            | Attribute::Initiative
            | Attribute::PassiveSkills
            | Attribute::Species
            | Attribute::Background
            | Attribute::Alignment => Value::Null,
        }
    }
}

/// Find the first path variant that hits, returning the path and value.
pub fn locate(snapshot: &Value, attribute: Attribute) -> Option<(&'static str, &Value)> {
    attribute.paths().iter().find_map(|variant| {
        let hit = lookup(snapshot, variant.path)?;
        match variant.accept {
            Accept::Any => Some((variant.path, hit)),
            Accept::ArrayOnly if hit.is_array() => Some((variant.path, hit)),
            Accept::ArrayOnly => None,
        }
    })
}

/// Extract a logical attribute from an arbitrarily shaped snapshot.
///
/// Never fails: returns the first path-variant hit, or the attribute's
/// documented default.
pub fn extract(snapshot: &Value, attribute: Attribute) -> Value {
    locate(snapshot, attribute)
        .map(|(_, v)| v.clone())
        .unwrap_or_else(|| attribute.default_value())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_current_path_wins_over_legacy_alias() {
        let snap = json!({"character_info": {"level": 5}, "level": 3});
        assert_eq!(extract(&snap, Attribute::Level), json!(5));
    }

    #[test]
    fn test_legacy_alias_used_when_current_missing() {
        let snap = json!({"level": 3});
        assert_eq!(extract(&snap, Attribute::Level), json!(3));
        let snap = json!({"stats": {"str": 15}});
        assert_eq!(extract(&snap, Attribute::AbilityScores), json!({"str": 15}));
    }

    #[test]
    fn test_defaults_when_missing() {
        let snap = json!({});
        assert_eq!(extract(&snap, Attribute::Level), json!(1));
        assert_eq!(extract(&snap, Attribute::Feats), json!([]));
        assert_eq!(extract(&snap, Attribute::Name), json!("Unknown"));
        assert_eq!(extract(&snap, Attribute::AbilityScores)["wisdom"], json!(10));
    }

    #[test]
    fn test_non_object_snapshot_yields_default() {
        assert_eq!(extract(&json!([1, 2, 3]), Attribute::Level), json!(1));
        assert_eq!(extract(&json!("text"), Attribute::Species), Value::Null);
    }

    #[test]
    fn test_equipment_alias_only_accepts_lists() {
        let current = json!({"equipment": {"currency": {"gp": 5}}});
        assert_eq!(extract(&current, Attribute::Inventory), json!([]));
        let legacy = json!({"equipment": [{"name": "Rope"}]});
        assert_eq!(extract(&legacy, Attribute::Inventory), json!([{"name": "Rope"}]));
    }

    const ALL: [Attribute; 31] = [
        Attribute::CharacterId,
        Attribute::Name,
        Attribute::Level,
        Attribute::ExperiencePoints,
        Attribute::Classes,
        Attribute::AbilityScores,
        Attribute::SavingThrows,
        Attribute::Skills,
        Attribute::ProficiencyBonus,
        Attribute::ArmorProficiencies,
        Attribute::WeaponProficiencies,
        Attribute::ToolProficiencies,
        Attribute::Languages,
        Attribute::Feats,
        Attribute::ClassFeatures,
        Attribute::Spells,
        Attribute::SpellcastingAbility,
        Attribute::SpellSaveDc,
        Attribute::SpellAttackBonus,
        Attribute::SpellSlots,
        Attribute::Inventory,
        Attribute::Currency,
        Attribute::MaxHitPoints,
        Attribute::Initiative,
        Attribute::Speed,
        Attribute::PassiveSkills,
        Attribute::Species,
        Attribute::Background,
        Attribute::Alignment,
        Attribute::Size,
        Attribute::Personality,
    ];

    #[test]
    fn test_every_attribute_has_paths() {
        for attr in ALL {
            assert!(!attr.paths().is_empty(), "{} has no paths", attr.name());
        }
    }

    #[test]
    fn test_path_tables_outlive_the_attribute() {
        // Tables are returned from a temporary attribute value.
        let tables: Vec<&'static [PathVariant]> = ALL.iter().map(|a| a.paths()).collect();
        assert_eq!(tables.len(), ALL.len());
        assert_eq!(tables[0][0].path, "character_info.character_id");
        let inventory = Attribute::Inventory.paths();
        assert_eq!(inventory.last().map(|v| v.accept), Some(Accept::ArrayOnly));
        assert!(tables
            .iter()
            .flat_map(|t| t.iter())
            .filter(|v| v.path != "equipment")
            .all(|v| v.accept == Accept::Any));
    }
}
