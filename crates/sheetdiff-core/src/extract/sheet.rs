//! The normalized character sheet.
//!
//! Built once per snapshot and shared read-only by every detector. All
//! defaults are applied here, so detectors compare two fully populated
//! sheets and never touch raw JSON.

use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

use super::ability::{modifier, Ability};
use super::paths::{locate, Attribute};
use super::schema::{SchemaAdapter, SchemaVersion};
use super::shape::{records, Record, Shape};
use super::value::{as_bool, as_int, as_text, field, leading_number, lookup, parse_hit_die, slug};
use crate::model::Diagnostics;
use crate::rules::{proficiency_bonus_for_level, RulesData};

const EXTRACTOR: &str = "extractor";

/// Proficiency collections keyed in path form (`proficiencies.<kind>.<item>`).
pub const PROFICIENCY_KINDS: [&str; 4] = ["armor", "weapons", "tools", "languages"];

/// Skills that have a tracked passive score.
pub const PASSIVE_SKILLS: [&str; 3] = ["perception", "investigation", "insight"];

/// Personality entries held as lists; everything else is free text.
pub const PERSONALITY_LIST_KINDS: [&str; 4] = ["traits", "ideals", "bonds", "flaws"];

#[derive(Debug, Clone, PartialEq)]
pub struct ClassEntry {
    /// Slug of the class name, used in paths
    pub key: String,
    pub name: String,
    pub level: i64,
    pub subclass: Option<String>,
    pub hit_die: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkillEntry {
    pub ability: Option<Ability>,
    pub proficient: bool,
    pub expertise: bool,
    pub bonus: i64,
    /// False when the bonus was computed from ability and proficiency
    pub bonus_reported: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SaveEntry {
    pub proficient: bool,
    pub bonus: i64,
    pub bonus_reported: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpellEntry {
    pub key: String,
    pub name: String,
    pub level: Option<i64>,
    pub prepared: Option<bool>,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemEntry {
    pub key: String,
    pub segment: String,
    pub name: String,
    pub quantity: i64,
    pub equipped: bool,
    pub attuned: bool,
    pub fields: Map<String, Value>,
}

impl ItemEntry {
    /// Passive bonuses declared on the item itself, falling back to the
    /// magic item table.
    pub fn passive_bonus(&self, skill: &str, rules: &RulesData) -> i64 {
        if let Some(v) = self
            .fields
            .get("passive_bonuses")
            .and_then(|p| p.get(skill))
            .and_then(as_int)
        {
            return v;
        }
        rules
            .item(&self.name)
            .and_then(|r| r.passive_bonuses.get(skill).copied())
            .unwrap_or(0)
    }

    /// Whether the item's bonuses currently apply
    pub fn is_active(&self, rules: &RulesData) -> bool {
        let needs_attunement = rules
            .item(&self.name)
            .map(|r| r.requires_attunement)
            .unwrap_or(false);
        if needs_attunement {
            self.attuned
        } else {
            self.equipped || self.attuned
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesEntry {
    pub name: String,
    pub subrace: Option<String>,
    /// Trait slug to display name
    pub traits: BTreeMap<String, String>,
}

/// How a passive score was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct PassiveEntry {
    pub value: i64,
    pub reported: bool,
    pub skill_bonus: i64,
    pub feat_bonus: i64,
    pub equipment_bonus: i64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PersonalityValue {
    List(Vec<String>),
    Text(String),
}

/// A fully defaulted view of one snapshot.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterSheet {
    pub schema: SchemaVersion,
    pub character_id: Option<String>,
    pub name: String,
    /// Total character level
    pub level: i64,
    pub experience_points: i64,
    pub classes: Vec<ClassEntry>,
    pub ability_scores: BTreeMap<Ability, i64>,
    pub saving_throws: BTreeMap<Ability, SaveEntry>,
    /// Keyed by skill slug
    pub skills: BTreeMap<String, SkillEntry>,
    pub proficiency_bonus: i64,
    /// Kind (`armor`, `weapons`, `tools`, `languages`) to item slug to name
    pub proficiencies: BTreeMap<String, BTreeMap<String, String>>,
    pub feats: Vec<Record>,
    pub class_features: Vec<Record>,
    pub spells: Vec<SpellEntry>,
    pub spellcasting_ability: Option<Ability>,
    pub spell_save_dc: Option<i64>,
    pub spell_attack_bonus: Option<i64>,
    /// Spell level to total slots
    pub spell_slots: BTreeMap<i64, i64>,
    pub inventory: Vec<ItemEntry>,
    pub currency: BTreeMap<String, i64>,
    pub max_hit_points: i64,
    pub initiative: i64,
    /// Movement mode to feet
    pub speed: BTreeMap<String, i64>,
    pub passive_skills: BTreeMap<String, PassiveEntry>,
    pub species: Option<SpeciesEntry>,
    pub background: Option<String>,
    pub alignment: Option<String>,
    pub size: String,
    pub personality: BTreeMap<String, PersonalityValue>,
}

impl CharacterSheet {
    /// Normalize a snapshot. Total: every fallback lands in `diag`.
    pub fn extract(snapshot: &Value, rules: &RulesData, diag: &mut Diagnostics) -> CharacterSheet {
        let schema = SchemaVersion::probe(snapshot);
        let adapter = schema.adapter();
        let mut x = Extraction {
            snapshot,
            rules,
            adapter,
            diag,
        };

        let character_id = x.located(Attribute::CharacterId).and_then(|(_, v)| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        });
        let name = x.text(Attribute::Name, true).unwrap_or_else(|| "Unknown".to_string());
        let reported_level = x.int(Attribute::Level, false);
        let experience_points = x.int(Attribute::ExperiencePoints, false).unwrap_or(0);

        let (mut classes, unleveled) = x.classes();
        let level = resolve_total_level(reported_level, &mut classes, &unleveled, x.diag);
        let ability_scores = x.ability_scores();
        let proficiency_bonus = x
            .int(Attribute::ProficiencyBonus, false)
            .unwrap_or_else(|| proficiency_bonus_for_level(level));

        let saving_throws = x.saving_throws(&ability_scores, proficiency_bonus);
        let skills = x.skills(&ability_scores, proficiency_bonus);

        let mut proficiencies = BTreeMap::new();
        for (kind, attr) in PROFICIENCY_KINDS.iter().zip([
            Attribute::ArmorProficiencies,
            Attribute::WeaponProficiencies,
            Attribute::ToolProficiencies,
            Attribute::Languages,
        ]) {
            let items = x
                .records(attr)
                .into_iter()
                .map(|r| (r.segment, r.name))
                .collect();
            proficiencies.insert(kind.to_string(), items);
        }

        let feats = x.records(Attribute::Feats);
        let class_features = x.records(Attribute::ClassFeatures);
        let spells = x.spells();

        let spellcasting_ability = x.text(Attribute::SpellcastingAbility, false).and_then(|t| {
            let parsed = Ability::parse(&t);
            if parsed.is_none() {
                x.diag.record(
                    EXTRACTOR,
                    Attribute::SpellcastingAbility.name(),
                    format!("unknown ability '{t}'"),
                );
            }
            parsed
        });
        let casting_mod = spellcasting_ability.map(|a| modifier(score_of(&ability_scores, a)));
        let spell_save_dc = x
            .int(Attribute::SpellSaveDc, false)
            .or_else(|| casting_mod.map(|m| 8 + proficiency_bonus + m));
        let spell_attack_bonus = x
            .int(Attribute::SpellAttackBonus, false)
            .or_else(|| casting_mod.map(|m| proficiency_bonus + m));
        let spell_slots = x.spell_slots();

        let inventory = x.inventory();
        let currency = x.int_map(Attribute::Currency);
        let max_hit_points = x.int(Attribute::MaxHitPoints, true).unwrap_or(0);
        let initiative = x
            .int(Attribute::Initiative, false)
            .unwrap_or_else(|| modifier(score_of(&ability_scores, Ability::Dexterity)));
        let speed = x.speed();

        let species = x.species();
        let background = x.text(Attribute::Background, false);
        let alignment = x.text(Attribute::Alignment, false);
        let size = x
            .text(Attribute::Size, false)
            .or_else(|| {
                species
                    .as_ref()
                    .and_then(|s| rules.species_rules(&s.name))
                    .and_then(|r| r.size.clone())
            })
            .unwrap_or_else(|| "Medium".to_string());
        let personality = x.personality();

        let passive_skills = x.passive_skills(&skills, &feats, &inventory);

        CharacterSheet {
            schema,
            character_id,
            name,
            level,
            experience_points,
            classes,
            ability_scores,
            saving_throws,
            skills,
            proficiency_bonus,
            proficiencies,
            feats,
            class_features,
            spells,
            spellcasting_ability,
            spell_save_dc,
            spell_attack_bonus,
            spell_slots,
            inventory,
            currency,
            max_hit_points,
            initiative,
            speed,
            passive_skills,
            species,
            background,
            alignment,
            size,
            personality,
        }
    }

    pub fn score(&self, ability: Ability) -> i64 {
        score_of(&self.ability_scores, ability)
    }

    pub fn modifier(&self, ability: Ability) -> i64 {
        modifier(self.score(ability))
    }

    /// Class entry by case-insensitive name
    pub fn class(&self, name: &str) -> Option<&ClassEntry> {
        let key = slug(name);
        self.classes.iter().find(|c| c.key == key)
    }

    /// Level in a class, 0 when absent
    pub fn class_level(&self, name: &str) -> i64 {
        self.class(name).map(|c| c.level).unwrap_or(0)
    }

    pub fn has_feat(&self, name: &str) -> bool {
        let key = slug(name);
        self.feats.iter().any(|f| f.slug() == key)
    }

    pub fn has_proficiency(&self, kind: &str, item_slug: &str) -> bool {
        match kind {
            "skills" => self.skills.get(item_slug).is_some_and(|s| s.proficient),
            "saving_throws" => Ability::parse(item_slug)
                .and_then(|a| self.saving_throws.get(&a))
                .is_some_and(|s| s.proficient),
            other => self
                .proficiencies
                .get(other)
                .is_some_and(|items| items.contains_key(item_slug)),
        }
    }
}

fn score_of(scores: &BTreeMap<Ability, i64>, ability: Ability) -> i64 {
    scores.get(&ability).copied().unwrap_or(10)
}

/// Reported total level wins; otherwise the sum of class levels, else 1.
/// Classes without a level take the total when they are the only class.
/// An explicit level 0 is kept: the class is listed but not yet taken.
fn resolve_total_level(
    reported: Option<i64>,
    classes: &mut [ClassEntry],
    unleveled: &BTreeSet<String>,
    diag: &mut Diagnostics,
) -> i64 {
    let known: i64 = classes.iter().filter(|c| c.level > 0).map(|c| c.level).sum();
    let total = reported
        .filter(|l| *l > 0)
        .unwrap_or(if known > 0 { known } else { 1 });
    if unleveled.len() == 1 && classes.len() == 1 {
        classes[0].level = total;
    } else if !unleveled.is_empty() {
        for c in classes.iter_mut().filter(|c| unleveled.contains(&c.key)) {
            diag.record(
                EXTRACTOR,
                format!("classes.{}.level", c.key),
                "class level missing, assuming 1",
            );
            c.level = 1;
        }
    }
    total
}

/// Extraction state for one snapshot.
struct Extraction<'a, 'd> {
    snapshot: &'a Value,
    rules: &'a RulesData,
    adapter: &'static dyn SchemaAdapter,
    diag: &'d mut Diagnostics,
}

impl<'a> Extraction<'a, '_> {
    fn located(&mut self, attr: Attribute) -> Option<(&'static str, &'a Value)> {
        locate(self.snapshot, attr)
    }

    /// Located value, recording a diagnostic when a core attribute is missing
    fn hit(&mut self, attr: Attribute, core: bool) -> Option<(&'static str, &'a Value)> {
        let hit = self.located(attr);
        if hit.is_none() && core {
            self.diag
                .record(EXTRACTOR, attr.name(), "missing, using default");
        }
        hit
    }

    fn int(&mut self, attr: Attribute, core: bool) -> Option<i64> {
        let (path, value) = self.hit(attr, core)?;
        let parsed = as_int(value);
        if parsed.is_none() {
            self.diag
                .record(EXTRACTOR, path, format!("not numeric: {}", type_name(value)));
        }
        parsed
    }

    fn text(&mut self, attr: Attribute, core: bool) -> Option<String> {
        let (path, value) = self.hit(attr, core)?;
        let parsed = as_text(value);
        if parsed.is_none() {
            self.diag
                .record(EXTRACTOR, path, format!("not text: {}", type_name(value)));
        }
        parsed
    }

    fn records(&mut self, attr: Attribute) -> Vec<Record> {
        let Some((path, value)) = self.located(attr) else {
            return Vec::new();
        };
        if Shape::probe(value) == Shape::Empty && !is_empty_container(value) {
            self.diag.record(
                EXTRACTOR,
                path,
                format!("unsupported collection shape: {}", type_name(value)),
            );
        }
        let (out, skipped) = records(value);
        if skipped > 0 {
            self.diag
                .record(EXTRACTOR, path, format!("skipped {skipped} unnamed entries"));
        }
        out
    }

    fn int_map(&mut self, attr: Attribute) -> BTreeMap<String, i64> {
        let mut out = BTreeMap::new();
        let Some((path, value)) = self.located(attr) else {
            return out;
        };
        let Some(map) = value.as_object() else {
            self.diag
                .record(EXTRACTOR, path, format!("expected object, got {}", type_name(value)));
            return out;
        };
        for (k, v) in map {
            match as_int(v) {
                Some(n) => {
                    out.insert(k.trim().to_lowercase(), n);
                }
                None if v.is_null() => {}
                None => self
                    .diag
                    .record(EXTRACTOR, format!("{path}.{k}"), "not numeric, ignored"),
            }
        }
        out
    }

    /// Class entries plus the keys of those that carried no level at all.
    fn classes(&mut self) -> (Vec<ClassEntry>, BTreeSet<String>) {
        let mut out: Vec<ClassEntry> = Vec::new();
        let mut unleveled = BTreeSet::new();
        for record in self.records(Attribute::Classes) {
            let (name, embedded_level) = self.adapter.split_class_label(&record.name);
            let level = field(&record.fields, &["level", "levels", "class_level", "value"])
                .and_then(as_int)
                .or(embedded_level);
            let subclass = field(
                &record.fields,
                &["subclass", "subclass_name", "archetype", "subclass_label"],
            )
            .and_then(as_text);
            let hit_die = field(&record.fields, &["hit_die", "hit_dice", "hitDie"])
                .and_then(parse_hit_die)
                .or_else(|| self.rules.hit_die(&name));
            let key = slug(&name);
            if key.is_empty() || out.iter().any(|c| c.key == key) {
                continue;
            }
            if level.is_none() {
                unleveled.insert(key.clone());
            }
            out.push(ClassEntry {
                key,
                name,
                level: level.unwrap_or(0),
                subclass,
                hit_die,
            });
        }
        (out, unleveled)
    }

    fn ability_scores(&mut self) -> BTreeMap<Ability, i64> {
        let mut scores: BTreeMap<Ability, i64> = BTreeMap::new();
        if let Some((path, value)) = self.hit(Attribute::AbilityScores, true) {
            match value {
                Value::Object(map) => {
                    for ability in Ability::ALL {
                        let Some(raw) = self.ability_entry(map, ability) else {
                            continue;
                        };
                        match as_int(raw) {
                            Some(s) => {
                                scores.insert(ability, s);
                            }
                            None => self.diag.record(
                                EXTRACTOR,
                                format!("{path}.{}", ability.name()),
                                "not numeric, using 10",
                            ),
                        }
                    }
                }
                Value::Array(_) => {
                    let (recs, _) = records(value);
                    for r in recs {
                        let Some(ability) = Ability::parse(&r.name) else {
                            continue;
                        };
                        if let Some(s) = field(&r.fields, &["score", "value", "total"]).and_then(as_int)
                        {
                            scores.insert(ability, s);
                        }
                    }
                }
                other => self.diag.record(
                    EXTRACTOR,
                    path,
                    format!("expected object or list, got {}", type_name(other)),
                ),
            }
        }
        for ability in Ability::ALL {
            scores.entry(ability).or_insert(10);
        }
        scores
    }

    /// Value for an ability inside an ability-keyed object, trying the
    /// adapter's key order case-insensitively.
    fn ability_entry<'v>(&self, map: &'v Map<String, Value>, ability: Ability) -> Option<&'v Value> {
        self.adapter.ability_keys(ability).iter().find_map(|key| {
            map.iter()
                .find(|(k, v)| k.eq_ignore_ascii_case(key) && !v.is_null())
                .map(|(_, v)| v)
        })
    }

    fn saving_throws(
        &mut self,
        scores: &BTreeMap<Ability, i64>,
        pb: i64,
    ) -> BTreeMap<Ability, SaveEntry> {
        let mut reported: BTreeMap<Ability, (bool, Option<i64>)> = BTreeMap::new();
        if let Some((_, value)) = self.located(Attribute::SavingThrows) {
            match value {
                Value::Object(map) => {
                    for ability in Ability::ALL {
                        if let Some(entry) = self.ability_entry(map, ability) {
                            reported.insert(ability, proficiency_and_bonus(entry));
                        }
                    }
                }
                _ => {
                    let implicit = matches!(Shape::probe(value), Shape::NameList | Shape::Scalar);
                    for r in self.records(Attribute::SavingThrows) {
                        let Some(ability) = Ability::parse(&r.name) else {
                            continue;
                        };
                        let (prof, bonus) = proficiency_and_bonus(&r.to_value());
                        reported.insert(ability, (prof || implicit, bonus));
                    }
                }
            }
        }
        Ability::ALL
            .into_iter()
            .map(|ability| {
                let (proficient, bonus) = reported.get(&ability).copied().unwrap_or((false, None));
                let computed =
                    modifier(score_of(scores, ability)) + if proficient { pb } else { 0 };
                (
                    ability,
                    SaveEntry {
                        proficient,
                        bonus: bonus.unwrap_or(computed),
                        bonus_reported: bonus.is_some(),
                    },
                )
            })
            .collect()
    }

    fn skills(&mut self, scores: &BTreeMap<Ability, i64>, pb: i64) -> BTreeMap<String, SkillEntry> {
        let implicit = self
            .located(Attribute::Skills)
            .map(|(_, v)| matches!(Shape::probe(v), Shape::NameList | Shape::Scalar))
            .unwrap_or(false);
        let mut out: BTreeMap<String, SkillEntry> = BTreeMap::new();
        for r in self.records(Attribute::Skills) {
            let skill = r.slug();
            let (mut proficient, bonus) = proficiency_and_bonus(&r.to_value());
            proficient |= implicit;
            let expertise = r.get("expertise").and_then(as_bool).unwrap_or(false)
                || r.get("proficiency").is_some_and(is_expertise_label)
                || r.get("value").is_some_and(is_expertise_label);
            let ability = r
                .get("ability")
                .and_then(as_text)
                .and_then(|a| Ability::parse(&a))
                .or_else(|| self.rules.skill_ability(&skill));
            out.insert(
                skill,
                SkillEntry {
                    ability,
                    proficient: proficient || expertise,
                    expertise,
                    bonus: bonus.unwrap_or(0),
                    bonus_reported: bonus.is_some(),
                },
            );
        }
        for (skill, ability) in &self.rules.skills {
            out.entry(skill.clone()).or_insert(SkillEntry {
                ability: Some(*ability),
                proficient: false,
                expertise: false,
                bonus: 0,
                bonus_reported: false,
            });
        }
        for entry in out.values_mut().filter(|e| !e.bonus_reported) {
            let ability_mod = entry.ability.map(|a| modifier(score_of(scores, a))).unwrap_or(0);
            let multiplier = if entry.expertise {
                2
            } else if entry.proficient {
                1
            } else {
                0
            };
            entry.bonus = ability_mod + pb * multiplier;
        }
        out
    }

    fn spells(&mut self) -> Vec<SpellEntry> {
        let mut out: Vec<SpellEntry> = Vec::new();
        let Some((_, value)) = self.located(Attribute::Spells) else {
            return out;
        };
        // `{"cantrips": [...], "1": [...]}` groups spells by level
        let grouped = value
            .as_object()
            .filter(|m| !m.is_empty() && m.values().all(Value::is_array));
        let mut push = |r: Record, level: Option<i64>| {
            let key = r.slug();
            if out.iter().any(|s| s.key == key) {
                return;
            }
            let level = field(&r.fields, &["level", "spell_level"])
                .and_then(as_int)
                .or(level);
            let prepared = field(&r.fields, &["prepared", "is_prepared"]).and_then(as_bool);
            out.push(SpellEntry {
                key,
                name: r.name.clone(),
                level,
                prepared,
                value: r.to_value(),
            });
        };
        match grouped {
            Some(groups) => {
                for (group, list) in groups {
                    let level = if group.to_lowercase().starts_with("cantrip") {
                        Some(0)
                    } else {
                        leading_number(group)
                    };
                    for r in records(list).0 {
                        push(r, level);
                    }
                }
            }
            None => {
                for r in self.records(Attribute::Spells) {
                    push(r, None);
                }
            }
        }
        out
    }

    fn spell_slots(&mut self) -> BTreeMap<i64, i64> {
        let mut out = BTreeMap::new();
        let Some((path, value)) = self.located(Attribute::SpellSlots) else {
            return out;
        };
        let total_of = |v: &Value| match v {
            Value::Object(m) => field(m, &["total", "max", "slots", "maximum", "value"]).and_then(as_int),
            other => as_int(other),
        };
        match value {
            Value::Object(map) => {
                for (k, v) in map {
                    match (leading_number(k), total_of(v)) {
                        (Some(level), Some(total)) => {
                            out.insert(level, total);
                        }
                        _ => self
                            .diag
                            .record(EXTRACTOR, format!("{path}.{k}"), "unreadable slot entry"),
                    }
                }
            }
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    let level = item.get("level").and_then(as_int).unwrap_or(i as i64 + 1);
                    if let Some(total) = total_of(item) {
                        out.insert(level, total);
                    }
                }
            }
            other => self.diag.record(
                EXTRACTOR,
                path,
                format!("expected object or list, got {}", type_name(other)),
            ),
        }
        out
    }

    fn inventory(&mut self) -> Vec<ItemEntry> {
        self.records(Attribute::Inventory)
            .into_iter()
            .map(|r| ItemEntry {
                quantity: field(&r.fields, &["quantity", "qty", "count"])
                    .and_then(as_int)
                    .unwrap_or(1),
                equipped: field(&r.fields, &["equipped", "is_equipped"])
                    .and_then(as_bool)
                    .unwrap_or(false),
                attuned: field(&r.fields, &["attuned", "is_attuned", "attunement"])
                    .and_then(as_bool)
                    .unwrap_or(false),
                key: r.key,
                segment: r.segment,
                name: r.name,
                fields: r.fields,
            })
            .collect()
    }

    fn speed(&mut self) -> BTreeMap<String, i64> {
        let mut out = BTreeMap::new();
        match self.located(Attribute::Speed) {
            None => {
                out.insert("walk".to_string(), 30);
            }
            Some((path, value)) => match value {
                Value::Object(map) => {
                    for (mode, v) in map {
                        let feet = as_int(v).or_else(|| v.as_str().and_then(leading_number));
                        match feet {
                            Some(f) => {
                                let mode = mode.trim().to_lowercase();
                                let mode = mode.strip_suffix("_speed").unwrap_or(&mode).to_string();
                                out.insert(mode, f);
                            }
                            None => self.diag.record(
                                EXTRACTOR,
                                format!("{path}.{mode}"),
                                "not numeric, ignored",
                            ),
                        }
                    }
                }
                Value::String(s) => match leading_number(s) {
                    Some(f) => {
                        out.insert("walk".to_string(), f);
                    }
                    None => {
                        self.diag.record(EXTRACTOR, path, "not numeric, using walk 30");
                        out.insert("walk".to_string(), 30);
                    }
                },
                other => {
                    let walk = as_int(other).unwrap_or_else(|| {
                        self.diag.record(EXTRACTOR, path, "not numeric, using walk 30");
                        30
                    });
                    out.insert("walk".to_string(), walk);
                }
            },
        }
        out
    }

    fn passive_skills(
        &mut self,
        skills: &BTreeMap<String, SkillEntry>,
        feats: &[Record],
        inventory: &[ItemEntry],
    ) -> BTreeMap<String, PassiveEntry> {
        let mut reported: BTreeMap<String, i64> = BTreeMap::new();
        if let Some((path, Value::Object(map))) = self.located(Attribute::PassiveSkills) {
            for (k, v) in map {
                let key = k.trim().to_lowercase();
                let key = key.strip_prefix("passive_").unwrap_or(&key).to_string();
                match as_int(v) {
                    Some(n) => {
                        reported.insert(key, n);
                    }
                    None => self
                        .diag
                        .record(EXTRACTOR, format!("{path}.{k}"), "not numeric, computing"),
                }
            }
        }
        let rules = self.rules;
        PASSIVE_SKILLS
            .iter()
            .map(|skill| {
                let skill_bonus = skills.get(*skill).map(|s| s.bonus).unwrap_or(0);
                let feat_bonus: i64 = feats
                    .iter()
                    .filter_map(|f| rules.feat(&f.name))
                    .filter_map(|e| e.passive_bonuses.get(*skill))
                    .sum();
                let equipment_bonus: i64 = inventory
                    .iter()
                    .filter(|i| i.is_active(rules))
                    .map(|i| i.passive_bonus(skill, rules))
                    .sum();
                let entry = match reported.get(*skill) {
                    Some(v) => PassiveEntry {
                        value: *v,
                        reported: true,
                        skill_bonus,
                        feat_bonus,
                        equipment_bonus,
                    },
                    None => PassiveEntry {
                        value: 10 + skill_bonus + feat_bonus + equipment_bonus,
                        reported: false,
                        skill_bonus,
                        feat_bonus,
                        equipment_bonus,
                    },
                };
                (skill.to_string(), entry)
            })
            .collect()
    }

    fn species(&mut self) -> Option<SpeciesEntry> {
        let (path, value) = self.located(Attribute::Species)?;
        let Some(name) = as_text(value) else {
            self.diag
                .record(EXTRACTOR, path, format!("not text: {}", type_name(value)));
            return None;
        };
        let mut subrace = None;
        let mut traits = BTreeMap::new();
        if let Value::Object(map) = value {
            subrace = field(map, &["subrace", "subspecies", "lineage"]).and_then(as_text);
            if let Some(t) = map.get("traits") {
                traits = records(t).0.into_iter().map(|r| (r.segment, r.name)).collect();
            }
        }
        if subrace.is_none() {
            subrace = ["character_info.subrace", "subrace"]
                .iter()
                .find_map(|p| lookup(self.snapshot, p))
                .and_then(as_text);
        }
        Some(SpeciesEntry {
            name,
            subrace,
            traits,
        })
    }

    fn personality(&mut self) -> BTreeMap<String, PersonalityValue> {
        let mut out = BTreeMap::new();
        let Some((path, value)) = self.located(Attribute::Personality) else {
            return out;
        };
        let entries: Vec<(String, &Value)> = match value {
            Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v)).collect(),
            Value::Array(_) => vec![("traits".to_string(), value)],
            other => {
                self.diag.record(
                    EXTRACTOR,
                    path,
                    format!("expected object, got {}", type_name(other)),
                );
                return out;
            }
        };
        for (kind, v) in entries {
            let kind = match kind.trim().to_lowercase().as_str() {
                "personality_traits" | "personality" => "traits".to_string(),
                other => other.to_string(),
            };
            let parsed = match v {
                Value::Array(items) => Some(PersonalityValue::List(
                    items.iter().filter_map(as_text).collect(),
                )),
                Value::String(s) if s.trim().is_empty() => None,
                Value::String(s) => Some(PersonalityValue::Text(s.trim().to_string())),
                Value::Null => None,
                _ => {
                    self.diag
                        .record(EXTRACTOR, format!("{path}.{kind}"), "unsupported value, ignored");
                    None
                }
            };
            if let Some(p) = parsed {
                out.insert(kind, p);
            }
        }
        out
    }
}

/// Read `(proficient, reported bonus)` from a skill or save entry given as a
/// bool, a number, or an object.
fn proficiency_and_bonus(entry: &Value) -> (bool, Option<i64>) {
    match entry {
        Value::Bool(b) => (*b, None),
        Value::Number(_) => (false, as_int(entry)),
        Value::String(s) if is_proficiency_label(s) => (true, None),
        Value::String(_) => match as_bool(entry) {
            Some(b) => (b, None),
            None => (false, as_int(entry)),
        },
        Value::Object(map) => {
            let proficient = field(map, &["proficient", "proficiency", "is_proficient"])
                .map(|p| match p {
                    Value::String(s) if is_proficiency_label(s) => true,
                    other => as_bool(other).unwrap_or(false),
                })
                .unwrap_or(false);
            let bonus = field(map, &["bonus", "modifier", "total", "value"])
                .filter(|v| !v.is_boolean())
                .and_then(as_int);
            let proficient = proficient
                || match map.get("value") {
                    Some(Value::Bool(b)) => *b,
                    Some(Value::String(s)) => is_proficiency_label(s),
                    _ => false,
                };
            (proficient, bonus)
        }
        _ => (false, None),
    }
}

fn is_proficiency_label(s: &str) -> bool {
    let s = s.trim();
    s.eq_ignore_ascii_case("proficient") || s.eq_ignore_ascii_case("expertise")
}

fn is_expertise_label(value: &Value) -> bool {
    value
        .as_str()
        .is_some_and(|s| s.trim().eq_ignore_ascii_case("expertise"))
}

fn is_empty_container(value: &Value) -> bool {
    match value {
        Value::Array(a) => a.is_empty(),
        Value::Object(m) => m.is_empty(),
        Value::String(s) => s.trim().is_empty(),
        Value::Null => true,
        _ => false,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sheet(snapshot: Value) -> (CharacterSheet, Diagnostics) {
        let mut diag = Diagnostics::new();
        let sheet = CharacterSheet::extract(&snapshot, &RulesData::builtin(), &mut diag);
        (sheet, diag)
    }

    #[test]
    fn test_current_schema_sheet() {
        let (s, _) = sheet(json!({
            "character_info": {
                "name": "Brakka",
                "level": 5,
                "classes": [{"name": "Fighter", "level": 5, "subclass": "Champion"}],
                "species": {"name": "Hill Dwarf", "traits": ["Darkvision"]}
            },
            "abilities": {"ability_scores": {"strength": 16, "dexterity": 12, "constitution": {"score": 15}}},
            "combat": {"hit_points": {"maximum": 44}}
        }));
        assert_eq!(s.schema, SchemaVersion::Current);
        assert_eq!(s.name, "Brakka");
        assert_eq!(s.level, 5);
        assert_eq!(s.proficiency_bonus, 3);
        assert_eq!(s.score(Ability::Strength), 16);
        assert_eq!(s.score(Ability::Constitution), 15);
        assert_eq!(s.score(Ability::Wisdom), 10);
        assert_eq!(s.classes[0].hit_die, Some(10));
        assert_eq!(s.classes[0].subclass.as_deref(), Some("Champion"));
        assert_eq!(s.max_hit_points, 44);
        assert_eq!(s.initiative, 1);
        assert_eq!(s.size, "Medium");
        assert!(s.species.as_ref().unwrap().traits.contains_key("darkvision"));
    }

    #[test]
    fn test_legacy_schema_sheet() {
        let (s, _) = sheet(json!({
            "name": "Old Timer",
            "classes": ["Fighter 3", "Wizard 2"],
            "stats": {"str": 14, "strength": 8, "DEX": 13},
            "hp": 31,
            "race": "Halfling"
        }));
        assert_eq!(s.schema, SchemaVersion::Legacy);
        assert_eq!(s.level, 5);
        assert_eq!(s.class_level("fighter"), 3);
        assert_eq!(s.class_level("Wizard"), 2);
        // legacy adapter prefers abbreviations
        assert_eq!(s.score(Ability::Strength), 14);
        assert_eq!(s.score(Ability::Dexterity), 13);
        assert_eq!(s.max_hit_points, 31);
        assert_eq!(s.size, "Small");
    }

    #[test]
    fn test_defaults_for_empty_snapshot() {
        let (s, diag) = sheet(json!({}));
        assert_eq!(s.name, "Unknown");
        assert_eq!(s.level, 1);
        assert_eq!(s.proficiency_bonus, 2);
        assert_eq!(s.speed.get("walk"), Some(&30));
        assert!(s.feats.is_empty());
        assert!(s.ability_scores.values().all(|v| *v == 10));
        assert!(diag.iter().any(|d| d.field_path == "name"));
        assert!(diag.iter().all(|d| d.detector == "extractor"));
    }

    #[test]
    fn test_explicit_zero_class_level_is_kept() {
        let (s, diag) = sheet(json!({
            "character_info": {"classes": [
                {"name": "Fighter", "level": 4},
                {"name": "Wizard", "level": 0},
                {"name": "Rogue"}
            ]}
        }));
        assert_eq!(s.class_level("wizard"), 0);
        assert_eq!(s.class_level("rogue"), 1);
        assert!(diag.iter().any(|d| d.field_path == "classes.rogue.level"));
        assert!(!diag.iter().any(|d| d.field_path == "classes.wizard.level"));
    }

    #[test]
    fn test_level_defaults_to_sum_of_class_levels() {
        let (s, _) = sheet(json!({"classes": {"Rogue": 4, "Cleric": 1}}));
        assert_eq!(s.level, 5);
    }

    #[test]
    fn test_malformed_values_fall_back_with_diagnostics() {
        let (s, diag) = sheet(json!({
            "character_info": {"level": "lots"},
            "abilities": {"ability_scores": {"strength": "strong"}},
            "combat": {"max_hp": [1, 2]}
        }));
        assert_eq!(s.level, 1);
        assert_eq!(s.score(Ability::Strength), 10);
        assert_eq!(s.max_hit_points, 0);
        let paths: Vec<&str> = diag.iter().map(|d| d.field_path.as_str()).collect();
        assert!(paths.contains(&"character_info.level"));
        assert!(paths.contains(&"abilities.ability_scores.strength"));
        assert!(paths.contains(&"combat.max_hp"));
    }

    #[test]
    fn test_skills_computed_from_ability_and_proficiency() {
        let (s, _) = sheet(json!({
            "character_info": {"level": 5},
            "abilities": {"ability_scores": {"wisdom": 14, "dexterity": 16}},
            "proficiencies": {"skills": {
                "perception": {"proficient": true},
                "stealth": {"proficient": true, "expertise": true},
                "insight": {"bonus": 7}
            }}
        }));
        assert_eq!(s.skills["perception"].bonus, 5);
        assert_eq!(s.skills["stealth"].bonus, 9);
        assert_eq!(s.skills["insight"].bonus, 7);
        assert!(s.skills["insight"].bonus_reported);
        assert_eq!(s.skills["athletics"].bonus, 0);
        assert_eq!(s.skills.len(), 18);
    }

    #[test]
    fn test_skill_name_list_means_proficient() {
        let (s, _) = sheet(json!({"skills": ["Perception", "Sleight of Hand"]}));
        assert!(s.skills["perception"].proficient);
        assert!(s.skills["sleight_of_hand"].proficient);
        assert!(!s.skills["arcana"].proficient);
    }

    #[test]
    fn test_saving_throw_shapes() {
        let (s, _) = sheet(json!({
            "character_info": {"level": 1},
            "abilities": {
                "ability_scores": {"constitution": 14},
                "saving_throws": {"constitution": {"proficient": true}, "wisdom": 3}
            }
        }));
        assert!(s.saving_throws[&Ability::Constitution].proficient);
        assert_eq!(s.saving_throws[&Ability::Constitution].bonus, 4);
        assert_eq!(s.saving_throws[&Ability::Wisdom].bonus, 3);
        let (s, _) = sheet(json!({"saves": ["STR", "con"]}));
        assert!(s.saving_throws[&Ability::Strength].proficient);
        assert!(s.saving_throws[&Ability::Constitution].proficient);
    }

    #[test]
    fn test_spell_shapes() {
        let (s, _) = sheet(json!({
            "spellcasting": {
                "spells": {"cantrips": ["Fire Bolt"], "1": [{"name": "Shield", "prepared": true}]},
                "spell_slots": {"level_1": {"total": 4, "used": 2}, "2": 2},
                "spellcasting_ability": "INT"
            },
            "abilities": {"ability_scores": {"intelligence": 16}}
        }));
        assert_eq!(s.spells.len(), 2);
        let shield = s.spells.iter().find(|sp| sp.key == "shield").unwrap();
        assert_eq!(shield.level, Some(1));
        assert_eq!(shield.prepared, Some(true));
        assert_eq!(s.spell_slots.get(&1), Some(&4));
        assert_eq!(s.spell_slots.get(&2), Some(&2));
        assert_eq!(s.spellcasting_ability, Some(Ability::Intelligence));
        assert_eq!(s.spell_save_dc, Some(13));
        assert_eq!(s.spell_attack_bonus, Some(5));
    }

    #[test]
    fn test_passive_formula() {
        let (s, _) = sheet(json!({
            "character_info": {"level": 1},
            "abilities": {"ability_scores": {"wisdom": 14, "intelligence": 12}},
            "proficiencies": {"skills": {"perception": {"proficient": true}}},
            "features": {"feats": [{"name": "Observant"}]},
            "equipment": {"inventory": [{"name": "Eyes of the Eagle", "attuned": true}]},
            "combat": {"passive_skills": {"passive_insight": 18}}
        }));
        // 10 + (2 wis + 2 pb) + 5 observant + 5 eyes
        assert_eq!(s.passive_skills["perception"].value, 24);
        assert!(!s.passive_skills["perception"].reported);
        // 10 + 1 int + 5 observant
        assert_eq!(s.passive_skills["investigation"].value, 16);
        assert_eq!(s.passive_skills["insight"].value, 18);
        assert!(s.passive_skills["insight"].reported);
    }

    #[test]
    fn test_speed_shapes() {
        let (s, _) = sheet(json!({"speed": "25 ft."}));
        assert_eq!(s.speed.get("walk"), Some(&25));
        let (s, _) = sheet(json!({"combat": {"speed": {"walk": 30, "fly_speed": 60}}}));
        assert_eq!(s.speed.get("fly"), Some(&60));
    }

    #[test]
    fn test_personality_kinds() {
        let (s, _) = sheet(json!({"personality": {
            "personality_traits": ["Brave", "Loud"],
            "ideals": "Freedom",
            "backstory": ""
        }}));
        assert_eq!(
            s.personality.get("traits"),
            Some(&PersonalityValue::List(vec!["Brave".into(), "Loud".into()]))
        );
        assert_eq!(
            s.personality.get("ideals"),
            Some(&PersonalityValue::Text("Freedom".into()))
        );
        assert!(!s.personality.contains_key("backstory"));
    }

    #[test]
    fn test_inventory_defaults() {
        let (s, _) = sheet(json!({"inventory": [{"name": "Rope"}, {"name": "Shield", "equipped": true, "quantity": "2"}]}));
        assert_eq!(s.inventory[0].quantity, 1);
        assert!(!s.inventory[0].equipped);
        assert!(s.inventory[1].equipped);
        assert_eq!(s.inventory[1].quantity, 2);
    }
}
