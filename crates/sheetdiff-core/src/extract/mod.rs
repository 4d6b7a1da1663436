//! Path-tolerant extraction and normalization of character snapshots.
//!
//! `extract` gives the raw value of one logical attribute; `CharacterSheet`
//! is the typed, fully defaulted view every detector consumes.

pub mod ability;
pub mod paths;
pub mod schema;
pub mod shape;
pub mod sheet;
pub mod value;

pub use ability::{modifier, Ability};
pub use paths::{extract, locate, Attribute};
pub use schema::{SchemaAdapter, SchemaVersion};
pub use shape::{records, Record, Shape};
pub use sheet::{
    CharacterSheet, ClassEntry, ItemEntry, PassiveEntry, PersonalityValue, SaveEntry, SkillEntry,
    SpeciesEntry, SpellEntry, PASSIVE_SKILLS, PERSONALITY_LIST_KINDS, PROFICIENCY_KINDS,
};
pub use value::slug;
