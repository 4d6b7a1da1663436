//! Schema-version probe and the adapters it selects.
//!
//! The probe runs once per snapshot. The chosen adapter decides how
//! ambiguous keys are resolved for that snapshot, so call sites never
//! re-sniff the layout.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ability::Ability;
use super::value::{as_int, lookup};

/// Layout generation of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaVersion {
    /// Sectioned layout (`character_info`, `abilities`, `combat`, ...)
    Current,
    /// Flat layout with abbreviated stats and class labels like `"Fighter 3"`
    Legacy,
}

impl SchemaVersion {
    /// Probe a snapshot's layout.
    ///
    /// `Current` when `schema_version >= 2` or when any of the sectioned
    /// objects `character_info`, `abilities`, `combat` is present.
    pub fn probe(snapshot: &Value) -> SchemaVersion {
        if lookup(snapshot, "schema_version")
            .and_then(as_int)
            .is_some_and(|v| v >= 2)
        {
            return SchemaVersion::Current;
        }
        let sectioned = ["character_info", "abilities", "combat"]
            .iter()
            .any(|k| lookup(snapshot, k).is_some_and(Value::is_object));
        if sectioned {
            SchemaVersion::Current
        } else {
            SchemaVersion::Legacy
        }
    }

    pub fn adapter(&self) -> &'static dyn SchemaAdapter {
        match self {
            SchemaVersion::Current => &CurrentSchema,
            SchemaVersion::Legacy => &LegacySchema,
        }
    }
}

/// Layout-specific key resolution.
pub trait SchemaAdapter: Send + Sync {
    /// Keys to try for an ability inside an ability-keyed map, in order
    fn ability_keys(&self, ability: Ability) -> [&'static str; 2];

    /// Split a class label into a class name and an embedded level, if any
    fn split_class_label(&self, label: &str) -> (String, Option<i64>);
}

pub struct CurrentSchema;

impl SchemaAdapter for CurrentSchema {
    fn ability_keys(&self, ability: Ability) -> [&'static str; 2] {
        [ability.name(), ability.abbreviation()]
    }

    fn split_class_label(&self, label: &str) -> (String, Option<i64>) {
        (label.trim().to_string(), None)
    }
}

pub struct LegacySchema;

impl SchemaAdapter for LegacySchema {
    fn ability_keys(&self, ability: Ability) -> [&'static str; 2] {
        [ability.abbreviation(), ability.name()]
    }

    fn split_class_label(&self, label: &str) -> (String, Option<i64>) {
        let trimmed = label.trim();
        match trimmed.rsplit_once(' ') {
            Some((name, level)) => match level.parse::<i64>() {
                Ok(l) => (name.trim().to_string(), Some(l)),
                Err(_) => (trimmed.to_string(), None),
            },
            None => (trimmed.to_string(), None),
        }
    }
}
