//! Collection-shape adapters.
//!
//! Source snapshots have stored the same collection as a list of objects, an
//! object of objects, a plain list of names, or a single scalar. The shape is
//! probed once per collection and one adapter turns it into [`Record`]s, so
//! nothing downstream branches on JSON types again.

use serde_json::{Map, Value};
use std::collections::HashMap;

use super::value::{as_text, slug};

/// Shape of a collection-valued attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    /// `[{"name": "Alert", ...}, ...]`
    RecordList,
    /// `{"Alert": {...}}` or `{"Fighter": 5}`
    RecordMap,
    /// `["Alert", "Lucky"]`
    NameList,
    /// `"Alert"`, or a comma separated `"Common, Elvish"`
    Scalar,
    /// null, booleans, empty containers
    Empty,
}

impl Shape {
    pub fn probe(value: &Value) -> Shape {
        match value {
            Value::Array(items) if items.is_empty() => Shape::Empty,
            Value::Array(items) if items.iter().all(Value::is_object) => Shape::RecordList,
            Value::Array(_) => Shape::NameList,
            Value::Object(map) if map.is_empty() => Shape::Empty,
            Value::Object(_) => Shape::RecordMap,
            Value::String(s) if s.trim().is_empty() => Shape::Empty,
            Value::String(_) | Value::Number(_) => Shape::Scalar,
            _ => Shape::Empty,
        }
    }
}

/// One normalized entry of a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Stable identity: the `id` field when present, else the slug of the name
    pub key: String,
    pub name: String,
    /// Path segment: the name slug, suffixed when two records share a slug
    pub segment: String,
    pub fields: Map<String, Value>,
}

impl Record {
    fn from_fields(fallback_name: Option<&str>, fields: Map<String, Value>) -> Option<Record> {
        let name = as_text(&Value::Object(fields.clone()))
            .or_else(|| fallback_name.map(str::to_string))?;
        let key = fields
            .get("id")
            .and_then(|id| match id {
                Value::String(s) if !s.is_empty() => Some(format!("id:{s}")),
                Value::Number(n) => Some(format!("id:{n}")),
                _ => None,
            })
            .unwrap_or_else(|| slug(&name));
        if key.is_empty() {
            return None;
        }
        let segment = slug(&name);
        Some(Record {
            key,
            name,
            segment,
            fields,
        })
    }

    fn named(name: &str) -> Option<Record> {
        let mut fields = Map::new();
        fields.insert("name".to_string(), Value::String(name.to_string()));
        Record::from_fields(None, fields)
    }

    /// Slug of the display name
    pub fn slug(&self) -> String {
        slug(&self.name)
    }

    /// The `id` field, when the identity is id-based
    pub fn id(&self) -> Option<&str> {
        self.key.strip_prefix("id:")
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key).filter(|v| !v.is_null())
    }

    /// The record as a JSON object (used as change values)
    pub fn to_value(&self) -> Value {
        Value::Object(self.fields.clone())
    }
}

/// Adapt any collection shape into records. Entries that cannot be named
/// are skipped and counted in the returned tally.
pub fn records(value: &Value) -> (Vec<Record>, usize) {
    let mut skipped = 0;
    let mut out = Vec::new();
    match (Shape::probe(value), value) {
        (Shape::RecordList, Value::Array(items)) => {
            for item in items {
                match item
                    .as_object()
                    .and_then(|m| Record::from_fields(None, m.clone()))
                {
                    Some(r) => out.push(r),
                    None => skipped += 1,
                }
            }
        }
        (Shape::RecordMap, Value::Object(map)) => {
            for (key, entry) in map {
                let fields = match entry {
                    Value::Object(inner) => inner.clone(),
                    scalar => {
                        let mut m = Map::new();
                        m.insert("value".to_string(), scalar.clone());
                        m
                    }
                };
                match Record::from_fields(Some(key), fields) {
                    Some(mut r) => {
                        r.fields
                            .entry("name".to_string())
                            .or_insert_with(|| Value::String(key.clone()));
                        out.push(r)
                    }
                    None => skipped += 1,
                }
            }
        }
        (Shape::NameList, Value::Array(items)) => {
            for item in items {
                let record = match item {
                    Value::Object(m) => Record::from_fields(None, m.clone()),
                    other => as_text(other).and_then(|n| Record::named(&n)),
                };
                match record {
                    Some(r) => out.push(r),
                    None => skipped += 1,
                }
            }
        }
        (Shape::Scalar, Value::String(s)) => {
            for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                if let Some(r) = Record::named(part) {
                    out.push(r);
                }
            }
        }
        (Shape::Scalar, other) => {
            if let Some(r) = as_text(other).and_then(|n| Record::named(&n)) {
                out.push(r);
            }
        }
        _ => {}
    }
    disambiguate_segments(&mut out);
    (out, skipped)
}

/// Give records that share a name slug distinct path segments: the id when
/// one exists, else the 1-based occurrence index.
fn disambiguate_segments(records: &mut [Record]) {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for r in records.iter() {
        *counts.entry(r.segment.clone()).or_default() += 1;
    }
    let mut seen: HashMap<String, usize> = HashMap::new();
    for r in records.iter_mut() {
        if counts.get(&r.segment).copied().unwrap_or(0) < 2 {
            continue;
        }
        let n = seen.entry(r.segment.clone()).or_default();
        *n += 1;
        let suffix = match r.id() {
            Some(id) => slug(id),
            None => n.to_string(),
        };
        r.segment = format!("{}_{}", r.segment, suffix);
    }
}
