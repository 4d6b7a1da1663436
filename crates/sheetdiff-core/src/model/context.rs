//! Per-run detection context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sheetdiff_core_types::RunId;

use crate::extract::{extract, Attribute};

/// References to where the two compared snapshots came from.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComparisonRefs {
    pub old_ref: Option<String>,
    pub new_ref: Option<String>,
}

/// Identifies the subject and the comparison. Created once per run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectionContext {
    pub subject_id: String,
    pub subject_name: String,
    #[serde(default)]
    pub comparison_refs: ComparisonRefs,
    /// Stamped on every change emitted in this run
    pub timestamp: DateTime<Utc>,
    pub run_id: RunId,
}

impl DetectionContext {
    pub fn new(subject_id: impl Into<String>, subject_name: impl Into<String>) -> Self {
        Self {
            subject_id: subject_id.into(),
            subject_name: subject_name.into(),
            comparison_refs: ComparisonRefs::default(),
            timestamp: Utc::now(),
            run_id: RunId::new(),
        }
    }

    /// Build a context when the caller does not know the subject up front.
    ///
    /// Subject id and name are read from the new snapshot (falling back to the
    /// old one) through the shared extractor.
    pub fn from_snapshots(old: &Value, new: &Value, refs: ComparisonRefs) -> Self {
        let id = [new, old]
            .iter()
            .map(|s| extract(s, Attribute::CharacterId))
            .find(|v| !v.is_null())
            .map(|v| match v {
                Value::String(s) => s,
                other => other.to_string(),
            })
            .unwrap_or_else(|| "unknown".to_string());
        let name = match extract(new, Attribute::Name) {
            Value::String(s) => s,
            _ => "Unknown".to_string(),
        };
        Self::new(id, name).with_refs(refs)
    }

    pub fn with_refs(mut self, refs: ComparisonRefs) -> Self {
        self.comparison_refs = refs;
        self
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = timestamp;
        self
    }
}
