//! The atomic output unit of a detection run and its companions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// How a logical attribute changed between the two snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Added,
    Removed,
    Modified,
    Incremented,
    Decremented,
    Reordered,
    Renamed,
    Moved,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Added => "added",
            ChangeType::Removed => "removed",
            ChangeType::Modified => "modified",
            ChangeType::Incremented => "incremented",
            ChangeType::Decremented => "decremented",
            ChangeType::Reordered => "reordered",
            ChangeType::Renamed => "renamed",
            ChangeType::Moved => "moved",
        }
    }

    /// Classify a numeric transition. Returns `None` when nothing changed.
    pub fn for_numeric(old: i64, new: i64) -> Option<Self> {
        match new.cmp(&old) {
            std::cmp::Ordering::Greater => Some(ChangeType::Incremented),
            std::cmp::Ordering::Less => Some(ChangeType::Decremented),
            std::cmp::Ordering::Equal => None,
        }
    }

    /// Classify an optional-value transition. Returns `None` when nothing changed.
    pub fn for_presence<T: PartialEq>(old: Option<&T>, new: Option<&T>) -> Option<Self> {
        match (old, new) {
            (None, Some(_)) => Some(ChangeType::Added),
            (Some(_), None) => Some(ChangeType::Removed),
            (Some(a), Some(b)) if a != b => Some(ChangeType::Modified),
            _ => None,
        }
    }
}

/// Significance of a change. Ordered from least to most significant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangePriority {
    Low,
    Medium,
    High,
    Critical,
}

impl ChangePriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangePriority::Low => "low",
            ChangePriority::Medium => "medium",
            ChangePriority::High => "high",
            ChangePriority::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Some(ChangePriority::Low),
            "medium" => Some(ChangePriority::Medium),
            "high" => Some(ChangePriority::High),
            "critical" => Some(ChangePriority::Critical),
            _ => None,
        }
    }

    /// True for the priorities the terse notification feed keeps.
    pub fn is_high_or_above(&self) -> bool {
        *self >= ChangePriority::High
    }
}

/// Fixed domain tag of a change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeCategory {
    BasicInfo,
    Abilities,
    Skills,
    Combat,
    Spells,
    Features,
    Equipment,
    Inventory,
    Progression,
    Social,
    Metadata,
}

impl ChangeCategory {
    /// All categories in display order
    pub const ALL: [ChangeCategory; 11] = [
        ChangeCategory::BasicInfo,
        ChangeCategory::Abilities,
        ChangeCategory::Skills,
        ChangeCategory::Combat,
        ChangeCategory::Spells,
        ChangeCategory::Features,
        ChangeCategory::Equipment,
        ChangeCategory::Inventory,
        ChangeCategory::Progression,
        ChangeCategory::Social,
        ChangeCategory::Metadata,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeCategory::BasicInfo => "basic_info",
            ChangeCategory::Abilities => "abilities",
            ChangeCategory::Skills => "skills",
            ChangeCategory::Combat => "combat",
            ChangeCategory::Spells => "spells",
            ChangeCategory::Features => "features",
            ChangeCategory::Equipment => "equipment",
            ChangeCategory::Inventory => "inventory",
            ChangeCategory::Progression => "progression",
            ChangeCategory::Social => "social",
            ChangeCategory::Metadata => "metadata",
        }
    }
}

/// One detected, classified difference between two snapshots.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Change {
    /// Dot-separated logical path of the attribute that changed
    pub field_path: String,
    /// Value before the change (`None` when the attribute was absent)
    pub old_value: Option<Value>,
    /// Value after the change (`None` when the attribute is now absent)
    pub new_value: Option<Value>,
    pub change_type: ChangeType,
    pub priority: ChangePriority,
    pub category: ChangeCategory,
    /// Short human-readable summary
    pub description: String,
    pub detection_timestamp: DateTime<Utc>,
    /// Open map carrying causation hints and calculation breakdowns
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

impl Change {
    pub fn new(
        field_path: impl Into<String>,
        change_type: ChangeType,
        category: ChangeCategory,
        priority: ChangePriority,
        description: impl Into<String>,
        detection_timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            field_path: field_path.into(),
            old_value: None,
            new_value: None,
            change_type,
            priority,
            category,
            description: description.into(),
            detection_timestamp,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_values(mut self, old: Option<Value>, new: Option<Value>) -> Self {
        self.old_value = old;
        self.new_value = new;
        self
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Metadata value as a string, if present and a string
    pub fn meta_str(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    /// `new - old` when both sides are integers
    pub fn numeric_delta(&self) -> Option<i64> {
        let old = self.old_value.as_ref()?.as_i64()?;
        let new = self.new_value.as_ref()?.as_i64()?;
        Some(new - old)
    }

    /// True when the change is a no-op and must not be emitted.
    ///
    /// Added/removed changes are allowed one absent side; every other change
    /// type needs two differing values.
    pub fn is_noop(&self) -> bool {
        match self.change_type {
            ChangeType::Added => self.new_value.is_none() || self.old_value == self.new_value,
            ChangeType::Removed => self.old_value.is_none() || self.old_value == self.new_value,
            _ => self.old_value == self.new_value,
        }
    }
}

/// Best-effort identification of the game entity that produced a change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeAttribution {
    /// Mechanism class, e.g. `feat_selection`
    pub source: String,
    /// Specific entity name, e.g. `Great Weapon Master`
    pub source_name: String,
    /// Entity kind: feat, item, class_feature, class, race, background, ability
    pub source_type: String,
    pub impact_summary: String,
}

/// A directed cause→effect relationship recorded for one change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeCausation {
    pub trigger: String,
    #[serde(default)]
    pub trigger_details: BTreeMap<String, Value>,
    /// Field paths of changes in the same batch
    #[serde(default)]
    pub related_changes: Vec<String>,
    /// Number of causal hops from a root cause (0 = root)
    pub cascade_depth: u32,
}
