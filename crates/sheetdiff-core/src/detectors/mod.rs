//! Per-domain change detectors.
//!
//! Each detector compares two normalized sheets for one domain and returns
//! its changes, including secondary changes it can attribute directly.
//! Detectors never see each other's output and hold no mutable state.

pub mod abilities;
pub mod background;
pub mod combat;
pub mod feats;
pub mod hit_points;
pub mod identity;
pub mod inventory;
pub mod level;
pub mod multiclass;
pub mod passive;
pub mod personality;
pub mod proficiencies;
pub mod species;
pub mod spellcasting;
pub mod spells;
pub mod subclass;

pub use abilities::AbilityScoresDetector;
pub use background::BackgroundDetector;
pub use combat::{InitiativeDetector, SpeedDetector};
pub use feats::FeatsDetector;
pub use hit_points::HitPointsDetector;
pub use identity::{AlignmentDetector, SizeDetector};
pub use inventory::InventoryDetector;
pub use level::LevelDetector;
pub use multiclass::MulticlassDetector;
pub use passive::PassiveSkillsDetector;
pub use personality::PersonalityDetector;
pub use proficiencies::ProficienciesDetector;
pub use species::SpeciesDetector;
pub use spellcasting::SpellcastingStatsDetector;
pub use spells::SpellsDetector;
pub use subclass::SubclassDetector;

use serde_json::Value;

use crate::classify::PriorityRules;
use crate::errors::ExError;
use crate::extract::{slug, CharacterSheet};
use crate::model::metadata as meta;
use crate::model::{Change, ChangeCategory, ChangeType, DetectionContext, Diagnostics};
use crate::rules::RulesData;

/// One domain of change detection.
pub trait ChangeDetector: Send + Sync {
    /// Stable detector name, stamped into `metadata.detector`
    fn name(&self) -> &'static str;

    /// Compare two sheets for this domain.
    ///
    /// # Errors
    ///
    /// Returns an `ExError` when the detector cannot produce a trustworthy
    /// result. The engine records it as a detector failure and continues.
    fn detect(
        &self,
        old: &CharacterSheet,
        new: &CharacterSheet,
        ctx: &DetectionContext,
        rules: &RulesData,
        diag: &mut Diagnostics,
    ) -> Result<Vec<Change>, ExError>;
}

/// All built-in detectors in registration order.
///
/// Registration order is the order of the aggregated change list.
pub fn default_detectors() -> Vec<Box<dyn ChangeDetector>> {
    vec![
        Box::new(LevelDetector::new()),
        Box::new(FeatsDetector::new()),
        Box::new(AbilityScoresDetector::new()),
        Box::new(SubclassDetector::new()),
        Box::new(SpellsDetector::new()),
        Box::new(InventoryDetector::new()),
        Box::new(BackgroundDetector::new()),
        Box::new(HitPointsDetector::new()),
        Box::new(ProficienciesDetector::new()),
        Box::new(SpeciesDetector::new()),
        Box::new(MulticlassDetector::new()),
        Box::new(PersonalityDetector::new()),
        Box::new(SpellcastingStatsDetector::new()),
        Box::new(InitiativeDetector::new()),
        Box::new(PassiveSkillsDetector::new()),
        Box::new(AlignmentDetector::new()),
        Box::new(SizeDetector::new()),
        Box::new(SpeedDetector::new()),
    ]
}

/// Shared change construction: stamps the detector name, the run timestamp
/// and the classifier's priority on every change.
#[derive(Debug, Clone)]
pub struct DetectorBase {
    name: &'static str,
    priorities: PriorityRules,
}

impl DetectorBase {
    pub fn new(name: &'static str, priorities: PriorityRules) -> Self {
        Self { name, priorities }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn priorities(&self) -> &PriorityRules {
        &self.priorities
    }

    pub fn change(
        &self,
        ctx: &DetectionContext,
        field_path: impl Into<String>,
        change_type: ChangeType,
        category: ChangeCategory,
        description: impl Into<String>,
    ) -> Change {
        let field_path = field_path.into();
        let priority = self.priorities.resolve(&field_path, change_type);
        Change::new(
            field_path,
            change_type,
            category,
            priority,
            description,
            ctx.timestamp,
        )
        .with_meta(meta::DETECTOR, self.name)
    }

    /// Incremented/decremented change, or `None` when the values are equal.
    pub fn numeric(
        &self,
        ctx: &DetectionContext,
        field_path: impl Into<String>,
        category: ChangeCategory,
        label: &str,
        old: i64,
        new: i64,
    ) -> Option<Change> {
        let change_type = ChangeType::for_numeric(old, new)?;
        let verb = if new > old { "increased" } else { "decreased" };
        Some(
            self.change(
                ctx,
                field_path,
                change_type,
                category,
                format!("{label} {verb} from {old} to {new}"),
            )
            .with_values(Some(Value::from(old)), Some(Value::from(new))),
        )
    }

    /// Added/removed/modified change for an optional text value, or `None`
    /// when both sides agree (compared case-insensitively).
    pub fn text_presence(
        &self,
        ctx: &DetectionContext,
        field_path: impl Into<String>,
        category: ChangeCategory,
        label: &str,
        old: Option<&str>,
        new: Option<&str>,
    ) -> Option<Change> {
        let old_key = old.map(|s| s.trim().to_lowercase());
        let new_key = new.map(|s| s.trim().to_lowercase());
        let change_type = ChangeType::for_presence(old_key.as_ref(), new_key.as_ref())?;
        let description = match (old, new) {
            (None, Some(n)) => format!("{label} set to {n}"),
            (Some(o), None) => format!("{label} {o} removed"),
            (Some(o), Some(n)) => format!("{label} changed from {o} to {n}"),
            (None, None) => return None,
        };
        Some(
            self.change(ctx, field_path, change_type, category, description).with_values(
                old.map(|s| Value::String(s.to_string())),
                new.map(|s| Value::String(s.to_string())),
            ),
        )
    }
}

/// Normalized proficiency kind used in `proficiencies.<kind>.<item>` paths.
///
/// Table entries say `skill`/`skills`, `weapon`/`weapons` and so on.
pub fn proficiency_kind(kind: &str) -> String {
    match kind.trim().to_lowercase().as_str() {
        "skill" | "skills" => "skills".to_string(),
        "save" | "saves" | "saving_throw" | "saving_throws" => "saving_throws".to_string(),
        "weapon" | "weapons" => "weapons".to_string(),
        "tool" | "tools" => "tools".to_string(),
        "language" | "languages" => "languages".to_string(),
        "armor" | "armour" => "armor".to_string(),
        other => slug(other),
    }
}

/// Category of a proficiency change.
pub fn proficiency_category(kind: &str) -> ChangeCategory {
    match kind {
        "languages" => ChangeCategory::Social,
        "armor" | "weapons" => ChangeCategory::Equipment,
        _ => ChangeCategory::Skills,
    }
}

/// Secondary `proficiencies.<kind>.<item>` changes for table grants that are
/// newly present in the new sheet. Grants already held before, or not
/// observed now, are skipped.
pub(crate) fn granted_proficiencies<'g>(
    grants: impl IntoIterator<Item = (&'g String, &'g Vec<String>)>,
    old: &CharacterSheet,
    new: &CharacterSheet,
) -> Vec<(String, String, String)> {
    let mut out = Vec::new();
    for (kind, items) in grants {
        let kind = proficiency_kind(kind);
        for item in items {
            let item_slug = slug(item);
            if new.has_proficiency(&kind, &item_slug) && !old.has_proficiency(&kind, &item_slug) {
                out.push((kind.clone(), item_slug, item.clone()));
            }
        }
    }
    out
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::{DateTime, Utc};
    use serde_json::Value;

    use crate::extract::CharacterSheet;
    use crate::model::{Change, DetectionContext, Diagnostics};
    use crate::rules::RulesData;

    use super::ChangeDetector;

    pub fn ctx() -> DetectionContext {
        let ts: DateTime<Utc> = DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        DetectionContext::new("c-1", "Brakka").with_timestamp(ts)
    }

    pub fn sheet(snapshot: &Value) -> CharacterSheet {
        CharacterSheet::extract(snapshot, &RulesData::builtin(), &mut Diagnostics::new())
    }

    pub fn run(detector: &dyn ChangeDetector, old: Value, new: Value) -> Vec<Change> {
        let rules = RulesData::builtin();
        let mut diag = Diagnostics::new();
        let old = CharacterSheet::extract(&old, &rules, &mut diag);
        let new = CharacterSheet::extract(&new, &rules, &mut diag);
        detector
            .detect(&old, &new, &ctx(), &rules, &mut diag)
            .unwrap()
    }

    pub fn find<'a>(changes: &'a [Change], path: &str) -> &'a Change {
        changes
            .iter()
            .find(|c| c.field_path == path)
            .unwrap_or_else(|| panic!("no change at {path}; got {:?}", paths(changes)))
    }

    pub fn paths(changes: &[Change]) -> Vec<&str> {
        changes.iter().map(|c| c.field_path.as_str()).collect()
    }
}
