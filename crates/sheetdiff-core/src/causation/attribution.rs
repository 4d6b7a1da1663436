//! Source attribution derived from change metadata.

use crate::extract::CharacterSheet;
use crate::model::metadata::{self as meta, trigger};
use crate::model::{Change, ChangeAttribution};

/// Metadata key → (source, source_type), checked in order.
const SOURCES: [(&str, &str, &str); 6] = [
    (meta::CAUSED_BY_FEAT, "feat_selection", "feat"),
    (meta::CAUSED_BY_ABILITY, "ability_score_change", "ability"),
    (meta::CAUSED_BY_CLASS, "class_feature", "class"),
    (meta::CAUSED_BY_RACE, "racial_trait", "race"),
    (meta::CAUSED_BY_BACKGROUND, "background", "background"),
    (meta::CAUSED_BY_ITEM, "equipment", "item"),
];

/// Attribution for one change, or `None` when no source is determinable.
///
/// A `level_progression` trigger wins over the generic class mapping so
/// level-driven changes read as progression, not as a class feature.
pub fn attribute(change: &Change, new: &CharacterSheet) -> Option<ChangeAttribution> {
    if change.meta_str(meta::CAUSATION_TRIGGER) == Some(trigger::LEVEL_PROGRESSION) {
        let class = change
            .meta_str(meta::CAUSED_BY_CLASS)
            .map(str::to_string)
            .or_else(|| new.classes.first().map(|c| c.name.clone()))
            .unwrap_or_else(|| format!("Level {}", new.level));
        return Some(build(change, trigger::LEVEL_PROGRESSION, &class, "class"));
    }
    SOURCES.iter().find_map(|(key, source, source_type)| {
        change
            .meta_str(key)
            .map(|name| build(change, source, name, source_type))
    })
}

fn build(change: &Change, source: &str, name: &str, source_type: &str) -> ChangeAttribution {
    ChangeAttribution {
        source: source.to_string(),
        source_name: name.to_string(),
        source_type: source_type.to_string(),
        impact_summary: format!("{name}: {}", change.description),
    }
}
