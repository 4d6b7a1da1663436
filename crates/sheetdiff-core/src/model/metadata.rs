//! Canonical `Change.metadata` keys and causation trigger names.

pub const DETECTOR: &str = "detector";
pub const CAUSATION_TRIGGER: &str = "causation_trigger";
/// Field path of the cause within the same batch
pub const CAUSED_BY: &str = "caused_by";
pub const CAUSED_BY_FEAT: &str = "caused_by_feat";
pub const CAUSED_BY_ABILITY: &str = "caused_by_ability";
pub const CAUSED_BY_CLASS: &str = "caused_by_class";
pub const CAUSED_BY_RACE: &str = "caused_by_race";
pub const CAUSED_BY_BACKGROUND: &str = "caused_by_background";
pub const CAUSED_BY_ITEM: &str = "caused_by_item";
pub const RELATED_CHANGES: &str = "related_changes";
pub const MODIFIER_DELTA: &str = "modifier_delta";
pub const HP_BREAKDOWN: &str = "hp_breakdown";
pub const HP_CAUSES: &str = "hp_causes";
pub const CAUSATION_CONFIDENCE: &str = "causation_confidence";
pub const MULTICLASS: &str = "multiclass";
pub const CASCADE_DEPTH: &str = "cascade_depth";
pub const LEVELS_GAINED: &str = "levels_gained";

/// Values of `causation_trigger`.
pub mod trigger {
    pub const LEVEL_PROGRESSION: &str = "level_progression";
    pub const FEAT_SELECTION: &str = "feat_selection";
    pub const ABILITY_SCORE_CHANGE: &str = "ability_score_change";
    pub const BACKGROUND_CHANGE: &str = "background_change";
    pub const RACE_CHANGE: &str = "race_change";
    pub const MULTICLASS: &str = "multiclass";
    pub const CLASS_FEATURE: &str = "class_feature";
    pub const EQUIPMENT: &str = "equipment";
    pub const PROFICIENCY_CHANGE: &str = "proficiency_change";
    pub const ROOT_CAUSE: &str = "root_cause";
}
