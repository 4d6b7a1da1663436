//! Alignment and size.

use crate::classify::PriorityRules;
use crate::errors::ExError;
use crate::extract::CharacterSheet;
use crate::model::{Change, ChangeCategory, ChangePriority, DetectionContext, Diagnostics};
use crate::rules::RulesData;

use super::{ChangeDetector, DetectorBase};

pub const ALIGNMENT_PATH: &str = "character_info.alignment";
pub const SIZE_PATH: &str = "character_info.size";

pub struct AlignmentDetector {
    base: DetectorBase,
}

impl AlignmentDetector {
    pub fn new() -> Self {
        Self {
            base: DetectorBase::new("alignment", PriorityRules::fixed(ChangePriority::Medium)),
        }
    }
}

impl Default for AlignmentDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeDetector for AlignmentDetector {
    fn name(&self) -> &'static str {
        self.base.name()
    }

    fn detect(
        &self,
        old: &CharacterSheet,
        new: &CharacterSheet,
        ctx: &DetectionContext,
        _rules: &RulesData,
        _diag: &mut Diagnostics,
    ) -> Result<Vec<Change>, ExError> {
        Ok(self
            .base
            .text_presence(
                ctx,
                ALIGNMENT_PATH,
                ChangeCategory::Social,
                "Alignment",
                old.alignment.as_deref(),
                new.alignment.as_deref(),
            )
            .into_iter()
            .collect())
    }
}

pub struct SizeDetector {
    base: DetectorBase,
}

impl SizeDetector {
    pub fn new() -> Self {
        Self {
            base: DetectorBase::new("size", PriorityRules::fixed(ChangePriority::Medium)),
        }
    }
}

impl Default for SizeDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeDetector for SizeDetector {
    fn name(&self) -> &'static str {
        self.base.name()
    }

    fn detect(
        &self,
        old: &CharacterSheet,
        new: &CharacterSheet,
        ctx: &DetectionContext,
        _rules: &RulesData,
        _diag: &mut Diagnostics,
    ) -> Result<Vec<Change>, ExError> {
        Ok(self
            .base
            .text_presence(
                ctx,
                SIZE_PATH,
                ChangeCategory::BasicInfo,
                "Size",
                Some(old.size.as_str()),
                Some(new.size.as_str()),
            )
            .into_iter()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::run;
    use crate::model::ChangeType;
    use serde_json::json;

    #[test]
    fn test_alignment_shift() {
        let changes = run(
            &AlignmentDetector::new(),
            json!({"alignment": "Neutral Good"}),
            json!({"alignment": "Chaotic Good"}),
        );
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field_path, ALIGNMENT_PATH);
        assert_eq!(changes[0].change_type, ChangeType::Modified);
        assert_eq!(changes[0].priority, ChangePriority::Medium);
        assert_eq!(changes[0].category, ChangeCategory::Social);
    }

    #[test]
    fn test_alignment_case_only_is_ignored() {
        let changes = run(
            &AlignmentDetector::new(),
            json!({"alignment": "lawful neutral"}),
            json!({"alignment": "Lawful Neutral"}),
        );
        assert!(changes.is_empty());
    }

    #[test]
    fn test_size_follows_species_table() {
        let changes = run(
            &SizeDetector::new(),
            json!({"race": "Human"}),
            json!({"race": "Halfling"}),
        );
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].field_path, SIZE_PATH);
        assert_eq!(changes[0].new_value, Some(json!("Small")));
        assert_eq!(changes[0].category, ChangeCategory::BasicInfo);
    }
}
