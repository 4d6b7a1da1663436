//! The complete output of one detection run.

use serde::{Deserialize, Serialize};
use sheetdiff_core_types::RunId;
use std::collections::BTreeMap;

use super::change::{Change, ChangeAttribution, ChangeCausation};
use super::diagnostics::Diagnostic;

/// A detector that failed inside the isolation boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DetectorFailure {
    pub detector: String,
    /// Stable error code (`ERR_*`)
    pub code: String,
    pub message: String,
}

/// Changes plus everything the analyzer derived about them.
///
/// This triad (changes, attributions, causations) is the complete contract
/// toward change-log storage.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectionResult {
    pub subject_id: String,
    pub run_id: RunId,
    pub changes: Vec<Change>,
    /// Keyed by field path; only changes with a determinable source
    pub attributions: BTreeMap<String, ChangeAttribution>,
    /// Keyed by field path; only changes that took part in a causal edge
    pub causations: BTreeMap<String, ChangeCausation>,
    pub diagnostics: Vec<Diagnostic>,
    pub detector_failures: Vec<DetectorFailure>,
}

impl DetectionResult {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Find a change by its field path
    pub fn change(&self, field_path: &str) -> Option<&Change> {
        self.changes.iter().find(|c| c.field_path == field_path)
    }

    /// True when at least one detector failed and the batch is partial
    pub fn is_partial(&self) -> bool {
        !self.detector_failures.is_empty()
    }
}
