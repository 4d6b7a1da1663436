//! Structured diagnostics returned alongside detection results.
//!
//! Extraction fallbacks and detector-level oddities are recorded here instead
//! of being logged from inside the detectors, which keeps them side-effect
//! free and lets tests assert on them directly.

use serde::{Deserialize, Serialize};

/// One diagnostic: who noticed what, and where.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Diagnostic {
    pub detector: String,
    pub field_path: String,
    pub condition: String,
}

/// Collector passed by `&mut` through extraction and detection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        detector: impl Into<String>,
        field_path: impl Into<String>,
        condition: impl Into<String>,
    ) {
        self.entries.push(Diagnostic {
            detector: detector.into(),
            field_path: field_path.into(),
            condition: condition.into(),
        });
    }

    pub fn extend(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.entries.iter()
    }

    pub fn into_vec(self) -> Vec<Diagnostic> {
        self.entries
    }
}
