//! Collaborator interfaces.
//!
//! The engine does not fetch, store or deliver anything itself. These traits
//! describe what it expects from the systems around it; implementations live
//! with the caller.

use serde_json::Value;

use crate::errors::ExError;
use crate::model::{ComparisonRefs, DetectionResult};
use crate::present::Presentation;

/// Two fully materialized snapshots of one subject.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotPair {
    pub old: Value,
    pub new: Value,
    pub refs: ComparisonRefs,
}

/// Supplies the two snapshots to compare.
pub trait SnapshotSource {
    /// Both snapshots for `subject_id`, resolved before detection starts.
    ///
    /// # Errors
    ///
    /// Whatever the source cannot resolve; the engine propagates it as is.
    fn snapshot_pair(&self, subject_id: &str) -> Result<SnapshotPair, ExError>;
}

/// Durable storage for detection results.
///
/// Receives the complete change, attribution and causation triad of every
/// run.
pub trait ChangeLogStore {
    /// # Errors
    ///
    /// Storage failures.
    fn append(&mut self, result: &DetectionResult) -> Result<(), ExError>;
}

/// Delivers formatted notifications. Sees only presentation output, never
/// raw changes.
pub trait NotificationDispatcher {
    /// # Errors
    ///
    /// Delivery failures.
    fn dispatch(&self, subject_name: &str, presentation: &Presentation) -> Result<(), ExError>;
}

/// Change log that keeps every appended result in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryChangeLog {
    results: Vec<DetectionResult>,
}

impl MemoryChangeLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn results(&self) -> &[DetectionResult] {
        &self.results
    }
}

impl ChangeLogStore for MemoryChangeLog {
    fn append(&mut self, result: &DetectionResult) -> Result<(), ExError> {
        self.results.push(result.clone());
        Ok(())
    }
}
