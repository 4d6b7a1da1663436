//! sheetdiff core - semantic change detection for character sheet snapshots
//!
//! This crate compares two point-in-time snapshots of a loosely schematized
//! character sheet and explains the difference:
//! - Path-tolerant extraction into one normalized sheet per snapshot
//! - Independent per-domain detectors with priority/category classification
//! - Aggregation and cross-domain causation linking with cycle checks
//! - Audience-specific presentation (terse feed vs. verbose change log)
//!
//! Detection is synchronous and side-effect free; the only events it logs are
//! emitted at the engine boundary.

pub mod aggregate;
pub mod causation;
pub mod classify;
pub mod detectors;
pub mod engine;
pub mod errors;
pub mod extract;
pub mod logging_facility;
pub mod model;
pub mod ports;
pub mod present;
pub mod rules;

// Logging macros resolve schema constants through this path
pub use sheetdiff_core_types;

// Re-export commonly used types
pub use engine::{DetectionEngine, EngineConfig};
pub use errors::{ExError, ExErrorKind, Result, SheetDiffError};
pub use extract::CharacterSheet;
pub use model::{
    Change, ChangeAttribution, ChangeCategory, ChangeCausation, ChangePriority, ChangeType,
    ComparisonRefs, DetectionContext, DetectionResult,
};
pub use present::{present, present_result, Audience, Presentation, PresentationConfig};
pub use rules::RulesData;
